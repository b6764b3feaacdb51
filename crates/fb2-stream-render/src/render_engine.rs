use core::fmt;
use std::sync::Arc;
use std::time::Instant;

use fb2_stream::{Book, FlatEvent, NodeKind, TagPhase};

use crate::render_ir::{DrawItem, PageDiagnostics, ReadingInfo, RenderPage};
use crate::render_layout::{FixedWidthMeasurer, LayoutError, LineBreaker, TextMeasurer};
use crate::render_page::PageAggregator;
use crate::render_style::{StyleTracker, DEFAULT_TITLE_SIZE_DELTA};

/// Layout parameters for pagination.
///
/// Changes apply to pages produced afterwards only.
#[derive(Clone)]
pub struct LayoutParams {
    /// Measurement backend for every style.
    pub measurer: Arc<dyn TextMeasurer>,
    /// Width reserved before the first line of a non-title paragraph.
    pub paragraph_first_line_indent: f32,
    /// Height of an `<empty-line/>` spacer.
    pub empty_line_height: f32,
    /// Font size offset in px applied to title text.
    pub title_size_delta: i16,
    /// Append an empty-line spacer after each title.
    pub empty_line_after_title: bool,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            measurer: Arc::new(FixedWidthMeasurer::default()),
            paragraph_first_line_indent: 20.0,
            empty_line_height: 10.0,
            title_size_delta: DEFAULT_TITLE_SIZE_DELTA,
            empty_line_after_title: true,
        }
    }
}

impl fmt::Debug for LayoutParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutParams")
            .field("paragraph_first_line_indent", &self.paragraph_first_line_indent)
            .field("empty_line_height", &self.empty_line_height)
            .field("title_size_delta", &self.title_size_delta)
            .field("empty_line_after_title", &self.empty_line_after_title)
            .finish_non_exhaustive()
    }
}

impl LayoutParams {
    pub fn with_measurer(mut self, measurer: Arc<dyn TextMeasurer>) -> Self {
        self.measurer = measurer;
        self
    }

    pub fn with_paragraph_first_line_indent(mut self, indent: f32) -> Self {
        self.paragraph_first_line_indent = indent;
        self
    }

    pub fn with_empty_line_height(mut self, height: f32) -> Self {
        self.empty_line_height = height;
        self
    }

    pub fn with_title_size_delta(mut self, delta: i16) -> Self {
        self.title_size_delta = delta;
        self
    }

    pub fn with_empty_line_after_title(mut self, enabled: bool) -> Self {
        self.empty_line_after_title = enabled;
        self
    }
}

/// Pagination error.
#[derive(Clone, Debug, PartialEq)]
pub enum PaginateError {
    /// Cursor points past the end of the book.
    CursorOutOfBounds { item_index: usize, len: usize },
    /// Line breaking failed.
    Layout(LayoutError),
}

impl fmt::Display for PaginateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CursorOutOfBounds { item_index, len } => write!(
                f,
                "reading cursor out of bounds (item_index={} len={})",
                item_index, len
            ),
            Self::Layout(err) => write!(f, "layout failed: {}", err),
        }
    }
}

impl std::error::Error for PaginateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Layout(err) => Some(err),
            Self::CursorOutOfBounds { .. } => None,
        }
    }
}

impl From<LayoutError> for PaginateError {
    fn from(value: LayoutError) -> Self {
        Self::Layout(value)
    }
}

#[derive(Clone, Copy, Debug)]
struct Mark {
    cursor: ReadingInfo,
    style: StyleTracker,
}

/// Resumable page-by-page layout over one book.
///
/// [`get_page`](Self::get_page) never moves the cursor; it only computes
/// where the following page would start. [`next_page`](Self::next_page)
/// commits that position.
#[derive(Debug)]
pub struct Paginator {
    book: Book,
    params: LayoutParams,
    committed: Mark,
    pending: Option<Mark>,
    last_diagnostics: PageDiagnostics,
}

impl Paginator {
    /// Paginate `book` from its beginning.
    pub fn new(book: Book, params: LayoutParams) -> Self {
        let style = StyleTracker::new(params.title_size_delta);
        Self {
            book,
            params,
            committed: Mark {
                cursor: ReadingInfo::START,
                style,
            },
            pending: None,
            last_diagnostics: PageDiagnostics::default(),
        }
    }

    /// Paginate `book` resuming at a previously reported `cursor`.
    pub fn with_cursor(
        book: Book,
        params: LayoutParams,
        cursor: ReadingInfo,
    ) -> Result<Self, PaginateError> {
        let mut paginator = Self::new(book, params);
        paginator.set_cursor(cursor)?;
        Ok(paginator)
    }

    /// Jump to `cursor`, discarding any pending page.
    pub fn set_cursor(&mut self, cursor: ReadingInfo) -> Result<(), PaginateError> {
        let events = self.book.events();
        if cursor.item_index > events.len() {
            return Err(PaginateError::CursorOutOfBounds {
                item_index: cursor.item_index,
                len: events.len(),
            });
        }
        let style = StyleTracker::at(&events[..cursor.item_index], self.params.title_size_delta);
        self.committed = Mark { cursor, style };
        self.pending = None;
        Ok(())
    }

    /// Replace layout parameters for subsequent pages.
    pub fn change_parameters(&mut self, params: LayoutParams) {
        self.committed
            .style
            .set_title_size_delta(params.title_size_delta);
        if let Some(pending) = self.pending.as_mut() {
            pending.style.set_title_size_delta(params.title_size_delta);
        }
        self.params = params;
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    /// Committed position of the current page.
    pub fn cursor(&self) -> ReadingInfo {
        self.committed.cursor
    }

    /// Position of the page after the last one produced, if any.
    pub fn pending_cursor(&self) -> Option<ReadingInfo> {
        self.pending.map(|mark| mark.cursor)
    }

    /// Diagnostics of the last successful `get_page` call.
    pub fn last_diagnostics(&self) -> &PageDiagnostics {
        &self.last_diagnostics
    }

    /// Whether the committed cursor is at the end of the book.
    pub fn is_exhausted(&self) -> bool {
        self.committed.cursor.item_index >= self.book.len()
    }

    /// Lay out the page at the committed cursor.
    pub fn get_page(&mut self, max_width: f32, max_height: f32) -> Result<RenderPage, PaginateError> {
        let started = Instant::now();
        let events = self.book.events_shared();
        let start = self.committed.cursor;
        if start.item_index > events.len() {
            return Err(PaginateError::CursorOutOfBounds {
                item_index: start.item_index,
                len: events.len(),
            });
        }

        let mut diagnostics = PageDiagnostics::default();
        let mut page = PageAggregator::new(start.line_index, max_height);
        let mut breaker = LineBreaker::new(
            Arc::clone(&self.params.measurer),
            self.params.paragraph_first_line_indent,
        );
        let mut style = self.committed.style;
        let mut next = self.committed;
        let mut stopped = false;

        for (idx, event) in events.iter().enumerate().skip(start.item_index) {
            match event {
                FlatEvent::Text(text) => {
                    for item in breaker.wrap(text, style.current(), max_width) {
                        if !page.try_add(item?) {
                            break;
                        }
                    }
                }
                FlatEvent::Tag { kind, phase } => match (kind, phase) {
                    (NodeKind::Body, TagPhase::Close) => {
                        if finish_line(&mut page, &breaker, &style) {
                            page.start_new_item();
                            breaker.start_new_line(true);
                            next.cursor.item_index = idx + 1;
                            next.style = style;
                        }
                    }
                    (NodeKind::Section, TagPhase::Open) => {
                        if finish_line(&mut page, &breaker, &style) {
                            next = mark_at(idx, style);
                            page.start_new_item();
                            breaker.start_new_line(true);
                            if !page.is_empty() {
                                stopped = true;
                                break;
                            }
                        }
                    }
                    (NodeKind::Paragraph, TagPhase::Open) => {
                        if finish_line(&mut page, &breaker, &style) {
                            next = mark_at(idx, style);
                            page.start_new_item();
                            breaker.start_new_line(true);
                        }
                    }
                    (NodeKind::Title, TagPhase::Open | TagPhase::Close) => {
                        if finish_line(&mut page, &breaker, &style) {
                            next = mark_at(idx, style);
                            page.start_new_item();
                            breaker.start_new_line(true);
                            style.apply(event);
                            if *phase == TagPhase::Close && self.params.empty_line_after_title {
                                page.try_add(DrawItem::EmptyLine {
                                    height: self.params.empty_line_height,
                                });
                            }
                        }
                    }
                    (NodeKind::Paragraph, TagPhase::Close) => {
                        page.try_add(breaker.line_break(style.current()));
                        breaker.start_new_line(false);
                    }
                    (NodeKind::EmptyLine, TagPhase::SelfClose) => {
                        // A spacer on a fresh line is its own resume point.
                        if breaker.is_first_on_line() {
                            next = mark_at(idx, style);
                            page.start_new_item();
                        }
                        page.try_add(DrawItem::EmptyLine {
                            height: self.params.empty_line_height,
                        });
                    }
                    (NodeKind::Strong | NodeKind::Emphasis, _) => {
                        style.apply(event);
                    }
                    (NodeKind::Section, TagPhase::Close) | (NodeKind::Body, TagPhase::Open) => {}
                    _ => {
                        log::trace!("no layout effect for {} at item {}", event, idx);
                        diagnostics.record_ignored(event.to_string());
                    }
                },
            }

            if page.end_of_page() {
                stopped = true;
                break;
            }
        }

        if stopped {
            next.cursor.line_index = page.current_line_index();
        } else {
            next = Mark {
                cursor: ReadingInfo::new(events.len(), 0),
                style,
            };
        }
        self.pending = Some(next);

        diagnostics.elapsed = started.elapsed();
        if !diagnostics.ignored_tags.is_empty() {
            log::warn!(
                "page at {} ignored events: {}",
                start,
                diagnostics.ignored_tags.join(", ")
            );
        }
        log::debug!(
            "page laid out: start={} next={} items={} height={} elapsed={:?}",
            start,
            next.cursor,
            page.items().len(),
            page.content_height(),
            diagnostics.elapsed
        );
        self.last_diagnostics = diagnostics.clone();

        Ok(RenderPage {
            items: page.into_items(),
            diagnostics,
            start,
        })
    }

    /// Commit the position computed by the last `get_page`.
    ///
    /// Returns `false` when there is no further page.
    pub fn next_page(&mut self) -> bool {
        match self.pending {
            Some(next) if next.cursor.item_index < self.book.len() => {
                self.committed = next;
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    /// Iterate pages from the committed cursor to the end of the book.
    ///
    /// The iterator advances the paginator. It stops after the first error.
    pub fn pages(&mut self, max_width: f32, max_height: f32) -> Pages<'_> {
        Pages {
            paginator: self,
            max_width,
            max_height,
            done: false,
        }
    }
}

fn mark_at(item_index: usize, style: StyleTracker) -> Mark {
    Mark {
        cursor: ReadingInfo::new(item_index, 0),
        style,
    }
}

/// Terminate a line left open by text outside a paragraph.
///
/// Returns `false` when the page filled up.
fn finish_line(page: &mut PageAggregator, breaker: &LineBreaker, style: &StyleTracker) -> bool {
    if !breaker.is_first_on_line() {
        page.try_add(breaker.line_break(style.current()));
    }
    !page.end_of_page()
}

/// Page iterator returned by [`Paginator::pages`].
pub struct Pages<'a> {
    paginator: &'a mut Paginator,
    max_width: f32,
    max_height: f32,
    done: bool,
}

impl Iterator for Pages<'_> {
    type Item = Result<RenderPage, PaginateError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let before = self.paginator.cursor();
        let page = match self.paginator.get_page(self.max_width, self.max_height) {
            Ok(page) => page,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        if !self.paginator.next_page() {
            self.done = true;
            if page.is_empty() {
                return None;
            }
        } else if self.paginator.cursor() == before {
            log::warn!("pagination made no progress at {}; stopping", before);
            self.done = true;
        }
        Some(Ok(page))
    }
}
