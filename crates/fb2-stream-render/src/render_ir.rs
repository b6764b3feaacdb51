use core::fmt;
use core::time::Duration;

use serde::{Deserialize, Serialize};

/// Resolved style for one text run.
///
/// Immutable value; the style tracker derives a fresh one per text event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TextStyle {
    pub strong: bool,
    pub emphasis: bool,
    pub title: bool,
    /// Font size offset in px relative to the regular face.
    pub size_delta: i16,
}

impl TextStyle {
    /// Regular body text.
    pub const REGULAR: Self = Self {
        strong: false,
        emphasis: false,
        title: false,
        size_delta: 0,
    };

    pub fn strong(mut self) -> Self {
        self.strong = true;
        self
    }

    pub fn emphasis(mut self) -> Self {
        self.emphasis = true;
        self
    }

    pub fn title(mut self, size_delta: i16) -> Self {
        self.title = true;
        self.size_delta = size_delta;
        self
    }
}

/// Drawable page item.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum DrawItem {
    /// Run of text drawn at the current pen position.
    Fragment { text: String, style: TextStyle },
    /// End of a line. Advances the pen by `height`.
    LineBreak { style: TextStyle, height: f32 },
    /// Vertical spacer without text.
    EmptyLine { height: f32 },
    /// Horizontal offset before the first fragment of a paragraph.
    LeadingIndent { width: f32 },
}

impl DrawItem {
    /// Height charged against the page budget.
    pub fn height(&self) -> f32 {
        match self {
            Self::LineBreak { height, .. } | Self::EmptyLine { height } => *height,
            Self::Fragment { .. } | Self::LeadingIndent { .. } => 0.0,
        }
    }

    /// Whether this item ends a line on the page.
    pub fn ends_line(&self) -> bool {
        matches!(self, Self::LineBreak { .. } | Self::EmptyLine { .. })
    }

    pub fn as_fragment(&self) -> Option<(&str, TextStyle)> {
        match self {
            Self::Fragment { text, style } => Some((text, *style)),
            _ => None,
        }
    }
}

/// Resumable reading position.
///
/// `item_index` points into the book's flat event sequence; `line_index`
/// counts lines already shown from the item at that index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadingInfo {
    pub item_index: usize,
    pub line_index: usize,
}

impl ReadingInfo {
    pub const START: Self = Self {
        item_index: 0,
        line_index: 0,
    };

    pub fn new(item_index: usize, line_index: usize) -> Self {
        Self {
            item_index,
            line_index,
        }
    }
}

impl fmt::Display for ReadingInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item={} line={}", self.item_index, self.line_index)
    }
}

/// Diagnostics collected while producing one page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageDiagnostics {
    /// Events that had no layout effect, once each, in first-seen order.
    pub ignored_tags: Vec<String>,
    pub elapsed: Duration,
}

impl PageDiagnostics {
    pub(crate) fn record_ignored(&mut self, name: String) {
        if !self.ignored_tags.contains(&name) {
            self.ignored_tags.push(name);
        }
    }
}

impl fmt::Display for PageDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Time: {:?}", self.elapsed)?;
        fb2_stream::write_ignored(f, &self.ignored_tags)
    }
}

/// One laid-out page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderPage {
    pub items: Vec<DrawItem>,
    pub diagnostics: PageDiagnostics,
    /// Cursor the page was laid out from.
    pub start: ReadingInfo,
}

impl RenderPage {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Concatenated fragment text in draw order.
    pub fn text(&self) -> String {
        self.items
            .iter()
            .filter_map(DrawItem::as_fragment)
            .map(|(text, _)| text)
            .collect()
    }

    /// Sum of the heights of every line-ending item.
    pub fn content_height(&self) -> f32 {
        self.items.iter().map(DrawItem::height).sum()
    }

    /// Number of line-ending items.
    pub fn line_count(&self) -> usize {
        self.items.iter().filter(|item| item.ends_line()).count()
    }

    /// Fragment and indent items grouped per visual line.
    ///
    /// A trailing line without a break is included.
    pub fn lines(&self) -> Vec<&[DrawItem]> {
        let mut lines = Vec::new();
        let mut start = 0usize;
        for (idx, item) in self.items.iter().enumerate() {
            if item.ends_line() {
                lines.push(&self.items[start..idx]);
                start = idx + 1;
            }
        }
        if start < self.items.len() {
            lines.push(&self.items[start..]);
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str) -> DrawItem {
        DrawItem::Fragment {
            text: text.to_string(),
            style: TextStyle::REGULAR,
        }
    }

    #[test]
    fn only_line_enders_carry_height() {
        assert_eq!(frag("abc").height(), 0.0);
        assert_eq!(DrawItem::LeadingIndent { width: 20.0 }.height(), 0.0);
        assert_eq!(DrawItem::EmptyLine { height: 10.0 }.height(), 10.0);
        assert_eq!(
            DrawItem::LineBreak {
                style: TextStyle::REGULAR,
                height: 20.0
            }
            .height(),
            20.0
        );
    }

    #[test]
    fn page_lines_split_on_breaks() {
        let page = RenderPage {
            items: vec![
                DrawItem::LeadingIndent { width: 20.0 },
                frag("aaa "),
                DrawItem::LineBreak {
                    style: TextStyle::REGULAR,
                    height: 20.0,
                },
                DrawItem::EmptyLine { height: 10.0 },
                frag("bbb"),
            ],
            ..RenderPage::default()
        };
        let lines = page.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 2);
        assert!(lines[1].is_empty());
        assert_eq!(lines[2], &[frag("bbb")]);
        assert_eq!(page.text(), "aaa bbb");
        assert_eq!(page.content_height(), 30.0);
        assert_eq!(page.line_count(), 2);
    }

    #[test]
    fn title_style_carries_size_delta() {
        let style = TextStyle::REGULAR.strong().title(4);
        assert!(style.strong && style.title && !style.emphasis);
        assert_eq!(style.size_delta, 4);
    }

    #[test]
    fn diagnostics_report_matches_load_report_layout() {
        let mut diag = PageDiagnostics {
            elapsed: Duration::from_millis(1),
            ..PageDiagnostics::default()
        };
        diag.record_ignored("section".to_string());
        diag.record_ignored("section".to_string());
        assert_eq!(diag.to_string(), "Time: 1ms\nIgnored tags:\n    section\n");
    }
}
