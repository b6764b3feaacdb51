use crate::render_ir::DrawItem;

/// Collects drawable items for one page under a height budget.
///
/// Line numbering restarts at every [`start_new_item`](Self::start_new_item).
/// The item the page resumes in skips its first `resume_at_line` lines, which
/// were shown on earlier pages. Boundaries crossed before any item was offered
/// still belong to that item.
#[derive(Clone, Debug)]
pub struct PageAggregator {
    items: Vec<DrawItem>,
    resume_at_line: usize,
    max_height: f32,
    current_height: f32,
    current_line_index: usize,
    end_of_page: bool,
    /// Start of the line still being filled.
    line_start: usize,
    has_height_items: bool,
    offered: bool,
}

impl PageAggregator {
    pub fn new(resume_at_line: usize, max_height: f32) -> Self {
        Self {
            items: Vec::with_capacity(32),
            resume_at_line,
            max_height,
            current_height: 0.0,
            current_line_index: 0,
            end_of_page: false,
            line_start: 0,
            has_height_items: false,
            offered: false,
        }
    }

    /// Offer one item. Returns `false` once the page is full.
    ///
    /// On rejection the unfinished line is removed again so the next page
    /// starts with it intact.
    pub fn try_add(&mut self, item: DrawItem) -> bool {
        if self.end_of_page {
            return false;
        }
        self.offered = true;
        if self.current_line_index < self.resume_at_line {
            if matches!(item, DrawItem::LineBreak { .. }) {
                self.current_line_index += 1;
            }
            return true;
        }

        let height = item.height();
        if self.current_height + height > self.max_height {
            if self.has_height_items {
                self.end_of_page = true;
                self.items.truncate(self.line_start);
                return false;
            }
            log::warn!(
                "line height {} exceeds page height {}; placing it anyway",
                height,
                self.max_height
            );
        }

        let ends_line = item.ends_line();
        if matches!(item, DrawItem::LineBreak { .. }) {
            self.current_line_index += 1;
        }
        self.items.push(item);
        if ends_line {
            self.current_height += height;
            self.has_height_items = true;
            self.line_start = self.items.len();
        }
        true
    }

    /// Begin a new text-bearing item. Resets line numbering.
    pub fn start_new_item(&mut self) {
        self.current_line_index = 0;
        // Skipping only applies to the item the page resumed in.
        if self.offered {
            self.resume_at_line = 0;
        }
    }

    pub fn end_of_page(&self) -> bool {
        self.end_of_page
    }

    /// Line ordinal within the current item.
    pub fn current_line_index(&self) -> usize {
        self.current_line_index
    }

    pub fn items(&self) -> &[DrawItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn content_height(&self) -> f32 {
        self.current_height
    }

    pub fn into_items(self) -> Vec<DrawItem> {
        self.items
    }
}
