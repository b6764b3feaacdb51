use fb2_stream::{FlatEvent, NodeKind};

use crate::render_ir::TextStyle;

/// Default title size offset in px.
pub const DEFAULT_TITLE_SIZE_DELTA: i16 = 4;

/// Stack-less style state.
///
/// Both the open and the close tag of `strong`, `emphasis` and `title` flip
/// the matching flag. Nested same-kind containers therefore cancel out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StyleTracker {
    strong: bool,
    emphasis: bool,
    title: bool,
    title_size_delta: i16,
}

impl Default for StyleTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE_SIZE_DELTA)
    }
}

impl StyleTracker {
    pub fn new(title_size_delta: i16) -> Self {
        Self {
            strong: false,
            emphasis: false,
            title: false,
            title_size_delta,
        }
    }

    /// Toggle state for a styling tag. Returns `true` if the event was a
    /// styling tag.
    pub fn apply(&mut self, event: &FlatEvent) -> bool {
        let FlatEvent::Tag { kind, .. } = event else {
            return false;
        };
        match kind {
            NodeKind::Strong => self.strong = !self.strong,
            NodeKind::Emphasis => self.emphasis = !self.emphasis,
            NodeKind::Title => self.title = !self.title,
            _ => return false,
        }
        true
    }

    /// Fold a prefix of the event stream into the tracker.
    pub fn replay<'a, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = &'a FlatEvent>,
    {
        for event in events {
            self.apply(event);
        }
    }

    /// State after replaying `events` from a clean tracker.
    pub fn at(events: &[FlatEvent], title_size_delta: i16) -> Self {
        let mut tracker = Self::new(title_size_delta);
        tracker.replay(events);
        tracker
    }

    pub fn set_title_size_delta(&mut self, delta: i16) {
        self.title_size_delta = delta;
    }

    pub fn in_title(&self) -> bool {
        self.title
    }

    /// Style in effect for the next text event.
    pub fn current(&self) -> TextStyle {
        TextStyle {
            strong: self.strong,
            emphasis: self.emphasis,
            title: self.title,
            size_delta: if self.title { self.title_size_delta } else { 0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_close_both_toggle() {
        let mut tracker = StyleTracker::default();
        assert!(tracker.apply(&FlatEvent::open(NodeKind::Strong)));
        assert!(tracker.current().strong);
        assert!(tracker.apply(&FlatEvent::close(NodeKind::Strong)));
        assert!(!tracker.current().strong);
    }

    #[test]
    fn nested_same_kind_cancels() {
        let events = [
            FlatEvent::open(NodeKind::Emphasis),
            FlatEvent::open(NodeKind::Emphasis),
        ];
        assert!(!StyleTracker::at(&events, 4).current().emphasis);
    }

    #[test]
    fn structural_tags_do_not_touch_style() {
        let mut tracker = StyleTracker::default();
        assert!(!tracker.apply(&FlatEvent::open(NodeKind::Paragraph)));
        assert!(!tracker.apply(&FlatEvent::Text("x".to_string())));
        assert_eq!(tracker.current(), TextStyle::REGULAR);
    }

    #[test]
    fn title_adds_size_delta_only_while_active() {
        let mut tracker = StyleTracker::new(6);
        tracker.apply(&FlatEvent::open(NodeKind::Title));
        assert!(tracker.in_title());
        tracker.apply(&FlatEvent::open(NodeKind::Strong));
        assert_eq!(tracker.current(), TextStyle::REGULAR.strong().title(6));
        tracker.apply(&FlatEvent::close(NodeKind::Title));
        assert!(!tracker.in_title());
        assert_eq!(tracker.current(), TextStyle::REGULAR.strong());
    }
}
