use core::fmt;
use std::sync::Arc;

use crate::render_ir::{DrawItem, TextStyle};

/// Slack for accumulated float error when comparing widths.
const FIT_EPSILON: f32 = 1e-3;

/// Text measurement capability supplied by the rendering backend.
pub trait TextMeasurer: Send + Sync {
    /// Rendered width of `text` in `style`.
    fn measure_width(&self, text: &str, style: &TextStyle) -> f32;

    /// Vertical advance of one line in `style`.
    fn line_height(&self, style: &TextStyle) -> f32;

    /// Byte length of the longest prefix of `text` that fits in `available`.
    ///
    /// The result always falls on a char boundary. The default binary
    /// searches over `measure_width` and assumes widths grow with length.
    fn fit_prefix(&self, text: &str, available: f32, style: &TextStyle) -> usize {
        if text.is_empty() || available.is_nan() || available < 0.0 {
            return 0;
        }
        if self.measure_width(text, style) <= available + FIT_EPSILON {
            return text.len();
        }
        let ends: Vec<usize> = text.char_indices().skip(1).map(|(idx, _)| idx).collect();
        let (mut lo, mut hi) = (0usize, ends.len());
        while lo < hi {
            let mid = lo + (hi - lo).div_ceil(2);
            if self.measure_width(&text[..ends[mid - 1]], style) <= available + FIT_EPSILON {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        if lo == 0 {
            0
        } else {
            ends[lo - 1]
        }
    }
}

/// Deterministic measurer with one advance per character.
///
/// Strong text may use a wider advance; titles scale by their size delta.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedWidthMeasurer {
    /// Regular font size in px.
    pub font_size_px: f32,
    /// Advance per char as a fraction of the font size.
    pub advance_ratio: f32,
    /// Advance per char for strong text.
    pub strong_advance_ratio: f32,
    /// Line height as a fraction of the font size.
    pub line_height_ratio: f32,
}

impl Default for FixedWidthMeasurer {
    fn default() -> Self {
        Self {
            font_size_px: 20.0,
            advance_ratio: 0.5,
            strong_advance_ratio: 0.55,
            line_height_ratio: 1.0,
        }
    }
}

impl FixedWidthMeasurer {
    /// Uniform `advance_px` per char for every weight at `font_size_px`.
    ///
    /// Line height equals the font size.
    pub fn monospace(advance_px: f32, font_size_px: f32) -> Self {
        let ratio = if font_size_px > 0.0 {
            advance_px / font_size_px
        } else {
            0.0
        };
        Self {
            font_size_px,
            advance_ratio: ratio,
            strong_advance_ratio: ratio,
            line_height_ratio: 1.0,
        }
    }

    fn size_px(&self, style: &TextStyle) -> f32 {
        (self.font_size_px + f32::from(style.size_delta)).max(0.0)
    }

    /// Advance of one char in `style`.
    pub fn advance_px(&self, style: &TextStyle) -> f32 {
        let ratio = if style.strong {
            self.strong_advance_ratio
        } else {
            self.advance_ratio
        };
        self.size_px(style) * ratio
    }
}

impl TextMeasurer for FixedWidthMeasurer {
    fn measure_width(&self, text: &str, style: &TextStyle) -> f32 {
        text.chars().count() as f32 * self.advance_px(style)
    }

    fn line_height(&self, style: &TextStyle) -> f32 {
        self.size_px(style) * self.line_height_ratio
    }

    fn fit_prefix(&self, text: &str, available: f32, style: &TextStyle) -> usize {
        if available.is_nan() || available < 0.0 {
            return 0;
        }
        let advance = self.advance_px(style);
        if advance <= 0.0 {
            return text.len();
        }
        let max_chars = ((available + FIT_EPSILON) / advance).floor() as usize;
        text.char_indices()
            .nth(max_chars)
            .map_or(text.len(), |(idx, _)| idx)
    }
}

/// Line-breaking failure.
#[derive(Clone, Debug, PartialEq)]
pub enum LayoutError {
    /// A glyph that must be placed on an empty line has no usable width.
    UnmeasurableGlyph { ch: char, width: f32 },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnmeasurableGlyph { ch, width } => {
                write!(f, "glyph {:?} measured to unusable width {}", ch, width)
            }
        }
    }
}

impl std::error::Error for LayoutError {}

/// Greedy line breaker carrying line state across text runs of a page.
pub struct LineBreaker {
    measurer: Arc<dyn TextMeasurer>,
    paragraph_first_line_indent: f32,
    consumed_width: f32,
    first_on_line: bool,
    paragraph_start: bool,
}

impl fmt::Debug for LineBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineBreaker")
            .field("paragraph_first_line_indent", &self.paragraph_first_line_indent)
            .field("consumed_width", &self.consumed_width)
            .field("first_on_line", &self.first_on_line)
            .field("paragraph_start", &self.paragraph_start)
            .finish_non_exhaustive()
    }
}

impl LineBreaker {
    pub fn new(measurer: Arc<dyn TextMeasurer>, paragraph_first_line_indent: f32) -> Self {
        Self {
            measurer,
            paragraph_first_line_indent,
            consumed_width: 0.0,
            first_on_line: true,
            paragraph_start: false,
        }
    }

    /// Reset to an empty line.
    pub fn start_new_line(&mut self, paragraph_start: bool) {
        self.paragraph_start = paragraph_start;
        self.consumed_width = 0.0;
        self.first_on_line = true;
    }

    pub fn consumed_width(&self) -> f32 {
        self.consumed_width
    }

    pub fn is_first_on_line(&self) -> bool {
        self.first_on_line
    }

    pub fn is_paragraph_start(&self) -> bool {
        self.paragraph_start
    }

    /// Line break item for `style`.
    pub fn line_break(&self, style: TextStyle) -> DrawItem {
        DrawItem::LineBreak {
            style,
            height: self.measurer.line_height(&style),
        }
    }

    /// Lazily wrap one text run into fragments and line breaks.
    ///
    /// Dropping the iterator early leaves the breaker mid-run; callers start
    /// a fresh breaker for the next page.
    pub fn wrap<'a>(&'a mut self, text: &'a str, style: TextStyle, max_width: f32) -> Wrap<'a> {
        let mut pending = None;
        if self.paragraph_start
            && !text.is_empty()
            && self.paragraph_first_line_indent != 0.0
            && !style.title
        {
            pending = Some(DrawItem::LeadingIndent {
                width: self.paragraph_first_line_indent,
            });
            self.consumed_width = self.paragraph_first_line_indent;
            self.paragraph_start = false;
        }
        Wrap {
            breaker: self,
            text,
            pos: 0,
            style,
            max_width,
            pending,
            done: false,
        }
    }
}

/// Pull iterator over the items of one wrapped run.
pub struct Wrap<'a> {
    breaker: &'a mut LineBreaker,
    text: &'a str,
    pos: usize,
    style: TextStyle,
    max_width: f32,
    pending: Option<DrawItem>,
    done: bool,
}

impl<'a> Wrap<'a> {
    fn fragment(&self, text: &str) -> DrawItem {
        DrawItem::Fragment {
            text: text.to_string(),
            style: self.style,
        }
    }

    fn break_line(&mut self) -> DrawItem {
        let item = self.breaker.line_break(self.style);
        self.breaker.start_new_line(false);
        item
    }

    fn step(&mut self) -> Option<Result<DrawItem, LayoutError>> {
        let text: &'a str = self.text;
        if self.breaker.first_on_line {
            let rest = &text[self.pos..];
            self.pos += rest.len() - rest.trim_start_matches(' ').len();
        }
        let remaining = &text[self.pos..];
        if remaining.is_empty() {
            return None;
        }

        let available = self.max_width - self.breaker.consumed_width;
        let mut fit = self
            .breaker
            .measurer
            .fit_prefix(remaining, available, &self.style);

        if fit == 0 {
            if !(self.breaker.first_on_line && self.breaker.consumed_width <= 0.0) {
                return Some(Ok(self.break_line()));
            }
            // Empty line and not even one glyph fits: place one anyway.
            let ch = remaining.chars().next()?;
            let width = self
                .breaker
                .measurer
                .measure_width(&remaining[..ch.len_utf8()], &self.style);
            if !width.is_finite() || width <= 0.0 {
                return Some(Err(LayoutError::UnmeasurableGlyph { ch, width }));
            }
            fit = ch.len_utf8();
        }

        if fit >= remaining.len() {
            let width = self.breaker.measurer.measure_width(remaining, &self.style);
            self.breaker.first_on_line = false;
            self.breaker.consumed_width += width;
            self.pos = text.len();
            return Some(Ok(self.fragment(remaining)));
        }

        let mut cut = if remaining[fit..].starts_with(' ') {
            fit
        } else {
            remaining[..fit].rfind(' ').map_or(0, |idx| idx + 1)
        };
        if cut <= 1 {
            if self.breaker.first_on_line {
                cut = fit;
            } else {
                return Some(Ok(self.break_line()));
            }
        }

        let item = self.fragment(&remaining[..cut]);
        self.pos += cut;
        self.pending = Some(self.break_line());
        Some(Ok(item))
    }
}

impl Iterator for Wrap<'_> {
    type Item = Result<DrawItem, LayoutError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(item) = self.pending.take() {
            return Some(Ok(item));
        }
        if self.done {
            return None;
        }
        let next = self.step();
        match next {
            None | Some(Err(_)) => self.done = true,
            Some(Ok(_)) => {}
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAR_PX: f32 = 10.0;

    fn measurer() -> Arc<dyn TextMeasurer> {
        Arc::new(FixedWidthMeasurer::monospace(CHAR_PX, 20.0))
    }

    fn width_of(text: &str) -> f32 {
        text.chars().count() as f32 * CHAR_PX
    }

    #[derive(Debug, PartialEq)]
    enum Tok {
        F(String),
        Lb,
        Indent(f32),
    }

    fn run(breaker: &mut LineBreaker, runs: &[&str], max_width: f32) -> Vec<Tok> {
        let mut out = Vec::new();
        for text in runs {
            for item in breaker.wrap(text, TextStyle::REGULAR, max_width) {
                out.push(match item.expect("layout") {
                    DrawItem::Fragment { text, .. } => Tok::F(text),
                    DrawItem::LineBreak { .. } => Tok::Lb,
                    DrawItem::LeadingIndent { width } => Tok::Indent(width),
                    other => panic!("unexpected item {:?}", other),
                });
            }
        }
        out
    }

    fn f(text: &str) -> Tok {
        Tok::F(text.to_string())
    }

    fn fresh(indent: f32) -> LineBreaker {
        let mut breaker = LineBreaker::new(measurer(), indent);
        breaker.start_new_line(true);
        breaker
    }

    #[test]
    fn long_word_is_hard_split() {
        let out = run(&mut fresh(0.0), &["aaabbb"], width_of("aaa"));
        assert_eq!(out, vec![f("aaa"), Tok::Lb, f("bbb")]);
    }

    #[test]
    fn leading_space_collapses_at_line_start() {
        let out = run(&mut fresh(0.0), &["aaa", " bbb", " ccc"], width_of("aaa bbb"));
        assert_eq!(out, vec![f("aaa"), f(" bbb"), Tok::Lb, f("ccc")]);
    }

    #[test]
    fn paragraph_start_gets_indent_once() {
        let out = run(&mut fresh(20.0), &["aaa bbb ccc"], width_of("aaa bbb"));
        assert_eq!(out, vec![Tok::Indent(20.0), f("aaa "), Tok::Lb, f("bbb ccc")]);
    }

    #[test]
    fn indent_is_not_repeated_for_later_runs() {
        let out = run(&mut fresh(20.0), &["aa", "bb"], 1000.0);
        assert_eq!(out, vec![Tok::Indent(20.0), f("aa"), f("bb")]);
    }

    #[test]
    fn title_text_is_not_indented() {
        let mut breaker = fresh(20.0);
        let items: Vec<_> = breaker
            .wrap("abc", TextStyle::REGULAR.title(0), 1000.0)
            .collect::<Result<_, _>>()
            .expect("layout");
        assert_eq!(items.len(), 1);
        assert!(breaker.is_paragraph_start());
    }

    #[test]
    fn break_falls_on_space_at_fit_boundary() {
        let out = run(&mut fresh(0.0), &["aaa bbb ccc"], width_of("aaa "));
        assert_eq!(
            out,
            vec![f("aaa "), Tok::Lb, f("bbb "), Tok::Lb, f("ccc")]
        );
    }

    #[test]
    fn space_just_past_fit_is_consumed_by_next_line() {
        let out = run(&mut fresh(0.0), &["aaa bbb ccc"], width_of("aaa"));
        assert_eq!(out, vec![f("aaa"), Tok::Lb, f("bbb"), Tok::Lb, f("ccc")]);
    }

    #[test]
    fn continuation_run_breaks_at_last_space() {
        let out = run(&mut fresh(0.0), &["aaa bbb", " ccc ddd"], CHAR_PX * 11.0);
        assert_eq!(out, vec![f("aaa bbb"), f(" ccc"), Tok::Lb, f("ddd")]);
    }

    #[test]
    fn word_that_does_not_fit_after_others_moves_to_next_line() {
        let expected = vec![f("zzz "), Tok::Lb, f("aaabbb")];
        let out = run(&mut fresh(0.0), &["zzz aaabbb"], CHAR_PX * 7.0);
        assert_eq!(out, expected);
        let out = run(&mut fresh(0.0), &["zzz ", "aaabbb"], CHAR_PX * 7.0);
        assert_eq!(out, expected);
    }

    #[test]
    fn narrow_line_still_makes_progress() {
        let out = run(&mut fresh(0.0), &["ab"], 1.0);
        assert_eq!(out, vec![f("a"), Tok::Lb, f("b")]);
    }

    #[test]
    fn indent_wider_than_line_pushes_text_down() {
        let out = run(&mut fresh(50.0), &["ab"], 40.0);
        assert_eq!(out, vec![Tok::Indent(50.0), Tok::Lb, f("ab")]);
    }

    #[test]
    fn fragments_never_exceed_line_width() {
        let max = CHAR_PX * 9.0;
        let mut breaker = fresh(20.0);
        let mut line = 0.0;
        let text = "the quick brown fox jumps over the extraordinarily lazy dog";
        for item in breaker.wrap(text, TextStyle::REGULAR, max) {
            match item.expect("layout") {
                DrawItem::Fragment { text, .. } => line += width_of(&text),
                DrawItem::LeadingIndent { width } => line += width,
                DrawItem::LineBreak { .. } => line = 0.0,
                _ => {}
            }
            assert!(line <= max, "line width {} exceeds {}", line, max);
        }
    }

    struct NanMeasurer;

    impl TextMeasurer for NanMeasurer {
        fn measure_width(&self, _text: &str, _style: &TextStyle) -> f32 {
            f32::NAN
        }

        fn line_height(&self, _style: &TextStyle) -> f32 {
            20.0
        }
    }

    #[test]
    fn unmeasurable_glyph_is_reported() {
        let mut breaker = LineBreaker::new(Arc::new(NanMeasurer), 0.0);
        let items: Vec<_> = breaker.wrap("x", TextStyle::REGULAR, 100.0).collect();
        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0],
            Err(LayoutError::UnmeasurableGlyph { ch: 'x', .. })
        ));
    }

    struct ZeroWidthMeasurer;

    impl TextMeasurer for ZeroWidthMeasurer {
        fn measure_width(&self, _text: &str, _style: &TextStyle) -> f32 {
            0.0
        }

        fn line_height(&self, _style: &TextStyle) -> f32 {
            20.0
        }

        fn fit_prefix(&self, _text: &str, _available: f32, _style: &TextStyle) -> usize {
            0
        }
    }

    #[test]
    fn zero_width_glyph_is_not_force_placed() {
        let mut breaker = LineBreaker::new(Arc::new(ZeroWidthMeasurer), 0.0);
        let items: Vec<_> = breaker.wrap("y", TextStyle::REGULAR, 100.0).collect();
        assert_eq!(
            items,
            vec![Err(LayoutError::UnmeasurableGlyph { ch: 'y', width: 0.0 })]
        );
    }

    #[test]
    fn consumed_width_tracks_indent_and_fragments() {
        let mut breaker = fresh(20.0);
        assert_eq!(breaker.consumed_width(), 0.0);
        let out = run(&mut breaker, &["ab"], 1000.0);
        assert_eq!(out, vec![Tok::Indent(20.0), f("ab")]);
        assert_eq!(breaker.consumed_width(), 20.0 + width_of("ab"));
        breaker.start_new_line(false);
        assert_eq!(breaker.consumed_width(), 0.0);
    }

    struct ProportionalMeasurer;

    impl TextMeasurer for ProportionalMeasurer {
        fn measure_width(&self, text: &str, _style: &TextStyle) -> f32 {
            text.chars().map(|ch| if ch == 'w' { 15.0 } else { 5.0 }).sum()
        }

        fn line_height(&self, _style: &TextStyle) -> f32 {
            10.0
        }
    }

    #[test]
    fn default_fit_prefix_binary_searches_char_boundaries() {
        let m = ProportionalMeasurer;
        let style = TextStyle::REGULAR;
        assert_eq!(m.fit_prefix("wwiii", 30.0, &style), 2);
        assert_eq!(m.fit_prefix("wwiii", 34.0, &style), 2);
        assert_eq!(m.fit_prefix("wwiii", 35.0, &style), 3);
        assert_eq!(m.fit_prefix("wwiii", 100.0, &style), 5);
        assert_eq!(m.fit_prefix("w", 1.0, &style), 0);
        assert_eq!(m.fit_prefix("éé", 5.0, &style), 2);
    }

    #[test]
    fn strong_text_measures_wider_by_default() {
        let m = FixedWidthMeasurer::default();
        let regular = m.measure_width("abcd", &TextStyle::REGULAR);
        let strong = m.measure_width("abcd", &TextStyle::REGULAR.strong());
        assert!(strong > regular);
        assert_eq!(m.line_height(&TextStyle::REGULAR.title(4)), 24.0);
    }
}
