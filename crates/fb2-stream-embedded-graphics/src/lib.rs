//! embedded-graphics renderer for `fb2-stream-render` pages.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

use embedded_graphics::{
    mono_font::{
        ascii::{
            FONT_10X20, FONT_8X13, FONT_8X13_BOLD, FONT_8X13_ITALIC, FONT_9X18, FONT_9X18_BOLD,
        },
        MonoFont, MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use fb2_stream_render::{DrawItem, RenderPage, TextStyle};
use std::borrow::Cow;

/// Backend-local font identifier used for metrics and rasterization dispatch.
pub type FontId = u8;

/// Why style-to-font mapping had to fall back to another face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontFallbackReason {
    UnsupportedWeightItalic,
    UnknownFontId,
}

/// Resolved font selection for a text style.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FontSelection {
    pub font_id: FontId,
    pub fallback_reason: Option<FontFallbackReason>,
}

/// Backend-provided metrics for a specific font id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FontMetrics {
    /// Horizontal advance per glyph including spacing.
    pub char_width: i32,
    pub line_height: i32,
}

/// Font abstraction used by the measurer and the renderer.
pub trait FontBackend {
    fn resolve_font(&self, style: &TextStyle) -> FontSelection;
    fn metrics(&self, font_id: FontId) -> FontMetrics;
    fn draw_text_run<D>(
        &self,
        display: &mut D,
        font_id: FontId,
        text: &str,
        origin: Point,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = BinaryColor>;
}

/// `TextMeasurer` adapter backed by this crate's `FontBackend` metrics.
#[derive(Clone, Debug)]
pub struct EgTextMeasurer<B = MonoFontBackend> {
    backend: B,
}

impl EgTextMeasurer<MonoFontBackend> {
    /// Create a default measurer using the mono backend.
    pub fn new() -> Self {
        Self {
            backend: MonoFontBackend,
        }
    }
}

impl Default for EgTextMeasurer<MonoFontBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> EgTextMeasurer<B>
where
    B: FontBackend,
{
    /// Create a measurer using an explicit backend.
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    fn char_width(&self, style: &TextStyle) -> i32 {
        let selection = self.backend.resolve_font(style);
        self.backend.metrics(selection.font_id).char_width
    }
}

impl<B> fb2_stream_render::TextMeasurer for EgTextMeasurer<B>
where
    B: FontBackend + Send + Sync,
{
    fn measure_width(&self, text: &str, style: &TextStyle) -> f32 {
        let glyphs: usize = text.chars().map(mono_glyph_count).sum();
        (glyphs as i32 * self.char_width(style)).max(0) as f32
    }

    fn line_height(&self, style: &TextStyle) -> f32 {
        let selection = self.backend.resolve_font(style);
        self.backend.metrics(selection.font_id).line_height.max(0) as f32
    }

    fn fit_prefix(&self, text: &str, available: f32, style: &TextStyle) -> usize {
        if available.is_nan() || available < 0.0 {
            return 0;
        }
        let char_width = self.char_width(style).max(0) as f32;
        let mut used = 0.0f32;
        for (idx, ch) in text.char_indices() {
            used += mono_glyph_count(ch) as f32 * char_width;
            if used > available {
                return idx;
            }
        }
        text.len()
    }
}

/// Mono-font backend built on the embedded-graphics ASCII fonts.
///
/// Body text uses the 8x13 family; titles use the larger 10x20 / 9x18 faces.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonoFontBackend;

impl MonoFontBackend {
    const SIZE_BODY: FontId = 0;
    const SIZE_TITLE: FontId = 1;

    const VARIANT_REGULAR: FontId = 0;
    const VARIANT_ITALIC: FontId = 1;
    const VARIANT_BOLD: FontId = 2;
    const VARIANT_BOLD_ITALIC: FontId = 3;

    fn encode_font_id(size_bucket: FontId, variant: FontId) -> FontId {
        (size_bucket << 2) | (variant & 0x03)
    }

    fn decode_font_id(font_id: FontId) -> (FontId, FontId) {
        ((font_id >> 2) & 0x03, font_id & 0x03)
    }

    fn size_bucket_for(style: &TextStyle) -> FontId {
        if style.title || style.size_delta > 0 {
            Self::SIZE_TITLE
        } else {
            Self::SIZE_BODY
        }
    }

    fn style_variant_for(style: &TextStyle) -> FontId {
        match (style.strong, style.emphasis) {
            (true, true) => Self::VARIANT_BOLD_ITALIC,
            (true, false) => Self::VARIANT_BOLD,
            (false, true) => Self::VARIANT_ITALIC,
            (false, false) => Self::VARIANT_REGULAR,
        }
    }

    fn font_for(font_id: FontId) -> (&'static MonoFont<'static>, Option<FontFallbackReason>) {
        let (size_bucket, variant) = Self::decode_font_id(font_id);
        match (size_bucket, variant) {
            (Self::SIZE_BODY, Self::VARIANT_REGULAR) => (&FONT_8X13, None),
            (Self::SIZE_BODY, Self::VARIANT_ITALIC) => (&FONT_8X13_ITALIC, None),
            (Self::SIZE_BODY, Self::VARIANT_BOLD) => (&FONT_8X13_BOLD, None),
            (Self::SIZE_BODY, Self::VARIANT_BOLD_ITALIC) => (
                &FONT_8X13_BOLD,
                Some(FontFallbackReason::UnsupportedWeightItalic),
            ),
            (Self::SIZE_TITLE, Self::VARIANT_REGULAR) => (&FONT_10X20, None),
            (Self::SIZE_TITLE, Self::VARIANT_ITALIC) => (
                &FONT_9X18,
                Some(FontFallbackReason::UnsupportedWeightItalic),
            ),
            (Self::SIZE_TITLE, Self::VARIANT_BOLD) => (&FONT_9X18_BOLD, None),
            (Self::SIZE_TITLE, Self::VARIANT_BOLD_ITALIC) => (
                &FONT_9X18_BOLD,
                Some(FontFallbackReason::UnsupportedWeightItalic),
            ),
            _ => (&FONT_8X13, Some(FontFallbackReason::UnknownFontId)),
        }
    }

    fn style_for(font_id: FontId) -> MonoTextStyle<'static, BinaryColor> {
        let (font, _) = Self::font_for(font_id);
        MonoTextStyle::new(font, BinaryColor::On)
    }
}

impl FontBackend for MonoFontBackend {
    fn resolve_font(&self, style: &TextStyle) -> FontSelection {
        let font_id =
            Self::encode_font_id(Self::size_bucket_for(style), Self::style_variant_for(style));
        let (_, fallback_reason) = Self::font_for(font_id);
        FontSelection {
            font_id,
            fallback_reason,
        }
    }

    fn metrics(&self, font_id: FontId) -> FontMetrics {
        let (font, _) = Self::font_for(font_id);
        FontMetrics {
            char_width: (font.character_size.width + font.character_spacing) as i32,
            line_height: font.character_size.height as i32,
        }
    }

    fn draw_text_run<D>(
        &self,
        display: &mut D,
        font_id: FontId,
        text: &str,
        origin: Point,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        let style = Self::style_for(font_id);
        let normalized = normalize_text_for_mono(text);
        Text::with_baseline(normalized.as_ref(), origin, style, Baseline::Top).draw(display)?;
        let advance = style.font.character_size.width + style.font.character_spacing;
        Ok((normalized.chars().count() as i32) * advance as i32)
    }
}

/// Glyphs a char occupies once normalized for the ASCII mono fonts.
fn mono_glyph_count(ch: char) -> usize {
    if ch == '\u{2026}' {
        3
    } else {
        1
    }
}

fn normalize_text_for_mono(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|ch| {
        matches!(
            ch,
            '\u{00A0}' // nbsp
                | '\u{2013}' // en dash
                | '\u{2014}' // em dash
                | '\u{2018}' // left single quote
                | '\u{2019}' // right single quote
                | '\u{201C}' // left double quote
                | '\u{201D}' // right double quote
                | '\u{2026}' // ellipsis
        )
    }) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{00A0}' => out.push(' '),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2026}' => out.push_str("..."),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// embedded-graphics backend configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EgRenderConfig {
    /// Clear display before drawing page.
    pub clear_first: bool,
    pub margin_left: i32,
    pub margin_top: i32,
    pub margin_right: i32,
    /// Center lines made only of title text within the content width.
    pub center_titles: bool,
}

impl Default for EgRenderConfig {
    fn default() -> Self {
        Self {
            clear_first: true,
            margin_left: 0,
            margin_top: 0,
            margin_right: 0,
            center_titles: true,
        }
    }
}

impl EgRenderConfig {
    /// Config with uniform horizontal margins and a top margin.
    pub fn with_margins(mut self, horizontal: i32, top: i32) -> Self {
        self.margin_left = horizontal;
        self.margin_right = horizontal;
        self.margin_top = top;
        self
    }
}

/// Counters for one rendered page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EgRenderDiagnostics {
    pub fragments: usize,
    pub line_breaks: usize,
    pub empty_lines: usize,
    pub indents: usize,
    /// Items of a kind this renderer does not draw.
    pub unknown_items: usize,
    /// Fragments drawn with a substitute face.
    pub fallback_fonts: usize,
}

/// Drawable-item executor for embedded-graphics targets.
#[derive(Clone, Debug)]
pub struct EgRenderer<B = MonoFontBackend> {
    cfg: EgRenderConfig,
    backend: B,
}

impl Default for EgRenderer<MonoFontBackend> {
    fn default() -> Self {
        Self::new(EgRenderConfig::default())
    }
}

impl EgRenderer<MonoFontBackend> {
    pub fn new(cfg: EgRenderConfig) -> Self {
        Self {
            cfg,
            backend: MonoFontBackend,
        }
    }
}

impl<B> EgRenderer<B>
where
    B: FontBackend,
{
    /// Create renderer with config and backend.
    pub fn with_backend(cfg: EgRenderConfig, backend: B) -> Self {
        Self { cfg, backend }
    }

    pub fn config(&self) -> EgRenderConfig {
        self.cfg
    }

    /// Width available to one line on a display of `display_width` px.
    pub fn content_width(&self, display_width: u32) -> i32 {
        (display_width as i32 - self.cfg.margin_left - self.cfg.margin_right).max(0)
    }

    /// Render a page to a draw target.
    pub fn render_page<D>(
        &self,
        page: &RenderPage,
        display: &mut D,
    ) -> Result<EgRenderDiagnostics, D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        if self.cfg.clear_first {
            display.clear(BinaryColor::Off)?;
        }
        let content_width = self.content_width(display.bounding_box().size.width);
        let mut diag = EgRenderDiagnostics::default();
        let mut pen = Point::new(self.cfg.margin_left, self.cfg.margin_top);
        let mut line: Vec<&DrawItem> = Vec::with_capacity(8);

        for item in &page.items {
            match item {
                DrawItem::Fragment { .. } | DrawItem::LeadingIndent { .. } => line.push(item),
                DrawItem::LineBreak { height, .. } => {
                    self.draw_line(display, &line, &mut pen, content_width, &mut diag)?;
                    line.clear();
                    diag.line_breaks += 1;
                    pen.x = self.cfg.margin_left;
                    pen.y += height.round() as i32;
                }
                DrawItem::EmptyLine { height } => {
                    self.draw_line(display, &line, &mut pen, content_width, &mut diag)?;
                    line.clear();
                    diag.empty_lines += 1;
                    pen.y += height.round() as i32;
                }
                _ => diag.unknown_items += 1,
            }
        }
        self.draw_line(display, &line, &mut pen, content_width, &mut diag)?;

        if diag.unknown_items > 0 {
            log::warn!(
                "skipped {} drawable item(s) of unknown kind",
                diag.unknown_items
            );
        }
        Ok(diag)
    }

    fn draw_line<D>(
        &self,
        display: &mut D,
        line: &[&DrawItem],
        pen: &mut Point,
        content_width: i32,
        diag: &mut EgRenderDiagnostics,
    ) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        if line.is_empty() {
            return Ok(());
        }
        if self.cfg.center_titles && is_title_line(line) {
            let used = pen.x - self.cfg.margin_left + self.line_width(line);
            pen.x += ((content_width - used) / 2).max(0);
        }
        for item in line {
            match item {
                DrawItem::Fragment { text, style } => {
                    let selection = self.backend.resolve_font(style);
                    if selection.fallback_reason.is_some() {
                        diag.fallback_fonts += 1;
                    }
                    pen.x += self
                        .backend
                        .draw_text_run(display, selection.font_id, text, *pen)?;
                    diag.fragments += 1;
                }
                DrawItem::LeadingIndent { width } => {
                    pen.x += width.round() as i32;
                    diag.indents += 1;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn line_width(&self, line: &[&DrawItem]) -> i32 {
        line.iter()
            .map(|item| match item {
                DrawItem::Fragment { text, style } => {
                    let selection = self.backend.resolve_font(style);
                    let glyphs: usize = text.chars().map(mono_glyph_count).sum();
                    glyphs as i32 * self.backend.metrics(selection.font_id).char_width
                }
                DrawItem::LeadingIndent { width } => width.round() as i32,
                _ => 0,
            })
            .sum()
    }
}

fn is_title_line(line: &[&DrawItem]) -> bool {
    let mut fragments = line
        .iter()
        .filter_map(|item| item.as_fragment())
        .peekable();
    fragments.peek().is_some() && fragments.all(|(_, style)| style.title)
}
