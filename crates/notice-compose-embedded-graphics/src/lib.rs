//! embedded-graphics rasterizer for `notice-compose-render` pages.

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

use core::convert::Infallible;
use std::borrow::Cow;
use std::sync::Arc;

use embedded_graphics::{
    mono_font::{
        ascii::{
            FONT_6X13, FONT_6X13_BOLD, FONT_6X13_ITALIC, FONT_7X13, FONT_7X13_BOLD,
            FONT_7X13_ITALIC, FONT_8X13, FONT_8X13_BOLD, FONT_8X13_ITALIC, FONT_9X18,
            FONT_9X18_BOLD,
        },
        MonoFont, MonoTextStyle,
    },
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};
use notice_compose::{
    Background, DocumentSnapshot, RasterDiagnostics, RasterError, RasterImage, Rasterizer, Rgb,
};
use notice_compose_render::{
    ComposedPage, DrawCommand, ImageObjectCommand, LayoutEngine, PageAnnotationKind, RectCommand,
    ResolvedTextStyle, RuleCommand, TextCommand, TextMeasurer,
};

/// Backend-local font identifier used for metrics and rasterization dispatch.
pub type FontId = u8;

/// Why style-to-font mapping had to fall back to a substitute face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontFallbackReason {
    UnknownFontId,
    UnsupportedWeightItalic,
    /// Text contained characters outside the font's ASCII repertoire.
    MissingGlyphs,
}

/// Resolved font selection for a text style.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FontSelection {
    pub font_id: FontId,
    pub fallback_reason: Option<FontFallbackReason>,
}

/// Backend-provided metrics for a specific font id, scale included.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FontMetrics {
    pub char_width: i32,
    pub glyph_height: i32,
    /// Integer upscale applied to the bitmap glyphs.
    pub scale: u32,
}

/// Font abstraction used by the rasterizer's text paths.
pub trait FontBackend {
    fn resolve_font(&self, style: &ResolvedTextStyle) -> FontSelection;
    fn metrics(&self, font_id: FontId) -> FontMetrics;
    /// Draws `text` with its baseline at `origin` and returns the advance.
    fn draw_text_run<D>(
        &self,
        display: &mut D,
        font_id: FontId,
        text: &str,
        origin: Point,
        color: Rgb888,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = Rgb888>;
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

    /// Create a shared measurer trait object for layout wiring.
    pub fn shared() -> Arc<dyn TextMeasurer> {
        Arc::new(Self::new())
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
}

/// Attach backend-consistent text measurement to a layout engine, so line
/// breaks match the glyphs this crate draws.
pub fn with_embedded_text_measurer(engine: LayoutEngine) -> LayoutEngine {
    engine.with_text_measurer(EgTextMeasurer::shared())
}

impl<B> TextMeasurer for EgTextMeasurer<B>
where
    B: FontBackend + Send + Sync,
{
    fn measure_text_px(&self, text: &str, style: &ResolvedTextStyle) -> f32 {
        let selection = self.backend.resolve_font(style);
        let metrics = self.backend.metrics(selection.font_id);
        let chars = normalize_text_for_mono(text).chars().count() as i32;
        (chars * metrics.char_width) as f32
    }
}

/// Mono-font backend over the embedded-graphics ASCII fonts.
///
/// Sizes above the largest bitmap face are drawn with integer upscaling.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonoFontBackend;

impl MonoFontBackend {
    const SIZE_13: FontId = 0;
    const SIZE_14: FontId = 1;
    const SIZE_16: FontId = 2;
    const SIZE_20: FontId = 3;
    const SIZE_24: FontId = 4;
    const SIZE_28: FontId = 5;

    const VARIANT_REGULAR: FontId = 0;
    const VARIANT_ITALIC: FontId = 1;
    const VARIANT_BOLD: FontId = 2;
    const VARIANT_BOLD_ITALIC: FontId = 3;

    fn encode_font_id(size_bucket: FontId, variant: FontId) -> FontId {
        (size_bucket << 2) | (variant & 0x03)
    }

    fn decode_font_id(font_id: FontId) -> (FontId, FontId) {
        (font_id >> 2, font_id & 0x03)
    }

    fn size_bucket_for(style: &ResolvedTextStyle) -> FontId {
        if style.size_px >= 28.0 {
            Self::SIZE_28
        } else if style.size_px >= 24.0 {
            Self::SIZE_24
        } else if style.size_px >= 20.0 {
            Self::SIZE_20
        } else if style.size_px >= 16.0 {
            Self::SIZE_16
        } else if style.size_px >= 14.0 {
            Self::SIZE_14
        } else {
            Self::SIZE_13
        }
    }

    fn style_variant_for(style: &ResolvedTextStyle) -> FontId {
        if style.is_bold() && style.italic {
            Self::VARIANT_BOLD_ITALIC
        } else if style.is_bold() {
            Self::VARIANT_BOLD
        } else if style.italic {
            Self::VARIANT_ITALIC
        } else {
            Self::VARIANT_REGULAR
        }
    }

    fn family_for(
        regular: &'static MonoFont<'static>,
        italic: &'static MonoFont<'static>,
        bold: &'static MonoFont<'static>,
        variant: FontId,
    ) -> (&'static MonoFont<'static>, Option<FontFallbackReason>) {
        match variant {
            Self::VARIANT_ITALIC => (italic, None),
            Self::VARIANT_BOLD => (bold, None),
            Self::VARIANT_BOLD_ITALIC => (bold, Some(FontFallbackReason::UnsupportedWeightItalic)),
            _ => (regular, None),
        }
    }

    fn font_for(font_id: FontId) -> (&'static MonoFont<'static>, u32, Option<FontFallbackReason>) {
        let (size_bucket, variant) = Self::decode_font_id(font_id);
        match size_bucket {
            Self::SIZE_13 | Self::SIZE_24 => {
                let (font, reason) =
                    Self::family_for(&FONT_6X13, &FONT_6X13_ITALIC, &FONT_6X13_BOLD, variant);
                let scale = if size_bucket == Self::SIZE_24 { 2 } else { 1 };
                (font, scale, reason)
            }
            Self::SIZE_14 | Self::SIZE_28 => {
                let (font, reason) =
                    Self::family_for(&FONT_7X13, &FONT_7X13_ITALIC, &FONT_7X13_BOLD, variant);
                let scale = if size_bucket == Self::SIZE_28 { 2 } else { 1 };
                (font, scale, reason)
            }
            Self::SIZE_16 => {
                let (font, reason) =
                    Self::family_for(&FONT_8X13, &FONT_8X13_ITALIC, &FONT_8X13_BOLD, variant);
                (font, 1, reason)
            }
            Self::SIZE_20 => match variant {
                Self::VARIANT_REGULAR => (&FONT_9X18, 1, None),
                Self::VARIANT_BOLD => (&FONT_9X18_BOLD, 1, None),
                Self::VARIANT_ITALIC => (
                    &FONT_9X18,
                    1,
                    Some(FontFallbackReason::UnsupportedWeightItalic),
                ),
                _ => (
                    &FONT_9X18_BOLD,
                    1,
                    Some(FontFallbackReason::UnsupportedWeightItalic),
                ),
            },
            _ => (&FONT_8X13, 1, Some(FontFallbackReason::UnknownFontId)),
        }
    }
}

impl FontBackend for MonoFontBackend {
    fn resolve_font(&self, style: &ResolvedTextStyle) -> FontSelection {
        let font_id =
            Self::encode_font_id(Self::size_bucket_for(style), Self::style_variant_for(style));
        let (_, _, fallback_reason) = Self::font_for(font_id);
        FontSelection {
            font_id,
            fallback_reason,
        }
    }

    fn metrics(&self, font_id: FontId) -> FontMetrics {
        let (font, scale, _) = Self::font_for(font_id);
        FontMetrics {
            char_width: (font.character_size.width * scale) as i32,
            glyph_height: (font.character_size.height * scale) as i32,
            scale,
        }
    }

    fn draw_text_run<D>(
        &self,
        display: &mut D,
        font_id: FontId,
        text: &str,
        origin: Point,
        color: Rgb888,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        let (font, scale, _) = Self::font_for(font_id);
        let style = MonoTextStyle::new(font, color);
        let normalized = normalize_text_for_mono(text);
        if scale > 1 {
            let mut scaled = ScaledTarget::new(display, origin, scale as i32);
            Text::with_baseline(normalized.as_ref(), origin, style, Baseline::Alphabetic)
                .draw(&mut scaled)?;
        } else {
            Text::with_baseline(normalized.as_ref(), origin, style, Baseline::Alphabetic)
                .draw(display)?;
        }
        Ok(normalized.chars().count() as i32 * (font.character_size.width * scale) as i32)
    }
}

/// Draw-target adapter that blows every pixel up into a `scale`x`scale`
/// block, anchored at `origin`.
struct ScaledTarget<'a, D> {
    inner: &'a mut D,
    origin: Point,
    scale: i32,
}

impl<'a, D> ScaledTarget<'a, D> {
    fn new(inner: &'a mut D, origin: Point, scale: i32) -> Self {
        Self {
            inner,
            origin,
            scale: scale.max(1),
        }
    }
}

impl<D> Dimensions for ScaledTarget<'_, D>
where
    D: DrawTarget,
{
    fn bounding_box(&self) -> Rectangle {
        self.inner.bounding_box()
    }
}

impl<D> DrawTarget for ScaledTarget<'_, D>
where
    D: DrawTarget,
{
    type Color = D::Color;
    type Error = D::Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (origin, scale) = (self.origin, self.scale);
        self.inner
            .draw_iter(pixels.into_iter().flat_map(move |Pixel(point, color)| {
                let base = origin + (point - origin) * scale;
                (0..scale * scale)
                    .map(move |idx| Pixel(base + Point::new(idx % scale, idx / scale), color))
            }))
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

fn to_rgb888(color: Rgb) -> Rgb888 {
    Rgb888::new(color.r, color.g, color.b)
}

/// RGBA surface that embedded-graphics primitives draw onto.
///
/// Starts fully transparent; primitives paint opaque pixels, images are
/// alpha-blended.
#[derive(Clone, Debug)]
pub struct RgbaCanvas {
    pixels: RgbaImage,
}

impl RgbaCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixels.get_pixel_checked(x, y).map(|px| px.0)
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    /// Paint the background over the whole surface.
    pub fn fill_background(&mut self, background: &Background) {
        let (w, h) = (self.width() as f32, self.height() as f32);
        if let Background::Solid(color) = background {
            let px = Rgba([color.r, color.g, color.b, 0xff]);
            self.pixels.pixels_mut().for_each(|p| *p = px);
            return;
        }
        for (x, y, p) in self.pixels.enumerate_pixels_mut() {
            let color = background.color_at(x as f32 + 0.5, y as f32 + 0.5, w, h);
            *p = Rgba([color.r, color.g, color.b, 0xff]);
        }
    }

    /// Source-over blend of `src` with its top-left corner at `(x, y)`.
    pub fn blend_image(&mut self, src: &RgbaImage, x: i32, y: i32) {
        for (sx, sy, px) in src.enumerate_pixels() {
            let (dx, dy) = (x + sx as i32, y + sy as i32);
            if dx < 0 || dy < 0 {
                continue;
            }
            if let Some(dst) = self.pixels.get_pixel_mut_checked(dx as u32, dy as u32) {
                *dst = blend_over(*px, *dst);
            }
        }
    }

    /// Encode the surface as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, RasterError> {
        let mut out = Vec::new();
        image::codecs::png::PngEncoder::new(&mut out)
            .write_image(
                self.pixels.as_raw(),
                self.width(),
                self.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|err| RasterError::Encode(err.to_string()))?;
        Ok(out)
    }
}

impl OriginDimensions for RgbaCanvas {
    fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }
}

impl DrawTarget for RgbaCanvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            if let Some(px) = self
                .pixels
                .get_pixel_mut_checked(point.x as u32, point.y as u32)
            {
                *px = Rgba([color.r(), color.g(), color.b(), 0xff]);
            }
        }
        Ok(())
    }
}

fn blend_over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src.0[3] as f32 / 255.0;
    if sa <= 0.0 {
        return dst;
    }
    if sa >= 1.0 {
        return src;
    }
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let channel = |s: u8, d: u8| {
        let v = (s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(src.0[0], dst.0[0]),
        channel(src.0[1], dst.0[1]),
        channel(src.0[2], dst.0[2]),
        (out_a * 255.0).round() as u8,
    ])
}

/// Multiply alpha by the coverage of a rounded rectangle of radius `radius`.
fn round_corners(img: &mut RgbaImage, radius: u32) {
    let (w, h) = (img.width() as f32, img.height() as f32);
    let r = (radius as f32).min(w / 2.0).min(h / 2.0);
    if r <= 0.0 {
        return;
    }
    for (x, y, px) in img.enumerate_pixels_mut() {
        let (cx, cy) = (x as f32 + 0.5, y as f32 + 0.5);
        let nx = if cx < r {
            r
        } else if cx > w - r {
            w - r
        } else {
            continue;
        };
        let ny = if cy < r {
            r
        } else if cy > h - r {
            h - r
        } else {
            continue;
        };
        let dist = ((cx - nx).powi(2) + (cy - ny).powi(2)).sqrt();
        let coverage = (r - dist + 0.5).clamp(0.0, 1.0);
        px.0[3] = (px.0[3] as f32 * coverage).round() as u8;
    }
}

/// Rasterizer settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EgRasterConfig {
    /// Outline color for images whose bitmap cannot be decoded.
    pub placeholder_color: Rgb,
    /// Resampling filter used to scale decoded images.
    pub image_filter: FilterType,
}

impl Default for EgRasterConfig {
    fn default() -> Self {
        Self {
            placeholder_color: Rgb::new(0xd1, 0xd5, 0xdb),
            image_filter: FilterType::Triangle,
        }
    }
}

impl EgRasterConfig {
    pub fn with_placeholder_color(mut self, color: Rgb) -> Self {
        self.placeholder_color = color;
        self
    }

    pub fn with_image_filter(mut self, filter: FilterType) -> Self {
        self.image_filter = filter;
        self
    }
}

/// [`Rasterizer`] that lays a snapshot out and paints it with
/// embedded-graphics primitives onto an RGBA surface.
#[derive(Clone, Debug)]
pub struct EgRasterizer<B = MonoFontBackend> {
    cfg: EgRasterConfig,
    backend: B,
    layout: LayoutEngine,
}

impl Default for EgRasterizer<MonoFontBackend> {
    fn default() -> Self {
        Self::new(EgRasterConfig::default())
    }
}

impl EgRasterizer<MonoFontBackend> {
    pub fn new(cfg: EgRasterConfig) -> Self {
        Self {
            cfg,
            backend: MonoFontBackend,
            layout: with_embedded_text_measurer(LayoutEngine::default()),
        }
    }
}

impl<B> EgRasterizer<B>
where
    B: FontBackend,
{
    /// Create rasterizer with config, backend, and the layout engine used
    /// to place content.
    pub fn with_backend(cfg: EgRasterConfig, backend: B, layout: LayoutEngine) -> Self {
        Self {
            cfg,
            backend,
            layout,
        }
    }

    pub fn config(&self) -> &EgRasterConfig {
        &self.cfg
    }

    /// Layout engine measuring with this backend's metrics. Hand a clone to
    /// the compositor so overflow checks agree with the export.
    pub fn layout_engine(&self) -> &LayoutEngine {
        &self.layout
    }

    /// Draw a composed page onto `canvas`, collecting diagnostics.
    ///
    /// Drawing is clipped to the page's layout box. Images whose header
    /// failed to decode have no box and are counted as decode warnings.
    pub fn render_page(
        &self,
        page: &ComposedPage,
        canvas: &mut RgbaCanvas,
        diagnostics: &mut RasterDiagnostics,
    ) -> Result<(), Infallible> {
        let clip = Rectangle::new(Point::zero(), Size::new(page.width, page.height));
        for cmd in &page.content_commands {
            match cmd {
                DrawCommand::Text(text) => {
                    self.draw_text(&mut canvas.clipped(&clip), text, diagnostics)?;
                }
                DrawCommand::Rule(rule) => self.draw_rule(&mut canvas.clipped(&clip), rule)?,
                DrawCommand::Rect(rect) => self.draw_rect(&mut canvas.clipped(&clip), rect)?,
                DrawCommand::ImageObject(image) => {
                    self.draw_image(canvas, &clip, image, diagnostics)?
                }
            }
        }
        for annotation in &page.annotations {
            if annotation.kind == PageAnnotationKind::ImageFailed {
                log::warn!(
                    "{}: image header could not be decoded, skipping",
                    annotation.value.as_deref().unwrap_or("image")
                );
                diagnostics.decode_warnings += 1;
            }
        }
        Ok(())
    }

    fn draw_text<D>(
        &self,
        display: &mut D,
        cmd: &TextCommand,
        diagnostics: &mut RasterDiagnostics,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        let selection = self.backend.resolve_font(&cmd.style);
        let reason = selection.fallback_reason.or_else(|| {
            normalize_text_for_mono(&cmd.text)
                .chars()
                .any(|ch| !ch.is_ascii())
                .then_some(FontFallbackReason::MissingGlyphs)
        });
        if let Some(reason) = reason {
            log::debug!("text fallback {reason:?} for {:?}", cmd.text);
            diagnostics.text_fallbacks += 1;
        }
        // The center offset is already part of `x`.
        self.backend.draw_text_run(
            display,
            selection.font_id,
            &cmd.text,
            Point::new(cmd.x, cmd.baseline_y),
            to_rgb888(cmd.style.color),
        )
    }

    fn draw_rule<D>(&self, display: &mut D, rule: &RuleCommand) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        let style = PrimitiveStyle::with_stroke(to_rgb888(rule.color), rule.thickness);
        let end = if rule.horizontal {
            Point::new(rule.x + rule.length as i32 - 1, rule.y)
        } else {
            Point::new(rule.x, rule.y + rule.length as i32 - 1)
        };
        Line::new(Point::new(rule.x, rule.y), end)
            .into_styled(style)
            .draw(display)
    }

    fn draw_rect<D>(&self, display: &mut D, rect: &RectCommand) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        let shape = Rectangle::new(
            Point::new(rect.x, rect.y),
            Size::new(rect.width, rect.height),
        );
        let color = to_rgb888(rect.color);
        if rect.fill {
            shape
                .into_styled(PrimitiveStyle::with_fill(color))
                .draw(display)
        } else {
            shape
                .into_styled(PrimitiveStyle::with_stroke(color, 1))
                .draw(display)
        }
    }

    fn draw_image(
        &self,
        canvas: &mut RgbaCanvas,
        clip: &Rectangle,
        image: &ImageObjectCommand,
        diagnostics: &mut RasterDiagnostics,
    ) -> Result<(), Infallible> {
        let bytes = image.source.bytes();
        let decoded = match image::load_from_memory_with_format(bytes, image.source.format()) {
            Ok(decoded) => decoded,
            Err(err) => {
                log::warn!("{}: bitmap decode failed, skipping: {err}", image.handle);
                diagnostics.decode_warnings += 1;
                let placeholder = image.placeholder(self.cfg.placeholder_color);
                return self.draw_rect(&mut canvas.clipped(clip), &placeholder);
            }
        };
        let (w, h) = (image.width.max(1), image.height.max(1));
        let mut scaled = image::imageops::resize(&decoded.to_rgba8(), w, h, self.cfg.image_filter);
        round_corners(&mut scaled, image.corner_radius);
        let visible_h = (clip.size.height as i32 - image.y).clamp(0, h as i32) as u32;
        if visible_h < h {
            scaled = image::imageops::crop_imm(&scaled, 0, 0, w, visible_h).to_image();
        }
        if visible_h > 0 {
            canvas.blend_image(&scaled, image.x, image.y);
        }
        Ok(())
    }
}

impl<B> Rasterizer for EgRasterizer<B>
where
    B: FontBackend,
{
    fn rasterize(&self, snapshot: &DocumentSnapshot) -> Result<RasterImage, RasterError> {
        let (width, height) = snapshot.export_size();
        if width == 0 || height == 0 {
            return Err(RasterError::InvalidCanvas { width, height });
        }
        let page = self.layout.layout_snapshot(snapshot);

        let mut canvas = RgbaCanvas::new(width, height);
        canvas.fill_background(&snapshot.canvas().background);
        let mut diagnostics = RasterDiagnostics::default();
        if let Err(never) = self.render_page(&page, &mut canvas, &mut diagnostics) {
            match never {}
        }
        if diagnostics.text_fallbacks > 0 {
            log::warn!(
                "{} text run(s) drawn with a substitute font",
                diagnostics.text_fallbacks
            );
        }

        let png = canvas.encode_png()?;
        log::debug!("rasterized {width}x{height}, {} png bytes", png.len());
        Ok(RasterImage {
            width,
            height,
            png,
            diagnostics,
        })
    }
}
