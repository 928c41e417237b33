use std::sync::Arc;

use notice_compose::{
    Alignment, Block, CanvasConfig, ContentMeasure, Document, DocumentSnapshot, ImageBlock,
    ImageLoad, InlineStyle, Paragraph, Rgb,
};
use smallvec::SmallVec;

use crate::render_ir::{
    ComposedPage, DrawCommand, ImageObjectCommand, JustifyMode, PageAnnotationKind,
    ResolvedTextStyle, RuleCommand, TextCommand,
};

const REGULAR_WEIGHT: u16 = 400;
const BOLD_WEIGHT: u16 = 700;

/// Optional text measurement hook for glyph-accurate line fitting.
pub trait TextMeasurer: Send + Sync {
    /// Measure rendered text width for the provided style.
    fn measure_text_px(&self, text: &str, style: &ResolvedTextStyle) -> f32;

    /// Conservative (safe upper-bound) width estimate.
    ///
    /// Default delegates to `measure_text_px`.
    fn conservative_text_px(&self, text: &str, style: &ResolvedTextStyle) -> f32 {
        self.measure_text_px(text, style)
    }
}

/// Layout configuration for the notice canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutConfig {
    /// Layout box width.
    pub display_width: i32,
    /// Layout box height.
    pub display_height: i32,
    /// Padding on every side of the content box.
    pub padding: i32,
    /// Body font size.
    pub font_size_px: f32,
    /// Line height multiplier.
    pub line_height: f32,
    /// Body text color.
    pub text_color: Rgb,
    /// Body font family list.
    pub font_family: Arc<str>,
    /// Corner radius applied to images.
    pub image_corner_radius_px: u32,
}

impl LayoutConfig {
    /// Convenience for a display size with sensible defaults.
    pub fn for_display(width: i32, height: i32) -> Self {
        Self {
            display_width: width,
            display_height: height,
            ..Self::default()
        }
    }

    /// Geometry, font size, color and family taken from a canvas.
    pub fn for_canvas(canvas: &CanvasConfig) -> Self {
        Self::default().with_canvas(canvas)
    }

    /// Replace the canvas-derived fields, keeping line height and image
    /// radius.
    pub fn with_canvas(mut self, canvas: &CanvasConfig) -> Self {
        self.display_width = canvas.width as i32;
        self.display_height = canvas.layout_height as i32;
        self.padding = canvas.padding as i32;
        self.font_size_px = canvas.font_size.px() as f32;
        self.text_color = canvas.text_color;
        if *self.font_family != *canvas.font_family {
            self.font_family = Arc::from(canvas.font_family.as_str());
        }
        self
    }

    pub fn with_line_height(mut self, line_height: f32) -> Self {
        self.line_height = line_height;
        self
    }

    pub fn with_image_corner_radius(mut self, radius_px: u32) -> Self {
        self.image_corner_radius_px = radius_px;
        self
    }

    pub fn content_width(&self) -> i32 {
        (self.display_width - self.padding * 2).max(1)
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let canvas = CanvasConfig::portrait();
        Self {
            display_width: canvas.width as i32,
            display_height: canvas.layout_height as i32,
            padding: canvas.padding as i32,
            font_size_px: canvas.font_size.px() as f32,
            line_height: 1.25,
            text_color: canvas.text_color,
            font_family: Arc::from(canvas.font_family.as_str()),
            image_corner_radius_px: 8,
        }
    }
}

/// Deterministic layout engine that turns a document into a composed page.
#[derive(Clone)]
pub struct LayoutEngine {
    cfg: LayoutConfig,
    text_measurer: Option<Arc<dyn TextMeasurer>>,
}

impl core::fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("cfg", &self.cfg)
            .field("has_text_measurer", &self.text_measurer.is_some())
            .finish()
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl LayoutEngine {
    /// Create a layout engine.
    pub fn new(cfg: LayoutConfig) -> Self {
        Self {
            cfg,
            text_measurer: None,
        }
    }

    pub fn for_canvas(canvas: &CanvasConfig) -> Self {
        Self::new(LayoutConfig::for_canvas(canvas))
    }

    /// Install a shared text measurer for glyph-accurate width fitting.
    pub fn with_text_measurer(mut self, measurer: Arc<dyn TextMeasurer>) -> Self {
        self.text_measurer = Some(measurer);
        self
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.cfg
    }

    /// Same engine with canvas-derived settings replaced.
    pub fn reconfigured(&self, canvas: &CanvasConfig) -> Self {
        Self {
            cfg: self.cfg.clone().with_canvas(canvas),
            text_measurer: self.text_measurer.clone(),
        }
    }

    /// Layout a snapshot in its forced logical box.
    pub fn layout_snapshot(&self, snapshot: &DocumentSnapshot) -> ComposedPage {
        self.reconfigured(snapshot.canvas())
            .layout(snapshot.document())
    }

    /// Layout a document into a single page.
    ///
    /// Content past the bottom of the box is still laid out; callers decide
    /// whether to clip.
    pub fn layout(&self, document: &Document) -> ComposedPage {
        let mut st = LayoutState::new(self);
        for block in document.blocks() {
            match block {
                Block::Paragraph(paragraph) => st.layout_paragraph(paragraph),
                Block::Image(image) => st.layout_image(image),
            }
        }
        st.finish()
    }

    /// Fully computed style for a run.
    pub fn resolve_style(&self, style: InlineStyle, align: Alignment) -> ResolvedTextStyle {
        ResolvedTextStyle {
            family: self.cfg.font_family.clone(),
            weight: if style.bold { BOLD_WEIGHT } else { REGULAR_WEIGHT },
            italic: style.italic,
            underline: style.underline,
            size_px: self.cfg.font_size_px,
            line_height: self.cfg.line_height,
            color: self.cfg.text_color,
            align,
            justify_mode: JustifyMode::None,
        }
    }

    /// Rendered size of an image block, `None` while it has no height.
    pub fn image_box(&self, image: &ImageBlock) -> Option<(u32, u32)> {
        let (natural_w, natural_h) = image.natural_size()?;
        if natural_w == 0 || natural_h == 0 {
            return None;
        }
        let max_w = self.cfg.content_width() as f32 * image.size().width_percent() as f32 / 100.0;
        let width = (natural_w as f32).min(max_w).floor().max(1.0);
        let height = (natural_h as f32 * width / natural_w as f32).round().max(1.0);
        Some((width as u32, height as u32))
    }

    fn measure_text(&self, text: &str, style: &ResolvedTextStyle) -> f32 {
        self.text_measurer
            .as_ref()
            .map(|m| m.measure_text_px(text, style))
            .unwrap_or_else(|| heuristic_measure_text(text, style))
    }

    fn conservative_measure_text(&self, text: &str, style: &ResolvedTextStyle) -> f32 {
        self.text_measurer
            .as_ref()
            .map(|m| m.conservative_text_px(text, style))
            .unwrap_or_else(|| heuristic_measure_text(text, style))
    }
}

impl ContentMeasure for LayoutEngine {
    fn scroll_height_px(&self, document: &Document, canvas: &CanvasConfig) -> f32 {
        self.reconfigured(canvas).layout(document).scroll_height
    }
}

#[derive(Clone, Debug)]
struct Segment {
    text: String,
    style: ResolvedTextStyle,
    width: f32,
}

enum Token {
    Space(Segment),
    Word(SmallVec<[Segment; 2]>),
}

#[derive(Default)]
struct LineBuf {
    segments: SmallVec<[Segment; 8]>,
    width: f32,
}

impl LineBuf {
    fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn push(&mut self, seg: Segment) {
        self.width += seg.width;
        match self.segments.last_mut() {
            Some(last) if last.style == seg.style => {
                last.text.push_str(&seg.text);
                last.width += seg.width;
            }
            _ => self.segments.push(seg),
        }
    }
}

struct LayoutState<'a> {
    engine: &'a LayoutEngine,
    page: ComposedPage,
    cursor_y: i32,
}

impl<'a> LayoutState<'a> {
    fn new(engine: &'a LayoutEngine) -> Self {
        let cfg = &engine.cfg;
        Self {
            engine,
            page: ComposedPage::new(cfg.display_width.max(0) as u32, cfg.display_height.max(0) as u32),
            cursor_y: cfg.padding,
        }
    }

    fn cfg(&self) -> &'a LayoutConfig {
        &self.engine.cfg
    }

    fn layout_paragraph(&mut self, paragraph: &Paragraph) {
        if paragraph.is_empty() {
            // Empty paragraphs keep one line box.
            let style = self.engine.resolve_style(InlineStyle::default(), paragraph.align);
            self.cursor_y += line_height_px(&style);
            return;
        }
        let avail = self.cfg().content_width() as f32;
        let mut line = LineBuf::default();
        let mut pending_spaces: SmallVec<[Segment; 2]> = SmallVec::new();

        for token in self.tokenize(paragraph) {
            match token {
                Token::Space(seg) => {
                    if !line.is_empty() {
                        pending_spaces.push(seg);
                    }
                }
                Token::Word(segs) => {
                    let word_w: f32 = segs.iter().map(|s| s.width).sum();
                    let space_w: f32 = pending_spaces.iter().map(|s| s.width).sum();
                    if !line.is_empty() && line.width + space_w + word_w > avail {
                        pending_spaces.clear();
                        self.flush_line(&mut line, paragraph.align);
                    }
                    for space in pending_spaces.drain(..) {
                        line.push(space);
                    }
                    if line.is_empty() && word_w > avail {
                        self.hard_wrap(&mut line, segs, paragraph.align);
                    } else {
                        for seg in segs {
                            line.push(seg);
                        }
                    }
                }
            }
        }
        if !line.is_empty() {
            self.flush_line(&mut line, paragraph.align);
        }
    }

    /// Splits runs into whitespace and word tokens. A word may span runs.
    fn tokenize(&self, paragraph: &Paragraph) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();
        for run in paragraph.runs() {
            let style = self.engine.resolve_style(run.style, paragraph.align);
            for (is_space, chunk) in whitespace_chunks(&run.text) {
                let seg = Segment {
                    text: chunk.to_string(),
                    width: self.engine.measure_text(chunk, &style),
                    style: style.clone(),
                };
                if is_space {
                    tokens.push(Token::Space(seg));
                    continue;
                }
                match tokens.last_mut() {
                    Some(Token::Word(segs)) => segs.push(seg),
                    _ => {
                        let mut segs = SmallVec::new();
                        segs.push(seg);
                        tokens.push(Token::Word(segs));
                    }
                }
            }
        }
        tokens
    }

    /// Breaks a word wider than the content box at char boundaries.
    fn hard_wrap(&mut self, line: &mut LineBuf, segs: SmallVec<[Segment; 2]>, align: Alignment) {
        let avail = self.cfg().content_width() as f32;
        for seg in segs {
            for ch in seg.text.chars() {
                let mut buf = [0u8; 4];
                let text = ch.encode_utf8(&mut buf);
                let width = self.engine.conservative_measure_text(text, &seg.style);
                if !line.is_empty() && line.width + width > avail {
                    self.flush_line(line, align);
                }
                line.push(Segment {
                    text: text.to_string(),
                    style: seg.style.clone(),
                    width,
                });
            }
        }
    }

    fn flush_line(&mut self, line: &mut LineBuf, align: Alignment) {
        let segments = core::mem::take(&mut line.segments);
        let width = core::mem::take(&mut line.width);
        let Some(line_h) = segments.iter().map(|s| line_height_px(&s.style)).max() else {
            return;
        };
        let max_size = segments
            .iter()
            .map(|s| s.style.size_px)
            .fold(0.0f32, f32::max);
        let avail = self.cfg().content_width() as f32;
        let offset_px = match align {
            Alignment::Center => ((avail - width) / 2.0).max(0.0).round() as i32,
            Alignment::Left => 0,
        };
        let justify_mode = match align {
            Alignment::Center => JustifyMode::AlignCenter { offset_px },
            Alignment::Left => JustifyMode::None,
        };
        let baseline_y = self.cursor_y
            + ((line_h as f32 - max_size) / 2.0 + line_ascent_px(max_size)).round() as i32;

        let mut x = self.cfg().padding as f32 + offset_px as f32;
        for seg in segments {
            let seg_x = x.round() as i32;
            x += seg.width;
            if seg.style.underline {
                self.page.push_content_command(DrawCommand::Rule(RuleCommand {
                    x: seg_x,
                    y: baseline_y + underline_offset_px(seg.style.size_px),
                    length: seg.width.round().max(1.0) as u32,
                    thickness: underline_thickness_px(seg.style.size_px),
                    horizontal: true,
                    color: seg.style.color,
                }));
            }
            let mut style = seg.style;
            style.justify_mode = justify_mode;
            self.page.push_content_command(DrawCommand::Text(TextCommand {
                x: seg_x,
                baseline_y,
                text: seg.text,
                style,
            }));
        }
        self.cursor_y += line_h;
    }

    fn layout_image(&mut self, image: &ImageBlock) {
        let Some((width, height)) = self.engine.image_box(image) else {
            let kind = match image.load() {
                ImageLoad::Failed => PageAnnotationKind::ImageFailed,
                ImageLoad::Pending | ImageLoad::Loaded { .. } => PageAnnotationKind::ImagePending,
            };
            self.page
                .push_annotation(kind, Some(image.handle().to_string()));
            return;
        };
        let cfg = self.cfg();
        let x = cfg.padding + (cfg.content_width() - width as i32).max(0) / 2;
        self.page
            .push_content_command(DrawCommand::ImageObject(ImageObjectCommand {
                handle: image.handle(),
                source: image.source().clone(),
                x,
                y: self.cursor_y,
                width,
                height,
                corner_radius: cfg.image_corner_radius_px,
            }));
        self.cursor_y += height as i32;
    }

    fn finish(mut self) -> ComposedPage {
        let padding = self.cfg().padding;
        self.page.content_height = (self.cursor_y - padding).max(0) as f32;
        self.page.scroll_height = self.page.content_height + (padding * 2) as f32;
        log::debug!(
            "layout: {} commands, content height {:.0}px, scroll height {:.0}px",
            self.page.content_commands.len(),
            self.page.content_height,
            self.page.scroll_height
        );
        self.page
    }
}

/// Alternating whitespace / non-whitespace chunks of `text`.
fn whitespace_chunks(text: &str) -> impl Iterator<Item = (bool, &str)> {
    let mut rest = text;
    core::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let is_space = first.is_whitespace();
        let end = rest
            .char_indices()
            .find(|(_, ch)| ch.is_whitespace() != is_space)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some((is_space, chunk))
    })
}

/// Line box height for a style, in whole px.
pub fn line_height_px(style: &ResolvedTextStyle) -> i32 {
    (style.size_px * style.line_height).round().max(1.0) as i32
}

/// Distance from the top of the em box to the baseline.
pub fn line_ascent_px(size_px: f32) -> f32 {
    size_px * 0.78
}

fn underline_offset_px(size_px: f32) -> i32 {
    (size_px / 12.0).round().max(1.0) as i32
}

fn underline_thickness_px(size_px: f32) -> u32 {
    (size_px / 16.0).round().max(1.0) as u32
}

fn heuristic_measure_text(text: &str, style: &ResolvedTextStyle) -> f32 {
    let chars = text.chars().count();
    if chars == 0 {
        return 0.0;
    }
    // Only the primary family decides the width model.
    let family = style
        .family
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let proportional = !(family.contains("mono") || family.contains("fixed"));
    let mut em_sum = 0.0f32;
    if proportional {
        for ch in text.chars() {
            em_sum += proportional_glyph_em_width(ch);
        }
    } else {
        for ch in text.chars() {
            em_sum += if ch == ' ' { 0.52 } else { 0.58 };
        }
    }

    let mut family_scale = if family.contains("sans") {
        0.99
    } else if family.contains("serif") {
        1.03
    } else {
        1.00
    };
    if style.weight >= BOLD_WEIGHT {
        family_scale += 0.03;
    }
    if style.italic {
        family_scale += 0.01;
    }
    em_sum * style.size_px * family_scale
}

fn proportional_glyph_em_width(ch: char) -> f32 {
    match ch {
        ' ' => 0.32,
        '\t' => 1.28,
        '\u{00A0}' => 0.32,
        'i' | 'l' | 'I' | '|' | '!' => 0.24,
        '.' | ',' | ':' | ';' | '\'' | '"' | '`' => 0.23,
        '-' | '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' => 0.34,
        '(' | ')' | '[' | ']' | '{' | '}' => 0.30,
        'f' | 't' | 'j' | 'r' => 0.34,
        'm' | 'w' | 'M' | 'W' | '@' | '%' | '&' | '#' => 0.74,
        c if c.is_ascii_digit() => 0.52,
        c if c.is_ascii_uppercase() => 0.64,
        c if c.is_ascii_lowercase() => 0.52,
        c if c.is_whitespace() => 0.32,
        c if c.is_ascii_punctuation() => 0.42,
        _ => 0.56,
    }
}
