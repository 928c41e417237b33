use core::fmt;
use std::sync::Arc;

use notice_compose::{Alignment, ImageHandle, ImageSource, Rgb};
use serde::Serialize;

/// Laid-out notice represented as backend-agnostic draw commands.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ComposedPage {
    /// Layout box width.
    pub width: u32,
    /// Layout box height (the visible editing viewport).
    pub height: u32,
    /// Content-layer draw commands in paint order.
    pub content_commands: Vec<DrawCommand>,
    /// Structured non-draw annotations.
    pub annotations: Vec<PageAnnotation>,
    /// Height of the laid-out content, without padding.
    pub content_height: f32,
    /// Content height plus top and bottom padding.
    pub scroll_height: f32,
}

impl ComposedPage {
    const INITIAL_CONTENT_COMMAND_CAPACITY: usize = 8;

    /// Create an empty page for a layout box.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            // Empty notices stay allocation-free.
            content_commands: Vec::with_capacity(0),
            annotations: Vec::with_capacity(0),
            content_height: 0.0,
            scroll_height: 0.0,
        }
    }

    /// Push a content-layer command.
    pub fn push_content_command(&mut self, cmd: DrawCommand) {
        if self.content_commands.capacity() == 0 {
            self.content_commands
                .reserve(Self::INITIAL_CONTENT_COMMAND_CAPACITY);
        }
        self.content_commands.push(cmd);
    }

    pub fn push_annotation(&mut self, kind: PageAnnotationKind, value: Option<String>) {
        self.annotations.push(PageAnnotation { kind, value });
    }

    /// Image objects in paint order.
    pub fn image_objects(&self) -> impl Iterator<Item = &ImageObjectCommand> {
        self.content_commands.iter().filter_map(|cmd| match cmd {
            DrawCommand::ImageObject(image) => Some(image),
            _ => None,
        })
    }

    /// Text commands in paint order.
    pub fn text_commands(&self) -> impl Iterator<Item = &TextCommand> {
        self.content_commands.iter().filter_map(|cmd| match cmd {
            DrawCommand::Text(text) => Some(text),
            _ => None,
        })
    }

    /// True when the content does not fit the layout box.
    pub fn overflows(&self, tolerance_px: f32) -> bool {
        self.scroll_height > self.height as f32 + tolerance_px
    }

    /// Pretty JSON dump for debugging and golden tests.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Structured page annotation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageAnnotation {
    /// Stable annotation kind/tag.
    pub kind: PageAnnotationKind,
    /// Optional annotation payload.
    pub value: Option<String>,
}

/// Structured page annotation kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum PageAnnotationKind {
    /// Image laid out before its header was decoded (zero height).
    ImagePending,
    /// Image whose header could not be decoded (zero height).
    ImageFailed,
}

impl PageAnnotationKind {
    /// Canonical string form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ImagePending => "image_pending",
            Self::ImageFailed => "image_failed",
        }
    }
}

impl From<PageAnnotationKind> for String {
    fn from(value: PageAnnotationKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for PageAnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layout output commands.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawCommand {
    /// Draw text.
    Text(TextCommand),
    /// Draw a line rule (underlines).
    Rule(RuleCommand),
    /// Draw an image object box.
    ImageObject(ImageObjectCommand),
    /// Draw rectangle.
    Rect(RectCommand),
}

/// Resolved style passed to renderer.
///
/// Every field is computed; nothing is inherited at draw time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedTextStyle {
    /// Chosen family list.
    pub family: Arc<str>,
    /// Numeric weight.
    pub weight: u16,
    /// Italic flag.
    pub italic: bool,
    /// Underline flag.
    pub underline: bool,
    /// Size in pixels.
    pub size_px: f32,
    /// Line height multiplier.
    pub line_height: f32,
    /// Text color.
    pub color: Rgb,
    /// Paragraph alignment.
    pub align: Alignment,
    /// Alignment offset determined during layout, already folded into the
    /// command's `x`.
    pub justify_mode: JustifyMode,
}

impl ResolvedTextStyle {
    pub fn is_bold(&self) -> bool {
        self.weight >= 700
    }

    /// Inline CSS declaration block for this style.
    pub fn to_css(&self) -> String {
        let mut css = format!(
            "font-family:{};font-size:{}px;line-height:{};font-weight:{};font-style:{};color:{};text-align:{}",
            self.family,
            trim_px(self.size_px),
            trim_px(self.line_height),
            self.weight,
            if self.italic { "italic" } else { "normal" },
            self.color,
            match self.align {
                Alignment::Left => "left",
                Alignment::Center => "center",
            },
        );
        if self.underline {
            css.push_str(";text-decoration:underline");
        }
        css
    }
}

fn trim_px(value: f32) -> String {
    if value.fract().abs() < 1e-4 {
        format!("{}", value.round() as i64)
    } else {
        format!("{value:.2}")
    }
}

/// Justification mode determined during layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum JustifyMode {
    /// Left/no justification.
    #[default]
    None,
    /// Center alignment with horizontal offset.
    AlignCenter { offset_px: i32 },
}

/// Text draw command.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TextCommand {
    /// Left x.
    pub x: i32,
    /// Baseline y.
    pub baseline_y: i32,
    /// Content.
    pub text: String,
    /// Resolved style.
    pub style: ResolvedTextStyle,
}

/// Rule draw command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RuleCommand {
    /// Start x.
    pub x: i32,
    /// Start y.
    pub y: i32,
    /// Length.
    pub length: u32,
    /// Thickness.
    pub thickness: u32,
    /// Horizontal if true; vertical if false.
    pub horizontal: bool,
    /// Stroke color.
    pub color: Rgb,
}

/// Rectangle command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RectCommand {
    /// Left x.
    pub x: i32,
    /// Top y.
    pub y: i32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
    /// Fill rectangle when true.
    pub fill: bool,
    /// Fill or stroke color.
    pub color: Rgb,
}

/// Image object command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImageObjectCommand {
    /// Source image block.
    pub handle: ImageHandle,
    /// Encoded bytes, shared with the document.
    #[serde(skip)]
    pub source: ImageSource,
    /// Left x.
    pub x: i32,
    /// Top y.
    pub y: i32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
    /// Corner radius.
    pub corner_radius: u32,
}

impl ImageObjectCommand {
    /// Outline drawn in place of an image that cannot be decoded.
    pub fn placeholder(&self, color: Rgb) -> RectCommand {
        RectCommand {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            fill: false,
            color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> ResolvedTextStyle {
        ResolvedTextStyle {
            family: Arc::from("Inter, sans-serif"),
            weight: 700,
            italic: true,
            underline: true,
            size_px: 18.0,
            line_height: 1.25,
            color: Rgb::new(0x11, 0x18, 0x27),
            align: Alignment::Center,
            justify_mode: JustifyMode::None,
        }
    }

    #[test]
    fn empty_page_does_not_allocate() {
        let page = ComposedPage::new(360, 480);
        assert_eq!(page.content_commands.capacity(), 0);
        assert_eq!(page.annotations.capacity(), 0);
    }

    #[test]
    fn push_content_command_reserves_once() {
        let mut page = ComposedPage::new(360, 480);
        page.push_content_command(DrawCommand::Rect(RectCommand {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
            fill: true,
            color: Rgb::WHITE,
        }));
        assert!(page.content_commands.capacity() >= 8);
    }

    #[test]
    fn style_css_is_fully_computed() {
        let css = style().to_css();
        assert_eq!(
            css,
            "font-family:Inter, sans-serif;font-size:18px;line-height:1.25;font-weight:700;\
             font-style:italic;color:#111827;text-align:center;text-decoration:underline"
        );
    }

    #[test]
    fn overflow_uses_tolerance() {
        let mut page = ComposedPage::new(360, 480);
        page.scroll_height = 481.0;
        assert!(!page.overflows(1.0));
        page.scroll_height = 481.5;
        assert!(page.overflows(1.0));
    }

    #[test]
    fn annotation_kind_strings_are_stable() {
        assert_eq!(PageAnnotationKind::ImagePending.to_string(), "image_pending");
        assert_eq!(String::from(PageAnnotationKind::ImageFailed), "image_failed");
    }
}
