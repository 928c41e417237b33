//! Portrait notice compositor.
//!
//! `notice-compose` owns a typed rich-text [`Document`] laid out on a fixed
//! 360x480 canvas, guards it against overflowing that canvas, and exports it
//! as a 360x640 PNG through interchangeable [`Rasterizer`] and [`UploadSink`]
//! collaborators.
//!
//! Layout and rasterization live in sibling crates:
//! `notice-compose-render` implements [`ContentMeasure`] and the draw-command
//! IR, `notice-compose-embedded-graphics` implements [`Rasterizer`], and
//! `notice-compose-web` implements [`UploadSink`] over HTTP.

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

pub mod canvas;
pub mod compositor;
pub mod document;
pub mod error;
pub mod export;
pub mod format;
pub mod input;
pub mod overflow;

pub use canvas::{
    Background, BackgroundParseError, CanvasConfig, FontSize, GradientStop, Rgb,
    BACKGROUND_PRESETS, CANVAS_WIDTH, CONTENT_PADDING, DEFAULT_FONT_FAMILY, DEFAULT_TEXT_COLOR,
    EXPORT_HEIGHT, LAYOUT_HEIGHT,
};
pub use compositor::{Compositor, KeyOutcome, HISTORY_LIMIT};
pub use document::{
    Alignment, Block, Document, ImageBlock, ImageHandle, ImageLoad, ImageSource, InlineFormat,
    InlineStyle, Paragraph, Position, Selection, SizeClass, TextRun,
};
pub use error::{ComposeError, ExportError, RasterError, UploadError};
pub use export::{
    notice_file_name, DocumentSnapshot, ExportJob, ExportReport, ExportState, ImageDescriptor,
    ImageOutput, RasterDiagnostics, RasterImage, Rasterizer, UploadSink, UPLOAD_FIELD_NAME,
};
pub use format::{FormatCommand, FormatState};
pub use input::{Key, KeyInput};
pub use overflow::{
    BlockedReason, ContentMeasure, OverflowGuard, OverflowTransition, OVERFLOW_BANNER,
    OVERFLOW_TOLERANCE_PX,
};
