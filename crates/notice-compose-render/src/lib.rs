//! Render IR, layout engine, and markup serialization for `notice-compose`.

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

mod markup;
mod render_ir;
mod render_layout;

pub use markup::{snapshot_to_svg, MarkupError};
pub use render_ir::{
    ComposedPage, DrawCommand, ImageObjectCommand, JustifyMode, PageAnnotation,
    PageAnnotationKind, RectCommand, ResolvedTextStyle, RuleCommand, TextCommand,
};
pub use render_layout::{
    line_ascent_px, line_height_px, LayoutConfig, LayoutEngine, TextMeasurer,
};
