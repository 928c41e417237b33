//! Overflow guard: keeps rendered content inside the fixed canvas.

use std::sync::Arc;

use crate::canvas::CanvasConfig;
use crate::document::Document;

/// Measured extent may exceed the viewport by this much before the content
/// counts as overflowing.
pub const OVERFLOW_TOLERANCE_PX: f32 = 1.0;

/// Banner shown while the canvas is overflowed.
pub const OVERFLOW_BANNER: &str =
    "Content exceeds available space. Remove text or reduce image sizes.";

/// Measures the rendered scroll extent of a document on a canvas.
pub trait ContentMeasure {
    /// Content height plus vertical padding, in px.
    fn scroll_height_px(&self, document: &Document, canvas: &CanvasConfig) -> f32;
}

impl<T: ContentMeasure + ?Sized> ContentMeasure for &T {
    fn scroll_height_px(&self, document: &Document, canvas: &CanvasConfig) -> f32 {
        (**self).scroll_height_px(document, canvas)
    }
}

impl<T: ContentMeasure + ?Sized> ContentMeasure for Box<T> {
    fn scroll_height_px(&self, document: &Document, canvas: &CanvasConfig) -> f32 {
        (**self).scroll_height_px(document, canvas)
    }
}

impl<T: ContentMeasure + ?Sized> ContentMeasure for Arc<T> {
    fn scroll_height_px(&self, document: &Document, canvas: &CanvasConfig) -> f32 {
        (**self).scroll_height_px(document, canvas)
    }
}

/// Operation rejected because the canvas is overflowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockedReason {
    /// Content-adding key press.
    Typing,
    Paste,
    InsertImage,
    /// Formatting command (inline style, alignment, undo).
    Format,
}

impl BlockedReason {
    /// User-visible banner text.
    pub fn message(self) -> &'static str {
        match self {
            BlockedReason::Typing => {
                "Content is too large \u{2014} remove content or reduce images before adding more."
            }
            BlockedReason::Paste => {
                "Cannot paste: content already exceeds available space. Remove some content first."
            }
            BlockedReason::InsertImage => {
                "Cannot insert image: content already exceeds available space. Remove some content first."
            }
            BlockedReason::Format => {
                "Content too large to insert more items. Remove some content first."
            }
        }
    }
}

/// Result of a recheck.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowTransition {
    Unchanged,
    Entered,
    Cleared,
}

/// Overflow flag derived purely from measurement.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OverflowGuard {
    overflowed: bool,
    last_scroll_height: f32,
}

impl OverflowGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn last_scroll_height(&self) -> f32 {
        self.last_scroll_height
    }

    pub fn exceeds(scroll_height: f32, visible_height: f32) -> bool {
        scroll_height > visible_height + OVERFLOW_TOLERANCE_PX
    }

    pub fn recheck<M>(&mut self, measure: &M, document: &Document, canvas: &CanvasConfig) -> OverflowTransition
    where
        M: ContentMeasure + ?Sized,
    {
        let scroll_height = measure.scroll_height_px(document, canvas);
        self.last_scroll_height = scroll_height;
        let now = Self::exceeds(scroll_height, canvas.visible_height());
        let transition = match (self.overflowed, now) {
            (false, true) => OverflowTransition::Entered,
            (true, false) => OverflowTransition::Cleared,
            _ => OverflowTransition::Unchanged,
        };
        if transition != OverflowTransition::Unchanged {
            log::debug!(
                "overflow {:?}: scroll height {:.1}px vs visible {:.1}px",
                transition,
                scroll_height,
                canvas.visible_height()
            );
        }
        self.overflowed = now;
        transition
    }
}
