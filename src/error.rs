//! Error taxonomy shared by the compositor and its collaborators.

use thiserror::Error;

use crate::document::ImageHandle;
use crate::overflow::BlockedReason;

/// Errors returned by compositor operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// Content-adding operation rejected while the canvas is overflowed.
    ///
    /// Recoverable: deleting content clears the condition.
    #[error("{}", .0.message())]
    BlockedByOverflow(BlockedReason),
    /// Submit invoked while a render/upload is still outstanding.
    #[error("an export is already in progress")]
    ExportInFlight,
    /// Submit invoked while the content does not fit the canvas.
    #[error("export is disabled while content exceeds the canvas")]
    ExportBlockedByOverflow,
    /// Bytes are not in a recognized raster image format.
    #[error("unsupported image format")]
    UnsupportedImage,
    /// Zero-length image payload.
    #[error("image data is empty")]
    EmptyImage,
    /// Local file could not be read.
    #[error("read image {path}: {message}")]
    ReadImage { path: String, message: String },
    /// Handle does not name an image block in the document.
    #[error("unknown image {0}")]
    UnknownImage(ImageHandle),
    /// Background preset index outside the preset table.
    #[error("background preset {0} is out of range")]
    PresetOutOfRange(usize),
    /// Export pipeline failed before a bitmap was produced.
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Failure reported by a [`Rasterizer`](crate::export::Rasterizer).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RasterError {
    /// Canvas dimensions cannot hold a bitmap.
    #[error("invalid canvas size {width}x{height}")]
    InvalidCanvas { width: u32, height: u32 },
    /// PNG encoding failed.
    #[error("png encode failed: {0}")]
    Encode(String),
    /// Backend-specific drawing failure.
    #[error("raster backend failed: {0}")]
    Backend(String),
}

/// Failure reported by an [`UploadSink`](crate::export::UploadSink).
///
/// Every variant is recovered by handing the caller the local raster instead.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UploadError {
    /// Connection, timeout or I/O failure.
    #[error("upload transport failed: {0}")]
    Transport(String),
    /// Collaborator answered with a non-2xx status.
    #[error("upload rejected with status {status}: {message}")]
    Status { status: u16, message: String },
    /// 2xx response whose body is not a valid descriptor.
    #[error("malformed upload response: {0}")]
    MalformedResponse(String),
}

/// Unrecoverable export failure.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ExportError {
    /// Rendering failed before a bitmap was produced.
    #[error("render failed: {0}")]
    Render(#[from] RasterError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_error_displays_banner_text() {
        let err = ComposeError::BlockedByOverflow(BlockedReason::Paste);
        assert_eq!(err.to_string(), BlockedReason::Paste.message());
    }

    #[test]
    fn export_error_wraps_raster_error() {
        let err = ComposeError::from(ExportError::from(RasterError::Encode("boom".to_string())));
        assert_eq!(err.to_string(), "render failed: png encode failed: boom");
    }
}
