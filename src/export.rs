//! Export pipeline: immutable snapshot, rasterization, upload, fallback.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::canvas::CanvasConfig;
use crate::document::Document;
use crate::error::{ExportError, RasterError, UploadError};

/// Multipart field carrying the PNG.
pub const UPLOAD_FIELD_NAME: &str = "image";
const FILE_PREFIX: &str = "notice_";

/// `notice_<unix-millis>.png`
pub fn notice_file_name(unix_millis: i64) -> String {
    format!("{FILE_PREFIX}{unix_millis}.png")
}

/// Read-only deep copy of the document and canvas taken at submit time.
///
/// Block structure is copied; image bytes are shared.
#[derive(Clone, Debug)]
pub struct DocumentSnapshot {
    document: Document,
    canvas: CanvasConfig,
}

impl DocumentSnapshot {
    pub fn capture(document: &Document, canvas: &CanvasConfig) -> Self {
        Self {
            document: document.clone(),
            canvas: canvas.clone(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn canvas(&self) -> &CanvasConfig {
        &self.canvas
    }

    /// Logical box the content is laid out in.
    pub fn layout_size(&self) -> (u32, u32) {
        (self.canvas.width, self.canvas.layout_height)
    }

    /// Pixel size of the exported raster.
    pub fn export_size(&self) -> (u32, u32) {
        (self.canvas.width, self.canvas.export_height)
    }
}

/// Counters collected while rasterizing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RasterDiagnostics {
    /// Images skipped because their bitmap could not be decoded.
    pub decode_warnings: usize,
    /// Text runs drawn with a substitute font.
    pub text_fallbacks: usize,
}

/// Encoded raster produced by a [`Rasterizer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// PNG-encoded RGBA bitmap.
    pub png: Vec<u8>,
    pub diagnostics: RasterDiagnostics,
}

impl RasterImage {
    /// `data:image/png;base64,...`
    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

/// Turns a snapshot into a PNG.
///
/// Implementations must not abort on undecodable images; they skip them and
/// count a decode warning instead.
pub trait Rasterizer {
    fn rasterize(&self, snapshot: &DocumentSnapshot) -> Result<RasterImage, RasterError>;
}

/// Descriptor returned by the upload collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    pub file_name: String,
    pub image_src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_src_portrait: Option<String>,
}

/// Receives the encoded PNG.
pub trait UploadSink {
    fn upload(&self, file_name: &str, png: &[u8]) -> Result<ImageDescriptor, UploadError>;
}

/// Value handed to the output callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageOutput {
    Uploaded(ImageDescriptor),
    /// Local raster as a data URL, used when the upload failed.
    LocalFallback(String),
}

impl ImageOutput {
    pub fn is_fallback(&self) -> bool {
        matches!(self, ImageOutput::LocalFallback(_))
    }

    pub fn descriptor(&self) -> Option<&ImageDescriptor> {
        match self {
            ImageOutput::Uploaded(descriptor) => Some(descriptor),
            ImageOutput::LocalFallback(_) => None,
        }
    }

    /// Displayable source for either shape.
    pub fn display_src(&self) -> &str {
        match self {
            ImageOutput::Uploaded(descriptor) => &descriptor.image_src,
            ImageOutput::LocalFallback(data_url) => data_url,
        }
    }
}

/// Outcome of a completed export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportReport {
    pub output: ImageOutput,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub diagnostics: RasterDiagnostics,
    /// Upload failure recovered by the local fallback.
    pub upload_error: Option<UploadError>,
}

/// Submit mutual-exclusion state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportState {
    #[default]
    Idle,
    Rendering,
}

/// One in-flight export, detached from the live document.
#[derive(Clone, Debug)]
pub struct ExportJob {
    snapshot: DocumentSnapshot,
    file_name: String,
}

impl ExportJob {
    pub fn new(snapshot: DocumentSnapshot, file_name: impl Into<String>) -> Self {
        Self {
            snapshot,
            file_name: file_name.into(),
        }
    }

    pub fn snapshot(&self) -> &DocumentSnapshot {
        &self.snapshot
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn render<R>(&self, rasterizer: &R) -> Result<RasterImage, ExportError>
    where
        R: Rasterizer + ?Sized,
    {
        let raster = rasterizer.rasterize(&self.snapshot)?;
        if raster.diagnostics.decode_warnings > 0 {
            log::warn!(
                "{}: {} image(s) could not be decoded and were skipped",
                self.file_name,
                raster.diagnostics.decode_warnings
            );
        }
        Ok(raster)
    }

    /// Uploads, falling back to the local data URL on any failure.
    pub fn deliver<U>(&self, raster: &RasterImage, uploader: &U) -> (ImageOutput, Option<UploadError>)
    where
        U: UploadSink + ?Sized,
    {
        match uploader.upload(&self.file_name, &raster.png) {
            Ok(descriptor) => (ImageOutput::Uploaded(descriptor), None),
            Err(err) => {
                log::warn!("upload of {} failed, using local raster: {err}", self.file_name);
                (ImageOutput::LocalFallback(raster.to_data_url()), Some(err))
            }
        }
    }

    pub fn run<R, U>(&self, rasterizer: &R, uploader: &U) -> Result<ExportReport, ExportError>
    where
        R: Rasterizer + ?Sized,
        U: UploadSink + ?Sized,
    {
        let raster = self.render(rasterizer)?;
        let (output, upload_error) = self.deliver(&raster, uploader);
        Ok(ExportReport {
            output,
            file_name: self.file_name.clone(),
            width: raster.width,
            height: raster.height,
            diagnostics: raster.diagnostics,
            upload_error,
        })
    }
}
