use std::cell::{Cell, RefCell};
use std::io::Cursor;

use notice_compose::{
    Compositor, ImageDescriptor, ImageSource, Position, Selection, UploadError, UploadSink,
};
use notice_compose_embedded_graphics::EgRasterizer;

pub const CANVAS_WIDTH: u32 = 360;
pub const EXPORT_HEIGHT: u32 = 640;

/// Solid-color PNG of the given size.
pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode fixture png");
    out.into_inner()
}

pub fn png_source(width: u32, height: u32) -> ImageSource {
    ImageSource::from_bytes(png_bytes(width, height, [200, 40, 40, 255])).expect("png source")
}

/// Compositor measured by the same layout engine the rasterizer draws with.
pub fn compositor_with_rasterizer() -> (Compositor, EgRasterizer) {
    let rasterizer = EgRasterizer::default();
    let compositor = Compositor::new(rasterizer.layout_engine().clone());
    (compositor, rasterizer)
}

/// Types `line N` paragraphs until the canvas overflows.
pub fn type_until_overflow(compositor: &mut Compositor) -> usize {
    let mut lines = 0usize;
    while !compositor.is_overflowed() && lines < 200 {
        if lines > 0 && compositor.type_text("\n").is_err() {
            break;
        }
        if compositor.type_text(&format!("line {lines}")).is_err() {
            break;
        }
        lines += 1;
    }
    assert!(compositor.is_overflowed(), "never overflowed after {lines} lines");
    lines
}

/// Deletes the last `count` paragraphs via a range selection.
pub fn delete_trailing_lines(compositor: &mut Compositor, count: usize) {
    let doc = compositor.document();
    let keep = doc.block_count() - 1 - count;
    let anchor = Position::new(keep, doc.block_len(keep));
    let focus = doc.end_position();
    compositor.set_selection(Selection::range(anchor, focus));
    assert!(compositor.delete_selection(), "nothing deleted");
}

pub fn decode_png(png: &[u8]) -> image::RgbaImage {
    image::load_from_memory_with_format(png, image::ImageFormat::Png)
        .expect("decode exported png")
        .to_rgba8()
}

/// Upload collaborator that counts calls and answers with a fixed result.
pub struct RecordingUploader {
    pub calls: Cell<usize>,
    pub file_names: RefCell<Vec<String>>,
    response: Result<(), UploadError>,
}

impl RecordingUploader {
    pub fn accepting() -> Self {
        Self {
            calls: Cell::new(0),
            file_names: RefCell::new(Vec::new()),
            response: Ok(()),
        }
    }

    pub fn rejecting(status: u16) -> Self {
        Self {
            calls: Cell::new(0),
            file_names: RefCell::new(Vec::new()),
            response: Err(UploadError::Status {
                status,
                message: "server error".to_string(),
            }),
        }
    }
}

impl UploadSink for RecordingUploader {
    fn upload(&self, file_name: &str, png: &[u8]) -> Result<ImageDescriptor, UploadError> {
        self.calls.set(self.calls.get() + 1);
        self.file_names.borrow_mut().push(file_name.to_string());
        assert!(png.starts_with(b"\x89PNG"), "upload body is not a png");
        self.response.clone()?;
        Ok(ImageDescriptor {
            file_name: file_name.to_string(),
            image_src: format!("/uploads/{file_name}"),
            image_src_portrait: Some(format!("/uploads/portrait/{file_name}")),
        })
    }
}
