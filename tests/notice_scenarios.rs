mod common;

use common::fixtures::{
    compositor_with_rasterizer, decode_png, delete_trailing_lines, png_bytes, png_source,
    type_until_overflow, RecordingUploader, CANVAS_WIDTH, EXPORT_HEIGHT,
};
use notice_compose::{
    ComposeError, DocumentSnapshot, ImageLoad, ImageOutput, ImageSource, Rasterizer, SizeClass,
    OVERFLOW_BANNER,
};
use notice_compose_render::DrawCommand;

fn channel_close(a: u8, b: u8) -> bool {
    a.abs_diff(b) <= 2
}

#[test]
fn empty_notice_exports_plain_background() {
    let (mut compositor, rasterizer) = compositor_with_rasterizer();
    let uploader = RecordingUploader::accepting();
    let background = compositor.canvas().background.clone();

    let job = compositor.begin_export_at(1_715_000_000_123).expect("begin");
    let raster = job.render(&rasterizer).expect("render");
    assert_eq!((raster.width, raster.height), (CANVAS_WIDTH, EXPORT_HEIGHT));

    let pixels = decode_png(&raster.png);
    assert_eq!(pixels.dimensions(), (CANVAS_WIDTH, EXPORT_HEIGHT));
    for (x, y) in [(0, 0), (180, 320), (359, 639), (10, 500)] {
        let expected = background.color_at(
            x as f32 + 0.5,
            y as f32 + 0.5,
            CANVAS_WIDTH as f32,
            EXPORT_HEIGHT as f32,
        );
        let px = pixels.get_pixel(x, y).0;
        assert!(
            channel_close(px[0], expected.r)
                && channel_close(px[1], expected.g)
                && channel_close(px[2], expected.b),
            "pixel ({x},{y}) = {px:?}, expected {expected}"
        );
        assert_eq!(px[3], 0xff);
    }

    let (output, upload_error) = job.deliver(&raster, &uploader);
    assert!(upload_error.is_none());
    let descriptor = output.descriptor().expect("uploaded");
    assert_eq!(descriptor.file_name, "notice_1715000000123.png");
    assert_eq!(descriptor.image_src, "/uploads/notice_1715000000123.png");
    assert!(descriptor.image_src_portrait.is_some());
    assert_eq!(
        *uploader.file_names.borrow(),
        vec!["notice_1715000000123.png".to_string()]
    );
}

#[test]
fn submit_hands_descriptor_to_callback() {
    let (mut compositor, rasterizer) = compositor_with_rasterizer();
    let uploader = RecordingUploader::accepting();
    let mut seen = None;
    let report = compositor
        .submit(&rasterizer, &uploader, |output| seen = Some(output.clone()))
        .expect("submit");
    assert!(matches!(seen, Some(ImageOutput::Uploaded(_))));
    assert!(report.file_name.starts_with("notice_"));
    assert!(report.file_name.ends_with(".png"));
}

#[test]
fn global_resize_with_caret_outside_image_shrinks_it_to_small() {
    let (mut compositor, rasterizer) = compositor_with_rasterizer();
    compositor.resize_images(SizeClass::Medium);
    let handle = compositor.insert_image(png_source(400, 200)).expect("insert");
    compositor.type_text("Found near the park").expect("type");
    assert_eq!(compositor.settle(), 1);

    assert!(compositor
        .document()
        .image_at(compositor.selection().focus)
        .is_none());
    assert_eq!(compositor.resize_images(SizeClass::Small), Some(handle));

    let image = compositor.document().image(handle).expect("image");
    assert_eq!(image.size(), SizeClass::Small);
    assert_eq!(image.size().width_percent(), 40);
    assert_eq!(image.load(), ImageLoad::Loaded { width: 400, height: 200 });

    let snapshot = DocumentSnapshot::capture(compositor.document(), compositor.canvas());
    let page = rasterizer.layout_engine().layout_snapshot(&snapshot);
    let objects = page.image_objects().collect::<Vec<_>>();
    assert_eq!(objects.len(), 1);
    assert_eq!((objects[0].width, objects[0].height), (100, 50));

    let raster = rasterizer.rasterize(&snapshot).expect("raster");
    assert_eq!(raster.diagnostics.decode_warnings, 0);
    assert!(page
        .content_commands
        .iter()
        .any(|cmd| matches!(cmd, DrawCommand::Text(_))));
}

#[test]
fn overflow_blocks_image_until_two_lines_are_deleted() {
    let (mut compositor, _) = compositor_with_rasterizer();
    type_until_overflow(&mut compositor);
    assert!(!compositor.can_submit());

    let before = compositor.document().clone();
    let err = compositor
        .insert_image(png_source(64, 64))
        .expect_err("insert while overflowed");
    assert!(matches!(err, ComposeError::BlockedByOverflow(_)));
    assert_eq!(compositor.banner(), Some(err.to_string().as_str()));
    assert_eq!(compositor.document(), &before);

    delete_trailing_lines(&mut compositor, 2);
    assert!(!compositor.is_overflowed());
    assert_ne!(compositor.banner(), Some(OVERFLOW_BANNER));

    let handle = compositor
        .insert_image(png_source(64, 64))
        .expect("insert after deleting");
    assert!(compositor.document().image(handle).is_some());
}

#[test]
fn image_with_broken_header_is_skipped_with_warning() {
    let (mut compositor, rasterizer) = compositor_with_rasterizer();
    compositor.type_text("Menu").expect("type");
    let mut bytes = png_bytes(40, 40, [10, 120, 10, 255]);
    bytes.truncate(20);
    let handle = compositor
        .insert_image(ImageSource::from_bytes(bytes).expect("png signature"))
        .expect("insert");
    assert_eq!(compositor.settle(), 0);
    assert_eq!(
        compositor.document().image(handle).map(|image| image.load()),
        Some(ImageLoad::Failed)
    );

    let uploader = RecordingUploader::accepting();
    let report = compositor
        .submit(&rasterizer, &uploader, |_| {})
        .expect("export still succeeds");
    assert_eq!(report.diagnostics.decode_warnings, 1);
    assert!(!report.output.is_fallback());
    assert_eq!(uploader.calls.get(), 1);
}
