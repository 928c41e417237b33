mod common;

use std::cell::Cell;

use common::fixtures::{
    compositor_with_rasterizer, png_source, type_until_overflow, RecordingUploader,
};
use notice_compose::{
    ComposeError, FormatCommand, ImageOutput, Key, KeyInput, Position, Selection, SizeClass,
};

#[test]
fn overflowed_canvas_rejects_every_content_adding_operation() {
    let (mut compositor, _) = compositor_with_rasterizer();
    type_until_overflow(&mut compositor);
    compositor.set_selection(Selection::range(Position::new(0, 0), Position::new(0, 4)));
    let before = compositor.document().clone();

    assert!(compositor.type_text("more").is_err());
    assert!(compositor.paste("pasted\ntext").is_err());
    assert!(compositor.key_down(KeyInput::char('x')).is_err());
    assert!(compositor.key_down(KeyInput::new(Key::Enter)).is_err());
    assert!(compositor.insert_image(png_source(20, 20)).is_err());
    for command in [
        FormatCommand::Bold,
        FormatCommand::Italic,
        FormatCommand::Underline,
        FormatCommand::ToggleCenter,
    ] {
        assert!(matches!(
            compositor.apply_format(command),
            Err(ComposeError::BlockedByOverflow(_))
        ));
    }

    assert_eq!(compositor.document(), &before);
    assert!(compositor.banner().is_some());
}

#[test]
fn undo_backs_out_of_an_overflowing_paste() {
    let (mut compositor, _) = compositor_with_rasterizer();
    compositor.type_text("Bake sale").expect("type");
    let before = compositor.document().clone();
    compositor
        .paste(&"one more line\n".repeat(40))
        .expect("paste before overflow");
    assert!(compositor.is_overflowed());

    compositor
        .key_down(KeyInput::ctrl('z'))
        .expect("undo that shrinks is allowed");
    assert_eq!(compositor.document(), &before);
    assert!(!compositor.is_overflowed());
    assert!(compositor.can_submit());
}

#[test]
fn deletion_shrinks_the_document_even_when_overflowed() {
    let (mut compositor, _) = compositor_with_rasterizer();
    type_until_overflow(&mut compositor);

    let size = compositor.document().size();
    assert!(compositor.delete_backward());
    assert!(compositor.document().size() < size);

    let size = compositor.document().size();
    compositor.set_caret(Position::new(0, 0));
    assert!(compositor.delete_forward());
    assert!(compositor.document().size() < size);

    let size = compositor.document().size();
    compositor.set_caret(Position::new(0, 2));
    assert!(compositor.key_down(KeyInput::new(Key::Backspace)).is_ok());
    assert!(compositor.document().size() < size);
}

#[test]
fn resize_without_image_under_caret_changes_only_latest_insert() {
    let (mut compositor, _) = compositor_with_rasterizer();
    let first = compositor.insert_image(png_source(100, 50)).expect("first");
    compositor.type_text("between").expect("type");
    let second = compositor.insert_image(png_source(100, 50)).expect("second");
    compositor.type_text("after").expect("type");
    compositor.settle();

    assert!(compositor
        .document()
        .image_at(compositor.selection().focus)
        .is_none());
    assert_eq!(compositor.resize_images(SizeClass::Large), Some(second));

    let doc = compositor.document();
    assert_eq!(doc.image(first).map(|img| img.size()), Some(SizeClass::Medium));
    assert_eq!(doc.image(second).map(|img| img.size()), Some(SizeClass::Large));
}

#[test]
fn resize_prefers_image_under_caret() {
    let (mut compositor, _) = compositor_with_rasterizer();
    let first = compositor.insert_image(png_source(100, 50)).expect("first");
    let second = compositor.insert_image(png_source(100, 50)).expect("second");
    compositor.settle();

    let first_idx = compositor.document().image_index(first).expect("index");
    compositor.set_caret(Position::new(first_idx, 0));
    assert_eq!(compositor.resize_images(SizeClass::Small), Some(first));

    let doc = compositor.document();
    assert_eq!(doc.image(first).map(|img| img.size()), Some(SizeClass::Small));
    assert_eq!(doc.image(second).map(|img| img.size()), Some(SizeClass::Medium));
}

#[test]
fn rejected_upload_still_delivers_local_raster() {
    let (mut compositor, rasterizer) = compositor_with_rasterizer();
    compositor.type_text("Lost cat").expect("type");
    let uploader = RecordingUploader::rejecting(500);

    let delivered = Cell::new(false);
    let report = compositor
        .submit(&rasterizer, &uploader, |output| {
            delivered.set(true);
            match output {
                ImageOutput::LocalFallback(url) => {
                    assert!(url.starts_with("data:image/png;base64,"));
                }
                ImageOutput::Uploaded(_) => panic!("upload should have failed"),
            }
        })
        .expect("submit");

    assert!(delivered.get());
    assert!(report.output.is_fallback());
    assert!(matches!(
        report.upload_error,
        Some(notice_compose::UploadError::Status { status: 500, .. })
    ));
    assert_eq!(uploader.calls.get(), 1);
}

#[test]
fn bold_twice_restores_format_state() {
    let (mut compositor, _) = compositor_with_rasterizer();
    compositor.type_text("Opening hours").expect("type");
    compositor.set_selection(Selection::range(Position::new(0, 0), Position::new(0, 7)));
    let original = compositor.format_state().bold;

    let once = compositor.apply_format(FormatCommand::Bold).expect("bold");
    assert_ne!(once.bold, original);
    let twice = compositor.apply_format(FormatCommand::Bold).expect("bold");
    assert_eq!(twice.bold, original);

    // Collapsed caret toggles the pending style the same way.
    compositor.set_caret(Position::new(0, 13));
    let original = compositor.format_state().bold;
    compositor.apply_format(FormatCommand::Bold).expect("bold");
    let twice = compositor.apply_format(FormatCommand::Bold).expect("bold");
    assert_eq!(twice.bold, original);
}

#[test]
fn repeated_submit_uploads_once() {
    let (mut compositor, rasterizer) = compositor_with_rasterizer();
    compositor.type_text("Fire drill at noon").expect("type");
    let uploader = RecordingUploader::accepting();

    let job = compositor.begin_export_at(1_700_000_000_000).expect("first click");
    assert!(!compositor.can_submit());
    for _ in 0..5 {
        assert!(matches!(
            compositor.submit(&rasterizer, &uploader, |_| panic!("no callback while busy")),
            Err(ComposeError::ExportInFlight)
        ));
    }
    let report = compositor
        .finish_export(job.run(&rasterizer, &uploader))
        .expect("export");

    assert_eq!(uploader.calls.get(), 1);
    assert_eq!(report.file_name, "notice_1700000000000.png");
    assert!(compositor.can_submit());
}
