use std::path::PathBuf;

use notice_compose::{
    Alignment, Block, Compositor, FontSize, ImageLoad, InlineFormat, Rasterizer, SizeClass,
};
use notice_compose_embedded_graphics::EgRasterizer;
use notice_compose_web::{NoticeScript, ScriptError};

fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "notice-compose-web-{name}-{}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).expect("fixture dir");
    dir
}

fn write_png(dir: &PathBuf, name: &str, width: u32, height: u32) {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([30, 60, 90, 255]));
    img.save_with_format(dir.join(name), image::ImageFormat::Png)
        .expect("write png");
}

#[test]
fn script_builds_formatted_document() {
    let dir = fixture_dir("formatted");
    write_png(&dir, "door.png", 300, 150);
    let script = NoticeScript::parse(
        r#"{
            "background_preset": 2,
            "font_size": 20,
            "size_class": "small",
            "blocks": [
                {"text": "Closed today", "bold": true, "center": true},
                {"image": "door.png"},
                {"text": "Back tomorrow", "italic": true}
            ]
        }"#,
    )
    .expect("script");

    let rasterizer = EgRasterizer::default();
    let mut compositor = Compositor::new(rasterizer.layout_engine().clone());
    script.apply(&mut compositor, &dir).expect("apply");

    assert_eq!(compositor.canvas().font_size, FontSize::new(20));
    assert_eq!(compositor.default_size_class(), SizeClass::Small);
    let blocks = compositor.document().blocks();
    assert_eq!(blocks.len(), 3);

    let heading = blocks[0].as_paragraph().expect("heading");
    assert_eq!(heading.text(), "Closed today");
    assert_eq!(heading.align, Alignment::Center);
    assert!(heading.runs().iter().all(|run| run.style.has(InlineFormat::Bold)));

    let image = blocks[1].as_image().expect("image");
    assert_eq!(image.size(), SizeClass::Small);
    assert_eq!(image.load(), ImageLoad::Loaded { width: 300, height: 150 });

    match &blocks[2] {
        Block::Paragraph(tail) => {
            assert_eq!(tail.text(), "Back tomorrow");
            assert_eq!(tail.align, Alignment::Left);
            assert!(tail.runs().iter().all(|run| run.style.has(InlineFormat::Italic)));
        }
        Block::Image(_) => panic!("expected trailing paragraph"),
    }

    let job = compositor.begin_export_at(7).expect("export");
    let raster = rasterizer.rasterize(job.snapshot()).expect("raster");
    assert_eq!((raster.width, raster.height), (360, 640));
    assert_eq!(raster.diagnostics.decode_warnings, 0);
}

#[test]
fn overflowing_script_is_rejected() {
    let lines: Vec<String> = (0..40)
        .map(|idx| format!(r#"{{"text": "line {idx}"}}"#))
        .collect();
    let script =
        NoticeScript::parse(&format!(r#"{{"blocks": [{}]}}"#, lines.join(","))).expect("script");
    let rasterizer = EgRasterizer::default();
    let mut compositor = Compositor::new(rasterizer.layout_engine().clone());
    let err = script
        .apply(&mut compositor, &fixture_dir("overflow"))
        .expect_err("overflow");
    assert!(matches!(err, ScriptError::Compose(_)));
    assert!(compositor.is_overflowed());
}

#[test]
fn unknown_size_class_is_reported() {
    let script = NoticeScript::parse(r#"{"size_class": "huge"}"#).expect("script");
    let rasterizer = EgRasterizer::default();
    let mut compositor = Compositor::new(rasterizer.layout_engine().clone());
    let err = script
        .apply(&mut compositor, &fixture_dir("size"))
        .expect_err("bad size");
    assert!(matches!(err, ScriptError::UnknownSizeClass(ref key) if key == "huge"));
}

#[test]
fn missing_image_file_is_reported() {
    let script = NoticeScript::parse(r#"{"blocks": [{"image": "nope.png"}]}"#).expect("script");
    let rasterizer = EgRasterizer::default();
    let mut compositor = Compositor::new(rasterizer.layout_engine().clone());
    let err = script
        .apply(&mut compositor, &fixture_dir("missing"))
        .expect_err("missing");
    assert!(err.to_string().contains("nope.png"));
}
