//! Style-inlined XHTML markup of a notice, wrapped in an SVG `foreignObject`.
//!
//! Every run carries its fully computed style as an inline `style`
//! attribute, so the markup renders the same outside the editor.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use notice_compose::{Block, DocumentSnapshot, ImageBlock, Paragraph};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use crate::render_layout::LayoutEngine;

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Failure while serializing markup.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("markup write failed: {0}")]
    Write(String),
    #[error("markup is not valid utf-8: {0}")]
    Utf8(String),
}

type MarkupWriter = Writer<Vec<u8>>;

/// Serialize a snapshot as an SVG document sized to the export surface.
///
/// The background covers the whole surface; content sits in the layout box
/// at the top.
pub fn snapshot_to_svg(
    engine: &LayoutEngine,
    snapshot: &DocumentSnapshot,
) -> Result<String, MarkupError> {
    let engine = engine.reconfigured(snapshot.canvas());
    let cfg = engine.config();
    let (export_w, export_h) = snapshot.export_size();
    let (layout_w, layout_h) = snapshot.layout_size();

    let mut w = Writer::new(Vec::new());
    let size_w = export_w.to_string();
    let size_h = export_h.to_string();
    let view_box = format!("0 0 {export_w} {export_h}");
    start(
        &mut w,
        BytesStart::new("svg").with_attributes([
            ("xmlns", SVG_NS),
            ("width", size_w.as_str()),
            ("height", size_h.as_str()),
            ("viewBox", view_box.as_str()),
        ]),
    )?;
    start(
        &mut w,
        BytesStart::new("foreignObject").with_attributes([("width", "100%"), ("height", "100%")]),
    )?;

    let surface_style = format!(
        "box-sizing:border-box;width:{export_w}px;height:{export_h}px;margin:0;background:{}",
        snapshot.canvas().background.to_css()
    );
    start(
        &mut w,
        BytesStart::new("div")
            .with_attributes([("xmlns", XHTML_NS), ("style", surface_style.as_str())]),
    )?;
    let container_style = format!(
        "box-sizing:border-box;width:{layout_w}px;height:{layout_h}px;padding:{}px;\
         font-family:{};font-size:{}px;line-height:{};color:{};\
         white-space:pre-wrap;word-break:break-word;overflow:hidden",
        cfg.padding, cfg.font_family, cfg.font_size_px, cfg.line_height, cfg.text_color
    );
    start(
        &mut w,
        BytesStart::new("div").with_attributes([("style", container_style.as_str())]),
    )?;

    for block in snapshot.document().blocks() {
        match block {
            Block::Paragraph(paragraph) => write_paragraph(&mut w, &engine, paragraph)?,
            Block::Image(image) => write_image(&mut w, &engine, image)?,
        }
    }

    for name in ["div", "div", "foreignObject", "svg"] {
        end(&mut w, name)?;
    }
    String::from_utf8(w.into_inner()).map_err(|err| MarkupError::Utf8(err.to_string()))
}

fn write_paragraph(
    w: &mut MarkupWriter,
    engine: &LayoutEngine,
    paragraph: &Paragraph,
) -> Result<(), MarkupError> {
    let align = match paragraph.align {
        notice_compose::Alignment::Left => "text-align:left",
        notice_compose::Alignment::Center => "text-align:center",
    };
    start(w, BytesStart::new("div").with_attributes([("style", align)]))?;
    if paragraph.is_empty() {
        write(w, Event::Empty(BytesStart::new("br")))?;
    }
    for run in paragraph.runs() {
        let css = engine.resolve_style(run.style, paragraph.align).to_css();
        start(w, BytesStart::new("span").with_attributes([("style", css.as_str())]))?;
        write(w, Event::Text(BytesText::new(&run.text)))?;
        end(w, "span")?;
    }
    end(w, "div")
}

fn write_image(
    w: &mut MarkupWriter,
    engine: &LayoutEngine,
    image: &ImageBlock,
) -> Result<(), MarkupError> {
    let source = image.source();
    let src = format!(
        "data:{};base64,{}",
        source.mime_type(),
        STANDARD.encode(source.bytes())
    );
    let style = format!(
        "max-width:{}%;width:auto;height:auto;border-radius:{}px;display:block",
        image.size().width_percent(),
        engine.config().image_corner_radius_px
    );
    let handle = image.handle().to_string();
    start(
        w,
        BytesStart::new("div").with_attributes([(
            "style",
            "display:flex;justify-content:center;align-items:center",
        )]),
    )?;
    write(
        w,
        Event::Empty(BytesStart::new("img").with_attributes([
            ("src", src.as_str()),
            ("alt", ""),
            ("data-size", image.size().as_str()),
            ("data-handle", handle.as_str()),
            ("style", style.as_str()),
        ])),
    )?;
    end(w, "div")
}

fn start(w: &mut MarkupWriter, tag: BytesStart<'_>) -> Result<(), MarkupError> {
    write(w, Event::Start(tag))
}

fn end(w: &mut MarkupWriter, name: &str) -> Result<(), MarkupError> {
    write(w, Event::End(BytesEnd::new(name)))
}

fn write(w: &mut MarkupWriter, event: Event<'_>) -> Result<(), MarkupError> {
    w.write_event(event)
        .map_err(|err| MarkupError::Write(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notice_compose::{
        Alignment, CanvasConfig, Document, ImageSource, InlineFormat, InlineStyle, Position,
        SizeClass,
    };

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::new(4, 2);
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode");
        bytes
    }

    fn svg(document: &Document) -> String {
        let snapshot = DocumentSnapshot::capture(document, &CanvasConfig::portrait());
        snapshot_to_svg(&LayoutEngine::default(), &snapshot).expect("svg")
    }

    #[test]
    fn wraps_xhtml_in_foreign_object() {
        let out = svg(&Document::new());
        assert!(out.starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg" width="360" height="640""#));
        assert!(out.contains(r#"<foreignObject width="100%" height="100%">"#));
        assert!(out.contains(r#"<div xmlns="http://www.w3.org/1999/xhtml""#));
        assert!(out.contains("width:360px;height:480px;padding:55px"));
        assert!(out.contains("background:linear-gradient(180deg,#ffffff,#f8fafc)"));
        assert!(out.ends_with("</div></div></foreignObject></svg>"));
    }

    #[test]
    fn empty_paragraph_keeps_line_break() {
        let out = svg(&Document::new());
        assert!(out.contains(r#"<div style="text-align:left"><br/></div>"#));
    }

    #[test]
    fn runs_carry_computed_style() {
        let mut document = Document::from_paragraphs([Paragraph::from_text(
            "a <b> & c",
            InlineStyle::default(),
        )]);
        document.apply_inline(Position::new(0, 0), Position::new(0, 1), InlineFormat::Bold, true);
        document.set_alignment(0, 0, Alignment::Center);
        let out = svg(&document);
        assert!(out.contains(r#"<div style="text-align:center">"#));
        assert!(out.contains("font-weight:700"));
        assert!(out.contains("font-weight:400"));
        assert!(out.contains("&lt;b&gt; &amp; c</span>"));
    }

    #[test]
    fn images_are_inlined_as_data_urls() {
        let mut document = Document::new();
        let source = ImageSource::from_bytes(png_bytes()).expect("png");
        document.insert_image(Position::default(), source, SizeClass::Small);
        let out = svg(&document);
        assert!(out.contains(r#"src="data:image/png;base64,"#));
        assert!(out.contains("max-width:40%;width:auto;height:auto;border-radius:8px"));
        assert!(out.contains(r#"data-size="small""#));
    }
}
