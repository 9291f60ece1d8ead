//! PDF serialisation of a [`LaidOutDocument`] with `lopdf`.
//!
//! One shared resource dictionary (two base-14 fonts, optional image
//! XObject) hangs off the page tree; each page gets its own content stream.
//! Layout coordinates are top-down millimetres; PDF user space is bottom-up
//! points, so every y is flipped here and nowhere else.

use super::embed::EmbeddedImage;
use super::layout::{LaidOutDocument, TextRun};
use super::metrics::{Font, MM_PER_PT};
use crate::error::RenderError;
use crate::report::REPORT_TITLE;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::debug;

const IMAGE_KEY: &str = "Im1";

fn pt(mm: f32) -> f32 {
    mm / MM_PER_PT
}

/// Serialise `doc` to PDF bytes.
pub fn write_pdf(
    doc: &LaidOutDocument,
    image: Option<&EmbeddedImage>,
) -> Result<Vec<u8>, RenderError> {
    let mut pdf = Document::with_version("1.5");
    let pages_id = pdf.new_object_id();

    let mut fonts = lopdf::Dictionary::new();
    for font in [Font::Regular, Font::Bold] {
        let id = pdf.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_name(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(font.resource_key(), id);
    }

    let mut resources = dictionary! { "Font" => fonts };
    if let Some(img) = image {
        let id = add_image(&mut pdf, img);
        resources.set("XObject", dictionary! { IMAGE_KEY => id });
    }
    let resources_id = pdf.add_object(resources);

    let page_height_pt = pt(doc.height_mm);
    let mut kids = Vec::with_capacity(doc.pages.len());
    for page in &doc.pages {
        let mut ops = Vec::new();
        if let (Some(placed), Some(_)) = (page.image, image) {
            let w = pt(placed.width_mm);
            let h = pt(placed.height_mm);
            let x = pt(placed.x_mm);
            let y = page_height_pt - pt(placed.top_mm) - h;
            ops.push(Operation::new("q", vec![]));
            ops.push(Operation::new(
                "cm",
                vec![w.into(), 0.into(), 0.into(), h.into(), x.into(), y.into()],
            ));
            ops.push(Operation::new("Do", vec![Object::Name(IMAGE_KEY.into())]));
            ops.push(Operation::new("Q", vec![]));
        }
        for run in page.lines.iter().chain(page.footer.iter()) {
            push_text(&mut ops, run, page_height_pt);
        }

        let content = Content { operations: ops }
            .encode()
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let page_count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::from(pt(doc.width_mm)),
            Object::from(page_height_pt),
        ],
    };
    pdf.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = pdf.add_object(dictionary! {
        "Title" => Object::string_literal(REPORT_TITLE),
        "Producer" => Object::string_literal(concat!("evalume ", env!("CARGO_PKG_VERSION"))),
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.trailer.set("Info", info_id);
    pdf.compress();

    let mut out = Vec::new();
    pdf.save_to(&mut out)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
    debug!("Serialised {} page(s), {} bytes", page_count, out.len());
    Ok(out)
}

fn add_image(pdf: &mut Document, img: &EmbeddedImage) -> ObjectId {
    let mut stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(img.size.width_px),
            "Height" => i64::from(img.size.height_px),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        img.jpeg.clone(),
    );
    // Already JPEG; Flate on top would only waste time.
    stream.allows_compression = false;
    pdf.add_object(stream)
}

fn push_text(ops: &mut Vec<Operation>, run: &TextRun, page_height_pt: f32) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![
            Object::Name(run.font.resource_key().into()),
            run.size_pt.into(),
        ],
    ));
    ops.push(Operation::new(
        "Td",
        vec![
            pt(run.x_mm).into(),
            (page_height_pt - pt(run.baseline_mm)).into(),
        ],
    ));
    ops.push(Operation::new(
        "Tj",
        vec![Object::String(encode_win_ansi(&run.text), StringFormat::Literal)],
    ));
    ops.push(Operation::new("ET", vec![]));
}

/// Encode for `/WinAnsiEncoding`. Unmappable characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' => b' ',
            c if (c as u32) < 0x20 => b'?',
            c if (c as u32) < 0x7F => c as u8,
            c if (0xA0..=0xFF).contains(&(c as u32)) => c as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}
