//! PDF re-emission from pixels.
//!
//! The output half of the pixel round-trip: takes the page image sequence
//! and writes a PDF whose every page is a single raster image. No text
//! objects, no name trees, no actions, no form fields — by construction
//! there is nothing in the emitted file but pixels and page scaffolding.
//!
//! Pages are letter-sized with each image centered inside a 40-point margin
//! budget, scaled by width first and rescaled by height when the scaled
//! height would overflow (letterboxing keeps the aspect ratio).

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::disarm::synthetic_info;
use crate::error::Result;

/// Letter page width in points.
pub const PAGE_WIDTH_PT: f64 = 612.0;

/// Letter page height in points.
pub const PAGE_HEIGHT_PT: f64 = 792.0;

/// Total margin budget per axis, in points.
const MARGIN_PT: f64 = 40.0;

/// JPEG quality for page images.
const JPEG_QUALITY: u8 = 85;

/// Compute the letterboxed placement `(width, height, x, y)` in points for
/// an image of the given pixel dimensions on a letter page.
///
/// Scale by width first; when the scaled height exceeds the available
/// height, rescale by height instead. The image is centered both ways.
pub(crate) fn letterbox(img_width: u32, img_height: u32) -> (f64, f64, f64, f64) {
    let aspect = img_height as f64 / img_width as f64;

    let mut width = PAGE_WIDTH_PT - MARGIN_PT;
    let mut height = width * aspect;

    let max_height = PAGE_HEIGHT_PT - MARGIN_PT;
    if height > max_height {
        height = max_height;
        width = height / aspect;
    }

    let x = (PAGE_WIDTH_PT - width) / 2.0;
    let y = (PAGE_HEIGHT_PT - height) / 2.0;
    (width, height, x, y)
}

/// Write the page image sequence as a letter-sized, image-only PDF.
///
/// An empty sequence produces a structurally valid zero-page document.
pub fn emit_pixel_pdf(pages: &[RgbImage], output: &Path) -> Result<()> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for img in pages {
        let (width, height) = img.dimensions();
        let placement = letterbox(width, height);
        let page_id = add_image_page(
            &mut doc,
            pages_id,
            img,
            PAGE_WIDTH_PT,
            PAGE_HEIGHT_PT,
            placement,
        )?;
        kids.push(Object::Reference(page_id));
    }

    finish_document(doc, pages_id, kids, output)?;
    debug!(pages = pages.len(), "emitted pixel-reconstructed pdf");
    Ok(())
}

/// Write a single image as a one-page PDF whose page box matches the image
/// at the given DPI (used by the format normalizer for image uploads).
pub fn emit_single_image_pdf(img: &RgbImage, dpi: u32, output: &Path) -> Result<()> {
    let (width, height) = img.dimensions();
    let page_w = width as f64 * 72.0 / dpi as f64;
    let page_h = height as f64 * 72.0 / dpi as f64;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = add_image_page(
        &mut doc,
        pages_id,
        img,
        page_w,
        page_h,
        (page_w, page_h, 0.0, 0.0),
    )?;

    finish_document(doc, pages_id, vec![Object::Reference(page_id)], output)
}

/// Encode one image as a DCT XObject and build a page that draws it at the
/// given placement. Returns the page's object id.
fn add_image_page(
    doc: &mut Document,
    pages_id: ObjectId,
    img: &RgbImage,
    page_w: f64,
    page_h: f64,
    placement: (f64, f64, f64, f64),
) -> Result<ObjectId> {
    let (width, height) = img.dimensions();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut Cursor::new(&mut jpeg), JPEG_QUALITY).encode(
        img.as_raw(),
        width,
        height,
        ExtendedColorType::Rgb8,
    )?;

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(width as i64),
            "Height" => Object::Integer(height as i64),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => Object::Integer(8),
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im0" => image_id },
    });

    let (draw_w, draw_h, x, y) = placement;
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(draw_w.round() as i64),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(draw_h.round() as i64),
                    Object::Integer(x.round() as i64),
                    Object::Integer(y.round() as i64),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(page_w.round() as i64),
            Object::Integer(page_h.round() as i64),
        ],
        "Resources" => resources_id,
        "Contents" => content_id,
    });
    Ok(page_id)
}

/// Install the page tree, catalog, and synthetic info, then save.
fn finish_document(
    mut doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    output: &Path,
) -> Result<()> {
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(synthetic_info());
    doc.trailer.set("Info", info_id);

    doc.save(output)?;
    Ok(())
}
