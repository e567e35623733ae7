use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use std::io::Write;
use std::path::Path;

use crate::error::{Result, SealError};

// US Letter, in points.
pub const PAGE_WIDTH_PT: f32 = 612.0;
pub const PAGE_HEIGHT_PT: f32 = 792.0;

pub const STAMP_FONT: &str = "Helvetica-Bold";
pub const STAMP_FONT_SIZE: f32 = 10.0;

const FONT_RESOURCE: &str = "F1";
const IMAGE_RESOURCE: &str = "Seal";

/// Where the seal goes on the page. Coordinates are PDF points with the
/// origin at the bottom-left corner. Validated on construction from
/// [`crate::config::PositionSettings`], so width and height are positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampGeometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub text_offset_y: f32,
}

impl StampGeometry {
    pub fn text_y(&self) -> f32 {
        self.y + self.text_offset_y
    }
}

/// Renders the seal image, plus an optional single line of bold text, onto
/// a fresh Letter-sized page and writes it to `output_path`, replacing any
/// existing file.
pub fn create_overlay(
    image_path: &Path,
    output_path: &Path,
    geometry: &StampGeometry,
    text: Option<&str>,
) -> Result<()> {
    let mut doc = build_overlay(image_path, geometry, text)?;
    doc.save(output_path)?;
    Ok(())
}

pub fn build_overlay(
    image_path: &Path,
    geometry: &StampGeometry,
    text: Option<&str>,
) -> Result<Document> {
    if !image_path.exists() {
        return Err(SealError::NotFound(image_path.to_path_buf()));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = add_image_xobject(&mut doc, image_path)?;
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => STAMP_FONT,
    });

    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                geometry.width.into(),
                0.into(),
                0.into(),
                geometry.height.into(),
                geometry.x.into(),
                geometry.y.into(),
            ],
        ),
        Operation::new("Do", vec![IMAGE_RESOURCE.into()]),
        Operation::new("Q", vec![]),
    ];

    if let Some(text) = text.filter(|t| !t.is_empty()) {
        operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![FONT_RESOURCE.into(), STAMP_FONT_SIZE.into()]),
            Operation::new("Td", vec![geometry.x.into(), geometry.text_y().into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]);
    }

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH_PT.into(), PAGE_HEIGHT_PT.into()],
        "Resources" => dictionary! {
            "Font" => dictionary! { FONT_RESOURCE => font_id },
            "XObject" => dictionary! { IMAGE_RESOURCE => image_id },
        },
        "Contents" => content_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    Ok(doc)
}

/// Decodes the image and stores it as an RGB image XObject with its alpha
/// channel in a separate soft mask.
fn add_image_xobject(doc: &mut Document, image_path: &Path) -> Result<ObjectId> {
    let img = image::open(image_path)?.to_rgba8();
    let (width, height) = img.dimensions();

    let mut alpha_buf = Vec::with_capacity((width * height) as usize);
    let mut rgb_buf = Vec::with_capacity((width * height * 3) as usize);

    for pixel in img.pixels() {
        let [r, g, b, a] = pixel.0;
        rgb_buf.extend_from_slice(&[r, g, b]);
        alpha_buf.push(a);
    }

    let smask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        deflate(&alpha_buf)?,
    ));

    Ok(doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
            "SMask" => Object::Reference(smask_id),
        },
        deflate(&rgb_buf)?,
    )))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn geometry() -> StampGeometry {
        StampGeometry { x: 400.0, y: 50.0, width: 150.0, height: 100.0, text_offset_y: -20.0 }
    }

    fn write_seal(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("seal.png");
        RgbaImage::from_pixel(8, 4, Rgba([0, 0, 255, 128])).save(&path).unwrap();
        path
    }

    fn page_content(doc: &Document) -> String {
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
    }

    #[test]
    fn overlay_has_one_letter_page_with_image_and_text() {
        let dir = TempDir::new().unwrap();
        let seal = write_seal(&dir);
        let out = dir.path().join("overlay.pdf");

        create_overlay(&seal, &out, &geometry(), Some("ACME Corp")).unwrap();

        let doc = Document::load(&out).unwrap();
        assert_eq!(doc.get_pages().len(), 1);

        let content = page_content(&doc);
        assert!(content.contains("/Seal Do"));
        assert!(content.contains("(ACME Corp) Tj"));
        assert!(content.contains("/F1 ") && content.contains(" Tf"));

        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let media_box = doc.get_dictionary(page_id).unwrap().get(b"MediaBox").unwrap();
        assert_eq!(media_box.as_array().unwrap().len(), 4);
        assert!(doc.trailer.get(b"Creator").is_err());
    }

    #[test]
    fn empty_text_draws_image_only() {
        let dir = TempDir::new().unwrap();
        let seal = write_seal(&dir);

        let doc = build_overlay(&seal, &geometry(), Some("")).unwrap();
        let content = page_content(&doc);
        assert!(content.contains("/Seal Do"));
        assert!(!content.contains("Tj"));
    }

    #[test]
    fn image_xobject_keeps_pixel_dimensions_and_alpha() {
        let dir = TempDir::new().unwrap();
        let seal = write_seal(&dir);
        let doc = build_overlay(&seal, &geometry(), None).unwrap();

        let image = doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .find(|s| s.dict.get(b"SMask").is_ok())
            .unwrap();
        assert_eq!(image.dict.get(b"Width").unwrap().as_i64().unwrap(), 8);
        assert_eq!(image.dict.get(b"Height").unwrap().as_i64().unwrap(), 4);
    }

    #[test]
    fn missing_image_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = build_overlay(&dir.path().join("nope.png"), &geometry(), None).unwrap_err();
        assert!(matches!(err, SealError::NotFound(_)));
    }

    #[test]
    fn corrupt_image_is_a_render_error() {
        let dir = TempDir::new().unwrap();
        let seal = dir.path().join("seal.png");
        std::fs::write(&seal, b"definitely not a png").unwrap();

        let err = build_overlay(&seal, &geometry(), None).unwrap_err();
        assert!(matches!(err, SealError::Image(_)));
    }
}
