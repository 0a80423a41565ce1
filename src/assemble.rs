//! Pack images into a PDF, one page per image.
//!
//! Pages are sized at 96 pixels per inch. JPEGs whose frame header declares
//! 8-bit samples with one or three components are embedded unchanged with
//! `DCTDecode`; everything else, CMYK JPEGs included, is flattened onto white
//! and stored zlib-compressed with `FlateDecode`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::{ColorType, DynamicImage, ImageFormat, ImageReader};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::debug;

use crate::encoding::flatten_onto_white;

const PIXELS_PER_INCH: f32 = 96.0;
const POINTS_PER_INCH: f32 = 72.0;

struct PageImageData {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: &'static str,
    data: Vec<u8>,
}

/// Write `images` to `output` in order. Returns the number of pages.
pub fn images_to_pdf(images: &[PathBuf], output: &Path) -> Result<usize> {
    if images.is_empty() {
        bail!("no images to assemble");
    }

    let mut doc = Document::with_version("1.5");
    let pages_id: ObjectId = doc.new_object_id();
    let mut kids = Vec::with_capacity(images.len());

    for path in images {
        let image = load_page_image(path)?;
        debug!(
            path = %path.display(),
            width = image.width,
            height = image.height,
            filter = image.filter,
            "embedding image"
        );
        let page_id = add_image_page(&mut doc, pages_id, image);
        kids.push(Object::from(page_id));
    }

    let count = kids.len();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(count)
}

fn add_image_page(doc: &mut Document, pages_id: ObjectId, image: PageImageData) -> ObjectId {
    let width_pt = image.width as f32 * POINTS_PER_INCH / PIXELS_PER_INCH;
    let height_pt = image.height as f32 * POINTS_PER_INCH / PIXELS_PER_INCH;

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(image.width),
            "Height" => i64::from(image.height),
            "ColorSpace" => image.color_space,
            "BitsPerComponent" => 8,
            "Filter" => image.filter,
        },
        image.data,
    ));

    let content = format!("q {width_pt} 0 0 {height_pt} 0 0 cm /Im0 Do Q");
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), width_pt.into(), height_pt.into()],
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
        "Contents" => content_id,
    })
}

fn load_page_image(path: &Path) -> Result<PageImageData> {
    let reader = ImageReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("failed to read {}", path.display()))?;
    let format = reader.format();
    let image = reader
        .decode()
        .with_context(|| format!("failed to decode {}", path.display()))?;

    if format == Some(ImageFormat::Jpeg) {
        let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        if let Some(color_space) = jpeg_color_space(&data) {
            return Ok(PageImageData {
                width: image.width(),
                height: image.height(),
                color_space,
                filter: "DCTDecode",
                data,
            });
        }
        debug!(path = %path.display(), "JPEG frame cannot be embedded as is; re-encoding");
    }

    let (color_space, pixels) = raw_pixels(&image);
    Ok(PageImageData {
        width: image.width(),
        height: image.height(),
        color_space,
        filter: "FlateDecode",
        data: deflate(&pixels)?,
    })
}

/// Color space for embedding `jpeg` unchanged: 8-bit gray or three-component frames only.
fn jpeg_color_space(jpeg: &[u8]) -> Option<&'static str> {
    match jpeg_frame(jpeg)? {
        (8, 1) => Some("DeviceGray"),
        (8, 3) => Some("DeviceRGB"),
        _ => None,
    }
}

/// Sample precision and component count from the first SOF marker.
fn jpeg_frame(jpeg: &[u8]) -> Option<(u8, u8)> {
    if !jpeg.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    loop {
        while *jpeg.get(pos)? == 0xFF && *jpeg.get(pos + 1)? == 0xFF {
            pos += 1;
        }
        if *jpeg.get(pos)? != 0xFF {
            return None;
        }
        let marker = *jpeg.get(pos + 1)?;
        match marker {
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            0xD9 | 0xDA => return None,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                return Some((*jpeg.get(pos + 4)?, *jpeg.get(pos + 9)?));
            }
            _ => {}
        }
        let length = u16::from_be_bytes([*jpeg.get(pos + 2)?, *jpeg.get(pos + 3)?]);
        pos += 2 + usize::from(length);
    }
}

fn raw_pixels(image: &DynamicImage) -> (&'static str, Vec<u8>) {
    match image.color() {
        ColorType::L8 => ("DeviceGray", image.to_luma8().into_raw()),
        color if color.has_alpha() => ("DeviceRGB", flatten_onto_white(image).into_raw()),
        _ => ("DeviceRGB", image.to_rgb8().into_raw()),
    }
}

fn deflate(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).context("failed to compress image data")?;
    encoder.finish().context("failed to compress image data")
}
