use image::DynamicImage;

use crate::encoding::Encoding;
use crate::error::{GeometryError, PageError};
use crate::model::{Rect, Segment};
use crate::raster::PageImage;

/// Ratio between a high-resolution render and the preview a segment was detected on.
pub fn scale_factor(high_width: u32, source_width: u32) -> f64 {
    f64::from(high_width) / f64::from(source_width.max(1))
}

/// Scale every coordinate by the same factor and round to the nearest pixel.
pub fn scale_rect(rect: &Rect, scale: f64) -> Result<Rect, GeometryError> {
    let scaled = |value: u32| (f64::from(value) * scale).round() as i64;
    Rect::from_signed(
        scaled(rect.x0),
        scaled(rect.y0),
        scaled(rect.x1),
        scaled(rect.y1),
    )
}

/// Map `segment` onto `page` and cut it out. The scaled rect is clamped to the
/// page since rounding along the height can overshoot by a pixel.
pub fn crop_segment(page: &PageImage, segment: &Segment) -> Result<(Rect, DynamicImage), PageError> {
    let geometry = |source: GeometryError| PageError::Geometry {
        page: segment.page_number,
        sub_index: segment.sub_index,
        source,
    };

    let scale = scale_factor(page.width(), segment.source_width);
    let rect = scale_rect(&segment.rect, scale)
        .and_then(|scaled| scaled.clamp_to(page.width(), page.height()))
        .map_err(geometry)?;

    let cropped = page
        .image
        .crop_imm(rect.x0, rect.y0, rect.width(), rect.height());
    Ok((rect, cropped))
}

/// `{base}_p{page}.{ext}` or `{base}_p{page}_{sub}.{ext}`.
pub fn output_file_name(
    base_name: &str,
    page_number: u32,
    sub_index: Option<u32>,
    encoding: Encoding,
) -> String {
    match sub_index {
        Some(sub_index) => format!(
            "{base_name}_p{page_number}_{sub_index}.{}",
            encoding.extension()
        ),
        None => format!("{base_name}_p{page_number}.{}", encoding.extension()),
    }
}
