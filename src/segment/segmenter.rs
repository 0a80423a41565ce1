use std::ops::Range;

use tracing::debug;

use crate::error::GeometryError;
use crate::model::{Rect, Segment};

/// Rows dropped on each side of a detected boundary so the rule itself is not cropped.
pub const BOUNDARY_MARGIN: i64 = 2;

/// Crop rectangles for one page, top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    width: u32,
    height: u32,
    boundary: Option<u32>,
    rects: Vec<Rect>,
}

impl Segmentation {
    /// Split a `width x height` page at `split_row`, or keep it whole.
    ///
    /// A split whose margins would leave an empty half falls back to the whole page.
    /// Only an empty page is an error.
    pub fn from_split(
        width: u32,
        height: u32,
        split_row: Option<u32>,
    ) -> Result<Self, GeometryError> {
        let full = Rect::full(width, height)?;

        let Some(boundary) = split_row else {
            return Ok(Self::unsplit(width, height, full));
        };

        match split_rects(width, height, boundary) {
            Ok([top, bottom]) => Ok(Self {
                width,
                height,
                boundary: Some(boundary),
                rects: vec![top, bottom],
            }),
            Err(err) => {
                debug!(boundary, height, error = %err, "split too close to page edge; keeping page whole");
                Ok(Self::unsplit(width, height, full))
            }
        }
    }

    fn unsplit(width: u32, height: u32, full: Rect) -> Self {
        Self {
            width,
            height,
            boundary: None,
            rects: vec![full],
        }
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// The boundary actually used; `None` when the page stayed whole.
    pub fn boundary(&self) -> Option<u32> {
        self.boundary
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Band of page rows owned by the rect at `index`. Bands tile `[0, height)`;
    /// margin rows next to a boundary belong to the band but not to its crop.
    pub fn owned_rows(&self, index: usize) -> Option<Range<u32>> {
        match (self.boundary, index) {
            (None, 0) => Some(0..self.height),
            (Some(boundary), 0) => Some(0..boundary),
            (Some(boundary), 1) => Some(boundary..self.height),
            _ => None,
        }
    }

    /// Number the rects `1..=N` and attach the source geometry.
    pub fn into_segments(self, page_number: u32) -> Vec<Segment> {
        let source_width = self.width;
        self.rects
            .into_iter()
            .zip(1_u32..)
            .map(|(rect, sub_index)| Segment {
                page_number,
                sub_index,
                rect,
                source_width,
            })
            .collect()
    }
}

fn split_rects(width: u32, height: u32, boundary: u32) -> Result<[Rect; 2], GeometryError> {
    if boundary >= height {
        return Err(GeometryError {
            x0: 0,
            y0: boundary,
            x1: width,
            y1: height,
        });
    }
    let boundary = i64::from(boundary);
    let top = Rect::from_signed(0, 0, i64::from(width), boundary - BOUNDARY_MARGIN)?;
    let bottom = Rect::from_signed(
        0,
        boundary + BOUNDARY_MARGIN,
        i64::from(width),
        i64::from(height),
    )?;
    Ok([top, bottom])
}
