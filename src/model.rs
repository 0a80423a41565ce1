use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::registry::SelectionRegistry;

/// Half-open pixel rectangle: columns `x0..x1`, rows `y0..y1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Result<Self, GeometryError> {
        if x0 >= x1 || y0 >= y1 {
            return Err(GeometryError { x0, y0, x1, y1 });
        }
        Ok(Self { x0, y0, x1, y1 })
    }

    /// Build a rectangle from signed coordinates, rejecting anything negative or empty.
    pub fn from_signed(x0: i64, y0: i64, x1: i64, y1: i64) -> Result<Self, GeometryError> {
        let clamp = |value: i64| u32::try_from(value.max(0)).unwrap_or(u32::MAX);
        if x0 < 0 || y0 < 0 || x1 <= x0 || y1 <= y0 {
            return Err(GeometryError {
                x0: clamp(x0),
                y0: clamp(y0),
                x1: clamp(x1),
                y1: clamp(y1),
            });
        }
        Self::new(clamp(x0), clamp(y0), clamp(x1), clamp(y1))
    }

    pub fn full(width: u32, height: u32) -> Result<Self, GeometryError> {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// Intersect with `(0, 0, width, height)`.
    pub fn clamp_to(&self, width: u32, height: u32) -> Result<Self, GeometryError> {
        Self::new(
            self.x0.min(width),
            self.y0.min(height),
            self.x1.min(width),
            self.y1.min(height),
        )
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})-({},{})", self.x0, self.y0, self.x1, self.y1)
    }
}

/// Identity of a segment within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId {
    pub page_number: u32,
    pub sub_index: u32,
}

impl SegmentId {
    pub fn new(page_number: u32, sub_index: u32) -> Self {
        Self {
            page_number,
            sub_index,
        }
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page_number, self.sub_index)
    }
}

impl FromStr for SegmentId {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (page, sub) = raw
            .split_once(':')
            .ok_or_else(|| format!("expected PAGE:SUB, got '{raw}'"))?;
        let page_number = page
            .trim()
            .parse::<u32>()
            .map_err(|err| format!("invalid page number '{page}': {err}"))?;
        let sub_index = sub
            .trim()
            .parse::<u32>()
            .map_err(|err| format!("invalid sub-index '{sub}': {err}"))?;
        if page_number == 0 || sub_index == 0 {
            return Err(format!("page and sub-index start at 1, got '{raw}'"));
        }
        Ok(Self::new(page_number, sub_index))
    }
}

/// One rectangular region of a page, in the pixel space of the preview it was detected on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub page_number: u32,
    pub sub_index: u32,
    pub rect: Rect,
    pub source_width: u32,
}

impl Segment {
    pub fn id(&self) -> SegmentId {
        SegmentId::new(self.page_number, self.sub_index)
    }
}

/// All segments of a document keyed by page, each list in top-to-bottom order.
pub type Run = BTreeMap<u32, Vec<Segment>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRef {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSize {
    pub page_number: u32,
    pub width: u32,
    pub height: u32,
    pub split_row: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub updated_at: String,
    pub document: DocumentRef,
    pub preview_dpi: u32,
    pub threshold: u8,
    pub page_count: usize,
    pub pages: Vec<PageSize>,
    pub segments: Run,
    pub selection: SelectionRegistry,
    pub warnings: Vec<String>,
    /// Report of the most recent extraction from this run.
    #[serde(default)]
    pub last_report: Option<String>,
}

impl RunManifest {
    pub fn segment_count(&self) -> usize {
        self.segments.values().map(Vec::len).sum()
    }

    pub fn split_page_count(&self) -> usize {
        self.segments.values().filter(|list| list.len() > 1).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrittenSegment {
    pub page_number: u32,
    pub sub_index: u32,
    pub path: String,
    pub rect: Rect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedPage {
    pub page_number: u32,
    pub sub_index: Option<u32>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub document: DocumentRef,
    pub output_dir: String,
    pub base_name: String,
    pub format: String,
    pub dpi: u32,
    pub pages_attempted: usize,
    pub written: Vec<WrittenSegment>,
    pub failures: Vec<FailedPage>,
}
