use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::FailedPage;

/// A rectangle with no area, or one reaching outside its image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("degenerate rectangle ({x0},{y0})-({x1},{y1})")]
pub struct GeometryError {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

/// Failures attributable to a single page of a run.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("rasterizer failed: {reason}")]
    Render { reason: String },

    #[error("page {page}: cannot decode rendered image: {reason}")]
    Decode { page: u32, reason: String },

    #[error("page {page} segment {sub_index}: {source}")]
    Geometry {
        page: u32,
        sub_index: u32,
        #[source]
        source: GeometryError,
    },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PageError {
    pub fn decode(page: u32, reason: impl ToString) -> Self {
        Self::Decode {
            page,
            reason: reason.to_string(),
        }
    }
}

/// Aggregate outcome of an extraction job that finished with at least one failed page.
#[derive(Debug, Error)]
#[error("extraction finished with {} failure(s) on page(s) {}", failures.len(), describe_pages(failures))]
pub struct ExtractionFailed {
    pub failures: Vec<FailedPage>,
}

fn describe_pages(failures: &[FailedPage]) -> String {
    let mut pages = failures
        .iter()
        .map(|failure| failure.page_number)
        .collect::<Vec<_>>();
    pages.dedup();
    pages
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
