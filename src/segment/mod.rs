pub mod line_detector;
pub mod segmenter;

use tracing::{debug, warn};

use crate::error::PageError;
use crate::model::{PageSize, Segment};
use crate::raster::{PageImage, RenderedPage};

pub use line_detector::{LumaView, SplitCandidate, detect_split};
pub use segmenter::Segmentation;

pub const DEFAULT_THRESHOLD: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Luminance below which a pixel counts as ink.
    pub threshold: u8,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Segments produced for one page plus the geometry they were computed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOutcome {
    pub size: PageSize,
    pub segments: Vec<Segment>,
}

impl PageOutcome {
    fn from_segmentation(page_number: u32, segmentation: Segmentation) -> Self {
        let size = PageSize {
            page_number,
            width: segmentation.width(),
            height: segmentation.height(),
            split_row: segmentation.boundary(),
        };
        Self {
            size,
            segments: segmentation.into_segments(page_number),
        }
    }

    /// A single full-page segment for a page whose pixels are unavailable.
    pub fn whole(page_number: u32, width: u32, height: u32) -> Result<Self, PageError> {
        let segmentation =
            Segmentation::from_split(width, height, None).map_err(|source| PageError::Geometry {
                page: page_number,
                sub_index: 1,
                source,
            })?;
        Ok(Self::from_segmentation(page_number, segmentation))
    }
}

/// Detect and segment an already decoded page.
pub fn segment_page(page: &PageImage, config: &DetectorConfig) -> Result<PageOutcome, PageError> {
    let luma = page.luminance();
    let (width, height) = luma.dimensions();
    let view = LumaView::new(luma.as_raw(), width, height)
        .ok_or_else(|| PageError::decode(page.page_number, "luminance buffer is truncated"))?;

    let split = detect_split(&view, config.threshold);
    if let Some(candidate) = split {
        debug!(page = page.page_number, row = candidate.y, score = candidate.score, "split candidate");
    }

    let segmentation = Segmentation::from_split(width, height, split.map(|candidate| candidate.y))
        .map_err(|source| PageError::Geometry {
            page: page.page_number,
            sub_index: 1,
            source,
        })?;
    Ok(PageOutcome::from_segmentation(page.page_number, segmentation))
}

/// Segment a rendered preview file.
///
/// A preview that cannot be decoded is kept whole, sized from its header. The
/// error is returned only when not even the header can be read.
pub fn segment_rendered(
    rendered: &RenderedPage,
    config: &DetectorConfig,
) -> Result<PageOutcome, PageError> {
    match PageImage::open(rendered) {
        Ok(page) => segment_page(&page, config),
        Err(err) => {
            warn!(page = rendered.page_number, error = %err, "preview did not decode; keeping page whole");
            let (width, height) = image::image_dimensions(&rendered.path)
                .map_err(|header_err| PageError::decode(rendered.page_number, header_err))?;
            PageOutcome::whole(rendered.page_number, width, height)
        }
    }
}
