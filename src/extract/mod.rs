//! High-resolution extraction of confirmed segments.
//!
//! Each page with at least one included segment is rendered once at the target
//! DPI. Segment rectangles, stored in preview pixels, are scaled by
//! `render_width / source_width` and cropped out of that render. Failures stay
//! local to their page; the job always visits every page.

mod scaler;
#[cfg(test)]
mod tests;

use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender};
use image::ImageError;
use tracing::{debug, info};

use crate::encoding::Encoding;
use crate::error::{ExtractionFailed, PageError};
use crate::model::{FailedPage, Run, Segment, WrittenSegment};
use crate::raster::{PageImage, PageRange, Rasterizer};

pub use scaler::{crop_segment, output_file_name, scale_factor, scale_rect};

/// Everything a worker needs; `segments` holds included segments only.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub document: PathBuf,
    pub segments: Run,
    pub output_dir: PathBuf,
    pub base_name: String,
    pub encoding: Encoding,
    pub dpi: u32,
}

#[derive(Debug, Clone)]
pub enum ExtractionEvent {
    PageStarted { page_number: u32, segments: usize },
    SegmentWritten(WrittenSegment),
    PageFailed(FailedPage),
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub pages_attempted: usize,
    pub written: Vec<WrittenSegment>,
    pub failures: Vec<FailedPage>,
}

impl ExtractionReport {
    pub fn status(&self) -> &'static str {
        match (self.written.is_empty(), self.failures.is_empty()) {
            (_, true) => "completed",
            (false, false) => "partial",
            (true, false) => "failed",
        }
    }

    /// The aggregate error, when any page failed.
    pub fn failure(&self) -> Option<ExtractionFailed> {
        (!self.failures.is_empty()).then(|| ExtractionFailed {
            failures: self.failures.clone(),
        })
    }
}

/// Run `job` on the current thread, posting progress to `events`.
pub fn run_job(
    job: &ExtractionJob,
    rasterizer: &dyn Rasterizer,
    events: &Sender<ExtractionEvent>,
) -> ExtractionReport {
    let mut report = ExtractionReport::default();

    for (&page_number, segments) in &job.segments {
        if segments.is_empty() {
            continue;
        }
        report.pages_attempted += 1;
        post(
            events,
            ExtractionEvent::PageStarted {
                page_number,
                segments: segments.len(),
            },
        );

        let results = match render_page(job, rasterizer, page_number) {
            Ok(page) => write_segments(job, &page, segments),
            Err(err) => {
                let failure = FailedPage {
                    page_number,
                    sub_index: None,
                    reason: err.to_string(),
                };
                post(events, ExtractionEvent::PageFailed(failure.clone()));
                report.failures.push(failure);
                continue;
            }
        };

        for (segment, result) in segments.iter().zip(results) {
            match result {
                Ok(written) => {
                    post(events, ExtractionEvent::SegmentWritten(written.clone()));
                    report.written.push(written);
                }
                Err(err) => {
                    let failure = FailedPage {
                        page_number,
                        sub_index: Some(segment.sub_index),
                        reason: err.to_string(),
                    };
                    post(events, ExtractionEvent::PageFailed(failure.clone()));
                    report.failures.push(failure);
                }
            }
        }
    }

    report
}

fn post(events: &Sender<ExtractionEvent>, event: ExtractionEvent) {
    if events.send(event).is_err() {
        debug!("extraction event dropped; receiver is gone");
    }
}

/// Render one page into a scratch directory that is removed on return.
fn render_page(
    job: &ExtractionJob,
    rasterizer: &dyn Rasterizer,
    page_number: u32,
) -> Result<PageImage, PageError> {
    let scratch = tempfile::Builder::new()
        .prefix("pagesplit-render-")
        .tempdir()
        .map_err(|source| PageError::Io {
            path: std::env::temp_dir(),
            source,
        })?;

    let rendered = rasterizer.render(
        &job.document,
        PageRange::Single(page_number),
        job.dpi,
        scratch.path(),
    )?;
    let render = rendered
        .into_iter()
        .find(|item| item.page_number == page_number)
        .ok_or_else(|| PageError::decode(page_number, "rasterizer returned no image"))?;

    let page = PageImage::open(&render)?;
    debug!(
        page = page_number,
        width = page.width(),
        height = page.height(),
        "rendered page for extraction"
    );
    Ok(page)
}

fn write_segments(
    job: &ExtractionJob,
    page: &PageImage,
    segments: &[Segment],
) -> Vec<Result<WrittenSegment, PageError>> {
    let numbered = segments.len() > 1;
    segments
        .iter()
        .map(|segment| {
            let (rect, cropped) = crop_segment(page, segment)?;
            let file_name = output_file_name(
                &job.base_name,
                segment.page_number,
                numbered.then_some(segment.sub_index),
                job.encoding,
            );
            let path = job.output_dir.join(file_name);
            job.encoding
                .prepare(cropped)
                .save_with_format(&path, job.encoding.image_format())
                .map_err(|err| write_error(&path, err))?;

            Ok(WrittenSegment {
                page_number: segment.page_number,
                sub_index: segment.sub_index,
                path: path.display().to_string(),
                rect,
            })
        })
        .collect()
}

fn write_error(path: &Path, err: ImageError) -> PageError {
    let source = match err {
        ImageError::IoError(source) => source,
        other => io::Error::other(other.to_string()),
    };
    PageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A job running on its own thread.
pub struct ExtractionWorker {
    events: Receiver<ExtractionEvent>,
    handle: JoinHandle<ExtractionReport>,
}

impl ExtractionWorker {
    pub fn spawn(job: ExtractionJob, rasterizer: Box<dyn Rasterizer + Send>) -> Result<Self> {
        let (sender, events) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name("pagesplit-extract".to_string())
            .spawn(move || run_job(&job, rasterizer.as_ref(), &sender))?;
        info!("extraction worker started");
        Ok(Self { events, handle })
    }

    /// Deliver every event to `on_event` until the worker finishes, then return its report.
    pub fn finish(self, mut on_event: impl FnMut(ExtractionEvent)) -> Result<ExtractionReport> {
        for event in self.events.iter() {
            on_event(event);
        }
        self.handle
            .join()
            .map_err(|_| anyhow!("extraction worker panicked"))
    }
}
