use std::path::Path;
use std::sync::{Arc, Mutex};

use image::{GenericImageView, Rgb, RgbImage};

use super::*;
use crate::model::Rect;
use crate::raster::RenderedPage;

const LOW_WIDTH: u32 = 200;
const HIGH: (u32, u32) = (800, 1040);

#[derive(Clone, Default)]
struct FakeRasterizer {
    failing: Vec<u32>,
    calls: Arc<Mutex<Vec<u32>>>,
}

impl FakeRasterizer {
    fn failing_on(pages: &[u32]) -> Self {
        Self {
            failing: pages.to_vec(),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<u32> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl Rasterizer for FakeRasterizer {
    fn render(
        &self,
        _document: &Path,
        pages: PageRange,
        _dpi: u32,
        output_dir: &Path,
    ) -> Result<Vec<RenderedPage>, PageError> {
        let PageRange::Single(page) = pages else {
            return Err(PageError::Render {
                reason: "fake renders single pages only".to_string(),
            });
        };
        self.calls.lock().expect("calls lock").push(page);
        if self.failing.contains(&page) {
            return Err(PageError::decode(page, "simulated rasterizer crash"));
        }

        let image = RgbImage::from_fn(HIGH.0, HIGH.1, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, page as u8])
        });
        let path = output_dir.join(format!("page-{page}.png"));
        image
            .save(&path)
            .map_err(|err| PageError::decode(page, err))?;
        Ok(vec![RenderedPage {
            page_number: page,
            path,
        }])
    }
}

fn segment(page_number: u32, sub_index: u32, rect: (u32, u32, u32, u32)) -> Segment {
    Segment {
        page_number,
        sub_index,
        rect: Rect::new(rect.0, rect.1, rect.2, rect.3).expect("rect"),
        source_width: LOW_WIDTH,
    }
}

fn three_page_run() -> Run {
    let mut run = Run::new();
    run.insert(1, vec![segment(1, 1, (0, 0, 200, 260))]);
    run.insert(2, vec![segment(2, 1, (0, 0, 200, 260))]);
    run.insert(
        3,
        vec![
            segment(3, 1, (0, 0, 200, 128)),
            segment(3, 2, (0, 132, 200, 260)),
        ],
    );
    run
}

fn job(output_dir: &Path, segments: Run) -> ExtractionJob {
    ExtractionJob {
        document: PathBuf::from("labels.pdf"),
        segments,
        output_dir: output_dir.to_path_buf(),
        base_name: "base".to_string(),
        encoding: Encoding::Png,
        dpi: 200,
    }
}

fn run_collecting(job: &ExtractionJob, rasterizer: &FakeRasterizer) -> (ExtractionReport, Vec<ExtractionEvent>) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    let report = run_job(job, rasterizer, &sender);
    drop(sender);
    (report, receiver.iter().collect())
}

#[test]
fn scale_maps_preview_rect_onto_high_resolution() {
    let scale = scale_factor(800, 200);
    assert_eq!(scale, 4.0);

    let rect = Rect::new(10, 20, 190, 100).expect("rect");
    assert_eq!(
        scale_rect(&rect, scale).expect("scaled"),
        Rect::new(40, 80, 760, 400).expect("expected")
    );
}

#[test]
fn scale_rounds_to_nearest_pixel() {
    let rect = Rect::new(1, 1, 3, 3).expect("rect");
    let scaled = scale_rect(&rect, 2.5).expect("scaled");
    assert_eq!(scaled, Rect::new(3, 3, 8, 8).expect("expected"));
}

#[test]
fn output_names_carry_sub_index_only_when_asked() {
    assert_eq!(output_file_name("base", 3, None, Encoding::Png), "base_p3.png");
    assert_eq!(output_file_name("base", 3, Some(1), Encoding::Png), "base_p3_1.png");
    assert_eq!(output_file_name("base", 3, Some(2), Encoding::Jpeg), "base_p3_2.jpg");
}

#[test]
fn crop_is_clamped_to_render_bounds() {
    let page = PageImage {
        page_number: 1,
        image: image::DynamicImage::ImageRgb8(RgbImage::new(10, 9)),
    };
    let segment = Segment {
        page_number: 1,
        sub_index: 1,
        rect: Rect::new(0, 0, 3, 3).expect("rect"),
        source_width: 3,
    };

    let (rect, cropped) = crop_segment(&page, &segment).expect("crop");
    assert_eq!(rect, Rect::new(0, 0, 10, 9).expect("clamped"));
    assert_eq!(cropped.dimensions(), (10, 9));
}

#[test]
fn crop_outside_render_is_a_geometry_error() {
    let page = PageImage {
        page_number: 4,
        image: image::DynamicImage::ImageRgb8(RgbImage::new(100, 100)),
    };
    let segment = Segment {
        page_number: 4,
        sub_index: 2,
        rect: Rect::new(0, 150, 100, 200).expect("rect"),
        source_width: 100,
    };

    let err = crop_segment(&page, &segment).expect_err("rect lies below the page");
    assert!(matches!(
        err,
        PageError::Geometry {
            page: 4,
            sub_index: 2,
            ..
        }
    ));
}

#[test]
fn extraction_writes_every_included_segment() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut segments = three_page_run();
    segments.remove(&2);
    let rasterizer = FakeRasterizer::default();

    let (report, _) = run_collecting(&job(dir.path(), segments), &rasterizer);

    assert!(report.failures.is_empty());
    assert_eq!(report.status(), "completed");
    assert_eq!(report.pages_attempted, 2);
    assert_eq!(rasterizer.calls(), vec![1, 3], "one render per page");

    let single = image::open(dir.path().join("base_p1.png")).expect("page 1 output");
    assert_eq!(single.dimensions(), HIGH);

    let top = image::open(dir.path().join("base_p3_1.png")).expect("top output");
    assert_eq!(top.dimensions(), (800, 512));

    let bottom = image::open(dir.path().join("base_p3_2.png")).expect("bottom output");
    assert_eq!(bottom.dimensions(), (800, 512));
    // Bottom crop starts at high-resolution row 528.
    assert_eq!(bottom.to_rgb8().get_pixel(0, 0), &Rgb([0, (528 % 256) as u8, 3]));
}

#[test]
fn single_included_segment_on_split_page_has_no_suffix() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut segments = Run::new();
    segments.insert(3, vec![segment(3, 2, (0, 132, 200, 260))]);

    let (report, _) = run_collecting(&job(dir.path(), segments), &FakeRasterizer::default());

    assert_eq!(report.written.len(), 1);
    assert!(dir.path().join("base_p3.png").exists());
    assert!(!dir.path().join("base_p3_2.png").exists());
}

#[test]
fn failed_page_does_not_stop_the_others() {
    let dir = tempfile::tempdir().expect("temp dir");
    let rasterizer = FakeRasterizer::failing_on(&[2]);

    let (report, events) = run_collecting(&job(dir.path(), three_page_run()), &rasterizer);

    assert_eq!(rasterizer.calls(), vec![1, 2, 3]);
    assert!(dir.path().join("base_p1.png").exists());
    assert!(dir.path().join("base_p3_1.png").exists());
    assert!(dir.path().join("base_p3_2.png").exists());
    assert!(!dir.path().join("base_p2.png").exists());

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].page_number, 2);
    assert_eq!(report.failures[0].sub_index, None);
    assert_eq!(report.status(), "partial");

    let aggregate = report.failure().expect("aggregate error");
    assert_eq!(aggregate.failures.len(), 1);
    assert!(aggregate.to_string().contains("page(s) 2"));

    let failed_events = events
        .iter()
        .filter(|event| matches!(event, ExtractionEvent::PageFailed(_)))
        .count();
    assert_eq!(failed_events, 1);
}

#[test]
fn unwritable_output_is_reported_per_segment() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("missing");
    let mut segments = Run::new();
    segments.insert(1, vec![segment(1, 1, (0, 0, 200, 260))]);

    let (report, _) = run_collecting(&job(&missing, segments), &FakeRasterizer::default());

    assert!(report.written.is_empty());
    assert_eq!(report.status(), "failed");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].sub_index, Some(1));
}

#[test]
fn worker_reports_through_events_and_join() {
    let dir = tempfile::tempdir().expect("temp dir");
    let rasterizer = FakeRasterizer::failing_on(&[2]);
    let calls = rasterizer.calls.clone();

    let worker = ExtractionWorker::spawn(job(dir.path(), three_page_run()), Box::new(rasterizer))
        .expect("spawn worker");
    let mut started = Vec::new();
    let mut written = 0;
    let report = worker
        .finish(|event| match event {
            ExtractionEvent::PageStarted { page_number, .. } => started.push(page_number),
            ExtractionEvent::SegmentWritten(_) => written += 1,
            ExtractionEvent::PageFailed(_) => {}
        })
        .expect("worker finished");

    assert_eq!(started, vec![1, 2, 3]);
    assert_eq!(written, 3);
    assert_eq!(report.written.len(), 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(*calls.lock().expect("calls lock"), vec![1, 2, 3]);
}
