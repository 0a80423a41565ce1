use std::path::PathBuf;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::ExtractArgs;
use crate::extract::{ExtractionEvent, ExtractionJob, ExtractionWorker};
use crate::model::{ExtractionManifest, RunManifest};
use crate::raster::Pdftoppm;
use crate::util::{
    ensure_directory, now_utc_string, read_json, safe_file_stem, sha256_file, write_json_pretty,
};

const EXTRACTION_MANIFEST_VERSION: u32 = 1;

pub fn run(args: ExtractArgs) -> Result<()> {
    let mut manifest: RunManifest = read_json(&args.run_path)?;
    let job = prepare_job(&manifest, &args)?;

    let rasterizer = Pdftoppm::new(&args.pdftoppm);
    rasterizer.ensure_available()?;
    ensure_directory(&job.output_dir)?;

    let started_at = now_utc_string();
    info!(
        run_id = %manifest.run_id,
        pages = job.segments.len(),
        segments = job.segments.values().map(Vec::len).sum::<usize>(),
        dpi = job.dpi,
        format = args.format.as_str(),
        out_dir = %job.output_dir.display(),
        "extraction started"
    );

    let output_dir = job.output_dir.display().to_string();
    let base_name = job.base_name.clone();
    let report = ExtractionWorker::spawn(job, Box::new(rasterizer))?.finish(log_event)?;

    let report_path = args
        .report_path
        .unwrap_or_else(|| args.out_dir.join(format!("{base_name}.extraction.json")));
    let extraction = ExtractionManifest {
        manifest_version: EXTRACTION_MANIFEST_VERSION,
        run_id: manifest.run_id.clone(),
        status: report.status().to_string(),
        started_at,
        updated_at: now_utc_string(),
        document: manifest.document.clone(),
        output_dir,
        base_name,
        format: args.format.as_str().to_string(),
        dpi: args.dpi,
        pages_attempted: report.pages_attempted,
        written: report.written.clone(),
        failures: report.failures.clone(),
    };
    write_json_pretty(&report_path, &extraction)?;
    info!(path = %report_path.display(), "wrote extraction report");

    manifest.last_report = Some(report_path.display().to_string());
    manifest.updated_at = now_utc_string();
    write_json_pretty(&args.run_path, &manifest)?;

    info!(
        status = report.status(),
        pages = report.pages_attempted,
        written = report.written.len(),
        failures = report.failures.len(),
        "extraction finished"
    );

    if let Some(failure) = report.failure() {
        return Err(failure.into());
    }
    Ok(())
}

/// Check the run still matches its PDF and that something is selected.
pub fn prepare_job(manifest: &RunManifest, args: &ExtractArgs) -> Result<ExtractionJob> {
    let document = PathBuf::from(&manifest.document.path);
    let current = sha256_file(&document)?;
    if current != manifest.document.sha256 {
        bail!(
            "{} changed since detection (sha256 {current}, run recorded {}); run detect again",
            document.display(),
            manifest.document.sha256
        );
    }

    let segments = manifest.selection.included_segments(&manifest.segments);
    if segments.is_empty() {
        bail!("no segments are selected; include some with `pagesplit select`");
    }

    let base_name = args
        .base_name
        .clone()
        .unwrap_or_else(|| safe_file_stem(&document, "document"));

    Ok(ExtractionJob {
        document,
        segments,
        output_dir: args.out_dir.clone(),
        base_name,
        encoding: args.format.encoding(),
        dpi: args.dpi,
    })
}

fn log_event(event: ExtractionEvent) {
    match event {
        ExtractionEvent::PageStarted {
            page_number,
            segments,
        } => info!(page = page_number, segments, "extracting page"),
        ExtractionEvent::SegmentWritten(written) => info!(
            page = written.page_number,
            sub_index = written.sub_index,
            path = %written.path,
            "wrote segment"
        ),
        ExtractionEvent::PageFailed(failure) => warn!(
            page = failure.page_number,
            sub_index = ?failure.sub_index,
            reason = %failure.reason,
            "page failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::cli::PageFormat;
    use crate::encoding::Encoding;
    use crate::model::{DocumentRef, Rect, Run, Segment, SegmentId};
    use crate::registry::SelectionRegistry;

    fn manifest_for(pdf: &Path, sha256: String) -> RunManifest {
        let segment = |sub_index| Segment {
            page_number: 1,
            sub_index,
            rect: Rect::new(0, 0, 10, 10).expect("rect"),
            source_width: 10,
        };
        let mut segments = Run::new();
        segments.insert(1, vec![segment(1), segment(2)]);

        RunManifest {
            manifest_version: 1,
            run_id: "run-test".to_string(),
            generated_at: now_utc_string(),
            updated_at: now_utc_string(),
            document: DocumentRef {
                path: pdf.display().to_string(),
                sha256,
            },
            preview_dpi: 35,
            threshold: 128,
            page_count: 1,
            pages: Vec::new(),
            selection: SelectionRegistry::all_included(&segments),
            segments,
            warnings: Vec::new(),
            last_report: None,
        }
    }

    fn args(out_dir: &Path) -> ExtractArgs {
        ExtractArgs {
            run_path: PathBuf::from("run.json"),
            out_dir: out_dir.to_path_buf(),
            base_name: None,
            format: PageFormat::Jpeg,
            dpi: 200,
            report_path: None,
            pdftoppm: PathBuf::from("pdftoppm"),
        }
    }

    #[test]
    fn job_carries_included_segments_and_pdf_stem() {
        let dir = tempfile::tempdir().expect("temp dir");
        let pdf = dir.path().join("tire labels.pdf");
        fs::write(&pdf, b"%PDF").expect("write pdf");
        let mut manifest = manifest_for(&pdf, sha256_file(&pdf).expect("hash"));
        manifest.selection.set(SegmentId::new(1, 1), false);

        let job = prepare_job(&manifest, &args(dir.path())).expect("job");
        assert_eq!(job.base_name, "tire_labels");
        assert_eq!(job.encoding, Encoding::Jpeg);
        assert_eq!(job.segments[&1].len(), 1);
        assert_eq!(job.segments[&1][0].sub_index, 2);
    }

    #[test]
    fn modified_pdf_is_refused() {
        let dir = tempfile::tempdir().expect("temp dir");
        let pdf = dir.path().join("labels.pdf");
        fs::write(&pdf, b"%PDF").expect("write pdf");
        let manifest = manifest_for(&pdf, "0".repeat(64));

        let err = prepare_job(&manifest, &args(dir.path())).expect_err("stale run");
        assert!(err.to_string().contains("changed since detection"));
    }

    #[test]
    fn empty_selection_is_refused() {
        let dir = tempfile::tempdir().expect("temp dir");
        let pdf = dir.path().join("labels.pdf");
        fs::write(&pdf, b"%PDF").expect("write pdf");
        let mut manifest = manifest_for(&pdf, sha256_file(&pdf).expect("hash"));
        manifest.selection.set_all(false);

        let err = prepare_job(&manifest, &args(dir.path())).expect_err("nothing selected");
        assert!(err.to_string().contains("no segments are selected"));
    }
}
