use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::{ExtractionManifest, RunManifest};
use crate::util::{read_json, sha256_file};

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest: RunManifest = read_json(&args.run_path)?;
    let document = Path::new(&manifest.document.path);

    info!(
        run_id = %manifest.run_id,
        document = %manifest.document.path,
        generated_at = %manifest.generated_at,
        updated_at = %manifest.updated_at,
        preview_dpi = manifest.preview_dpi,
        threshold = manifest.threshold,
        pages = manifest.page_count,
        segmented_pages = manifest.segments.len(),
        split_pages = manifest.split_page_count(),
        segments = manifest.segment_count(),
        included = manifest.selection.included_count(),
        "loaded run manifest"
    );

    for warning in &manifest.warnings {
        warn!(warning = %warning, "detection warning");
    }

    match sha256_file(document) {
        Ok(sha256) if sha256 == manifest.document.sha256 => {
            info!(path = %document.display(), "document unchanged since detection");
        }
        Ok(_) => warn!(path = %document.display(), "document changed since detection"),
        Err(err) => warn!(path = %document.display(), error = %err, "document unreadable"),
    }

    let Some(report_path) = manifest.last_report.as_deref().map(Path::new) else {
        info!("no extraction recorded for this run");
        return Ok(());
    };

    if report_path.exists() {
        let report: ExtractionManifest = read_json(report_path)?;
        info!(
            path = %report_path.display(),
            status = %report.status,
            updated_at = %report.updated_at,
            format = %report.format,
            dpi = report.dpi,
            pages = report.pages_attempted,
            written = report.written.len(),
            failures = report.failures.len(),
            "loaded extraction report"
        );
        for failure in &report.failures {
            warn!(
                page = failure.page_number,
                sub_index = ?failure.sub_index,
                reason = %failure.reason,
                "extraction failure"
            );
        }
    } else {
        warn!(path = %report_path.display(), "extraction report missing");
    }

    Ok(())
}
