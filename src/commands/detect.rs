use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::DetectArgs;
use crate::model::{DocumentRef, Run, RunManifest};
use crate::raster::{PageRange, Pdftoppm, Rasterizer};
use crate::registry::SelectionRegistry;
use crate::segment::{DetectorConfig, PageOutcome, segment_rendered};
use crate::util::{default_run_path, now_utc_string, sha256_file, utc_compact_string, write_json_pretty};

const RUN_MANIFEST_VERSION: u32 = 1;

pub fn run(args: DetectArgs) -> Result<()> {
    let rasterizer = Pdftoppm::new(&args.pdftoppm);
    rasterizer.ensure_available()?;

    let config = DetectorConfig {
        threshold: args.threshold,
    };
    let manifest = build_run_manifest(&args.pdf, &rasterizer, config, args.preview_dpi)?;

    let run_path = args
        .run_path
        .unwrap_or_else(|| default_run_path(&args.pdf));
    write_json_pretty(&run_path, &manifest)?;

    info!(path = %run_path.display(), "wrote run manifest");
    info!(
        run_id = %manifest.run_id,
        pages = manifest.page_count,
        segments = manifest.segment_count(),
        split_pages = manifest.split_page_count(),
        warnings = manifest.warnings.len(),
        "detection completed"
    );
    Ok(())
}

/// Render `page_number` alone into its own directory and segment it.
fn rerender_page(
    rasterizer: &dyn Rasterizer,
    document: &Path,
    page_number: u32,
    dpi: u32,
    scratch: &Path,
    config: &DetectorConfig,
) -> Result<PageOutcome> {
    let dir = scratch.join(format!("retry-{page_number}"));
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let rendered = rasterizer.render(document, PageRange::Single(page_number), dpi, &dir)?;
    let page = rendered
        .iter()
        .find(|page| page.page_number == page_number)
        .with_context(|| format!("page {page_number} missing from its own render"))?;
    Ok(segment_rendered(page, config)?)
}

/// Render previews of every page, segment them and select every segment.
pub fn build_run_manifest(
    pdf: &Path,
    rasterizer: &dyn Rasterizer,
    config: DetectorConfig,
    preview_dpi: u32,
) -> Result<RunManifest> {
    if !pdf.is_file() {
        bail!("PDF not found: {}", pdf.display());
    }
    let document_path = fs::canonicalize(pdf).unwrap_or_else(|_| pdf.to_path_buf());
    let sha256 = sha256_file(&document_path)?;

    let scratch = tempfile::Builder::new()
        .prefix("pagesplit-preview-")
        .tempdir()
        .context("failed to create preview directory")?;
    let rendered = rasterizer
        .render(&document_path, PageRange::All, preview_dpi, scratch.path())
        .with_context(|| format!("failed to render previews for {}", pdf.display()))?;
    info!(pages = rendered.len(), dpi = preview_dpi, "rendered previews");

    let mut pages = Vec::with_capacity(rendered.len());
    let mut segments = Run::new();
    let mut warnings = Vec::new();
    let mut unsized_pages = Vec::new();

    for page in &rendered {
        let outcome = segment_rendered(page, &config).or_else(|err| {
            warn!(page = page.page_number, error = %err, "preview unreadable; rendering page again");
            rerender_page(
                rasterizer,
                &document_path,
                page.page_number,
                preview_dpi,
                scratch.path(),
                &config,
            )
            .map_err(|retry_err| {
                warn!(page = page.page_number, error = %format!("{retry_err:#}"), "page render retry failed");
                err
            })
        });
        match outcome {
            Ok(outcome) => {
                info!(
                    page = page.page_number,
                    segments = outcome.segments.len(),
                    split_row = ?outcome.size.split_row,
                    "segmented page"
                );
                pages.push(outcome.size);
                segments.insert(page.page_number, outcome.segments);
            }
            Err(err) => unsized_pages.push((page.page_number, err)),
        }
    }

    // Pages without any readable preview are kept whole, sized like the nearest readable page.
    let readable = pages.clone();
    for (page_number, err) in unsized_pages {
        let Some(sibling) = readable
            .iter()
            .min_by_key(|size| size.page_number.abs_diff(page_number))
            .copied()
        else {
            warn!(page = page_number, error = %err, "page skipped");
            warnings.push(format!("page {page_number} skipped: {err}"));
            continue;
        };
        let outcome = PageOutcome::whole(page_number, sibling.width, sibling.height)?;
        warn!(page = page_number, sized_like = sibling.page_number, error = %err, "page kept whole");
        warnings.push(format!(
            "page {page_number} kept whole at the size of page {}: {err}",
            sibling.page_number
        ));
        pages.push(outcome.size);
        segments.insert(page_number, outcome.segments);
    }
    pages.sort_by_key(|size| size.page_number);

    if segments.is_empty() {
        bail!("no page of {} could be segmented", pdf.display());
    }

    let started = Utc::now();
    let now = now_utc_string();
    Ok(RunManifest {
        manifest_version: RUN_MANIFEST_VERSION,
        run_id: format!("run-{}", utc_compact_string(started)),
        generated_at: now.clone(),
        updated_at: now,
        document: DocumentRef {
            path: document_path.display().to_string(),
            sha256,
        },
        preview_dpi,
        threshold: config.threshold,
        page_count: rendered.len(),
        pages,
        selection: SelectionRegistry::all_included(&segments),
        segments,
        warnings,
        last_report: None,
    })
}
