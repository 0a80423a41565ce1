use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use image::{DynamicImage, GrayImage};
use regex::Regex;
use tracing::debug;

use crate::error::PageError;

/// File prefix handed to the rasterizer inside its output directory.
const RENDER_PREFIX: &str = "page";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRange {
    All,
    Single(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub page_number: u32,
    pub path: PathBuf,
}

/// Page-to-image rendering. Implementations must produce the same page geometry
/// (up to scale) at every DPI.
pub trait Rasterizer {
    /// Render `pages` of `document` at `dpi` into `output_dir`, sorted by page number.
    fn render(
        &self,
        document: &Path,
        pages: PageRange,
        dpi: u32,
        output_dir: &Path,
    ) -> Result<Vec<RenderedPage>, PageError>;
}

/// poppler's `pdftoppm`, invoked once per call.
#[derive(Debug, Clone)]
pub struct Pdftoppm {
    program: PathBuf,
}

impl Pdftoppm {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn ensure_available(&self) -> Result<()> {
        let output = Command::new(&self.program)
            .arg("-v")
            .output()
            .with_context(|| format!("failed to execute {}", self.program.display()))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stderr
            .lines()
            .chain(stdout.lines())
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("unknown");
        if version == "unknown" && !output.status.success() {
            bail!("{} is not a usable pdftoppm", self.program.display());
        }

        debug!(program = %self.program.display(), version, "found rasterizer");
        Ok(())
    }
}

impl Rasterizer for Pdftoppm {
    fn render(
        &self,
        document: &Path,
        pages: PageRange,
        dpi: u32,
        output_dir: &Path,
    ) -> Result<Vec<RenderedPage>, PageError> {
        let output_root = output_dir.join(RENDER_PREFIX);

        let mut command = Command::new(&self.program);
        command.arg("-png").arg("-r").arg(dpi.to_string());
        if let PageRange::Single(page) = pages {
            command
                .arg("-f")
                .arg(page.to_string())
                .arg("-l")
                .arg(page.to_string());
        }
        command.arg(document).arg(&output_root);

        let failure = |reason: String| match pages {
            PageRange::All => PageError::Render { reason },
            PageRange::Single(page) => PageError::decode(page, reason),
        };

        let output = command.output().map_err(|err| {
            failure(format!(
                "failed to execute {}: {err}",
                self.program.display()
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failure(format!(
                "pdftoppm returned non-zero exit status for {}: {}",
                document.display(),
                stderr.trim()
            )));
        }

        let rendered = collect_rendered_pages(output_dir).map_err(|err| failure(err.to_string()))?;
        match pages {
            PageRange::All if rendered.is_empty() => Err(failure(format!(
                "pdftoppm produced no pages for {}",
                document.display()
            ))),
            PageRange::Single(page) if !rendered.iter().any(|item| item.page_number == page) => {
                Err(failure(format!(
                    "pdftoppm did not produce an image for {} page {page}",
                    document.display()
                )))
            }
            _ => Ok(rendered),
        }
    }
}

/// List `<prefix>-<page>.png` files in `dir`, sorted by page number.
pub fn collect_rendered_pages(dir: &Path) -> Result<Vec<RenderedPage>> {
    let pattern = Regex::new(&format!(r"^{RENDER_PREFIX}-0*(\d+)\.png$"))
        .context("failed to compile render filename regex")?;

    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;

    let mut pages = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if let Some(page_number) = page_number_from_file_name(name, &pattern) {
            pages.push(RenderedPage { page_number, path });
        }
    }

    pages.sort_by_key(|page| page.page_number);
    Ok(pages)
}

fn page_number_from_file_name(name: &str, pattern: &Regex) -> Option<u32> {
    pattern
        .captures(name)?
        .get(1)?
        .as_str()
        .parse::<u32>()
        .ok()
        .filter(|&page| page > 0)
}

/// A decoded page render.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page_number: u32,
    pub image: DynamicImage,
}

impl PageImage {
    pub fn open(rendered: &RenderedPage) -> Result<Self, PageError> {
        let image = image::open(&rendered.path)
            .map_err(|err| PageError::decode(rendered.page_number, err))?;
        Ok(Self {
            page_number: rendered.page_number,
            image,
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// 8-bit luminance copy for detection.
    pub fn luminance(&self) -> GrayImage {
        self.image.to_luma8()
    }
}
