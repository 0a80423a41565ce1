use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::encoding::Encoding;
use crate::model::SegmentId;

#[derive(Parser, Debug)]
#[command(
    name = "pagesplit",
    version,
    about = "Split scanned PDF pages into segments, extract them as images and merge images into PDFs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Detect(DetectArgs),
    Select(SelectArgs),
    Extract(ExtractArgs),
    Status(StatusArgs),
    Convert(ConvertArgs),
    Merge(MergeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
    #[arg(long)]
    pub pdf: PathBuf,

    /// Defaults to `<pdf stem>.pagesplit.json` next to the PDF.
    #[arg(long)]
    pub run_path: Option<PathBuf>,

    #[arg(long, default_value_t = 35)]
    pub preview_dpi: u32,

    #[arg(long, default_value_t = 128)]
    pub threshold: u8,

    #[arg(long, default_value = "pdftoppm")]
    pub pdftoppm: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct SelectArgs {
    #[arg(long)]
    pub run_path: PathBuf,

    #[arg(long, default_value_t = false, conflicts_with = "none")]
    pub all: bool,

    #[arg(long, default_value_t = false)]
    pub none: bool,

    /// Include every segment of a page.
    #[arg(long = "page")]
    pub pages: Vec<u32>,

    #[arg(long = "include", value_name = "PAGE:SUB")]
    pub include: Vec<SegmentId>,

    #[arg(long = "exclude", value_name = "PAGE:SUB")]
    pub exclude: Vec<SegmentId>,

    #[arg(long = "toggle", value_name = "PAGE:SUB")]
    pub toggle: Vec<SegmentId>,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long)]
    pub run_path: PathBuf,

    #[arg(long)]
    pub out_dir: PathBuf,

    /// Defaults to the PDF file stem.
    #[arg(long)]
    pub base_name: Option<String>,

    #[arg(long, value_enum, default_value_t = PageFormat::Png)]
    pub format: PageFormat,

    #[arg(long, default_value_t = 200)]
    pub dpi: u32,

    /// Defaults to `<out dir>/<base name>.extraction.json`.
    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, default_value = "pdftoppm")]
    pub pdftoppm: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long)]
    pub run_path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    #[arg(long)]
    pub out_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = ConvertFormat::Jpeg)]
    pub format: ConvertFormat,

    #[arg(required = true)]
    pub images: Vec<PathBuf>,
}

/// Edits are applied in this order: removals, moves, left and right swaps,
/// drops. Positions are 1-based and refer to the list as it stands when the
/// edit is applied.
#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    #[arg(long)]
    pub output: PathBuf,

    #[arg(long = "remove", value_name = "POS")]
    pub remove: Vec<usize>,

    #[arg(long = "move", value_name = "FROM:TO", value_parser = parse_move)]
    pub moves: Vec<MoveEdit>,

    #[arg(long = "left", value_name = "POS")]
    pub left: Vec<usize>,

    #[arg(long = "right", value_name = "POS")]
    pub right: Vec<usize>,

    /// Drag the card at POS and release it at grid coordinates X,Y.
    #[arg(long = "drop", value_name = "POS@X,Y", value_parser = parse_drop)]
    pub drops: Vec<DropEdit>,

    #[arg(required = true)]
    pub images: Vec<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MoveEdit {
    pub from: usize,
    pub to: usize,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DropEdit {
    pub source: usize,
    pub x: f64,
    pub y: f64,
}

fn parse_position(raw: &str) -> Result<usize, String> {
    let position = raw
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("invalid position '{raw}': {err}"))?;
    if position == 0 {
        return Err("positions start at 1".to_string());
    }
    Ok(position)
}

fn parse_move(raw: &str) -> Result<MoveEdit, String> {
    let (from, to) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected FROM:TO, got '{raw}'"))?;
    Ok(MoveEdit {
        from: parse_position(from)?,
        to: parse_position(to)?,
    })
}

fn parse_drop(raw: &str) -> Result<DropEdit, String> {
    let (source, point) = raw
        .split_once('@')
        .ok_or_else(|| format!("expected POS@X,Y, got '{raw}'"))?;
    let (x, y) = point
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y after '@', got '{point}'"))?;
    let coordinate = |value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|err| format!("invalid coordinate '{value}': {err}"))
    };
    Ok(DropEdit {
        source: parse_position(source)?,
        x: coordinate(x)?,
        y: coordinate(y)?,
    })
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum PageFormat {
    Png,
    Jpeg,
    Tiff,
    Bmp,
}

impl PageFormat {
    pub fn as_str(self) -> &'static str {
        self.encoding().as_str()
    }

    pub fn encoding(self) -> Encoding {
        match self {
            Self::Png => Encoding::Png,
            Self::Jpeg => Encoding::Jpeg,
            Self::Tiff => Encoding::Tiff,
            Self::Bmp => Encoding::Bmp,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ConvertFormat {
    Jpeg,
    Png,
    Tiff,
    Bmp,
    Webp,
}

impl ConvertFormat {
    pub fn as_str(self) -> &'static str {
        self.encoding().as_str()
    }

    pub fn encoding(self) -> Encoding {
        match self {
            Self::Jpeg => Encoding::Jpeg,
            Self::Png => Encoding::Png,
            Self::Tiff => Encoding::Tiff,
            Self::Bmp => Encoding::Bmp,
            Self::Webp => Encoding::Webp,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn merge_edits_parse() {
        assert_eq!(parse_move("3:1"), Ok(MoveEdit { from: 3, to: 1 }));
        assert!(parse_move("0:1").is_err());
        assert!(parse_move("3").is_err());

        assert_eq!(
            parse_drop("2@410.5,130"),
            Ok(DropEdit {
                source: 2,
                x: 410.5,
                y: 130.0
            })
        );
        assert!(parse_drop("2@410").is_err());
    }

    #[test]
    fn select_accepts_segment_ids() {
        let cli = Cli::try_parse_from([
            "pagesplit",
            "select",
            "--run-path",
            "run.json",
            "--exclude",
            "2:1",
            "--toggle",
            "3:2",
            "--page",
            "4",
        ])
        .expect("parse");
        let Commands::Select(args) = cli.command else {
            panic!("expected select");
        };
        assert_eq!(args.exclude, vec![SegmentId::new(2, 1)]);
        assert_eq!(args.toggle, vec![SegmentId::new(3, 2)]);
        assert_eq!(args.pages, vec![4]);
    }

    #[test]
    fn extract_defaults() {
        let cli = Cli::try_parse_from([
            "pagesplit",
            "extract",
            "--run-path",
            "run.json",
            "--out-dir",
            "out",
        ])
        .expect("parse");
        let Commands::Extract(args) = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(args.format, PageFormat::Png);
        assert_eq!(args.dpi, 200);
        assert_eq!(args.pdftoppm, PathBuf::from("pdftoppm"));
    }
}
