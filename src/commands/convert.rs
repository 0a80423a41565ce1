use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::ConvertArgs;
use crate::encoding::Encoding;
use crate::util::ensure_directory;

pub fn run(args: ConvertArgs) -> Result<()> {
    ensure_directory(&args.out_dir)?;
    let encoding = args.format.encoding();

    let mut converted = 0;
    for source in &args.images {
        match convert_image(source, &args.out_dir, encoding) {
            Ok(target) => {
                converted += 1;
                info!(source = %source.display(), target = %target.display(), "converted image");
            }
            Err(err) => warn!(source = %source.display(), error = %format!("{err:#}"), "image skipped"),
        }
    }

    info!(
        converted,
        skipped = args.images.len() - converted,
        format = args.format.as_str(),
        "conversion finished"
    );
    if converted == 0 {
        bail!("none of the {} image(s) could be converted", args.images.len());
    }
    Ok(())
}

/// Write `source` as `<out_dir>/<stem>.<ext>` in `encoding`, keeping the stem as is.
pub fn convert_image(source: &Path, out_dir: &Path, encoding: Encoding) -> Result<PathBuf> {
    let image = image::open(source).with_context(|| format!("failed to decode {}", source.display()))?;
    let mut file_name = source
        .file_stem()
        .filter(|stem| !stem.is_empty())
        .map_or_else(|| OsString::from("image"), |stem| stem.to_os_string());
    file_name.push(".");
    file_name.push(encoding.extension());
    let target = out_dir.join(file_name);
    encoding
        .prepare(image)
        .save_with_format(&target, encoding.image_format())
        .with_context(|| format!("failed to write {}", target.display()))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use image::{ColorType, Rgba, RgbaImage};

    use super::*;

    #[test]
    fn transparent_png_becomes_jpeg() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = dir.path().join("scan.png");
        RgbaImage::from_pixel(4, 4, Rgba([20, 40, 60, 128]))
            .save(&source)
            .expect("write png");
        let out_dir = dir.path().join("out");
        fs::create_dir(&out_dir).expect("out dir");

        let target = convert_image(&source, &out_dir, Encoding::Jpeg).expect("convert");
        assert_eq!(target, out_dir.join("scan.jpg"));
        let decoded = image::open(&target).expect("decode jpeg");
        assert_eq!(decoded.color(), ColorType::Rgb8);
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }

    #[test]
    fn file_name_stem_is_kept_verbatim() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = dir.path().join("scan copy (2).étiquette.png");
        RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]))
            .save_with_format(&source, image::ImageFormat::Png)
            .expect("write png");

        let target = convert_image(&source, dir.path(), Encoding::Bmp).expect("convert");
        assert_eq!(target, dir.path().join("scan copy (2).étiquette.bmp"));
        assert!(target.is_file());

        let target = convert_image(&source, dir.path(), Encoding::Jpeg).expect("convert");
        assert_eq!(target, dir.path().join("scan copy (2).étiquette.jpg"));
        assert!(target.is_file());
    }

    #[test]
    fn undecodable_input_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = dir.path().join("broken.png");
        fs::write(&source, b"nope").expect("write junk");

        assert!(convert_image(&source, dir.path(), Encoding::Bmp).is_err());
        assert!(!dir.path().join("broken.bmp").exists());
    }
}
