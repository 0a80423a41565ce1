use image::{ColorType, DynamicImage, ImageFormat, Rgb, RgbImage};

/// Output image encodings.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Encoding {
    Png,
    Jpeg,
    Tiff,
    Bmp,
    Webp,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
            Self::Webp => "webp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            other => other.as_str(),
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Tiff => ImageFormat::Tiff,
            Self::Bmp => ImageFormat::Bmp,
            Self::Webp => ImageFormat::WebP,
        }
    }

    /// Convert `image` to a pixel layout this encoding can store.
    ///
    /// JPEG has no alpha channel: transparent pixels are composited onto white.
    /// Everything else is written as 8-bit RGB, or RGBA when the source has alpha.
    pub fn prepare(self, image: DynamicImage) -> DynamicImage {
        match self {
            Self::Jpeg => match image.color() {
                ColorType::L8 | ColorType::Rgb8 => image,
                color if color.has_alpha() => DynamicImage::ImageRgb8(flatten_onto_white(&image)),
                _ => DynamicImage::ImageRgb8(image.to_rgb8()),
            },
            _ => match image.color() {
                ColorType::Rgb8 | ColorType::Rgba8 => image,
                color if color.has_alpha() => DynamicImage::ImageRgba8(image.to_rgba8()),
                _ => DynamicImage::ImageRgb8(image.to_rgb8()),
            },
        }
    }
}

/// Composite `image` over an opaque white background.
pub fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut flat = RgbImage::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u32::from(pixel[3]);
        let blend = |channel: u8| ((u32::from(channel) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        flat.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }

    flat
}
