use std::path::Path;

use image::DynamicImage;

use super::{Colorspace, DecodeError, Image, PixelData};

/// Image-decoding service: path in, typed pixel buffer out.
pub trait ImageDecoder {
    fn decode(&self, path: &Path) -> Result<Image, DecodeError>;
}

/// Decoder backed by the `image` crate.
///
/// 8-bit gray, gray+alpha, RGB and RGBA keep their layout. 16-bit and
/// floating-point sources become float samples. Anything else is converted
/// to 8-bit RGBA.
#[derive(Debug, Default, Copy, Clone)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, path: &Path) -> Result<Image, DecodeError> {
        let reader = image::ImageReader::open(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let reader = reader.with_guessed_format().map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let decoded = reader.decode().map_err(|e| DecodeError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(from_dynamic(decoded))
    }
}

fn unit_u16(v: u16) -> f32 {
    f32::from(v) / f32::from(u16::MAX)
}

pub(crate) fn from_dynamic(img: DynamicImage) -> Image {
    let (width, height) = (img.width(), img.height());

    let (colorspace, data) = match img {
        DynamicImage::ImageLuma8(buf) => (Colorspace::Gray, PixelData::Bytes(buf.into_raw())),
        DynamicImage::ImageLumaA8(buf) => (Colorspace::GrayAlpha, PixelData::Bytes(buf.into_raw())),
        DynamicImage::ImageRgb8(buf) => (Colorspace::Rgb, PixelData::Bytes(buf.into_raw())),
        DynamicImage::ImageRgba8(buf) => (Colorspace::Rgba, PixelData::Bytes(buf.into_raw())),

        DynamicImage::ImageLuma16(buf) => (
            Colorspace::Gray,
            PixelData::Floats(buf.into_raw().into_iter().map(unit_u16).collect()),
        ),
        DynamicImage::ImageLumaA16(buf) => (
            Colorspace::GrayAlpha,
            PixelData::Floats(buf.into_raw().into_iter().map(unit_u16).collect()),
        ),
        DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgb32F(_) => {
            (Colorspace::Rgb, PixelData::Floats(img.into_rgb32f().into_raw()))
        }
        DynamicImage::ImageRgba16(_) | DynamicImage::ImageRgba32F(_) => {
            (Colorspace::Rgba, PixelData::Floats(img.into_rgba32f().into_raw()))
        }

        other => (Colorspace::Rgba, PixelData::Bytes(other.into_rgba8().into_raw())),
    };

    Image::new(width, height, colorspace, data)
}
