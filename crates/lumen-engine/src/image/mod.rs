//! Decoded-image collaborator.
//!
//! The engine only needs "path in, typed pixels out". Decoding itself is delegated
//! to an [`ImageDecoder`]; [`ImageCrateDecoder`] is the default, backed by the
//! `image` crate.

mod decoder;

use std::path::PathBuf;

pub use decoder::{ImageCrateDecoder, ImageDecoder};

/// Channel layout of an image or texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Colorspace {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
    Depth,
}

impl Colorspace {
    pub fn channels(self) -> usize {
        match self {
            Colorspace::Gray | Colorspace::Depth => 1,
            Colorspace::GrayAlpha => 2,
            Colorspace::Rgb => 3,
            Colorspace::Rgba => 4,
        }
    }
}

/// Storage type of one channel sample.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SampleType {
    Byte,
    Float,
}

/// Raw interleaved samples, row-major, top row first.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    Bytes(Vec<u8>),
    Floats(Vec<f32>),
}

impl PixelData {
    pub fn sample_type(&self) -> SampleType {
        match self {
            PixelData::Bytes(_) => SampleType::Byte,
            PixelData::Floats(_) => SampleType::Float,
        }
    }

    /// Number of samples (not pixels).
    pub fn len(&self) -> usize {
        match self {
            PixelData::Bytes(b) => b.len(),
            PixelData::Floats(f) => f.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads one sample normalized to `[0, 1]` for bytes, raw for floats.
    pub fn sample(&self, index: usize) -> Option<f32> {
        match self {
            PixelData::Bytes(b) => b.get(index).map(|v| f32::from(*v) / 255.0),
            PixelData::Floats(f) => f.get(index).copied(),
        }
    }
}

/// A decoded image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub colorspace: Colorspace,
    pub data: PixelData,
}

impl Image {
    pub fn new(width: u32, height: u32, colorspace: Colorspace, data: PixelData) -> Self {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * colorspace.channels(),
            "pixel data does not match {width}x{height} {colorspace:?}"
        );
        Self {
            width,
            height,
            colorspace,
            data,
        }
    }

    /// Number of samples the dimensions and colorspace call for.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.colorspace.channels()
    }

    pub fn sample_type(&self) -> SampleType {
        self.data.sample_type()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    /// Converts to straight 8-bit RGBA (used for window icons).
    ///
    /// Samples missing from a short buffer read as 0.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let channels = self.colorspace.channels();
        let pixels = self.width as usize * self.height as usize;
        let mut out = Vec::with_capacity(pixels * 4);

        if self.data.len() < self.expected_len() {
            log::warn!(
                "image has {} samples, expected {}; missing samples read as 0",
                self.data.len(),
                self.expected_len()
            );
        }

        for p in 0..pixels {
            let base = p * channels;
            let s = |c: usize| self.data.sample(base + c).unwrap_or(0.0);
            let rgba = match self.colorspace {
                Colorspace::Gray | Colorspace::Depth => [s(0), s(0), s(0), 1.0],
                Colorspace::GrayAlpha => [s(0), s(0), s(0), s(1)],
                Colorspace::Rgb => [s(0), s(1), s(2), 1.0],
                Colorspace::Rgba => [s(0), s(1), s(2), s(3)],
            };
            out.extend(rgba.iter().map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8));
        }

        out
    }
}

/// Failure reported by an [`ImageDecoder`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("cannot read image '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode image '{path}': {reason}")]
    Malformed { path: PathBuf, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_alpha_expands_to_rgba8() {
        let img = Image::new(1, 1, Colorspace::GrayAlpha, PixelData::Bytes(vec![10, 200]));
        assert_eq!(img.to_rgba8(), vec![10, 10, 10, 200]);
    }

    #[test]
    fn float_rgb_is_clamped_and_opaque() {
        let img = Image::new(1, 1, Colorspace::Rgb, PixelData::Floats(vec![2.0, 0.5, -1.0]));
        assert_eq!(img.to_rgba8(), vec![255, 128, 0, 255]);
    }

    #[test]
    fn short_pixel_data_reads_missing_samples_as_zero() {
        let img = Image {
            width: 2,
            height: 2,
            colorspace: Colorspace::Rgba,
            data: PixelData::Bytes(vec![255; 4]),
        };
        let rgba = img.to_rgba8();
        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[..4], &[255, 255, 255, 255]);
        assert!(rgba[4..].iter().all(|&v| v == 0));
    }

    #[test]
    fn zero_sized_image_is_empty() {
        let img = Image {
            width: 0,
            height: 4,
            colorspace: Colorspace::Rgba,
            data: PixelData::Bytes(Vec::new()),
        };
        assert!(img.is_empty());
    }
}
