//! CPU-side texel preparation for uploads.
//!
//! Shaders always see four channels, so every source layout is expanded to RGBA
//! (missing color channels read 0, missing alpha reads 1), the swizzle is applied,
//! and the result is encoded as 8-bit unorm or half floats.

use crate::gpu::types::{Swizzle, TextureStorage};
use crate::image::{Colorspace, PixelData};

pub(super) type Texel = [f32; 4];

pub(super) fn expand(storage: &TextureStorage, data: &PixelData, swizzle: [Swizzle; 4]) -> Vec<Texel> {
    let channels = storage.source_layout.channels();
    let pixels = storage.width as usize * storage.height as usize;

    if data.len() < pixels * channels {
        log::warn!(
            "texture upload has {} samples, expected {}; missing samples read as 0",
            data.len(),
            pixels * channels
        );
    }

    let sample = |i: usize| data.sample(i).unwrap_or(0.0);

    (0..pixels)
        .map(|p| {
            let base = p * channels;
            let mut texel = [0.0, 0.0, 0.0, 1.0];
            match storage.source_layout {
                Colorspace::Gray | Colorspace::Depth => texel[0] = sample(base),
                Colorspace::GrayAlpha => {
                    texel[0] = sample(base);
                    texel[1] = sample(base + 1);
                }
                Colorspace::Rgb | Colorspace::Rgba => {
                    for (c, slot) in texel.iter_mut().enumerate().take(channels) {
                        *slot = sample(base + c);
                    }
                }
            }
            swizzle.map(|s| s.pick(texel))
        })
        .collect()
}

/// Bytes per texel of an upload format.
pub(super) fn bytes_per_texel(format: wgpu::TextureFormat) -> u32 {
    match format {
        wgpu::TextureFormat::Rgba16Float => 8,
        _ => 4,
    }
}

pub(super) fn encode(texels: &[Texel], format: wgpu::TextureFormat) -> Vec<u8> {
    match format {
        wgpu::TextureFormat::Rgba16Float => texels
            .iter()
            .flat_map(|t| t.iter().flat_map(|v| half::f16::from_f32(*v).to_le_bytes()))
            .collect(),
        _ => texels
            .iter()
            .flat_map(|t| t.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect(),
    }
}

pub(super) fn mip_level_count(width: u32, height: u32) -> u32 {
    width.max(height).max(1).ilog2() + 1
}

/// 2×2 box filter; odd edges reuse the last row/column.
pub(super) fn downsample(src: &[Texel], width: u32, height: u32) -> (Vec<Texel>, u32, u32) {
    let (nw, nh) = ((width / 2).max(1), (height / 2).max(1));
    let at = |x: u32, y: u32| src[(y.min(height - 1) * width + x.min(width - 1)) as usize];

    let mut out = Vec::with_capacity((nw * nh) as usize);
    for y in 0..nh {
        for x in 0..nw {
            let quad = [at(2 * x, 2 * y), at(2 * x + 1, 2 * y), at(2 * x, 2 * y + 1), at(2 * x + 1, 2 * y + 1)];
            let mut texel = [0.0; 4];
            for q in quad {
                for c in 0..4 {
                    texel[c] += q[c] * 0.25;
                }
            }
            out.push(texel);
        }
    }

    (out, nw, nh)
}
