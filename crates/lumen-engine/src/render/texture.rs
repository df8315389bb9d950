//! Textures: render targets, decoded images, and flat-color fallbacks.

use std::path::Path;
use std::rc::Rc;

use crate::gpu::{
    Filter, GpuContext, InternalFormat, RawHandle, ResourceHandle, ResourceKind, Swizzle,
    TextureParams, TextureStorage, Wrap,
};
use crate::image::{Colorspace, Image, ImageCrateDecoder, ImageDecoder, PixelData, SampleType};

/// A 2D texture that is always valid to bind.
///
/// Construction never fails: an image that cannot be decoded is replaced by a
/// 1×1 white texture and a warning is logged.
#[derive(Debug)]
pub struct Texture {
    handle: ResourceHandle,
    width: u32,
    height: u32,
    colorspace: Colorspace,
    sample_type: SampleType,
    image: Option<Image>,
}

impl Texture {
    /// Allocates an empty image to render into.
    ///
    /// Depth targets are 32-bit float, sampled nearest, without mipmaps. Color
    /// targets are 8-bit per channel, sampled linearly, with a mip chain.
    pub fn render_target(ctx: &GpuContext, width: u32, height: u32, colorspace: Colorspace) -> Self {
        let is_depth = colorspace == Colorspace::Depth;
        let sample_type = if is_depth { SampleType::Float } else { SampleType::Byte };
        let texture = Self::allocate(ctx, width, height, colorspace, sample_type);

        texture.bind();
        ctx.texture_parameters(&if is_depth {
            TextureParams::nearest()
        } else {
            TextureParams::linear()
        });
        ctx.texture_storage(
            &TextureStorage {
                width,
                height,
                internal_format: InternalFormat::unorm_for(colorspace),
                source_layout: colorspace,
                sample_type,
            },
            None,
        );
        if !is_depth {
            ctx.generate_mipmaps();
        }
        texture.unbind();

        texture
    }

    /// Loads an image file with the default decoder.
    pub fn from_file(ctx: &GpuContext, path: impl AsRef<Path>) -> Self {
        Self::from_file_with(ctx, path, &ImageCrateDecoder)
    }

    /// Loads an image file with `decoder`, falling back to plain white on failure.
    pub fn from_file_with(ctx: &GpuContext, path: impl AsRef<Path>, decoder: &dyn ImageDecoder) -> Self {
        let path = path.as_ref();
        match decoder.decode(path) {
            Ok(image) if !image.is_empty() => Self::from_image(ctx, image),
            Ok(_) => {
                log::warn!("image '{}' is empty; using a plain white texture", path.display());
                Self::fallback(ctx)
            }
            Err(err) => {
                log::warn!("{err}; using a plain white texture");
                Self::fallback(ctx)
            }
        }
    }

    /// Uploads a decoded image: linear mipmapped sampling, repeating wrap.
    ///
    /// Gray sources read luminance in every color channel; alpha is opaque unless
    /// the source carries its own. Float sources get half-float storage.
    pub fn from_image(ctx: &GpuContext, image: Image) -> Self {
        if image.is_empty() {
            log::warn!("empty image; using a plain white texture");
            return Self::fallback(ctx);
        }

        let colorspace = image.colorspace;
        let sample_type = image.sample_type();
        let texture = Self::allocate(ctx, image.width, image.height, colorspace, sample_type);

        texture.bind();
        ctx.texture_parameters(&TextureParams {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            mipmap_filter: Some(Filter::Linear),
            wrap: Wrap::Repeat,
            swizzle: swizzle_for(colorspace),
        });
        ctx.texture_storage(
            &TextureStorage {
                width: image.width,
                height: image.height,
                internal_format: match sample_type {
                    SampleType::Float => InternalFormat::float_for(colorspace),
                    SampleType::Byte => InternalFormat::unorm_for(colorspace),
                },
                source_layout: colorspace,
                sample_type,
            },
            Some(&image.data),
        );
        ctx.generate_mipmaps();
        texture.unbind();

        Texture {
            image: Some(image),
            ..texture
        }
    }

    /// A 1×1 texture of a single RGB color.
    pub fn plain(ctx: &GpuContext, color: [u8; 3]) -> Self {
        let texture = Self::allocate(ctx, 1, 1, Colorspace::Rgb, SampleType::Byte);

        texture.bind();
        ctx.texture_parameters(&TextureParams::nearest());
        ctx.texture_storage(
            &TextureStorage {
                width: 1,
                height: 1,
                internal_format: InternalFormat::Rgb8,
                source_layout: Colorspace::Rgb,
                sample_type: SampleType::Byte,
            },
            Some(&PixelData::Bytes(color.to_vec())),
        );
        texture.unbind();

        texture
    }

    fn fallback(ctx: &GpuContext) -> Self {
        Self::plain(ctx, TexturePreset::White.color())
    }

    fn allocate(ctx: &GpuContext, width: u32, height: u32, colorspace: Colorspace, sample_type: SampleType) -> Self {
        Self {
            handle: ResourceHandle::create(ctx, ResourceKind::Texture),
            width,
            height,
            colorspace,
            sample_type,
            image: None,
        }
    }

    /// Selects the sampling slot that subsequent binds target.
    pub fn activate(ctx: &GpuContext, slot: u32) {
        ctx.active_texture(slot);
    }

    pub fn bind(&self) {
        self.handle.context().bind_texture(Some(self.handle.raw()));
    }

    pub fn unbind(&self) {
        self.handle.context().bind_texture(None);
    }

    pub fn raw(&self) -> RawHandle {
        self.handle.raw()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn colorspace(&self) -> Colorspace {
        self.colorspace
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    /// The decoded source, when the texture was loaded from one.
    pub fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }
}

fn swizzle_for(colorspace: Colorspace) -> [Swizzle; 4] {
    match colorspace {
        Colorspace::Gray => [Swizzle::Red, Swizzle::Red, Swizzle::Red, Swizzle::One],
        Colorspace::GrayAlpha => [Swizzle::Red, Swizzle::Red, Swizzle::Red, Swizzle::Green],
        _ => Swizzle::IDENTITY,
    }
}

/// Built-in flat-color textures.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TexturePreset {
    Black,
    White,
}

impl TexturePreset {
    pub const ALL: [TexturePreset; 2] = [TexturePreset::Black, TexturePreset::White];

    pub fn color(self) -> [u8; 3] {
        match self {
            TexturePreset::Black => [0; 3],
            TexturePreset::White => [255; 3],
        }
    }
}

/// Preset textures, created once and shared read-only.
#[derive(Debug)]
pub struct TexturePresets {
    black: Rc<Texture>,
    white: Rc<Texture>,
}

impl TexturePresets {
    pub fn new(ctx: &GpuContext) -> Self {
        Self {
            black: Rc::new(Texture::plain(ctx, TexturePreset::Black.color())),
            white: Rc::new(Texture::plain(ctx, TexturePreset::White.color())),
        }
    }

    pub fn get(&self, preset: TexturePreset) -> Rc<Texture> {
        match preset {
            TexturePreset::Black => Rc::clone(&self.black),
            TexturePreset::White => Rc::clone(&self.white),
        }
    }
}
