use std::collections::BTreeMap;
use std::num::NonZeroU32;

use crate::image::{Colorspace, SampleType};

/// Raw identifier of a GPU-side object, as handed out by a [`GraphicsDevice`](super::GraphicsDevice).
///
/// Zero is never a valid object, so "no object" is spelled `Option<RawHandle>`.
pub type RawHandle = NonZeroU32;

/// Class of GPU object owned by a [`ResourceHandle`](super::ResourceHandle).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Buffer,
    VertexArray,
    Texture,
    Framebuffer,
    Program,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Buffer,
        ResourceKind::VertexArray,
        ResourceKind::Texture,
        ResourceKind::Framebuffer,
        ResourceKind::Program,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Buffer => "buffer",
            ResourceKind::VertexArray => "vertex array",
            ResourceKind::Texture => "texture",
            ResourceKind::Framebuffer => "framebuffer",
            ResourceKind::Program => "program",
        }
    }
}

/// Binding point of a buffer object.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data.
    Array,
    /// Index data; recorded into the bound vertex array.
    ElementArray,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

/// One attribute of an interleaved vertex layout.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u64,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Wrap {
    ClampToEdge,
    Repeat,
}

/// Source of one sampled channel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Swizzle {
    Red,
    Green,
    Blue,
    Alpha,
    Zero,
    One,
}

impl Swizzle {
    pub const IDENTITY: [Swizzle; 4] = [Swizzle::Red, Swizzle::Green, Swizzle::Blue, Swizzle::Alpha];

    /// Resolves this channel source against an RGBA texel.
    pub fn pick(self, texel: [f32; 4]) -> f32 {
        match self {
            Swizzle::Red => texel[0],
            Swizzle::Green => texel[1],
            Swizzle::Blue => texel[2],
            Swizzle::Alpha => texel[3],
            Swizzle::Zero => 0.0,
            Swizzle::One => 1.0,
        }
    }
}

/// Sampling state of the bound texture.
///
/// `mipmap_filter == None` samples the base level only.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureParams {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub mipmap_filter: Option<Filter>,
    pub wrap: Wrap,
    pub swizzle: [Swizzle; 4],
}

impl TextureParams {
    pub fn nearest() -> Self {
        Self {
            min_filter: Filter::Nearest,
            mag_filter: Filter::Nearest,
            mipmap_filter: None,
            wrap: Wrap::Repeat,
            swizzle: Swizzle::IDENTITY,
        }
    }

    pub fn linear() -> Self {
        Self {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            ..Self::nearest()
        }
    }

    /// True when no stage of sampling interpolates.
    pub fn is_non_filtering(&self) -> bool {
        self.min_filter == Filter::Nearest
            && self.mag_filter == Filter::Nearest
            && self.mipmap_filter != Some(Filter::Linear)
    }
}

impl Default for TextureParams {
    fn default() -> Self {
        Self::nearest()
    }
}

/// Storage format of a texture as seen by shaders.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum InternalFormat {
    R8,
    Rg8,
    Rgb8,
    Rgba8,
    R16F,
    Rg16F,
    Rgb16F,
    Rgba16F,
    Depth32F,
}

impl InternalFormat {
    /// 8-bit unsigned storage matching a colorspace's channel layout.
    pub fn unorm_for(colorspace: Colorspace) -> Self {
        match colorspace {
            Colorspace::Gray => InternalFormat::R8,
            Colorspace::GrayAlpha => InternalFormat::Rg8,
            Colorspace::Rgb => InternalFormat::Rgb8,
            Colorspace::Rgba => InternalFormat::Rgba8,
            Colorspace::Depth => InternalFormat::Depth32F,
        }
    }

    /// Half-float storage sized by the colorspace's channel count.
    pub fn float_for(colorspace: Colorspace) -> Self {
        match colorspace {
            Colorspace::Gray => InternalFormat::R16F,
            Colorspace::GrayAlpha => InternalFormat::Rg16F,
            Colorspace::Rgb => InternalFormat::Rgb16F,
            Colorspace::Rgba => InternalFormat::Rgba16F,
            Colorspace::Depth => InternalFormat::Depth32F,
        }
    }

    pub fn channels(self) -> usize {
        match self {
            InternalFormat::R8 | InternalFormat::R16F | InternalFormat::Depth32F => 1,
            InternalFormat::Rg8 | InternalFormat::Rg16F => 2,
            InternalFormat::Rgb8 | InternalFormat::Rgb16F => 3,
            InternalFormat::Rgba8 | InternalFormat::Rgba16F => 4,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            InternalFormat::R16F
                | InternalFormat::Rg16F
                | InternalFormat::Rgb16F
                | InternalFormat::Rgba16F
                | InternalFormat::Depth32F
        )
    }

    pub fn is_depth(self) -> bool {
        self == InternalFormat::Depth32F
    }
}

/// Allocation request for the bound texture's base level.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureStorage {
    pub width: u32,
    pub height: u32,
    pub internal_format: InternalFormat,
    /// Channel layout of the uploaded pixels (or of the allocation when empty).
    pub source_layout: Colorspace,
    pub sample_type: SampleType,
}

/// Output slot of a framebuffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Attachment {
    Depth,
    Color(u8),
}

/// Result of a framebuffer completeness check.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FramebufferStatus {
    Complete,
    /// Nothing attached at all.
    MissingAttachment,
    /// An attachment refers to a texture without storage or with a zero-sized
    /// base level, or a color slot holds depth (or vice versa).
    IncompleteAttachment,
    /// A draw buffer names a color slot with nothing attached.
    IncompleteDrawBuffer,
    /// Attachments disagree on width/height.
    SizeMismatch,
    /// The default framebuffer is bound; its completeness is owned by the platform.
    Undefined,
}

impl FramebufferStatus {
    pub fn is_complete(self) -> bool {
        self == FramebufferStatus::Complete
    }
}

/// What a device knows about an attached texture when checking completeness.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AttachedStorage {
    pub width: u32,
    pub height: u32,
    pub is_depth: bool,
}

/// Completeness rules shared by every device implementation.
///
/// `None` storage means the attached texture was never given storage.
pub fn check_completeness(
    attachments: &BTreeMap<Attachment, Option<AttachedStorage>>,
    draw_buffers: &[Attachment],
) -> FramebufferStatus {
    if attachments.is_empty() {
        return FramebufferStatus::MissingAttachment;
    }

    let mut size = None;
    for (attachment, storage) in attachments {
        let Some(storage) = storage else {
            return FramebufferStatus::IncompleteAttachment;
        };
        if storage.width == 0 || storage.height == 0 {
            return FramebufferStatus::IncompleteAttachment;
        }

        let wants_depth = *attachment == Attachment::Depth;
        if storage.is_depth != wants_depth {
            return FramebufferStatus::IncompleteAttachment;
        }

        match size {
            None => size = Some((storage.width, storage.height)),
            Some(s) if s != (storage.width, storage.height) => {
                return FramebufferStatus::SizeMismatch;
            }
            Some(_) => {}
        }
    }

    let dangling = draw_buffers
        .iter()
        .any(|b| *b == Attachment::Depth || !attachments.contains_key(b));
    if dangling {
        return FramebufferStatus::IncompleteDrawBuffer;
    }

    FramebufferStatus::Complete
}

/// Buffers affected by a clear.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
}

impl ClearMask {
    pub const COLOR: ClearMask = ClearMask { color: true, depth: false };
    pub const DEPTH: ClearMask = ClearMask { color: false, depth: true };
    pub const ALL: ClearMask = ClearMask { color: true, depth: true };
}

/// Fixed-function state toggles.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Capability {
    DepthTest,
    FaceCulling,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(width: u32, height: u32, is_depth: bool) -> Option<AttachedStorage> {
        Some(AttachedStorage { width, height, is_depth })
    }

    // ── check_completeness ────────────────────────────────────────────────

    #[test]
    fn depth_plus_two_colors_is_complete() {
        let attachments = BTreeMap::from([
            (Attachment::Depth, storage(800, 600, true)),
            (Attachment::Color(0), storage(800, 600, false)),
            (Attachment::Color(1), storage(800, 600, false)),
        ]);
        let status = check_completeness(&attachments, &[Attachment::Color(0), Attachment::Color(1)]);
        assert_eq!(status, FramebufferStatus::Complete);
    }

    #[test]
    fn empty_framebuffer_is_missing_attachment() {
        let status = check_completeness(&BTreeMap::new(), &[]);
        assert_eq!(status, FramebufferStatus::MissingAttachment);
    }

    #[test]
    fn mismatched_sizes_are_rejected() {
        let attachments = BTreeMap::from([
            (Attachment::Depth, storage(800, 600, true)),
            (Attachment::Color(0), storage(400, 300, false)),
        ]);
        let status = check_completeness(&attachments, &[Attachment::Color(0)]);
        assert_eq!(status, FramebufferStatus::SizeMismatch);
    }

    #[test]
    fn color_texture_in_depth_slot_is_incomplete() {
        let attachments = BTreeMap::from([(Attachment::Depth, storage(8, 8, false))]);
        assert_eq!(
            check_completeness(&attachments, &[]),
            FramebufferStatus::IncompleteAttachment
        );
    }

    #[test]
    fn texture_without_storage_is_incomplete() {
        let attachments = BTreeMap::from([(Attachment::Color(0), None)]);
        assert_eq!(
            check_completeness(&attachments, &[Attachment::Color(0)]),
            FramebufferStatus::IncompleteAttachment
        );
    }

    #[test]
    fn zero_sized_attachment_is_incomplete() {
        let attachments = BTreeMap::from([
            (Attachment::Depth, storage(0, 0, true)),
            (Attachment::Color(0), storage(0, 0, false)),
        ]);
        assert_eq!(
            check_completeness(&attachments, &[Attachment::Color(0)]),
            FramebufferStatus::IncompleteAttachment
        );
    }

    #[test]
    fn draw_buffer_without_attachment_is_incomplete() {
        let attachments = BTreeMap::from([(Attachment::Color(0), storage(8, 8, false))]);
        let status = check_completeness(&attachments, &[Attachment::Color(0), Attachment::Color(1)]);
        assert_eq!(status, FramebufferStatus::IncompleteDrawBuffer);
    }

    // ── params / formats ──────────────────────────────────────────────────

    #[test]
    fn float_formats_follow_channel_count() {
        assert_eq!(InternalFormat::float_for(Colorspace::Gray), InternalFormat::R16F);
        assert_eq!(InternalFormat::float_for(Colorspace::GrayAlpha), InternalFormat::Rg16F);
        assert_eq!(InternalFormat::float_for(Colorspace::Rgb), InternalFormat::Rgb16F);
        assert_eq!(InternalFormat::float_for(Colorspace::Rgba), InternalFormat::Rgba16F);
        assert_eq!(InternalFormat::Rgb16F.channels(), 3);
    }

    #[test]
    fn linear_params_are_filtering() {
        assert!(TextureParams::nearest().is_non_filtering());
        assert!(!TextureParams::linear().is_non_filtering());
    }
}
