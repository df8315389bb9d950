use crate::image::PixelData;

use super::error::ShaderError;
use super::types::{
    Attachment, BufferTarget, Capability, ClearMask, FramebufferStatus, RawHandle, ResourceKind,
    TextureParams, TextureStorage, VertexAttribute,
};

/// Handle-based graphics API consumed by the resource wrappers.
///
/// The model is a bind-then-operate state machine: `bind_*` selects the object
/// that subsequent calls of its class act on. Nothing binds implicitly.
///
/// Methods take `&self`; implementations are single-threaded and keep their
/// state behind interior mutability so that every [`ResourceHandle`](super::ResourceHandle)
/// can share one device through a [`GpuContext`](super::GpuContext).
pub trait GraphicsDevice {
    /// Creates one object of `kind`. Programs are normally created through
    /// [`create_program`](Self::create_program) instead.
    fn create(&self, kind: ResourceKind) -> RawHandle;

    /// Destroys an object previously returned by this device.
    fn release(&self, kind: ResourceKind, handle: RawHandle);

    // ── buffers ─────────────────────────────────────────────────────────────

    fn bind_buffer(&self, target: BufferTarget, handle: Option<RawHandle>);

    /// Replaces the contents of the buffer bound to `target`.
    fn buffer_data(&self, target: BufferTarget, data: &[u8]);

    fn bind_vertex_array(&self, handle: Option<RawHandle>);

    /// Records the interleaved layout of the bound array buffer into the bound vertex array.
    fn vertex_layout(&self, stride: u64, attributes: &[VertexAttribute]);

    // ── textures ────────────────────────────────────────────────────────────

    /// Selects the sampling slot that [`bind_texture`](Self::bind_texture) writes to.
    fn active_texture(&self, slot: u32);

    fn bind_texture(&self, handle: Option<RawHandle>);

    fn texture_parameters(&self, params: &TextureParams);

    /// Allocates the bound texture's base level, optionally filled with `data`.
    fn texture_storage(&self, storage: &TextureStorage, data: Option<&PixelData>);

    /// Builds the full mip chain of the bound texture from its base level.
    fn generate_mipmaps(&self);

    // ── framebuffers ────────────────────────────────────────────────────────

    /// Binds a framebuffer as the render target; `None` restores the default output.
    fn bind_framebuffer(&self, handle: Option<RawHandle>);

    fn attach_texture(&self, attachment: Attachment, texture: RawHandle);

    /// Declares which color attachments fragment outputs 0.. are written to.
    fn draw_buffers(&self, attachments: &[Attachment]);

    fn framebuffer_status(&self) -> FramebufferStatus;

    // ── programs ────────────────────────────────────────────────────────────

    fn create_program(&self, vertex: &str, fragment: &str) -> Result<RawHandle, ShaderError>;

    fn use_program(&self, handle: Option<RawHandle>);

    fn uniform_int(&self, program: RawHandle, name: &str, value: i32);

    // ── drawing / presentation ──────────────────────────────────────────────

    fn set_clear_color(&self, color: [f32; 4]);

    fn clear(&self, mask: ClearMask);

    fn set_viewport(&self, width: u32, height: u32);

    fn set_capability(&self, capability: Capability, enabled: bool);

    /// Draws `count` indices of the bound vertex array with the active program.
    fn draw_elements(&self, count: u32);

    /// Shows everything rendered to the default output since the last call.
    fn present(&self);

    /// Returns `false` when the requested swap behavior is unsupported.
    fn set_vertical_sync(&self, enabled: bool) -> bool;

    /// Informs the device that the default output changed size.
    fn resize(&self, _width: u32, _height: u32) {}
}
