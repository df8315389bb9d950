//! Recording device for tests and GPU-less runs.
//!
//! `HeadlessDevice` keeps the same bind-state machine as a real device, validates
//! object lifetimes, and records what was drawn and cleared. Nothing is rasterized.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;
use std::rc::Rc;

use crate::image::PixelData;

use super::bindings::Bindings;
use super::context::GpuContext;
use super::device::GraphicsDevice;
use super::error::{ShaderError, ShaderStage};
use super::types::{
    check_completeness, AttachedStorage, Attachment, BufferTarget, Capability, ClearMask,
    FramebufferStatus, RawHandle, ResourceKind, TextureParams, TextureStorage, VertexAttribute,
};

/// What the device knows about one texture object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureRecord {
    pub storage: Option<TextureStorage>,
    pub params: Option<TextureParams>,
    /// Number of levels in the mip chain (1 until mipmaps are generated).
    pub mip_levels: u32,
    /// Samples uploaded with the base level.
    pub uploaded: Option<PixelData>,
}

/// One recorded `draw_elements` call.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub framebuffer: Option<RawHandle>,
    pub program: Option<RawHandle>,
    pub vertex_array: Option<RawHandle>,
    pub count: u32,
    /// `(slot, texture)` pairs bound at draw time, ordered by slot.
    pub textures: Vec<(u32, RawHandle)>,
}

/// One recorded `clear` call.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearCall {
    pub framebuffer: Option<RawHandle>,
    pub mask: ClearMask,
    pub color: [f32; 4],
}

/// Lifetime counters snapshot.
#[derive(Debug, Clone, Default)]
pub struct DeviceStats {
    created: HashMap<ResourceKind, usize>,
    released: HashMap<ResourceKind, usize>,
    /// Releases of unknown or already released objects.
    pub invalid_releases: usize,
    pub presents: usize,
}

impl DeviceStats {
    pub fn created(&self, kind: ResourceKind) -> usize {
        self.created.get(&kind).copied().unwrap_or(0)
    }

    pub fn released(&self, kind: ResourceKind) -> usize {
        self.released.get(&kind).copied().unwrap_or(0)
    }

    pub fn live(&self, kind: ResourceKind) -> usize {
        self.created(kind) - self.released(kind).min(self.created(kind))
    }
}

#[derive(Debug, Default)]
struct VertexArrayRecord {
    element_buffer: Option<RawHandle>,
    vertex_buffer: Option<RawHandle>,
    layout: Option<(u64, Vec<VertexAttribute>)>,
}

#[derive(Debug, Default)]
struct FramebufferRecord {
    attachments: BTreeMap<Attachment, RawHandle>,
    draw_buffers: Vec<Attachment>,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    uniforms: HashMap<String, i32>,
}

#[derive(Debug)]
struct State {
    next_id: u32,
    live: HashMap<u32, ResourceKind>,
    stats: DeviceStats,
    buffers: HashMap<u32, Vec<u8>>,
    vertex_arrays: HashMap<u32, VertexArrayRecord>,
    textures: HashMap<u32, TextureRecord>,
    framebuffers: HashMap<u32, FramebufferRecord>,
    programs: HashMap<u32, ProgramRecord>,
    bindings: Bindings,
    clear_color: [f32; 4],
    viewport: (u32, u32),
    capabilities: HashMap<Capability, bool>,
    vsync: bool,
    draws: Vec<DrawCall>,
    clears: Vec<ClearCall>,
    statuses: Vec<FramebufferStatus>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            next_id: 1,
            live: HashMap::new(),
            stats: DeviceStats::default(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            bindings: Bindings::default(),
            clear_color: [0.0; 4],
            viewport: (0, 0),
            capabilities: HashMap::new(),
            vsync: true,
            draws: Vec::new(),
            clears: Vec::new(),
            statuses: Vec::new(),
        }
    }
}

impl State {
    fn allocate(&mut self, kind: ResourceKind) -> RawHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id, kind);
        *self.stats.created.entry(kind).or_default() += 1;

        match kind {
            ResourceKind::Buffer => {
                self.buffers.insert(id, Vec::new());
            }
            ResourceKind::VertexArray => {
                self.vertex_arrays.insert(id, VertexArrayRecord::default());
            }
            ResourceKind::Texture => {
                self.textures.insert(id, TextureRecord::default());
            }
            ResourceKind::Framebuffer => {
                self.framebuffers.insert(id, FramebufferRecord::default());
            }
            ResourceKind::Program => {
                self.programs.insert(id, ProgramRecord::default());
            }
        }

        NonZeroU32::new(id).unwrap_or(NonZeroU32::MIN)
    }

    fn is_live(&self, kind: ResourceKind, handle: RawHandle) -> bool {
        self.live.get(&handle.get()) == Some(&kind)
    }

    fn bound_texture_mut(&mut self) -> Option<&mut TextureRecord> {
        let id = self.bindings.texture()?.get();
        self.textures.get_mut(&id)
    }
}

/// GPU-less [`GraphicsDevice`] that records every operation.
#[derive(Debug)]
pub struct HeadlessDevice {
    state: RefCell<State>,
    vsync_supported: bool,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State::default()),
            vsync_supported: true,
        }
    }

    /// A new device plus a context driving it, keeping the typed handle for inspection.
    pub fn with_context() -> (Rc<Self>, GpuContext) {
        let device = Rc::new(Self::new());
        let ctx = GpuContext::from_rc(device.clone());
        (device, ctx)
    }

    /// A device whose swap interval cannot be changed.
    pub fn without_vsync_control() -> Self {
        Self {
            vsync_supported: false,
            ..Self::new()
        }
    }

    pub fn stats(&self) -> DeviceStats {
        self.state.borrow().stats.clone()
    }

    pub fn texture(&self, handle: RawHandle) -> Option<TextureRecord> {
        self.state.borrow().textures.get(&handle.get()).cloned()
    }

    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.state.borrow().draws.clone()
    }

    pub fn clears(&self) -> Vec<ClearCall> {
        self.state.borrow().clears.clone()
    }

    /// Every status returned by `framebuffer_status`, in call order.
    pub fn status_checks(&self) -> Vec<FramebufferStatus> {
        self.state.borrow().statuses.clone()
    }

    pub fn uniform(&self, program: RawHandle, name: &str) -> Option<i32> {
        let state = self.state.borrow();
        state.programs.get(&program.get())?.uniforms.get(name).copied()
    }

    pub fn buffer_contents(&self, buffer: RawHandle) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer.get()).cloned()
    }

    pub fn capability(&self, capability: Capability) -> bool {
        let state = self.state.borrow();
        state.capabilities.get(&capability).copied().unwrap_or(false)
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.state.borrow().viewport
    }

    pub fn bound_framebuffer(&self) -> Option<RawHandle> {
        self.state.borrow().bindings.framebuffer
    }

    pub fn vertical_sync(&self) -> bool {
        self.state.borrow().vsync
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create(&self, kind: ResourceKind) -> RawHandle {
        self.state.borrow_mut().allocate(kind)
    }

    fn release(&self, kind: ResourceKind, handle: RawHandle) {
        let mut state = self.state.borrow_mut();
        if !state.is_live(kind, handle) {
            log::error!("release of unknown {} #{handle}", kind.as_str());
            state.stats.invalid_releases += 1;
            return;
        }

        let id = handle.get();
        state.live.remove(&id);
        state.buffers.remove(&id);
        state.vertex_arrays.remove(&id);
        state.textures.remove(&id);
        state.framebuffers.remove(&id);
        state.programs.remove(&id);
        state.bindings.forget(handle);
        *state.stats.released.entry(kind).or_default() += 1;
    }

    fn bind_buffer(&self, target: BufferTarget, handle: Option<RawHandle>) {
        let mut state = self.state.borrow_mut();
        match target {
            BufferTarget::Array => state.bindings.array_buffer = handle,
            BufferTarget::ElementArray => {
                state.bindings.element_buffer = handle;
                if let Some(vao) = state.bindings.vertex_array {
                    if let Some(record) = state.vertex_arrays.get_mut(&vao.get()) {
                        record.element_buffer = handle;
                    }
                }
            }
        }
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        let bound = match target {
            BufferTarget::Array => state.bindings.array_buffer,
            BufferTarget::ElementArray => state.bindings.element_buffer,
        };
        match bound.and_then(|h| state.buffers.get_mut(&h.get())) {
            Some(contents) => *contents = data.to_vec(),
            None => log::warn!("buffer_data with no {target:?} buffer bound"),
        }
    }

    fn bind_vertex_array(&self, handle: Option<RawHandle>) {
        let mut state = self.state.borrow_mut();
        let element_buffer = handle
            .and_then(|h| state.vertex_arrays.get(&h.get()))
            .and_then(|r| r.element_buffer);
        state.bindings.vertex_array = handle;
        state.bindings.element_buffer = element_buffer;
    }

    fn vertex_layout(&self, stride: u64, attributes: &[VertexAttribute]) {
        let mut state = self.state.borrow_mut();
        let vertex_buffer = state.bindings.array_buffer;
        let Some(vao) = state.bindings.vertex_array else {
            log::warn!("vertex_layout with no vertex array bound");
            return;
        };
        if let Some(record) = state.vertex_arrays.get_mut(&vao.get()) {
            record.vertex_buffer = vertex_buffer;
            record.layout = Some((stride, attributes.to_vec()));
        }
    }

    fn active_texture(&self, slot: u32) {
        self.state.borrow_mut().bindings.active_slot = slot;
    }

    fn bind_texture(&self, handle: Option<RawHandle>) {
        self.state.borrow_mut().bindings.bind_texture(handle);
    }

    fn texture_parameters(&self, params: &TextureParams) {
        let mut state = self.state.borrow_mut();
        match state.bound_texture_mut() {
            Some(record) => record.params = Some(*params),
            None => log::warn!("texture_parameters with no texture bound"),
        }
    }

    fn texture_storage(&self, storage: &TextureStorage, data: Option<&PixelData>) {
        let mut state = self.state.borrow_mut();
        match state.bound_texture_mut() {
            Some(record) => {
                record.storage = Some(*storage);
                record.mip_levels = 1;
                record.uploaded = data.cloned();
            }
            None => log::warn!("texture_storage with no texture bound"),
        }
    }

    fn generate_mipmaps(&self) {
        let mut state = self.state.borrow_mut();
        let Some(record) = state.bound_texture_mut() else {
            log::warn!("generate_mipmaps with no texture bound");
            return;
        };
        if let Some(storage) = record.storage {
            record.mip_levels = storage.width.max(storage.height).max(1).ilog2() + 1;
        }
    }

    fn bind_framebuffer(&self, handle: Option<RawHandle>) {
        self.state.borrow_mut().bindings.framebuffer = handle;
    }

    fn attach_texture(&self, attachment: Attachment, texture: RawHandle) {
        let mut state = self.state.borrow_mut();
        let Some(fb) = state.bindings.framebuffer else {
            log::warn!("attach_texture with the default framebuffer bound");
            return;
        };
        if let Some(record) = state.framebuffers.get_mut(&fb.get()) {
            record.attachments.insert(attachment, texture);
        }
    }

    fn draw_buffers(&self, attachments: &[Attachment]) {
        let mut state = self.state.borrow_mut();
        let Some(fb) = state.bindings.framebuffer else { return };
        if let Some(record) = state.framebuffers.get_mut(&fb.get()) {
            record.draw_buffers = attachments.to_vec();
        }
    }

    fn framebuffer_status(&self) -> FramebufferStatus {
        let mut state = self.state.borrow_mut();
        let status = match state.bindings.framebuffer {
            None => FramebufferStatus::Undefined,
            Some(fb) => match state.framebuffers.get(&fb.get()) {
                None => FramebufferStatus::MissingAttachment,
                Some(record) => {
                    let attached: BTreeMap<_, _> = record
                        .attachments
                        .iter()
                        .map(|(attachment, texture)| {
                            let storage = state
                                .textures
                                .get(&texture.get())
                                .and_then(|t| t.storage)
                                .map(|s| AttachedStorage {
                                    width: s.width,
                                    height: s.height,
                                    is_depth: s.internal_format.is_depth(),
                                });
                            (*attachment, storage)
                        })
                        .collect();
                    check_completeness(&attached, &record.draw_buffers)
                }
            },
        };
        state.statuses.push(status);
        status
    }

    fn create_program(&self, vertex: &str, fragment: &str) -> Result<RawHandle, ShaderError> {
        for (stage, source) in [(ShaderStage::Vertex, vertex), (ShaderStage::Fragment, fragment)] {
            if source.trim().is_empty() {
                return Err(ShaderError::Compile {
                    stage,
                    log: "empty shader source".to_string(),
                });
            }
        }
        Ok(self.state.borrow_mut().allocate(ResourceKind::Program))
    }

    fn use_program(&self, handle: Option<RawHandle>) {
        self.state.borrow_mut().bindings.program = handle;
    }

    fn uniform_int(&self, program: RawHandle, name: &str, value: i32) {
        let mut state = self.state.borrow_mut();
        match state.programs.get_mut(&program.get()) {
            Some(record) => {
                record.uniforms.insert(name.to_string(), value);
            }
            None => log::warn!("uniform '{name}' sent to unknown program #{program}"),
        }
    }

    fn set_clear_color(&self, color: [f32; 4]) {
        self.state.borrow_mut().clear_color = color;
    }

    fn clear(&self, mask: ClearMask) {
        let mut state = self.state.borrow_mut();
        let call = ClearCall {
            framebuffer: state.bindings.framebuffer,
            mask,
            color: state.clear_color,
        };
        state.clears.push(call);
    }

    fn set_viewport(&self, width: u32, height: u32) {
        self.state.borrow_mut().viewport = (width, height);
    }

    fn set_capability(&self, capability: Capability, enabled: bool) {
        self.state.borrow_mut().capabilities.insert(capability, enabled);
    }

    fn draw_elements(&self, count: u32) {
        let mut state = self.state.borrow_mut();
        let call = DrawCall {
            framebuffer: state.bindings.framebuffer,
            program: state.bindings.program,
            vertex_array: state.bindings.vertex_array,
            count,
            textures: state
                .bindings
                .texture_slots
                .iter()
                .map(|(slot, tex)| (*slot, *tex))
                .collect(),
        };
        state.draws.push(call);
    }

    fn present(&self) {
        self.state.borrow_mut().stats.presents += 1;
    }

    fn set_vertical_sync(&self, enabled: bool) -> bool {
        if !self.vsync_supported {
            return false;
        }
        self.state.borrow_mut().vsync = enabled;
        true
    }
}
