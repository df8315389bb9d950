use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::{Context, Result};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::gpu::bindings::Bindings;
use crate::gpu::debug::DebugMessage;
use crate::gpu::device::GraphicsDevice;
use crate::gpu::error::{ShaderError, ShaderStage};
use crate::gpu::types::{
    check_completeness, AttachedStorage, Attachment, BufferTarget, Capability, ClearMask,
    Filter, FramebufferStatus, InternalFormat, RawHandle, ResourceKind, TextureParams,
    TextureStorage, VertexAttribute, Wrap,
};
use crate::image::PixelData;

use super::init::GpuInit;
use super::pipeline::{self, PipelineKey, SlotKind};
use super::pixels::{self, Texel};
use super::surface::{self, SurfaceErrorAction};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

struct GpuTexture {
    texture: wgpu::Texture,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    /// All levels; what shaders sample.
    sample_view: wgpu::TextureView,
    /// Level 0 only; what passes render into.
    attachment_view: wgpu::TextureView,
}

#[derive(Default)]
struct TextureSlot {
    gpu: Option<GpuTexture>,
    storage: Option<TextureStorage>,
    params: TextureParams,
    sampler: Option<wgpu::Sampler>,
    /// Uploaded base level, kept to build mip chains on the CPU.
    level0: Option<Vec<Texel>>,
}

#[derive(Default)]
struct VertexArraySlot {
    vertex_buffer: Option<RawHandle>,
    element_buffer: Option<RawHandle>,
    layout: Option<(u64, Vec<VertexAttribute>)>,
}

#[derive(Default)]
struct FramebufferSlot {
    attachments: BTreeMap<Attachment, RawHandle>,
    draw_buffers: Vec<Attachment>,
}

#[derive(Default)]
struct ProgramSlot {
    modules: Option<(wgpu::ShaderModule, wgpu::ShaderModule)>,
    uniforms: HashMap<String, i32>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

struct Frame {
    surface_texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

/// The window's swapchain and the attachments that go with it.
struct Output {
    config: wgpu::SurfaceConfiguration,
    caps: wgpu::SurfaceCapabilities,
    sample_count: u32,
    depth: wgpu::TextureView,
    msaa: Option<wgpu::TextureView>,
    frame: Option<Frame>,
    viewport: (u32, u32),
}

struct State {
    next_id: u32,
    live: HashMap<u32, ResourceKind>,
    buffers: HashMap<u32, Option<wgpu::Buffer>>,
    vertex_arrays: HashMap<u32, VertexArraySlot>,
    textures: HashMap<u32, TextureSlot>,
    framebuffers: HashMap<u32, FramebufferSlot>,
    programs: HashMap<u32, ProgramSlot>,
    bindings: Bindings,
    output: Output,
    clear_color: wgpu::Color,
    depth_test: bool,
    face_culling: bool,
}

impl State {
    fn allocate(&mut self, kind: ResourceKind) -> RawHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id, kind);

        match kind {
            ResourceKind::Buffer => {
                self.buffers.insert(id, None);
            }
            ResourceKind::VertexArray => {
                self.vertex_arrays.insert(id, VertexArraySlot::default());
            }
            ResourceKind::Texture => {
                self.textures.insert(id, TextureSlot::default());
            }
            ResourceKind::Framebuffer => {
                self.framebuffers.insert(id, FramebufferSlot::default());
            }
            ResourceKind::Program => {
                self.programs.insert(id, ProgramSlot::default());
            }
        }

        NonZeroU32::new(id).unwrap_or(NonZeroU32::MIN)
    }

    fn bound_texture_mut(&mut self) -> Option<&mut TextureSlot> {
        let id = self.bindings.texture()?.get();
        self.textures.get_mut(&id)
    }
}

/// Render targets of one pass.
struct Targets<'a> {
    /// `(render view, resolve view)` per color output.
    colors: Vec<(&'a wgpu::TextureView, Option<&'a wgpu::TextureView>)>,
    color_formats: Vec<wgpu::TextureFormat>,
    depth: Option<(&'a wgpu::TextureView, wgpu::TextureFormat)>,
    sample_count: u32,
    viewport: Option<(u32, u32)>,
}

/// [`GraphicsDevice`] on top of `wgpu`, drawing into a window surface.
///
/// Every clear and draw is recorded and submitted on its own, in call order.
/// The surface texture is acquired by the first operation that targets the
/// default output and handed back by [`present`](GraphicsDevice::present).
pub struct WgpuDevice {
    /// Kept alive for the surface.
    _instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    state: RefCell<State>,
}

impl WgpuDevice {
    /// Creates a device bound to `window`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(window: Arc<Window>, init: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // The surface co-owns the window through the Arc.
        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lumen device"),
                required_features: init.required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        device.on_uncaptured_error(Arc::new(|error: wgpu::Error| {
            DebugMessage::from_wgpu(&error).log();
        }));

        let caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&caps, init.prefer_srgb)
            .context("no supported surface formats")?;
        let alpha_mode = surface::choose_alpha_mode(&caps, init.alpha_mode);

        let present_mode = surface::choose_present_mode(&caps, init.vsync).unwrap_or_else(|| {
            log::warn!("vertical sync cannot be disabled on this surface; using FIFO");
            wgpu::PresentMode::Fifo
        });

        let sample_count = choose_sample_count(&adapter, format, init.sample_count);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };

        surface.configure(&device, &config);

        let (depth, msaa) = output_attachments(&device, &config, sample_count);

        log::info!(
            "wgpu device ready: {}x{} {:?}, {} sample(s)",
            config.width,
            config.height,
            config.format,
            sample_count
        );

        let output = Output {
            viewport: (config.width, config.height),
            config,
            caps,
            sample_count,
            depth,
            msaa,
            frame: None,
        };

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            state: RefCell::new(State {
                next_id: 1,
                live: HashMap::new(),
                buffers: HashMap::new(),
                vertex_arrays: HashMap::new(),
                textures: HashMap::new(),
                framebuffers: HashMap::new(),
                programs: HashMap::new(),
                bindings: Bindings::default(),
                output,
                clear_color: wgpu::Color::BLACK,
                depth_test: false,
                face_culling: false,
            }),
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.state.borrow().output.config.format
    }

    pub fn sample_count(&self) -> u32 {
        self.state.borrow().output.sample_count
    }

    /// Acquires the surface texture if no frame is in flight.
    fn ensure_frame(&self, output: &mut Output) -> bool {
        if output.frame.is_some() {
            return true;
        }
        if output.config.width == 0 || output.config.height == 0 {
            return false;
        }

        match self.surface.get_current_texture() {
            Ok(surface_texture) => {
                let view = surface_texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                output.frame = Some(Frame { surface_texture, view });
                true
            }
            Err(err) => {
                log::debug!("surface acquisition failed: {err}");
                match surface::map_surface_error(&self.surface, &self.device, &output.config, err) {
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {}
                    SurfaceErrorAction::Fatal => log::error!("surface is out of memory"),
                }
                false
            }
        }
    }

    fn compile(&self, stage: ShaderStage, source: &str) -> Result<wgpu::ShaderModule, ShaderError> {
        if source.trim().is_empty() {
            return Err(ShaderError::Compile {
                stage,
                log: "empty shader source".to_string(),
            });
        }

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(match stage {
                ShaderStage::Vertex => "lumen vertex shader",
                ShaderStage::Fragment => "lumen fragment shader",
            }),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let info = pollster::block_on(module.get_compilation_info());
        let errors: Vec<String> = info
            .messages
            .iter()
            .filter(|m| m.message_type == wgpu::CompilationMessageType::Error)
            .map(|m| m.message.clone())
            .collect();

        if errors.is_empty() {
            Ok(module)
        } else {
            Err(ShaderError::Compile {
                stage,
                log: errors.join("\n"),
            })
        }
    }

    fn create_texture(&self, width: u32, height: u32, format: wgpu::TextureFormat, mip_levels: u32) -> GpuTexture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let sample_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let attachment_view = texture.create_view(&wgpu::TextureViewDescriptor {
            base_mip_level: 0,
            mip_level_count: Some(1),
            ..Default::default()
        });

        GpuTexture {
            texture,
            format,
            width,
            height,
            sample_view,
            attachment_view,
        }
    }

    fn write_level(&self, gpu: &GpuTexture, level: u32, width: u32, height: u32, texels: &[Texel]) {
        let bytes = pixels::encode(texels, gpu.format);
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu.texture,
                mip_level: level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * pixels::bytes_per_texel(gpu.format)),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn create_sampler(&self, params: &TextureParams, is_depth: bool) -> wgpu::Sampler {
        let filter = |f: Filter| match f {
            _ if is_depth => wgpu::FilterMode::Nearest,
            Filter::Nearest => wgpu::FilterMode::Nearest,
            Filter::Linear => wgpu::FilterMode::Linear,
        };
        let address_mode = match params.wrap {
            Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            Wrap::Repeat => wgpu::AddressMode::Repeat,
        };

        self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lumen sampler"),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: filter(params.mag_filter),
            min_filter: filter(params.min_filter),
            mipmap_filter: match params.mipmap_filter {
                Some(Filter::Linear) if !is_depth => wgpu::MipmapFilterMode::Linear,
                _ => wgpu::MipmapFilterMode::Nearest,
            },
            // No mipmap filter samples the base level only.
            lod_max_clamp: if params.mipmap_filter.is_some() { 32.0 } else { 0.0 },
            ..Default::default()
        })
    }

    fn submit_pass(
        &self,
        targets: &Targets<'_>,
        clear: Option<(ClearMask, wgpu::Color)>,
        record: impl FnOnce(&mut wgpu::RenderPass<'_>),
    ) {
        let (clear_color, clear_depth) = match clear {
            Some((mask, color)) => (mask.color.then_some(color), mask.depth),
            None => (None, false),
        };

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = targets
            .colors
            .iter()
            .map(|&(view, resolve_target)| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: clear_color.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let depth_stencil_attachment =
            targets
                .depth
                .map(|(view, _)| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: if clear_depth {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lumen pass encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some((width, height)) = targets.viewport {
                pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            }

            record(&mut pass);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

fn texture_format(format: InternalFormat) -> wgpu::TextureFormat {
    if format.is_depth() {
        DEPTH_FORMAT
    } else if format.is_float() {
        wgpu::TextureFormat::Rgba16Float
    } else {
        wgpu::TextureFormat::Rgba8Unorm
    }
}

fn slot_kind(texture: &TextureSlot, gpu: &GpuTexture) -> SlotKind {
    if gpu.format == DEPTH_FORMAT {
        SlotKind::Depth
    } else if texture.params.is_non_filtering() {
        SlotKind::NonFiltering
    } else {
        SlotKind::Filtering
    }
}

fn choose_sample_count(adapter: &wgpu::Adapter, format: wgpu::TextureFormat, requested: u32) -> u32 {
    let requested = requested.max(1);
    if requested == 1 {
        return 1;
    }

    let supported = [format, DEPTH_FORMAT].iter().all(|f| {
        adapter
            .get_texture_format_features(*f)
            .flags
            .sample_count_supported(requested)
    });

    if supported {
        requested
    } else {
        log::warn!("{requested}x multisampling is unsupported; rendering without it");
        1
    }
}

/// Depth buffer and (when multisampled) color buffer of the default output.
fn output_attachments(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    sample_count: u32,
) -> (wgpu::TextureView, Option<wgpu::TextureView>) {
    let size = wgpu::Extent3d {
        width: config.width.max(1),
        height: config.height.max(1),
        depth_or_array_layers: 1,
    };

    let attachment = |label: &str, format: wgpu::TextureFormat| {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    };

    let depth = attachment("lumen output depth", DEPTH_FORMAT);
    let msaa = (sample_count > 1).then(|| attachment("lumen output msaa", config.format));
    (depth, msaa)
}

fn completeness(framebuffer: &FramebufferSlot, textures: &HashMap<u32, TextureSlot>) -> FramebufferStatus {
    let attached: BTreeMap<_, _> = framebuffer
        .attachments
        .iter()
        .map(|(attachment, texture)| {
            let storage = textures
                .get(&texture.get())
                .and_then(|t| t.gpu.as_ref())
                .map(|gpu| AttachedStorage {
                    width: gpu.width,
                    height: gpu.height,
                    is_depth: gpu.format == DEPTH_FORMAT,
                });
            (*attachment, storage)
        })
        .collect();
    check_completeness(&attached, &framebuffer.draw_buffers)
}

fn resolve_targets<'a>(
    bound: Option<RawHandle>,
    output: &'a Output,
    framebuffers: &'a HashMap<u32, FramebufferSlot>,
    textures: &'a HashMap<u32, TextureSlot>,
) -> Option<Targets<'a>> {
    let Some(fb) = bound else {
        let frame = output.frame.as_ref()?;
        let color = match &output.msaa {
            Some(msaa) => (msaa, Some(&frame.view)),
            None => (&frame.view, None),
        };
        let (width, height) = output.viewport;
        return Some(Targets {
            colors: vec![color],
            color_formats: vec![output.config.format],
            depth: Some((&output.depth, DEPTH_FORMAT)),
            sample_count: output.sample_count,
            viewport: (width > 0 && height > 0)
                .then(|| (width.min(output.config.width), height.min(output.config.height))),
        });
    };

    let record = framebuffers.get(&fb.get())?;
    let status = completeness(record, textures);
    if !status.is_complete() {
        log::debug!("skipping pass into incomplete framebuffer #{fb}: {status:?}");
        return None;
    }

    let gpu = |handle: &RawHandle| textures.get(&handle.get()).and_then(|t| t.gpu.as_ref());

    let mut colors = Vec::with_capacity(record.draw_buffers.len());
    let mut color_formats = Vec::with_capacity(record.draw_buffers.len());
    for attachment in &record.draw_buffers {
        let texture = gpu(record.attachments.get(attachment)?)?;
        colors.push((&texture.attachment_view, None));
        color_formats.push(texture.format);
    }

    let depth = record
        .attachments
        .get(&Attachment::Depth)
        .and_then(gpu)
        .map(|t| (&t.attachment_view, t.format));

    Some(Targets {
        colors,
        color_formats,
        depth,
        sample_count: 1,
        viewport: None,
    })
}

impl GraphicsDevice for WgpuDevice {
    fn create(&self, kind: ResourceKind) -> RawHandle {
        self.state.borrow_mut().allocate(kind)
    }

    fn release(&self, kind: ResourceKind, handle: RawHandle) {
        let mut state = self.state.borrow_mut();
        let id = handle.get();
        if state.live.get(&id) != Some(&kind) {
            log::error!("release of unknown {} #{handle}", kind.as_str());
            return;
        }

        state.live.remove(&id);
        if let Some(Some(buffer)) = state.buffers.remove(&id) {
            buffer.destroy();
        }
        state.vertex_arrays.remove(&id);
        if let Some(gpu) = state.textures.remove(&id).and_then(|t| t.gpu) {
            gpu.texture.destroy();
        }
        state.framebuffers.remove(&id);
        state.programs.remove(&id);
        state.bindings.forget(handle);
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
        let (bound, usage) = match target {
            BufferTarget::Array => (state.bindings.array_buffer, wgpu::BufferUsages::VERTEX),
            BufferTarget::ElementArray => (state.bindings.element_buffer, wgpu::BufferUsages::INDEX),
        };
        let Some(slot) = bound.and_then(|h| state.buffers.get_mut(&h.get())) else {
            log::warn!("buffer_data with no {target:?} buffer bound");
            return;
        };

        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lumen buffer"),
            contents: data,
            usage,
        });
        if let Some(old) = slot.replace(buffer) {
            old.destroy();
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
        let Some(slot) = state.bound_texture_mut() else {
            log::warn!("texture_parameters with no texture bound");
            return;
        };
        slot.params = *params;
        if let Some(storage) = slot.storage {
            slot.sampler = Some(self.create_sampler(params, storage.internal_format.is_depth()));
        }
    }

    fn texture_storage(&self, storage: &TextureStorage, data: Option<&PixelData>) {
        let mut state = self.state.borrow_mut();
        let Some(slot) = state.bound_texture_mut() else {
            log::warn!("texture_storage with no texture bound");
            return;
        };

        let is_depth = storage.internal_format.is_depth();
        let (width, height) = (storage.width.max(1), storage.height.max(1));
        let gpu = self.create_texture(width, height, texture_format(storage.internal_format), 1);

        slot.level0 = None;
        match data {
            Some(_) if is_depth => log::warn!("depth textures cannot be uploaded; contents left cleared"),
            Some(data) => {
                let texels = pixels::expand(storage, data, slot.params.swizzle);
                self.write_level(&gpu, 0, width, height, &texels);
                slot.level0 = Some(texels);
            }
            None => {}
        }

        if let Some(old) = slot.gpu.replace(gpu) {
            old.texture.destroy();
        }
        slot.sampler = Some(self.create_sampler(&slot.params, is_depth));
        slot.storage = Some(*storage);
    }

    fn generate_mipmaps(&self) {
        let mut state = self.state.borrow_mut();
        let Some(slot) = state.bound_texture_mut() else {
            log::warn!("generate_mipmaps with no texture bound");
            return;
        };
        let Some(old) = slot.gpu.take() else {
            log::warn!("generate_mipmaps on a texture without storage");
            return;
        };
        if old.format == DEPTH_FORMAT {
            slot.gpu = Some(old);
            return;
        }

        let levels = pixels::mip_level_count(old.width, old.height);
        let gpu = self.create_texture(old.width, old.height, old.format, levels);

        match &slot.level0 {
            Some(level0) => {
                let (mut texels, mut width, mut height) = (level0.clone(), old.width, old.height);
                self.write_level(&gpu, 0, width, height, &texels);
                for level in 1..levels {
                    (texels, width, height) = pixels::downsample(&texels, width, height);
                    self.write_level(&gpu, level, width, height, &texels);
                }
            }
            None => {
                // Rendered contents live on the GPU only; carry the base level over.
                let mut encoder = self
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("lumen mip copy"),
                    });
                encoder.copy_texture_to_texture(
                    old.texture.as_image_copy(),
                    gpu.texture.as_image_copy(),
                    wgpu::Extent3d {
                        width: old.width,
                        height: old.height,
                        depth_or_array_layers: 1,
                    },
                );
                self.queue.submit(std::iter::once(encoder.finish()));
            }
        }

        slot.gpu = Some(gpu);
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
        let state = self.state.borrow();
        match state.bindings.framebuffer {
            None => FramebufferStatus::Undefined,
            Some(fb) => state
                .framebuffers
                .get(&fb.get())
                .map_or(FramebufferStatus::MissingAttachment, |record| {
                    completeness(record, &state.textures)
                }),
        }
    }

    fn create_program(&self, vertex: &str, fragment: &str) -> Result<RawHandle, ShaderError> {
        let vertex = self.compile(ShaderStage::Vertex, vertex)?;
        let fragment = self.compile(ShaderStage::Fragment, fragment)?;

        let mut state = self.state.borrow_mut();
        let handle = state.allocate(ResourceKind::Program);
        if let Some(program) = state.programs.get_mut(&handle.get()) {
            program.modules = Some((vertex, fragment));
        }
        Ok(handle)
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
        let [r, g, b, a] = color.map(f64::from);
        self.state.borrow_mut().clear_color = wgpu::Color { r, g, b, a };
    }

    fn clear(&self, mask: ClearMask) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;

        if state.bindings.framebuffer.is_none() && !self.ensure_frame(&mut state.output) {
            return;
        }
        let Some(targets) = resolve_targets(
            state.bindings.framebuffer,
            &state.output,
            &state.framebuffers,
            &state.textures,
        ) else {
            return;
        };

        self.submit_pass(&targets, Some((mask, state.clear_color)), |_| {});
    }

    fn set_viewport(&self, width: u32, height: u32) {
        self.state.borrow_mut().output.viewport = (width, height);
    }

    fn set_capability(&self, capability: Capability, enabled: bool) {
        let mut state = self.state.borrow_mut();
        match capability {
            Capability::DepthTest => state.depth_test = enabled,
            Capability::FaceCulling => state.face_culling = enabled,
        }
    }

    fn draw_elements(&self, count: u32) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;

        if state.bindings.framebuffer.is_none() && !self.ensure_frame(&mut state.output) {
            return;
        }

        let Some(program_handle) = state.bindings.program else {
            log::warn!("draw_elements with no program in use");
            return;
        };
        let Some(vao) = state
            .bindings
            .vertex_array
            .and_then(|h| state.vertex_arrays.get(&h.get()))
        else {
            log::warn!("draw_elements with no vertex array bound");
            return;
        };
        let buffer = |h: Option<RawHandle>| {
            h.and_then(|h| state.buffers.get(&h.get()))
                .and_then(|b| b.as_ref())
        };
        let (Some((stride, attributes)), Some(vertex_buffer), Some(index_buffer)) = (
            vao.layout.clone(),
            buffer(vao.vertex_buffer),
            buffer(vao.element_buffer),
        ) else {
            log::warn!("draw_elements with an incomplete vertex array");
            return;
        };

        let mut slots = Vec::new();
        let mut bound = Vec::new();
        for (slot, handle) in &state.bindings.texture_slots {
            let Some(texture) = state.textures.get(&handle.get()) else { continue };
            let (Some(gpu), Some(sampler)) = (texture.gpu.as_ref(), texture.sampler.as_ref()) else {
                continue;
            };
            slots.push((*slot, slot_kind(texture, gpu)));
            bound.push((*slot, &gpu.sample_view, sampler));
        }

        let Some(targets) = resolve_targets(
            state.bindings.framebuffer,
            &state.output,
            &state.framebuffers,
            &state.textures,
        ) else {
            return;
        };

        let Some(program) = state.programs.get_mut(&program_handle.get()) else {
            return;
        };
        let Some((vertex_module, fragment_module)) = program.modules.as_ref() else {
            log::warn!("program #{program_handle} has no shaders");
            return;
        };

        let key = PipelineKey {
            color_formats: targets.color_formats.clone(),
            depth_format: targets.depth.map(|(_, format)| format),
            sample_count: targets.sample_count,
            slots,
            stride,
            attributes,
            depth_test: state.depth_test,
            face_culling: state.face_culling,
        };
        let pipeline: &wgpu::RenderPipeline = program.pipelines.entry(key).or_insert_with_key(|key| {
            log::debug!("building pipeline for program #{program_handle}");
            pipeline::build(&self.device, key, vertex_module, fragment_module)
        });

        let bind_group = (!bound.is_empty()).then(|| {
            let entries: Vec<wgpu::BindGroupEntry<'_>> = bound
                .iter()
                .flat_map(|(slot, view, sampler)| {
                    [
                        wgpu::BindGroupEntry {
                            binding: pipeline::texture_binding(*slot),
                            resource: wgpu::BindingResource::TextureView(view),
                        },
                        wgpu::BindGroupEntry {
                            binding: pipeline::sampler_binding(*slot),
                            resource: wgpu::BindingResource::Sampler(sampler),
                        },
                    ]
                })
                .collect();

            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("lumen texture bind group"),
                layout: &pipeline.get_bind_group_layout(0),
                entries: &entries,
            })
        });

        self.submit_pass(&targets, None, |pass| {
            pass.set_pipeline(pipeline);
            if let Some(bind_group) = &bind_group {
                pass.set_bind_group(0, bind_group, &[]);
            }
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..count, 0, 0..1);
        });
    }

    fn present(&self) {
        if let Some(frame) = self.state.borrow_mut().output.frame.take() {
            drop(frame.view);
            frame.surface_texture.present();
        }
    }

    fn set_vertical_sync(&self, enabled: bool) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(mode) = surface::choose_present_mode(&state.output.caps, enabled) else {
            return false;
        };

        let output = &mut state.output;
        output.frame = None;
        output.config.present_mode = mode;
        self.surface.configure(&self.device, &output.config);
        true
    }

    fn resize(&self, width: u32, height: u32) {
        let mut state = self.state.borrow_mut();
        let output = &mut state.output;
        output.frame = None;

        // wgpu cannot configure a 0x0 surface; wait for a real size.
        if width == 0 || height == 0 {
            output.config.width = 0;
            output.config.height = 0;
            return;
        }

        output.config.width = width;
        output.config.height = height;
        self.surface.configure(&self.device, &output.config);

        let (depth, msaa) = output_attachments(&self.device, &output.config, output.sample_count);
        output.depth = depth;
        output.msaa = msaa;
    }
}
