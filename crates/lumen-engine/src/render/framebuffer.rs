//! Multi-target framebuffer: depth, color and normal written in one pass, then
//! composited to the default output by a fullscreen draw.

use crate::gpu::{
    Attachment, ClearMask, FramebufferStatus, GpuContext, ResourceHandle, ResourceKind,
    ShaderError,
};
use crate::image::Colorspace;

use super::buffers::{Vertex, VertexArray, VertexBuffer};
use super::shader::ShaderProgram;
use super::texture::Texture;

/// Vertex stage shared by every framebuffer: passes the quad through untransformed.
pub const FULLSCREEN_VERTEX_SHADER: &str = r#"
struct VertexOut {
    @builtin(position) position: vec4<f32>,
    @location(0) texcoords: vec2<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) texcoords: vec2<f32>) -> VertexOut {
    var out: VertexOut;
    out.position = vec4<f32>(position.xy, 0.0, 1.0);
    out.texcoords = texcoords;
    return out;
}
"#;

/// Fragment stage that shows the color buffer as is.
pub const COMPOSITE_COLOR_SHADER: &str = r#"
@group(0) @binding(0) var scene_depth: texture_depth_2d;
@group(0) @binding(1) var depth_sampler: sampler;
@group(0) @binding(2) var scene_color: texture_2d<f32>;
@group(0) @binding(3) var color_sampler: sampler;
@group(0) @binding(4) var scene_normal: texture_2d<f32>;
@group(0) @binding(5) var normal_sampler: sampler;

@fragment
fn fs_main(@location(0) texcoords: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(scene_color, color_sampler, texcoords);
}
"#;

const DEPTH_SLOT: u32 = 0;
const COLOR_SLOT: u32 = 1;
const NORMAL_SLOT: u32 = 2;

/// Two triangles covering clip space, texcoords with a top-left origin.
#[derive(Debug)]
struct ScreenQuad {
    vertex_array: VertexArray,
    _vertex_buffer: VertexBuffer,
}

impl ScreenQuad {
    const INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

    fn new(ctx: &GpuContext) -> Self {
        let normal = [0.0, 0.0, 1.0];
        let vertex_buffer = VertexBuffer::with_vertices(
            ctx,
            vec![
                Vertex::new([-1.0, -1.0, 0.0], [0.0, 1.0], normal),
                Vertex::new([1.0, -1.0, 0.0], [1.0, 1.0], normal),
                Vertex::new([1.0, 1.0, 0.0], [1.0, 0.0], normal),
                Vertex::new([-1.0, 1.0, 0.0], [0.0, 0.0], normal),
            ],
        );

        let mut vertex_array = VertexArray::new(ctx);
        vertex_array.element_buffer_mut().indices = Self::INDICES.to_vec();

        vertex_array.bind();
        vertex_buffer.bind();
        vertex_buffer.upload();
        vertex_array.describe_vertices();
        vertex_array.element_buffer().upload();
        vertex_array.unbind();
        vertex_buffer.unbind();

        Self {
            vertex_array,
            _vertex_buffer: vertex_buffer,
        }
    }

    fn draw(&self, ctx: &GpuContext) {
        self.vertex_array.bind();
        ctx.draw_elements(Self::INDICES.len() as u32);
        self.vertex_array.unbind();
    }
}

/// Offscreen target with depth, color and normal attachments.
///
/// Use [`bind`](Self::bind) before drawing the scene, then
/// [`display`](Self::display) to composite the buffers to the screen with the
/// fragment shader given at construction. Its textures are readable at slots
/// 0 (depth), 1 (color) and 2 (normal).
#[derive(Debug)]
pub struct Framebuffer {
    handle: ResourceHandle,
    depth: Texture,
    color: Texture,
    normal: Texture,
    program: ShaderProgram,
    quad: ScreenQuad,
    width: u32,
    height: u32,
    status: FramebufferStatus,
}

impl Framebuffer {
    /// Creates the three targets and the composite program.
    ///
    /// An incomplete framebuffer is only logged; the object stays usable.
    pub fn new(ctx: &GpuContext, width: u32, height: u32, fragment: &str) -> Result<Self, ShaderError> {
        let program = ShaderProgram::new(ctx, FULLSCREEN_VERTEX_SHADER, fragment)?;

        let depth = Texture::render_target(ctx, width, height, Colorspace::Depth);
        let color = Texture::render_target(ctx, width, height, Colorspace::Rgba);
        let normal = Texture::render_target(ctx, width, height, Colorspace::Rgb);

        let handle = ResourceHandle::create(ctx, ResourceKind::Framebuffer);
        ctx.bind_framebuffer(Some(handle.raw()));
        ctx.attach_texture(Attachment::Depth, depth.raw());
        ctx.attach_texture(Attachment::Color(0), color.raw());
        ctx.attach_texture(Attachment::Color(1), normal.raw());
        ctx.draw_buffers(&[Attachment::Color(0), Attachment::Color(1)]);

        program.send_uniform_int("uniSceneBuffers.depth", DEPTH_SLOT as i32);
        program.send_uniform_int("uniSceneBuffers.color", COLOR_SLOT as i32);
        program.send_uniform_int("uniSceneBuffers.normal", NORMAL_SLOT as i32);

        let status = ctx.framebuffer_status();
        if !status.is_complete() {
            log::warn!("framebuffer {width}x{height} is not complete: {status:?}");
        }
        ctx.bind_framebuffer(None);

        Ok(Self {
            handle,
            depth,
            color,
            normal,
            program,
            quad: ScreenQuad::new(ctx),
            width,
            height,
            status,
        })
    }

    /// Makes this the render target and clears its color and depth.
    pub fn bind(&self) {
        let ctx = self.handle.context();
        ctx.bind_framebuffer(Some(self.handle.raw()));
        ctx.clear(ClearMask::ALL);
    }

    /// Restores the default output as render target.
    pub fn unbind(&self) {
        self.handle.context().bind_framebuffer(None);
    }

    /// Composites the three buffers onto the default output with one draw.
    pub fn display(&self) {
        let ctx = self.handle.context();
        ctx.bind_framebuffer(None);
        ctx.clear(ClearMask::COLOR);

        let targets = [
            (DEPTH_SLOT, &self.depth),
            (COLOR_SLOT, &self.color),
            (NORMAL_SLOT, &self.normal),
        ];
        for (slot, texture) in targets {
            Texture::activate(ctx, slot);
            texture.bind();
        }

        self.program.use_program();
        self.quad.draw(ctx);

        // The targets must not stay sampled while they are rendered into.
        for (slot, texture) in targets.into_iter().rev() {
            Texture::activate(ctx, slot);
            texture.unbind();
        }
    }

    pub fn depth_buffer(&self) -> &Texture {
        &self.depth
    }

    pub fn color_buffer(&self) -> &Texture {
        &self.color
    }

    pub fn normal_buffer(&self) -> &Texture {
        &self.normal
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Completeness observed at construction.
    pub fn status(&self) -> FramebufferStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{HeadlessDevice, InternalFormat};

    fn framebuffer(width: u32, height: u32) -> (std::rc::Rc<HeadlessDevice>, Framebuffer) {
        let (device, ctx) = HeadlessDevice::with_context();
        let fb = Framebuffer::new(&ctx, width, height, COMPOSITE_COLOR_SHADER).unwrap();
        (device, fb)
    }

    #[test]
    fn construction_reports_complete_once() {
        let (device, fb) = framebuffer(800, 600);

        assert_eq!(device.status_checks(), vec![FramebufferStatus::Complete]);
        assert!(fb.status().is_complete());
        assert_eq!(device.bound_framebuffer(), None);
    }

    #[test]
    fn incomplete_framebuffer_is_still_usable() {
        let (device, fb) = framebuffer(0, 0);

        assert_eq!(device.status_checks(), vec![FramebufferStatus::IncompleteAttachment]);
        assert!(!fb.status().is_complete());

        fb.bind();
        assert_eq!(device.bound_framebuffer(), Some(fb.handle.raw()));
        fb.display();

        let draws = device.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].count, 6);
        assert_eq!(device.bound_framebuffer(), None);
    }

    #[test]
    fn targets_share_the_framebuffer_size() {
        let (device, fb) = framebuffer(800, 600);

        let formats: Vec<_> = [fb.depth_buffer(), fb.color_buffer(), fb.normal_buffer()]
            .iter()
            .map(|t| {
                assert_eq!((t.width(), t.height()), (800, 600));
                device.texture(t.raw()).unwrap().storage.unwrap().internal_format
            })
            .collect();
        assert_eq!(
            formats,
            vec![InternalFormat::Depth32F, InternalFormat::Rgba8, InternalFormat::Rgb8]
        );
    }

    #[test]
    fn program_reads_the_fixed_slots() {
        let (device, fb) = framebuffer(64, 64);
        let program = fb.program().handle().raw();

        assert_eq!(device.uniform(program, "uniSceneBuffers.depth"), Some(0));
        assert_eq!(device.uniform(program, "uniSceneBuffers.color"), Some(1));
        assert_eq!(device.uniform(program, "uniSceneBuffers.normal"), Some(2));
    }

    #[test]
    fn bind_clears_color_and_depth_of_the_target() {
        let (device, fb) = framebuffer(64, 64);
        fb.bind();

        let clear = *device.clears().last().unwrap();
        assert_eq!(clear.framebuffer, Some(fb.handle.raw()));
        assert_eq!(clear.mask, ClearMask::ALL);
    }

    #[test]
    fn display_draws_one_fullscreen_quad() {
        let (device, fb) = framebuffer(800, 600);
        fb.bind();
        fb.display();

        let draws = device.draw_calls();
        assert_eq!(draws.len(), 1);

        let draw = &draws[0];
        assert_eq!(draw.framebuffer, None);
        assert_eq!(draw.count, 6);
        assert_eq!(draw.program, Some(fb.program().handle().raw()));
        assert_eq!(
            draw.textures,
            vec![
                (0, fb.depth_buffer().raw()),
                (1, fb.color_buffer().raw()),
                (2, fb.normal_buffer().raw()),
            ]
        );

        let clear = *device.clears().last().unwrap();
        assert_eq!((clear.framebuffer, clear.mask), (None, ClearMask::COLOR));
    }

    #[test]
    fn display_leaves_targets_unbound() {
        let (device, fb) = framebuffer(32, 32);
        fb.display();
        fb.bind();

        fb.handle.context().draw_elements(3);
        assert!(device.draw_calls()[1].textures.is_empty());
    }

    #[test]
    fn shader_failure_is_propagated_without_leaks() {
        let (device, ctx) = HeadlessDevice::with_context();
        let result = Framebuffer::new(&ctx, 16, 16, "");

        assert!(result.is_err());
        for kind in ResourceKind::ALL {
            assert_eq!(device.stats().live(kind), 0, "{kind:?}");
        }
    }

    #[test]
    fn drop_releases_every_object() {
        let (device, fb) = framebuffer(16, 16);
        drop(fb);

        let stats = device.stats();
        for kind in ResourceKind::ALL {
            assert_eq!(stats.created(kind), stats.released(kind), "{kind:?}");
        }
        assert_eq!(stats.created(ResourceKind::Texture), 3);
        assert_eq!(stats.created(ResourceKind::Buffer), 2);
        assert_eq!(stats.invalid_releases, 0);
    }
}
