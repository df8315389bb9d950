use bytemuck::{Pod, Zeroable};

use crate::gpu::{
    BufferTarget, GpuContext, ResourceHandle, ResourceKind, VertexAttribute, VertexFormat,
};

/// Interleaved mesh vertex.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub texcoords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex {
    pub const STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;

    /// Shader locations: 0 position, 1 texcoords, 2 normal.
    pub const ATTRIBUTES: [VertexAttribute; 3] = [
        VertexAttribute {
            location: 0,
            format: VertexFormat::Float32x3,
            offset: 0,
        },
        VertexAttribute {
            location: 1,
            format: VertexFormat::Float32x2,
            offset: 12,
        },
        VertexAttribute {
            location: 2,
            format: VertexFormat::Float32x3,
            offset: 20,
        },
    ];

    pub fn new(position: [f32; 3], texcoords: [f32; 2], normal: [f32; 3]) -> Self {
        Self {
            position,
            texcoords,
            normal,
        }
    }
}

/// Vertex data plus the GPU buffer it is uploaded to.
#[derive(Debug)]
pub struct VertexBuffer {
    handle: ResourceHandle,
    pub vertices: Vec<Vertex>,
}

impl VertexBuffer {
    pub fn new(ctx: &GpuContext) -> Self {
        Self::with_vertices(ctx, Vec::new())
    }

    pub fn with_vertices(ctx: &GpuContext, vertices: Vec<Vertex>) -> Self {
        Self {
            handle: ResourceHandle::create(ctx, ResourceKind::Buffer),
            vertices,
        }
    }

    pub fn bind(&self) {
        self.handle
            .context()
            .bind_buffer(BufferTarget::Array, Some(self.handle.raw()));
    }

    pub fn unbind(&self) {
        self.handle.context().bind_buffer(BufferTarget::Array, None);
    }

    /// Uploads `vertices` into the bound array buffer.
    pub fn upload(&self) {
        self.handle
            .context()
            .buffer_data(BufferTarget::Array, bytemuck::cast_slice(&self.vertices));
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }
}

/// Triangle indices plus the GPU buffer they are uploaded to.
#[derive(Debug)]
pub struct ElementBuffer {
    handle: ResourceHandle,
    pub indices: Vec<u32>,
}

impl ElementBuffer {
    pub fn new(ctx: &GpuContext) -> Self {
        Self {
            handle: ResourceHandle::create(ctx, ResourceKind::Buffer),
            indices: Vec::new(),
        }
    }

    pub fn bind(&self) {
        self.handle
            .context()
            .bind_buffer(BufferTarget::ElementArray, Some(self.handle.raw()));
    }

    pub fn unbind(&self) {
        self.handle
            .context()
            .bind_buffer(BufferTarget::ElementArray, None);
    }

    /// Uploads `indices` into the bound element buffer.
    pub fn upload(&self) {
        self.handle
            .context()
            .buffer_data(BufferTarget::ElementArray, bytemuck::cast_slice(&self.indices));
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }
}

/// Vertex array object; owns the element buffer it draws with.
#[derive(Debug)]
pub struct VertexArray {
    handle: ResourceHandle,
    element_buffer: ElementBuffer,
}

impl VertexArray {
    pub fn new(ctx: &GpuContext) -> Self {
        Self {
            handle: ResourceHandle::create(ctx, ResourceKind::VertexArray),
            element_buffer: ElementBuffer::new(ctx),
        }
    }

    pub fn element_buffer(&self) -> &ElementBuffer {
        &self.element_buffer
    }

    pub fn element_buffer_mut(&mut self) -> &mut ElementBuffer {
        &mut self.element_buffer
    }

    /// Binds the array, then its element buffer so the array records it.
    pub fn bind(&self) {
        self.handle
            .context()
            .bind_vertex_array(Some(self.handle.raw()));
        self.element_buffer.bind();
    }

    pub fn unbind(&self) {
        self.handle.context().bind_vertex_array(None);
        self.element_buffer.unbind();
    }

    /// Records the [`Vertex`] layout of the bound array buffer. The array must be bound.
    pub fn describe_vertices(&self) {
        self.handle
            .context()
            .vertex_layout(Vertex::STRIDE, &Vertex::ATTRIBUTES);
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessDevice;

    #[test]
    fn vertex_layout_matches_struct() {
        assert_eq!(Vertex::STRIDE, 32);
        assert_eq!(
            Vertex::ATTRIBUTES[2].offset,
            std::mem::offset_of!(Vertex, normal) as u64
        );
    }

    #[test]
    fn binding_is_explicit() {
        let (device, ctx) = HeadlessDevice::with_context();
        let vbo = VertexBuffer::with_vertices(&ctx, vec![Vertex::default(); 3]);
        vbo.upload();
        assert_eq!(device.buffer_contents(vbo.handle().raw()), Some(Vec::new()));

        vbo.bind();
        vbo.upload();
        assert_eq!(device.buffer_contents(vbo.handle().raw()).map(|b| b.len()), Some(96));
    }

    #[test]
    fn vertex_array_remembers_its_element_buffer() {
        let (device, ctx) = HeadlessDevice::with_context();
        let mut vao = VertexArray::new(&ctx);
        vao.element_buffer_mut().indices = vec![0, 1, 2];

        vao.bind();
        vao.element_buffer().upload();
        vao.unbind();

        // Rebinding only the array restores the element binding.
        ctx.bind_vertex_array(Some(vao.handle().raw()));
        ctx.buffer_data(BufferTarget::ElementArray, &[9; 4]);
        let ebo = vao.element_buffer().handle().raw();
        assert_eq!(device.buffer_contents(ebo), Some(vec![9; 4]));
    }

    #[test]
    fn dropping_a_vertex_array_releases_both_objects() {
        let (device, ctx) = HeadlessDevice::with_context();
        drop(VertexArray::new(&ctx));

        let stats = device.stats();
        assert_eq!(stats.created(ResourceKind::VertexArray), 1);
        assert_eq!(stats.released(ResourceKind::VertexArray), 1);
        assert_eq!(stats.created(ResourceKind::Buffer), 1);
        assert_eq!(stats.released(ResourceKind::Buffer), 1);
        assert_eq!(stats.invalid_releases, 0);
    }
}
