//! GPU resource wrappers built on [`ResourceHandle`](crate::gpu::ResourceHandle).

mod buffers;
mod framebuffer;
mod shader;
mod texture;

pub use buffers::{ElementBuffer, Vertex, VertexArray, VertexBuffer};
pub use framebuffer::{Framebuffer, COMPOSITE_COLOR_SHADER, FULLSCREEN_VERTEX_SHADER};
pub use shader::ShaderProgram;
pub use texture::{Texture, TexturePreset, TexturePresets};
