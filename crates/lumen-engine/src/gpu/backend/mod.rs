//! `wgpu` implementation of [`GraphicsDevice`](super::GraphicsDevice).

mod device;
mod init;
mod pipeline;
mod pixels;
mod surface;

pub use device::WgpuDevice;
pub use init::GpuInit;
pub use surface::SurfaceErrorAction;
