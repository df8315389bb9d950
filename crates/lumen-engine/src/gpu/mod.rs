//! Handle-based graphics device layer.
//!
//! Resources are owned through [`ResourceHandle`]s that release their object on
//! drop. Devices implement [`GraphicsDevice`]: [`HeadlessDevice`] records calls
//! for tests, [`WgpuDevice`] renders into a window.

mod bindings;
mod context;
mod debug;
mod device;
mod error;
mod handle;
mod headless;
mod types;
pub mod backend;

pub use context::GpuContext;
pub use debug::{DebugKind, DebugMessage, DebugSeverity, DebugSource};
pub use device::GraphicsDevice;
pub use error::{ShaderError, ShaderStage};
pub use handle::ResourceHandle;
pub use headless::{ClearCall, DeviceStats, DrawCall, HeadlessDevice, TextureRecord};
pub use types::*;
pub use backend::{GpuInit, WgpuDevice};
