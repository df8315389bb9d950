//! Window, platform backends and the per-frame render loop.

mod config;
mod overlay;
mod platform;
mod scripted;
mod session;
mod winit_platform;

pub use config::WindowConfig;
pub use overlay::{
    Overlay, OverlayAction, OverlayElementId, OverlayElementType, OverlayLine, OverlayPanel,
};
pub use platform::{Platform, PlatformEvent};
pub use scripted::ScriptedPlatform;
pub use session::Session;
pub use winit_platform::WinitPlatform;
