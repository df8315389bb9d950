//! Lumen engine crate.
//!
//! GPU resource wrappers, multi-target framebuffers, input action dispatch and
//! the per-frame loop that ties them to a window.

pub mod gpu;
pub mod image;
pub mod input;
pub mod logging;
pub mod render;
pub mod time;
pub mod window;
