//! Input subsystem.
//!
//! The dispatcher and event types are platform-agnostic; `platform` translates
//! winit window events into `InputEvent`s.

mod dispatcher;
pub mod platform;
mod types;

pub use dispatcher::{AxisCallback, InputDispatcher, PressCallback, ReleaseCallback};
pub use types::{ButtonState, Frequency, InputEvent, Key, MouseButton, Trigger};
