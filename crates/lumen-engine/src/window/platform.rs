use crate::image::Image;
use crate::input::InputEvent;

/// Event surfaced by a platform backend during one poll.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PlatformEvent {
    Input(InputEvent),
    CloseRequested,
    Resized { width: u32, height: u32 },
}

/// Windowing backend driven by a [`Session`](super::Session).
///
/// Polling never blocks: it returns whatever is queued, possibly nothing.
pub trait Platform {
    fn poll_events(&mut self) -> Vec<PlatformEvent>;

    /// True once the window was asked to close, by the user or by `request_close`.
    fn should_close(&self) -> bool;

    /// Cursor position in logical pixels from the top-left corner.
    fn cursor_position(&self) -> (f64, f64);

    /// Size of the drawable area in physical pixels.
    fn framebuffer_size(&self) -> (u32, u32);

    fn set_icon(&mut self, icon: &Image);

    fn request_close(&mut self);

    /// Called right before the device presents a frame.
    fn pre_present(&self) {}
}
