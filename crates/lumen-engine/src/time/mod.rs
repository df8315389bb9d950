//! Frame timing for `Session::run_clocked`.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
