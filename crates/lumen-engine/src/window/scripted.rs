use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::image::Image;
use crate::input::InputEvent;

use super::platform::{Platform, PlatformEvent};

#[derive(Debug)]
struct Script {
    size: (u32, u32),
    pending: VecDeque<Vec<PlatformEvent>>,
    close_requested: bool,
    cursor: (f64, f64),
    icon: Option<(u32, u32)>,
    polls: usize,
    presents: usize,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            size: (800, 600),
            pending: VecDeque::new(),
            close_requested: false,
            cursor: (0.0, 0.0),
            icon: None,
            polls: 0,
            presents: 0,
        }
    }
}

/// Platform fed from a queue of event batches instead of a real window.
///
/// Each poll yields the next queued batch. Clones share the same script, so a
/// test can keep one while a session owns another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPlatform {
    script: Rc<RefCell<Script>>,
}

impl ScriptedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        let platform = Self::default();
        platform.script.borrow_mut().size = (width, height);
        platform
    }

    /// Queues the events returned by one future poll.
    pub fn push_batch(&self, events: impl IntoIterator<Item = PlatformEvent>) {
        self.script
            .borrow_mut()
            .pending
            .push_back(events.into_iter().collect());
    }

    /// Queues a batch made only of input events.
    pub fn push_input(&self, events: impl IntoIterator<Item = InputEvent>) {
        self.push_batch(events.into_iter().map(PlatformEvent::Input));
    }

    pub fn set_cursor(&self, x: f64, y: f64) {
        self.script.borrow_mut().cursor = (x, y);
    }

    pub fn polls(&self) -> usize {
        self.script.borrow().polls
    }

    pub fn presents(&self) -> usize {
        self.script.borrow().presents
    }

    /// Size of the last icon set.
    pub fn icon(&self) -> Option<(u32, u32)> {
        self.script.borrow().icon
    }
}

impl Platform for ScriptedPlatform {
    fn poll_events(&mut self) -> Vec<PlatformEvent> {
        let mut script = self.script.borrow_mut();
        script.polls += 1;

        let batch = script.pending.pop_front().unwrap_or_default();
        for event in &batch {
            match *event {
                PlatformEvent::CloseRequested => script.close_requested = true,
                PlatformEvent::Input(InputEvent::PointerMoved { x, y }) => script.cursor = (x, y),
                PlatformEvent::Resized { width, height } => script.size = (width, height),
                _ => {}
            }
        }
        batch
    }

    fn should_close(&self) -> bool {
        self.script.borrow().close_requested
    }

    fn cursor_position(&self) -> (f64, f64) {
        self.script.borrow().cursor
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.script.borrow().size
    }

    fn set_icon(&mut self, icon: &Image) {
        self.script.borrow_mut().icon = Some((icon.width, icon.height));
    }

    fn request_close(&mut self) {
        self.script.borrow_mut().close_requested = true;
    }

    fn pre_present(&self) {
        self.script.borrow_mut().presents += 1;
    }
}
