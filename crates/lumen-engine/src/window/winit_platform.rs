use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Icon, Window, WindowId};

use crate::image::Image;
use crate::input::InputEvent;
use crate::input::platform::translate_window_event;

use super::config::WindowConfig;
use super::platform::{Platform, PlatformEvent};

/// Desktop platform on a winit event loop.
///
/// The loop is pumped with a zero timeout on every poll, so polling never waits
/// for events. Pumping is only available on desktop targets.
pub struct WinitPlatform {
    event_loop: EventLoop<()>,
    handler: Handler,
    window: Arc<Window>,
}

struct Handler {
    title: String,
    size: LogicalSize<f64>,
    window: Option<Arc<Window>>,
    creation_error: Option<anyhow::Error>,
    events: Vec<PlatformEvent>,
    cursor: (f64, f64),
    close_requested: bool,
}

impl WinitPlatform {
    /// Opens a fixed-size window.
    ///
    /// Fails when the event loop or the window cannot be created.
    pub fn new(config: &WindowConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("failed to create winit EventLoop")?;

        let mut handler = Handler {
            title: config.title.clone(),
            size: LogicalSize::new(f64::from(config.width), f64::from(config.height)),
            window: None,
            creation_error: None,
            events: Vec::new(),
            cursor: config.center(),
            close_requested: false,
        };

        // Desktop backends deliver the first resume on the first pump.
        if let PumpStatus::Exit(code) = event_loop.pump_app_events(Some(Duration::ZERO), &mut handler) {
            log::debug!("event loop exited during startup with code {code}");
            handler.close_requested = true;
        }

        if let Some(err) = handler.creation_error.take() {
            return Err(err);
        }
        let window = handler
            .window
            .clone()
            .context("window was not created on startup")?;

        log::info!("window \"{}\" opened", config.title);

        Ok(Self {
            event_loop,
            handler,
            window,
        })
    }

    /// The native window, shared with the graphics surface.
    pub fn window(&self) -> Arc<Window> {
        self.window.clone()
    }
}

impl Platform for WinitPlatform {
    fn poll_events(&mut self) -> Vec<PlatformEvent> {
        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.handler)
        {
            log::debug!("event loop exited with code {code}");
            self.handler.close_requested = true;
        }

        std::mem::take(&mut self.handler.events)
    }

    fn should_close(&self) -> bool {
        self.handler.close_requested
    }

    fn cursor_position(&self) -> (f64, f64) {
        self.handler.cursor
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn set_icon(&mut self, icon: &Image) {
        match Icon::from_rgba(icon.to_rgba8(), icon.width, icon.height) {
            Ok(icon) => self.window.set_window_icon(Some(icon)),
            Err(err) => log::warn!("failed to set window icon: {err}"),
        }
    }

    fn request_close(&mut self) {
        self.handler.close_requested = true;
    }

    fn pre_present(&self) {
        self.window.pre_present_notify();
    }
}

impl ApplicationHandler for Handler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(self.size)
            .with_resizable(false);

        match event_loop.create_window(attrs) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(err) => {
                self.creation_error = Some(anyhow::Error::new(err).context("failed to create window"));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.as_ref() else { return };

        match &event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
                self.events.push(PlatformEvent::CloseRequested);
            }
            WindowEvent::Resized(size) => self.events.push(PlatformEvent::Resized {
                width: size.width,
                height: size.height,
            }),
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = window.inner_size();
                self.events.push(PlatformEvent::Resized {
                    width: size.width,
                    height: size.height,
                });
            }
            _ => {}
        }

        if let Some(input) = translate_window_event(window, &event) {
            if let InputEvent::PointerMoved { x, y } = input {
                self.cursor = (x, y);
            }
            self.events.push(PlatformEvent::Input(input));
        }
    }
}
