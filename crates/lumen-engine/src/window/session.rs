use anyhow::{Context, Result};

use crate::gpu::{Capability, ClearMask, GpuContext, GpuInit, WgpuDevice};
use crate::image::Image;
use crate::input::{Frequency, InputDispatcher, Key, MouseButton, ReleaseCallback};
use crate::render::TexturePresets;
use crate::time::FrameClock;

use super::config::WindowConfig;
use super::overlay::{Overlay, OverlayElementId, OverlayElementType, OverlayPanel};
use super::platform::{Platform, PlatformEvent};
use super::winit_platform::WinitPlatform;

/// A window, its graphics context and the input wired to it.
///
/// The caller owns the loop: each [`run`](Session::run) advances exactly one frame.
pub struct Session {
    platform: Box<dyn Platform>,
    ctx: GpuContext,
    input: InputDispatcher,
    panel: Option<OverlayPanel>,
    overlay: Option<Box<dyn Overlay>>,
    textures: TexturePresets,
    clock: FrameClock,
    config: WindowConfig,
    clear_color: [f32; 4],
    vsync: bool,
}

impl Session {
    /// Opens a window and a `wgpu` device rendering into it.
    pub fn new(config: WindowConfig) -> Result<Self> {
        let platform = WinitPlatform::new(&config)?;

        let init = GpuInit {
            sample_count: config.aa_samples,
            vsync: config.vsync,
            ..GpuInit::default()
        };
        let device = pollster::block_on(WgpuDevice::new(platform.window(), init))
            .context("failed to initialize the graphics device")?;

        Ok(Self::from_parts(Box::new(platform), GpuContext::new(device), config))
    }

    /// Assembles a session from an existing platform and device.
    ///
    /// Enables depth testing and back-face culling and sizes the viewport to the
    /// platform's drawable area.
    pub fn from_parts(platform: Box<dyn Platform>, ctx: GpuContext, config: WindowConfig) -> Self {
        let (width, height) = platform.framebuffer_size();

        ctx.set_capability(Capability::FaceCulling, true);
        ctx.set_capability(Capability::DepthTest, true);
        ctx.set_viewport(width, height);
        ctx.set_clear_color(config.clear_color);

        let textures = TexturePresets::new(&ctx);

        Self {
            platform,
            input: InputDispatcher::new(),
            panel: None,
            overlay: None,
            textures,
            clock: FrameClock::new(),
            clear_color: config.clear_color,
            vsync: config.vsync,
            config,
            ctx,
        }
    }

    /// Runs one frame with the given delta time.
    ///
    /// Returns `false` without doing anything once the window was asked to close.
    pub fn run(&mut self, dt: f32) -> bool {
        if self.platform.should_close() {
            return false;
        }

        for event in self.platform.poll_events() {
            match event {
                PlatformEvent::Input(input) => self.input.handle_event(&input),
                PlatformEvent::Resized { width, height } => {
                    self.ctx.resize(width, height);
                    self.ctx.set_viewport(width, height);
                }
                // Observed at the top of the next run.
                PlatformEvent::CloseRequested => {}
            }
        }

        self.input.tick(dt);

        if let Some(panel) = self.panel.as_mut() {
            panel.render(&self.ctx, dt);
        }
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.render(&self.ctx, dt);
        }

        self.platform.pre_present();
        self.ctx.present();

        self.ctx.set_clear_color(self.clear_color);
        self.ctx.clear(ClearMask::ALL);

        true
    }

    /// Runs one frame timed by the session's clock.
    pub fn run_clocked(&mut self) -> bool {
        let time = self.clock.tick();
        self.run(time.dt)
    }

    pub fn add_key_callback(
        &mut self,
        key: Key,
        on_press: impl FnMut(f32) + 'static,
        frequency: Frequency,
        on_release: Option<ReleaseCallback>,
    ) {
        self.input.add_key_binding(key, on_press, frequency, on_release);
    }

    pub fn add_mouse_button_callback(
        &mut self,
        button: MouseButton,
        on_press: impl FnMut(f32) + 'static,
        frequency: Frequency,
        on_release: Option<ReleaseCallback>,
    ) {
        self.input.add_button_binding(button, on_press, frequency, on_release);
    }

    /// Receives raw wheel offsets.
    pub fn add_mouse_scroll_callback(&mut self, callback: impl FnMut(f64, f64) + 'static) {
        self.input.set_scroll_callback(callback);
    }

    /// Receives pointer deltas; the first one is measured from the window center.
    pub fn add_mouse_move_callback(&mut self, callback: impl FnMut(f64, f64) + 'static) {
        self.input.set_move_callback(self.config.center(), callback);
    }

    /// Sets a custom overlay, drawn after the element panel.
    pub fn set_overlay(&mut self, overlay: impl Overlay + 'static) {
        self.overlay = Some(Box::new(overlay));
    }

    /// Returns the element panel, creating an empty one if needed.
    pub fn enable_overlay(&mut self) -> &mut OverlayPanel {
        self.panel.get_or_insert_with(OverlayPanel::new)
    }

    /// Drops the element panel and any custom overlay.
    pub fn disable_overlay(&mut self) {
        self.panel = None;
        self.overlay = None;
    }

    pub fn overlay_panel(&self) -> Option<&OverlayPanel> {
        self.panel.as_ref()
    }

    pub fn overlay_panel_mut(&mut self) -> Option<&mut OverlayPanel> {
        self.panel.as_mut()
    }

    pub fn add_overlay_element(
        &mut self,
        kind: OverlayElementType,
        text: impl Into<String>,
        action_on: impl FnMut() + 'static,
        action_off: impl FnMut() + 'static,
    ) -> OverlayElementId {
        self.enable_overlay().add_element(kind, text, action_on, action_off)
    }

    pub fn add_overlay_text(&mut self, text: impl Into<String>) -> OverlayElementId {
        self.enable_overlay().add_text(text)
    }

    pub fn add_overlay_button(&mut self, label: impl Into<String>, action: impl FnMut() + 'static) -> OverlayElementId {
        self.enable_overlay().add_button(label, action)
    }

    pub fn add_overlay_checkbox(
        &mut self,
        label: impl Into<String>,
        checked: bool,
        on: impl FnMut() + 'static,
        off: impl FnMut() + 'static,
    ) -> OverlayElementId {
        self.enable_overlay().add_checkbox(label, checked, on, off)
    }

    pub fn add_overlay_separator(&mut self) -> OverlayElementId {
        self.enable_overlay().add_separator()
    }

    /// Shows the last frame's duration in milliseconds; `{}` marks the value.
    pub fn add_overlay_frame_time(&mut self, format: impl Into<String>) -> OverlayElementId {
        self.enable_overlay().add_frame_time(format)
    }

    /// Shows the averaged frame rate; `{}` marks the value.
    pub fn add_overlay_fps_counter(&mut self, format: impl Into<String>) -> OverlayElementId {
        self.enable_overlay().add_fps_counter(format)
    }

    pub fn enable_face_culling(&mut self, enabled: bool) {
        self.ctx.set_capability(Capability::FaceCulling, enabled);
    }

    pub fn enable_vertical_sync(&mut self, enabled: bool) {
        if self.ctx.set_vertical_sync(enabled) {
            self.vsync = enabled;
        } else {
            log::warn!("vertical synchronisation unsupported");
        }
    }

    /// Last vertical-sync state the device accepted.
    pub fn vertical_sync(&self) -> bool {
        self.vsync
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    pub fn recover_mouse_position(&self) -> (f64, f64) {
        self.platform.cursor_position()
    }

    pub fn set_icon(&mut self, icon: &Image) {
        self.platform.set_icon(icon);
    }

    /// Drops the overlay and asks the window to close; the next `run` returns `false`.
    pub fn close(&mut self) {
        self.disable_overlay();
        self.platform.request_close();
    }

    pub fn textures(&self) -> &TexturePresets {
        &self.textures
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.ctx
    }

    pub fn input(&self) -> &InputDispatcher {
        &self.input
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::gpu::{HeadlessDevice, ResourceKind};
    use crate::image::{Colorspace, PixelData};
    use crate::input::{ButtonState, InputEvent};
    use crate::window::{OverlayLine, ScriptedPlatform};

    fn session() -> (Session, ScriptedPlatform, Rc<HeadlessDevice>) {
        let platform = ScriptedPlatform::new();
        let (device, ctx) = HeadlessDevice::with_context();
        let session = Session::from_parts(Box::new(platform.clone()), ctx, WindowConfig::default());
        (session, platform, device)
    }

    fn key(key: Key, state: ButtonState) -> InputEvent {
        InputEvent::Key {
            key,
            state,
            repeat: false,
        }
    }

    // ── setup ─────────────────────────────────────────────────────────────

    #[test]
    fn setup_enables_depth_and_culling_and_sizes_viewport() {
        let platform = ScriptedPlatform::with_size(1024, 768);
        let (device, ctx) = HeadlessDevice::with_context();
        let _session = Session::from_parts(Box::new(platform), ctx, WindowConfig::default());

        assert!(device.capability(Capability::DepthTest));
        assert!(device.capability(Capability::FaceCulling));
        assert_eq!(device.viewport(), (1024, 768));
    }

    #[test]
    fn presets_are_created_once_per_session() {
        let (session, _, device) = session();
        assert_eq!(device.stats().created(ResourceKind::Texture), 2);

        drop(session);
        assert_eq!(device.stats().live(ResourceKind::Texture), 0);
    }

    // ── run ───────────────────────────────────────────────────────────────

    #[test]
    fn run_presents_then_clears_everything() {
        let (mut session, platform, device) = session();
        session.set_clear_color([1.0, 0.0, 0.0, 1.0]);

        assert!(session.run(0.016));

        assert_eq!(platform.polls(), 1);
        assert_eq!(platform.presents(), 1);
        assert_eq!(device.stats().presents, 1);

        let clears = device.clears();
        let last = clears.last().copied();
        assert_eq!(last.map(|c| c.mask), Some(ClearMask::ALL));
        assert_eq!(last.map(|c| c.color), Some([1.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn close_request_stops_the_next_tick() {
        let (mut session, platform, device) = session();
        platform.push_batch([PlatformEvent::CloseRequested]);

        assert!(session.run(0.016));
        assert!(!session.run(0.016));
        assert_eq!(platform.polls(), 1);
        assert_eq!(device.stats().presents, 1);
    }

    #[test]
    fn close_drops_overlay_and_ends_loop() {
        let (mut session, platform, _) = session();
        let frames = Rc::new(Cell::new(0));
        let f = frames.clone();
        session.set_overlay(move |_: &GpuContext, _: f32| f.set(f.get() + 1));

        assert!(session.run(0.016));
        session.close();
        assert!(!session.run(0.016));

        assert_eq!(frames.get(), 1);
        assert_eq!(platform.presents(), 1);
    }

    #[test]
    fn overlay_panel_shows_frame_timing_from_run() {
        let (mut session, _, _) = session();
        session.add_overlay_text("Debug");
        session.add_overlay_separator();
        session.add_overlay_frame_time("{} ms");
        session.add_overlay_fps_counter("FPS: {}");

        session.run(0.02);

        let lines = session.overlay_panel().map(|p| p.lines().to_vec()).unwrap_or_default();
        assert_eq!(
            lines,
            vec![
                OverlayLine::Text("Debug".to_string()),
                OverlayLine::Separator,
                OverlayLine::Text("20.000 ms".to_string()),
                OverlayLine::Text("FPS: 50.0".to_string()),
            ]
        );
    }

    #[test]
    fn clocked_run_feeds_the_panel() {
        let (mut session, _, _) = session();
        session.add_overlay_frame_time("");

        assert!(session.run_clocked());

        let frame_time = session.overlay_panel().map_or(0.0, |p| p.frame_time_ms());
        assert!(frame_time > 0.0 && frame_time <= 250.5);
    }

    #[test]
    fn overlay_buttons_and_checkboxes_run_their_actions() {
        let (mut session, _, _) = session();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = log.clone();
        let button = session.add_overlay_button("Reset", move || l.borrow_mut().push("reset"));
        let (on, off) = (log.clone(), log.clone());
        let checkbox = session.add_overlay_checkbox(
            "Culling",
            false,
            move || on.borrow_mut().push("culling on"),
            move || off.borrow_mut().push("culling off"),
        );

        let panel = session.overlay_panel_mut();
        assert!(panel.is_some());
        if let Some(panel) = panel {
            panel.activate(button);
            panel.activate(checkbox);
            panel.activate(checkbox);
        }
        assert_eq!(*log.borrow(), vec!["reset", "culling on", "culling off"]);
    }

    #[test]
    fn overlay_elements_by_kind_share_one_panel() {
        let (mut session, _, _) = session();
        session.add_overlay_element(OverlayElementType::Text, "a", || {}, || {});
        session.add_overlay_element(OverlayElementType::Separator, "", || {}, || {});
        assert_eq!(session.overlay_panel().map(OverlayPanel::len), Some(2));

        session.disable_overlay();
        assert!(session.overlay_panel().is_none());
    }

    #[test]
    fn overlay_renders_after_input_each_tick() {
        let (mut session, platform, _) = session();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = log.clone();
        session.add_key_callback(Key::A, move |_| l.borrow_mut().push("action"), Frequency::Repeat, None);
        let l = log.clone();
        session.set_overlay(move |_: &GpuContext, _: f32| l.borrow_mut().push("overlay"));

        platform.push_input([key(Key::A, ButtonState::Pressed)]);
        session.run(0.016);

        assert_eq!(*log.borrow(), vec!["action", "overlay"]);
    }

    // ── input wiring ──────────────────────────────────────────────────────

    #[test]
    fn once_and_repeat_bindings_through_the_loop() {
        let (mut session, platform, _) = session();
        let once = Rc::new(Cell::new(0));
        let repeat = Rc::new(Cell::new(0));

        let o = once.clone();
        session.add_key_callback(Key::A, move |_| o.set(o.get() + 1), Frequency::Once, None);
        let r = repeat.clone();
        session.add_mouse_button_callback(
            MouseButton::Left,
            move |_| r.set(r.get() + 1),
            Frequency::Repeat,
            None,
        );

        platform.push_batch([
            PlatformEvent::Input(key(Key::A, ButtonState::Pressed)),
            PlatformEvent::Input(InputEvent::MouseButton {
                button: MouseButton::Left,
                state: ButtonState::Pressed,
            }),
        ]);
        for _ in 0..3 {
            session.run(0.016);
        }

        assert_eq!((once.get(), repeat.get()), (1, 3));
    }

    #[test]
    fn release_callback_fires_from_platform_event() {
        let (mut session, platform, _) = session();
        let released = Rc::new(Cell::new(false));
        let r = released.clone();
        session.add_key_callback(
            Key::Escape,
            |_| {},
            Frequency::Once,
            Some(Box::new(move || r.set(true))),
        );

        platform.push_input([key(Key::Escape, ButtonState::Pressed)]);
        platform.push_input([key(Key::Escape, ButtonState::Released)]);
        session.run(0.016);
        session.run(0.016);

        assert!(released.get());
        assert!(!session.input().is_active(Key::Escape));
    }

    #[test]
    fn move_deltas_start_at_window_center() {
        let (mut session, platform, _) = session();
        let deltas = Rc::new(RefCell::new(Vec::new()));
        let d = deltas.clone();
        session.add_mouse_move_callback(move |dx, dy| d.borrow_mut().push((dx, dy)));

        platform.push_input([
            InputEvent::PointerMoved { x: 420.0, y: 305.0 },
            InputEvent::PointerMoved { x: 430.0, y: 300.0 },
        ]);
        session.run(0.016);

        assert_eq!(*deltas.borrow(), vec![(20.0, 5.0), (10.0, -5.0)]);
        assert_eq!(session.recover_mouse_position(), (430.0, 300.0));
    }

    #[test]
    fn resize_updates_viewport() {
        let (mut session, platform, device) = session();
        platform.push_batch([PlatformEvent::Resized { width: 640, height: 480 }]);
        session.run(0.016);
        assert_eq!(device.viewport(), (640, 480));
    }

    // ── settings ──────────────────────────────────────────────────────────

    #[test]
    fn face_culling_can_be_disabled() {
        let (mut session, _, device) = session();
        session.enable_face_culling(false);
        assert!(!device.capability(Capability::FaceCulling));
    }

    #[test]
    fn unsupported_vsync_keeps_previous_state() {
        let device = Rc::new(HeadlessDevice::without_vsync_control());
        let ctx = GpuContext::from_rc(device.clone());
        let mut session = Session::from_parts(Box::new(ScriptedPlatform::new()), ctx, WindowConfig::default());

        session.enable_vertical_sync(false);
        assert!(session.vertical_sync());
    }

    #[test]
    fn vsync_toggle_reaches_device() {
        let (mut session, _, device) = session();
        session.enable_vertical_sync(false);
        assert!(!session.vertical_sync());
        assert!(!device.vertical_sync());
    }

    #[test]
    fn icon_is_forwarded_to_platform() {
        let (mut session, platform, _) = session();
        let icon = Image::new(2, 2, Colorspace::Rgba, PixelData::Bytes(vec![255; 16]));
        session.set_icon(&icon);
        assert_eq!(platform.icon(), Some((2, 2)));
    }
}
