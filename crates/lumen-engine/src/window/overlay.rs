//! Overlays drawn on top of the scene, and the element panel a session builds
//! through its `add_overlay_*` calls.

use std::collections::VecDeque;

use crate::gpu::GpuContext;

/// Something drawn on top of the scene once per tick, after input is processed.
pub trait Overlay {
    fn render(&mut self, ctx: &GpuContext, dt: f32);
}

impl<F> Overlay for F
where
    F: FnMut(&GpuContext, f32),
{
    fn render(&mut self, ctx: &GpuContext, dt: f32) {
        self(ctx, dt)
    }
}

/// Kind of an overlay panel element.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OverlayElementType {
    Text,
    Button,
    Checkbox,
    Separator,
    FrameTime,
    FpsCounter,
}

/// Position of an element in its panel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct OverlayElementId(usize);

/// Callback run when a button is pressed or a checkbox changes.
pub type OverlayAction = Box<dyn FnMut()>;

enum Element {
    Text(String),
    Button {
        label: String,
        action: OverlayAction,
    },
    Checkbox {
        label: String,
        checked: bool,
        on: OverlayAction,
        off: OverlayAction,
    },
    Separator,
    FrameTime(String),
    FpsCounter(String),
}

impl Element {
    fn kind(&self) -> OverlayElementType {
        match self {
            Element::Text(_) => OverlayElementType::Text,
            Element::Button { .. } => OverlayElementType::Button,
            Element::Checkbox { .. } => OverlayElementType::Checkbox,
            Element::Separator => OverlayElementType::Separator,
            Element::FrameTime(_) => OverlayElementType::FrameTime,
            Element::FpsCounter(_) => OverlayElementType::FpsCounter,
        }
    }
}

/// What one element shows after the last render.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayLine {
    Text(String),
    Button(String),
    Checkbox { label: String, checked: bool },
    Separator,
}

/// Frames averaged by the FPS counter.
const FPS_WINDOW: usize = 120;

const DEFAULT_FRAME_TIME_FORMAT: &str = "{} ms";
const DEFAULT_FPS_FORMAT: &str = "{} FPS";

/// Ordered list of overlay elements with their callbacks.
///
/// Rendering resolves every element to an [`OverlayLine`]; frame time and FPS
/// text come from the delta times the panel is rendered with. Drawing the lines
/// is left to whatever UI layer sits on top.
///
/// Format strings take the value at the first `{}`; without one the value is
/// appended after a space. Frame time shows milliseconds with three decimals,
/// FPS one decimal.
#[derive(Default)]
pub struct OverlayPanel {
    elements: Vec<Element>,
    frame_times: VecDeque<f32>,
    lines: Vec<OverlayLine>,
}

impl OverlayPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element by kind. Actions only matter for buttons (`action_on`)
    /// and checkboxes, which start unchecked.
    pub fn add_element(
        &mut self,
        kind: OverlayElementType,
        text: impl Into<String>,
        action_on: impl FnMut() + 'static,
        action_off: impl FnMut() + 'static,
    ) -> OverlayElementId {
        match kind {
            OverlayElementType::Text => self.add_text(text),
            OverlayElementType::Button => self.add_button(text, action_on),
            OverlayElementType::Checkbox => self.add_checkbox(text, false, action_on, action_off),
            OverlayElementType::Separator => self.add_separator(),
            OverlayElementType::FrameTime => self.add_frame_time(text),
            OverlayElementType::FpsCounter => self.add_fps_counter(text),
        }
    }

    pub fn add_text(&mut self, text: impl Into<String>) -> OverlayElementId {
        self.push(Element::Text(text.into()))
    }

    pub fn add_button(&mut self, label: impl Into<String>, action: impl FnMut() + 'static) -> OverlayElementId {
        self.push(Element::Button {
            label: label.into(),
            action: Box::new(action),
        })
    }

    /// `on` runs when the box becomes checked, `off` when it is cleared.
    pub fn add_checkbox(
        &mut self,
        label: impl Into<String>,
        checked: bool,
        on: impl FnMut() + 'static,
        off: impl FnMut() + 'static,
    ) -> OverlayElementId {
        self.push(Element::Checkbox {
            label: label.into(),
            checked,
            on: Box::new(on),
            off: Box::new(off),
        })
    }

    pub fn add_separator(&mut self) -> OverlayElementId {
        self.push(Element::Separator)
    }

    pub fn add_frame_time(&mut self, format: impl Into<String>) -> OverlayElementId {
        self.push(Element::FrameTime(non_empty_or(format.into(), DEFAULT_FRAME_TIME_FORMAT)))
    }

    pub fn add_fps_counter(&mut self, format: impl Into<String>) -> OverlayElementId {
        self.push(Element::FpsCounter(non_empty_or(format.into(), DEFAULT_FPS_FORMAT)))
    }

    /// Presses a button or toggles a checkbox, running its action.
    ///
    /// Returns `false` for elements that cannot be interacted with.
    pub fn activate(&mut self, id: OverlayElementId) -> bool {
        match self.elements.get_mut(id.0) {
            Some(Element::Button { action, .. }) => {
                action();
                true
            }
            Some(Element::Checkbox { checked, on, off, .. }) => {
                *checked = !*checked;
                if *checked { on() } else { off() }
                true
            }
            _ => false,
        }
    }

    pub fn is_checked(&self, id: OverlayElementId) -> Option<bool> {
        match self.elements.get(id.0) {
            Some(Element::Checkbox { checked, .. }) => Some(*checked),
            _ => None,
        }
    }

    pub fn kind(&self, id: OverlayElementId) -> Option<OverlayElementType> {
        self.elements.get(id.0).map(Element::kind)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Lines produced by the last render.
    pub fn lines(&self) -> &[OverlayLine] {
        &self.lines
    }

    /// Latest frame time in milliseconds.
    pub fn frame_time_ms(&self) -> f32 {
        self.frame_times.back().map_or(0.0, |dt| dt * 1000.0)
    }

    /// Frames per second averaged over the recent frames.
    pub fn fps(&self) -> f32 {
        let total: f32 = self.frame_times.iter().sum();
        if total > 0.0 {
            self.frame_times.len() as f32 / total
        } else {
            0.0
        }
    }

    fn push(&mut self, element: Element) -> OverlayElementId {
        self.elements.push(element);
        OverlayElementId(self.elements.len() - 1)
    }

    fn record_frame(&mut self, dt: f32) {
        if self.frame_times.len() == FPS_WINDOW {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(dt);
    }

    fn compose(&self) -> Vec<OverlayLine> {
        let frame_time = self.frame_time_ms();
        let fps = self.fps();

        self.elements
            .iter()
            .map(|element| match element {
                Element::Text(text) => OverlayLine::Text(text.clone()),
                Element::Button { label, .. } => OverlayLine::Button(label.clone()),
                Element::Checkbox { label, checked, .. } => OverlayLine::Checkbox {
                    label: label.clone(),
                    checked: *checked,
                },
                Element::Separator => OverlayLine::Separator,
                Element::FrameTime(format) => OverlayLine::Text(format_value(format, frame_time, 3)),
                Element::FpsCounter(format) => OverlayLine::Text(format_value(format, fps, 1)),
            })
            .collect()
    }
}

impl Overlay for OverlayPanel {
    fn render(&mut self, _ctx: &GpuContext, dt: f32) {
        self.record_frame(dt);
        self.lines = self.compose();
    }
}

fn non_empty_or(format: String, default: &str) -> String {
    if format.is_empty() { default.to_string() } else { format }
}

fn format_value(format: &str, value: f32, precision: usize) -> String {
    let value = format!("{value:.precision$}");
    if format.contains("{}") {
        format.replacen("{}", &value, 1)
    } else {
        format!("{format} {value}")
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::gpu::HeadlessDevice;

    fn render(panel: &mut OverlayPanel, dt: f32) {
        let (_, ctx) = HeadlessDevice::with_context();
        panel.render(&ctx, dt);
    }

    // ── elements ──────────────────────────────────────────────────────────

    #[test]
    fn button_runs_its_action_when_activated() {
        let mut panel = OverlayPanel::new();
        let presses = Rc::new(Cell::new(0));
        let p = presses.clone();
        let button = panel.add_button("Reload", move || p.set(p.get() + 1));

        assert!(panel.activate(button));
        assert!(panel.activate(button));
        assert_eq!(presses.get(), 2);
    }

    #[test]
    fn checkbox_alternates_on_and_off_actions() {
        let mut panel = OverlayPanel::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (on, off) = (log.clone(), log.clone());
        let checkbox = panel.add_checkbox(
            "Wireframe",
            true,
            move || on.borrow_mut().push("on"),
            move || off.borrow_mut().push("off"),
        );

        panel.activate(checkbox);
        assert_eq!(panel.is_checked(checkbox), Some(false));
        panel.activate(checkbox);
        assert_eq!(panel.is_checked(checkbox), Some(true));

        assert_eq!(*log.borrow(), vec!["off", "on"]);
    }

    #[test]
    fn passive_elements_cannot_be_activated() {
        let mut panel = OverlayPanel::new();
        let text = panel.add_text("Hello");
        let separator = panel.add_separator();
        let fps = panel.add_fps_counter("");

        assert!(!panel.activate(text));
        assert!(!panel.activate(separator));
        assert!(!panel.activate(fps));
        assert_eq!(panel.is_checked(text), None);
    }

    #[test]
    fn add_element_dispatches_on_kind() {
        let mut panel = OverlayPanel::new();
        let kinds = [
            OverlayElementType::Text,
            OverlayElementType::Button,
            OverlayElementType::Checkbox,
            OverlayElementType::Separator,
            OverlayElementType::FrameTime,
            OverlayElementType::FpsCounter,
        ];
        for kind in kinds {
            let id = panel.add_element(kind, "label", || {}, || {});
            assert_eq!(panel.kind(id), Some(kind));
        }
        assert_eq!(panel.len(), kinds.len());

        let checkbox = OverlayElementId(2);
        assert_eq!(panel.is_checked(checkbox), Some(false));
    }

    // ── timing text ───────────────────────────────────────────────────────

    #[test]
    fn render_resolves_lines_in_order() {
        let mut panel = OverlayPanel::new();
        panel.add_text("Stats");
        panel.add_separator();
        panel.add_frame_time("Frame: {}ms");
        panel.add_checkbox("Vsync", false, || {}, || {});

        render(&mut panel, 0.016);

        assert_eq!(
            panel.lines(),
            &[
                OverlayLine::Text("Stats".to_string()),
                OverlayLine::Separator,
                OverlayLine::Text("Frame: 16.000ms".to_string()),
                OverlayLine::Checkbox {
                    label: "Vsync".to_string(),
                    checked: false,
                },
            ]
        );
    }

    #[test]
    fn fps_is_averaged_over_recent_frames() {
        let mut panel = OverlayPanel::new();
        panel.add_fps_counter("");

        render(&mut panel, 0.01);
        render(&mut panel, 0.03);

        assert_eq!(panel.lines(), &[OverlayLine::Text("50.0 FPS".to_string())]);
    }

    #[test]
    fn fps_window_drops_old_frames() {
        let mut panel = OverlayPanel::new();
        render(&mut panel, 1.0);
        for _ in 0..FPS_WINDOW {
            render(&mut panel, 0.02);
        }
        assert!((panel.fps() - 50.0).abs() < 1e-3);
    }

    #[test]
    fn format_without_placeholder_appends_value() {
        assert_eq!(format_value("Frame time", 2.5, 3), "Frame time 2.500");
        assert_eq!(format_value("{} / {}", 1.0, 1), "1.0 / {}");
    }
}
