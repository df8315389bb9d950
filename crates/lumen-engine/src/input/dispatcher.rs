//! Press/hold/release bookkeeping for key and mouse button actions.
//!
//! Press edges insert an *active action* for their trigger; every [`tick`]
//! runs each active action once and drops the [`Frequency::Once`] ones. Release
//! edges drop the action and run the release callbacks.
//!
//! [`tick`]: InputDispatcher::tick

use std::collections::HashMap;

use super::types::{ButtonState, Frequency, InputEvent, Key, MouseButton, Trigger};

/// Called with the frame delta while its trigger is active.
pub type PressCallback = Box<dyn FnMut(f32)>;
/// Called when the trigger is released.
pub type ReleaseCallback = Box<dyn FnMut()>;
/// Called with `(x, y)`: wheel offsets for scroll, position delta for moves.
pub type AxisCallback = Box<dyn FnMut(f64, f64)>;

struct Binding<T> {
    trigger: T,
    on_press: PressCallback,
    frequency: Frequency,
    on_release: Option<ReleaseCallback>,
}

/// Registered bindings of one input class, in registration order.
struct BindingTable<T> {
    bindings: Vec<Binding<T>>,
}

impl<T: Copy + PartialEq> BindingTable<T> {
    fn new() -> Self {
        Self { bindings: Vec::new() }
    }

    fn push(&mut self, binding: Binding<T>) {
        self.bindings.push(binding);
    }

    fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn first_matching(&self, trigger: T) -> Option<(usize, &Binding<T>)> {
        self.bindings
            .iter()
            .enumerate()
            .find(|(_, b)| b.trigger == trigger)
    }

    fn run_release_callbacks(&mut self, trigger: T) {
        for binding in self.bindings.iter_mut().filter(|b| b.trigger == trigger) {
            if let Some(on_release) = binding.on_release.as_mut() {
                on_release();
            }
        }
    }
}

/// Runtime record of a held trigger.
#[derive(Debug, Copy, Clone)]
struct ActiveAction {
    /// Index into the binding table of the trigger's class.
    binding: usize,
    frequency: Frequency,
}

struct MoveHandler {
    last: (f64, f64),
    callback: AxisCallback,
}

/// Maps input events to user callbacks.
///
/// Each input class (keys, buttons, scroll, pointer moves) starts listening the
/// first time something is registered for it; events of a class nobody listens
/// to are dropped.
pub struct InputDispatcher {
    keys: BindingTable<Key>,
    buttons: BindingTable<MouseButton>,
    scroll: Option<AxisCallback>,
    pointer: Option<MoveHandler>,
    active: HashMap<Trigger, ActiveAction>,
}

impl InputDispatcher {
    pub fn new() -> Self {
        Self {
            keys: BindingTable::new(),
            buttons: BindingTable::new(),
            scroll: None,
            pointer: None,
            active: HashMap::new(),
        }
    }

    /// Adds a key binding. Binding the same key again adds an independent binding.
    pub fn add_key_binding(
        &mut self,
        key: Key,
        on_press: impl FnMut(f32) + 'static,
        frequency: Frequency,
        on_release: Option<ReleaseCallback>,
    ) {
        if self.keys.is_empty() {
            log::debug!("listening to keyboard input");
        }
        self.keys.push(Binding {
            trigger: key,
            on_press: Box::new(on_press),
            frequency,
            on_release,
        });
    }

    pub fn add_button_binding(
        &mut self,
        button: MouseButton,
        on_press: impl FnMut(f32) + 'static,
        frequency: Frequency,
        on_release: Option<ReleaseCallback>,
    ) {
        if self.buttons.is_empty() {
            log::debug!("listening to mouse button input");
        }
        self.buttons.push(Binding {
            trigger: button,
            on_press: Box::new(on_press),
            frequency,
            on_release,
        });
    }

    /// Sets the scroll handler, replacing any previous one.
    pub fn set_scroll_callback(&mut self, callback: impl FnMut(f64, f64) + 'static) {
        self.scroll = Some(Box::new(callback));
    }

    /// Sets the pointer-move handler, replacing any previous one.
    ///
    /// Deltas are measured from `reference` until the first move arrives.
    pub fn set_move_callback(&mut self, reference: (f64, f64), callback: impl FnMut(f64, f64) + 'static) {
        self.pointer = Some(MoveHandler {
            last: reference,
            callback: Box::new(callback),
        });
    }

    /// Routes one platform event to the matching entry point.
    pub fn handle_event(&mut self, event: &InputEvent) {
        match *event {
            // Held keys are already active; auto-repeat adds nothing.
            InputEvent::Key { repeat: true, .. } => {}
            InputEvent::Key { key, state, .. } => match state {
                ButtonState::Pressed => self.press(Trigger::Key(key)),
                ButtonState::Released => self.release(Trigger::Key(key)),
            },
            InputEvent::MouseButton { button, state } => match state {
                ButtonState::Pressed => self.press(Trigger::Button(button)),
                ButtonState::Released => self.release(Trigger::Button(button)),
            },
            InputEvent::PointerMoved { x, y } => self.pointer_moved(x, y),
            InputEvent::Scroll { x, y } => self.scrolled(x, y),
        }
    }

    /// Press edge: activates the trigger's first binding unless already active.
    pub fn press(&mut self, trigger: Trigger) {
        if self.active.contains_key(&trigger) {
            return;
        }

        let matched = match trigger {
            Trigger::Key(key) => self.keys.first_matching(key).map(|(i, b)| (i, b.frequency)),
            Trigger::Button(button) => self
                .buttons
                .first_matching(button)
                .map(|(i, b)| (i, b.frequency)),
        };

        if let Some((binding, frequency)) = matched {
            self.active.insert(trigger, ActiveAction { binding, frequency });
        }
    }

    /// Release edge: deactivates the trigger, then runs every release callback
    /// bound to it in registration order.
    pub fn release(&mut self, trigger: Trigger) {
        self.active.remove(&trigger);

        match trigger {
            Trigger::Key(key) => self.keys.run_release_callbacks(key),
            Trigger::Button(button) => self.buttons.run_release_callbacks(button),
        }
    }

    /// Runs every active action once with `dt`; `Once` actions are retired.
    pub fn tick(&mut self, dt: f32) {
        let Self {
            keys,
            buttons,
            active,
            ..
        } = self;

        active.retain(|trigger, action| {
            let on_press = match trigger {
                Trigger::Key(_) => keys.bindings.get_mut(action.binding).map(|b| &mut b.on_press),
                Trigger::Button(_) => buttons
                    .bindings
                    .get_mut(action.binding)
                    .map(|b| &mut b.on_press),
            };
            if let Some(on_press) = on_press {
                on_press(dt);
            }
            action.frequency == Frequency::Repeat
        });
    }

    pub fn pointer_moved(&mut self, x: f64, y: f64) {
        let Some(pointer) = self.pointer.as_mut() else { return };
        let (last_x, last_y) = pointer.last;
        (pointer.callback)(x - last_x, y - last_y);
        pointer.last = (x, y);
    }

    pub fn scrolled(&mut self, x: f64, y: f64) {
        if let Some(scroll) = self.scroll.as_mut() {
            scroll(x, y);
        }
    }

    pub fn is_active(&self, trigger: impl Into<Trigger>) -> bool {
        self.active.contains_key(&trigger.into())
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl Default for InputDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;

    fn counter() -> (Rc<Cell<u32>>, impl FnMut(f32) + 'static) {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        (count, move |_| c.set(c.get() + 1))
    }

    fn key(key: Key, state: ButtonState) -> InputEvent {
        InputEvent::Key {
            key,
            state,
            repeat: false,
        }
    }

    // ── frequency ─────────────────────────────────────────────────────────

    #[test]
    fn once_fires_a_single_time_per_press() {
        let mut input = InputDispatcher::new();
        let (count, on_press) = counter();
        input.add_key_binding(Key::A, on_press, Frequency::Once, None);

        input.handle_event(&key(Key::A, ButtonState::Pressed));
        input.tick(0.016);
        input.tick(0.016);
        assert_eq!(count.get(), 1);

        input.handle_event(&key(Key::A, ButtonState::Released));
        input.handle_event(&key(Key::A, ButtonState::Pressed));
        input.tick(0.016);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn repeat_fires_every_tick_while_held() {
        let mut input = InputDispatcher::new();
        let (count, on_press) = counter();
        input.add_key_binding(Key::B, on_press, Frequency::Repeat, None);

        input.handle_event(&key(Key::B, ButtonState::Pressed));
        input.tick(0.016);
        input.tick(0.016);
        input.tick(0.016);
        assert_eq!(count.get(), 3);

        input.handle_event(&key(Key::B, ButtonState::Released));
        input.tick(0.016);
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn press_callback_receives_delta_time() {
        let mut input = InputDispatcher::new();
        let seen = Rc::new(Cell::new(0.0));
        let s = seen.clone();
        input.add_button_binding(MouseButton::Left, move |dt| s.set(dt), Frequency::Repeat, None);

        input.press(Trigger::Button(MouseButton::Left));
        input.tick(0.25);
        assert_eq!(seen.get(), 0.25);
    }

    // ── active table ──────────────────────────────────────────────────────

    #[test]
    fn at_most_one_active_action_per_trigger() {
        let mut input = InputDispatcher::new();
        let (count, on_press) = counter();
        let (_, other) = counter();
        input.add_key_binding(Key::W, on_press, Frequency::Repeat, None);
        input.add_key_binding(Key::W, other, Frequency::Repeat, None);

        input.press(Trigger::Key(Key::W));
        input.press(Trigger::Key(Key::W));
        assert_eq!(input.active_count(), 1);

        input.tick(0.016);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn auto_repeat_presses_are_ignored() {
        let mut input = InputDispatcher::new();
        let (count, on_press) = counter();
        input.add_key_binding(Key::Space, on_press, Frequency::Once, None);

        input.handle_event(&key(Key::Space, ButtonState::Pressed));
        input.tick(0.016);
        input.handle_event(&InputEvent::Key {
            key: Key::Space,
            state: ButtonState::Pressed,
            repeat: true,
        });
        input.tick(0.016);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn unbound_triggers_never_become_active() {
        let mut input = InputDispatcher::new();
        input.press(Trigger::Key(Key::Q));
        input.press(Trigger::Button(MouseButton::Right));
        assert_eq!(input.active_count(), 0);
    }

    #[test]
    fn distinct_triggers_are_active_independently() {
        let mut input = InputDispatcher::new();
        let (keys, on_key) = counter();
        let (clicks, on_click) = counter();
        input.add_key_binding(Key::D, on_key, Frequency::Repeat, None);
        input.add_button_binding(MouseButton::Left, on_click, Frequency::Once, None);

        input.press(Trigger::Key(Key::D));
        input.press(Trigger::Button(MouseButton::Left));
        input.tick(0.016);
        input.tick(0.016);

        assert_eq!((keys.get(), clicks.get()), (2, 1));
        assert!(input.is_active(Key::D));
        assert!(!input.is_active(MouseButton::Left));
    }

    #[test]
    fn every_active_action_runs_once_per_tick_even_when_some_retire() {
        let mut input = InputDispatcher::new();
        let triggers = [Key::A, Key::B, Key::C, Key::D, Key::E, Key::F];
        let counts: Vec<_> = triggers
            .iter()
            .enumerate()
            .map(|(i, k)| {
                let (count, on_press) = counter();
                let frequency = if i % 2 == 0 { Frequency::Once } else { Frequency::Repeat };
                input.add_key_binding(*k, on_press, frequency, None);
                count
            })
            .collect();

        for k in triggers {
            input.press(Trigger::Key(k));
        }
        input.tick(0.016);
        assert!(counts.iter().all(|c| c.get() == 1));

        input.tick(0.016);
        let after: Vec<u32> = counts.iter().map(|c| c.get()).collect();
        assert_eq!(after, vec![1, 2, 1, 2, 1, 2]);
        assert_eq!(input.active_count(), 3);
    }

    // ── release ───────────────────────────────────────────────────────────

    #[test]
    fn release_runs_callbacks_in_registration_order() {
        let mut input = InputDispatcher::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second"] {
            let o = order.clone();
            input.add_key_binding(
                Key::R,
                |_| {},
                Frequency::Repeat,
                Some(Box::new(move || o.borrow_mut().push(tag))),
            );
        }
        input.add_key_binding(Key::R, |_| {}, Frequency::Repeat, None);

        input.press(Trigger::Key(Key::R));
        input.release(Trigger::Key(Key::R));

        assert_eq!(*order.borrow(), vec!["first", "second"]);
        assert_eq!(input.active_count(), 0);
    }

    #[test]
    fn release_callbacks_run_even_after_once_retired() {
        let mut input = InputDispatcher::new();
        let released = Rc::new(Cell::new(false));
        let r = released.clone();
        input.add_button_binding(
            MouseButton::Middle,
            |_| {},
            Frequency::Once,
            Some(Box::new(move || r.set(true))),
        );

        input.handle_event(&InputEvent::MouseButton {
            button: MouseButton::Middle,
            state: ButtonState::Pressed,
        });
        input.tick(0.016);
        input.handle_event(&InputEvent::MouseButton {
            button: MouseButton::Middle,
            state: ButtonState::Released,
        });
        assert!(released.get());
    }

    // ── pointer / scroll ──────────────────────────────────────────────────

    #[test]
    fn pointer_deltas_are_relative_to_previous_position() {
        let mut input = InputDispatcher::new();
        let deltas = Rc::new(RefCell::new(Vec::new()));
        let d = deltas.clone();
        input.set_move_callback((400.0, 300.0), move |dx, dy| d.borrow_mut().push((dx, dy)));

        input.handle_event(&InputEvent::PointerMoved { x: 420.0, y: 305.0 });
        input.handle_event(&InputEvent::PointerMoved { x: 430.0, y: 300.0 });

        assert_eq!(*deltas.borrow(), vec![(20.0, 5.0), (10.0, -5.0)]);
    }

    #[test]
    fn scroll_offsets_pass_through() {
        let mut input = InputDispatcher::new();
        let seen = Rc::new(Cell::new((0.0, 0.0)));
        let s = seen.clone();
        input.set_scroll_callback(move |x, y| s.set((x, y)));

        input.handle_event(&InputEvent::Scroll { x: -1.5, y: 3.0 });
        assert_eq!(seen.get(), (-1.5, 3.0));
    }

    #[test]
    fn events_without_listeners_are_dropped() {
        let mut input = InputDispatcher::new();
        input.handle_event(&InputEvent::PointerMoved { x: 1.0, y: 2.0 });
        input.handle_event(&InputEvent::Scroll { x: 0.0, y: 1.0 });
        input.handle_event(&key(Key::A, ButtonState::Released));
        assert_eq!(input.active_count(), 0);
    }
}
