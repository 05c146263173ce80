//! Arcanee Input
//!
//! Event-driven input with frozen per-tick snapshots. The platform layer
//! feeds winit window events and polls gilrs; the scheduler freezes one
//! snapshot per frame which every tick of that frame observes. Edge
//! queries compare the frozen snapshot against the previous one.

// crate-specific lint exceptions:
//#![allow()]

mod gamepad;
mod keyboard;
mod mapping;
mod state;

pub use gamepad::{axes, buttons};
pub use keyboard::{Key, KEY_STATE_SIZE};
pub use mapping::{map_to_console, MouseMapping, ViewportRect};
pub use state::{
    PadSnapshot, Snapshot, MOUSE_BUTTON_COUNT, MOUSE_OUTSIDE, PAD_AXIS_COUNT, PAD_BUTTON_COUNT,
};

use gilrs::Gilrs;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::PhysicalKey;

use gamepad::PadSlots;
use keyboard::KEY_STATE_SIZE as KEYS;

/// Lines of wheel scroll a pixel-delta event is normalized to.
const PIXELS_PER_LINE: f64 = 40.0;

/// Owns the mutable current state and the frozen snapshots.
pub struct InputSystem {
    keys: [bool; KEYS],
    mouse_display: (f64, f64),
    mouse_buttons: [bool; MOUSE_BUTTON_COUNT],
    wheel_accum: (f64, f64),
    pads: PadSlots,
    gilrs: Option<Gilrs>,
    stick_deadzone: f32,
    trigger_deadzone: f32,
    snapshot: Snapshot,
    previous: Snapshot,
}

impl InputSystem {
    /// `gilrs` initialization can fail on headless systems; gamepads are
    /// simply absent then and every pad query returns neutral values.
    pub fn new(stick_deadzone: f32, trigger_deadzone: f32) -> Self {
        Self {
            keys: [false; KEYS],
            mouse_display: (-1.0, -1.0),
            mouse_buttons: [false; MOUSE_BUTTON_COUNT],
            wheel_accum: (0.0, 0.0),
            pads: PadSlots::new(),
            gilrs: Gilrs::new().ok(),
            stick_deadzone,
            trigger_deadzone,
            snapshot: Snapshot::default(),
            previous: Snapshot::default(),
        }
    }

    /// Ingests one window event into the mutable current state.
    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    if let Some(key) = Key::from_keycode(code) {
                        self.keys[key.code() as usize] = event.state == ElementState::Pressed;
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_display = (position.x, position.y);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let index = match button {
                    MouseButton::Left => Some(0),
                    MouseButton::Right => Some(1),
                    MouseButton::Middle => Some(2),
                    MouseButton::Back => Some(3),
                    MouseButton::Forward => Some(4),
                    MouseButton::Other(_) => None,
                };
                if let Some(index) = index {
                    self.mouse_buttons[index] = *state == ElementState::Pressed;
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let (dx, dy) = match delta {
                    MouseScrollDelta::LineDelta(x, y) => (f64::from(*x), f64::from(*y)),
                    MouseScrollDelta::PixelDelta(pos) => {
                        (pos.x / PIXELS_PER_LINE, pos.y / PIXELS_PER_LINE)
                    }
                };
                self.wheel_accum.0 += dx;
                self.wheel_accum.1 += dy;
            }
            WindowEvent::Focused(false) => self.focus_lost(),
            _ => {}
        }
    }

    /// Releases every digital input. The release edges become visible on
    /// the next freeze, compared against the pre-loss snapshot; refocusing
    /// starts clean with no phantom presses.
    pub fn focus_lost(&mut self) {
        self.keys = [false; KEYS];
        self.mouse_buttons = [false; MOUSE_BUTTON_COUNT];
        self.wheel_accum = (0.0, 0.0);
    }

    /// Drains pending gamepad events into the current state.
    pub fn poll_gamepads(&mut self) {
        if let Some(gilrs) = self.gilrs.as_mut() {
            self.pads.drain_events(gilrs);
        }
    }

    /// Freezes the current state into the tick snapshot. All ticks until
    /// the next freeze observe exactly this state.
    pub fn freeze(&mut self, mapping: &MouseMapping) {
        self.previous = std::mem::replace(
            &mut self.snapshot,
            Snapshot {
                keys: self.keys,
                mouse: map_to_console(mapping, self.mouse_display.0, self.mouse_display.1)
                    .unwrap_or(MOUSE_OUTSIDE),
                mouse_buttons: self.mouse_buttons,
                wheel: self.wheel_accum,
                pads: self.pads.snapshot(self.stick_deadzone, self.trigger_deadzone),
            },
        );
        self.wheel_accum = (0.0, 0.0);
    }

    /// The snapshot the current tick observes.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The previous tick snapshot, for edge queries.
    pub fn previous(&self) -> &Snapshot {
        &self.previous
    }

    pub fn key_pressed(&self, code: u32) -> bool {
        self.snapshot.key_down(code) && !self.previous.key_down(code)
    }

    pub fn key_released(&self, code: u32) -> bool {
        !self.snapshot.key_down(code) && self.previous.key_down(code)
    }

    pub fn mouse_pressed(&self, button: i64) -> bool {
        self.snapshot.mouse_down(button) && !self.previous.mouse_down(button)
    }

    pub fn mouse_released(&self, button: i64) -> bool {
        !self.snapshot.mouse_down(button) && self.previous.mouse_down(button)
    }

    pub fn pad_button_pressed(&self, pad: i64, button: i64) -> bool {
        self.snapshot.pad_button_down(pad, button) && !self.previous.pad_button_down(pad, button)
    }

    pub fn pad_button_released(&self, pad: i64, button: i64) -> bool {
        !self.snapshot.pad_button_down(pad, button) && self.previous.pad_button_down(pad, button)
    }

    /// Test hook: force a key state without a window event.
    pub fn set_key_for_test(&mut self, key: Key, down: bool) {
        self.keys[key.code() as usize] = down;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arc_cartridge::ScalingMode;

    fn mapping() -> MouseMapping {
        MouseMapping {
            viewport: ViewportRect {
                x: 0,
                y: 0,
                w: 960,
                h: 540,
            },
            console: (480, 270),
            mode: ScalingMode::Fit,
        }
    }

    #[test]
    fn edges_come_from_snapshot_pairs() {
        let mut input = InputSystem::new(0.15, 0.05);

        input.set_key_for_test(Key::Space, true);
        input.freeze(&mapping());
        assert!(input.snapshot().key_down(Key::Space.code()));
        assert!(input.key_pressed(Key::Space.code()));

        // Held across the next freeze: down but no longer an edge.
        input.freeze(&mapping());
        assert!(input.snapshot().key_down(Key::Space.code()));
        assert!(!input.key_pressed(Key::Space.code()));

        input.set_key_for_test(Key::Space, false);
        input.freeze(&mapping());
        assert!(input.key_released(Key::Space.code()));
    }

    #[test]
    fn mid_frame_presses_stay_invisible_until_the_next_freeze() {
        let mut input = InputSystem::new(0.15, 0.05);
        input.freeze(&mapping());

        // The user presses Space between two ticks of the same frame; the
        // frozen snapshot does not change.
        input.set_key_for_test(Key::Space, true);
        assert!(!input.snapshot().key_down(Key::Space.code()));
        assert!(!input.key_pressed(Key::Space.code()));

        input.freeze(&mapping());
        assert!(input.key_pressed(Key::Space.code()));
    }

    #[test]
    fn focus_loss_releases_and_generates_edges() {
        let mut input = InputSystem::new(0.15, 0.05);
        input.set_key_for_test(Key::W, true);
        input.freeze(&mapping());
        assert!(input.snapshot().key_down(Key::W.code()));

        input.focus_lost();
        input.freeze(&mapping());
        assert!(!input.snapshot().key_down(Key::W.code()));
        assert!(input.key_released(Key::W.code()));

        // Refocus produces no phantom press edges.
        input.freeze(&mapping());
        assert!(!input.key_pressed(Key::W.code()));
        assert!(!input.key_released(Key::W.code()));
    }

    #[test]
    fn wheel_accumulates_and_resets_per_freeze() {
        let mut input = InputSystem::new(0.15, 0.05);
        input.wheel_accum = (0.0, 3.0);
        input.freeze(&mapping());
        assert_eq!(input.snapshot().wheel(), (0.0, 3.0));
        input.freeze(&mapping());
        assert_eq!(input.snapshot().wheel(), (0.0, 0.0));
    }
}
