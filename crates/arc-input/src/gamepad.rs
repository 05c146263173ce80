//! Gamepad plumbing over gilrs.
//!
//! Pads are assigned session-stable slot indices in connection order; a
//! disconnected slot keeps its index and reports neutral values until the
//! same device reconnects.

use gilrs::{Axis, Button, EventType, GamepadId, Gilrs};

use crate::state::{PadSnapshot, PAD_AXIS_COUNT, PAD_BUTTON_COUNT};

/// Standardized button indices published in the constant table.
pub mod buttons {
    pub const SOUTH: usize = 0;
    pub const EAST: usize = 1;
    pub const WEST: usize = 2;
    pub const NORTH: usize = 3;
    pub const L1: usize = 4;
    pub const R1: usize = 5;
    pub const SELECT: usize = 6;
    pub const START: usize = 7;
    pub const L3: usize = 8;
    pub const R3: usize = 9;
    pub const DPAD_UP: usize = 10;
    pub const DPAD_DOWN: usize = 11;
    pub const DPAD_LEFT: usize = 12;
    pub const DPAD_RIGHT: usize = 13;
}

/// Standardized axis indices published in the constant table.
pub mod axes {
    pub const LEFT_X: usize = 0;
    pub const LEFT_Y: usize = 1;
    pub const RIGHT_X: usize = 2;
    pub const RIGHT_Y: usize = 3;
    pub const LEFT_TRIGGER: usize = 4;
    pub const RIGHT_TRIGGER: usize = 5;
}

pub(crate) fn convert_button(button: Button) -> Option<usize> {
    match button {
        Button::South => Some(buttons::SOUTH),
        Button::East => Some(buttons::EAST),
        Button::West => Some(buttons::WEST),
        Button::North => Some(buttons::NORTH),
        Button::LeftTrigger => Some(buttons::L1),
        Button::RightTrigger => Some(buttons::R1),
        Button::Select => Some(buttons::SELECT),
        Button::Start => Some(buttons::START),
        Button::LeftThumb => Some(buttons::L3),
        Button::RightThumb => Some(buttons::R3),
        Button::DPadUp => Some(buttons::DPAD_UP),
        Button::DPadDown => Some(buttons::DPAD_DOWN),
        Button::DPadLeft => Some(buttons::DPAD_LEFT),
        Button::DPadRight => Some(buttons::DPAD_RIGHT),
        _ => None,
    }
}

pub(crate) fn convert_axis(axis: Axis) -> Option<usize> {
    match axis {
        Axis::LeftStickX => Some(axes::LEFT_X),
        Axis::LeftStickY => Some(axes::LEFT_Y),
        Axis::RightStickX => Some(axes::RIGHT_X),
        Axis::RightStickY => Some(axes::RIGHT_Y),
        Axis::LeftZ => Some(axes::LEFT_TRIGGER),
        Axis::RightZ => Some(axes::RIGHT_TRIGGER),
        _ => None,
    }
}

/// Raw (pre-deadzone) state of one slot.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PadState {
    pub connected: bool,
    pub buttons: [bool; PAD_BUTTON_COUNT],
    pub axes: [f32; PAD_AXIS_COUNT],
}

pub(crate) struct PadSlots {
    slots: Vec<(GamepadId, PadState)>,
}

impl PadSlots {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn drain_events(&mut self, gilrs: &mut Gilrs) {
        while let Some(event) = gilrs.next_event() {
            self.apply(event.id, &event.event);
        }
    }

    fn apply(&mut self, id: GamepadId, event: &EventType) {
        match event {
            EventType::Connected => {
                let state = self.slot_mut(id);
                *state = PadState {
                    connected: true,
                    ..PadState::default()
                };
            }
            EventType::Disconnected => {
                *self.slot_mut(id) = PadState::default();
            }
            EventType::ButtonPressed(button, _) => {
                if let Some(index) = convert_button(*button) {
                    self.slot_mut(id).buttons[index] = true;
                }
            }
            EventType::ButtonReleased(button, _) => {
                if let Some(index) = convert_button(*button) {
                    self.slot_mut(id).buttons[index] = false;
                }
            }
            EventType::ButtonChanged(button, value, _) => {
                // Analog triggers arrive as button value changes.
                let axis = match button {
                    Button::LeftTrigger2 => Some(axes::LEFT_TRIGGER),
                    Button::RightTrigger2 => Some(axes::RIGHT_TRIGGER),
                    _ => None,
                };
                if let Some(index) = axis {
                    self.slot_mut(id).axes[index] = value.clamp(0.0, 1.0);
                }
            }
            EventType::AxisChanged(axis, value, _) => {
                if let Some(index) = convert_axis(*axis) {
                    let range = if index >= axes::LEFT_TRIGGER {
                        0.0..=1.0
                    } else {
                        -1.0..=1.0
                    };
                    self.slot_mut(id).axes[index] = value.clamp(*range.start(), *range.end());
                }
            }
            _ => {}
        }
    }

    /// Slot for `id`, allocating a new one for first-seen pads. Indices
    /// never shift.
    fn slot_mut(&mut self, id: GamepadId) -> &mut PadState {
        if let Some(pos) = self.slots.iter().position(|(slot_id, _)| *slot_id == id) {
            return &mut self.slots[pos].1;
        }
        self.slots.push((id, PadState::default()));
        &mut self.slots.last_mut().unwrap().1
    }

    /// Applies deadzones and produces the per-tick snapshot states.
    pub fn snapshot(&self, stick_deadzone: f32, trigger_deadzone: f32) -> Vec<PadSnapshot> {
        self.slots
            .iter()
            .map(|(_, state)| {
                let mut axes = state.axes;
                apply_radial_deadzone(&mut axes, axes::LEFT_X, axes::LEFT_Y, stick_deadzone);
                apply_radial_deadzone(&mut axes, axes::RIGHT_X, axes::RIGHT_Y, stick_deadzone);
                for index in [axes::LEFT_TRIGGER, axes::RIGHT_TRIGGER] {
                    if axes[index] < trigger_deadzone {
                        axes[index] = 0.0;
                    }
                }
                PadSnapshot {
                    connected: state.connected,
                    buttons: state.buttons,
                    axes,
                }
            })
            .collect()
    }
}

/// Radial deadzone with rescaling: inside the dead radius the stick reads
/// `(0, 0)`; outside, magnitude ramps linearly from 0 at the edge of the
/// deadzone to 1 at full deflection.
fn apply_radial_deadzone(axes: &mut [f32; PAD_AXIS_COUNT], ix: usize, iy: usize, deadzone: f32) {
    let (x, y) = (axes[ix], axes[iy]);
    let len = (x * x + y * y).sqrt();
    if len < deadzone {
        axes[ix] = 0.0;
        axes[iy] = 0.0;
    } else if len > 0.0 {
        let scaled = ((len - deadzone) / (1.0 - deadzone)).min(1.0);
        axes[ix] = x / len * scaled;
        axes[iy] = y / len * scaled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radial_deadzone_kills_drift_and_rescales() {
        let mut axes = [0.05, -0.08, 0.0, 0.0, 0.0, 0.0];
        apply_radial_deadzone(&mut axes, 0, 1, 0.15);
        assert_eq!((axes[0], axes[1]), (0.0, 0.0));

        let mut axes = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        apply_radial_deadzone(&mut axes, 0, 1, 0.15);
        assert!((axes[0] - 1.0).abs() < 1e-6);

        let mut axes = [0.5, 0.0, 0.0, 0.0, 0.0, 0.0];
        apply_radial_deadzone(&mut axes, 0, 1, 0.15);
        assert!(axes[0] > 0.0 && axes[0] < 0.5);
    }

    #[test]
    fn standard_mapping_is_complete() {
        // All 14 standard buttons and 6 axes are reachable from gilrs inputs.
        let mut seen = [false; PAD_BUTTON_COUNT];
        for button in [
            Button::South, Button::East, Button::West, Button::North,
            Button::LeftTrigger, Button::RightTrigger, Button::Select,
            Button::Start, Button::LeftThumb, Button::RightThumb,
            Button::DPadUp, Button::DPadDown, Button::DPadLeft, Button::DPadRight,
        ] {
            seen[convert_button(button).unwrap()] = true;
        }
        assert!(seen.iter().all(|&b| b));

        assert_eq!(convert_axis(Axis::LeftStickX), Some(0));
        assert_eq!(convert_axis(Axis::RightZ), Some(axes::RIGHT_TRIGGER));
        assert_eq!(convert_button(Button::Mode), None);
    }
}
