//! Frozen per-tick input snapshots.

use crate::keyboard::KEY_STATE_SIZE;

/// Mouse buttons exposed to scripts: left, right, middle, back, forward.
pub const MOUSE_BUTTON_COUNT: usize = 5;
/// Standardized gamepad buttons 0..13 (Xbox-style layout).
pub const PAD_BUTTON_COUNT: usize = 14;
/// Standardized gamepad axes 0..5 (LX, LY, RX, RY, LT, RT).
pub const PAD_AXIS_COUNT: usize = 6;

/// Sentinel reported while the cursor is outside the console viewport.
pub const MOUSE_OUTSIDE: (f64, f64) = (-1.0, -1.0);

/// One gamepad slot inside a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct PadSnapshot {
    pub connected: bool,
    pub buttons: [bool; PAD_BUTTON_COUNT],
    /// Deadzones already applied. Sticks in `[-1, 1]`, triggers in `[0, 1]`.
    pub axes: [f32; PAD_AXIS_COUNT],
}

impl Default for PadSnapshot {
    fn default() -> Self {
        Self {
            connected: false,
            buttons: [false; PAD_BUTTON_COUNT],
            axes: [0.0; PAD_AXIS_COUNT],
        }
    }
}

/// The input state one tick observes. Queries are O(1), allocation-free
/// and safe on any index.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub(crate) keys: [bool; KEY_STATE_SIZE],
    /// Console-space cursor position or [`MOUSE_OUTSIDE`].
    pub(crate) mouse: (f64, f64),
    pub(crate) mouse_buttons: [bool; MOUSE_BUTTON_COUNT],
    pub(crate) wheel: (f64, f64),
    pub(crate) pads: Vec<PadSnapshot>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            keys: [false; KEY_STATE_SIZE],
            mouse: MOUSE_OUTSIDE,
            mouse_buttons: [false; MOUSE_BUTTON_COUNT],
            wheel: (0.0, 0.0),
            pads: Vec::new(),
        }
    }
}

impl Snapshot {
    pub fn key_down(&self, code: u32) -> bool {
        self.keys.get(code as usize).copied().unwrap_or(false)
    }

    /// Console-space cursor position; [`MOUSE_OUTSIDE`] outside the viewport.
    pub fn mouse_pos(&self) -> (f64, f64) {
        self.mouse
    }

    pub fn mouse_down(&self, button: i64) -> bool {
        usize::try_from(button)
            .ok()
            .and_then(|idx| self.mouse_buttons.get(idx))
            .copied()
            .unwrap_or(false)
    }

    pub fn wheel(&self) -> (f64, f64) {
        self.wheel
    }

    /// Number of gamepad slots ever seen this session. Slots of
    /// disconnected pads stay allocated and report neutral values.
    pub fn pad_count(&self) -> usize {
        self.pads.len()
    }

    pub fn pad_connected(&self, pad: i64) -> bool {
        self.pad(pad).map(|p| p.connected).unwrap_or(false)
    }

    pub fn pad_button_down(&self, pad: i64, button: i64) -> bool {
        match (self.pad(pad), usize::try_from(button)) {
            (Some(state), Ok(idx)) => state.buttons.get(idx).copied().unwrap_or(false),
            _ => false,
        }
    }

    pub fn pad_axis(&self, pad: i64, axis: i64) -> f32 {
        match (self.pad(pad), usize::try_from(axis)) {
            (Some(state), Ok(idx)) => state.axes.get(idx).copied().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    fn pad(&self, pad: i64) -> Option<&PadSnapshot> {
        usize::try_from(pad).ok().and_then(|idx| self.pads.get(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_are_safe_on_any_index() {
        let snapshot = Snapshot::default();
        assert!(!snapshot.key_down(9999));
        assert!(!snapshot.mouse_down(-1));
        assert!(!snapshot.mouse_down(64));
        assert!(!snapshot.pad_button_down(3, 2));
        assert!(!snapshot.pad_button_down(-1, -1));
        assert_eq!(snapshot.pad_axis(0, 0), 0.0);
        assert_eq!(snapshot.mouse_pos(), MOUSE_OUTSIDE);
    }
}
