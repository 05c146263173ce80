//! The shared service state the bindings close over.
//!
//! rhai binding closures are `'static`, so every subsystem a binding can
//! reach lives behind one `Rc<RefCell<..>>` owned by the main thread. The
//! frame loop borrows it between script invocations; bindings borrow it
//! during them. Nothing here crosses a thread.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Display;
use std::rc::Rc;
use std::time::Instant;

use arc_audio::AudioSystem;
use arc_canvas::Recorder;
use arc_cartridge::{AspectMode, EffectivePolicy, Preset, ScalingMode};
use arc_core::{set_last_error, CartridgeId, FrameClock, Xorshift128Plus};
use arc_input::InputSystem;
use arc_vfs::Vfs;

use crate::resources::CartridgeResources;

pub type Shared = Rc<RefCell<Services>>;

/// Display state mirrored for bindings plus deferred mode-change requests
/// the loop applies between frames.
pub struct DisplayState {
    pub console_size: (u32, u32),
    pub display_size: (u32, u32),
    pub aspect: AspectMode,
    pub preset: Preset,
    pub scaling: ScalingMode,
    pub allow_user_override: bool,
    pub pending_scaling: Option<ScalingMode>,
    pub pending_console: Option<(AspectMode, Preset)>,
}

/// Dev-mode profiling spans (`dev::profileBegin`/`End`).
#[derive(Default)]
pub struct ProfileState {
    stack: Vec<(String, Instant)>,
    pub totals_ms: HashMap<String, f64>,
}

impl ProfileState {
    pub fn begin(&mut self, name: String) {
        self.stack.push((name, Instant::now()));
    }

    pub fn end(&mut self, name: &str) -> bool {
        match self.stack.pop() {
            Some((top, start)) if top == name => {
                *self.totals_ms.entry(top).or_insert(0.0) +=
                    start.elapsed().as_secs_f64() * 1_000.0;
                true
            }
            Some(other) => {
                // Mismatched end: restore and report failure.
                self.stack.push(other);
                false
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.stack.clear();
        self.totals_ms.clear();
    }
}

pub struct Services {
    pub cartridge_id: CartridgeId,
    pub policy: EffectivePolicy,
    pub dev_mode: bool,

    pub vfs: Vfs,
    pub resources: CartridgeResources,
    pub recorder: Recorder,
    pub input: InputSystem,
    pub audio: Option<AudioSystem>,

    /// `None` only in headless tests; the player always has a device.
    pub renderer: Option<arc_render::Renderer>,

    pub rng: Xorshift128Plus,
    pub clock: FrameClock,
    pub tick_hz: u32,
    pub frame_count: u64,
    pub tick_count: u64,

    pub display: DisplayState,

    /// Mirror of the recorder's current font, so `measureText` can answer
    /// synchronously from the same metrics source the executor draws with.
    pub gfx_font: Option<(std::sync::Arc<arc_canvas::FontResource>, f32)>,

    /// Raw handle of the scene `gfx3d::render()` applies to; `0` = none.
    pub active_scene: i64,
    /// Dev-mode warning latch for repeated render() calls in one frame.
    pub render_requests_this_frame: u32,

    pub pending_capture: Option<String>,
    pub reload_requested: bool,
    pub profile: ProfileState,
}

impl Services {
    pub fn shared(self) -> Shared {
        Rc::new(RefCell::new(self))
    }

    /// Resets the per-frame latches; called by the loop at frame start.
    pub fn begin_frame(&mut self, frame: u64) {
        self.frame_count = frame;
        self.render_requests_this_frame = 0;
    }
}

/// Uniform failure path for bindings: set the thread-confined last error
/// as `"<function>: <cause>"`, emit a dev-mode diagnostic, and return the
/// documented failure value.
pub fn fail<T>(dev_mode: bool, function: &str, cause: impl Display, value: T) -> T {
    set_last_error(function, &cause);
    if dev_mode {
        arc_tracing::warn!("{}: {}", function, cause);
    }
    value
}

/// Coerces a rhai number (INT or FLOAT) to f64.
pub fn as_number(value: &rhai::Dynamic) -> Option<f64> {
    if let Ok(float) = value.as_float() {
        Some(float)
    } else {
        value.as_int().ok().map(|int| int as f64)
    }
}

/// Coerces a rhai number to a finite f32.
pub fn as_finite_f32(value: &rhai::Dynamic) -> Option<f32> {
    as_number(value)
        .map(|number| number as f32)
        .filter(|number| number.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_spans_nest_and_reject_mismatches() {
        let mut profile = ProfileState::default();
        profile.begin("outer".to_string());
        profile.begin("inner".to_string());
        assert!(!profile.end("outer"));
        assert!(profile.end("inner"));
        assert!(profile.end("outer"));
        assert!(!profile.end("outer"));
        assert!(profile.totals_ms.contains_key("inner"));
    }

    #[test]
    fn number_coercion_accepts_int_and_float() {
        assert_eq!(as_number(&rhai::Dynamic::from(3_i64)), Some(3.0));
        assert_eq!(as_number(&rhai::Dynamic::from(2.5_f64)), Some(2.5));
        assert_eq!(as_number(&rhai::Dynamic::from("x")), None);
        assert_eq!(as_finite_f32(&rhai::Dynamic::from(f64::NAN)), None);
    }
}
