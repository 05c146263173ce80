//! `sys` namespace: versions, display queries, deterministic RNG, time,
//! logging and the last-error channel.

use rhai::{Dynamic, Module};

use arc_cartridge::{AspectMode, Preset, ScalingMode};
use arc_core::{clear_last_error, last_error};

use super::native;
use crate::services::{fail, Shared};

/// API version exposed to cartridges.
const API_VERSION: &str = "0.1";
/// Engine (runtime) version string.
const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

fn size_map(size: (u32, u32)) -> Dynamic {
    let mut map = rhai::Map::new();
    map.insert("w".into(), Dynamic::from(i64::from(size.0)));
    map.insert("h".into(), Dynamic::from(i64::from(size.1)));
    Dynamic::from_map(map)
}

pub fn module(services: &Shared) -> Module {
    let mut module = Module::new();

    module.set_native_fn("getApiVersion", || Ok::<_, Box<rhai::EvalAltResult>>(API_VERSION.to_string()));
    module.set_native_fn("getEngineVersion", || Ok::<_, Box<rhai::EvalAltResult>>(ENGINE_VERSION.to_string()));

    native!(module, services, "getFrameCount", |s| s.frame_count as i64);
    native!(module, services, "getTickHz", |s| i64::from(s.tick_hz));
    native!(module, services, "getDeltaFixed", |s| 1.0 / f64::from(s.tick_hz));
    native!(module, services, "getDisplaySize", |s| size_map(s.display.display_size));
    native!(module, services, "getConsoleSize", |s| size_map(s.display.console_size));
    native!(module, services, "getAspectMode", |s| s.display.aspect.as_str().to_string());
    native!(module, services, "getPreset", |s| s.display.preset.as_str().to_string());
    native!(module, services, "getScalingMode", |s| s
        .display
        .scaling
        .as_str()
        .to_string());

    native!(module, services, "setScalingMode", |s, name: &str| {
        if !s.display.allow_user_override {
            return Ok(fail(
                s.dev_mode,
                "sys.setScalingMode",
                "display overrides are locked by the manifest",
                false,
            ));
        }
        match ScalingMode::from_name(name) {
            Some(mode) => {
                s.display.pending_scaling = Some(mode);
                true
            }
            None => fail(
                s.dev_mode,
                "sys.setScalingMode",
                format!("unknown mode {:?}", name),
                false,
            ),
        }
    });

    native!(module, services, "setConsoleMode", |s, aspect: &str, preset: &str| {
        let parsed_aspect = match aspect {
            "16:9" => Some(AspectMode::Wide),
            "4:3" => Some(AspectMode::Classic),
            "any" => Some(AspectMode::Any),
            _ => None,
        };
        let parsed_preset = match preset {
            "low" => Some(Preset::Low),
            "medium" => Some(Preset::Medium),
            "high" => Some(Preset::High),
            "ultra" => Some(Preset::Ultra),
            _ => None,
        };
        match (parsed_aspect, parsed_preset) {
            (Some(aspect), Some(preset)) => {
                s.display.pending_console = Some((aspect, preset));
                true
            }
            _ => fail(
                s.dev_mode,
                "sys.setConsoleMode",
                format!("unknown mode {:?}/{:?}", aspect, preset),
                false,
            ),
        }
    });

    native!(module, services, "rand", |s| s.rng.next_i31());
    native!(module, services, "srand", |s, seed: i64| {
        s.rng = arc_core::Xorshift128Plus::seeded(seed as u64);
    });

    native!(module, services, "timeMs", |s| s.clock.elapsed_ms() as i64);

    native!(module, services, "log", |s, text: &str| {
        let _ = &s;
        arc_tracing::info!("[cart] {}", text);
    });
    native!(module, services, "warn", |s, text: &str| {
        let _ = &s;
        arc_tracing::warn!("[cart] {}", text);
    });
    native!(module, services, "error", |s, text: &str| {
        let _ = &s;
        arc_tracing::error!("[cart] {}", text);
    });

    module.set_native_fn("getLastError", || Ok::<_, Box<rhai::EvalAltResult>>(last_error()));
    module.set_native_fn("clearLastError", || {
        clear_last_error();
        Ok::<_, Box<rhai::EvalAltResult>>(())
    });

    module
}
