//! `inp` namespace: snapshot queries and edges.
//!
//! All queries read the frozen tick snapshot; they are O(1), never
//! allocate beyond rhai's own boxing, and return neutral values on any
//! invalid index.

use rhai::{Dynamic, Module};

use super::native;
use crate::services::Shared;

fn pos_map(x: f64, y: f64) -> Dynamic {
    let mut map = rhai::Map::new();
    map.insert("x".into(), Dynamic::from(x));
    map.insert("y".into(), Dynamic::from(y));
    Dynamic::from_map(map)
}

pub fn module(services: &Shared) -> Module {
    let mut module = Module::new();

    native!(module, services, "keyDown", |s, code: i64| {
        u32::try_from(code).map_or(false, |code| s.input.snapshot().key_down(code))
    });
    native!(module, services, "keyPressed", |s, code: i64| {
        u32::try_from(code).map_or(false, |code| s.input.key_pressed(code))
    });
    native!(module, services, "keyReleased", |s, code: i64| {
        u32::try_from(code).map_or(false, |code| s.input.key_released(code))
    });

    native!(module, services, "mousePos", |s| {
        let (x, y) = s.input.snapshot().mouse_pos();
        pos_map(x, y)
    });
    native!(module, services, "mouseDown", |s, button: i64| s
        .input
        .snapshot()
        .mouse_down(button));
    native!(module, services, "mousePressed", |s, button: i64| s
        .input
        .mouse_pressed(button));
    native!(module, services, "mouseReleased", |s, button: i64| s
        .input
        .mouse_released(button));
    native!(module, services, "mouseWheel", |s| {
        let (x, y) = s.input.snapshot().wheel();
        pos_map(x, y)
    });

    native!(module, services, "padCount", |s| s.input.snapshot().pad_count() as i64);
    native!(module, services, "padConnected", |s, pad: i64| s
        .input
        .snapshot()
        .pad_connected(pad));
    native!(module, services, "padButtonDown", |s, pad: i64, button: i64| s
        .input
        .snapshot()
        .pad_button_down(pad, button));
    native!(module, services, "padButtonPressed", |s, pad: i64, button: i64| s
        .input
        .pad_button_pressed(pad, button));
    native!(module, services, "padButtonReleased", |s, pad: i64, button: i64| s
        .input
        .pad_button_released(pad, button));
    native!(module, services, "padAxis", |s, pad: i64, axis: i64| f64::from(
        s.input.snapshot().pad_axis(pad, axis)
    ));

    module
}
