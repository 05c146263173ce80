//! The script-visible API surface.
//!
//! Each submodule builds one rhai static module (`sys`, `fs`, `inp`,
//! `gfx`, `gfx3d`, `audio`, and `dev` in dev mode). Every binding follows
//! the same contract: rhai enforces arity and base types, the body
//! validates handles, ranges and finiteness, and any failure sets the
//! thread-confined last error and returns the documented failure value
//! instead of throwing.

mod audio;
mod consts;
mod dev;
mod fs;
mod gfx;
mod gfx3d;
mod inp;
mod sys;

use rhai::Engine;

use crate::services::Shared;

/// Registers the whole API on a cartridge engine.
pub fn register_all(engine: &mut Engine, services: &Shared, dev_mode: bool) {
    engine.register_static_module("sys", sys::module(services).into());
    engine.register_static_module("fs", fs::module(services).into());
    engine.register_static_module("inp", inp::module(services).into());
    engine.register_static_module("gfx", gfx::module(services).into());
    engine.register_static_module("gfx3d", gfx3d::module(services).into());
    engine.register_static_module("audio", audio::module(services).into());
    engine.register_static_module("consts", consts::module().into());
    if dev_mode {
        engine.register_static_module("dev", dev::module(services).into());
    }
}

/// Binds a native function that borrows the shared services.
macro_rules! native {
    ($module:expr, $services:expr, $name:literal, |$s:ident $(, $arg:ident : $ty:ty)*| $body:expr) => {{
        let shared = $services.clone();
        $module.set_native_fn($name, move |$($arg: $ty),*| {
            #[allow(unused_mut)]
            let mut $s = shared.borrow_mut();
            Ok::<_, Box<rhai::EvalAltResult>>($body)
        });
    }};
}
pub(crate) use native;
