//! Headless cartridge lifecycle: load, tick, fault, stop, reload purge.

use std::fs;
use std::path::Path;

use arc_cartridge::CartridgeState;
use arc_core::ErrorCategory;
use arc_input::InputSystem;
use arc_runtime::{open_cart, CartridgeHandle, LoadedCartridge};

const DT: f64 = 1.0 / 60.0;

fn write_cart(dir: &Path, manifest: &str, main: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("cartridge.toml"), manifest).unwrap();
    fs::write(dir.join("main.rhai"), main).unwrap();
}

fn load(dir: &Path, user_data: &Path) -> LoadedCartridge {
    LoadedCartridge::load(
        open_cart(dir).unwrap(),
        user_data,
        60,
        true,
        CartridgeHandle {
            renderer: None,
            input: InputSystem::new(0.15, 0.05),
        },
    )
    .unwrap()
}

const MANIFEST: &str = r#"
id = "com.example.lifecycle"
api_version = "0.1"

[permissions]
save_storage = true
"#;

#[test]
fn boots_ticks_and_observes_fixed_dt() {
    let tmp = tempfile::tempdir().unwrap();
    let cart = tmp.path().join("cart");
    write_cart(
        &cart,
        MANIFEST,
        r#"
        fn init() {
            this.ticks = 0;
            this.bad_dt = false;
            fs::writeText("save:/booted", "yes");
        }
        fn update(dt) {
            this.ticks += 1;
            if dt != 1.0 / 60.0 { this.bad_dt = true; }
        }
        fn draw(alpha) {
            if alpha < 0.0 || alpha > 1.0 { throw "alpha out of range"; }
            fs::writeText("save:/ticks", `${this.ticks}:${this.bad_dt}`);
        }
        "#,
    );
    let mut cartridge = load(&cart, &tmp.path().join("data"));
    assert_eq!(cartridge.state(), CartridgeState::Running);

    // A steady frame runs one tick; a 100 ms stall runs exactly 4 and
    // drops the rest.
    cartridge.advance_with_delta(DT);
    cartridge.advance_with_delta(0.100);
    cartridge.advance_with_delta(DT);

    let services = cartridge.services().clone();
    let recorded = services.borrow().vfs.read_text("save:/ticks").unwrap();
    assert_eq!(recorded, "6:false");
    assert_eq!(
        services.borrow().vfs.read_text("save:/booted").unwrap(),
        "yes"
    );
}

#[test]
fn update_errors_fault_the_cartridge_and_preserve_state() {
    let tmp = tempfile::tempdir().unwrap();
    let cart = tmp.path().join("cart");
    write_cart(
        &cart,
        MANIFEST,
        r#"
        fn init() {}
        fn update(dt) { throw "boom"; }
        fn draw(alpha) {}
        "#,
    );
    let mut cartridge = load(&cart, &tmp.path().join("data"));
    cartridge.advance_with_delta(DT);
    assert_eq!(cartridge.state(), CartridgeState::Faulted);
    let fault = cartridge.fault().unwrap();
    assert_eq!(fault.category, ErrorCategory::RuntimeError);
    assert!(fault.message.contains("boom"));

    // Faulted cartridges no longer tick.
    cartridge.advance_with_delta(DT);
    assert_eq!(cartridge.state(), CartridgeState::Faulted);
}

#[test]
fn missing_entry_points_fault_on_load() {
    let tmp = tempfile::tempdir().unwrap();
    let cart = tmp.path().join("cart");
    write_cart(&cart, MANIFEST, "fn init() {}\nfn update(dt) {}\n");
    let cartridge = load(&cart, &tmp.path().join("data"));
    assert_eq!(cartridge.state(), CartridgeState::Faulted);
    assert_eq!(
        cartridge.fault().unwrap().category,
        ErrorCategory::MissingEntryPoints
    );
}

#[test]
fn binding_failures_set_last_error_and_return_failure_values() {
    let tmp = tempfile::tempdir().unwrap();
    let cart = tmp.path().join("cart");
    write_cart(
        &cart,
        MANIFEST,
        r#"
        fn init() {
            // Traversal must fail without touching the host filesystem.
            let text = fs::readText("cart:/../etc/passwd");
            if text != () { throw "traversal returned data"; }
            let err = sys::getLastError();
            if !err.contains("cart:/../etc/passwd") { throw "missing last error"; }

            // Degenerate shapes: safe no-op plus last error.
            sys::clearLastError();
            if gfx::arc(0.0, 0.0, -1.0, 0.0, 1.0, false) { throw "bad arc accepted"; }
            if sys::getLastError() == "" { throw "arc did not set last error"; }

            // Rejected blend modes.
            if gfx::setBlendMode("hue") { throw "hue accepted"; }

            // Invalid handles return failure values, not exceptions.
            if gfx::setTarget(42) { throw "bogus surface accepted"; }
            audio::freeSound(9999); // idempotent no-op
        }
        fn update(dt) {}
        fn draw(alpha) {}
        "#,
    );
    let cartridge = load(&cart, &tmp.path().join("data"));
    assert_eq!(cartridge.state(), CartridgeState::Running);
}

#[test]
fn stop_purges_every_owned_handle() {
    let tmp = tempfile::tempdir().unwrap();
    let cart = tmp.path().join("cart");
    write_cart(
        &cart,
        MANIFEST,
        r#"
        fn init() {
            for i in 0..10 {
                if gfx::createSurface(64, 64) == 0 { throw "surface failed"; }
            }
            let stops = [#{offset: 0.0, color: 0xFF000000}, #{offset: 1.0, color: 0xFFFFFFFF}];
            for i in 0..3 {
                if gfx::createLinearGradient(0.0, 0.0, 1.0, 0.0, stops, "pad") == 0 {
                    throw "gradient failed";
                }
            }
            if gfx3d::createScene() == 0 { throw "scene failed"; }
        }
        fn update(dt) {}
        fn draw(alpha) {}
        "#,
    );
    let mut cartridge = load(&cart, &tmp.path().join("data"));
    assert_eq!(cartridge.state(), CartridgeState::Running);
    assert_eq!(cartridge.outstanding_handles(), 14);

    cartridge.advance_with_delta(DT);
    let handle = cartridge.stop();
    assert_eq!(cartridge.state(), CartridgeState::Unloaded);
    assert_eq!(cartridge.outstanding_handles(), 0);

    // Reload with the preserved handle: a fresh instance boots clean.
    let reloaded = LoadedCartridge::load(
        open_cart(&cart).unwrap(),
        &tmp.path().join("data"),
        60,
        true,
        handle,
    )
    .unwrap();
    assert_eq!(reloaded.state(), CartridgeState::Running);
    assert_eq!(reloaded.outstanding_handles(), 14);
}

#[test]
fn pause_freezes_and_step_runs_one_tick() {
    let tmp = tempfile::tempdir().unwrap();
    let cart = tmp.path().join("cart");
    write_cart(
        &cart,
        MANIFEST,
        r#"
        fn init() { this.ticks = 0; }
        fn update(dt) { this.ticks += 1; }
        fn draw(alpha) { fs::writeText("save:/ticks", `${this.ticks}`); }
        "#,
    );
    let mut cartridge = load(&cart, &tmp.path().join("data"));
    cartridge.advance_with_delta(DT);
    cartridge.pause();
    assert_eq!(cartridge.state(), CartridgeState::Paused);

    // Paused frames do not tick.
    cartridge.advance_with_delta(DT);
    cartridge.advance_with_delta(DT);
    let services = cartridge.services().clone();
    assert_eq!(services.borrow().vfs.read_text("save:/ticks").unwrap(), "1");

    // Step runs exactly one tick and re-pauses.
    cartridge.step();
    assert_eq!(cartridge.state(), CartridgeState::Paused);
    assert_eq!(services.borrow().vfs.read_text("save:/ticks").unwrap(), "2");

    cartridge.resume();
    assert_eq!(cartridge.state(), CartridgeState::Running);
}

#[test]
fn deterministic_rng_is_seeded_from_the_cartridge_id() {
    let tmp = tempfile::tempdir().unwrap();
    let cart = tmp.path().join("cart");
    write_cart(
        &cart,
        MANIFEST,
        r#"
        fn init() {
            let first = sys::rand();
            sys::srand(1234);
            let a = sys::rand();
            sys::srand(1234);
            let b = sys::rand();
            if a != b { throw "srand not deterministic"; }
            fs::writeText("save:/first", `${first}`);
        }
        fn update(dt) {}
        fn draw(alpha) {}
        "#,
    );
    let cartridge = load(&cart, &tmp.path().join("data"));
    assert_eq!(cartridge.state(), CartridgeState::Running);
    let services = cartridge.services().clone();
    let first = services.borrow().vfs.read_text("save:/first").unwrap();

    // Same cartridge id, same unseeded sequence, run to run.
    let tmp2 = tempfile::tempdir().unwrap();
    let cart2 = tmp2.path().join("cart");
    write_cart(
        &cart2,
        MANIFEST,
        r#"
        fn init() { fs::writeText("save:/first", `${sys::rand()}`); }
        fn update(dt) {}
        fn draw(alpha) {}
        "#,
    );
    let cartridge2 = load(&cart2, &tmp2.path().join("data"));
    let services2 = cartridge2.services().clone();
    let first2 = services2.borrow().vfs.read_text("save:/first").unwrap();
    assert_eq!(first, first2);
}
