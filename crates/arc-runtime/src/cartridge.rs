//! Cartridge lifecycle: load, run, fault, stop, reload.
//!
//! A [`LoadedCartridge`] owns one script VM, one resource scope and the
//! fixed-timestep machinery. The CPU half of the frame (input freeze,
//! update ticks, draw recording, canvas rasterization) lives here so it
//! runs identically under the windowed runtime and the headless tests;
//! the GPU half stays in the frame loop.

use std::path::Path;
use std::rc::Rc;
use std::time::Instant;

use arc_audio::AudioSystem;
use arc_canvas::{CanvasLimits, Command, Recorder, Surface};
use arc_cartridge::{CartridgeState, EffectivePolicy, Manifest};
use arc_core::{ErrorCategory, FrameClock, Xorshift128Plus};
use arc_input::{InputSystem, MouseMapping, ViewportRect};
use arc_registry::Handle;
use arc_render::Renderer;
use arc_script::{ScriptHost, ScriptLimits};
use arc_vfs::{CartMount, SandboxLimits, Vfs};
use arc_tracing::{info, warn};

use crate::bindings;
use crate::resources::CartridgeResources;
use crate::scheduler::{Accumulator, FrameStats, TickOutcome, MAX_UPDATES_PER_FRAME};
use crate::services::{DisplayState, ProfileState, Services, Shared};
use crate::{Error, Result};

/// Why a cartridge faulted.
#[derive(Debug, Clone)]
pub struct FaultInfo {
    pub category: ErrorCategory,
    pub message: String,
}

/// Consecutive soft CPU overruns before the workbench auto-pauses.
const OVERRUN_AUTO_PAUSE_STREAK: u32 = 120;

/// Handle to the window-side pieces a reload must preserve.
pub struct CartridgeHandle {
    pub renderer: Option<Renderer>,
    pub input: InputSystem,
}

pub struct LoadedCartridge {
    pub manifest: Manifest,
    services: Shared,
    script: Option<ScriptHost>,
    state: CartridgeState,
    fault: Option<FaultInfo>,
    accumulator: Accumulator,
    overrun_streak: u32,
    dropped_warned: bool,
    /// The per-frame 2D canvas (console-sized CPU surface). Lives beside
    /// `Services` to keep the executor borrows simple.
    canvas: Option<Surface>,
}

impl LoadedCartridge {
    /// Loads a cartridge: parse the descriptor, derive the policy, mount
    /// the sandbox, bring up the VM, execute the entry script, verify the
    /// entry points and run `init()`.
    ///
    /// `handle` carries the renderer and input system across reloads; pass
    /// `None` for the renderer in headless use.
    pub fn load(
        cart: CartMount,
        user_data_root: &Path,
        tick_hz: u32,
        dev_mode: bool,
        handle: CartridgeHandle,
    ) -> Result<Self> {
        let (toml, json) = read_descriptor(&cart);
        let manifest = Manifest::parse(toml.as_deref(), json.as_deref())?;
        let policy = EffectivePolicy::from_manifest(&manifest);

        let vfs = Vfs::mount(
            cart,
            user_data_root,
            manifest.id.as_str(),
            SandboxLimits {
                save_writes_enabled: manifest.permissions.save_storage,
                save_bytes: policy.save_bytes,
                temp_bytes: policy.temp_bytes,
            },
        )?;

        // The entry script must exist before any VM work happens.
        let entry_path = format!("cart:/{}", manifest.entry);
        if !vfs.exists(&entry_path).unwrap_or(false) {
            return Err(Error::Cartridge(arc_cartridge::Error::InvalidField {
                field: "entry",
                reason: format!("{} does not exist", entry_path),
            }));
        }

        let audio = if manifest.permissions.audio {
            match AudioSystem::new(policy.audio_channels) {
                Ok(audio) => Some(audio),
                Err(err) => {
                    warn!("audio unavailable: {}", err);
                    None
                }
            }
        } else {
            None
        };

        let CartridgeHandle { mut renderer, input } = handle;
        let (console_w, console_h) = manifest.display.preset.console_size(manifest.display.aspect);
        if let Some(renderer) = renderer.as_mut() {
            if renderer.console_size() != (console_w, console_h) {
                renderer.set_console_size(console_w, console_h);
            }
            renderer.set_scaling_mode(manifest.display.scaling);
        }
        let display_size = renderer
            .as_ref()
            .map(Renderer::drawable_size)
            .unwrap_or((console_w, console_h));

        let canvas = Surface::new(console_w, console_h, policy.max_surface_dim)
            .map_err(|err| Error::Platform(err.to_string()))?;

        let services = Services {
            cartridge_id: manifest.id.clone(),
            policy: policy.clone(),
            dev_mode,
            vfs,
            resources: CartridgeResources::new(&policy),
            recorder: Recorder::new(CanvasLimits {
                path_segments_soft: policy.path_segments_soft,
                path_segments_hard: policy.path_segments_hard,
                save_stack_depth: policy.save_stack_depth,
            }),
            input,
            audio,
            renderer,
            rng: Xorshift128Plus::seeded_from_str(manifest.id.as_str()),
            clock: FrameClock::new(),
            tick_hz,
            frame_count: 0,
            tick_count: 0,
            display: DisplayState {
                console_size: (console_w, console_h),
                display_size,
                aspect: manifest.display.aspect,
                preset: manifest.display.preset,
                scaling: manifest.display.scaling,
                allow_user_override: manifest.display.allow_user_override(),
                pending_scaling: None,
                pending_console: None,
            },
            gfx_font: None,
            active_scene: 0,
            render_requests_this_frame: 0,
            pending_capture: None,
            reload_requested: false,
            profile: ProfileState::default(),
        }
        .shared();

        let mut cartridge = Self {
            manifest,
            services: services.clone(),
            script: None,
            state: CartridgeState::Unloaded,
            fault: None,
            accumulator: Accumulator::new(tick_hz, MAX_UPDATES_PER_FRAME),
            overrun_streak: 0,
            dropped_warned: false,
            canvas: Some(canvas),
        };

        cartridge.transition(CartridgeState::Loading);
        match cartridge.boot(&entry_path, services, dev_mode, &policy) {
            Ok(()) => Ok(cartridge),
            Err(err) => {
                // Loading faults leave a diagnosable cartridge behind.
                cartridge.fault_with(categorize(&err), err.to_string());
                Ok(cartridge)
            }
        }
    }

    fn boot(
        &mut self,
        entry_path: &str,
        services: Shared,
        dev_mode: bool,
        policy: &EffectivePolicy,
    ) -> Result<()> {
        let limits = ScriptLimits {
            max_operations: policy.script_ops_per_update,
            hang_deadline: std::time::Duration::from_millis(policy.hang_watchdog_ms),
            max_call_levels: policy.script_max_call_levels,
            max_string_size: policy.script_max_string_size,
            max_array_size: policy.script_max_array_size,
            max_map_size: policy.script_max_map_size,
        };
        let loader_services = services.clone();
        let loader = Rc::new(move |path: &str| {
            loader_services
                .borrow()
                .vfs
                .read_text(path)
                .map_err(|err| err.to_string())
        });
        let mut script = ScriptHost::new(&limits, loader);
        bindings::register_all(script.engine_mut(), &services, dev_mode);

        let entry_source = services
            .borrow()
            .vfs
            .read_text(entry_path)
            .map_err(Error::Vfs)?;
        script.load_entry(entry_path, &entry_source)?;

        self.script = Some(script);
        self.transition(CartridgeState::Initialized);

        self.script
            .as_mut()
            .expect("just installed")
            .call_init()
            .map_err(Error::Script)?;
        self.transition(CartridgeState::Running);
        info!("cartridge {} running", self.manifest.id);
        Ok(())
    }

    pub fn services(&self) -> &Shared {
        &self.services
    }

    pub fn state(&self) -> CartridgeState {
        self.state
    }

    pub fn fault(&self) -> Option<&FaultInfo> {
        self.fault.as_ref()
    }

    fn transition(&mut self, next: CartridgeState) {
        debug_assert!(
            self.state.can_transition(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    fn fault_with(&mut self, category: ErrorCategory, message: String) {
        arc_tracing::error!("cartridge fault ({}): {}", category, message);
        if self.state.can_transition(CartridgeState::Faulted) {
            self.transition(CartridgeState::Faulted);
        } else {
            self.state = CartridgeState::Faulted;
        }
        self.fault = Some(FaultInfo { category, message });
    }

    pub fn pause(&mut self) {
        if self.state == CartridgeState::Running {
            self.transition(CartridgeState::Paused);
        }
    }

    pub fn resume(&mut self) {
        if self.state == CartridgeState::Paused {
            // Wall time spent paused is discarded, not accumulated.
            self.services.borrow_mut().clock.discard_elapsed();
            self.transition(CartridgeState::Running);
        }
    }

    /// Runs exactly one tick while paused, then stays paused.
    pub fn step(&mut self) -> FrameStats {
        if self.state != CartridgeState::Paused {
            return FrameStats::default();
        }
        self.transition(CartridgeState::Running);
        let dt = self.accumulator.dt_fixed();
        let stats = self.advance_with_delta(dt);
        if self.state == CartridgeState::Running {
            self.transition(CartridgeState::Paused);
        }
        stats
    }

    /// The CPU half of one host frame: clock, input freeze, update ticks,
    /// draw recording, canvas rasterization.
    pub fn advance(&mut self) -> FrameStats {
        let frame_dt = self.services.borrow_mut().clock.begin_frame();
        self.advance_with_delta(frame_dt)
    }

    /// Test hook and `step()` body: advance with an explicit delta.
    pub fn advance_with_delta(&mut self, frame_dt: f64) -> FrameStats {
        let mut stats = FrameStats::default();

        // Freeze the input snapshot every tick of this frame observes.
        {
            let mut services = self.services.borrow_mut();
            let frame = services.clock.frame_counter();
            services.begin_frame(frame);
            arc_tracing::set_frame_counter(frame);
            stats.frame = frame;

            let mapping = mouse_mapping(&services);
            services.input.freeze(&mapping);
            if let Some(audio) = services.audio.as_mut() {
                audio.pump();
            }
        }

        let outcome = if self.state == CartridgeState::Running {
            self.accumulator.advance(frame_dt)
        } else {
            TickOutcome {
                ticks: 0,
                alpha: 0.0,
                dropped_time: false,
            }
        };
        if outcome.dropped_time && !self.dropped_warned {
            warn!("frame budget exceeded: dropping accumulated simulation time");
            self.dropped_warned = true;
        }

        // Update ticks: same snapshot, dt exactly 1/tick_hz each.
        let dt_fixed = self.accumulator.dt_fixed();
        for _ in 0..outcome.ticks {
            self.services.borrow_mut().tick_count += 1;
            let started = Instant::now();
            let result = self
                .script
                .as_mut()
                .map(|script| script.call_update(dt_fixed))
                .unwrap_or(Ok(()));
            let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
            stats.update_ms += elapsed_ms;
            stats.ticks += 1;

            if let Err(err) = result {
                self.fault_with(err.category(), err.to_string());
                return stats;
            }

            let budget = self.services.borrow().policy.cpu_ms_per_update;
            if elapsed_ms > budget {
                self.overrun_streak += 1;
                warn!(
                    "update exceeded its CPU budget: {:.2} ms (soft limit {:.2} ms)",
                    elapsed_ms, budget
                );
                let dev_mode = self.services.borrow().dev_mode;
                if dev_mode && self.overrun_streak >= OVERRUN_AUTO_PAUSE_STREAK {
                    warn!("auto-pausing after {} consecutive overruns", self.overrun_streak);
                    self.overrun_streak = 0;
                    self.pause();
                    break;
                }
            } else {
                self.overrun_streak = 0;
            }
        }

        // Draw once per frame while live; commands record into a cleared
        // buffer, then the executor rasterizes.
        if self.state.is_live() {
            {
                let mut services = self.services.borrow_mut();
                services.recorder.clear();
                services.gfx_font = None;
            }
            let started = Instant::now();
            let result = self
                .script
                .as_mut()
                .map(|script| script.call_draw(outcome.alpha))
                .unwrap_or(Ok(()));
            stats.draw_ms = started.elapsed().as_secs_f64() * 1_000.0;
            if let Err(err) = result {
                self.fault_with(err.category(), err.to_string());
                return stats;
            }

            self.rasterize_canvas(&mut stats);
        }

        stats
    }

    /// Replays the command buffer, splitting runs at target switches.
    fn rasterize_canvas(&mut self, stats: &mut FrameStats) {
        let mut services = self.services.borrow_mut();
        if services.recorder.take_soft_budget_warning() {
            warn!(
                "path segment soft budget exceeded ({} segments this frame)",
                services.recorder.segment_count()
            );
        }
        stats.canvas_commands = services.recorder.len();
        stats.canvas_segments = services.recorder.segment_count();

        let services = &mut *services;
        let owner = services.cartridge_id.clone();
        let commands = services.recorder.commands();

        let canvas = self.canvas.as_mut().expect("canvas exists while loaded");
        canvas.clear_transparent();

        let mut run_start = 0;
        let mut target: i64 = 0;
        let mut flush = |start: usize, end: usize, target: i64| {
            if start >= end {
                return;
            }
            let run = &commands[start..end];
            if target == 0 {
                arc_canvas::execute(run, canvas);
            } else if let Ok(surface) = services
                .resources
                .surfaces
                .get_mut(Handle::from_raw(target), &owner)
            {
                arc_canvas::execute(run, surface);
            }
        };
        for (index, command) in commands.iter().enumerate() {
            match command {
                Command::SetTarget(next) => {
                    flush(run_start, index, target);
                    target = *next;
                    run_start = index + 1;
                }
                Command::ResetTarget => {
                    flush(run_start, index, target);
                    target = 0;
                    run_start = index + 1;
                }
                _ => {}
            }
        }
        flush(run_start, commands.len(), target);
    }

    /// Stop: quiesce audio, destroy every owned handle, wipe `temp:/`,
    /// drop the VM. The registry must report zero outstanding handles
    /// before the state machine reaches `Unloaded`.
    pub fn stop(&mut self) -> CartridgeHandle {
        if self.state.can_transition(CartridgeState::Stopped) {
            self.transition(CartridgeState::Stopped);
        } else {
            self.state = CartridgeState::Stopped;
        }

        let handle = {
            let mut services = self.services.borrow_mut();
            if let Some(audio) = services.audio.as_mut() {
                let _ = audio.stop_all();
                audio.pump();
            }
            let owner = services.cartridge_id.clone();
            services.resources.destroy_all(&owner);
            services.active_scene = 0;
            services.gfx_font = None;
            services.recorder.clear();
            if let Err(err) = services.vfs.clear_temp() {
                warn!("temp:/ cleanup failed: {}", err);
            }
            debug_assert_eq!(services.resources.outstanding(), 0);

            CartridgeHandle {
                renderer: services.renderer.take(),
                input: std::mem::replace(
                    &mut services.input,
                    InputSystem::new(0.15, 0.05),
                ),
            }
        };

        // The VM is destroyed before Unloaded.
        if let Some(mut script) = self.script.take() {
            script.clear_module_cache();
        }
        self.transition(CartridgeState::Unloaded);
        handle
    }

    /// Outstanding handle count, for the stop/reload invariant.
    pub fn outstanding_handles(&self) -> u32 {
        self.services.borrow().resources.outstanding()
    }

    /// This frame's rasterized 2D canvas.
    pub fn canvas(&self) -> Option<&Surface> {
        self.canvas.as_ref()
    }

    /// Recreates the canvas surface after a console-mode switch.
    pub fn resize_canvas(&mut self, width: u32, height: u32) {
        let max_dim = self.services.borrow().policy.max_surface_dim;
        if let Ok(surface) = Surface::new(width, height, max_dim) {
            self.canvas = Some(surface);
        }
    }
}

/// Reads the descriptor pair straight off the cart mount, before the
/// sandbox exists.
fn read_descriptor(cart: &CartMount) -> (Option<String>, Option<String>) {
    let read = |name: &str| -> Option<String> {
        let path = arc_vfs::VfsPath::parse(&format!("cart:/{}", name)).ok()?;
        match cart {
            CartMount::Dir(mount) => mount.read(&path).ok(),
            CartMount::Archive(mount) => mount.read(&path).ok(),
        }
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    };
    (read("cartridge.toml"), read("cartridge.json"))
}

fn mouse_mapping(services: &Services) -> MouseMapping {
    let (viewport, mode) = match services.renderer.as_ref() {
        Some(renderer) => {
            let viewport = renderer.viewport();
            (
                ViewportRect {
                    x: viewport.x,
                    y: viewport.y,
                    w: viewport.w,
                    h: viewport.h,
                },
                viewport.mode,
            )
        }
        None => (
            ViewportRect {
                x: 0,
                y: 0,
                w: services.display.console_size.0,
                h: services.display.console_size.1,
            },
            services.display.scaling,
        ),
    };
    MouseMapping {
        viewport,
        console: services.display.console_size,
        mode,
    }
}

fn categorize(err: &Error) -> ErrorCategory {
    match err {
        Error::Script(err) => err.category(),
        Error::Vfs(err) => err.category(),
        Error::Cartridge(_) => ErrorCategory::InvalidArgument,
        Error::Render(_) => ErrorCategory::DeviceError,
        Error::Platform(_) | Error::Fault(_) => ErrorCategory::RuntimeError,
    }
}
