//! Arcanee Runtime
//!
//! The binding layer of the console: owns the platform window, the
//! cartridge lifecycle state machine, the fixed-timestep scheduler with
//! its budgets, the full script API surface, and the per-frame
//! orchestration from event pump to present. Everything here runs on the
//! main thread; the audio callback lives in `arc-audio` behind its
//! command queue.

// crate-specific lint exceptions:
//#![allow()]

mod bindings;
mod cartridge;
mod platform;
mod resources;
mod runtime;
mod scheduler;
mod services;

pub use cartridge::{CartridgeHandle, FaultInfo, LoadedCartridge};
pub use platform::{Platform, PlatformRequests};
pub use resources::CartridgeResources;
pub use runtime::{open_cart, Runtime};
pub use scheduler::{Accumulator, FrameStats, TickOutcome};
pub use services::{Services, Shared};

use thiserror::Error;

/// An error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("platform error: {0}")]
    Platform(String),
    #[error(transparent)]
    Vfs(#[from] arc_vfs::Error),
    #[error(transparent)]
    Cartridge(#[from] arc_cartridge::Error),
    #[error(transparent)]
    Script(#[from] arc_script::Error),
    #[error(transparent)]
    Render(#[from] arc_render::Error),
    #[error("cartridge fault: {0}")]
    Fault(String),
}

/// A result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
