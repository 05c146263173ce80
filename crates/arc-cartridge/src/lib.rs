//! Arcanee Cartridge
//!
//! The cartridge descriptor (`cartridge.toml` / `cartridge.json`), the
//! display and permission models, the effective policy produced by merging
//! manifest caps with the runtime's own ceilings, and the lifecycle state
//! machine driven by the scheduler.

// crate-specific lint exceptions:
//#![allow()]

mod display;
mod manifest;
mod policy;
mod state;

pub use display::{AspectMode, Preset, ScalingMode};
pub use manifest::{ApiVersion, CapsRequest, DisplayPrefs, Manifest, Permissions};
pub use policy::EffectivePolicy;
pub use state::CartridgeState;

use thiserror::Error;

/// Highest cartridge API version this runtime executes.
pub const SUPPORTED_API_VERSION: ApiVersion = ApiVersion { major: 0, minor: 1 };

/// Default entry script, used when the manifest has no `entry` field.
pub const DEFAULT_ENTRY: &str = "main.rhai";

/// An error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("descriptor parse error: {0}")]
    Parse(String),
    #[error("no cartridge descriptor found (expected cartridge.toml or cartridge.json)")]
    MissingDescriptor,
    #[error("invalid cartridge id: {0}")]
    InvalidId(#[from] arc_core::InvalidCartridgeId),
    #[error("invalid api_version {found}: runtime supports at most {supported}")]
    UnsupportedApiVersion {
        found: String,
        supported: ApiVersion,
    },
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
}

/// A result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
