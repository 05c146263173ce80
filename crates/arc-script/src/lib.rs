//! Arcanee Script Host
//!
//! One rhai engine per cartridge, main thread only. The host owns the
//! compiled entry AST, the sandboxed `require` module loader (VFS-backed,
//! canonical-path cached, cycle-tolerant), entry-point verification, and
//! the execution budgets: a hard operation ceiling plus a wall-clock hang
//! deadline enforced through the engine's progress hook.
//!
//! The original console's dotted namespaces transpose to rhai static
//! modules, so cartridges call `sys::rand()`, `gfx::fillRect(...)` and so
//! on. `import` is disabled entirely; `require` is the only way to pull in
//! more cartridge code.

// crate-specific lint exceptions:
//#![allow()]

mod host;
mod loader;

pub use host::{ScriptHost, ScriptLimits};
pub use loader::{resolve_module_spec, ScriptLoader};

use arc_core::ErrorCategory;
use thiserror::Error;

/// An error type. Script positions ride along so faults can point at
/// `cart:/...:line`.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("compile error at {source_name}:{line}: {message}")]
    Compile {
        message: String,
        source_name: String,
        line: usize,
    },
    #[error("runtime error{}: {message}", format_position(.source_name, .line))]
    Runtime {
        message: String,
        source_name: Option<String>,
        line: Option<usize>,
    },
    #[error("script exceeded its execution budget")]
    HangDetected,
    #[error("module load failed for {spec:?}: {message}")]
    ModuleLoad { spec: String, message: String },
    #[error("missing entry points: {0}")]
    MissingEntryPoints(String),
}

fn format_position(source: &Option<String>, line: &Option<usize>) -> String {
    match (source, line) {
        (Some(source), Some(line)) => format!(" at {}:{}", source, line),
        (Some(source), None) => format!(" at {}", source),
        _ => String::new(),
    }
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Compile { .. } => ErrorCategory::CompileError,
            Self::Runtime { .. } => ErrorCategory::RuntimeError,
            Self::HangDetected => ErrorCategory::HangDetected,
            Self::ModuleLoad { .. } => ErrorCategory::ModuleLoadError,
            Self::MissingEntryPoints(_) => ErrorCategory::MissingEntryPoints,
        }
    }
}

/// A result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
