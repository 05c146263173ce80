//! Arcanee Registry
//!
//! Every native resource a cartridge can touch lives behind an opaque
//! integer handle in a typed pool. `0` is never a valid handle; freeing is
//! idempotent; stale handles are caught by a generation check; every
//! resolution also verifies the owning cartridge. Pools are owned by the
//! main thread and only ever accessed from it.

// crate-specific lint exceptions:
//#![allow()]

mod budget;
mod pool;

pub use budget::MemoryBudget;
pub use pool::{Handle, Pool};

use arc_core::ErrorCategory;
use thiserror::Error;

/// An error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{pool} pool exhausted (limit {limit})")]
    Exhausted { pool: &'static str, limit: u32 },
    #[error("invalid {pool} handle {raw}")]
    InvalidHandle { pool: &'static str, raw: i64 },
    #[error("{budget} budget exceeded ({used} + {requested} > {limit} bytes)")]
    BudgetExceeded {
        budget: &'static str,
        used: u64,
        requested: u64,
        limit: u64,
    },
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Exhausted { .. } | Self::BudgetExceeded { .. } => ErrorCategory::QuotaExceeded,
            Self::InvalidHandle { .. } => ErrorCategory::InvalidHandle,
        }
    }
}

/// A result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
