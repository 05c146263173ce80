//! Arcanee Core
//!
//! Cross-cutting leaf types of the runtime: the error category taxonomy and
//! the thread-confined last-error channel, the frame clock, validated
//! cartridge ids, and the deterministic script-facing RNG.

// crate-specific lint exceptions:
//#![allow()]

mod error;
mod id;
mod last_error;
mod rand;
mod time;

pub use error::ErrorCategory;
pub use id::{CartridgeId, InvalidCartridgeId};
pub use last_error::{clear_last_error, last_error, set_last_error, take_last_error};
pub use rand::Xorshift128Plus;
pub use time::FrameClock;
