//! Arcanee Audio
//!
//! Real-time audio with a strict two-thread contract. The main thread
//! enqueues commands on a lock-free SPSC ring; the device callback drains
//! them at buffer boundaries and owns all mixer state. The callback never
//! allocates, deallocates, locks, or touches the VM, VFS or GPU: boxed
//! module decoders and sound references travel back to the main thread
//! through a garbage ring for destruction.

// crate-specific lint exceptions:
//#![allow()]

mod command;
mod mixer;
mod module;
mod sound;
mod system;

pub use command::{Command, Garbage, VoiceEvent, COMMAND_QUEUE_CAPACITY};
pub use mixer::Mixer;
pub use module::ModuleDecoder;
pub use sound::SoundData;
pub use system::{AudioSystem, ModuleDecoderFactory};

use arc_core::ErrorCategory;
use thiserror::Error;

/// An error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("audio device unavailable: {0}")]
    Device(String),
    #[error("audio command queue is full")]
    QueueFull,
    #[error("sound data could not be decoded: {0}")]
    Decode(String),
    #[error("no module decoder is available")]
    NoModuleDecoder,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Device(_) => ErrorCategory::AudioDeviceError,
            Self::QueueFull => ErrorCategory::QuotaExceeded,
            Self::Decode(_) => ErrorCategory::AssetDecodeError,
            Self::NoModuleDecoder => ErrorCategory::UnsupportedFeature,
        }
    }
}

/// A result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
