//! Arcanee Tracing
//!
//! Logging for the runtime core: leveled macros over a global dispatch,
//! pluggable sinks, an in-memory ring buffer for crash reporting, and
//! deterministic spam control (per-frame line cap, coalescing of repeated
//! messages).
//!
//! The audio callback thread must never log; every sink write may take a
//! lock and allocate.

// crate-specific lint exceptions:
//#![allow()]

pub mod dispatch;
mod sink;

pub use dispatch::{set_frame_counter, set_frame_line_cap, set_max_level, Dispatch};
pub use sink::{LogRecord, LogSink, RingBufferSink, StderrSink};

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Error = 1,
    Warn,
    Info,
    Debug,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }
}

/// Upper bound on the records the dispatch lets through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LevelFilter {
    Off = 0,
    Error,
    Warn,
    Info,
    Debug,
}

impl LevelFilter {
    fn accepts(self, level: Level) -> bool {
        (level as usize) <= (self as usize)
    }
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::dispatch::log($crate::Level::Error, module_path!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::dispatch::log($crate::Level::Warn, module_path!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::dispatch::log($crate::Level::Info, module_path!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::dispatch::log($crate::Level::Debug, module_path!(), format_args!($($arg)*))
    };
}
