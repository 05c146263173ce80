//! Global log dispatch.
//!
//! A single process-wide [`Dispatch`] receives every record produced by the
//! logging macros, applies the level filter and the deterministic spam
//! policy, and fans the surviving records out to the registered sinks.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};

use crate::{Level, LevelFilter, LogRecord, LogSink};

/// Default per-frame line cap; see [`set_frame_line_cap`].
pub const DEFAULT_FRAME_LINE_CAP: u32 = 64;

static GLOBAL: Lazy<Dispatch> = Lazy::new(Dispatch::new);

pub struct Dispatch {
    start: Instant,
    max_level: AtomicUsize,
    frame: AtomicU64,
    frame_line_cap: AtomicUsize,
    sinks: RwLock<Vec<Arc<dyn LogSink>>>,
    spam: Mutex<SpamState>,
}

/// Bookkeeping for the per-frame cap and repeat coalescing.
#[derive(Default)]
struct SpamState {
    frame: u64,
    emitted: u32,
    suppressed: u64,
    last_message: Option<(Level, String)>,
    repeats: u64,
}

impl Dispatch {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            max_level: AtomicUsize::new(LevelFilter::Info as usize),
            frame: AtomicU64::new(0),
            frame_line_cap: AtomicUsize::new(DEFAULT_FRAME_LINE_CAP as usize),
            sinks: RwLock::new(Vec::new()),
            spam: Mutex::new(SpamState::default()),
        }
    }

    pub fn global() -> &'static Self {
        &GLOBAL
    }

    pub fn add_sink(&self, sink: Arc<dyn LogSink>) {
        self.sinks.write().push(sink);
    }

    pub fn clear_sinks(&self) {
        self.sinks.write().clear();
    }

    fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Publishes the scheduler's frame counter. Also flushes the repeat and
    /// suppression accounting of the frame that just ended.
    pub fn set_frame_counter(&self, frame: u64) {
        let pending = {
            let mut spam = self.spam.lock();
            let pending = spam.take_flush_messages();
            spam.frame = frame;
            spam.emitted = 0;
            pending
        };
        for message in pending {
            self.emit(Level::Info, "arc_tracing", message);
        }
        self.frame.store(frame, Ordering::Relaxed);
    }

    fn emit(&self, level: Level, target: &'static str, message: String) {
        let record = LogRecord {
            level,
            time: self.elapsed(),
            frame: self.frame.load(Ordering::Relaxed),
            target,
            message,
        };
        for sink in self.sinks.read().iter() {
            sink.write(&record);
        }
    }

    fn log(&self, level: Level, target: &'static str, args: fmt::Arguments<'_>) {
        let filter = self.max_level.load(Ordering::Relaxed);
        if (level as usize) > filter {
            return;
        }

        let message = fmt::format(args);

        let mut pending = Vec::new();
        let pass = {
            let mut spam = self.spam.lock();

            // Identical consecutive messages coalesce into a repeat count.
            if let Some((last_level, last_message)) = &spam.last_message {
                if *last_level == level && *last_message == message {
                    spam.repeats += 1;
                    return;
                }
            }
            if spam.repeats > 0 {
                pending.push(format!(
                    "last message repeated {} more times",
                    spam.repeats
                ));
                spam.repeats = 0;
            }
            spam.last_message = Some((level, message.clone()));

            let cap = self.frame_line_cap.load(Ordering::Relaxed) as u32;
            if spam.emitted >= cap {
                spam.suppressed += 1;
                false
            } else {
                spam.emitted += 1;
                true
            }
        };

        for message in pending {
            self.emit(Level::Info, "arc_tracing", message);
        }
        if pass {
            self.emit(level, target, message);
        }
    }
}

impl SpamState {
    fn take_flush_messages(&mut self) -> Vec<String> {
        let mut messages = Vec::new();
        if self.repeats > 0 {
            messages.push(format!("last message repeated {} more times", self.repeats));
            self.repeats = 0;
        }
        self.last_message = None;
        if self.suppressed > 0 {
            messages.push(format!(
                "frame {}: {} log lines suppressed by the per-frame cap",
                self.frame, self.suppressed
            ));
            self.suppressed = 0;
        }
        messages
    }
}

/// Entry point used by the logging macros.
pub fn log(level: Level, target: &'static str, args: fmt::Arguments<'_>) {
    Dispatch::global().log(level, target, args);
}

pub fn set_max_level(filter: LevelFilter) {
    Dispatch::global()
        .max_level
        .store(filter as usize, Ordering::Relaxed);
}

/// Publishes the scheduler's frame counter to the dispatch.
pub fn set_frame_counter(frame: u64) {
    Dispatch::global().set_frame_counter(frame);
}

/// Caps how many records may reach the sinks within one frame.
pub fn set_frame_line_cap(cap: u32) {
    Dispatch::global()
        .frame_line_cap
        .store(cap as usize, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RingBufferSink;

    fn fresh_ring(dispatch: &Dispatch) -> Arc<RingBufferSink> {
        dispatch.clear_sinks();
        let ring = Arc::new(RingBufferSink::new(256));
        dispatch.add_sink(ring.clone());
        ring
    }

    // The dispatch is process-global, so every behavior shares one test to
    // avoid cross-test interference.
    #[test]
    fn spam_policy() {
        let dispatch = Dispatch::global();
        dispatch
            .max_level
            .store(LevelFilter::Debug as usize, Ordering::Relaxed);
        let ring = fresh_ring(dispatch);

        // Coalescing: identical consecutive messages collapse.
        dispatch.set_frame_counter(1);
        dispatch.log(Level::Info, "t", format_args!("same"));
        dispatch.log(Level::Info, "t", format_args!("same"));
        dispatch.log(Level::Info, "t", format_args!("same"));
        dispatch.log(Level::Info, "t", format_args!("other"));
        let records = ring.snapshot();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].message, "same");
        assert_eq!(records[1].message, "last message repeated 2 more times");
        assert_eq!(records[2].message, "other");

        // Per-frame cap: the cap applies within one frame counter value and
        // resets when the frame advances.
        let ring = fresh_ring(dispatch);
        dispatch.set_frame_counter(2);
        set_frame_line_cap(4);
        for i in 0..10 {
            dispatch.log(Level::Info, "t", format_args!("line {}", i));
        }
        assert_eq!(ring.len(), 4);
        dispatch.set_frame_counter(3);
        // Frame rollover reports the suppression.
        let records = ring.snapshot();
        assert!(records
            .last()
            .unwrap()
            .message
            .contains("6 log lines suppressed"));

        set_frame_line_cap(DEFAULT_FRAME_LINE_CAP);

        // Level filter.
        let ring = fresh_ring(dispatch);
        set_max_level(LevelFilter::Warn);
        dispatch.log(Level::Info, "t", format_args!("hidden"));
        dispatch.log(Level::Warn, "t", format_args!("visible"));
        let records = ring.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "visible");
        set_max_level(LevelFilter::Info);
    }
}
