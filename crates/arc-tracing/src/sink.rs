use std::collections::VecDeque;
use std::io::Write;

use parking_lot::Mutex;

use crate::Level;

/// One formatted log event as seen by the sinks.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    /// Monotonic seconds since the dispatch was initialized.
    pub time: f64,
    /// Frame counter published by the scheduler at the start of each frame.
    pub frame: u64,
    /// Module path of the call site.
    pub target: &'static str,
    pub message: String,
}

/// Destination for log records.
///
/// Sinks are called with the dispatch lock released; a sink may block or
/// allocate, which is why the audio callback is forbidden from logging.
pub trait LogSink: Send + Sync {
    fn write(&self, record: &LogRecord);
}

/// Writes timestamped lines to standard error.
#[derive(Debug, Default)]
pub struct StderrSink;

impl LogSink for StderrSink {
    fn write(&self, record: &LogRecord) {
        let stderr = std::io::stderr();
        let mut lock = stderr.lock();
        // A failed write to stderr is not recoverable in any useful way.
        let _ = writeln!(
            lock,
            "[{:10.3}] [{:6}] {:5} {}: {}",
            record.time, record.frame, record.level.as_str(), record.target, record.message
        );
    }
}

/// Keeps the last `capacity` records in memory for crash reporting.
pub struct RingBufferSink {
    capacity: usize,
    records: Mutex<VecDeque<LogRecord>>,
}

impl RingBufferSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Snapshot of the buffered records, oldest first.
    pub fn snapshot(&self) -> Vec<LogRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl LogSink for RingBufferSink {
    fn write(&self, record: &LogRecord) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_overwrites_oldest() {
        let sink = RingBufferSink::new(3);
        for i in 0..5 {
            sink.write(&LogRecord {
                level: Level::Info,
                time: 0.0,
                frame: 0,
                target: "test",
                message: format!("message {}", i),
            });
        }
        let records = sink.snapshot();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].message, "message 2");
        assert_eq!(records[2].message, "message 4");
    }
}
