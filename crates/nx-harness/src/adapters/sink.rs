//! Reporting sinks.

use parking_lot::Mutex;
use tracing::info;

use crate::ports::LogSink;

/// Forwards every line to `tracing` at info level.
///
/// Under a test subscriber built with `with_test_writer` the lines land in
/// libtest's captured output for the test that produced them.
#[derive(Debug, Clone)]
pub struct TracingSink {
    scenario: String,
}

impl TracingSink {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
        }
    }
}

impl LogSink for TracingSink {
    fn record(&self, line: &str) {
        info!(target: "nx_harness::report", scenario = %self.scenario, "{}", line);
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// `true` if any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn record(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.record("first");
        sink.record("second");
        assert_eq!(sink.lines(), vec!["first", "second"]);
        assert!(sink.contains("sec"));
    }

    #[test]
    fn test_memory_sink_is_shared_across_threads() {
        let sink = Arc::new(MemorySink::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        sink.record(&format!("{i}-{j}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sink.len(), 100);
    }

    #[test]
    fn test_tracing_sink_accepts_lines_without_subscriber() {
        TracingSink::new("smoke").record("cont-out> hello");
    }
}
