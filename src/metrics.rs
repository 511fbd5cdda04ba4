//! Timer reporting

use std::sync::{Arc, Mutex};

use tracing::info;

pub trait MetricsSink: Send {
    /// Report the total of timer `name` for a finished task
    fn timing(&mut self, name: &str, millis: u64);
}

/// Logs timings at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn timing(&mut self, name: &str, millis: u64) {
        info!(timer = %name, millis, "Timer total");
    }
}

/// Keeps timings in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CollectedMetrics {
    timings: Arc<Mutex<Vec<(String, u64)>>>,
}

impl CollectedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timings(&self) -> Vec<(String, u64)> {
        self.timings
            .lock()
            .map(|t| t.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Total reported for `name`, if any
    pub fn get(&self, name: &str) -> Option<u64> {
        self.timings()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, ms)| ms)
    }
}

impl MetricsSink for CollectedMetrics {
    fn timing(&mut self, name: &str, millis: u64) {
        let mut timings = self
            .timings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        timings.push((name.to_string(), millis));
    }
}
