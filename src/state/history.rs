//! Per-task metric history.
//!
//! Keeps the last [`HISTORY_LEN`] CPU and memory readings for every task id
//! seen during the session, oldest first.

use std::collections::{HashMap, VecDeque};

/// Samples kept per task and metric.
pub const HISTORY_LEN: usize = 40;

/// Bounded CPU/memory series for one task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    pub cpu: VecDeque<f64>,
    pub mem: VecDeque<f64>,
}

impl History {
    pub fn new() -> Self {
        Self {
            cpu: VecDeque::with_capacity(HISTORY_LEN),
            mem: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    fn push(&mut self, cpu: f64, mem: f64) {
        push_bounded(&mut self.cpu, cpu);
        push_bounded(&mut self.mem, mem);
    }

    /// Number of points in the longer series.
    pub fn len(&self) -> usize {
        self.cpu.len().max(self.mem.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest value across both series, never below 1.
    pub fn scale(&self) -> f64 {
        self.cpu
            .iter()
            .chain(self.mem.iter())
            .copied()
            .fold(1.0, f64::max)
    }
}

fn push_bounded(series: &mut VecDeque<f64>, value: f64) {
    series.push_back(value);
    while series.len() > HISTORY_LEN {
        series.pop_front();
    }
}

/// Missing, negative and non-finite readings are stored as zero.
fn sanitize(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

/// Session-wide metric buffers keyed by task id.
#[derive(Debug, Default)]
pub struct TimeSeriesStore {
    series: HashMap<String, History>,
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one reading to both series of `task_id`.
    pub fn record(&mut self, task_id: &str, cpu: Option<f64>, mem: Option<f64>) {
        self.series
            .entry(task_id.to_string())
            .or_insert_with(History::new)
            .push(sanitize(cpu), sanitize(mem));
    }

    /// Current buffers for `task_id`; empty when never recorded.
    pub fn get(&self, task_id: &str) -> History {
        self.series.get(task_id).cloned().unwrap_or_default()
    }

    pub fn history(&self, task_id: &str) -> Option<&History> {
        self.series.get(task_id)
    }
}
