//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod recording;

use std::sync::{Arc, Mutex};

/// Shared, ordered log of what modules did during a run.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Snapshot of the log.
pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Position of the first entry equal to `event`.
pub fn position(log: &[String], event: &str) -> usize {
    log.iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("\"{}\" not in log {:?}", event, log))
}

/// Number of entries equal to `event`.
pub fn count(log: &[String], event: &str) -> usize {
    log.iter().filter(|e| *e == event).count()
}
