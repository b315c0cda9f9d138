//! Frames and the Stop tag they carry.
//!
//! A frame is the unit that travels along edges. Its Stop is fixed when the
//! frame is created; the payload is a small ordered key/value map. Frames
//! are moved into and out of queues, and broadcast hands each edge its own
//! clone of the same logical value.

use crate::config::Value;
use crate::error::{TrayError, TrayResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which phase of detector data a frame represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stop {
    Geometry,
    Calibration,
    DetectorStatus,
    Physics,
    Monitoring,
    TimeCal,
    Other,
}

impl Stop {
    /// Every Stop, for iteration in tests and tools.
    pub const ALL: [Stop; 7] = [
        Stop::Geometry,
        Stop::Calibration,
        Stop::DetectorStatus,
        Stop::Physics,
        Stop::Monitoring,
        Stop::TimeCal,
        Stop::Other,
    ];

    /// Single-character stream code.
    pub fn as_char(self) -> char {
        match self {
            Stop::Geometry => 'G',
            Stop::Calibration => 'C',
            Stop::DetectorStatus => 'D',
            Stop::Physics => 'P',
            Stop::Monitoring => 'M',
            Stop::TimeCal => 'T',
            Stop::Other => 'X',
        }
    }

    pub fn from_char(c: char) -> Option<Stop> {
        Stop::ALL.into_iter().find(|s| s.as_char() == c)
    }

    /// Parse a stream name, either the variant name or its one-letter code.
    pub fn parse(s: &str) -> Option<Stop> {
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Stop::from_char(c.to_ascii_uppercase());
        }
        Stop::ALL
            .into_iter()
            .find(|stop| stop.to_string().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stop::Geometry => "Geometry",
            Stop::Calibration => "Calibration",
            Stop::DetectorStatus => "DetectorStatus",
            Stop::Physics => "Physics",
            Stop::Monitoring => "Monitoring",
            Stop::TimeCal => "TimeCal",
            Stop::Other => "Other",
        };
        f.write_str(name)
    }
}

/// One record flowing through the tray.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    stop: Stop,
    entries: BTreeMap<String, Value>,
}

impl Frame {
    /// Create an empty frame on the given Stop.
    pub fn new(stop: Stop) -> Self {
        Self {
            stop,
            entries: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn stop(&self) -> Stop {
        self.stop
    }

    /// Insert a new entry. Fails if the key is already present.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) -> TrayResult<()> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(TrayError::Frame {
                stop: self.stop,
                message: format!("frame already contains key \"{}\"", key),
            }
            .logged());
        }
        self.entries.insert(key, value.into());
        Ok(())
    }

    /// Insert or overwrite an entry, returning the previous value.
    pub fn replace(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[ Frame ({}) ]", self.stop)?;
        for (key, value) in &self.entries {
            writeln!(f, "  '{}' => {}", key, value)?;
        }
        Ok(())
    }
}
