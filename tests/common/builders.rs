//! Test data builders for creating frames

use tray_rs::{Frame, Stop, Value};

/// Builder for creating test Frames
pub struct FrameBuilder {
    stop: Stop,
    entries: Vec<(String, Value)>,
}

impl FrameBuilder {
    pub fn new(stop: Stop) -> Self {
        Self {
            stop,
            entries: Vec::new(),
        }
    }

    pub fn physics() -> Self {
        Self::new(Stop::Physics)
    }

    pub fn entry(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.entries.push((key.to_string(), value.into()));
        self
    }

    /// Tag the frame with an integer `id` entry.
    pub fn id(self, id: i64) -> Self {
        self.entry("id", id)
    }

    pub fn build(self) -> Frame {
        let mut frame = Frame::new(self.stop);
        for (key, value) in self.entries {
            frame.replace(key, value);
        }
        frame
    }
}

/// One frame of every Stop, each tagged with its position.
pub fn one_of_each_stop() -> Vec<Frame> {
    Stop::ALL
        .into_iter()
        .enumerate()
        .map(|(i, stop)| FrameBuilder::new(stop).id(i as i64).build())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_builder() {
        let frame = FrameBuilder::physics().id(7).entry("energy", 1.5).build();

        assert_eq!(frame.stop(), Stop::Physics);
        assert_eq!(frame.get("id").and_then(Value::as_int), Some(7));
        assert_eq!(frame.len(), 2);
    }
}
