//! Per-edge frame queue.

use crate::tray::frame::Frame;
use std::collections::VecDeque;

/// Unbounded FIFO of frames. One exists per edge; pushes never fail.
#[derive(Debug, Default)]
pub struct FrameQueue {
    frames: VecDeque<Frame>,
    /// Total frames ever pushed, for diagnostics.
    pushed: u64,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
        self.pushed += 1;
    }

    #[inline]
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    /// Look at the next frame without removing it.
    pub fn peek(&self) -> Option<&Frame> {
        self.frames.front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    /// Drop all queued frames, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let n = self.frames.len();
        self.frames.clear();
        n
    }
}
