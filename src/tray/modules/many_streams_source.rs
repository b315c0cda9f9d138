//! ManyStreamsSource: emits frames on a repeating sequence of Stops.
//!
//! Each tick creates one new frame whose Stop is the next character of
//! `Streams` (wrapping around). With `NFrames` > 0 the source asks the
//! driver to suspend once that many frames have been emitted.

use crate::error::{TrayError, TrayResult};
use crate::tray::executor::DEFAULT_OUTBOX;
use crate::tray::frame::{Frame, Stop};
use crate::tray::module::{Module, ModuleIo, ModuleSetup};

/// Default Stop sequence.
pub const DEFAULT_STREAMS: &str = "GCDPPXGCXDPP";

pub struct ManyStreamsSource {
    streams: Vec<Stop>,
    index: u64,
    n_frames: u64,
}

impl ManyStreamsSource {
    pub fn new(setup: &mut ModuleSetup<'_>) -> TrayResult<Self> {
        setup.add_outbox(DEFAULT_OUTBOX);
        setup.add_parameter_with_default(
            "Streams",
            "Stop codes to cycle through (G C D P M T X)",
            DEFAULT_STREAMS,
        )?;
        setup.add_parameter_with_default(
            "NFrames",
            "Request suspension after this many frames (0 = never)",
            0i64,
        )?;
        Ok(Self {
            streams: Vec::new(),
            index: 0,
            n_frames: 0,
        })
    }

    fn parse_streams(io: &ModuleIo<'_>, codes: &str) -> TrayResult<Vec<Stop>> {
        let streams = codes
            .chars()
            .map(|c| {
                Stop::from_char(c).ok_or_else(|| TrayError::Config {
                    module: io.name().to_string(),
                    message: format!("'{}' is not a stream code", c),
                })
            })
            .collect::<TrayResult<Vec<_>>>()
            .map_err(TrayError::logged)?;
        if streams.is_empty() {
            return Err(TrayError::Config {
                module: io.name().to_string(),
                message: "Streams must not be empty".to_string(),
            }
            .logged());
        }
        Ok(streams)
    }

    fn load(&mut self, io: &ModuleIo<'_>) -> TrayResult<()> {
        let codes: String = io.get_parameter("Streams")?;
        self.streams = Self::parse_streams(io, &codes)?;
        self.n_frames = io.get_parameter("NFrames")?;
        Ok(())
    }
}

impl Module for ManyStreamsSource {
    fn configure(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        self.load(io)
    }

    fn reconfigure(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        self.load(io)
    }

    fn process(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        if self.n_frames > 0 && self.index >= self.n_frames {
            io.request_suspension();
            return Ok(());
        }
        let stop = self.streams[(self.index % self.streams.len() as u64) as usize];
        tracing::trace!("{}: emitting {} frame #{}", io.name(), stop, self.index);
        let mut frame = Frame::new(stop);
        frame.put("index", self.index as i64)?;
        io.push_frame(frame);
        self.index += 1;
        if self.n_frames > 0 && self.index >= self.n_frames {
            io.request_suspension();
        }
        Ok(())
    }
}
