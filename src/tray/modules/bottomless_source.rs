//! BottomlessSource: an endless supply of empty frames.

use crate::error::{TrayError, TrayResult};
use crate::tray::executor::DEFAULT_OUTBOX;
use crate::tray::frame::{Frame, Stop};
use crate::tray::module::{Module, ModuleIo, ModuleSetup};

/// Emits one empty frame per tick on the configured `Stream`.
pub struct BottomlessSource {
    stop: Stop,
}

impl BottomlessSource {
    pub fn new(setup: &mut ModuleSetup<'_>) -> TrayResult<Self> {
        setup.add_outbox(DEFAULT_OUTBOX);
        setup.add_parameter_with_default("Stream", "Stop of the emitted frames", "Physics")?;
        Ok(Self {
            stop: Stop::Physics,
        })
    }
}

impl Module for BottomlessSource {
    fn configure(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        let stream: String = io.get_parameter("Stream")?;
        self.stop = Stop::parse(&stream).ok_or_else(|| {
            TrayError::Config {
                module: io.name().to_string(),
                message: format!("unknown stream \"{}\"", stream),
            }
            .logged()
        })?;
        Ok(())
    }

    fn process(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        io.push_frame(Frame::new(self.stop));
        Ok(())
    }
}
