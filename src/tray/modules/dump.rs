//! Dump: logs every frame it sees and forwards it.

use crate::error::TrayResult;
use crate::tray::executor::DEFAULT_OUTBOX;
use crate::tray::module::{Module, ModuleIo, ModuleSetup};

pub struct Dump {
    seen: u64,
}

impl Dump {
    pub fn new(setup: &mut ModuleSetup<'_>) -> TrayResult<Self> {
        setup.add_outbox(DEFAULT_OUTBOX);
        Ok(Self { seen: 0 })
    }
}

impl Module for Dump {
    fn process(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        let Some(frame) = io.pop_frame() else {
            return Ok(());
        };
        self.seen += 1;
        tracing::info!("{} #{}\n{}", io.name(), self.seen, frame);
        io.push_frame(frame);
        Ok(())
    }

    fn finish(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        tracing::info!("{}: dumped {} frames", io.name(), self.seen);
        Ok(())
    }
}
