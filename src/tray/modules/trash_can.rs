//! TrashCan: terminal sink that drops every frame.

use crate::error::TrayResult;
use crate::tray::module::{Module, ModuleIo, ModuleSetup};

pub struct TrashCan;

impl TrashCan {
    pub fn new(_setup: &mut ModuleSetup<'_>) -> TrayResult<Self> {
        Ok(TrashCan)
    }
}

impl Module for TrashCan {
    fn process(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        if let Some(frame) = io.pop_frame() {
            tracing::trace!("{}: discarding {} frame", io.name(), frame.stop());
        }
        Ok(())
    }
}
