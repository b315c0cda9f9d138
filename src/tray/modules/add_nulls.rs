//! AddNulls: puts a null entry under each configured key of every frame.

use crate::config::Value;
use crate::error::TrayResult;
use crate::tray::executor::DEFAULT_OUTBOX;
use crate::tray::module::{Module, ModuleIo, ModuleSetup};

pub struct AddNulls {
    keys: Vec<String>,
}

impl AddNulls {
    pub fn new(setup: &mut ModuleSetup<'_>) -> TrayResult<Self> {
        setup.add_outbox(DEFAULT_OUTBOX);
        setup.add_parameter_with_default(
            "Where",
            "Keys to add a null entry under",
            Value::List(Vec::new()),
        )?;
        Ok(Self { keys: Vec::new() })
    }
}

impl Module for AddNulls {
    fn configure(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        self.keys = io.get_parameter("Where")?;
        Ok(())
    }

    // Applies to frames of every Stop, so bypass per-Stop dispatch.
    fn process(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        let Some(mut frame) = io.pop_frame() else {
            return Ok(());
        };
        for key in &self.keys {
            frame.put(key.as_str(), Value::Null)?;
        }
        io.push_frame(frame);
        Ok(())
    }
}
