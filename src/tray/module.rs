//! Module abstraction for the tray.
//!
//! A module is one node of the processing graph. Concrete modules implement
//! `Module` and override only the phases and Stops they care about; every
//! default is either a no-op (lifecycle phases) or a pass-through (Stop
//! handlers), so a module that overrides nothing forwards every frame
//! unchanged.
//!
//! The engine talks to a module exclusively through two handles:
//! - **`ModuleSetup`**: given to the module's factory at construction, used to
//!   declare outboxes and parameters.
//! - **`ModuleIo`**: given to every phase call, used to pop the inbox, push
//!   onto outboxes, read parameters and services.

use crate::config::{Configuration, FromValue, Value};
use crate::error::{TrayError, TrayResult};
use crate::tray::context::Context;
use crate::tray::frame::{Frame, Stop};
use crate::tray::id::QueueId;
use crate::tray::outbox::OutboxTable;
use crate::tray::queue::FrameQueue;
use crate::tray::usage::{PhysicsUsage, UsageTimer};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The operation `Tray::do_phase` invokes on a module and its subgraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Configure,
    Process,
    Suspend,
    Resume,
    Reconfigure,
    Finish,
    Dispose,
    Abort,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Configure => "Configure",
            Phase::Process => "Process",
            Phase::Suspend => "Suspend",
            Phase::Resume => "Resume",
            Phase::Reconfigure => "Reconfigure",
            Phase::Finish => "Finish",
            Phase::Dispose => "Dispose",
            Phase::Abort => "Abort",
        };
        f.write_str(name)
    }
}

/// Explicitly registered handler for one Stop. Bypasses the gate and the
/// trait's handler for that Stop entirely.
pub type StopHandler = Box<dyn FnMut(Frame, &mut ModuleIo<'_>) -> TrayResult<()> + Send>;

/// Capability interface implemented by every module.
pub trait Module: Send {
    /// Read parameters and prepare. The inbox is bound only after this
    /// returns, so popping here always yields nothing.
    fn configure(&mut self, _io: &mut ModuleIo<'_>) -> TrayResult<()> {
        Ok(())
    }

    /// One tick. The default pops a single frame and routes it by Stop.
    fn process(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        dispatch_stop(self, io)
    }

    fn suspend(&mut self, _io: &mut ModuleIo<'_>) -> TrayResult<()> {
        Ok(())
    }

    fn resume(&mut self, _io: &mut ModuleIo<'_>) -> TrayResult<()> {
        Ok(())
    }

    /// Called after the driver changed parameters mid-run.
    fn reconfigure(&mut self, _io: &mut ModuleIo<'_>) -> TrayResult<()> {
        Ok(())
    }

    fn finish(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        tracing::trace!("{}: finish", io.name());
        Ok(())
    }

    fn dispose(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        tracing::trace!("{}: dispose", io.name());
        Ok(())
    }

    fn abort(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        tracing::trace!("{}: abort", io.name());
        Ok(())
    }

    // ── Stop gates and handlers ──

    fn should_do_physics(&mut self, _frame: &Frame) -> bool {
        true
    }

    fn physics(&mut self, frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        io.push_frame(frame);
        Ok(())
    }

    fn should_do_geometry(&mut self, _frame: &Frame) -> bool {
        true
    }

    fn geometry(&mut self, frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        io.push_frame(frame);
        Ok(())
    }

    fn should_do_calibration(&mut self, _frame: &Frame) -> bool {
        true
    }

    fn calibration(&mut self, frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        io.push_frame(frame);
        Ok(())
    }

    fn should_do_detector_status(&mut self, _frame: &Frame) -> bool {
        true
    }

    fn detector_status(&mut self, frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        io.push_frame(frame);
        Ok(())
    }

    fn should_do_monitoring(&mut self, _frame: &Frame) -> bool {
        true
    }

    fn monitoring(&mut self, frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        io.push_frame(frame);
        Ok(())
    }

    fn should_do_time_cal(&mut self, _frame: &Frame) -> bool {
        true
    }

    fn time_cal(&mut self, frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        io.push_frame(frame);
        Ok(())
    }

    fn should_do_other_stops(&mut self, _frame: &Frame) -> bool {
        true
    }

    fn other_stops(&mut self, frame: Frame, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        io.push_frame(frame);
        Ok(())
    }
}

/// Pop one frame and route it: registered handler first, then the gate and
/// handler pair for its Stop, otherwise pass it through unchanged.
///
/// Physics handler calls are counted and their CPU time accumulated.
pub fn dispatch_stop<M: Module + ?Sized>(module: &mut M, io: &mut ModuleIo<'_>) -> TrayResult<()> {
    let Some(frame) = io.pop_frame() else {
        return Ok(());
    };
    let stop = frame.stop();

    if let Some(mut handler) = io.handlers.remove(&stop) {
        let result = handler(frame, io);
        // A handler may have replaced itself while running
        io.handlers.entry(stop).or_insert(handler);
        return result;
    }

    match stop {
        Stop::Physics => {
            if module.should_do_physics(&frame) {
                let timer = UsageTimer::start();
                io.usage.ncall = io.usage.ncall.saturating_add(1);
                let result = module.physics(frame, io);
                timer.stop(&mut *io.usage);
                result
            } else {
                io.push_frame(frame);
                Ok(())
            }
        }
        Stop::Geometry => {
            if module.should_do_geometry(&frame) {
                module.geometry(frame, io)
            } else {
                io.push_frame(frame);
                Ok(())
            }
        }
        Stop::Calibration => {
            if module.should_do_calibration(&frame) {
                module.calibration(frame, io)
            } else {
                io.push_frame(frame);
                Ok(())
            }
        }
        Stop::DetectorStatus => {
            if module.should_do_detector_status(&frame) {
                module.detector_status(frame, io)
            } else {
                io.push_frame(frame);
                Ok(())
            }
        }
        Stop::Monitoring => {
            if module.should_do_monitoring(&frame) {
                module.monitoring(frame, io)
            } else {
                io.push_frame(frame);
                Ok(())
            }
        }
        Stop::TimeCal => {
            if module.should_do_time_cal(&frame) {
                module.time_cal(frame, io)
            } else {
                io.push_frame(frame);
                Ok(())
            }
        }
        Stop::Other => {
            if module.should_do_other_stops(&frame) {
                module.other_stops(frame, io)
            } else {
                io.push_frame(frame);
                Ok(())
            }
        }
    }
}

/// Handle passed to a module's factory while it is being constructed.
pub struct ModuleSetup<'a> {
    pub(crate) name: &'a str,
    pub(crate) configuration: &'a mut Configuration,
    pub(crate) outboxes: &'a mut Vec<String>,
    pub(crate) context: &'a Context,
}

impl<'a> ModuleSetup<'a> {
    /// Instance name of the module being built.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Declare an outbox. Declaring the same name twice is harmless.
    pub fn add_outbox(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.outboxes.contains(&name) {
            self.outboxes.push(name);
        }
    }

    /// Declare a parameter with no default.
    pub fn add_parameter(&mut self, name: &str, description: &str) -> TrayResult<()> {
        self.configuration
            .add(name, description, None)
            .map_err(TrayError::logged)
    }

    /// Declare a parameter with a default value.
    pub fn add_parameter_with_default(
        &mut self,
        name: &str,
        description: &str,
        default: impl Into<Value>,
    ) -> TrayResult<()> {
        self.configuration
            .add(name, description, Some(default.into()))
            .map_err(TrayError::logged)
    }

    pub fn context(&self) -> &Context {
        self.context
    }
}

/// Handle passed to every phase call.
///
/// Borrows the module's slice of engine state for the duration of the call:
/// its inbox, its outboxes and their queues, its configuration and context.
pub struct ModuleIo<'a> {
    pub(crate) name: &'a str,
    pub(crate) inbox: Option<QueueId>,
    pub(crate) outboxes: &'a OutboxTable,
    pub(crate) queues: &'a mut [FrameQueue],
    pub(crate) configuration: &'a Configuration,
    pub(crate) context: &'a Arc<Context>,
    pub(crate) handlers: &'a mut HashMap<Stop, StopHandler>,
    pub(crate) usage: &'a mut PhysicsUsage,
    pub(crate) suspension_requested: &'a mut bool,
}

impl<'a> ModuleIo<'a> {
    pub fn name(&self) -> &str {
        self.name
    }

    /// Take the oldest frame from the inbox. `None` when the inbox is empty
    /// or not bound yet.
    pub fn pop_frame(&mut self) -> Option<Frame> {
        let inbox = self.inbox?;
        self.queues.get_mut(inbox.index())?.pop()
    }

    /// Number of frames waiting in the inbox.
    pub fn inbox_len(&self) -> usize {
        self.inbox
            .and_then(|q| self.queues.get(q.index()))
            .map_or(0, FrameQueue::len)
    }

    /// Broadcast a frame to every outbox, in declaration order. Each edge
    /// gets its own copy. With no outboxes the frame is dropped.
    pub fn push_frame(&mut self, frame: Frame) {
        let targets: Vec<(QueueId, &str)> = self
            .outboxes
            .iter()
            .map(|b| (b.queue, b.name.as_str()))
            .collect();
        let Some(((last, last_name), rest)) = targets.split_last() else {
            tracing::trace!("{}: no outboxes, dropping {} frame", self.name, frame.stop());
            return;
        };
        for (queue, name) in rest {
            self.queues[queue.index()].push(frame.clone());
            tracing::trace!("{}: pushed frame onto \"{}\"", self.name, name);
        }
        self.queues[last.index()].push(frame);
        tracing::trace!("{}: pushed frame onto \"{}\"", self.name, last_name);
    }

    /// Push a frame onto one named, wired outbox.
    ///
    /// An unknown name or a declared box with no downstream module is a
    /// wiring error and nothing is queued. Broadcast via `push_frame` still
    /// treats unwired boxes as sinks.
    pub fn push_frame_to(&mut self, frame: Frame, outbox: &str) -> TrayResult<()> {
        let Some(target) = self.outboxes.get(outbox) else {
            return Err(TrayError::UnknownOutbox {
                module: self.name.to_string(),
                outbox: outbox.to_string(),
            }
            .logged());
        };
        if !target.is_wired() {
            return Err(TrayError::UnwiredOutbox {
                module: self.name.to_string(),
                outbox: outbox.to_string(),
            }
            .logged());
        }
        self.queues[target.queue.index()].push(frame);
        tracing::trace!("{}: pushed frame onto \"{}\"", self.name, outbox);
        Ok(())
    }

    /// Outbox names in declaration order.
    pub fn outbox_names(&self) -> Vec<&str> {
        self.outboxes.names()
    }

    pub fn configuration(&self) -> &Configuration {
        self.configuration
    }

    /// Typed value of one of this module's parameters.
    pub fn get_parameter<T: FromValue>(&self, name: &str) -> TrayResult<T> {
        self.configuration.get(name).map_err(TrayError::logged)
    }

    pub fn context(&self) -> &Context {
        self.context
    }

    /// Look up a resource in this module's context.
    pub fn get_service<T: Any + Send + Sync>(&self, name: &str) -> TrayResult<Arc<T>> {
        self.context.get(name)
    }

    /// Route every frame on `stop` to `handler` instead of the trait methods.
    pub fn register<F>(&mut self, stop: Stop, handler: F)
    where
        F: FnMut(Frame, &mut ModuleIo<'_>) -> TrayResult<()> + Send + 'static,
    {
        self.handlers.insert(stop, Box::new(handler));
    }

    /// Ask the driver to stop ticking after the current tick completes.
    pub fn request_suspension(&mut self) {
        tracing::debug!("{}: requested suspension", self.name);
        *self.suspension_requested = true;
    }

    /// Physics counters accumulated so far.
    pub fn usage(&self) -> PhysicsUsage {
        *self.usage
    }
}
