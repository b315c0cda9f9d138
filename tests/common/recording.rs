//! Modules that record what the tray does to them

use super::EventLog;
use std::sync::{Arc, Mutex};
use tray_rs::{Frame, Module, ModuleIo, ModuleSetup, Phase, Stop, TrayResult};

fn note(log: &EventLog, name: &str, what: impl std::fmt::Display) {
    log.lock().unwrap().push(format!("{}:{}", name, what));
}

/// Logs every phase call as `name:Phase` and forwards every frame.
pub struct Recorder {
    log: EventLog,
}

impl Recorder {
    fn phase(&self, io: &ModuleIo<'_>, phase: Phase) -> TrayResult<()> {
        note(&self.log, io.name(), phase);
        Ok(())
    }
}

impl Module for Recorder {
    fn configure(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        self.phase(io, Phase::Configure)
    }

    fn process(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        if let Some(frame) = io.pop_frame() {
            note(&self.log, io.name(), Phase::Process);
            io.push_frame(frame);
        }
        Ok(())
    }

    fn suspend(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        self.phase(io, Phase::Suspend)
    }

    fn resume(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        self.phase(io, Phase::Resume)
    }

    fn reconfigure(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        self.phase(io, Phase::Reconfigure)
    }

    fn finish(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        self.phase(io, Phase::Finish)
    }

    fn dispose(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        self.phase(io, Phase::Dispose)
    }

    fn abort(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        self.phase(io, Phase::Abort)
    }
}

/// Factory for a `Recorder` declaring `outboxes`.
pub fn recorder(
    log: &EventLog,
    outboxes: &[&str],
) -> impl FnOnce(&mut ModuleSetup<'_>) -> TrayResult<Recorder> + Send + 'static {
    let log = Arc::clone(log);
    let outboxes: Vec<String> = outboxes.iter().map(|s| s.to_string()).collect();
    move |setup: &mut ModuleSetup<'_>| {
        for name in outboxes {
            setup.add_outbox(name);
        }
        Ok(Recorder { log })
    }
}

/// Emits the same batch of frames on every process call.
///
/// Each planned frame goes to the named outbox, or is broadcast when the
/// target is `None`. Frames carry a running `id`.
pub struct Emitter {
    log: EventLog,
    plan: Vec<(Option<String>, Stop)>,
    next_id: i64,
}

impl Module for Emitter {
    fn process(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        note(&self.log, io.name(), Phase::Process);
        for (target, stop) in &self.plan {
            let mut frame = Frame::new(*stop);
            frame.put("id", self.next_id)?;
            self.next_id += 1;
            match target {
                Some(outbox) => io.push_frame_to(frame, outbox)?,
                None => io.push_frame(frame),
            }
        }
        Ok(())
    }
}

pub fn emitter(
    log: &EventLog,
    outboxes: &[&str],
    plan: &[(Option<&str>, Stop)],
) -> impl FnOnce(&mut ModuleSetup<'_>) -> TrayResult<Emitter> + Send + 'static {
    let log = Arc::clone(log);
    let outboxes: Vec<String> = outboxes.iter().map(|s| s.to_string()).collect();
    let plan: Vec<(Option<String>, Stop)> = plan
        .iter()
        .map(|&(target, stop)| (target.map(str::to_string), stop))
        .collect();
    move |setup: &mut ModuleSetup<'_>| {
        for name in outboxes {
            setup.add_outbox(name);
        }
        Ok(Emitter {
            log,
            plan,
            next_id: 0,
        })
    }
}

/// Keeps a copy of every frame it pops, then forwards it.
pub struct Collector {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl Module for Collector {
    fn process(&mut self, io: &mut ModuleIo<'_>) -> TrayResult<()> {
        if let Some(frame) = io.pop_frame() {
            self.frames.lock().unwrap().push(frame.clone());
            io.push_frame(frame);
        }
        Ok(())
    }
}

pub type FrameSink = Arc<Mutex<Vec<Frame>>>;

/// Factory for a terminal `Collector` plus the handle to what it saw.
pub fn collector() -> (
    FrameSink,
    impl FnOnce(&mut ModuleSetup<'_>) -> TrayResult<Collector> + Send + 'static,
) {
    let frames: FrameSink = Arc::new(Mutex::new(Vec::new()));
    let handle = Arc::clone(&frames);
    (handle, move |_: &mut ModuleSetup<'_>| Ok(Collector { frames }))
}
