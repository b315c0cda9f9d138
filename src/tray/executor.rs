//! Tray executor: graph assembly, lifecycle, and the recursive traversal.
//!
//! The tray owns every module and every queue in flat arenas; modules refer
//! to each other only by `ModuleId`. Each edge is one queue: the producer's
//! outbox and the consumer's inbox are the same `QueueId`.
//!
//! A tick drives every root (a module with no upstream edge) through
//! `do_phase(Process)`. `do_phase` runs the module's phase call and then
//! walks its wired outboxes in declaration order:
//! - **Process**: keep calling the downstream module while the edge queue
//!   still holds frames, so everything produced on one edge is flushed
//!   through the whole subtree before the next edge is visited.
//! - **any other phase**: call the downstream module exactly once.

use crate::config::{Configuration, Value};
use crate::error::{ResultExt, TrayError, TrayResult};
use crate::tray::context::{ActiveContextGuard, Context, INBOX, INSTANCE_NAME};
use crate::tray::frame::{Frame, Stop};
use crate::tray::id::{ModuleId, QueueId};
use crate::tray::module::{Module, ModuleIo, ModuleSetup, Phase, StopHandler};
use crate::tray::outbox::{Outbox, OutboxTable};
use crate::tray::queue::FrameQueue;
use crate::tray::usage::PhysicsUsage;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Outbox name used when the tray wires modules into a chain by itself.
pub const DEFAULT_OUTBOX: &str = "OutBox";

type ModuleFactory =
    Box<dyn FnOnce(&mut ModuleSetup<'_>) -> TrayResult<Box<dyn Module>> + Send>;

fn erase_factory<M, F>(factory: F) -> ModuleFactory
where
    M: Module + 'static,
    F: FnOnce(&mut ModuleSetup<'_>) -> TrayResult<M> + Send + 'static,
{
    Box::new(move |setup: &mut ModuleSetup<'_>| {
        factory(setup).map(|module| Box::new(module) as Box<dyn Module>)
    })
}

/// Where the tray is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayState {
    /// Modules and connections are being added.
    Constructed,
    /// Modules exist and have been configured; frames can flow.
    Configured,
    Finished,
    Disposed,
    Aborted,
    /// A fatal error ended the run. Only `abort` is accepted.
    Failed,
}

impl TrayState {
    pub fn as_str(self) -> &'static str {
        match self {
            TrayState::Constructed => "constructed",
            TrayState::Configured => "configured",
            TrayState::Finished => "finished",
            TrayState::Disposed => "disposed",
            TrayState::Aborted => "aborted",
            TrayState::Failed => "failed",
        }
    }
}

/// An assembler-level edge: `from`'s outbox `outbox` feeds `to`'s inbox.
#[derive(Debug, Clone)]
pub struct Connection {
    pub from: ModuleId,
    pub outbox: String,
    pub to: ModuleId,
}

/// A module registered but not built yet.
struct PendingModule {
    name: String,
    class_name: String,
    factory: ModuleFactory,
    parameters: Vec<(String, Value)>,
}

/// A built module and everything the engine keeps for it.
pub struct ModuleSlot {
    name: String,
    module: Box<dyn Module>,
    context: Arc<Context>,
    configuration: Configuration,
    outboxes: OutboxTable,
    /// Bound after the module's configure phase.
    inbox: Option<QueueId>,
    upstream: Option<ModuleId>,
    handlers: HashMap<Stop, StopHandler>,
    usage: PhysicsUsage,
}

impl ModuleSlot {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn outboxes(&self) -> &OutboxTable {
        &self.outboxes
    }

    pub fn upstream(&self) -> Option<ModuleId> {
        self.upstream
    }

    /// Physics call count and CPU time.
    pub fn report_usage(&self) -> PhysicsUsage {
        self.usage
    }
}

/// The module graph and its driver.
pub struct Tray {
    names: HashMap<String, ModuleId>,
    pending: Vec<PendingModule>,
    connections: Vec<Connection>,
    modules: Vec<ModuleSlot>,
    queues: Vec<FrameQueue>,
    /// Modules without an upstream edge, in insertion order.
    roots: Vec<ModuleId>,
    services: Context,
    state: TrayState,
    suspension_requested: bool,
    ticks: u64,
}

impl Default for Tray {
    fn default() -> Self {
        Self::new()
    }
}

impl Tray {
    pub fn new() -> Self {
        Self {
            names: HashMap::new(),
            pending: Vec::new(),
            connections: Vec::new(),
            modules: Vec::new(),
            queues: Vec::new(),
            roots: Vec::new(),
            services: Context::new("tray"),
            state: TrayState::Constructed,
            suspension_requested: false,
            ticks: 0,
        }
    }

    pub fn state(&self) -> TrayState {
        self.state
    }

    /// Root ticks performed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn require(&self, operation: &'static str, allowed: &[TrayState]) -> TrayResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(TrayError::InvalidState {
                operation,
                state: self.state.as_str(),
            }
            .logged())
        }
    }

    /// Mark the run as failed when `result` is an error.
    fn track<T>(&mut self, result: TrayResult<T>) -> TrayResult<T> {
        if result.is_err() {
            self.state = TrayState::Failed;
        }
        result
    }

    // ── Graph assembly ──

    /// Make a resource visible in every module's context.
    pub fn add_service<T: Any + Send + Sync>(
        &mut self,
        name: impl Into<String>,
        service: T,
    ) -> TrayResult<()> {
        self.require("add a service", &[TrayState::Constructed])?;
        self.services.put(name, service);
        Ok(())
    }

    /// Make an already shared resource visible in every module's context.
    /// The caller keeps its own handle and can observe the resource.
    pub fn add_shared_service<T: Any + Send + Sync>(
        &mut self,
        name: impl Into<String>,
        service: Arc<T>,
    ) -> TrayResult<()> {
        self.require("add a service", &[TrayState::Constructed])?;
        self.services.put_shared(name, service);
        Ok(())
    }

    /// Register a module. The factory runs when the tray is configured.
    pub fn add_module<M, F>(&mut self, name: impl Into<String>, factory: F) -> TrayResult<ModuleId>
    where
        M: Module + 'static,
        F: FnOnce(&mut ModuleSetup<'_>) -> TrayResult<M> + Send + 'static,
    {
        self.require("add a module", &[TrayState::Constructed])?;
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(TrayError::DuplicateModule(name).logged());
        }
        let class_name = std::any::type_name::<M>()
            .rsplit("::")
            .next()
            .unwrap_or("Module")
            .to_string();

        let id = ModuleId(self.pending.len() as u32);
        tracing::debug!("Adding module \"{}\" ({}) as {}", name, class_name, id);
        self.names.insert(name.clone(), id);
        self.pending.push(PendingModule {
            name,
            class_name,
            factory: erase_factory(factory),
            parameters: Vec::new(),
        });
        Ok(id)
    }

    pub fn module_id(&self, name: &str) -> TrayResult<ModuleId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| TrayError::UnknownModule(name.to_string()).logged())
    }

    /// Set a parameter on a module.
    ///
    /// Before configuration the value is stored and applied once the module
    /// has declared its parameters. Afterwards it is applied immediately and
    /// takes effect on the next `reconfigure`.
    pub fn set_parameter(
        &mut self,
        module: &str,
        name: &str,
        value: impl Into<Value>,
    ) -> TrayResult<()> {
        let id = self.module_id(module)?;
        match self.state {
            TrayState::Constructed => {
                self.pending[id.index()]
                    .parameters
                    .push((name.to_string(), value.into()));
                Ok(())
            }
            TrayState::Configured => self.modules[id.index()]
                .configuration
                .set(name, value.into())
                .map_err(TrayError::logged),
            _ => self.require("set a parameter", &[TrayState::Constructed, TrayState::Configured]),
        }
    }

    /// Wire `from`'s outbox to `to`'s inbox.
    pub fn connect_boxes(&mut self, from: &str, outbox: &str, to: &str) -> TrayResult<()> {
        self.require("connect boxes", &[TrayState::Constructed])?;
        let from_id = self.module_id(from)?;
        let to_id = self.module_id(to)?;

        if from_id == to_id {
            return Err(
                TrayError::InvalidConnection(format!("\"{}\" cannot feed itself", from)).logged(),
            );
        }
        if self
            .connections
            .iter()
            .any(|c| c.from == from_id && c.outbox == outbox)
        {
            return Err(TrayError::InvalidConnection(format!(
                "outbox \"{}\" of \"{}\" is already connected",
                outbox, from
            ))
            .logged());
        }
        if let Some(existing) = self.connections.iter().find(|c| c.to == to_id) {
            return Err(TrayError::InvalidConnection(format!(
                "\"{}\" already has an inbox fed by \"{}\"",
                to,
                self.pending[existing.from.index()].name
            ))
            .logged());
        }
        if self.would_create_cycle(from_id, to_id) {
            return Err(TrayError::CycleDetected {
                from: from.to_string(),
                to: to.to_string(),
            }
            .logged());
        }

        tracing::debug!("Connecting {}:{} -> {}", from, outbox, to);
        self.connections.push(Connection {
            from: from_id,
            outbox: outbox.to_string(),
            to: to_id,
        });
        Ok(())
    }

    /// Check whether `to` already reaches `from` (DFS over connections).
    fn would_create_cycle(&self, from: ModuleId, to: ModuleId) -> bool {
        let mut visited = vec![false; self.pending.len()];
        let mut stack = vec![to];

        while let Some(current) = stack.pop() {
            if current == from {
                return true;
            }
            if visited[current.index()] {
                continue;
            }
            visited[current.index()] = true;
            for conn in &self.connections {
                if conn.from == current {
                    stack.push(conn.to);
                }
            }
        }

        false
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    // ── Building ──

    /// Chain every module's `OutBox` to the next one when nothing was wired.
    fn wire_default_chain(&mut self) {
        if !self.connections.is_empty() || self.pending.len() < 2 {
            return;
        }
        tracing::info!("No connections given, chaining modules in insertion order");
        for i in 1..self.pending.len() {
            self.connections.push(Connection {
                from: ModuleId(i as u32 - 1),
                outbox: DEFAULT_OUTBOX.to_string(),
                to: ModuleId(i as u32),
            });
        }
    }

    fn build(&mut self) -> TrayResult<()> {
        self.wire_default_chain();
        let pending = std::mem::take(&mut self.pending);

        // Queue i is module i's inbox
        let mut queues: Vec<FrameQueue> = pending.iter().map(|_| FrameQueue::new()).collect();
        let mut modules = Vec::with_capacity(pending.len());

        for (index, entry) in pending.into_iter().enumerate() {
            let id = ModuleId(index as u32);

            let mut context = self.services.with_owner(entry.name.clone());
            context.put(INBOX, QueueId(index as u32));
            context.put(INSTANCE_NAME, entry.name.clone());

            let mut configuration = Configuration::new(entry.name.clone(), entry.class_name.clone());
            let mut declared = Vec::new();
            let module = {
                let mut setup = ModuleSetup {
                    name: &entry.name,
                    configuration: &mut configuration,
                    outboxes: &mut declared,
                    context: &context,
                };
                (entry.factory)(&mut setup)
                    .with_context(|| format!("building module \"{}\"", entry.name))?
            };

            for (key, value) in entry.parameters {
                configuration.set(&key, value).map_err(TrayError::logged)?;
            }
            tracing::debug!("{}", configuration.inspect().trim_end());

            let outboxes = self.build_outboxes(id, &entry.name, &declared, &mut queues);
            let upstream = self
                .connections
                .iter()
                .find(|c| c.to == id)
                .map(|c| c.from);

            modules.push(ModuleSlot {
                name: entry.name,
                module,
                context: Arc::new(context),
                configuration,
                outboxes,
                inbox: None,
                upstream,
                handlers: HashMap::new(),
                usage: PhysicsUsage::default(),
            });
        }

        self.roots = modules
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.upstream.is_none())
            .map(|(i, _)| ModuleId(i as u32))
            .collect();
        self.modules = modules;
        self.queues = queues;

        tracing::info!(
            "Tray built: {} modules, {} edges, {} roots",
            self.modules.len(),
            self.connections.len(),
            self.roots.len()
        );
        Ok(())
    }

    /// Declared boxes first, in declaration order, then boxes the assembler
    /// connected without the module declaring them.
    fn build_outboxes(
        &self,
        id: ModuleId,
        name: &str,
        declared: &[String],
        queues: &mut Vec<FrameQueue>,
    ) -> OutboxTable {
        let mut table = OutboxTable::new();

        for box_name in declared {
            let conn = self
                .connections
                .iter()
                .find(|c| c.from == id && &c.outbox == box_name);
            let (queue, downstream) = match conn {
                Some(c) => (QueueId(c.to.0), Some(c.to)),
                None => {
                    tracing::debug!(
                        "Module \"{}\" added outbox \"{}\" which isn't connected to anything",
                        name,
                        box_name
                    );
                    queues.push(FrameQueue::new());
                    (QueueId(queues.len() as u32 - 1), None)
                }
            };
            table.insert(Outbox {
                name: box_name.clone(),
                queue,
                downstream,
                declared: true,
            });
        }

        for conn in self.connections.iter().filter(|c| c.from == id) {
            if declared.contains(&conn.outbox) {
                continue;
            }
            tracing::debug!(
                "Module \"{}\" never declared outbox \"{}\" but it is connected",
                name,
                conn.outbox
            );
            table.insert(Outbox {
                name: conn.outbox.clone(),
                queue: QueueId(conn.to.0),
                downstream: Some(conn.to),
                declared: false,
            });
        }

        table
    }

    // ── Traversal ──

    /// Run `phase` on `id`, then on its downstream subgraph.
    pub fn do_phase(&mut self, id: ModuleId, phase: Phase) -> TrayResult<()> {
        let slot = self
            .modules
            .get_mut(id.index())
            .ok_or_else(|| TrayError::UnknownModule(id.to_string()).logged())?;

        {
            let _active = ActiveContextGuard::activate(Arc::clone(&slot.context));
            let mut io = ModuleIo {
                name: &slot.name,
                inbox: slot.inbox,
                outboxes: &slot.outboxes,
                queues: &mut self.queues,
                configuration: &slot.configuration,
                context: &slot.context,
                handlers: &mut slot.handlers,
                usage: &mut slot.usage,
                suspension_requested: &mut self.suspension_requested,
            };
            let module = &mut slot.module;
            match phase {
                Phase::Configure => module.configure(&mut io)?,
                Phase::Process => module.process(&mut io)?,
                Phase::Suspend => module.suspend(&mut io)?,
                Phase::Resume => module.resume(&mut io)?,
                Phase::Reconfigure => module.reconfigure(&mut io)?,
                Phase::Finish => module.finish(&mut io)?,
                Phase::Dispose => module.dispose(&mut io)?,
                Phase::Abort => module.abort(&mut io)?,
            }
        }

        if phase == Phase::Configure {
            slot.inbox = Some(*slot.context.get::<QueueId>(INBOX)?);
        }

        for (queue, downstream) in slot.outboxes.wired_edges() {
            if phase == Phase::Process {
                while !self.queues[queue.index()].is_empty() {
                    let before = self.queues[queue.index()].len();
                    self.do_phase(downstream, Phase::Process)?;
                    if self.queues[queue.index()].len() >= before {
                        let name = self.modules[downstream.index()].name.clone();
                        return Err(TrayError::module(
                            name,
                            "process did not consume a frame from a non-empty inbox",
                        )
                        .logged());
                    }
                }
            } else {
                self.do_phase(downstream, phase)?;
            }
        }

        Ok(())
    }

    fn do_roots(&mut self, phase: Phase) -> TrayResult<()> {
        for i in 0..self.roots.len() {
            let root = self.roots[i];
            self.do_phase(root, phase)?;
        }
        Ok(())
    }

    // ── Lifecycle ──

    /// Build every module and run the configure phase over the graph.
    pub fn configure(&mut self) -> TrayResult<()> {
        self.require("configure", &[TrayState::Constructed])?;
        let result = self.build().and_then(|()| self.do_roots(Phase::Configure));
        self.track(result)?;
        self.state = TrayState::Configured;
        Ok(())
    }

    fn configure_if_needed(&mut self) -> TrayResult<()> {
        if self.state == TrayState::Constructed {
            self.configure()?;
        }
        Ok(())
    }

    /// One tick: drive every root through the process phase.
    pub fn tick(&mut self) -> TrayResult<()> {
        self.require("process frames", &[TrayState::Configured])?;
        let result = self.do_roots(Phase::Process);
        self.track(result)?;
        self.ticks += 1;
        Ok(())
    }

    /// Run up to `n` ticks, stopping early if a module requests suspension.
    /// Returns the number of ticks performed.
    pub fn execute(&mut self, n: u64) -> TrayResult<u64> {
        self.configure_if_needed()?;
        self.suspension_requested = false;
        let mut done = 0;
        while done < n && !self.suspension_requested {
            self.tick()?;
            done += 1;
        }
        tracing::debug!("Executed {} ticks", done);
        Ok(done)
    }

    /// Tick until a module requests suspension.
    pub fn run(&mut self) -> TrayResult<u64> {
        self.execute(u64::MAX)
    }

    pub fn suspension_requested(&self) -> bool {
        self.suspension_requested
    }

    pub fn suspend(&mut self) -> TrayResult<()> {
        self.structural("suspend", Phase::Suspend)
    }

    pub fn resume(&mut self) -> TrayResult<()> {
        self.structural("resume", Phase::Resume)
    }

    pub fn reconfigure(&mut self) -> TrayResult<()> {
        self.structural("reconfigure", Phase::Reconfigure)
    }

    fn structural(&mut self, operation: &'static str, phase: Phase) -> TrayResult<()> {
        self.require(operation, &[TrayState::Configured])?;
        let result = self.do_roots(phase);
        self.track(result)
    }

    /// Normal end of run. Logs usage for expensive modules.
    pub fn finish(&mut self) -> TrayResult<()> {
        self.require("finish", &[TrayState::Configured])?;
        let result = self.do_roots(Phase::Finish);
        self.track(result)?;
        self.state = TrayState::Finished;
        self.log_usage();
        Ok(())
    }

    pub fn dispose(&mut self) -> TrayResult<()> {
        self.require("dispose", &[TrayState::Finished])?;
        // Terminal either way
        self.state = TrayState::Disposed;
        self.do_roots(Phase::Dispose)
    }

    /// Abnormal end of run. Accepted after a failure as well.
    pub fn abort(&mut self) -> TrayResult<()> {
        self.require(
            "abort",
            &[TrayState::Configured, TrayState::Finished, TrayState::Failed],
        )?;
        self.state = TrayState::Aborted;
        self.do_roots(Phase::Abort)
    }

    fn log_usage(&self) {
        for slot in &self.modules {
            let usage = slot.usage;
            if usage.is_reportable() {
                tracing::info!(
                    "{:>40}: {:>6} calls to physics {:>9.2}s user {:>9.2}s system",
                    slot.name,
                    usage.ncall,
                    usage.user_time.as_secs_f64(),
                    usage.system_time.as_secs_f64()
                );
            } else {
                tracing::debug!("{}: {} calls to physics", slot.name, usage.ncall);
            }
        }
    }

    // ── Inspection and external input ──

    fn slot(&self, module: &str) -> TrayResult<&ModuleSlot> {
        let id = self.module_id(module)?;
        self.modules.get(id.index()).ok_or_else(|| {
            TrayError::InvalidState {
                operation: "inspect a module",
                state: self.state.as_str(),
            }
            .logged()
        })
    }

    pub fn module(&self, name: &str) -> TrayResult<&ModuleSlot> {
        self.slot(name)
    }

    pub fn module_names(&self) -> Vec<&str> {
        let mut names: Vec<(&str, ModuleId)> =
            self.names.iter().map(|(n, id)| (n.as_str(), *id)).collect();
        names.sort_by_key(|(_, id)| id.0);
        names.into_iter().map(|(n, _)| n).collect()
    }

    pub fn roots(&self) -> &[ModuleId] {
        &self.roots
    }

    pub fn usage(&self, module: &str) -> TrayResult<PhysicsUsage> {
        Ok(self.slot(module)?.usage)
    }

    /// Usage of every module, in insertion order.
    pub fn usage_report(&self) -> Vec<(String, PhysicsUsage)> {
        self.modules
            .iter()
            .map(|slot| (slot.name.clone(), slot.usage))
            .collect()
    }

    /// Frames waiting on one of a module's outboxes.
    pub fn outbox_len(&self, module: &str, outbox: &str) -> TrayResult<usize> {
        let slot = self.slot(module)?;
        let target = slot.outboxes.get(outbox).ok_or_else(|| {
            TrayError::UnknownOutbox {
                module: module.to_string(),
                outbox: outbox.to_string(),
            }
            .logged()
        })?;
        Ok(self.queues[target.queue.index()].len())
    }

    /// Frames waiting in a module's inbox.
    pub fn inbox_len(&self, module: &str) -> TrayResult<usize> {
        let id = self.module_id(module)?;
        self.slot(module)?;
        Ok(self.queues[id.index()].len())
    }

    /// Feed a frame into a module's inbox from outside the graph.
    pub fn push_frame(&mut self, module: &str, frame: Frame) -> TrayResult<()> {
        self.require("push a frame", &[TrayState::Configured])?;
        let id = self.module_id(module)?;
        self.queues[id.index()].push(frame);
        Ok(())
    }

    /// Route a module's frames on `stop` to `handler`.
    pub fn register_handler<F>(&mut self, module: &str, stop: Stop, handler: F) -> TrayResult<()>
    where
        F: FnMut(Frame, &mut ModuleIo<'_>) -> TrayResult<()> + Send + 'static,
    {
        self.require("register a handler", &[TrayState::Configured])?;
        let id = self.module_id(module)?;
        self.modules[id.index()]
            .handlers
            .insert(stop, Box::new(handler));
        Ok(())
    }
}
