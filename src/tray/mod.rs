//! Module graph execution engine.
//!
//! Frames flow through a static graph of modules along named, queued edges.
//! Each frame carries a Stop tag, and each module routes what it pops by
//! that tag: to a registered handler, to its own handler for the Stop, or
//! straight through to every outbox.
//!
//! # Architecture
//!
//! ```text
//! [ManyStreamsSource] ──OutBox──► [AddNulls] ──OutBox──► [Dump] ──OutBox──► [TrashCan]
//!                    └──Side───► [Dump]
//! ```
//!
//! # Design
//!
//! - **Arena + index**: `Tray` owns modules and queues in flat vectors;
//!   edges refer to modules by `ModuleId`, never by pointer.
//! - **One queue per edge**: an outbox and the downstream inbox share a
//!   `QueueId`. A module has at most one upstream edge.
//! - **Trait defaults**: `Module` supplies no-op phases and pass-through
//!   Stop handlers; modules override only what they handle.
//! - **Depth-first drain**: Process fully flushes each edge through its
//!   subtree before the next edge; other phases reach each module once.
//! - **Single-threaded**: the active-context slot is thread-local and is
//!   only valid because traversal never interleaves.

pub mod context;
pub mod executor;
pub mod frame;
pub mod id;
pub mod module;
pub mod modules;
pub mod outbox;
pub mod queue;
pub mod usage;

pub use context::{get_service, ActiveContextGuard, Context};
pub use executor::{Connection, ModuleSlot, Tray, TrayState, DEFAULT_OUTBOX};
pub use frame::{Frame, Stop};
pub use id::{ModuleId, QueueId};
pub use module::{dispatch_stop, Module, ModuleIo, ModuleSetup, Phase, StopHandler};
pub use outbox::{Outbox, OutboxTable};
pub use queue::FrameQueue;
pub use usage::{PhysicsUsage, UsageTimer, MIN_REPORT_TIME};
