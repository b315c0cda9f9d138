//! # tray-rs: frame-stop module execution engine
//!
//! A pipeline of processing modules connected by named, queued edges. Frames
//! tagged with a Stop (Geometry, Calibration, DetectorStatus, Physics, ...)
//! travel along the edges; each module dispatches what it receives to a
//! per-Stop handler behind an overridable gate.
//!
//! ## Architecture
//!
//! - **Tray**: owns the module graph and drives it (`configure`, `execute`,
//!   `finish`, ...)
//! - **Module**: trait with default pass-through behavior for every Stop
//! - **Context**: typed name-keyed resources, plus the active-context slot
//! - **Configuration**: per-module typed parameter store
//!
//! ## Example
//!
//! ```
//! use tray_rs::tray::modules::{Dump, ManyStreamsSource, TrashCan};
//! use tray_rs::Tray;
//!
//! let mut tray = Tray::new();
//! tray.add_module("source", ManyStreamsSource::new)?;
//! tray.add_module("dump", Dump::new)?;
//! tray.add_module("trash", TrashCan::new)?;
//! tray.set_parameter("source", "NFrames", 4i64)?;
//!
//! assert_eq!(tray.run()?, 4);
//! tray.finish()?;
//! # Ok::<(), tray_rs::TrayError>(())
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod tray;

// Re-export commonly used types
pub use config::{Configuration, Value};
pub use error::{TrayError, TrayResult};
pub use tray::{Frame, Module, ModuleIo, ModuleSetup, Phase, PhysicsUsage, Stop, Tray};
