//! Demo driver.
//!
//! Builds `ManyStreamsSource → AddNulls → Dump → TrashCan`, runs the given
//! number of frames (default 12), and shuts the tray down.

use anyhow::Context as _;
use tray_rs::tray::modules::{AddNulls, Dump, ManyStreamsSource, TrashCan};
use tray_rs::{Tray, Value};

fn main() -> anyhow::Result<()> {
    tray_rs::logging::init();

    let n_frames: i64 = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse()
            .with_context(|| format!("invalid frame count {:?}", arg))?,
        None => 12,
    };

    tracing::info!("Starting tray for {} frames", n_frames);

    let mut tray = Tray::new();
    tray.add_module("source", ManyStreamsSource::new)?;
    tray.add_module("nulls", AddNulls::new)?;
    tray.add_module("dump", Dump::new)?;
    tray.add_module("trash", TrashCan::new)?;
    tray.set_parameter("source", "NFrames", n_frames)?;
    tray.set_parameter("nulls", "Where", Value::from(vec!["foo", "bar"]))?;
    tracing::debug!("Modules: {:?}", tray.module_names());

    let ticks = match tray.run() {
        Ok(ticks) => ticks,
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            tray.abort()?;
            return Err(e.into());
        }
    };

    tray.finish()?;
    tray.dispose()?;
    tracing::info!("Done after {} ticks", ticks);
    Ok(())
}
