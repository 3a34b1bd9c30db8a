//! 🧵 Workers: the two tokio tasks behind every written entity.
//!
//! 🚀 Two kinds, one per side of a bounded `async_channel`:
//! - [`SourceWorker`]: source → decoder → row pipeline → composers → channel (or a collection,
//!   for slaves whose rows feed a master).
//! - [`SinkWorker`]: channel → renderer → sink, flushing at the configured request size.
//!
//! 🦆

use anyhow::Result;
use tokio::task::JoinHandle;

mod sink_worker;
mod source_worker;

pub(in crate::supervisors) use sink_worker::SinkWorker;
pub(in crate::supervisors) use source_worker::{RowOutlet, SourceOutcome, SourceWorker};

/// 🏗️ Something that moves itself onto a tokio task and reports back through the handle.
pub(in crate::supervisors) trait Worker {
    type Output: Send + 'static;

    /// 🚀 Spawn. The supervisor awaits the handle; a panic surfaces as a `JoinError`.
    fn start(self) -> JoinHandle<Result<Self::Output>>;
}
