//! 🧠 Rows that never touch a disk.
//!
//! [`InMemorySource`] serves the rows written inline in the config. [`InMemorySink`] keeps
//! every payload behind an `Arc<Mutex<...>>` so the process report can hand them back,
//! which is how the end-to-end tests see what an entity wrote. 🦆

mod in_mem_sink;
mod in_mem_source;

pub(crate) use in_mem_sink::{CapturedPayloads, InMemorySink};
pub use in_mem_sink::InMemorySinkConfig;
pub(crate) use in_mem_source::InMemorySource;
pub use in_mem_source::InMemorySourceConfig;
