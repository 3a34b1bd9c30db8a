//! 🔌 Backends — the two ends of an entity's run: where rows come from, where rendered rows go.
//!
//! 🧠 Knowledge graph:
//! - Sources: inline rows (`InMemory`), an NDJSON file (`File`), one row of field defaults (`Defaults`).
//! - Sinks: captured in memory for the report (`InMemory`), a file per entity (`File`), stdout (`Console`).
//! - Each kind is a trait impl; `SourceBackend` / `SinkBackend` enums dispatch to them.
//! - Sources hand out raw NDJSON pages, the `RowDecoder` types them. Sinks take finished
//!   payloads, the renderers write them. Neither end knows a field from a hole in the ground.
//! - A backend's config struct sits in the backend's own file.
//!
//! 🦆

mod common_config;
mod console;
mod defaults;
mod file;
mod in_mem;
mod sink;
mod source;

pub use common_config::{CommonSinkConfig, CommonSourceConfig};
pub use console::ConsoleSinkConfig;
pub use file::{FileSinkConfig, FileSourceConfig};
pub use in_mem::{InMemorySinkConfig, InMemorySourceConfig};

pub(crate) use in_mem::CapturedPayloads;
pub(crate) use sink::{Sink, SinkBackend, max_request_size_bytes, render_format};
pub(crate) use source::{Source, SourceBackend};
