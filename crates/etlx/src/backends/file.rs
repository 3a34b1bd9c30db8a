// ai
//! 📂 NDJSON on disk, both directions.
//!
//! The source pages through a file with a `BufReader`, closing a page on a record cap or
//! a byte cap. The sink writes each payload into a `BufWriter` and flushes on close.
//! 💀 A record with no trailing newline is still a record. A full disk is still a full disk.

mod file_sink;
mod file_source;

pub(crate) use file_sink::FileSink;
pub use file_sink::FileSinkConfig;
pub(crate) use file_source::FileSource;
pub use file_source::FileSourceConfig;
