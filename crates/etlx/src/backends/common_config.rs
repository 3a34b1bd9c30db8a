// ai
//! 📦 Size limits shared by every backend config.
//!
//! - `CommonSourceConfig`: page size for file sources, in records and in bytes.
//! - `CommonSinkConfig`: flattened into every sink config. How many rendered bytes the
//!   sink worker buffers before it sends.
//!
//! They live here rather than in `app_config` so backends can own their configs without
//! importing the whole application config back. 🦆

use serde::Deserialize;

/// 📦 Shared configuration embedded by source backend configs.
///
/// A page closes at whichever limit comes first. 🚰
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CommonSourceConfig {
    /// 📦 Max rows (lines) per page — the row-count speed limiter
    #[serde(default = "default_max_batch_size_docs", alias = "max_batch_size_rows")]
    pub max_batch_size_docs: usize,
    /// 📦 Max bytes per page — the byte-size speed limiter
    #[serde(default = "default_max_batch_size_bytes")]
    pub max_batch_size_bytes: usize,
}

// 📦 1,000 rows per page. a nice round number that will age like milk.
fn default_max_batch_size_docs() -> usize {
    1000
}

// 📦 1MB — 1024 * 1024. yes the comment is doing the math. you're welcome.
fn default_max_batch_size_bytes() -> usize {
    1024 * 1024
}

impl Default for CommonSourceConfig {
    fn default() -> Self {
        Self {
            max_batch_size_docs: default_max_batch_size_docs(),
            max_batch_size_bytes: default_max_batch_size_bytes(),
        }
    }
}

/// 🚰 Shared configuration embedded by every sink backend config.
///
/// The sink worker accumulates rendered batches until the buffer reaches this
/// many bytes, then sends. Whatever is left goes out on close. 💡
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CommonSinkConfig {
    /// 🚰 Max payload bytes per sink request — the flush trigger
    #[serde(default = "default_max_request_size_bytes")]
    pub max_request_size_bytes: usize,
}

// 🚰 10MB — the same limit as your email attachment policy. coincidence? absolutely yes.
fn default_max_request_size_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for CommonSinkConfig {
    fn default() -> Self {
        Self {
            max_request_size_bytes: default_max_request_size_bytes(),
        }
    }
}
