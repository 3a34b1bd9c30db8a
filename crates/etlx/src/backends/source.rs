use anyhow::Result;
use async_trait::async_trait;

use crate::app_config::SourceConfig;
use crate::backends::{defaults, file, in_mem};

/// 🚰 Where one entity's rows come from, a page of NDJSON at a time.
///
/// # Contract 📜
/// - `Some(page)`: one or more JSON objects, one per line, not yet typed.
///   The `RowDecoder` turns them into rows against the entity's schema.
/// - `None`: the source is exhausted and stays exhausted.
/// - Errors are fatal for the entity; the supervisor's `ErrorMode` decides what happens next.
#[async_trait]
pub(crate) trait Source: std::fmt::Debug + Send {
    /// 📄 Fetch the next raw page of data.
    ///
    /// Returns `Ok(Some(page))` while data flows, `Ok(None)` when the tap runs dry,
    /// `Err(...)` when something has gone sideways, sidelong, or fully upside-down.
    async fn next_page(&mut self) -> Result<Option<String>>;
}

/// 🎭 One enum arm per source kind, opened from a [`SourceConfig`].
#[derive(Debug)]
pub(crate) enum SourceBackend {
    InMemory(in_mem::InMemorySource),
    File(file::FileSource),
    Defaults(defaults::DefaultsSource),
}

impl SourceBackend {
    /// 🏗️ Open whatever `config` describes.
    pub(crate) async fn from_config(config: &SourceConfig) -> Result<Self> {
        Ok(match config {
            SourceConfig::InMemory(inline) => Self::InMemory(in_mem::InMemorySource::new(inline.clone())),
            SourceConfig::File(file_config) => {
                Self::File(file::FileSource::new(file_config.clone()).await?)
            }
            SourceConfig::Defaults => Self::Defaults(defaults::DefaultsSource::default()),
        })
    }
}

#[async_trait]
impl Source for SourceBackend {
    async fn next_page(&mut self) -> Result<Option<String>> {
        match self {
            SourceBackend::InMemory(i) => i.next_page().await,
            SourceBackend::File(f) => f.next_page().await,
            SourceBackend::Defaults(d) => d.next_page().await,
        }
    }
}
