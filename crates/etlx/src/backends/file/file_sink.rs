use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::{
    fs::File,
    io::{self, AsyncWriteExt},
};
use tracing::trace;

use crate::backends::{CommonSinkConfig, Sink};
use crate::renderers::RenderFormat;

// -- 📝 where rendered rows land on disk, and in which dialect.
// -- `{entity}` in the file name becomes the entity's name, so one config can feed many files.
#[derive(Debug, Deserialize, Clone)]
pub struct FileSinkConfig {
    pub file_name: String,
    #[serde(default)]
    pub format: RenderFormat,
    #[serde(flatten, default)]
    pub common_config: CommonSinkConfig,
}

impl FileSinkConfig {
    /// 📂 The actual path for `entity`.
    pub fn path_for(&self, entity: &str) -> String {
        self.file_name.replace("{entity}", entity)
    }
}

/// 📝 FileSink — appends rendered payloads to one file per entity, buffered.
///
/// The renderer already decided what the bytes look like; this only writes them.
/// ⚠️ An existing file at the path is truncated on open. Yesterday's export is today's empty file.
#[derive(Debug)]
pub(crate) struct FileSink {
    file_buf: io::BufWriter<File>,
    path: String,
}

impl FileSink {
    /// 🚀 Create (or truncate) the entity's file.
    pub(crate) async fn new(sink_config: FileSinkConfig, entity: &str) -> Result<Self> {
        let path = sink_config.path_for(entity);
        let file_handle = File::create(&path).await.with_context(|| {
            format!(
                "💀 Could not create '{}' for output. Does its directory exist, and may we write there?",
                path
            )
        })?;
        Ok(Self {
            file_buf: io::BufWriter::new(file_handle),
            path,
        })
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn send(&mut self, payload: String) -> Result<()> {
        trace!("📝 {} bytes into '{}'", payload.len(), self.path);
        self.file_buf
            .write_all(payload.as_bytes())
            .await
            .with_context(|| format!("💀 Writing to '{}' failed. The disk had other plans.", self.path))
    }

    /// 🧻 Flush what's still buffered. There is no async Drop to do it for us.
    async fn close(&mut self) -> Result<()> {
        trace!("🧻 flushing '{}'", self.path);
        self.file_buf.flush().await.with_context(|| {
            format!(
                "💀 The last rows for '{}' never made it out of the buffer.",
                self.path
            )
        })
    }
}
