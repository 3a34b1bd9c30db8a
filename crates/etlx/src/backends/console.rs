//! 🖥️ Console — the sink for people who like to watch.
//!
//! Rendered payloads go to stdout through a BufWriter. Logs go to stderr (that's the
//! subscriber's business), so piping `etlx` into `jq` just works. 🦆

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{self, AsyncWriteExt};

use crate::backends::{CommonSinkConfig, Sink};
use crate::renderers::RenderFormat;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConsoleSinkConfig {
    #[serde(default)]
    pub format: RenderFormat,
    #[serde(flatten, default)]
    pub common_config: CommonSinkConfig,
}

/// 🖥️ Writes payloads to stdout. Flushes on close, like a polite guest.
#[derive(Debug)]
pub(crate) struct ConsoleSink {
    stdout: io::BufWriter<io::Stdout>,
}

impl ConsoleSink {
    pub(crate) fn new() -> Self {
        Self {
            stdout: io::BufWriter::new(io::stdout()),
        }
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    async fn send(&mut self, payload: String) -> Result<()> {
        self.stdout
            .write_all(payload.as_bytes())
            .await
            .context("💀 stdout stopped listening. Rude, but it happens (closed pipe?).")
    }

    async fn close(&mut self) -> Result<()> {
        self.stdout
            .flush()
            .await
            .context("💀 stdout would not flush. The last few rows are stuck in the pipes.")
    }
}
