use anyhow::Result;
use async_trait::async_trait;

use crate::app_config::SinkConfig;
use crate::backends::{CapturedPayloads, console, file, in_mem};
use crate::renderers::RenderFormat;

/// 🕳️ Where one entity's rendered rows end up.
///
/// # Contract 📜
/// - `send` gets a complete payload (JSON-array framing included when that's the format)
///   and writes it as-is. Payloads arrive in row order.
/// - `close` is called exactly once, after the last `send`, by the sink worker.
#[async_trait]
pub(crate) trait Sink: std::fmt::Debug + Send {
    async fn send(&mut self, payload: String) -> Result<()>;
    /// 🧻 Flush whatever is buffered. Nothing is sent after this.
    async fn close(&mut self) -> Result<()>;
}

/// 🎭 One enum arm per sink kind, opened from a [`SinkConfig`].
#[derive(Debug)]
pub(crate) enum SinkBackend {
    InMemory(in_mem::InMemorySink),
    File(file::FileSink),
    Console(console::ConsoleSink),
}

impl SinkBackend {
    /// 🏗️ Open whatever `config` describes, for the entity named `entity`.
    pub(crate) async fn from_config(config: &SinkConfig, entity: &str) -> Result<Self> {
        Ok(match config {
            SinkConfig::InMemory(_) => Self::InMemory(in_mem::InMemorySink::new()),
            SinkConfig::File(file_config) => Self::File(file::FileSink::new(file_config.clone(), entity).await?),
            SinkConfig::Console(_) => Self::Console(console::ConsoleSink::new()),
        })
    }

    /// 🧪 The in-memory sink's vault, for the process report. Everyone else: `None`.
    pub(crate) fn captured(&self) -> Option<CapturedPayloads> {
        match self {
            SinkBackend::InMemory(sink) => Some(sink.received.clone()),
            _ => None,
        }
    }
}

/// 📐 The payload shape a sink config asks for.
pub(crate) fn render_format(config: &SinkConfig) -> RenderFormat {
    match config {
        SinkConfig::InMemory(c) => c.format,
        SinkConfig::File(c) => c.format,
        SinkConfig::Console(c) => c.format,
    }
}

/// 🚰 The flush threshold for the sink worker's payload buffer.
pub(crate) fn max_request_size_bytes(config: &SinkConfig) -> usize {
    match config {
        SinkConfig::File(c) => c.common_config.max_request_size_bytes,
        SinkConfig::InMemory(c) => c.common_config.max_request_size_bytes,
        SinkConfig::Console(c) => c.common_config.max_request_size_bytes,
    }
}

#[async_trait]
impl Sink for SinkBackend {
    async fn send(&mut self, payload: String) -> Result<()> {
        match self {
            SinkBackend::InMemory(sink) => sink.send(payload).await,
            SinkBackend::File(sink) => sink.send(payload).await,
            SinkBackend::Console(sink) => sink.send(payload).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            SinkBackend::InMemory(sink) => sink.close().await,
            SinkBackend::File(sink) => sink.close().await,
            SinkBackend::Console(sink) => sink.close().await,
        }
    }
}
