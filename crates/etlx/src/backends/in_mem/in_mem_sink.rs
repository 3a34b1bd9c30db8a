use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::backends::{CommonSinkConfig, Sink};
use crate::renderers::RenderFormat;

/// 🔒 Shared handle to everything an in-memory sink was sent.
pub(crate) type CapturedPayloads = Arc<Mutex<Vec<String>>>;

/// 🧪 In-memory sink settings. Defaults to a JSON array, the friendliest thing to assert on.
#[derive(Debug, Deserialize, Clone)]
pub struct InMemorySinkConfig {
    #[serde(default = "default_in_memory_format")]
    pub format: RenderFormat,
    #[serde(flatten, default)]
    pub common_config: CommonSinkConfig,
}

fn default_in_memory_format() -> RenderFormat {
    RenderFormat::JsonArray
}

impl Default for InMemorySinkConfig {
    fn default() -> Self {
        Self {
            format: default_in_memory_format(),
            common_config: CommonSinkConfig::default(),
        }
    }
}

/// 📦 Keeps every payload it is sent, in order, for whoever holds a [`CapturedPayloads`].
///
/// The supervisor grabs that handle before the sink moves into its worker, and reads it
/// back into the entity report once the worker is done.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemorySink {
    /// 🔒 one entry per `send`
    pub(crate) received: CapturedPayloads,
}

impl InMemorySink {
    pub(crate) fn new() -> Self {
        Self {
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn send(&mut self, payload: String) -> Result<()> {
        self.received.lock().await.push(payload);
        Ok(())
    }

    /// 🗑️ Nothing buffered, nothing to flush. 🦆
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
