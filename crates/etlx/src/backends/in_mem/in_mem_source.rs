use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::backends::Source;

/// 🧠 Rows written straight into the config, one JSON object each.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct InMemorySourceConfig {
    #[serde(default)]
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// 📄 Every inline row, re-serialized as one NDJSON page. The first call gets them all,
/// every later call gets `None`. 🍪
#[derive(Debug, Default)]
pub(crate) struct InMemorySource {
    config: InMemorySourceConfig,
    has_yielded: bool,
}

impl InMemorySource {
    pub(crate) fn new(config: InMemorySourceConfig) -> Self {
        Self {
            config,
            has_yielded: false,
        }
    }
}

#[async_trait]
impl Source for InMemorySource {
    async fn next_page(&mut self) -> Result<Option<String>> {
        if self.has_yielded || self.config.rows.is_empty() {
            return Ok(None);
        }
        self.has_yielded = true;

        let lines = self
            .config
            .rows
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .context("💀 An inline row refused to become JSON again. It was JSON a second ago.")?;
        Ok(Some(lines.join("\n")))
    }
}
