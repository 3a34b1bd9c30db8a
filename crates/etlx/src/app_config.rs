//! 🔧 app_config — one TOML file (plus whatever `ETLX_*` says) becomes one [`AppConfig`].
//!
//! 📡 The process descriptor, its entities, fields and relationships ride in here too.
//! They are handed to [`crate::schema`] untouched; this module only knows how to find them.
//!
//! 🧠 Knowledge graph:
//! - [`AppConfig`] = runtime knobs + the default sink + the process descriptor.
//! - [`SourceConfig`] / [`SinkConfig`] are externally tagged enums, so TOML reads
//!   `[entities.source.File]` or `[sink_config.Console]`.
//! - Env vars (`ETLX_*`, nested with `__`) are the base layer, the TOML file wins.

use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::backends::{ConsoleSinkConfig, FileSinkConfig, FileSourceConfig, InMemorySinkConfig, InMemorySourceConfig};
use crate::schema::ProcessConfig;

/// 📦 Everything etlx needs to run a process: runtime knobs, the fallback sink and the process itself.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default, alias = "supervisor_config")]
    pub runtime: RuntimeConfig,
    /// 🚰 where entity output goes unless the entity says otherwise
    #[serde(default)]
    pub sink_config: SinkConfig,
    #[serde(default)]
    pub process: ProcessConfig,
}

/// 🎛️ Knobs for the supervisor and its workers.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// 📬 row batches allowed in flight between a source worker and its sink worker
    #[serde(default = "default_queue_capacity", alias = "channel_size")]
    pub queue_capacity: usize,
    /// 📊 draw an indicatif spinner per entity with rows in, rows out and rates
    #[serde(default = "default_progress")]
    pub progress: bool,
    /// 📂 where relative script `file` paths start. Defaults to the config file's directory.
    #[serde(default)]
    pub script_dir: Option<PathBuf>,
}

fn default_queue_capacity() -> usize {
    10
}

fn default_progress() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            progress: default_progress(),
            script_dir: None,
        }
    }
}

/// 🚰 Where an entity's rows come from.
#[derive(Debug, Deserialize, Clone)]
pub enum SourceConfig {
    /// 🧠 rows written inline in the config, one JSON object each
    InMemory(InMemorySourceConfig),
    /// 📂 an NDJSON file
    File(FileSourceConfig),
    /// 🎁 exactly one row, made entirely of field defaults
    Defaults,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::InMemory(InMemorySourceConfig::default())
    }
}

/// 🕳️ Where an entity's rows go.
#[derive(Debug, Deserialize, Clone)]
pub enum SinkConfig {
    /// 🧪 kept in memory and handed back in the process report
    InMemory(InMemorySinkConfig),
    File(FileSinkConfig),
    /// 🖥️ stdout
    Console(ConsoleSinkConfig),
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Console(ConsoleSinkConfig::default())
    }
}

/// 🚀 Figment layers: `ETLX_*` env vars first (nested keys split on `__`), then the
/// optional TOML file on top. The file wins on conflicts.
///
/// When a file is given and `runtime.script_dir` is not, script files resolve
/// relative to the file's directory.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    match config_file_name {
        Some(path) => info!("🔧 reading process configuration from '{}'", path.display()),
        None => info!("🔧 no configuration file, assembling one from ETLX_* alone"),
    }

    let layered = config_file_name.into_iter().fold(
        Figment::new().merge(Env::prefixed("ETLX_").split("__")),
        |figment, file| figment.merge(Toml::file(file)),
    );
    let mut app_config: AppConfig = layered.extract().with_context(|| match config_file_name {
        Some(path) => format!(
            "💀 '{}' (layered over ETLX_* env vars) does not describe a process etlx can run. \
             The message below names the key that broke the spell.",
            path.display()
        ),
        None => "💀 The ETLX_* env vars alone do not describe a process etlx can run.".to_string(),
    })?;
    if app_config.runtime.script_dir.is_none() {
        app_config.runtime.script_dir = config_file_name
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf);
    }
    Ok(app_config)
}
