use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::{
    fs::File,
    io::{self, AsyncBufReadExt},
};
use tracing::trace;

use crate::backends::{CommonSourceConfig, Source};

// -- 📂 where the NDJSON lives, and how much of it to bite off per page
#[derive(Debug, Deserialize, Clone)]
pub struct FileSourceConfig {
    pub file_name: String,
    #[serde(default)]
    pub common_config: CommonSourceConfig,
}

/// 📂 FileSource — one NDJSON record per line, handed out a page at a time.
///
/// A page closes at end of file, at `max_batch_size_docs` records, or once
/// `max_batch_size_bytes` have been read, whichever comes first. Blank lines
/// are skipped and never count as records. 🐛 A file that grows while we read
/// it gets read until it stops growing. Live and let live.
#[derive(Debug)]
pub(crate) struct FileSource {
    lines: io::BufReader<File>,
    config: FileSourceConfig,
}

impl FileSource {
    /// 🚪 Open the file. A missing file or a permissions problem fails here,
    /// before any worker starts, instead of on the first page.
    pub(crate) async fn new(config: FileSourceConfig) -> Result<Self> {
        let file = File::open(&config.file_name).await.with_context(|| {
            format!(
                "💀 The rows were supposed to be in '{}'. The filesystem has never heard of them, \
                or will not let us look. Check the path (relative to where etlx runs) and the permissions.",
                config.file_name
            )
        })?;
        Ok(Self {
            lines: io::BufReader::new(file),
            config,
        })
    }
}

#[async_trait]
impl Source for FileSource {
    async fn next_page(&mut self) -> Result<Option<String>> {
        let limits = &self.config.common_config;
        let max_records = limits.max_batch_size_docs.max(1);
        let mut page = String::new();
        let mut records = 0usize;
        let mut bytes = 0usize;
        let mut line = String::new();

        while records < max_records && bytes < limits.max_batch_size_bytes {
            line.clear();
            let read = self
                .lines
                .read_line(&mut line)
                .await
                .with_context(|| format!("💀 '{}' stopped making sense halfway through a line.", self.config.file_name))?;
            if read == 0 {
                break;
            }
            bytes += read;

            // 🧹 read_line keeps the \n (and \r\n's \r). Records don't want either.
            let record = line.trim_end_matches(['\n', '\r']);
            if record.trim().is_empty() {
                continue;
            }
            if records > 0 {
                page.push('\n');
            }
            page.push_str(record);
            records += 1;
        }

        trace!("📖 {} records ({} bytes) off '{}'", records, bytes, self.config.file_name);
        Ok((!page.is_empty()).then_some(page))
    }
}
