//! 🎬 *[batches of finished rows arrive, in order. the sink worker turns them into text.]*
//!
//! 🗑️ The SinkWorker renders each batch into the sink's dialect, buffers the text and
//! sends once the buffer reaches `max_request_size_bytes`. JSON-array framing
//! (prologue, epilogue) is written here, so a payload split across requests still
//! concatenates into one valid document.

use anyhow::{Context, Result};
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::debug;

use super::Worker;
use crate::backends::{Sink, SinkBackend};
use crate::common::RowBatch;
use crate::renderers::{OutputColumn, Renderer, RendererBackend};

/// 🗑️ The SinkWorker: takes rows from a channel, renders them, throws the payload at a backend.
#[derive(Debug)]
pub(in crate::supervisors) struct SinkWorker {
    entity: String,
    rx: Receiver<RowBatch>,
    sink: SinkBackend,
    renderer: RendererBackend,
    columns: Vec<OutputColumn>,
    max_request_size_bytes: usize,
}

impl SinkWorker {
    /// 🏗️ You hand it a receiver (the data firehose), a sink (the drain) and the
    /// renderer that turns rows into the sink's dialect. It does not judge.
    pub(in crate::supervisors) fn new(
        entity: String,
        rx: Receiver<RowBatch>,
        sink: SinkBackend,
        renderer: RendererBackend,
        columns: Vec<OutputColumn>,
        max_request_size_bytes: usize,
    ) -> Self {
        Self {
            entity,
            rx,
            sink,
            renderer,
            columns,
            max_request_size_bytes: max_request_size_bytes.max(1),
        }
    }

    async fn drain(mut self) -> Result<u64> {
        let mut buffer = String::from(self.renderer.prologue());
        let mut first_batch = true;
        let mut rows_written = 0u64;

        // -- 🔁 recv errors only once the channel is empty and every sender is gone
        while let Ok(batch) = self.rx.recv().await {
            debug!("🪣 SinkWorker for {} received batch of {} rows", self.entity, batch.len());
            let rendered = self
                .renderer
                .render(&batch.rows, &self.columns, first_batch)
                .with_context(|| format!("💀 Rows of '{}' refused to be rendered.", self.entity))?;
            first_batch = false;
            rows_written += batch.len() as u64;
            buffer.push_str(&rendered);

            if buffer.len() >= self.max_request_size_bytes {
                let payload = std::mem::take(&mut buffer);
                self.sink
                    .send(payload)
                    .await
                    .with_context(|| format!("💀 SinkWorker for '{}' failed to send a payload.", self.entity))?;
            }
        }

        debug!("🏁 SinkWorker for {}: channel closed. Shutting down.", self.entity);
        buffer.push_str(self.renderer.epilogue());
        if !buffer.is_empty() {
            self.sink
                .send(buffer)
                .await
                .with_context(|| format!("💀 SinkWorker for '{}' failed to send the last payload.", self.entity))?;
        }
        self.sink
            .close()
            .await
            .with_context(|| format!("💀 SinkWorker for '{}' failed to close its sink.", self.entity))?;
        Ok(rows_written)
    }
}

impl Worker for SinkWorker {
    type Output = u64;

    fn start(self) -> JoinHandle<Result<u64>> {
        tokio::spawn(async move {
            debug!("📥 SinkWorker for {} started draining channel...", self.entity);
            self.drain().await
        })
    }
}
