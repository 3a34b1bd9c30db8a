//! 🚰 The SourceWorker — pulls pages, decodes rows, runs every chain, composes slaves in.
//!
//! 🎬 *[a page arrives. the decoder slices it into rows. the pipeline rolls each one]*
//! *[through its chains. the composers seat the masters beside their slaves. the batch]*
//! *[leaves through the channel, or, for a slave, waits in a pile for its master.]*

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use async_channel::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::Worker;
use crate::backends::{Source, SourceBackend};
use crate::common::{Row, RowBatch};
use crate::decoder::RowDecoder;
use crate::master_slave::{MasterSlaveComposer, SlaveGroups};
use crate::pipeline::{PipelineReport, RowPipeline};
use crate::progress::EntityProgress;

/// 📤 Where a source worker's finished rows go.
#[derive(Debug)]
pub(in crate::supervisors) enum RowOutlet {
    /// 📬 to a sink worker
    Channel(Sender<RowBatch>),
    /// 🧺 kept for the masters this entity is a slave of
    Collect,
}

/// 📋 What a source worker hands back when the tap runs dry.
#[derive(Debug)]
pub(in crate::supervisors) struct SourceOutcome {
    pub rows_read: u64,
    pub rows_out: u64,
    pub pipeline: PipelineReport,
    pub decode_warnings: Vec<String>,
    pub collected: Vec<Row>,
    pub aborted: bool,
}

#[derive(Debug)]
pub(in crate::supervisors) struct SourceWorker {
    entity: String,
    source: SourceBackend,
    decoder: RowDecoder,
    pipeline: RowPipeline,
    composers: Vec<(MasterSlaveComposer, SlaveGroups)>,
    outlet: RowOutlet,
    abort: Arc<AtomicBool>,
    progress: EntityProgress,
}

impl SourceWorker {
    pub(in crate::supervisors) fn new(
        entity: String,
        source: SourceBackend,
        decoder: RowDecoder,
        pipeline: RowPipeline,
        composers: Vec<(MasterSlaveComposer, SlaveGroups)>,
        outlet: RowOutlet,
        abort: Arc<AtomicBool>,
        progress: EntityProgress,
    ) -> Self {
        Self {
            entity,
            source,
            decoder,
            pipeline,
            composers,
            outlet,
            abort,
            progress,
        }
    }

    async fn drain(mut self) -> Result<SourceOutcome> {
        let mut rows_read = 0u64;
        let mut rows_out = 0u64;
        let mut collected = Vec::new();
        let mut aborted = false;

        loop {
            if self.abort.load(Ordering::Relaxed) {
                info!("🛑 {} stops reading: another entity aborted the process", self.entity);
                aborted = true;
                break;
            }
            let Some(page) = self
                .source
                .next_page()
                .await
                .with_context(|| format!("💀 The source of '{}' failed to produce a page.", self.entity))?
            else {
                break;
            };

            let rows = self
                .decoder
                .decode_page(&page)
                .with_context(|| format!("💀 The source of '{}' produced a page we cannot read.", self.entity))?;
            let decoded = rows.len() as u64;
            rows_read += decoded;

            let mut batch: Vec<Row> = self.pipeline.run(rows).collect();
            for (composer, groups) in &self.composers {
                batch = composer.compose_all(batch, groups).collect();
            }
            rows_out += batch.len() as u64;
            self.progress.record_page(decoded, batch.len() as u64);
            debug!("📦 {} finished a batch of {} rows", self.entity, batch.len());

            match &self.outlet {
                RowOutlet::Channel(tx) => {
                    if batch.is_empty() {
                        continue;
                    }
                    tx.send(RowBatch::new(batch)).await.map_err(|_| {
                        anyhow::anyhow!(
                            "💀 The sink of '{}' hung up mid-stream. Whatever it was, it happened over there.",
                            self.entity
                        )
                    })?;
                }
                RowOutlet::Collect => collected.extend(batch),
            }
        }

        // -- 🚪 closing the sender tells the sink worker the stream is over
        drop(self.outlet);
        self.progress.finish();
        let pipeline = self.pipeline.finish();
        Ok(SourceOutcome {
            rows_read,
            rows_out,
            pipeline,
            decode_warnings: self.decoder.diagnostics().warnings().to_vec(),
            collected,
            aborted,
        })
    }
}

impl Worker for SourceWorker {
    type Output = SourceOutcome;

    fn start(self) -> JoinHandle<Result<SourceOutcome>> {
        tokio::spawn(async move {
            debug!("🚰 SourceWorker for {} started pouring...", self.entity);
            self.drain().await
        })
    }
}
