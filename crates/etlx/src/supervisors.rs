//! 🎬 *[the slaves go first. the masters wait, arms folded, for their rows to arrive.]* 🦆
//!
//! 📦 The Supervisor: the process controller. It turns a configured process into a plan,
//! runs the plan level by level and hands back one report for the whole thing.
//!
//! ## Knowledge Graph 🧠
//! - Entities run in relationship levels: a slave always finishes before any master that
//!   composes it. Entities of one level run concurrently, one tokio task per worker.
//! - A slave's rows are collected, not written. Its masters group them once per relationship.
//! - Chains are built before any task starts; a fatal build error is an entity failure.
//! - `error_mode` decides what an entity failure does: `exception` returns the error,
//!   `abort` stops every entity and marks the report aborted, `continue` records it and
//!   moves on (masters of a failed slave compose with no slave rows).
//!
//! ⚠️ The workers stay private to this module. Callers only ever see reports.

mod report;
mod workers;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow, bail};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub use self::report::{CapturedOutput, EntityReport, ProcessReport};
use self::workers::{RowOutlet, SinkWorker, SourceOutcome, SourceWorker, Worker};
use crate::app_config::AppConfig;
use crate::backends::{CapturedPayloads, SinkBackend, SourceBackend, max_request_size_bytes, render_format};
use crate::chain::{ChainBuilder, check_entity};
use crate::common::Row;
use crate::conversion::TypeTables;
use crate::decoder::RowDecoder;
use crate::master_slave::MasterSlaveComposer;
use crate::pipeline::RowPipeline;
use crate::progress::EntityProgress;
use crate::renderers::{RenderFormat, RendererBackend, output_columns};
use crate::schema::{EntitySchema, ErrorMode, ProcessSchema};
use crate::transforms::{FileScriptReader, ScriptReader, TransformRegistry};

/// 🗺️ Everything about a process that can be decided before a single row moves.
#[derive(Debug)]
struct Plan {
    process: ProcessSchema,
    /// entity indices, slaves in earlier levels than their masters
    levels: Vec<Vec<usize>>,
    /// per entity: (slave index, composer) in relationship declaration order
    composers: Vec<Vec<(usize, MasterSlaveComposer)>>,
    /// per entity: the schema its rows have once every slave is composed in
    output_schemas: Vec<EntitySchema>,
    is_slave: Vec<bool>,
}

impl Plan {
    fn new(process: ProcessSchema, tables: &TypeTables) -> Result<Self> {
        let count = process.entities.len();
        let position = |name: &str| -> Result<usize> {
            process
                .entities
                .iter()
                .position(|e| e.name.eq_ignore_ascii_case(name) || e.alias.eq_ignore_ascii_case(name))
                .with_context(|| format!("💀 Relationship entity '{}' is not part of this process.", name))
        };

        let mut slaves_of: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut edges = Vec::with_capacity(process.relationships.len());
        for relationship in &process.relationships {
            let master = position(&relationship.master)?;
            let slave = position(&relationship.slave)?;
            slaves_of[master].push(slave);
            edges.push((master, slave));
        }

        let mut depth: Vec<Option<usize>> = vec![None; count];
        let mut visiting = vec![false; count];
        for index in 0..count {
            level_of(index, &slaves_of, &mut depth, &mut visiting, &process.entities)?;
        }
        let deepest = depth.iter().flatten().copied().max().unwrap_or(0);
        let mut levels: Vec<Vec<usize>> = vec![Vec::new(); if count == 0 { 0 } else { deepest + 1 }];
        for (index, level) in depth.iter().enumerate() {
            if let Some(level) = level {
                levels[*level].push(index);
            }
        }

        // -- 🧱 composed schemas, bottom-up: a slave that is itself a master is composed first
        let mut output_schemas: Vec<EntitySchema> = process.entities.clone();
        let mut composers: Vec<Vec<(usize, MasterSlaveComposer)>> = vec![Vec::new(); count];
        let mut is_slave = vec![false; count];
        for &master in levels.iter().flatten() {
            for (relationship, &(m, slave)) in process.relationships.iter().zip(&edges) {
                if m != master {
                    continue;
                }
                let composer =
                    MasterSlaveComposer::new(relationship, &output_schemas[master], &output_schemas[slave], tables)?;
                output_schemas[master] = composer.schema().clone();
                composers[master].push((slave, composer));
                is_slave[slave] = true;
            }
        }

        Ok(Self {
            process,
            levels,
            composers,
            output_schemas,
            is_slave,
        })
    }
}

/// 🔁 Depth-first level assignment. A cycle is a configuration error.
fn level_of(
    index: usize,
    slaves_of: &[Vec<usize>],
    depth: &mut [Option<usize>],
    visiting: &mut [bool],
    entities: &[EntitySchema],
) -> Result<usize> {
    if let Some(level) = depth[index] {
        return Ok(level);
    }
    if visiting[index] {
        bail!(
            "💀 Entity '{}' is its own ancestor through master/slave relationships. That's a time-travel paradox.",
            entities[index].name
        );
    }
    visiting[index] = true;
    let mut level = 0;
    for &slave in &slaves_of[index] {
        level = level.max(level_of(slave, slaves_of, depth, visiting, entities)? + 1);
    }
    visiting[index] = false;
    depth[index] = Some(level);
    Ok(level)
}

/// 🏃 One entity with its workers out the door.
struct Launched {
    index: usize,
    source: JoinHandle<Result<SourceOutcome>>,
    sink: Option<JoinHandle<Result<u64>>>,
    captured: Option<(RenderFormat, CapturedPayloads)>,
}

/// 📦 Runs one configured process. Registry, conversion tables and script reader are
/// swappable, mostly so tests can swap them.
#[derive(Debug)]
pub struct Supervisor {
    config: AppConfig,
    registry: TransformRegistry,
    tables: Arc<TypeTables>,
    scripts: Arc<dyn ScriptReader>,
}

impl Supervisor {
    /// 🚀 Birth of a Supervisor. Standard transforms, standard type tables, scripts from disk.
    pub fn new(config: AppConfig) -> Self {
        let scripts = Arc::new(FileScriptReader::new(config.runtime.script_dir.clone()));
        Self {
            config,
            registry: TransformRegistry::standard(),
            tables: Arc::new(TypeTables::standard()),
            scripts,
        }
    }

    pub fn with_registry(mut self, registry: TransformRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_tables(mut self, tables: TypeTables) -> Self {
        self.tables = Arc::new(tables);
        self
    }

    pub fn with_script_reader(mut self, scripts: Arc<dyn ScriptReader>) -> Self {
        self.scripts = scripts;
        self
    }

    fn plan(&self) -> Result<Plan> {
        let process = ProcessSchema::from_config(&self.config.process, &self.tables)
            .with_context(|| format!("💀 Process '{}' does not describe a valid schema.", self.config.process.name))?;
        Plan::new(process, &self.tables)
    }

    /// 🧪 Build every chain, report every build error, move no data.
    pub fn check(&self) -> Result<ProcessReport> {
        let plan = self.plan()?;
        let builder = ChainBuilder::new(&plan.process, &self.registry, self.tables.clone(), self.scripts.as_ref());
        let mut report = ProcessReport::new(plan.process.name.clone());
        for &index in plan.levels.iter().flatten() {
            let entity = &plan.process.entities[index];
            let mut entity_report = EntityReport::new(entity.name.clone());
            match check_entity(&builder, entity) {
                Ok(build_errors) => entity_report.build_errors = build_errors,
                Err(err) => entity_report.fatal = Some(format!("{err:#}")),
            }
            report.entities.push(entity_report);
        }
        Ok(report)
    }

    /// 🧵 Unleash the workers, level by level, and wait for every last one of them.
    pub async fn run(&self) -> Result<ProcessReport> {
        let plan = self.plan()?;
        let abort = Arc::new(AtomicBool::new(false));
        let mut report = ProcessReport::new(plan.process.name.clone());
        let mut collected: HashMap<usize, Vec<Row>> = HashMap::new();
        info!(
            "🚀 process '{}' starting: {} entities in {} levels",
            plan.process.name,
            plan.process.entities.len(),
            plan.levels.len()
        );

        for level in &plan.levels {
            if abort.load(Ordering::Relaxed) {
                let skipped: Vec<&str> = level.iter().map(|&i| plan.process.entities[i].name.as_str()).collect();
                warn!("🛑 process aborted, never started: {}", skipped.join(", "));
                continue;
            }

            let mut running = Vec::with_capacity(level.len());
            for &index in level {
                match self.launch(&plan, index, &collected, &abort).await {
                    Ok(launched) => running.push(launched),
                    Err(err) => {
                        let mut entity_report = EntityReport::new(plan.process.entities[index].name.clone());
                        self.fail(&mut entity_report, err, &abort)?;
                        report.entities.push(entity_report);
                    }
                }
            }

            for launched in running {
                let entity = &plan.process.entities[launched.index];
                let mut entity_report = EntityReport::new(entity.name.clone());
                let is_slave = plan.is_slave[launched.index];
                let index = launched.index;
                match wait_for(launched, &mut entity_report).await {
                    Ok(outcome) => {
                        if is_slave {
                            entity_report.rows_written = outcome.collected.len() as u64;
                            collected.insert(index, outcome.collected);
                        }
                    }
                    Err(err) => self.fail(&mut entity_report, err, &abort)?,
                }
                report.entities.push(entity_report);
            }
        }

        report.aborted = abort.load(Ordering::Relaxed);
        if report.is_ok() {
            info!("✅ process '{}' finished cleanly", report.process);
        } else {
            for entity in report.entities.iter().filter(|e| !e.is_ok()) {
                error!(
                    "⚠️ {}: {} build errors, {} row errors{}",
                    entity.entity,
                    entity.build_errors.len(),
                    entity.errors.len(),
                    entity.fatal.as_deref().map(|f| format!(", fatal: {f}")).unwrap_or_default()
                );
            }
        }
        Ok(report)
    }

    /// 🏗️ Build one entity's chains, open its backends, start its workers.
    async fn launch(
        &self,
        plan: &Plan,
        index: usize,
        collected: &HashMap<usize, Vec<Row>>,
        abort: &Arc<AtomicBool>,
    ) -> Result<Launched> {
        let entity = &plan.process.entities[index];
        let entity_config = self
            .config
            .process
            .entities
            .get(index)
            .with_context(|| format!("💀 Entity '{}' lost its configuration somewhere.", entity.name))?;

        let builder = ChainBuilder::new(&plan.process, &self.registry, self.tables.clone(), self.scripts.as_ref());
        let chains = builder
            .build_entity(entity)
            .with_context(|| format!("💀 The chains of '{}' could not be built.", entity.name))?;
        let pipeline = RowPipeline::new(chains, entity.log_interval);
        let decoder = RowDecoder::new(entity, self.tables.clone())?;
        let source = SourceBackend::from_config(&entity_config.source)
            .await
            .with_context(|| format!("💀 The source of '{}' could not be opened.", entity.name))?;

        let no_rows: &[Row] = &[];
        let composers = plan.composers[index]
            .iter()
            .map(|(slave, composer)| {
                let slave_rows = collected.get(slave).map(Vec::as_slice).unwrap_or(no_rows);
                (composer.clone(), composer.group(slave_rows.iter().cloned()))
            })
            .collect();

        let (outlet, sink, captured) = if plan.is_slave[index] {
            (RowOutlet::Collect, None, None)
        } else {
            let sink_config = entity_config.sink.as_ref().unwrap_or(&self.config.sink_config);
            let sink = SinkBackend::from_config(sink_config, &entity.name)
                .await
                .with_context(|| format!("💀 The sink of '{}' could not be opened.", entity.name))?;
            let format = render_format(sink_config);
            let captured = sink.captured().map(|payloads| (format, payloads));
            let (tx, rx) = async_channel::bounded(self.config.runtime.queue_capacity.max(1));
            let sink_worker = SinkWorker::new(
                entity.name.clone(),
                rx,
                sink,
                RendererBackend::from_format(format),
                output_columns(&plan.output_schemas[index]),
                max_request_size_bytes(sink_config),
            );
            (RowOutlet::Channel(tx), Some(sink_worker.start()), captured)
        };

        let source_worker = SourceWorker::new(
            entity.name.clone(),
            source,
            decoder,
            pipeline,
            composers,
            outlet,
            abort.clone(),
            EntityProgress::new(&entity.name, self.config.runtime.progress),
        );
        Ok(Launched {
            index,
            source: source_worker.start(),
            sink,
            captured,
        })
    }

    /// 💀 Apply `error_mode` to one entity failure.
    fn fail(&self, entity_report: &mut EntityReport, err: anyhow::Error, abort: &AtomicBool) -> Result<()> {
        error!("💀 entity '{}' failed: {:#}", entity_report.entity, err);
        match self.config.process.error_mode {
            ErrorMode::Exception => {
                abort.store(true, Ordering::Relaxed);
                Err(err.context(format!("💀 Entity '{}' failed.", entity_report.entity)))
            }
            ErrorMode::Abort => {
                abort.store(true, Ordering::Relaxed);
                entity_report.fatal = Some(format!("{err:#}"));
                Ok(())
            }
            ErrorMode::Continue => {
                entity_report.fatal = Some(format!("{err:#}"));
                Ok(())
            }
        }
    }
}

/// ⏳ Join both workers of one entity and fill in its report.
async fn wait_for(launched: Launched, entity_report: &mut EntityReport) -> Result<SourceOutcome> {
    let source = flatten(launched.source.await);
    let sink = match launched.sink {
        Some(handle) => Some(flatten(handle.await)),
        None => None,
    };

    if let Some((format, payloads)) = launched.captured {
        let payload = payloads.lock().await.concat();
        entity_report.captured = Some(CapturedOutput { format, payload });
    }

    // -- 🕵️ a dead sink makes the source fail too; the sink's error is the real story
    let rows_written = match sink {
        Some(Err(err)) => return Err(err),
        Some(Ok(rows)) => rows,
        None => 0,
    };
    let outcome = source?;
    entity_report.rows_read = outcome.rows_read;
    entity_report.rows_written = rows_written;
    entity_report.build_errors = outcome.pipeline.build_errors.clone();
    entity_report.errors = outcome.pipeline.diagnostics.errors().to_vec();
    entity_report.warnings = outcome.pipeline.diagnostics.warnings().to_vec();
    entity_report.warnings.extend(outcome.decode_warnings.iter().cloned());
    if outcome.aborted {
        entity_report.fatal = Some("stopped early: the process was aborted".to_string());
    }
    Ok(outcome)
}

fn flatten<T>(joined: Result<Result<T>, tokio::task::JoinError>) -> Result<T> {
    joined.map_err(|join_error| anyhow!("💀 A worker task died before finishing: {join_error}"))?
}
