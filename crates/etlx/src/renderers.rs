// ai
//! 🎨 Renderers — rows in, one payload string out, ready for a sink to send.
//!
//! 🎬 *[a batch of rows shuffles into the green room. the renderer hands each one a]*
//! *[name tag per column, lines them up, and sends them on stage as JSON.]*
//!
//! 🧠 Knowledge graph:
//! - Only output columns are rendered: `output && !system`, keyed by alias, in row order.
//! - NDJSON: one object per line, trailing newline on every line.
//! - JSON array: the sink worker writes the [`Renderer::prologue`] once, each batch
//!   through [`Renderer::render`] (comma-led after the first), then the [`Renderer::epilogue`].
//!   Zero rows still makes a valid `[]`.
//! - Renderers never decide where the bytes go. That is the sink's whole job.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::common::Row;
use crate::schema::EntitySchema;

/// 📐 Payload shape for a sink.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderFormat {
    #[default]
    Ndjson,
    #[serde(alias = "jsonarray", alias = "json")]
    JsonArray,
}

/// 🏷️ One rendered column: the row slot it reads and the key it is written under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub alias: String,
    pub index: usize,
}

/// 🏷️ The output columns of an entity, in row order.
pub fn output_columns(schema: &EntitySchema) -> Vec<OutputColumn> {
    schema
        .output_fields()
        .map(|field| OutputColumn {
            alias: field.alias.clone(),
            index: field.index,
        })
        .collect()
}

/// 🎨 Turns a batch of rows into one payload.
pub(crate) trait Renderer: std::fmt::Debug {
    /// 📄 `first_batch` tells framed formats whether a separator is owed.
    fn render(&self, rows: &[Row], columns: &[OutputColumn], first_batch: bool) -> Result<String>;

    fn prologue(&self) -> &'static str {
        ""
    }

    fn epilogue(&self) -> &'static str {
        ""
    }
}

/// 🧾 One JSON object, keys in column order. `serde_json::Map` would sort them.
fn render_object(row: &Row, columns: &[OutputColumn]) -> Result<String> {
    let mut object = String::with_capacity(columns.len() * 16 + 2);
    object.push('{');
    for (position, column) in columns.iter().enumerate() {
        if position > 0 {
            object.push(',');
        }
        let value = row.get(column.index).map(|v| v.to_json()).unwrap_or_default();
        object.push_str(&serde_json::to_string(&column.alias).context("💀 A column alias refused to become JSON.")?);
        object.push(':');
        object.push_str(
            &serde_json::to_string(&value)
                .with_context(|| format!("💀 Column '{}' refused to become JSON. serde had notes.", column.alias))?,
        );
    }
    object.push('}');
    Ok(object)
}

/// 📜 One JSON object per line.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NdjsonRenderer;

impl Renderer for NdjsonRenderer {
    fn render(&self, rows: &[Row], columns: &[OutputColumn], _first_batch: bool) -> Result<String> {
        let mut payload = String::with_capacity(rows.len() * (columns.len() * 16 + 2));
        for row in rows {
            payload.push_str(&render_object(row, columns)?);
            payload.push('\n');
        }
        Ok(payload)
    }
}

/// 🧺 One JSON array across every batch of the stream.
#[derive(Debug, Clone, Copy)]
pub(crate) struct JsonArrayRenderer;

impl Renderer for JsonArrayRenderer {
    fn render(&self, rows: &[Row], columns: &[OutputColumn], first_batch: bool) -> Result<String> {
        let mut payload = String::with_capacity(rows.len() * (columns.len() * 16 + 1));
        for (i, row) in rows.iter().enumerate() {
            if i > 0 || !first_batch {
                payload.push(',');
            }
            payload.push_str(&render_object(row, columns)?);
        }
        Ok(payload)
    }

    fn prologue(&self) -> &'static str {
        "["
    }

    fn epilogue(&self) -> &'static str {
        "]"
    }
}

/// 🎭 Static dispatch over the renderers a sink can ask for.
#[derive(Debug, Clone)]
pub(crate) enum RendererBackend {
    Ndjson(NdjsonRenderer),
    JsonArray(JsonArrayRenderer),
}

impl RendererBackend {
    pub(crate) fn from_format(format: RenderFormat) -> Self {
        match format {
            RenderFormat::Ndjson => Self::Ndjson(NdjsonRenderer),
            RenderFormat::JsonArray => Self::JsonArray(JsonArrayRenderer),
        }
    }
}

impl Renderer for RendererBackend {
    #[inline]
    fn render(&self, rows: &[Row], columns: &[OutputColumn], first_batch: bool) -> Result<String> {
        match self {
            Self::Ndjson(r) => r.render(rows, columns, first_batch),
            Self::JsonArray(r) => r.render(rows, columns, first_batch),
        }
    }

    fn prologue(&self) -> &'static str {
        match self {
            Self::Ndjson(r) => r.prologue(),
            Self::JsonArray(r) => r.prologue(),
        }
    }

    fn epilogue(&self) -> &'static str {
        match self {
            Self::Ndjson(r) => r.epilogue(),
            Self::JsonArray(r) => r.epilogue(),
        }
    }
}

/// 🔍 Read a captured payload back into JSON values, one per row.
pub fn parse_payload(format: RenderFormat, payload: &str) -> Result<Vec<serde_json::Value>> {
    match format {
        RenderFormat::JsonArray => {
            serde_json::from_str(payload).context("💀 The captured JSON array is not a JSON array.")
        }
        RenderFormat::Ndjson => payload
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("💀 A captured NDJSON line is not JSON."))
            .collect(),
    }
}
