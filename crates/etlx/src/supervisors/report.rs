//! 📋 The Process Report — the receipt you get at the end of a run.
//!
//! One [`EntityReport`] per entity that was started (or checked), in run order.
//! `is_ok()` is the single bit the CLI turns into an exit code.

use std::fmt;

use anyhow::Result;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

use crate::renderers::{RenderFormat, parse_payload};

/// 🧪 Everything an in-memory sink received, glued back into one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedOutput {
    pub format: RenderFormat,
    pub payload: String,
}

/// 📋 How one entity went.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityReport {
    pub entity: String,
    pub rows_read: u64,
    /// 📬 rows handed to the sink, or to the master for a slave entity
    pub rows_written: u64,
    pub build_errors: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// 💀 the fatal error that stopped this entity, if any
    pub fatal: Option<String>,
    pub captured: Option<CapturedOutput>,
}

impl EntityReport {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.fatal.is_none() && self.build_errors.is_empty() && self.errors.is_empty()
    }

    /// 🔍 The rows an in-memory sink received, as JSON objects. Empty for any other sink.
    pub fn captured_rows(&self) -> Result<Vec<serde_json::Value>> {
        match &self.captured {
            Some(captured) => parse_payload(captured.format, &captured.payload),
            None => Ok(Vec::new()),
        }
    }

    fn status(&self) -> &'static str {
        if self.fatal.is_some() {
            "💀 failed"
        } else if self.is_ok() {
            "✅ ok"
        } else {
            "⚠️ errors"
        }
    }
}

/// 📋 How the whole process went.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessReport {
    pub process: String,
    pub entities: Vec<EntityReport>,
    /// 🛑 true when an entity failed under `error_mode = "abort"`
    pub aborted: bool,
}

impl ProcessReport {
    pub fn new(process: impl Into<String>) -> Self {
        Self {
            process: process.into(),
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        !self.aborted && self.entities.iter().all(EntityReport::is_ok)
    }

    /// 🔍 Case-insensitive, like every other name lookup around here.
    pub fn entity(&self, name: &str) -> Option<&EntityReport> {
        self.entities.iter().find(|e| e.entity.eq_ignore_ascii_case(name))
    }

    /// 🍽️ One row per entity, comfy enough for a terminal.
    pub fn summary_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            "Entity",
            "Read",
            "Written",
            "Build errors",
            "Errors",
            "Warnings",
            "Status",
        ]);
        for entity in &self.entities {
            table.add_row(vec![
                Cell::new(&entity.entity),
                Cell::new(entity.rows_read).set_alignment(CellAlignment::Right),
                Cell::new(entity.rows_written).set_alignment(CellAlignment::Right),
                Cell::new(entity.build_errors.len()).set_alignment(CellAlignment::Right),
                Cell::new(entity.errors.len()).set_alignment(CellAlignment::Right),
                Cell::new(entity.warnings.len()).set_alignment(CellAlignment::Right),
                Cell::new(entity.status()),
            ]);
        }
        table
    }
}

impl fmt::Display for ProcessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = match (self.is_ok(), self.aborted) {
            (true, _) => "ok",
            (false, true) => "aborted",
            (false, false) => "finished with errors",
        };
        writeln!(f, "process '{}': {}", self.process, verdict)?;
        write!(f, "{}", self.summary_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_one_bad_apple_spoils_the_exit_code() {
        let mut the_report = ProcessReport::new("p");
        the_report.entities.push(EntityReport::new("Good"));
        assert!(the_report.is_ok());

        let mut the_bad_one = EntityReport::new("Bad");
        the_bad_one.build_errors.push("Field x: unknown method 'nope'".to_string());
        the_report.entities.push(the_bad_one);
        assert!(!the_report.is_ok());
        assert!(the_report.entity("bad").is_some_and(|e| !e.is_ok()));
        assert!(the_report.to_string().contains("finished with errors"));
    }

    #[test]
    fn the_one_where_the_receipt_is_read_back() -> Result<()> {
        let mut the_entity = EntityReport::new("Orders");
        the_entity.captured = Some(CapturedOutput {
            format: RenderFormat::Ndjson,
            payload: "{\"Id\":1}\n{\"Id\":2}\n".to_string(),
        });
        let rows = the_entity.captured_rows()?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["Id"], 2);
        Ok(())
    }
}
