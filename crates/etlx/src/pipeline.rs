// ai
//! 🚰 The Row Pipeline — one entity's rows, every chain, in order, lazily.
//!
//! 🎬 *[rows enter stage left, single file. each one gets every field's chain, in]*
//! *[dependency order. each one exits stage right in the same order it entered.]*
//! *[nobody cuts the line. nobody leaves the line. the line is sacred.]* 🎭
//!
//! - Output is one-to-one with input, same order. Rows are mutated, never dropped.
//! - Progress is logged every `log_interval` rows. Advisory only.
//! - [`RowPipeline::finish`] releases every engine the chains own, exactly once,
//!   and [`Drop`] does the same for pipelines that never got to finish.

use tracing::info;

use crate::chain::EntityChains;
use crate::common::Row;
use crate::transforms::Diagnostics;

/// 🚰 Drives one entity's rows through its chains.
#[derive(Debug)]
pub struct RowPipeline {
    chains: EntityChains,
    log_interval: u64,
    rows: u64,
    released: bool,
}

/// 📋 What a pipeline saw, for the process report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub rows: u64,
    pub build_errors: Vec<String>,
    pub diagnostics: Diagnostics,
}

impl RowPipeline {
    pub fn new(chains: EntityChains, log_interval: u64) -> Self {
        Self {
            chains,
            log_interval: log_interval.max(1),
            rows: 0,
            released: false,
        }
    }

    pub fn chains(&self) -> &EntityChains {
        &self.chains
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// 🔄 Every chain, in evaluation order, on one row.
    pub fn transform_row(&mut self, row: Row) -> Row {
        let row = self.chains.run(row);
        self.rows += 1;
        if self.rows % self.log_interval == 0 {
            info!("🚰 {} has pushed {} rows through its chains", self.chains.entity(), self.rows);
        }
        row
    }

    /// 🌊 The stream form: lazy, in order, one row out per row in.
    pub fn run<'p, I>(&'p mut self, rows: I) -> impl Iterator<Item = Row> + 'p
    where
        I: IntoIterator<Item = Row>,
        I::IntoIter: 'p,
    {
        rows.into_iter().map(move |row| self.transform_row(row))
    }

    pub fn report(&self) -> PipelineReport {
        PipelineReport {
            rows: self.rows,
            build_errors: self.chains.build_errors(),
            diagnostics: self.chains.diagnostics(),
        }
    }

    /// 🏁 Release every engine and hand back the final report.
    pub fn finish(mut self) -> PipelineReport {
        self.release();
        self.report()
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.chains.release();
            info!("🏁 {} finished after {} rows", self.chains.entity(), self.rows);
        }
    }
}

impl Drop for RowPipeline {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::chain::ChainBuilder;
    use crate::common::Value;
    use crate::conversion::TypeTables;
    use crate::schema::{EntitySchema, Field, FieldType, ProcessSchema, TransformSpec};
    use crate::shorthand;
    use crate::transforms::TransformRegistry;
    use crate::transforms::test_support::MemoryScripts;

    fn pipeline(entity: &EntitySchema) -> anyhow::Result<RowPipeline> {
        let process = ProcessSchema::new("p", vec![entity.clone()]);
        let registry = TransformRegistry::standard();
        let scripts = MemoryScripts::default();
        let builder = ChainBuilder::new(&process, &registry, Arc::new(TypeTables::standard()), &scripts);
        Ok(RowPipeline::new(builder.build_entity(entity)?, 2))
    }

    #[test]
    fn the_one_where_nobody_cuts_the_line() -> anyhow::Result<()> {
        let entity = EntitySchema::new(
            "Queue",
            vec![
                Field::new("Marker", FieldType::Int32),
                Field::new("Untouched", FieldType::String),
                Field::new("Doubled", FieldType::Int32)
                    .calculated()
                    .with_transforms(shorthand::parse("add(Marker,Marker)")?),
            ],
        )?;
        let mut the_pipeline = pipeline(&entity)?;
        let the_rows: Vec<Row> = (0..50)
            .map(|i| Row::from_values(vec![Value::Int32(i), Value::from(format!("row {i}")), Value::Int32(0)]))
            .collect();

        let the_output: Vec<Row> = the_pipeline.run(the_rows).collect();
        assert_eq!(the_output.len(), 50);
        for (i, row) in the_output.iter().enumerate() {
            let i = i as i32;
            assert_eq!(row[0], Value::Int32(i), "order preserved");
            assert_eq!(row[1], Value::from(format!("row {i}")), "fields without transforms pass through");
            assert_eq!(row[2], Value::Int32(i * 2));
        }
        let the_report = the_pipeline.finish();
        assert_eq!(the_report.rows, 50);
        assert!(the_report.build_errors.is_empty());
        Ok(())
    }

    #[test]
    fn the_one_where_one_broken_field_does_not_spoil_the_rest() -> anyhow::Result<()> {
        let entity = EntitySchema::new(
            "Mixed",
            vec![
                Field::new("Name", FieldType::String).with_transforms(vec![TransformSpec::new("upper")]),
                Field::new("Padded", FieldType::String)
                    .calculated()
                    .with_transforms(vec![TransformSpec::new("padleft").with_parameters(["Name"])]),
            ],
        )?;
        let mut the_pipeline = pipeline(&entity)?;
        let the_output: Vec<Row> = the_pipeline
            .run(vec![
                Row::from_values(vec![Value::from("a"), Value::from("")]),
                Row::from_values(vec![Value::from("b"), Value::from("")]),
            ])
            .collect();
        assert_eq!(the_output[0][0], Value::from("A"));
        assert_eq!(the_output[1][0], Value::from("B"));
        assert_eq!(the_output[1][1], Value::from(""), "the broken field keeps its value");
        assert_eq!(the_pipeline.report().build_errors.len(), 1);
        Ok(())
    }
}
