// ai
//! 📖 RowDecoder — raw NDJSON pages in, typed rows out.
//!
//! 🎬 *[a page of text lands on the desk. the decoder finds every newline with]*
//! *[memchr, reads each line as a JSON object, and files every value into the slot]*
//! *[whose name or alias it answers to. values that won't convert keep the default.]*
//!
//! 🧠 Knowledge graph:
//! - Every row starts as a copy of the entity's default row ([`RowFactory`]).
//! - Keys match input fields by alias first, then name, case-insensitively. Unknown keys
//!   are ignored. Calculated fields are never read from input.
//! - A value that fails conversion keeps the default and records one warning per field.
//! - A line that is not a JSON object is a source failure: the page is rejected.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use memchr::memchr_iter;
use tracing::warn;

use crate::common::{Row, RowFactory, Value};
use crate::conversion::TypeTables;
use crate::schema::{EntitySchema, FieldType};
use crate::transforms::Diagnostics;

#[derive(Debug, Clone)]
struct InputSlot {
    alias: String,
    index: usize,
    field_type: FieldType,
}

/// 📖 Decodes pages for one entity.
#[derive(Debug)]
pub struct RowDecoder {
    entity: String,
    factory: RowFactory,
    slots: HashMap<String, InputSlot>,
    tables: Arc<TypeTables>,
    diagnostics: Diagnostics,
    lines: u64,
}

impl RowDecoder {
    pub fn new(schema: &EntitySchema, tables: Arc<TypeTables>) -> Result<Self> {
        let factory = schema.row_factory(&tables)?;
        let mut slots = HashMap::new();
        // -- 🔑 names first, then aliases on top: an alias beats a sibling's name
        for field in schema.input_fields() {
            let slot = InputSlot {
                alias: field.alias.clone(),
                index: field.index,
                field_type: field.field_type,
            };
            slots.entry(field.name.to_ascii_lowercase()).or_insert_with(|| slot.clone());
        }
        for field in schema.input_fields() {
            slots.insert(
                field.alias.to_ascii_lowercase(),
                InputSlot {
                    alias: field.alias.clone(),
                    index: field.index,
                    field_type: field.field_type,
                },
            );
        }
        Ok(Self {
            entity: schema.name.clone(),
            factory,
            slots,
            tables,
            diagnostics: Diagnostics::default(),
            lines: 0,
        })
    }

    /// 📄 Every non-blank line of `page` becomes one row, in order.
    pub fn decode_page(&mut self, page: &str) -> Result<Vec<Row>> {
        let bytes = page.as_bytes();
        let mut rows = Vec::new();
        let mut start = 0;
        for end in memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len())) {
            let line = page[start..end].trim();
            start = end + 1;
            if line.is_empty() {
                continue;
            }
            self.lines += 1;
            rows.push(self.decode_line(line)?);
        }
        Ok(rows)
    }

    pub fn decode_line(&mut self, line: &str) -> Result<Row> {
        let parsed: serde_json::Value = serde_json::from_str(line).with_context(|| {
            format!(
                "💀 Line {} of entity '{}' is not JSON. It looked like JSON from across the room.",
                self.lines, self.entity
            )
        })?;
        let serde_json::Value::Object(object) = parsed else {
            bail!(
                "💀 Line {} of entity '{}' is JSON, but not an object. Rows need keys.",
                self.lines,
                self.entity
            );
        };

        let mut row = self.factory.create();
        for (key, raw) in object {
            let Some(slot) = self.slots.get(&key.to_ascii_lowercase()) else {
                continue;
            };
            match json_to_value(&self.tables, slot.field_type, raw) {
                Ok(value) => {
                    row.set(slot.index, value);
                }
                Err(e) => {
                    let message = format!(
                        "field '{}' had values that are not a valid {}; the default was kept",
                        slot.alias, slot.field_type
                    );
                    if self.diagnostics.warn(message) {
                        warn!("⚠️ {}.{}: {e:#}. The default stays in the slot.", self.entity, slot.alias);
                    }
                }
            }
        }
        Ok(row)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// 🔢 Non-blank lines seen so far.
    pub fn lines(&self) -> u64 {
        self.lines
    }
}

fn json_to_value(tables: &TypeTables, field_type: FieldType, raw: serde_json::Value) -> Result<Value> {
    use serde_json::Value as Json;
    match raw {
        Json::Null => Ok(Value::Null),
        Json::String(text) => tables.convert(field_type, &text),
        Json::Bool(flag) => tables.coerce(field_type, &Value::Bool(flag)),
        Json::Number(number) => {
            let value = match (number.as_i64(), number.as_f64()) {
                (Some(i), _) => Value::Int64(i),
                (None, Some(f)) if field_type != FieldType::Decimal => Value::Double(f),
                _ => return tables.convert(field_type, &number.to_string()),
            };
            tables.coerce(field_type, &value)
        }
        Json::Array(items) if matches!(field_type, FieldType::Object | FieldType::String) => Ok(Value::List(
            items
                .into_iter()
                .map(|item| match item {
                    Json::String(text) => text,
                    other => other.to_string(),
                })
                .collect(),
        )),
        other => tables.convert(field_type, &other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;
    use rust_decimal::Decimal;

    fn decoder() -> anyhow::Result<RowDecoder> {
        let schema = EntitySchema::new(
            "Input",
            vec![
                Field::new("Field1", FieldType::Int32),
                Field::new("Amount", FieldType::Decimal).with_alias("Money"),
                Field::new("Name", FieldType::String).with_default("nobody"),
                Field::new("Upper", FieldType::String).calculated(),
            ],
        )?;
        RowDecoder::new(&schema, Arc::new(TypeTables::standard()))
    }

    #[test]
    fn the_one_where_lines_become_rows() -> anyhow::Result<()> {
        let mut the_decoder = decoder()?;
        let the_rows = the_decoder.decode_page(
            "{\"field1\": 2, \"Money\": 3.10, \"Name\": \"ann\"}\n\n{\"Field1\": \"7\", \"Upper\": \"ignored\"}\r\n",
        )?;
        assert_eq!(the_rows.len(), 2);
        assert_eq!(the_rows[0][0], Value::Int32(2));
        assert_eq!(the_rows[0][1], Value::Decimal(Decimal::new(310, 2)));
        assert_eq!(the_rows[0][2], Value::from("ann"));
        assert_eq!(the_rows[1][0], Value::Int32(7));
        assert_eq!(the_rows[1][2], Value::from("nobody"), "missing keys keep the default");
        assert_eq!(the_rows[1][3], Value::from(""), "calculated fields are not read");
        assert_eq!(the_decoder.lines(), 2);
        Ok(())
    }

    #[test]
    fn the_one_where_bad_values_keep_their_defaults_and_complain_once() -> anyhow::Result<()> {
        let mut the_decoder = decoder()?;
        let the_rows = the_decoder.decode_page("{\"Field1\": \"two\"}\n{\"Field1\": \"three\"}")?;
        assert_eq!(the_rows[0][0], Value::Int32(0));
        assert_eq!(the_rows[1][0], Value::Int32(0));
        assert_eq!(the_decoder.diagnostics().warnings().len(), 1);
        Ok(())
    }

    #[test]
    fn the_one_where_the_page_is_not_json_at_all() -> anyhow::Result<()> {
        let mut the_decoder = decoder()?;
        assert!(the_decoder.decode_page("{\"Field1\": 1}\nnot json").is_err());
        assert!(the_decoder.decode_page("[1, 2]").is_err());
        Ok(())
    }
}
