// ai
//! 📋 The schema descriptor, serde edition.
//!
//! 🎬 *[a TOML file walks into a struct]* *["I'm describing a process," it says.]*
//! *["We know," says serde. "We've been expecting you."]*
//!
//! These are the raw, as-written shapes of a process: entities, fields, maps,
//! scripts, parameters and relationships. They are deserialized by figment in
//! `app_config` and then resolved into the immutable [`crate::schema::ProcessSchema`].
//! Validation beyond what the core needs is somebody else's job. We just read. 📖

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::app_config::{SinkConfig, SourceConfig};
use crate::master_slave::{AggregateFn, JoinKind, OutputShape};
use crate::schema::FieldType;

/// 🚦 What the supervisor does when an entity falls over for real (not a row hiccup — a real fall).
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// 💥 propagate the error out of `run`. loud. dramatic. honest.
    Exception,
    /// 🛑 stop every other entity, finish with a failed report.
    Abort,
    /// 🚶 log it, mark the report failed, let everyone else keep working.
    #[default]
    Continue,
}

/// 📦 One process: the top-level unit with entities, parameters, maps, scripts and relationships.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProcessConfig {
    #[serde(default = "default_process_name")]
    pub name: String,
    #[serde(default)]
    pub error_mode: ErrorMode,
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
    #[serde(default)]
    pub maps: Vec<MapConfig>,
    #[serde(default)]
    pub scripts: Vec<ScriptConfig>,
    #[serde(default)]
    pub relationships: Vec<RelationshipConfig>,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

fn default_process_name() -> String {
    "process".to_string()
}

/// 🎛️ A process-level parameter. Transforms can reference it like any other field.
#[derive(Debug, Deserialize, Clone)]
pub struct ParameterConfig {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub value: Option<String>,
}

/// 🗺️ A named lookup table for `map` transforms.
#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    pub name: String,
    #[serde(default)]
    pub items: Vec<MapItemConfig>,
}

/// 🔑 How a map item's key is matched against the input.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MapOperator {
    #[default]
    Equals,
    #[serde(alias = "starts_with")]
    StartsWith,
    #[serde(alias = "ends_with")]
    EndsWith,
}

/// 🔑 One map entry: `from` maps to a literal `to`, or to the value of field `parameter`.
#[derive(Debug, Deserialize, Clone)]
pub struct MapItemConfig {
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub parameter: Option<String>,
    #[serde(default)]
    pub operator: MapOperator,
}

/// 📜 A reusable script. Inline `content`, a `file` to read at build time, or both.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScriptConfig {
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub file: Option<String>,
    /// 🌍 global scripts get loaded into every script engine, invited or not
    #[serde(default)]
    pub global: bool,
}

/// 🔗 A one-to-many join between a master entity and a slave entity.
#[derive(Debug, Deserialize, Clone)]
pub struct RelationshipConfig {
    pub master: String,
    pub slave: String,
    pub master_key: Vec<String>,
    /// 🔑 defaults to `master_key` when the join columns share names
    #[serde(default)]
    pub slave_key: Vec<String>,
    #[serde(default)]
    pub join: JoinKind,
    #[serde(default)]
    pub shape: OutputShape,
    #[serde(default)]
    pub aggregates: BTreeMap<String, AggregateFn>,
    #[serde(default = "default_concat_separator")]
    pub separator: String,
    #[serde(default)]
    pub prefix: Option<String>,
}

fn default_concat_separator() -> String {
    ", ".to_string()
}

/// 🧱 One entity: a source of rows, its fields, and where its output goes.
#[derive(Debug, Deserialize, Clone)]
pub struct EntityConfig {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub source: SourceConfig,
    /// 🚰 overrides the app-level sink for this entity only
    #[serde(default)]
    pub sink: Option<SinkConfig>,
    #[serde(default = "default_log_interval")]
    pub log_interval: u64,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub calculated_fields: Vec<FieldConfig>,
}

// 📊 every 10k rows we say something. not too chatty, not a ghost.
pub(crate) fn default_log_interval() -> u64 {
    10_000
}

/// 🏷️ One field as written in config.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FieldConfig {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub default: Option<String>,
    /// 📥 defaults to true for `fields`, false for `calculated_fields`
    #[serde(default)]
    pub input: Option<bool>,
    #[serde(default = "default_true")]
    pub output: bool,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub primary_key: bool,
    /// 🎨 numeric/date format specifier, honored by `format` placeholders
    #[serde(default)]
    pub format: Option<String>,
    /// ✍️ shorthand chain, e.g. `copy(A,B).format({0}-{1}).trim()`
    #[serde(default)]
    pub t: Option<String>,
    #[serde(default)]
    pub transforms: Vec<TransformConfig>,
}

fn default_true() -> bool {
    true
}

/// 🔧 One explicit transform step. Anything that isn't `method`, `parameters` or
/// `returns` lands in `settings`.
#[derive(Debug, Deserialize, Clone)]
pub struct TransformConfig {
    pub method: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub returns: Option<FieldType>,
    #[serde(flatten)]
    pub settings: BTreeMap<String, SettingValue>,
}

/// 🎛️ A setting as TOML wrote it. We flatten everything to text before transforms see it.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum SettingValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
    List(Vec<String>),
}

impl SettingValue {
    pub fn into_text(self) -> String {
        match self {
            SettingValue::Text(text) => text,
            SettingValue::Integer(i) => i.to_string(),
            SettingValue::Float(f) => f.to_string(),
            SettingValue::Flag(b) => b.to_string(),
            SettingValue::List(items) => items.join(","),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_a_whole_process_fits_in_a_toml_string() {
        let the_process: ProcessConfig = toml::from_str(
            r#"
            name = "TestProcess"
            error_mode = "abort"

            [[maps]]
            name = "colors"
            items = [
                { from = "r", to = "red" },
                { from = "g", operator = "starts_with", to = "green" },
            ]

            [[entities]]
            name = "TestData"

            [[entities.fields]]
            name = "Field1"
            type = "int"

            [[entities.calculated_fields]]
            name = "Padded"
            transforms = [{ method = "padleft", total_width = 5, padding_char = "0" }]
            "#,
        )
        .expect("💀 the process config should parse. toml and serde are on speaking terms.");

        assert_eq!(the_process.name, "TestProcess");
        assert_eq!(the_process.error_mode, ErrorMode::Abort);
        assert_eq!(the_process.maps[0].items[1].operator, MapOperator::StartsWith);
        let the_entity = &the_process.entities[0];
        assert_eq!(the_entity.fields[0].field_type, FieldType::Int32);
        assert!(the_entity.fields[0].output, "output defaults to true");
        let the_step = &the_entity.calculated_fields[0].transforms[0];
        assert_eq!(the_step.method, "padleft");
        assert_eq!(
            the_step.settings.get("total_width"),
            Some(&SettingValue::Integer(5))
        );
        assert_eq!(the_entity.log_interval, 10_000);
    }
}
