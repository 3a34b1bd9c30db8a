// ai
//! 🏗️ The Field/Schema model — who lives in which slot, and what they're called.
//!
//! 🎬 *[a census taker knocks on every field's door, hands it a number, and leaves]*
//! *["That number is yours forever," the census taker says. The field nods. It has no choice.]*
//!
//! Resolves the raw [`config`] shapes into immutable schemas:
//! - [`Field`] — one column, with a dense `index` assigned once, here, and never again.
//! - [`EntitySchema`] — the ordered field set of one entity (input fields, then calculated).
//! - [`ProcessSchema`] — all entities plus process-level parameters, maps, scripts, relationships.
//!
//! 🧠 Knowledge graph:
//! - Rows are addressed by `Field::index`. Never by name at row time.
//! - Alias lookup is case-insensitive; aliases are unique inside an entity.
//! - Shorthand chains (`t = "..."`) are parsed here by [`crate::shorthand`] into
//!   unbound [`TransformSpec`]s; binding against signatures happens in the chain builder.
//!
//! 🦆

pub mod config;
mod types;

use std::collections::BTreeMap;
use std::collections::HashSet;

use anyhow::{Context, Result, bail};

pub use self::config::{
    EntityConfig, ErrorMode, FieldConfig, MapConfig, MapItemConfig, MapOperator,
    ParameterConfig, ProcessConfig, RelationshipConfig, ScriptConfig, TransformConfig,
};
pub use self::types::FieldType;

use crate::common::{RowFactory, Value};
use crate::conversion::TypeTables;
use crate::shorthand;

/// 🔧 One transform step, as declared. `parameters` are field references, `settings`
/// are named knobs, `arguments` are raw shorthand args still waiting to be bound to
/// the method's signature.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformSpec {
    pub method: String,
    pub parameters: Vec<String>,
    pub returns: Option<FieldType>,
    pub settings: BTreeMap<String, String>,
    pub arguments: Vec<String>,
}

impl TransformSpec {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_setting(mut self, key: &str, value: impl Into<String>) -> Self {
        self.settings.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_returns(mut self, returns: FieldType) -> Self {
        self.returns = Some(returns);
        self
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

impl From<TransformConfig> for TransformSpec {
    fn from(config: TransformConfig) -> Self {
        let mut spec = TransformSpec::new(config.method).with_parameters(config.parameters);
        spec.returns = config.returns;
        for (key, value) in config.settings {
            spec.settings.insert(key.to_ascii_lowercase(), value.into_text());
        }
        spec
    }
}

/// 🏷️ One column of data, or one calculated value. Immutable once the schema is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub alias: String,
    pub entity: String,
    pub field_type: FieldType,
    pub default: Option<String>,
    pub input: bool,
    pub output: bool,
    pub system: bool,
    pub calculated: bool,
    pub primary_key: bool,
    pub format: Option<String>,
    /// 📍 slot in the row. dense. assigned once. carved in stone.
    pub index: usize,
    pub transforms: Vec<TransformSpec>,
}

impl Field {
    /// 🚀 An input field with alias = name. Tests love this constructor. So do we.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            name,
            entity: String::new(),
            field_type,
            default: None,
            input: true,
            output: true,
            system: false,
            calculated: false,
            primary_key: false,
            format: None,
            index: 0,
            transforms: Vec::new(),
        }
    }

    /// 🧮 Flip this field into a calculated field: not read from the source, produced by its chain.
    pub fn calculated(mut self) -> Self {
        self.calculated = true;
        self.input = false;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_transforms(mut self, transforms: Vec<TransformSpec>) -> Self {
        self.transforms = transforms;
        self
    }

    /// 🔍 Case-insensitive match on alias or name. The way config authors expect it to work.
    pub fn matches(&self, name_or_alias: &str) -> bool {
        self.alias.eq_ignore_ascii_case(name_or_alias) || self.name.eq_ignore_ascii_case(name_or_alias)
    }

    /// 📤 Does this field show up in the write stream?
    pub fn is_output(&self) -> bool {
        self.output && !self.system
    }

    /// 🎁 The default value, converted to the field's type. Falls back to the type default.
    pub fn default_value(&self, tables: &TypeTables) -> Result<Value> {
        match &self.default {
            Some(raw) => tables.convert(self.field_type, raw).with_context(|| {
                format!(
                    "💀 Field '{}' has default '{}' which refuses to become a {}.",
                    self.alias, raw, self.field_type
                )
            }),
            None => Ok(tables.default_for(self.field_type)),
        }
    }

    fn from_config(entity: &str, config: &FieldConfig, calculated: bool) -> Result<Self> {
        let mut transforms = match &config.t {
            Some(expression) => shorthand::parse(expression).with_context(|| {
                format!(
                    "💀 Shorthand '{}' on field '{}' of entity '{}' did not parse.",
                    expression, config.name, entity
                )
            })?,
            None => Vec::new(),
        };
        transforms.extend(config.transforms.iter().cloned().map(TransformSpec::from));

        Ok(Self {
            name: config.name.clone(),
            alias: config.alias.clone().unwrap_or_else(|| config.name.clone()),
            entity: entity.to_string(),
            field_type: config.field_type,
            default: config.default.clone(),
            input: config.input.unwrap_or(!calculated),
            output: config.output,
            system: config.system,
            calculated,
            primary_key: config.primary_key,
            format: config.format.clone(),
            index: 0,
            transforms,
        })
    }
}

/// 🧱 The full field set of one entity, in row order.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    pub name: String,
    pub alias: String,
    pub log_interval: u64,
    fields: Vec<Field>,
}

impl EntitySchema {
    /// 🏗️ Assign dense indices in the given order and enforce alias uniqueness.
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Result<Self> {
        let name = name.into();
        let mut seen = HashSet::new();
        let mut indexed = Vec::with_capacity(fields.len());
        for (index, mut field) in fields.into_iter().enumerate() {
            if !seen.insert(field.alias.to_ascii_lowercase()) {
                bail!(
                    "💀 Entity '{}' has two fields answering to alias '{}'. Aliases must be unique, like snowflakes or UUIDs.",
                    name,
                    field.alias
                );
            }
            field.index = index;
            field.entity = name.clone();
            indexed.push(field);
        }
        Ok(Self {
            alias: name.clone(),
            name,
            log_interval: config::default_log_interval(),
            fields: indexed,
        })
    }

    pub fn from_config(config: &EntityConfig) -> Result<Self> {
        let mut fields = Vec::with_capacity(config.fields.len() + config.calculated_fields.len());
        for field in &config.fields {
            fields.push(Field::from_config(&config.name, field, false)?);
        }
        for field in &config.calculated_fields {
            fields.push(Field::from_config(&config.name, field, true)?);
        }
        let mut schema = Self::new(config.name.clone(), fields)?;
        schema.alias = config.alias.clone().unwrap_or_else(|| config.name.clone());
        schema.log_interval = config.log_interval.max(1);
        Ok(schema)
    }

    pub fn capacity(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// 🔍 Alias wins over name: a field aliased `Total` beats another field *named* `Total`.
    pub fn field(&self, name_or_alias: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.alias.eq_ignore_ascii_case(name_or_alias))
            .or_else(|| self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name_or_alias)))
    }

    pub fn input_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.input)
    }

    pub fn output_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_output())
    }

    /// 🏭 A row factory whose defaults were converted exactly once, right here.
    pub fn row_factory(&self, tables: &TypeTables) -> Result<RowFactory> {
        let defaults = self
            .fields
            .iter()
            .map(|field| field.default_value(tables))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("💀 Could not build default row for entity '{}'.", self.name))?;
        Ok(RowFactory::new(defaults))
    }
}

/// 🎛️ A process parameter: a field that lives outside any row, with one fixed value.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub field: Field,
    pub value: Value,
}

/// 📦 The whole process, resolved and immutable.
#[derive(Debug, Clone)]
pub struct ProcessSchema {
    pub name: String,
    pub error_mode: ErrorMode,
    pub parameters: Vec<Parameter>,
    pub maps: Vec<MapConfig>,
    pub scripts: Vec<ScriptConfig>,
    pub relationships: Vec<RelationshipConfig>,
    pub entities: Vec<EntitySchema>,
}

impl ProcessSchema {
    /// 🧪 A process of loose entities, no maps, no scripts, no drama.
    pub fn new(name: impl Into<String>, entities: Vec<EntitySchema>) -> Self {
        Self {
            name: name.into(),
            error_mode: ErrorMode::default(),
            parameters: Vec::new(),
            maps: Vec::new(),
            scripts: Vec::new(),
            relationships: Vec::new(),
            entities,
        }
    }

    pub fn from_config(config: &ProcessConfig, tables: &TypeTables) -> Result<Self> {
        let entities = config
            .entities
            .iter()
            .map(EntitySchema::from_config)
            .collect::<Result<Vec<_>>>()?;

        let mut parameters = Vec::with_capacity(config.parameters.len());
        for (index, parameter) in config.parameters.iter().enumerate() {
            let mut field = Field::new(parameter.name.clone(), parameter.field_type);
            field.input = false;
            field.output = false;
            field.index = index;
            let value = match &parameter.value {
                Some(raw) => tables.convert(parameter.field_type, raw).with_context(|| {
                    format!(
                        "💀 Parameter '{}' = '{}' is not a valid {}.",
                        parameter.name, raw, parameter.field_type
                    )
                })?,
                None => tables.default_for(parameter.field_type),
            };
            parameters.push(Parameter { field, value });
        }

        let schema = Self {
            name: config.name.clone(),
            error_mode: config.error_mode,
            parameters,
            maps: config.maps.clone(),
            scripts: config.scripts.clone(),
            relationships: config.relationships.clone(),
            entities,
        };
        schema.check_relationships()?;
        Ok(schema)
    }

    pub fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name) || e.alias.eq_ignore_ascii_case(name))
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.field.matches(name))
    }

    pub fn map(&self, name: &str) -> Option<&MapConfig> {
        self.maps.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn script(&self, name: &str) -> Option<&ScriptConfig> {
        self.scripts.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// 🔗 Relationships must point at real entities and real key fields, or composition is fiction.
    fn check_relationships(&self) -> Result<()> {
        for relationship in &self.relationships {
            let master = self.entity(&relationship.master).with_context(|| {
                format!("💀 Relationship master '{}' is not an entity here.", relationship.master)
            })?;
            let slave = self.entity(&relationship.slave).with_context(|| {
                format!("💀 Relationship slave '{}' is not an entity here.", relationship.slave)
            })?;
            let slave_keys = if relationship.slave_key.is_empty() {
                &relationship.master_key
            } else {
                &relationship.slave_key
            };
            if relationship.master_key.is_empty() || relationship.master_key.len() != slave_keys.len() {
                bail!(
                    "💀 Relationship {} -> {} needs the same non-zero number of master and slave key fields.",
                    master.name,
                    slave.name
                );
            }
            for key in &relationship.master_key {
                if master.field(key).is_none() {
                    bail!("💀 Master key '{}' is not a field of '{}'.", key, master.name);
                }
            }
            for key in slave_keys {
                if slave.field(key).is_none() {
                    bail!("💀 Slave key '{}' is not a field of '{}'.", key, slave.name);
                }
            }
        }
        Ok(())
    }
}
