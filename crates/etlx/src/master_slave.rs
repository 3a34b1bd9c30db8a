// ai
//! 👨‍👧‍👦 Master/Slave Composer — one-to-many denormalization.
//!
//! 🎬 COLD OPEN — INT. FAMILY REUNION — NOON
//!
//! The master row arrives with a name tag: `OrderId = 1`. Three slave rows are
//! already seated at the table with matching tags. The composer has two options:
//! seat the master three times, once beside each of them (repeat), or squeeze
//! everyone onto one bench and summarize (first / aggregate). Nobody's value is
//! recomputed. The composer only copies what the chains already decided. 🪑
//!
//! ## Knowledge Graph 🧠
//! - Slave rows are grouped by join key up front ([`SlaveGroups`]). They are already
//!   fully transformed and are never mutated.
//! - Keys compare by value in their native type: byte arrays element-wise, integers
//!   across widths, decimals without trailing zeros. A key with a null part never matches.
//! - Composed schema: master fields (same indices), then every output slave field except
//!   the join keys, optionally prefixed. Alias collisions are configuration errors.
//! - Left join (default): a master with no slaves is kept, slave columns get defaults.
//!   Inner join: it is dropped.
//!
//! 🦆

use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use uuid::Uuid;
use chrono::NaiveDateTime;

use crate::common::{Row, Value};
use crate::conversion::TypeTables;
use crate::schema::{EntitySchema, Field, FieldType, RelationshipConfig};

/// 🔗 What happens to a master row nobody claims.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    #[default]
    Left,
    Inner,
}

/// 📐 How slave rows land in the output.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputShape {
    /// one output row per matching slave row
    #[default]
    Repeat,
    /// one output row, values from the first matching slave
    First,
    /// one output row, each slave column folded by its [`AggregateFn`]
    Aggregate,
}

/// 🧮 How one slave column folds under [`OutputShape::Aggregate`].
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFn {
    #[default]
    First,
    Last,
    Concat,
    Min,
    Max,
    Count,
    Sum,
}

/// 🔑 One component of a join key, normalized so equal values hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Text(String),
    Char(char),
    Bool(bool),
    Int(i64),
    /// 🌊 non-integral doubles, by bit pattern
    Float(u64),
    /// 💰 non-integral decimals, normalized
    Decimal(Decimal),
    DateTime(NaiveDateTime),
    Guid(Uuid),
    Bytes(Vec<u8>),
    List(Vec<String>),
}

impl KeyPart {
    /// `None` for nulls: a null never joins anything.
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Null => return None,
            Value::String(s) => KeyPart::Text(s.clone()),
            Value::Char(c) => KeyPart::Char(*c),
            Value::Bool(b) => KeyPart::Bool(*b),
            Value::Int32(i) => KeyPart::Int(i64::from(*i)),
            Value::Int64(i) => KeyPart::Int(*i),
            Value::Double(d) => {
                if d.fract() == 0.0 && *d >= i64::MIN as f64 && *d < i64::MAX as f64 {
                    KeyPart::Int(*d as i64)
                } else {
                    // -- 🧊 -0.0 and 0.0 are caught above; NaN is its own weird little key
                    KeyPart::Float(d.to_bits())
                }
            }
            Value::Decimal(d) => match d.fract().is_zero().then(|| d.to_i64()).flatten() {
                Some(i) => KeyPart::Int(i),
                None => KeyPart::Decimal(d.normalize()),
            },
            Value::DateTime(dt) => KeyPart::DateTime(*dt),
            Value::Guid(g) => KeyPart::Guid(*g),
            Value::Bytes(b) => KeyPart::Bytes(b.clone()),
            Value::List(items) => KeyPart::List(items.clone()),
        })
    }
}

/// 🔑 A (possibly composite) join key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinKey(pub Vec<KeyPart>);

impl JoinKey {
    pub fn from_row(row: &Row, indices: &[usize]) -> Option<Self> {
        indices
            .iter()
            .map(|&index| KeyPart::from_value(&row[index]))
            .collect::<Option<Vec<_>>>()
            .map(JoinKey)
    }
}

/// 👥 Fully transformed slave rows, grouped by join key, in arrival order within a group.
#[derive(Debug, Clone, Default)]
pub struct SlaveGroups {
    groups: HashMap<JoinKey, Vec<Row>>,
    rows: usize,
}

impl SlaveGroups {
    pub fn from_rows<I>(rows: I, key_indices: &[usize]) -> Self
    where
        I: IntoIterator<Item = Row>,
    {
        let mut groups: HashMap<JoinKey, Vec<Row>> = HashMap::new();
        let mut count = 0;
        for row in rows {
            count += 1;
            if let Some(key) = JoinKey::from_row(&row, key_indices) {
                groups.entry(key).or_default().push(row);
            }
        }
        Self { groups, rows: count }
    }

    pub fn get(&self, key: &JoinKey) -> Option<&[Row]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// 🔢 Rows handed in, including the ones whose key had a null in it.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// 📌 Where one slave column comes from and how it lands.
#[derive(Debug, Clone)]
struct SlaveColumn {
    slave_index: usize,
    composed_index: usize,
    aggregate: AggregateFn,
    field_type: FieldType,
    default: Value,
}

/// 👨‍👧‍👦 Composes master rows with their slave groups for one relationship.
#[derive(Debug, Clone)]
pub struct MasterSlaveComposer {
    master: String,
    slave: String,
    master_keys: Vec<usize>,
    slave_keys: Vec<usize>,
    join: JoinKind,
    shape: OutputShape,
    separator: String,
    master_capacity: usize,
    columns: Vec<SlaveColumn>,
    schema: EntitySchema,
}

impl MasterSlaveComposer {
    pub fn new(
        relationship: &RelationshipConfig,
        master: &EntitySchema,
        slave: &EntitySchema,
        tables: &TypeTables,
    ) -> Result<Self> {
        let key_indices = |entity: &EntitySchema, keys: &[String]| -> Result<Vec<usize>> {
            keys.iter()
                .map(|key| {
                    entity
                        .field(key)
                        .map(|f| f.index)
                        .with_context(|| format!("💀 Join key '{}' is not a field of '{}'.", key, entity.name))
                })
                .collect()
        };
        let master_keys = key_indices(master, &relationship.master_key)?;
        let slave_key_names = if relationship.slave_key.is_empty() {
            &relationship.master_key
        } else {
            &relationship.slave_key
        };
        let slave_keys = key_indices(slave, slave_key_names)?;
        if master_keys.is_empty() || master_keys.len() != slave_keys.len() {
            bail!(
                "💀 Relationship {} -> {} needs the same non-zero number of keys on both sides.",
                master.name,
                slave.name
            );
        }

        let mut fields: Vec<Field> = master.fields().to_vec();
        let mut planned: Vec<(usize, AggregateFn, FieldType)> = Vec::new();
        for slave_field in slave.fields() {
            if !slave_field.is_output() || slave_keys.contains(&slave_field.index) {
                continue;
            }
            let aggregate = match relationship.shape {
                OutputShape::Aggregate => relationship
                    .aggregates
                    .iter()
                    .find(|(alias, _)| slave_field.matches(alias))
                    .map(|(_, aggregate)| *aggregate)
                    .unwrap_or_default(),
                _ => AggregateFn::First,
            };
            let field_type = aggregated_type(aggregate, slave_field.field_type);
            let mut composed = slave_field.clone();
            composed.alias = match &relationship.prefix {
                Some(prefix) => format!("{prefix}{}", slave_field.alias),
                None => slave_field.alias.clone(),
            };
            composed.calculated = false;
            composed.input = false;
            composed.transforms.clear();
            if field_type != slave_field.field_type {
                composed.field_type = field_type;
                composed.default = None;
            }
            planned.push((slave_field.index, aggregate, field_type));
            fields.push(composed);
        }

        let mut schema = EntitySchema::new(master.name.clone(), fields).with_context(|| {
            format!(
                "💀 Composing '{}' into '{}' collides with an existing alias. Give the relationship a prefix.",
                slave.name, master.name
            )
        })?;
        schema.alias = master.alias.clone();
        schema.log_interval = master.log_interval;

        let mut columns = Vec::with_capacity(planned.len());
        for (offset, (slave_index, aggregate, field_type)) in planned.into_iter().enumerate() {
            let composed_index = master.capacity() + offset;
            let default = match aggregate {
                AggregateFn::Count => Value::Int64(0),
                _ => schema.fields()[composed_index].default_value(tables)?,
            };
            columns.push(SlaveColumn {
                slave_index,
                composed_index,
                aggregate,
                field_type,
                default,
            });
        }

        Ok(Self {
            master: master.name.clone(),
            slave: slave.name.clone(),
            master_keys,
            slave_keys,
            join: relationship.join,
            shape: relationship.shape,
            separator: relationship.separator.clone(),
            master_capacity: master.capacity(),
            columns,
            schema,
        })
    }

    /// 🧱 The master's schema after composition: master fields, then the slave columns.
    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn master(&self) -> &str {
        &self.master
    }

    pub fn slave(&self) -> &str {
        &self.slave
    }

    /// 👥 Group fully transformed slave rows by this relationship's slave key.
    pub fn group<I>(&self, slave_rows: I) -> SlaveGroups
    where
        I: IntoIterator<Item = Row>,
    {
        SlaveGroups::from_rows(slave_rows, &self.slave_keys)
    }

    /// 🪑 One master row in, zero or more composed rows out.
    pub fn compose(&self, master: Row, groups: &SlaveGroups) -> Vec<Row> {
        let group = JoinKey::from_row(&master, &self.master_keys)
            .and_then(|key| groups.get(&key))
            .filter(|rows| !rows.is_empty());

        let Some(slaves) = group else {
            return match self.join {
                JoinKind::Inner => Vec::new(),
                JoinKind::Left => vec![self.extend(&master, |column| column.default.clone())],
            };
        };

        match self.shape {
            OutputShape::Repeat => slaves
                .iter()
                .map(|slave| self.extend(&master, |column| slave[column.slave_index].clone()))
                .collect(),
            OutputShape::First => {
                vec![self.extend(&master, |column| slaves[0][column.slave_index].clone())]
            }
            OutputShape::Aggregate => {
                vec![self.extend(&master, |column| self.aggregate(column, slaves))]
            }
        }
    }

    /// 🌊 Compose a whole master stream lazily. Relative master order is kept.
    pub fn compose_all<'c, I>(&'c self, masters: I, groups: &'c SlaveGroups) -> impl Iterator<Item = Row> + 'c
    where
        I: IntoIterator<Item = Row>,
        I::IntoIter: 'c,
    {
        masters.into_iter().flat_map(move |master| self.compose(master, groups))
    }

    fn extend(&self, master: &Row, mut slave_value: impl FnMut(&SlaveColumn) -> Value) -> Row {
        let mut composed = Row::with_capacity(self.schema.capacity());
        for index in 0..self.master_capacity {
            composed.set(index, master[index].clone());
        }
        for column in &self.columns {
            composed.set(column.composed_index, slave_value(column));
        }
        composed
    }

    fn aggregate(&self, column: &SlaveColumn, slaves: &[Row]) -> Value {
        let mut values = slaves
            .iter()
            .map(|slave| &slave[column.slave_index])
            .filter(|value| !value.is_null());
        match column.aggregate {
            AggregateFn::First => values.next().cloned().unwrap_or_else(|| column.default.clone()),
            AggregateFn::Last => values.last().cloned().unwrap_or_else(|| column.default.clone()),
            AggregateFn::Count => Value::Int64(slaves.len() as i64),
            AggregateFn::Concat => Value::String(
                values
                    .map(|value| value.to_string())
                    .collect::<Vec<_>>()
                    .join(&self.separator),
            ),
            AggregateFn::Min => values
                .min_by(|a, b| a.loose_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                .cloned()
                .unwrap_or_else(|| column.default.clone()),
            AggregateFn::Max => values
                .max_by(|a, b| a.loose_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                .cloned()
                .unwrap_or_else(|| column.default.clone()),
            AggregateFn::Sum if column.field_type == FieldType::Double => {
                Value::Double(values.filter_map(Value::as_f64).sum())
            }
            AggregateFn::Sum => Value::Decimal(
                values
                    .filter_map(Value::as_decimal)
                    .fold(Decimal::ZERO, |total, value| total.saturating_add(value)),
            ),
        }
    }
}

/// 🏷️ The composed column type for an aggregate over a slave field of type `field_type`.
fn aggregated_type(aggregate: AggregateFn, field_type: FieldType) -> FieldType {
    match aggregate {
        AggregateFn::Concat => FieldType::String,
        AggregateFn::Count => FieldType::Int64,
        AggregateFn::Sum if field_type == FieldType::Double => FieldType::Double,
        AggregateFn::Sum => FieldType::Decimal,
        _ => field_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn orders() -> anyhow::Result<EntitySchema> {
        EntitySchema::new(
            "Orders",
            vec![Field::new("OrderId", FieldType::Int32), Field::new("Customer", FieldType::String)],
        )
    }

    fn lines() -> anyhow::Result<EntitySchema> {
        EntitySchema::new(
            "Lines",
            vec![
                Field::new("OrderId", FieldType::Int64),
                Field::new("Sku", FieldType::String),
                Field::new("Qty", FieldType::Int32),
            ],
        )
    }

    fn relationship(shape: OutputShape, join: JoinKind) -> RelationshipConfig {
        RelationshipConfig {
            master: "Orders".to_string(),
            slave: "Lines".to_string(),
            master_key: vec!["OrderId".to_string()],
            slave_key: Vec::new(),
            join,
            shape,
            aggregates: BTreeMap::new(),
            separator: ", ".to_string(),
            prefix: None,
        }
    }

    fn order(id: i32, customer: &str) -> Row {
        Row::from_values(vec![Value::Int32(id), Value::from(customer)])
    }

    fn line(order: i64, sku: &str, qty: i32) -> Row {
        Row::from_values(vec![Value::Int64(order), Value::from(sku), Value::Int32(qty)])
    }

    fn three_lines_for_order_one() -> Vec<Row> {
        vec![line(1, "apple", 1), line(1, "pear", 2), line(2, "plum", 9), line(1, "fig", 3)]
    }

    #[test]
    fn the_one_where_the_master_sits_down_three_times() -> anyhow::Result<()> {
        let the_composer = MasterSlaveComposer::new(
            &relationship(OutputShape::Repeat, JoinKind::Left),
            &orders()?,
            &lines()?,
            &TypeTables::standard(),
        )?;
        let the_groups = the_composer.group(three_lines_for_order_one());
        let the_rows = the_composer.compose(order(1, "monica"), &the_groups);

        assert_eq!(the_rows.len(), 3);
        for row in &the_rows {
            assert_eq!(row[0], Value::Int32(1));
            assert_eq!(row[1], Value::from("monica"));
        }
        let skus: Vec<&Value> = the_rows.iter().map(|r| &r[2]).collect();
        assert_eq!(skus, vec![&Value::from("apple"), &Value::from("pear"), &Value::from("fig")]);
        assert_eq!(
            the_composer.schema().fields().iter().map(|f| f.alias.as_str()).collect::<Vec<_>>(),
            vec!["OrderId", "Customer", "Sku", "Qty"],
            "the slave join key is not repeated"
        );
        Ok(())
    }

    #[test]
    fn the_one_where_nobody_came_to_the_party() -> anyhow::Result<()> {
        let the_left = MasterSlaveComposer::new(
            &relationship(OutputShape::Repeat, JoinKind::Left),
            &orders()?,
            &lines()?,
            &TypeTables::standard(),
        )?;
        let the_groups = the_left.group(three_lines_for_order_one());
        let the_rows = the_left.compose(order(7, "phoebe"), &the_groups);
        assert_eq!(the_rows.len(), 1);
        assert_eq!(the_rows[0][2], Value::from(""), "slave columns get their defaults");
        assert_eq!(the_rows[0][3], Value::Int32(0));

        let the_inner = MasterSlaveComposer::new(
            &relationship(OutputShape::Repeat, JoinKind::Inner),
            &orders()?,
            &lines()?,
            &TypeTables::standard(),
        )?;
        assert!(the_inner.compose(order(7, "phoebe"), &the_groups).is_empty());
        Ok(())
    }

    #[test]
    fn the_one_where_everyone_squeezes_onto_one_bench() -> anyhow::Result<()> {
        let mut the_relationship = relationship(OutputShape::Aggregate, JoinKind::Left);
        the_relationship.aggregates = BTreeMap::from([
            ("Sku".to_string(), AggregateFn::Concat),
            ("Qty".to_string(), AggregateFn::Sum),
        ]);
        the_relationship.prefix = Some("Line".to_string());
        let the_composer =
            MasterSlaveComposer::new(&the_relationship, &orders()?, &lines()?, &TypeTables::standard())?;
        let the_groups = the_composer.group(three_lines_for_order_one());
        let the_rows: Vec<Row> = the_composer
            .compose_all(vec![order(2, "joey"), order(1, "chandler")], &the_groups)
            .collect();

        assert_eq!(the_rows.len(), 2);
        assert_eq!(the_rows[0][2], Value::from("plum"));
        assert_eq!(the_rows[1][1], Value::from("chandler"), "master order kept");
        assert_eq!(the_rows[1][2], Value::from("apple, pear, fig"));
        assert_eq!(the_rows[1][3], Value::Decimal(Decimal::from(6)));
        assert!(the_composer.schema().field("LineQty").is_some());
        Ok(())
    }

    #[test]
    fn the_one_where_bytes_are_compared_byte_by_byte() {
        let a = Row::from_values(vec![Value::Bytes(vec![1, 2, 3])]);
        let b = Row::from_values(vec![Value::Bytes(vec![1, 2, 3])]);
        assert_eq!(JoinKey::from_row(&a, &[0]), JoinKey::from_row(&b, &[0]));
        assert_eq!(
            KeyPart::from_value(&Value::Decimal(Decimal::new(100, 2))),
            KeyPart::from_value(&Value::Int32(1))
        );
        assert_eq!(KeyPart::from_value(&Value::Null), None);
    }

    #[test]
    fn the_one_where_a_double_too_big_for_i64_keeps_its_own_key() {
        // -- 2^63 is one past i64::MAX; `as i64` would saturate it onto i64::MAX
        let the_big_double = 9_223_372_036_854_775_808.0_f64;
        assert_ne!(
            KeyPart::from_value(&Value::Double(the_big_double)),
            KeyPart::from_value(&Value::Int64(i64::MAX))
        );
        assert_eq!(
            KeyPart::from_value(&Value::Double(-9_223_372_036_854_775_808.0)),
            KeyPart::from_value(&Value::Int64(i64::MIN))
        );
        assert_eq!(
            KeyPart::from_value(&Value::Double(42.0)),
            KeyPart::from_value(&Value::Int64(42))
        );
    }

    #[test]
    fn the_one_where_two_columns_want_the_same_name() -> anyhow::Result<()> {
        let slave = EntitySchema::new(
            "Lines",
            vec![Field::new("OrderId", FieldType::Int32), Field::new("Customer", FieldType::String)],
        )?;
        let the_result = MasterSlaveComposer::new(
            &relationship(OutputShape::First, JoinKind::Left),
            &orders()?,
            &slave,
            &TypeTables::standard(),
        );
        assert!(the_result.is_err());
        Ok(())
    }
}
