// ai
//! 📦 Common data structures — the building blocks of etlx
//!
//! ---
//!
//! 🎬 INT. ROW FACTORY — NIGHT SHIFT
//!
//! 🌩️  The conveyor hums. A lone cursor blinks. Somewhere a reader has just
//! produced a row. It has eleven slots. It knows its place in the world by
//! *index*, not by name, because names are for people and indexes are for
//! people in a hurry.
//!
//! ✅ This module defines the humble yet load-bearing types that every other
//! module leans on: [`Value`] (one cell), [`Row`] (one record, fixed width),
//! [`RowFactory`] (the row maternity ward) and [`RowBatch`] (the shopping cart
//! that ferries rows between workers).
//!
//! 🧠 Knowledge graph:
//! - `Row` is addressed by `Field::index`, assigned once when the schema is finalized.
//! - A row is exclusively owned by whoever is processing it. The pipeline takes it
//!   by value, mutates it in place, and hands it on. No one keeps a copy "just in case".
//! - `Value` is a tagged variant so a transform can tell an `Int32(4)` from a `"4"`.
//!
//! 🦆

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Index, IndexMut};

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use uuid::Uuid;

use crate::schema::{Field, FieldType};

/// 📅 The one true text form of a datetime in this crate. Fractions only show up when they exist.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// 🎯 One cell of data. Tagged, typed, and unbothered by your feelings about dynamic typing.
///
/// Every [`FieldType`] has exactly one variant here, plus `Null` (the cell is empty)
/// and `List` (what `split` produces, because some values come in packs).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    String(String),
    Char(char),
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Decimal(Decimal),
    DateTime(NaiveDateTime),
    Guid(Uuid),
    Bytes(Vec<u8>),
    List(Vec<String>),
}

impl Value {
    /// 🏷️ The semantic type this value carries. `Null` has no type — it is the void.
    pub fn field_type(&self) -> Option<FieldType> {
        Some(match self {
            Value::Null => return None,
            Value::String(_) => FieldType::String,
            Value::Char(_) => FieldType::Char,
            Value::Bool(_) => FieldType::Boolean,
            Value::Int32(_) => FieldType::Int32,
            Value::Int64(_) => FieldType::Int64,
            Value::Double(_) => FieldType::Double,
            Value::Decimal(_) => FieldType::Decimal,
            Value::DateTime(_) => FieldType::DateTime,
            Value::Guid(_) => FieldType::Guid,
            Value::Bytes(_) => FieldType::ByteArray,
            Value::List(_) => FieldType::Object,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Decimal(_)
        )
    }

    /// 🔢 Numeric view as `f64`, for the transforms that do math and the comparisons that need it.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(i) => Some(f64::from(*i)),
            Value::Int64(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// 💰 Numeric view as `Decimal`. Doubles that are NaN or infinite have no decimal form.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int32(i) => Some(Decimal::from(*i)),
            Value::Int64(i) => Some(Decimal::from(*i)),
            Value::Double(d) => Decimal::from_f64(*d),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// ⚖️ Ordering across the loose family of values.
    ///
    /// Numbers compare as numbers regardless of width (an `Int32(2)` equals a `Double(2.0)`),
    /// text compares as text, and anything else that shares a type compares natively.
    /// Mixed, non-numeric pairs fall back to comparing their text forms, which is what a
    /// config author typing `iif(Code = 5, ...)` against a string field expects.
    pub fn loose_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (a, b) if a.is_numeric() && b.is_numeric() => match (a, b) {
                (Value::Double(_), _) | (_, Value::Double(_)) => {
                    a.as_f64()?.partial_cmp(&b.as_f64()?)
                }
                _ => a.as_decimal()?.partial_cmp(&b.as_decimal()?),
            },
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Guid(a), Value::Guid(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (a, b) => Some(a.to_string().cmp(&b.to_string())),
        }
    }

    /// 📡 The JSON face of a value, for renderers and for anyone who enjoys curly braces.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::String(s) => Json::String(s.clone()),
            Value::Char(c) => Json::String(c.to_string()),
            Value::Bool(b) => Json::Bool(*b),
            Value::Int32(i) => Json::from(*i),
            Value::Int64(i) => Json::from(*i),
            // -- 🐛 NaN has no JSON spelling. serde_json says null, and honestly, fair.
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Decimal(d) => d
                .to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(Json::Number)
                .unwrap_or_else(|| Json::String(d.to_string())),
            Value::List(items) => {
                Json::Array(items.iter().cloned().map(Json::String).collect())
            }
            other => Json::String(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::String(s) => f.write_str(s),
            Value::Char(c) => write!(f, "{c}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int32(i) => write!(f, "{i}"),
            Value::Int64(i) => write!(f, "{i}"),
            // -- ✅ Rust prints 3.0_f64 as "3". exactly what a human wants. rare W.
            Value::Double(d) => write!(f, "{d}"),
            Value::Decimal(d) => write!(f, "{}", d.normalize()),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Value::Guid(g) => write!(f, "{g}"),
            Value::Bytes(b) => f.write_str(&hex::encode_upper(b)),
            Value::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// 🎯 A singular `Row` — one record, one destiny, a fixed number of slots.
///
/// The storage is a boxed slice, so it literally cannot grow. A row is born with
/// `capacity` slots and dies with `capacity` slots. Like a parking lot with no
/// expansion permits.
///
/// ⚠️ Indexing past `capacity` panics: that is an invalid access and a schema bug, not a
/// data problem. Use [`Row::get`] when you genuinely don't know.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    storage: Box<[Value]>,
}

impl Row {
    /// 🏗️ A row of `capacity` nulls. The blank canvas. The empty apartment.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![Value::Null; capacity].into_boxed_slice(),
        }
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            storage: values.into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.storage.get(index)
    }

    /// 🔄 Overwrite one slot. Returns the previous occupant, evicted without ceremony.
    pub fn set(&mut self, index: usize, value: Value) -> Value {
        std::mem::replace(&mut self.storage[index], value)
    }

    pub fn values(&self) -> &[Value] {
        &self.storage
    }

    pub fn into_values(self) -> Vec<Value> {
        self.storage.into_vec()
    }
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.storage[index]
    }
}

impl IndexMut<usize> for Row {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.storage[index]
    }
}

impl Index<&Field> for Row {
    type Output = Value;

    fn index(&self, field: &Field) -> &Self::Output {
        &self.storage[field.index]
    }
}

impl IndexMut<&Field> for Row {
    fn index_mut(&mut self, field: &Field) -> &mut Self::Output {
        &mut self.storage[field.index]
    }
}

/// 🏭 The row maternity ward. Every row it delivers is sized to the entity and
/// pre-filled with the entity's defaults, which were converted exactly once.
#[derive(Debug, Clone)]
pub struct RowFactory {
    defaults: Vec<Value>,
}

impl RowFactory {
    pub fn new(defaults: Vec<Value>) -> Self {
        Self { defaults }
    }

    pub fn capacity(&self) -> usize {
        self.defaults.len()
    }

    /// 🚀 A fresh row full of defaults. What the default row reader hands out.
    pub fn create(&self) -> Row {
        Row::from_values(self.defaults.clone())
    }

    /// 💤 A fresh row full of nothing.
    pub fn create_empty(&self) -> Row {
        Row::with_capacity(self.capacity())
    }
}

/// 📦 A `RowBatch` — because one row is never enough.
///
/// Think of it as a shopping cart, except everything in the cart is a row and the
/// cart rides an async channel from the source worker to the sink worker.
#[derive(Debug, Clone, Default)]
pub struct RowBatch {
    pub rows: Vec<Row>,
}

impl RowBatch {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
