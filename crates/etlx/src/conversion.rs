// ai
//! 🔄 Conversion & comparison tables — the Rosetta Stone of etlx.
//!
//! 🎬 *[a string "42" enters the room. an Int32 leaves. nobody saw what happened inside.]*
//!
//! [`TypeTables`] bundles three lookup tables that every other part of the crate
//! leans on:
//! - **converters**: `FieldType` → `fn(&str) -> Result<Value>` (text in, typed value out)
//! - **comparers**: [`ComparisonOperator`] → `fn(&Value, &Value) -> bool`
//! - **defaults**: `FieldType` → the value a field gets when nobody told it otherwise
//!
//! 🧠 Knowledge graph:
//! - Built once with [`TypeTables::standard`], shared by reference (`Arc` in the runtime).
//! - No globals. Tests swap a converter with [`TypeTables::with_converter`] and nobody else notices.
//! - Numbers compare across widths (`Int32(2) == Double(2.0)`) via [`Value::loose_cmp`].
//!
//! 🦆

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use uuid::Uuid;

use crate::common::Value;
use crate::schema::FieldType;

/// 🔧 text → typed value
pub type Converter = fn(&str) -> Result<Value>;
/// ⚖️ left, right → verdict
pub type Comparer = fn(&Value, &Value) -> bool;

/// ⚖️ Comparison operators accepted by `iif` and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    StartsWith,
    Contains,
    EndsWith,
}

impl ComparisonOperator {
    /// 🔍 Longest symbols first, so `>=` never gets mistaken for `>` followed by `=`.
    pub const SYMBOLS: [(&'static str, ComparisonOperator); 10] = [
        ("==", ComparisonOperator::Equal),
        ("!=", ComparisonOperator::NotEqual),
        (">=", ComparisonOperator::GreaterThanEqual),
        ("<=", ComparisonOperator::LessThanEqual),
        ("^=", ComparisonOperator::StartsWith),
        ("*=", ComparisonOperator::Contains),
        ("$=", ComparisonOperator::EndsWith),
        ("=", ComparisonOperator::Equal),
        (">", ComparisonOperator::GreaterThan),
        ("<", ComparisonOperator::LessThan),
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "!=",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanEqual => ">=",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanEqual => "<=",
            ComparisonOperator::StartsWith => "^=",
            ComparisonOperator::Contains => "*=",
            ComparisonOperator::EndsWith => "$=",
        }
    }

    /// 🔎 Split `left op right` at the first top-level operator.
    ///
    /// Returns `None` when the expression has no operator at all, which callers treat
    /// as "this isn't a comparison, it's a vibe".
    pub fn split_expression(expression: &str) -> Option<(&str, ComparisonOperator, &str)> {
        for (position, _) in expression.char_indices() {
            for (symbol, operator) in Self::SYMBOLS {
                if expression[position..].starts_with(symbol) {
                    let left = expression[..position].trim();
                    let right = expression[position + symbol.len()..].trim();
                    if left.is_empty() || right.is_empty() {
                        return None;
                    }
                    return Some((left, operator, right));
                }
            }
        }
        None
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ComparisonOperator {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if let Some((_, operator)) = Self::SYMBOLS.iter().find(|(symbol, _)| *symbol == trimmed) {
            return Ok(*operator);
        }
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "equal" | "equals" | "eq" => ComparisonOperator::Equal,
            "notequal" | "ne" => ComparisonOperator::NotEqual,
            "greaterthan" | "gt" => ComparisonOperator::GreaterThan,
            "greaterthanequal" | "ge" | "gte" => ComparisonOperator::GreaterThanEqual,
            "lessthan" | "lt" => ComparisonOperator::LessThan,
            "lessthanequal" | "le" | "lte" => ComparisonOperator::LessThanEqual,
            "startswith" => ComparisonOperator::StartsWith,
            "contains" => ComparisonOperator::Contains,
            "endswith" => ComparisonOperator::EndsWith,
            other => bail!("💀 '{other}' is not a comparison operator. We checked twice."),
        })
    }
}

/// 📚 The three tables. Cheap to clone (fn pointers and a handful of values).
#[derive(Debug, Clone)]
pub struct TypeTables {
    converters: HashMap<FieldType, Converter>,
    comparers: HashMap<ComparisonOperator, Comparer>,
    defaults: HashMap<FieldType, Value>,
}

impl Default for TypeTables {
    fn default() -> Self {
        Self::standard()
    }
}

impl TypeTables {
    /// 🏗️ The tables every process starts with.
    pub fn standard() -> Self {
        let converters: HashMap<FieldType, Converter> = HashMap::from([
            (FieldType::String, convert_string as Converter),
            (FieldType::Object, convert_string as Converter),
            (FieldType::Char, convert_char as Converter),
            (FieldType::Boolean, convert_bool as Converter),
            (FieldType::Int32, convert_int32 as Converter),
            (FieldType::Int64, convert_int64 as Converter),
            (FieldType::Double, convert_double as Converter),
            (FieldType::Decimal, convert_decimal as Converter),
            (FieldType::DateTime, convert_datetime as Converter),
            (FieldType::Guid, convert_guid as Converter),
            (FieldType::ByteArray, convert_bytes as Converter),
        ]);

        let comparers: HashMap<ComparisonOperator, Comparer> = HashMap::from([
            (ComparisonOperator::Equal, compare_equal as Comparer),
            (ComparisonOperator::NotEqual, compare_not_equal as Comparer),
            (ComparisonOperator::GreaterThan, compare_greater as Comparer),
            (ComparisonOperator::GreaterThanEqual, compare_greater_equal as Comparer),
            (ComparisonOperator::LessThan, compare_less as Comparer),
            (ComparisonOperator::LessThanEqual, compare_less_equal as Comparer),
            (ComparisonOperator::StartsWith, compare_starts_with as Comparer),
            (ComparisonOperator::Contains, compare_contains as Comparer),
            (ComparisonOperator::EndsWith, compare_ends_with as Comparer),
        ]);

        // -- 📅 1900-01-01, the traditional "nobody told us the date" date
        let epoch_of_shrugs = NaiveDate::from_ymd_opt(1900, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Value::DateTime)
            .unwrap_or(Value::Null);

        let defaults = HashMap::from([
            (FieldType::String, Value::String(String::new())),
            (FieldType::Char, Value::Char(' ')),
            (FieldType::Boolean, Value::Bool(false)),
            (FieldType::Int32, Value::Int32(0)),
            (FieldType::Int64, Value::Int64(0)),
            (FieldType::Double, Value::Double(0.0)),
            (FieldType::Decimal, Value::Decimal(Decimal::ZERO)),
            (FieldType::DateTime, epoch_of_shrugs),
            (FieldType::Guid, Value::Guid(Uuid::nil())),
            (FieldType::ByteArray, Value::Bytes(Vec::new())),
            (FieldType::Object, Value::Null),
        ]);

        Self {
            converters,
            comparers,
            defaults,
        }
    }

    /// 🔧 Swap one converter. The rest of the table stays exactly as it was.
    pub fn with_converter(mut self, field_type: FieldType, converter: Converter) -> Self {
        self.converters.insert(field_type, converter);
        self
    }

    pub fn with_default(mut self, field_type: FieldType, value: Value) -> Self {
        self.defaults.insert(field_type, value);
        self
    }

    /// 🔄 Text to typed value. The error names the type so the caller can name the field.
    pub fn convert(&self, field_type: FieldType, raw: &str) -> Result<Value> {
        let converter = self
            .converters
            .get(&field_type)
            .with_context(|| format!("💀 No converter registered for type {field_type}."))?;
        converter(raw).with_context(|| format!("'{raw}' is not a valid {field_type}"))
    }

    /// 🔄 Typed value to another type. Same type is a clone; numbers cross widths
    /// directly; everything else goes through its text form.
    pub fn coerce(&self, field_type: FieldType, value: &Value) -> Result<Value> {
        if value.is_null() || value.field_type() == Some(field_type) {
            return Ok(value.clone());
        }
        match (field_type, value) {
            (FieldType::String, Value::List(_)) | (FieldType::Object, _) => Ok(value.clone()),
            (FieldType::Int32, v) if v.is_numeric() => {
                let rounded = v.as_decimal().map(|d| d.round()).and_then(|d| d.to_i32());
                rounded
                    .map(Value::Int32)
                    .ok_or_else(|| anyhow!("{value} does not fit in an int32"))
            }
            (FieldType::Int64, v) if v.is_numeric() => {
                let rounded = v.as_decimal().map(|d| d.round()).and_then(|d| d.to_i64());
                rounded
                    .map(Value::Int64)
                    .ok_or_else(|| anyhow!("{value} does not fit in an int64"))
            }
            (FieldType::Double, v) if v.is_numeric() => v
                .as_f64()
                .map(Value::Double)
                .ok_or_else(|| anyhow!("{value} is not a double")),
            (FieldType::Decimal, Value::Double(d)) => Decimal::from_f64(*d)
                .map(Value::Decimal)
                .ok_or_else(|| anyhow!("{d} has no decimal form")),
            (FieldType::Decimal, v) if v.is_numeric() => v
                .as_decimal()
                .map(Value::Decimal)
                .ok_or_else(|| anyhow!("{value} is not a decimal")),
            (FieldType::Boolean, v) if v.is_numeric() => Ok(Value::Bool(v.as_f64() != Some(0.0))),
            _ => self.convert(field_type, &value.to_string()),
        }
    }

    /// ⚖️ Apply an operator. Unknown operators (impossible with the standard table) compare false.
    pub fn compare(&self, operator: ComparisonOperator, left: &Value, right: &Value) -> bool {
        self.comparers
            .get(&operator)
            .map(|comparer| comparer(left, right))
            .unwrap_or(false)
    }

    pub fn default_for(&self, field_type: FieldType) -> Value {
        self.defaults.get(&field_type).cloned().unwrap_or_default()
    }
}

fn compare_equal(left: &Value, right: &Value) -> bool {
    left.loose_cmp(right) == Some(Ordering::Equal)
}

fn compare_not_equal(left: &Value, right: &Value) -> bool {
    !compare_equal(left, right)
}

fn compare_greater(left: &Value, right: &Value) -> bool {
    left.loose_cmp(right) == Some(Ordering::Greater)
}

fn compare_greater_equal(left: &Value, right: &Value) -> bool {
    matches!(left.loose_cmp(right), Some(Ordering::Greater | Ordering::Equal))
}

fn compare_less(left: &Value, right: &Value) -> bool {
    left.loose_cmp(right) == Some(Ordering::Less)
}

fn compare_less_equal(left: &Value, right: &Value) -> bool {
    matches!(left.loose_cmp(right), Some(Ordering::Less | Ordering::Equal))
}

// -- 🔤 the text operators don't care about types. everything is a string if you squint.
fn compare_starts_with(left: &Value, right: &Value) -> bool {
    left.to_string().starts_with(&right.to_string())
}

fn compare_contains(left: &Value, right: &Value) -> bool {
    left.to_string().contains(&right.to_string())
}

fn compare_ends_with(left: &Value, right: &Value) -> bool {
    left.to_string().ends_with(&right.to_string())
}

fn convert_string(raw: &str) -> Result<Value> {
    Ok(Value::String(raw.to_string()))
}

fn convert_char(raw: &str) -> Result<Value> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Value::Char(c)),
        _ => bail!("a char is exactly one character, not {}", raw.chars().count()),
    }
}

fn convert_bool(raw: &str) -> Result<Value> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "t" => Ok(Value::Bool(true)),
        "false" | "0" | "no" | "n" | "f" | "" => Ok(Value::Bool(false)),
        other => bail!("'{other}' is neither true nor false"),
    }
}

fn convert_int32(raw: &str) -> Result<Value> {
    Ok(Value::Int32(raw.trim().parse()?))
}

fn convert_int64(raw: &str) -> Result<Value> {
    Ok(Value::Int64(raw.trim().parse()?))
}

fn convert_double(raw: &str) -> Result<Value> {
    Ok(Value::Double(raw.trim().parse()?))
}

fn convert_decimal(raw: &str) -> Result<Value> {
    let trimmed = raw.trim().replace(',', "");
    let trimmed = trimmed.trim_start_matches('$');
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map(Value::Decimal)
        .map_err(|e| anyhow!(e))
}

fn convert_datetime(raw: &str) -> Result<Value> {
    const DATETIME_SHAPES: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %I:%M:%S %p",
    ];
    const DATE_SHAPES: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y%m%d"];

    let trimmed = raw.trim();
    for shape in DATETIME_SHAPES {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, shape) {
            return Ok(Value::DateTime(parsed));
        }
    }
    for shape in DATE_SHAPES {
        if let Some(parsed) = NaiveDate::parse_from_str(trimmed, shape)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Ok(Value::DateTime(parsed));
        }
    }
    // -- 🌍 offsets are flattened to UTC. naive in, naive out.
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| Value::DateTime(dt.naive_utc()))
        .map_err(|_| anyhow!("no date shape we know matches '{trimmed}'"))
}

fn convert_guid(raw: &str) -> Result<Value> {
    Ok(Value::Guid(Uuid::parse_str(raw.trim())?))
}

fn convert_bytes(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    Ok(Value::Bytes(hex::decode(digits)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_text_becomes_every_type_it_claims_to_be() -> Result<()> {
        let tables = TypeTables::standard();
        assert_eq!(tables.convert(FieldType::Int32, " 42 ")?, Value::Int32(42));
        assert_eq!(tables.convert(FieldType::Boolean, "Yes")?, Value::Bool(true));
        assert_eq!(
            tables.convert(FieldType::Decimal, "1,234.50")?,
            Value::Decimal(Decimal::new(123450, 2))
        );
        assert_eq!(
            tables.convert(FieldType::ByteArray, "0x0AFF")?,
            Value::Bytes(vec![0x0A, 0xFF])
        );
        let the_date = tables.convert(FieldType::DateTime, "2013-09-30")?;
        assert_eq!(the_date.to_string(), "2013-09-30 00:00:00");
        assert!(tables.convert(FieldType::Int32, "forty-two").is_err());
        assert!(tables.convert(FieldType::Char, "ab").is_err());
        Ok(())
    }

    #[test]
    fn the_one_where_numbers_cross_widths_without_a_passport() -> Result<()> {
        let tables = TypeTables::standard();
        assert_eq!(tables.coerce(FieldType::Int32, &Value::Double(3.0))?, Value::Int32(3));
        assert_eq!(
            tables.coerce(FieldType::Decimal, &Value::Int32(7))?,
            Value::Decimal(Decimal::from(7))
        );
        assert_eq!(tables.coerce(FieldType::String, &Value::Int64(9))?, Value::from("9"));
        assert_eq!(tables.coerce(FieldType::Int32, &Value::from("12"))?, Value::Int32(12));
        assert_eq!(tables.coerce(FieldType::Int32, &Value::Null)?, Value::Null);
        Ok(())
    }

    #[test]
    fn the_one_where_every_operator_has_an_opinion() {
        let tables = TypeTables::standard();
        let two = Value::Int32(2);
        assert!(tables.compare(ComparisonOperator::Equal, &two, &Value::Double(2.0)));
        assert!(tables.compare(ComparisonOperator::GreaterThanEqual, &two, &Value::Int64(2)));
        assert!(tables.compare(ComparisonOperator::LessThan, &two, &Value::Int32(3)));
        assert!(tables.compare(
            ComparisonOperator::StartsWith,
            &Value::from("Transformalize"),
            &Value::from("Trans")
        ));
        assert!(tables.compare(ComparisonOperator::Contains, &Value::from("abc"), &Value::from("b")));
        assert!(!tables.compare(ComparisonOperator::EndsWith, &Value::from("abc"), &Value::from("b")));
    }

    #[test]
    fn the_one_where_expressions_split_at_the_longest_operator() {
        assert_eq!(
            ComparisonOperator::split_expression("Field1>=Field2"),
            Some(("Field1", ComparisonOperator::GreaterThanEqual, "Field2"))
        );
        assert_eq!(
            ComparisonOperator::split_expression("Name ^= Tr"),
            Some(("Name", ComparisonOperator::StartsWith, "Tr"))
        );
        assert_eq!(ComparisonOperator::split_expression("no operator here"), None);
        assert_eq!("gte".parse::<ComparisonOperator>().ok(), Some(ComparisonOperator::GreaterThanEqual));
    }

    #[test]
    fn the_one_where_a_test_swaps_in_its_own_converter() -> Result<()> {
        fn shouty(raw: &str) -> Result<Value> {
            Ok(Value::String(raw.to_uppercase()))
        }
        let tables = TypeTables::standard().with_converter(FieldType::String, shouty);
        assert_eq!(tables.convert(FieldType::String, "quiet")?, Value::from("QUIET"));
        assert_eq!(tables.convert(FieldType::Int32, "1")?, Value::Int32(1));
        Ok(())
    }
}
