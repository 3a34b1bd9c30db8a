//! 🏷️ Field types — the semantic labels we slap on every column.
//!
//! Config authors type `int`, `Int32`, `System.Int32`, `long`, `bool`, `byte[]`...
//! and we nod politely and map them all onto one small enum. 🦆

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 🏷️ The semantic type of a field. Defaults to `String`, because everything is a string
/// if you squint hard enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    #[default]
    String,
    Char,
    Boolean,
    Int32,
    Int64,
    Double,
    Decimal,
    DateTime,
    Guid,
    ByteArray,
    /// 📦 untyped / list-valued. what `split` returns. what `js` returns when it's feeling mysterious.
    Object,
}

impl FieldType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Int32 | FieldType::Int64 | FieldType::Double | FieldType::Decimal
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(self, FieldType::String | FieldType::Char)
    }

    pub fn is_date(&self) -> bool {
        matches!(self, FieldType::DateTime)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Char => "char",
            FieldType::Boolean => "boolean",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::Double => "double",
            FieldType::Decimal => "decimal",
            FieldType::DateTime => "datetime",
            FieldType::Guid => "guid",
            FieldType::ByteArray => "byte[]",
            FieldType::Object => "object",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let lowered = raw.trim().to_ascii_lowercase();
        // -- 🧹 "System.Int32" is just "int32" wearing a namespace like a fake mustache
        let simple = lowered.strip_prefix("system.").unwrap_or(&lowered);
        Ok(match simple {
            "" | "string" | "xml" | "text" => FieldType::String,
            "char" => FieldType::Char,
            "bool" | "boolean" => FieldType::Boolean,
            "byte" | "short" | "int16" | "int" | "int32" => FieldType::Int32,
            "long" | "int64" => FieldType::Int64,
            "single" | "float" | "double" => FieldType::Double,
            "decimal" => FieldType::Decimal,
            "date" | "datetime" => FieldType::DateTime,
            "guid" | "uuid" => FieldType::Guid,
            "byte[]" | "bytes" | "rowversion" => FieldType::ByteArray,
            "object" => FieldType::Object,
            unknown => return Err(format!("💀 '{unknown}' is not a type we know. We asked around.")),
        })
    }
}

impl TryFrom<String> for FieldType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_every_alias_finds_its_way_home() {
        assert_eq!("int".parse::<FieldType>(), Ok(FieldType::Int32));
        assert_eq!("System.Int64".parse::<FieldType>(), Ok(FieldType::Int64));
        assert_eq!("bool".parse::<FieldType>(), Ok(FieldType::Boolean));
        assert_eq!("rowversion".parse::<FieldType>(), Ok(FieldType::ByteArray));
        assert_eq!("date".parse::<FieldType>(), Ok(FieldType::DateTime));
        assert!("quaternion".parse::<FieldType>().is_err());
    }
}
