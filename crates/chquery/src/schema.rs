//! Column metadata for the telemetry tables
use std::fmt;

/// Value type stored in a ClickHouse Map column. Keys are always
/// LowCardinality(String).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapValueType {
    String,
    Float64,
    Bool,
}

impl fmt::Display for MapValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapValueType::String => write!(f, "String"),
            MapValueType::Float64 => write!(f, "Float64"),
            MapValueType::Bool => write!(f, "Bool"),
        }
    }
}

/// The subset of ClickHouse column types the telemetry tables use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    LowCardinalityString,
    FixedString(u32),
    UInt64,
    UInt32,
    UInt8,
    Int8,
    Int16,
    Bool,
    DateTime64(u8),
    Map(MapValueType),
    ArrayString,
    Json,
}

impl ColumnType {
    pub fn is_map(&self) -> bool {
        matches!(self, ColumnType::Map(_))
    }

    pub fn is_string_like(&self) -> bool {
        matches!(
            self,
            ColumnType::String | ColumnType::LowCardinalityString | ColumnType::FixedString(_)
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::UInt64
                | ColumnType::UInt32
                | ColumnType::UInt8
                | ColumnType::Int8
                | ColumnType::Int16
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::String => write!(f, "String"),
            ColumnType::LowCardinalityString => write!(f, "LowCardinality(String)"),
            ColumnType::FixedString(n) => write!(f, "FixedString({})", n),
            ColumnType::UInt64 => write!(f, "UInt64"),
            ColumnType::UInt32 => write!(f, "UInt32"),
            ColumnType::UInt8 => write!(f, "UInt8"),
            ColumnType::Int8 => write!(f, "Int8"),
            ColumnType::Int16 => write!(f, "Int16"),
            ColumnType::Bool => write!(f, "Bool"),
            ColumnType::DateTime64(p) => write!(f, "DateTime64({})", p),
            ColumnType::Map(v) => write!(f, "Map(LowCardinality(String), {})", v),
            ColumnType::ArrayString => write!(f, "Array(String)"),
            ColumnType::Json => write!(f, "JSON"),
        }
    }
}

/// A physical table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub column_type: ColumnType,
}

impl Column {
    pub const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self { name, column_type }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display() {
        assert_eq!(ColumnType::LowCardinalityString.to_string(), "LowCardinality(String)");
        assert_eq!(ColumnType::FixedString(32).to_string(), "FixedString(32)");
        assert_eq!(
            ColumnType::Map(MapValueType::Float64).to_string(),
            "Map(LowCardinality(String), Float64)"
        );
        assert_eq!(ColumnType::Json.to_string(), "JSON");
    }

    #[test]
    fn test_type_predicates() {
        assert!(ColumnType::Map(MapValueType::String).is_map());
        assert!(ColumnType::FixedString(32).is_string_like());
        assert!(ColumnType::Int16.is_integer());
        assert!(!ColumnType::Json.is_map());
    }
}
