use std::fmt;

use serde::{Deserialize, Serialize};

/// Precision and scale for a decimal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecimalTypeMeta {
    pub precision: u8,
    pub scale: i8,
}

impl DecimalTypeMeta {
    pub const fn new(precision: u8, scale: i8) -> Self {
        DecimalTypeMeta { precision, scale }
    }
}

/// Identifier for a data type, without any type metadata.
///
/// Used for function signatures and the implicit cast table where decimal
/// precision/scale doesn't matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataTypeId {
    /// Matches any type in a function signature. Never the type of a value.
    Any,
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Decimal64,
    Decimal128,
    Utf8,
    Date32,
    TimestampTz,
    Interval,
    List,
}

impl fmt::Display for DataTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Any => "Any",
            Self::Null => "Null",
            Self::Boolean => "Boolean",
            Self::Int8 => "Int8",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::UInt8 => "UInt8",
            Self::UInt16 => "UInt16",
            Self::UInt32 => "UInt32",
            Self::UInt64 => "UInt64",
            Self::Decimal64 => "Decimal64",
            Self::Decimal128 => "Decimal128",
            Self::Utf8 => "Utf8",
            Self::Date32 => "Date32",
            Self::TimestampTz => "TimestampTz",
            Self::Interval => "Interval",
            Self::List => "List",
        };
        write!(f, "{s}")
    }
}

/// A fully specified runtime data type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Decimal64(DecimalTypeMeta),
    Decimal128(DecimalTypeMeta),
    Utf8,
    /// Days since the unix epoch.
    Date32,
    /// Microseconds since the unix epoch, normalized to UTC. The original
    /// offset is not retained; values compare on the instant.
    TimestampTz,
    Interval,
    List(Box<DataType>),
}

impl DataType {
    /// Default precision/scale used when a decimal is created without
    /// explicit metadata.
    pub const DEFAULT_DECIMAL64_META: DecimalTypeMeta = DecimalTypeMeta::new(18, 3);
    pub const DEFAULT_DECIMAL128_META: DecimalTypeMeta = DecimalTypeMeta::new(38, 9);

    pub fn datatype_id(&self) -> DataTypeId {
        match self {
            Self::Null => DataTypeId::Null,
            Self::Boolean => DataTypeId::Boolean,
            Self::Int8 => DataTypeId::Int8,
            Self::Int16 => DataTypeId::Int16,
            Self::Int32 => DataTypeId::Int32,
            Self::Int64 => DataTypeId::Int64,
            Self::UInt8 => DataTypeId::UInt8,
            Self::UInt16 => DataTypeId::UInt16,
            Self::UInt32 => DataTypeId::UInt32,
            Self::UInt64 => DataTypeId::UInt64,
            Self::Decimal64(_) => DataTypeId::Decimal64,
            Self::Decimal128(_) => DataTypeId::Decimal128,
            Self::Utf8 => DataTypeId::Utf8,
            Self::Date32 => DataTypeId::Date32,
            Self::TimestampTz => DataTypeId::TimestampTz,
            Self::Interval => DataTypeId::Interval,
            Self::List(_) => DataTypeId::List,
        }
    }

    /// Create a datatype from an id, using default metadata where the id
    /// alone doesn't fully specify the type.
    pub fn default_for(id: DataTypeId) -> Option<DataType> {
        Some(match id {
            DataTypeId::Null => DataType::Null,
            DataTypeId::Boolean => DataType::Boolean,
            DataTypeId::Int8 => DataType::Int8,
            DataTypeId::Int16 => DataType::Int16,
            DataTypeId::Int32 => DataType::Int32,
            DataTypeId::Int64 => DataType::Int64,
            DataTypeId::UInt8 => DataType::UInt8,
            DataTypeId::UInt16 => DataType::UInt16,
            DataTypeId::UInt32 => DataType::UInt32,
            DataTypeId::UInt64 => DataType::UInt64,
            DataTypeId::Decimal64 => DataType::Decimal64(Self::DEFAULT_DECIMAL64_META),
            DataTypeId::Decimal128 => DataType::Decimal128(Self::DEFAULT_DECIMAL128_META),
            DataTypeId::Utf8 => DataType::Utf8,
            DataTypeId::Date32 => DataType::Date32,
            DataTypeId::TimestampTz => DataType::TimestampTz,
            DataTypeId::Interval => DataType::Interval,
            DataTypeId::Any | DataTypeId::List => return None,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataType::Null)
    }

    pub fn is_signed_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    pub fn is_unsigned_integer(&self) -> bool {
        matches!(
            self,
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64
        )
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    pub fn is_decimal(&self) -> bool {
        matches!(self, DataType::Decimal64(_) | DataType::Decimal128(_))
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_decimal()
    }

    /// Bit width of an integer type. Zero for non-integers.
    pub fn integer_width(&self) -> u8 {
        match self {
            DataType::Int8 | DataType::UInt8 => 8,
            DataType::Int16 | DataType::UInt16 => 16,
            DataType::Int32 | DataType::UInt32 => 32,
            DataType::Int64 | DataType::UInt64 => 64,
            _ => 0,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decimal64(m) => write!(f, "Decimal64({},{})", m.precision, m.scale),
            Self::Decimal128(m) => write!(f, "Decimal128({},{})", m.precision, m.scale),
            Self::List(inner) => write!(f, "List({inner})"),
            other => write!(f, "{}", other.datatype_id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_widths() {
        assert_eq!(8, DataType::Int8.integer_width());
        assert_eq!(64, DataType::UInt64.integer_width());
        assert_eq!(0, DataType::Utf8.integer_width());
    }

    #[test]
    fn default_for_ids() {
        assert_eq!(Some(DataType::Int32), DataType::default_for(DataTypeId::Int32));
        assert_eq!(None, DataType::default_for(DataTypeId::Any));
    }
}
