use std::fmt;

use quarry_error::{QuarryError, Result};
use serde::{Deserialize, Serialize};

use super::datatype::{DataType, DecimalTypeMeta};
use super::interval::Interval;

/// An owned scalar value.
///
/// `Null` doubles as the typed null sentinel for absent outer-join slots; the
/// slot's type is tracked on the expression/schema side, never by omitting
/// the slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Decimal64 { value: i64, meta: DecimalTypeMeta },
    Decimal128 { value: i128, meta: DecimalTypeMeta },
    Utf8(String),
    /// Days since the unix epoch.
    Date32(i32),
    /// Microseconds since the unix epoch, UTC.
    TimestampTz(i64),
    Interval(Interval),
    List(Vec<ScalarValue>),
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// The datatype of this value.
    ///
    /// Lists infer their element type from the first element, falling back to
    /// Null for empty lists.
    pub fn datatype(&self) -> DataType {
        match self {
            Self::Null => DataType::Null,
            Self::Boolean(_) => DataType::Boolean,
            Self::Int8(_) => DataType::Int8,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::UInt8(_) => DataType::UInt8,
            Self::UInt16(_) => DataType::UInt16,
            Self::UInt32(_) => DataType::UInt32,
            Self::UInt64(_) => DataType::UInt64,
            Self::Decimal64 { meta, .. } => DataType::Decimal64(*meta),
            Self::Decimal128 { meta, .. } => DataType::Decimal128(*meta),
            Self::Utf8(_) => DataType::Utf8,
            Self::Date32(_) => DataType::Date32,
            Self::TimestampTz(_) => DataType::TimestampTz,
            Self::Interval(_) => DataType::Interval,
            Self::List(vals) => {
                let elem = vals.first().map(|v| v.datatype()).unwrap_or(DataType::Null);
                DataType::List(Box::new(elem))
            }
        }
    }

    /// Widen any integer value to i128 for range-safe arithmetic/comparison.
    pub fn as_i128(&self) -> Option<i128> {
        Some(match self {
            Self::Int8(v) => *v as i128,
            Self::Int16(v) => *v as i128,
            Self::Int32(v) => *v as i128,
            Self::Int64(v) => *v as i128,
            Self::UInt8(v) => *v as i128,
            Self::UInt16(v) => *v as i128,
            Self::UInt32(v) => *v as i128,
            Self::UInt64(v) => *v as i128,
            _ => return None,
        })
    }

    /// Decimal representation as (unscaled value, scale), widening integers
    /// to scale 0.
    pub fn as_decimal_parts(&self) -> Option<(i128, i8)> {
        match self {
            Self::Decimal64 { value, meta } => Some((*value as i128, meta.scale)),
            Self::Decimal128 { value, meta } => Some((*value, meta.scale)),
            other => other.as_i128().map(|v| (v, 0)),
        }
    }

    pub fn try_as_bool(&self) -> Result<bool> {
        match self {
            Self::Boolean(b) => Ok(*b),
            other => Err(QuarryError::new(format!("Not a boolean: {other}"))),
        }
    }

    pub fn try_as_str(&self) -> Result<&str> {
        match self {
            Self::Utf8(s) => Ok(s),
            other => Err(QuarryError::new(format!("Not a string: {other}"))),
        }
    }

    pub fn try_as_i64(&self) -> Result<i64> {
        match self {
            Self::Int64(v) => Ok(*v),
            other => other
                .as_i128()
                .and_then(|v| i64::try_from(v).ok())
                .ok_or_else(|| QuarryError::new(format!("Not an i64: {other}"))),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Boolean(v)
    }
}

impl From<i8> for ScalarValue {
    fn from(v: i8) -> Self {
        ScalarValue::Int8(v)
    }
}

impl From<i16> for ScalarValue {
    fn from(v: i16) -> Self {
        ScalarValue::Int16(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::Int32(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int64(v)
    }
}

impl From<u8> for ScalarValue {
    fn from(v: u8) -> Self {
        ScalarValue::UInt8(v)
    }
}

impl From<u16> for ScalarValue {
    fn from(v: u16) -> Self {
        ScalarValue::UInt16(v)
    }
}

impl From<u32> for ScalarValue {
    fn from(v: u32) -> Self {
        ScalarValue::UInt32(v)
    }
}

impl From<u64> for ScalarValue {
    fn from(v: u64) -> Self {
        ScalarValue::UInt64(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Utf8(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::Utf8(v)
    }
}

impl From<Interval> for ScalarValue {
    fn from(v: Interval) -> Self {
        ScalarValue::Interval(v)
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt8(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Decimal64 { value, meta } => write_decimal(f, *value as i128, meta.scale),
            Self::Decimal128 { value, meta } => write_decimal(f, *value, meta.scale),
            Self::Utf8(v) => write!(f, "{v}"),
            Self::Date32(v) => write!(f, "{}", display_date32(*v)),
            Self::TimestampTz(v) => write!(f, "{}", display_timestamp_micros(*v)),
            Self::Interval(v) => write!(f, "{v}"),
            Self::List(vals) => {
                write!(f, "[")?;
                for (idx, val) in vals.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{val}")?;
                }
                write!(f, "]")
            }
        }
    }
}

fn write_decimal(f: &mut fmt::Formatter<'_>, value: i128, scale: i8) -> fmt::Result {
    if scale <= 0 {
        let mut v = value;
        for _ in 0..scale.unsigned_abs() {
            v = v.saturating_mul(10);
        }
        return write!(f, "{v}");
    }
    let pow = 10_i128.pow(scale as u32);
    let whole = value / pow;
    let frac = (value % pow).unsigned_abs();
    let neg = value < 0 && whole == 0;
    if neg {
        write!(f, "-")?;
    }
    write!(f, "{whole}.{frac:0width$}", width = scale as usize)
}

fn display_date32(days: i32) -> String {
    use chrono::Days;
    let epoch = chrono::NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch date");
    let date = if days >= 0 {
        epoch.checked_add_days(Days::new(days as u64))
    } else {
        epoch.checked_sub_days(Days::new(days.unsigned_abs() as u64))
    };
    match date {
        Some(d) => d.to_string(),
        None => format!("{days} days"),
    }
}

fn display_timestamp_micros(micros: i64) -> String {
    match chrono::DateTime::from_timestamp_micros(micros) {
        Some(dt) => dt.to_rfc3339(),
        None => format!("{micros} us"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_display() {
        let v = ScalarValue::Decimal64 {
            value: 12345,
            meta: DecimalTypeMeta::new(18, 2),
        };
        assert_eq!("123.45", v.to_string());

        let v = ScalarValue::Decimal64 {
            value: -5,
            meta: DecimalTypeMeta::new(18, 2),
        };
        assert_eq!("-0.05", v.to_string());
    }

    #[test]
    fn date_display() {
        assert_eq!("1992-10-11", ScalarValue::Date32(8319).to_string());
        assert_eq!("1969-12-31", ScalarValue::Date32(-1).to_string());
    }

    #[test]
    fn integer_widening() {
        assert_eq!(Some(255), ScalarValue::UInt8(255).as_i128());
        assert_eq!(Some(-128), ScalarValue::Int8(-128).as_i128());
        assert_eq!(None, ScalarValue::Utf8("x".to_string()).as_i128());
    }
}
