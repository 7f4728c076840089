pub mod parse;

use quarry_error::{QuarryError, Result};

use self::parse::{
    BoolParser,
    Date32Parser,
    Decimal128Parser,
    Decimal64Parser,
    FromStrParser,
    IntervalParser,
    Parser,
    TimestampTzParser,
};
use crate::scalars::compare::date32_to_micros;
use crate::scalars::datatype::DataType;
use crate::scalars::value::ScalarValue;

/// Behavior when a cast fails at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastFailBehavior {
    /// Return an error, aborting the query.
    Error,
    /// Produce a null.
    ///
    /// Used for string-to-typed comparison casts where an unparsable string
    /// is a per-row non-match, not a fault.
    Null,
}

/// Cast a value to the target type.
///
/// Out-of-range numeric conversions never wrap silently; under
/// `CastFailBehavior::Error` they produce a range error.
pub fn cast_value(
    val: &ScalarValue,
    to: &DataType,
    behavior: CastFailBehavior,
) -> Result<ScalarValue> {
    if val.is_null() {
        return Ok(ScalarValue::Null);
    }
    if &val.datatype() == to {
        return Ok(val.clone());
    }

    match try_cast_value(val, to) {
        Some(v) => Ok(v),
        None => match behavior {
            CastFailBehavior::Null => Ok(ScalarValue::Null),
            CastFailBehavior::Error => Err(QuarryError::new(format!(
                "Cannot cast value to {to}: value out of range or unparsable"
            ))
            .with_field("value", val)
            .with_field("from", val.datatype())),
        },
    }
}

fn try_cast_value(val: &ScalarValue, to: &DataType) -> Option<ScalarValue> {
    use ScalarValue as V;

    // String source: parse with the target's canonical parser.
    if let V::Utf8(s) = val {
        return parse_into(s, to);
    }

    // Numeric source.
    if let Some((value, scale)) = val.as_decimal_parts() {
        if to.is_integer() || to.is_decimal() {
            return numeric_cast(value, scale, to);
        }
    }

    match (val, to) {
        (V::Date32(days), DataType::TimestampTz) => {
            Some(V::TimestampTz(date32_to_micros(*days)))
        }
        (V::TimestampTz(micros), DataType::Date32) => {
            Some(V::Date32(micros.div_euclid(86_400_000_000) as i32))
        }
        (other, DataType::Utf8) => Some(V::Utf8(other.to_string())),
        _ => None,
    }
}

fn parse_into(s: &str, to: &DataType) -> Option<ScalarValue> {
    use ScalarValue as V;
    Some(match to {
        DataType::Boolean => V::Boolean(BoolParser.parse(s)?),
        DataType::Int8 => V::Int8(FromStrParser::<i8>::new().parse(s)?),
        DataType::Int16 => V::Int16(FromStrParser::<i16>::new().parse(s)?),
        DataType::Int32 => V::Int32(FromStrParser::<i32>::new().parse(s)?),
        DataType::Int64 => V::Int64(FromStrParser::<i64>::new().parse(s)?),
        DataType::UInt8 => V::UInt8(FromStrParser::<u8>::new().parse(s)?),
        DataType::UInt16 => V::UInt16(FromStrParser::<u16>::new().parse(s)?),
        DataType::UInt32 => V::UInt32(FromStrParser::<u32>::new().parse(s)?),
        DataType::UInt64 => V::UInt64(FromStrParser::<u64>::new().parse(s)?),
        DataType::Decimal64(meta) => V::Decimal64 {
            value: Decimal64Parser::new(meta.precision, meta.scale).parse(s)?,
            meta: *meta,
        },
        DataType::Decimal128(meta) => V::Decimal128 {
            value: Decimal128Parser::new(meta.precision, meta.scale).parse(s)?,
            meta: *meta,
        },
        DataType::Date32 => V::Date32(Date32Parser.parse(s)?),
        DataType::TimestampTz => V::TimestampTz(TimestampTzParser.parse(s)?),
        DataType::Interval => V::Interval(IntervalParser::default().parse(s)?),
        DataType::Utf8 => V::Utf8(s.to_string()),
        _ => return None,
    })
}

/// Cast a numeric value given as (unscaled, scale) decimal parts to an
/// integer or decimal target, checking range.
fn numeric_cast(value: i128, scale: i8, to: &DataType) -> Option<ScalarValue> {
    use ScalarValue as V;

    if to.is_integer() {
        // Truncate toward zero when dropping fractional digits.
        let whole = descale(value, scale)?;
        return Some(match to {
            DataType::Int8 => V::Int8(i8::try_from(whole).ok()?),
            DataType::Int16 => V::Int16(i16::try_from(whole).ok()?),
            DataType::Int32 => V::Int32(i32::try_from(whole).ok()?),
            DataType::Int64 => V::Int64(i64::try_from(whole).ok()?),
            DataType::UInt8 => V::UInt8(u8::try_from(whole).ok()?),
            DataType::UInt16 => V::UInt16(u16::try_from(whole).ok()?),
            DataType::UInt32 => V::UInt32(u32::try_from(whole).ok()?),
            DataType::UInt64 => V::UInt64(u64::try_from(whole).ok()?),
            _ => return None,
        });
    }

    let meta = match to {
        DataType::Decimal64(m) | DataType::Decimal128(m) => *m,
        _ => return None,
    };
    let rescaled = change_scale(value, scale, meta.scale)?;
    if decimal_digits(rescaled) > meta.precision {
        return None;
    }
    Some(match to {
        DataType::Decimal64(_) => V::Decimal64 {
            value: i64::try_from(rescaled).ok()?,
            meta,
        },
        DataType::Decimal128(_) => V::Decimal128 {
            value: rescaled,
            meta,
        },
        _ => return None,
    })
}

fn descale(value: i128, scale: i8) -> Option<i128> {
    change_scale(value, scale, 0)
}

fn change_scale(value: i128, from: i8, to: i8) -> Option<i128> {
    match to.checked_sub(from)? {
        0 => Some(value),
        diff if diff > 0 => value.checked_mul(10_i128.checked_pow(diff as u32)?),
        diff => Some(value / 10_i128.checked_pow(diff.unsigned_abs() as u32)?),
    }
}

fn decimal_digits(value: i128) -> u8 {
    let mut v = value.unsigned_abs();
    let mut digits = 0;
    while v > 0 {
        digits += 1;
        v /= 10;
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalars::datatype::DecimalTypeMeta;

    #[test]
    fn widen_integer() {
        let got = cast_value(
            &ScalarValue::Int8(4),
            &DataType::Int64,
            CastFailBehavior::Error,
        )
        .unwrap();
        assert_eq!(ScalarValue::Int64(4), got);
    }

    #[test]
    fn narrow_out_of_range_errors() {
        let res = cast_value(
            &ScalarValue::Int64(300),
            &DataType::Int8,
            CastFailBehavior::Error,
        );
        assert!(res.is_err());
    }

    #[test]
    fn narrow_in_range() {
        let got = cast_value(
            &ScalarValue::Int64(12),
            &DataType::Int8,
            CastFailBehavior::Error,
        )
        .unwrap();
        assert_eq!(ScalarValue::Int8(12), got);
    }

    #[test]
    fn unparsable_string_nulls_under_null_behavior() {
        let got = cast_value(
            &ScalarValue::Utf8("Warsaw".to_string()),
            &DataType::Date32,
            CastFailBehavior::Null,
        )
        .unwrap();
        assert_eq!(ScalarValue::Null, got);
    }

    #[test]
    fn string_to_date() {
        let got = cast_value(
            &ScalarValue::Utf8("1992-10-11".to_string()),
            &DataType::Date32,
            CastFailBehavior::Error,
        )
        .unwrap();
        assert_eq!(ScalarValue::Date32(8319), got);
    }

    #[test]
    fn integer_to_decimal() {
        let meta = DecimalTypeMeta::new(18, 2);
        let got = cast_value(
            &ScalarValue::Int32(12),
            &DataType::Decimal64(meta),
            CastFailBehavior::Error,
        )
        .unwrap();
        assert_eq!(ScalarValue::Decimal64 { value: 1200, meta }, got);
    }

    #[test]
    fn null_casts_to_null() {
        let got = cast_value(
            &ScalarValue::Null,
            &DataType::Int32,
            CastFailBehavior::Error,
        )
        .unwrap();
        assert_eq!(ScalarValue::Null, got);
    }
}
