use crate::scalars::datatype::{DataType, DataTypeId, DecimalTypeMeta};

/// Score that should be used if no cast is needed.
pub const NO_CAST_SCORE: u32 = 800;

const FROM_STRING_CAST_SCORE: u32 = 200;

/// Return the score for casting from `have` to `want`.
///
/// Returns None if there's not a valid implicit cast.
///
/// A higher score indicates a more preferred cast. This is a best-effort
/// attempt to determine if casting from one type to another is valid and
/// won't lose precision.
pub const fn implicit_cast_score(have: DataTypeId, want: DataTypeId) -> Option<u32> {
    match have {
        // Cast NULL to anything.
        DataTypeId::Null => return Some(target_score(want)),
        // Simple integer casts.
        DataTypeId::Int8 => return int8_cast_score(want),
        DataTypeId::Int16 => return int16_cast_score(want),
        DataTypeId::Int32 => return int32_cast_score(want),
        DataTypeId::Int64 => return int64_cast_score(want),
        DataTypeId::UInt8 => return uint8_cast_score(want),
        DataTypeId::UInt16 => return uint16_cast_score(want),
        DataTypeId::UInt32 => return uint32_cast_score(want),
        DataTypeId::UInt64 => return uint64_cast_score(want),

        // Decimal casts.
        DataTypeId::Decimal64 => return decimal64_cast_score(want),

        // Date casts.
        DataTypeId::Date32 => {
            if matches!(want, DataTypeId::TimestampTz) {
                return Some(target_score(want));
            }
        }

        // String casts go through the canonical parser for the target type.
        DataTypeId::Utf8 => match want {
            DataTypeId::Int8
            | DataTypeId::Int16
            | DataTypeId::Int32
            | DataTypeId::Int64
            | DataTypeId::UInt8
            | DataTypeId::UInt16
            | DataTypeId::UInt32
            | DataTypeId::UInt64
            | DataTypeId::Decimal64
            | DataTypeId::Decimal128
            | DataTypeId::Date32
            | DataTypeId::TimestampTz
            | DataTypeId::Interval => return Some(FROM_STRING_CAST_SCORE),

            // Non-zero since it's a valid cast, just we would prefer
            // something else.
            DataTypeId::Utf8 => return Some(1),
            _ => (),
        },
        _ => (),
    }

    // No valid cast found.
    None
}

/// Determine the score for the target type we can cast to.
///
/// More "specific" types will have a higher target score.
const fn target_score(target: DataTypeId) -> u32 {
    match target {
        DataTypeId::Int8 => 191,
        DataTypeId::UInt8 => 190,
        DataTypeId::Int16 => 181,
        DataTypeId::UInt16 => 180,
        DataTypeId::Int32 => 171,
        DataTypeId::UInt32 => 170,
        DataTypeId::Int64 => 161,
        DataTypeId::UInt64 => 160,
        DataTypeId::Decimal64 => 131,
        DataTypeId::Decimal128 => 121,
        DataTypeId::TimestampTz => 111,
        DataTypeId::Utf8 => 1,
        _ => 100,
    }
}

const fn int8_cast_score(want: DataTypeId) -> Option<u32> {
    Some(match want {
        DataTypeId::Int8
        | DataTypeId::Int16
        | DataTypeId::Int32
        | DataTypeId::Int64
        | DataTypeId::Decimal64
        | DataTypeId::Decimal128 => target_score(want),
        _ => return None,
    })
}

const fn int16_cast_score(want: DataTypeId) -> Option<u32> {
    Some(match want {
        DataTypeId::Int16
        | DataTypeId::Int32
        | DataTypeId::Int64
        | DataTypeId::Decimal64
        | DataTypeId::Decimal128 => target_score(want),
        _ => return None,
    })
}

const fn int32_cast_score(want: DataTypeId) -> Option<u32> {
    Some(match want {
        DataTypeId::Int32
        | DataTypeId::Int64
        | DataTypeId::Decimal64
        | DataTypeId::Decimal128 => target_score(want),
        _ => return None,
    })
}

const fn int64_cast_score(want: DataTypeId) -> Option<u32> {
    // Note we don't allow implicit casting to Decimal64 (max precision
    // overflow).
    Some(match want {
        DataTypeId::Int64 | DataTypeId::Decimal128 => target_score(want),
        _ => return None,
    })
}

const fn uint8_cast_score(want: DataTypeId) -> Option<u32> {
    Some(match want {
        DataTypeId::UInt8
        | DataTypeId::UInt16
        | DataTypeId::Int16
        | DataTypeId::UInt32
        | DataTypeId::Int32
        | DataTypeId::UInt64
        | DataTypeId::Int64
        | DataTypeId::Decimal64
        | DataTypeId::Decimal128 => target_score(want),
        _ => return None,
    })
}

const fn uint16_cast_score(want: DataTypeId) -> Option<u32> {
    Some(match want {
        DataTypeId::UInt16
        | DataTypeId::UInt32
        | DataTypeId::Int32
        | DataTypeId::UInt64
        | DataTypeId::Int64
        | DataTypeId::Decimal64
        | DataTypeId::Decimal128 => target_score(want),
        _ => return None,
    })
}

const fn uint32_cast_score(want: DataTypeId) -> Option<u32> {
    Some(match want {
        DataTypeId::UInt32
        | DataTypeId::UInt64
        | DataTypeId::Int64
        | DataTypeId::Decimal64
        | DataTypeId::Decimal128 => target_score(want),
        _ => return None,
    })
}

const fn uint64_cast_score(want: DataTypeId) -> Option<u32> {
    Some(match want {
        DataTypeId::UInt64 | DataTypeId::Decimal128 => target_score(want),
        _ => return None,
    })
}

const fn decimal64_cast_score(want: DataTypeId) -> Option<u32> {
    Some(match want {
        DataTypeId::Decimal128 => target_score(want),
        _ => return None,
    })
}

/// Compute the common type two operands should be coerced to for comparison
/// or arithmetic.
///
/// Commutative: `common_type(a, b) == common_type(b, a)`. Returns None when
/// no common type exists; nullability is tracked by the binder, not here.
pub fn common_type(a: &DataType, b: &DataType) -> Option<DataType> {
    if a == b {
        return Some(a.clone());
    }
    if a.is_null() {
        return Some(b.clone());
    }
    if b.is_null() {
        return Some(a.clone());
    }

    if a.is_integer() && b.is_integer() {
        return Some(common_integer_type(a, b));
    }

    if a.is_integer() && b.is_decimal() {
        return Some(integer_decimal_type(a, b));
    }
    if a.is_decimal() && b.is_integer() {
        return Some(integer_decimal_type(b, a));
    }
    if a.is_decimal() && b.is_decimal() {
        return Some(common_decimal_type(a, b));
    }

    // A string against a typed operand compares in the typed domain; the
    // string side is parsed with the target's canonical parser at comparison
    // time, with parse failure producing a non-match rather than an error.
    if matches!(a, DataType::Utf8) && string_comparable(b) {
        return Some(b.clone());
    }
    if matches!(b, DataType::Utf8) && string_comparable(a) {
        return Some(a.clone());
    }

    match (a, b) {
        (DataType::Date32, DataType::TimestampTz) | (DataType::TimestampTz, DataType::Date32) => {
            Some(DataType::TimestampTz)
        }
        _ => {
            // Fall back to the cast table, preferring the higher-scored
            // direction.
            let to_b = implicit_cast_score(a.datatype_id(), b.datatype_id());
            let to_a = implicit_cast_score(b.datatype_id(), a.datatype_id());
            match (to_b, to_a) {
                (None, None) => None,
                (Some(_), None) => Some(b.clone()),
                (None, Some(_)) => Some(a.clone()),
                (Some(sb), Some(sa)) => {
                    if sb >= sa {
                        Some(b.clone())
                    } else {
                        Some(a.clone())
                    }
                }
            }
        }
    }
}

const fn string_comparable(typed: &DataType) -> bool {
    matches!(
        typed,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Decimal64(_)
            | DataType::Decimal128(_)
            | DataType::Date32
            | DataType::TimestampTz
            | DataType::Interval
    )
}

fn common_integer_type(a: &DataType, b: &DataType) -> DataType {
    let width = a.integer_width().max(b.integer_width());

    if a.is_signed_integer() == b.is_signed_integer() {
        // Same signedness promotes to the wider width.
        let signed = a.is_signed_integer();
        return integer_for(width, signed);
    }

    // Mixed signedness promotes to the next signed width capable of holding
    // both ranges. The unsigned operand needs twice its width in the signed
    // domain; past 64 bits there's no integer left, so escape to decimal.
    let unsigned_width = if a.is_unsigned_integer() {
        a.integer_width()
    } else {
        b.integer_width()
    };
    let signed_width = if a.is_signed_integer() {
        a.integer_width()
    } else {
        b.integer_width()
    };

    let needed = signed_width.max(unsigned_width * 2);
    if needed > 64 {
        return DataType::Decimal128(DecimalTypeMeta::new(20, 0));
    }
    integer_for(needed, true)
}

fn integer_for(width: u8, signed: bool) -> DataType {
    match (width, signed) {
        (8, true) => DataType::Int8,
        (16, true) => DataType::Int16,
        (32, true) => DataType::Int32,
        (_, true) => DataType::Int64,
        (8, false) => DataType::UInt8,
        (16, false) => DataType::UInt16,
        (32, false) => DataType::UInt32,
        (_, false) => DataType::UInt64,
    }
}

fn integer_decimal_type(int: &DataType, dec: &DataType) -> DataType {
    let meta = decimal_meta(dec);
    if int.integer_width() >= 64 || matches!(dec, DataType::Decimal128(_)) {
        DataType::Decimal128(DecimalTypeMeta::new(38, meta.scale))
    } else {
        DataType::Decimal64(meta)
    }
}

fn common_decimal_type(a: &DataType, b: &DataType) -> DataType {
    let am = decimal_meta(a);
    let bm = decimal_meta(b);
    let scale = am.scale.max(bm.scale);
    if matches!(a, DataType::Decimal128(_)) || matches!(b, DataType::Decimal128(_)) {
        DataType::Decimal128(DecimalTypeMeta::new(38, scale))
    } else {
        DataType::Decimal64(DecimalTypeMeta::new(am.precision.max(bm.precision), scale))
    }
}

fn decimal_meta(dec: &DataType) -> DecimalTypeMeta {
    match dec {
        DataType::Decimal64(m) | DataType::Decimal128(m) => *m,
        _ => DataType::DEFAULT_DECIMAL64_META,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMERICS: &[DataType] = &[
        DataType::Int8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::UInt8,
        DataType::UInt16,
        DataType::UInt32,
        DataType::UInt64,
        DataType::Decimal64(DecimalTypeMeta::new(18, 3)),
        DataType::Decimal128(DecimalTypeMeta::new(38, 9)),
    ];

    #[test]
    fn common_type_commutative_over_numerics() {
        for a in NUMERICS {
            for b in NUMERICS {
                assert_eq!(
                    common_type(a, b),
                    common_type(b, a),
                    "common_type not commutative for {a} and {b}"
                );
            }
        }
    }

    #[test]
    fn same_signedness_widens() {
        assert_eq!(
            Some(DataType::Int64),
            common_type(&DataType::Int16, &DataType::Int64)
        );
        assert_eq!(
            Some(DataType::UInt32),
            common_type(&DataType::UInt8, &DataType::UInt32)
        );
    }

    #[test]
    fn mixed_signedness_next_width() {
        assert_eq!(
            Some(DataType::Int16),
            common_type(&DataType::Int8, &DataType::UInt8)
        );
        assert_eq!(
            Some(DataType::Int64),
            common_type(&DataType::Int8, &DataType::UInt32)
        );
        assert_eq!(
            Some(DataType::Int64),
            common_type(&DataType::Int64, &DataType::UInt16)
        );
        // No 128-bit integer in the model; escape to decimal.
        assert_eq!(
            Some(DataType::Decimal128(DecimalTypeMeta::new(20, 0))),
            common_type(&DataType::Int8, &DataType::UInt64)
        );
    }

    #[test]
    fn integer_with_decimal_promotes_to_decimal() {
        let dec = DataType::Decimal64(DecimalTypeMeta::new(18, 2));
        assert_eq!(Some(dec.clone()), common_type(&DataType::Int32, &dec));
        assert_eq!(
            Some(DataType::Decimal128(DecimalTypeMeta::new(38, 2))),
            common_type(&DataType::Int64, &dec)
        );
    }

    #[test]
    fn string_against_typed_column() {
        assert_eq!(
            Some(DataType::Date32),
            common_type(&DataType::Utf8, &DataType::Date32)
        );
        assert_eq!(
            Some(DataType::Int32),
            common_type(&DataType::Int32, &DataType::Utf8)
        );
    }

    #[test]
    fn null_with_typed() {
        assert_eq!(
            Some(DataType::Utf8),
            common_type(&DataType::Null, &DataType::Utf8)
        );
    }

    #[test]
    fn no_implicit_narrowing_score() {
        assert!(implicit_cast_score(DataTypeId::Int64, DataTypeId::Int32).is_none());
        assert!(implicit_cast_score(DataTypeId::Int64, DataTypeId::Decimal64).is_none());
        assert!(implicit_cast_score(DataTypeId::Int16, DataTypeId::UInt64).is_none());
    }

    #[test]
    fn prefer_cast_int32_to_int64() {
        let to_int64 = implicit_cast_score(DataTypeId::Int32, DataTypeId::Int64).unwrap();
        let to_dec = implicit_cast_score(DataTypeId::Int32, DataTypeId::Decimal128).unwrap();
        assert!(to_int64 > to_dec);
    }
}
