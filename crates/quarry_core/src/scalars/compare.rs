use std::cmp::Ordering;

use quarry_error::{QuarryError, Result};

use super::value::ScalarValue;

/// Compare two non-null scalars, promoting across numeric widths and
/// signedness so that e.g. `UInt64(3)` and `Int8(3)` compare equal.
///
/// SQL null semantics are the caller's responsibility; passing a null to
/// either side is an error here. Use [`sort_cmp`] when a total order over
/// nullable values is needed.
pub fn compare_values(left: &ScalarValue, right: &ScalarValue) -> Result<Ordering> {
    use ScalarValue as V;

    if left.is_null() || right.is_null() {
        return Err(QuarryError::new("Cannot compare null values"));
    }

    // Numeric comparison via decimal parts covers every integer/decimal
    // pairing without overflow: unscaled values fit i128, and rescaling picks
    // the larger scale.
    if let (Some((lv, ls)), Some((rv, rs))) = (left.as_decimal_parts(), right.as_decimal_parts()) {
        return compare_decimal_parts(lv, ls, rv, rs);
    }

    match (left, right) {
        (V::Boolean(a), V::Boolean(b)) => Ok(a.cmp(b)),
        (V::Utf8(a), V::Utf8(b)) => Ok(a.cmp(b)),
        (V::Date32(a), V::Date32(b)) => Ok(a.cmp(b)),
        (V::TimestampTz(a), V::TimestampTz(b)) => Ok(a.cmp(b)),
        (V::Date32(a), V::TimestampTz(b)) => Ok(date32_to_micros(*a).cmp(b)),
        (V::TimestampTz(a), V::Date32(b)) => Ok(a.cmp(&date32_to_micros(*b))),
        (V::Interval(a), V::Interval(b)) => Ok(a.normalized_nanos().cmp(&b.normalized_nanos())),
        (V::List(a), V::List(b)) => compare_lists(a, b),
        (a, b) => Err(QuarryError::new(format!(
            "Cannot compare values of types {} and {}",
            a.datatype(),
            b.datatype()
        ))),
    }
}

fn compare_decimal_parts(lv: i128, ls: i8, rv: i128, rs: i8) -> Result<Ordering> {
    let (lv, rv) = match ls.cmp(&rs) {
        Ordering::Equal => (lv, rv),
        Ordering::Less => (rescale(lv, rs - ls)?, rv),
        Ordering::Greater => (lv, rescale(rv, ls - rs)?),
    };
    Ok(lv.cmp(&rv))
}

fn rescale(value: i128, by: i8) -> Result<i128> {
    let pow = 10_i128
        .checked_pow(by as u32)
        .ok_or_else(|| QuarryError::new("Decimal rescale overflow"))?;
    value
        .checked_mul(pow)
        .ok_or_else(|| QuarryError::new("Decimal rescale overflow"))
}

fn compare_lists(a: &[ScalarValue], b: &[ScalarValue]) -> Result<Ordering> {
    for (l, r) in a.iter().zip(b.iter()) {
        match sort_cmp(l, r) {
            Ordering::Equal => continue,
            other => return Ok(other),
        }
    }
    Ok(a.len().cmp(&b.len()))
}

pub fn date32_to_micros(days: i32) -> i64 {
    days as i64 * 24 * 60 * 60 * 1_000_000
}

/// Total order over nullable values for sorting: nulls sort last, equal
/// nulls compare equal.
///
/// This is an ordering convention only; equi-match semantics (nulls never
/// matching) are enforced by the join operators themselves.
pub fn sort_cmp(left: &ScalarValue, right: &ScalarValue) -> Ordering {
    match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare_values(left, right).unwrap_or(Ordering::Equal),
    }
}

/// Lexicographic sort order for rows of key values.
pub fn sort_cmp_keys(left: &[ScalarValue], right: &[ScalarValue]) -> Ordering {
    for (l, r) in left.iter().zip(right.iter()) {
        match sort_cmp(l, r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalars::datatype::DecimalTypeMeta;
    use crate::scalars::interval::Interval;

    #[test]
    fn cross_width_integers() {
        let a = ScalarValue::UInt64(3);
        let b = ScalarValue::Int8(3);
        assert_eq!(Ordering::Equal, compare_values(&a, &b).unwrap());

        let a = ScalarValue::Int8(-1);
        let b = ScalarValue::UInt64(u64::MAX);
        assert_eq!(Ordering::Less, compare_values(&a, &b).unwrap());
    }

    #[test]
    fn decimal_vs_integer() {
        let a = ScalarValue::Decimal64 {
            value: 2500,
            meta: DecimalTypeMeta::new(18, 3),
        };
        let b = ScalarValue::Int32(2);
        assert_eq!(Ordering::Greater, compare_values(&a, &b).unwrap());

        let a = ScalarValue::Decimal64 {
            value: 2000,
            meta: DecimalTypeMeta::new(18, 3),
        };
        assert_eq!(Ordering::Equal, compare_values(&a, &b).unwrap());
    }

    #[test]
    fn date_vs_timestamp() {
        let a = ScalarValue::Date32(1);
        let b = ScalarValue::TimestampTz(24 * 60 * 60 * 1_000_000);
        assert_eq!(Ordering::Equal, compare_values(&a, &b).unwrap());
    }

    #[test]
    fn intervals_normalize() {
        let a = ScalarValue::Interval(Interval::new(1, 0, 0));
        let b = ScalarValue::Interval(Interval::new(0, 31, 0));
        assert_eq!(Ordering::Less, compare_values(&a, &b).unwrap());
    }

    #[test]
    fn nulls_sort_last() {
        let vals = &mut [
            ScalarValue::Null,
            ScalarValue::Int32(2),
            ScalarValue::Int32(1),
        ];
        vals.sort_by(sort_cmp);
        assert_eq!(
            &[
                ScalarValue::Int32(1),
                ScalarValue::Int32(2),
                ScalarValue::Null
            ],
            vals
        );
    }
}
