use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use quarry_error::{QuarryError, Result};

use crate::functions::{
    FunctionVolatility,
    RawScalarFunction,
    ScalarFunction,
    ScalarFunctionSet,
    Signature,
};
use crate::scalars::datatype::DataTypeId;
use crate::scalars::value::ScalarValue;

pub const FUNCTION_SET_NOW: ScalarFunctionSet = ScalarFunctionSet {
    name: "now",
    aliases: &["getdate"],
    functions: &[RawScalarFunction::new(
        Signature::new(&[], DataTypeId::TimestampTz),
        &Now,
    )],
};

pub const FUNCTION_SET_DATE_TRUNC: ScalarFunctionSet = ScalarFunctionSet {
    name: "date_trunc",
    aliases: &[],
    functions: &[RawScalarFunction::new(
        Signature::new(&[DataTypeId::Utf8, DataTypeId::TimestampTz], DataTypeId::TimestampTz),
        &DateTrunc,
    )],
};

/// Current timestamp. Volatile: two calls in one query may differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Now;

impl ScalarFunction for Now {
    fn volatility(&self) -> FunctionVolatility {
        FunctionVolatility::Volatile
    }

    fn invoke(&self, _args: &[ScalarValue]) -> Result<ScalarValue> {
        Ok(ScalarValue::TimestampTz(Utc::now().timestamp_micros()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTrunc;

impl ScalarFunction for DateTrunc {
    fn invoke(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        let (part, micros) = match args {
            [ScalarValue::Null, _] | [_, ScalarValue::Null] => return Ok(ScalarValue::Null),
            [ScalarValue::Utf8(part), ScalarValue::TimestampTz(micros)] => (part, *micros),
            _ => {
                return Err(QuarryError::new(
                    "date_trunc expects a part name and a timestamp",
                ));
            }
        };

        let dt = DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| QuarryError::new("Timestamp out of range"))?;

        let truncated = match part.to_ascii_lowercase().as_str() {
            "year" => Utc
                .with_ymd_and_hms(dt.year(), 1, 1, 0, 0, 0)
                .single(),
            "month" => Utc
                .with_ymd_and_hms(dt.year(), dt.month(), 1, 0, 0, 0)
                .single(),
            "day" => Utc
                .with_ymd_and_hms(dt.year(), dt.month(), dt.day(), 0, 0, 0)
                .single(),
            "hour" => Utc
                .with_ymd_and_hms(dt.year(), dt.month(), dt.day(), dt.hour(), 0, 0)
                .single(),
            "minute" => Utc
                .with_ymd_and_hms(dt.year(), dt.month(), dt.day(), dt.hour(), dt.minute(), 0)
                .single(),
            "second" => Utc
                .with_ymd_and_hms(
                    dt.year(),
                    dt.month(),
                    dt.day(),
                    dt.hour(),
                    dt.minute(),
                    dt.second(),
                )
                .single(),
            other => {
                return Err(QuarryError::new(format!("Unknown date part: {other}")));
            }
        };

        let truncated =
            truncated.ok_or_else(|| QuarryError::new("Timestamp out of range after truncate"))?;
        Ok(ScalarValue::TimestampTz(truncated.timestamp_micros()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trunc_to_day() {
        // 1970-01-02 13:45:00 UTC
        let micros = (36 * 3600 + 105 * 60) as i64 * 1_000_000;
        let got = DateTrunc
            .invoke(&[
                ScalarValue::Utf8("day".into()),
                ScalarValue::TimestampTz(micros),
            ])
            .unwrap();
        assert_eq!(ScalarValue::TimestampTz(86_400_000_000), got);
    }

    #[test]
    fn unknown_part_errors() {
        let res = DateTrunc.invoke(&[
            ScalarValue::Utf8("fortnight".into()),
            ScalarValue::TimestampTz(0),
        ]);
        assert!(res.is_err());
    }
}
