use quarry_error::{QuarryError, Result};

use crate::functions::{RawScalarFunction, ScalarFunction, ScalarFunctionSet, Signature};
use crate::scalars::datatype::{DataType, DataTypeId, DecimalTypeMeta};
use crate::scalars::value::ScalarValue;

pub const FUNCTION_SET_ABS: ScalarFunctionSet = ScalarFunctionSet {
    name: "abs",
    aliases: &[],
    functions: &[
        RawScalarFunction::new(
            Signature::new(&[DataTypeId::Int64], DataTypeId::Int64),
            &AbsInt,
        ),
        RawScalarFunction::new(
            Signature::new(&[DataTypeId::Decimal64], DataTypeId::Decimal64),
            &AbsDecimal,
        ),
        RawScalarFunction::new(
            Signature::new(&[DataTypeId::Decimal128], DataTypeId::Decimal128),
            &AbsDecimal,
        ),
    ],
};

pub const FUNCTION_SET_ROUND: ScalarFunctionSet = ScalarFunctionSet {
    name: "round",
    aliases: &[],
    functions: &[
        RawScalarFunction::new(
            Signature::new(&[DataTypeId::Decimal64], DataTypeId::Decimal64),
            &Round,
        ),
        RawScalarFunction::new(
            Signature::new(&[DataTypeId::Decimal128], DataTypeId::Decimal128),
            &Round,
        ),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsInt;

impl ScalarFunction for AbsInt {
    fn invoke(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        match args {
            [ScalarValue::Null] => Ok(ScalarValue::Null),
            [ScalarValue::Int64(v)] => {
                let abs = v
                    .checked_abs()
                    .ok_or_else(|| QuarryError::new("Integer overflow in abs"))?;
                Ok(ScalarValue::Int64(abs))
            }
            _ => Err(QuarryError::new("abs expects one integer argument")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsDecimal;

impl ScalarFunction for AbsDecimal {
    fn return_type(&self, inputs: &[DataType]) -> Option<DataType> {
        inputs.first().cloned()
    }

    fn invoke(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        match args {
            [ScalarValue::Null] => Ok(ScalarValue::Null),
            [ScalarValue::Decimal64 { value, meta }] => Ok(ScalarValue::Decimal64 {
                value: value.abs(),
                meta: *meta,
            }),
            [ScalarValue::Decimal128 { value, meta }] => Ok(ScalarValue::Decimal128 {
                value: value.abs(),
                meta: *meta,
            }),
            _ => Err(QuarryError::new("abs expects one decimal argument")),
        }
    }
}

/// Round a decimal to scale zero, half away from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Round;

impl ScalarFunction for Round {
    fn return_type(&self, inputs: &[DataType]) -> Option<DataType> {
        match inputs.first()? {
            DataType::Decimal64(m) => {
                Some(DataType::Decimal64(DecimalTypeMeta::new(m.precision, 0)))
            }
            DataType::Decimal128(m) => {
                Some(DataType::Decimal128(DecimalTypeMeta::new(m.precision, 0)))
            }
            _ => None,
        }
    }

    fn invoke(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        let (value, meta) = match args {
            [ScalarValue::Null] => return Ok(ScalarValue::Null),
            [ScalarValue::Decimal64 { value, meta }] => (*value as i128, *meta),
            [ScalarValue::Decimal128 { value, meta }] => (*value, *meta),
            _ => return Err(QuarryError::new("round expects one decimal argument")),
        };

        let rounded = round_half_away(value, meta.scale);
        let meta = DecimalTypeMeta::new(meta.precision, 0);
        match args {
            [ScalarValue::Decimal64 { .. }] => Ok(ScalarValue::Decimal64 {
                value: rounded as i64,
                meta,
            }),
            _ => Ok(ScalarValue::Decimal128 {
                value: rounded,
                meta,
            }),
        }
    }
}

fn round_half_away(value: i128, scale: i8) -> i128 {
    if scale <= 0 {
        return value;
    }
    let pow = 10_i128.pow(scale as u32);
    let whole = value / pow;
    let rem = value % pow;
    if rem.abs() * 2 >= pow {
        whole + rem.signum()
    } else {
        whole
    }
}
