use quarry_error::{QuarryError, Result};

use crate::functions::{RawScalarFunction, ScalarFunction, ScalarFunctionSet, Signature};
use crate::scalars::datatype::DataTypeId;
use crate::scalars::value::ScalarValue;

pub const FUNCTION_SET_UPPER: ScalarFunctionSet = ScalarFunctionSet {
    name: "upper",
    aliases: &["toupperinvariant"],
    functions: &[RawScalarFunction::new(
        Signature::new(&[DataTypeId::Utf8], DataTypeId::Utf8),
        &Upper,
    )],
};

pub const FUNCTION_SET_LOWER: ScalarFunctionSet = ScalarFunctionSet {
    name: "lower",
    aliases: &["tolowerinvariant"],
    functions: &[RawScalarFunction::new(
        Signature::new(&[DataTypeId::Utf8], DataTypeId::Utf8),
        &Lower,
    )],
};

pub const FUNCTION_SET_CONCAT: ScalarFunctionSet = ScalarFunctionSet {
    name: "concat",
    aliases: &[],
    functions: &[RawScalarFunction::new(
        Signature::new_variadic(&[], DataTypeId::Utf8, DataTypeId::Utf8),
        &Concat,
    )],
};

pub const FUNCTION_SET_LENGTH: ScalarFunctionSet = ScalarFunctionSet {
    name: "length",
    aliases: &["len"],
    functions: &[RawScalarFunction::new(
        Signature::new(&[DataTypeId::Utf8], DataTypeId::Int64),
        &Length,
    )],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upper;

impl ScalarFunction for Upper {
    fn invoke(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        unary_string(args, |s| ScalarValue::Utf8(s.to_uppercase()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lower;

impl ScalarFunction for Lower {
    fn invoke(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        unary_string(args, |s| ScalarValue::Utf8(s.to_lowercase()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concat;

impl ScalarFunction for Concat {
    fn invoke(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        let mut out = String::new();
        for arg in args {
            match arg {
                ScalarValue::Null => return Ok(ScalarValue::Null),
                ScalarValue::Utf8(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
        }
        Ok(ScalarValue::Utf8(out))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Length;

impl ScalarFunction for Length {
    fn invoke(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        unary_string(args, |s| ScalarValue::Int64(s.chars().count() as i64))
    }
}

fn unary_string<F>(args: &[ScalarValue], f: F) -> Result<ScalarValue>
where
    F: FnOnce(&str) -> ScalarValue,
{
    match args {
        [ScalarValue::Null] => Ok(ScalarValue::Null),
        [ScalarValue::Utf8(s)] => Ok(f(s)),
        other => Err(QuarryError::new(format!(
            "Expected one string argument, got {}",
            other.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_lower() {
        let got = Upper.invoke(&[ScalarValue::Utf8("warsaw".into())]).unwrap();
        assert_eq!(ScalarValue::Utf8("WARSAW".into()), got);

        let got = Lower.invoke(&[ScalarValue::Null]).unwrap();
        assert_eq!(ScalarValue::Null, got);
    }

    #[test]
    fn concat_null_propagates() {
        let got = Concat
            .invoke(&[
                ScalarValue::Utf8("a".into()),
                ScalarValue::Null,
                ScalarValue::Utf8("b".into()),
            ])
            .unwrap();
        assert_eq!(ScalarValue::Null, got);
    }
}
