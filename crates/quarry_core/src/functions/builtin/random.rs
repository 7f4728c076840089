use quarry_error::Result;

use crate::functions::{
    FunctionVolatility,
    RawScalarFunction,
    ScalarFunction,
    ScalarFunctionSet,
    Signature,
};
use crate::scalars::datatype::DataTypeId;
use crate::scalars::value::ScalarValue;

pub const FUNCTION_SET_RANDOM: ScalarFunctionSet = ScalarFunctionSet {
    name: "random",
    aliases: &["rand"],
    functions: &[RawScalarFunction::new(
        Signature::new(&[], DataTypeId::Int64),
        &Random,
    )],
};

/// Return a random non-negative integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Random;

impl ScalarFunction for Random {
    fn volatility(&self) -> FunctionVolatility {
        FunctionVolatility::Volatile
    }

    fn invoke(&self, _args: &[ScalarValue]) -> Result<ScalarValue> {
        let v: i64 = rand::random();
        Ok(ScalarValue::Int64(v.unsigned_abs() as i64 & i64::MAX))
    }
}
