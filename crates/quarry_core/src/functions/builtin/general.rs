use quarry_error::Result;

use crate::functions::{RawScalarFunction, ScalarFunction, ScalarFunctionSet, Signature};
use crate::scalars::datatype::{DataType, DataTypeId};
use crate::scalars::value::ScalarValue;

pub const FUNCTION_SET_COALESCE: ScalarFunctionSet = ScalarFunctionSet {
    name: "coalesce",
    aliases: &[],
    functions: &[RawScalarFunction::new(
        Signature::new_variadic(&[], DataTypeId::Any, DataTypeId::Any),
        &Coalesce,
    )],
};

/// First non-null argument, or null if all are null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coalesce;

impl ScalarFunction for Coalesce {
    fn return_type(&self, inputs: &[DataType]) -> Option<DataType> {
        inputs
            .iter()
            .find(|t| !t.is_null())
            .or(inputs.first())
            .cloned()
    }

    fn invoke(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        for arg in args {
            if !arg.is_null() {
                return Ok(arg.clone());
            }
        }
        Ok(ScalarValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_non_null() {
        let got = Coalesce
            .invoke(&[
                ScalarValue::Null,
                ScalarValue::Int32(4),
                ScalarValue::Int32(5),
            ])
            .unwrap();
        assert_eq!(ScalarValue::Int32(4), got);
    }

    #[test]
    fn all_null() {
        let got = Coalesce
            .invoke(&[ScalarValue::Null, ScalarValue::Null])
            .unwrap();
        assert_eq!(ScalarValue::Null, got);
    }
}
