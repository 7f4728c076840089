pub mod datetime;
pub mod general;
pub mod numeric;
pub mod random;
pub mod string;

use super::ScalarFunctionSet;

pub const BUILTIN_SCALAR_SETS: &[&ScalarFunctionSet] = &[
    &string::FUNCTION_SET_UPPER,
    &string::FUNCTION_SET_LOWER,
    &string::FUNCTION_SET_CONCAT,
    &string::FUNCTION_SET_LENGTH,
    &numeric::FUNCTION_SET_ABS,
    &numeric::FUNCTION_SET_ROUND,
    &general::FUNCTION_SET_COALESCE,
    &datetime::FUNCTION_SET_NOW,
    &datetime::FUNCTION_SET_DATE_TRUNC,
    &random::FUNCTION_SET_RANDOM,
];
