pub mod aggregate;
pub mod builtin;
pub mod cast;
pub mod implicit;
pub mod registry;

use std::fmt::Debug;
use std::hash::{Hash, Hasher};

use quarry_error::Result;

use crate::scalars::datatype::{DataType, DataTypeId};
use crate::scalars::value::ScalarValue;

/// Whether repeated calls with identical arguments are guaranteed to produce
/// identical results.
///
/// Volatile functions are excluded from expression caching and feed the
/// process-wide non-deterministic function set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionVolatility {
    Consistent,
    Volatile,
}

/// Input/output shape of a single function overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub args: &'static [DataTypeId],
    /// Type accepted for any number of trailing arguments.
    pub variadic: Option<DataTypeId>,
    pub return_type: DataTypeId,
}

impl Signature {
    pub const fn new(args: &'static [DataTypeId], return_type: DataTypeId) -> Self {
        Signature {
            args,
            variadic: None,
            return_type,
        }
    }

    pub const fn new_variadic(
        args: &'static [DataTypeId],
        variadic: DataTypeId,
        return_type: DataTypeId,
    ) -> Self {
        Signature {
            args,
            variadic: Some(variadic),
            return_type,
        }
    }
}

/// A scalar function implementation.
pub trait ScalarFunction: Debug + Send + Sync {
    fn volatility(&self) -> FunctionVolatility {
        FunctionVolatility::Consistent
    }

    /// Compute the return type from concrete input types.
    ///
    /// Returning None uses the default datatype for the signature's return
    /// type id. Override for overloads whose output depends on input
    /// metadata (decimal scale, passthrough types).
    fn return_type(&self, _inputs: &[DataType]) -> Option<DataType> {
        None
    }

    fn invoke(&self, args: &[ScalarValue]) -> Result<ScalarValue>;
}

/// A single overload: signature plus implementation.
#[derive(Debug, Clone, Copy)]
pub struct RawScalarFunction {
    pub signature: Signature,
    pub function: &'static dyn ScalarFunction,
}

impl RawScalarFunction {
    pub const fn new(signature: Signature, function: &'static dyn ScalarFunction) -> Self {
        RawScalarFunction {
            signature,
            function,
        }
    }
}

/// Named set of scalar overloads registered as one function.
#[derive(Debug, Clone, Copy)]
pub struct ScalarFunctionSet {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub functions: &'static [RawScalarFunction],
}

/// A scalar function resolved against concrete argument types.
#[derive(Debug, Clone)]
pub struct PlannedScalarFunction {
    pub name: &'static str,
    pub raw: &'static RawScalarFunction,
    pub return_type: DataType,
}

impl PlannedScalarFunction {
    pub fn volatility(&self) -> FunctionVolatility {
        self.raw.function.volatility()
    }

    pub fn invoke(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        self.raw.function.invoke(args)
    }
}

impl PartialEq for PlannedScalarFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && std::ptr::eq(self.raw, other.raw)
            && self.return_type == other.return_type
    }
}

impl Eq for PlannedScalarFunction {}

impl Hash for PlannedScalarFunction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.return_type.hash(state);
    }
}

/// Per-group accumulator state for an aggregate.
pub trait AggregateState: Debug {
    fn update(&mut self, args: &[ScalarValue]) -> Result<()>;
    fn finalize(&mut self) -> Result<ScalarValue>;
}

/// An aggregate function implementation.
pub trait AggregateFunction: Debug + Send + Sync {
    fn return_type(&self, _inputs: &[DataType]) -> Option<DataType> {
        None
    }

    fn new_state(&self) -> Box<dyn AggregateState>;
}

#[derive(Debug, Clone, Copy)]
pub struct RawAggregateFunction {
    pub signature: Signature,
    pub function: &'static dyn AggregateFunction,
}

impl RawAggregateFunction {
    pub const fn new(signature: Signature, function: &'static dyn AggregateFunction) -> Self {
        RawAggregateFunction {
            signature,
            function,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AggregateFunctionSet {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub functions: &'static [RawAggregateFunction],
}

/// An aggregate resolved against concrete argument types.
#[derive(Debug, Clone)]
pub struct PlannedAggregateFunction {
    pub name: &'static str,
    pub raw: &'static RawAggregateFunction,
    pub return_type: DataType,
}

impl PlannedAggregateFunction {
    pub fn new_state(&self) -> Box<dyn AggregateState> {
        self.raw.function.new_state()
    }
}

impl PartialEq for PlannedAggregateFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && std::ptr::eq(self.raw, other.raw)
            && self.return_type == other.return_type
    }
}

impl Eq for PlannedAggregateFunction {}

impl Hash for PlannedAggregateFunction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.return_type.hash(state);
    }
}
