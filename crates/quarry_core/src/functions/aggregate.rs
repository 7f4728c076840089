//! Builtin aggregate functions.

use quarry_error::{QuarryError, Result};

use super::{
    AggregateFunction,
    AggregateFunctionSet,
    AggregateState,
    RawAggregateFunction,
    Signature,
};
use crate::scalars::compare::compare_values;
use crate::scalars::datatype::{DataType, DataTypeId, DecimalTypeMeta};
use crate::scalars::value::ScalarValue;

pub const BUILTIN_AGGREGATE_SETS: &[&AggregateFunctionSet] = &[
    &FUNCTION_SET_COUNT,
    &FUNCTION_SET_SUM,
    &FUNCTION_SET_MIN,
    &FUNCTION_SET_MAX,
    &FUNCTION_SET_AVG,
];

pub const FUNCTION_SET_COUNT: AggregateFunctionSet = AggregateFunctionSet {
    name: "count",
    aliases: &[],
    functions: &[
        // count(*)
        RawAggregateFunction::new(Signature::new(&[], DataTypeId::Int64), &Count),
        // count(expr), skipping nulls
        RawAggregateFunction::new(Signature::new(&[DataTypeId::Any], DataTypeId::Int64), &Count),
    ],
};

pub const FUNCTION_SET_SUM: AggregateFunctionSet = AggregateFunctionSet {
    name: "sum",
    aliases: &[],
    functions: &[
        RawAggregateFunction::new(
            Signature::new(&[DataTypeId::Int64], DataTypeId::Int64),
            &SumInt,
        ),
        RawAggregateFunction::new(
            Signature::new(&[DataTypeId::UInt64], DataTypeId::UInt64),
            &SumUInt,
        ),
        RawAggregateFunction::new(
            Signature::new(&[DataTypeId::Decimal64], DataTypeId::Decimal128),
            &SumDecimal,
        ),
        RawAggregateFunction::new(
            Signature::new(&[DataTypeId::Decimal128], DataTypeId::Decimal128),
            &SumDecimal,
        ),
    ],
};

pub const FUNCTION_SET_MIN: AggregateFunctionSet = AggregateFunctionSet {
    name: "min",
    aliases: &[],
    functions: &[RawAggregateFunction::new(
        Signature::new(&[DataTypeId::Any], DataTypeId::Any),
        &MinMax { min: true },
    )],
};

pub const FUNCTION_SET_MAX: AggregateFunctionSet = AggregateFunctionSet {
    name: "max",
    aliases: &[],
    functions: &[RawAggregateFunction::new(
        Signature::new(&[DataTypeId::Any], DataTypeId::Any),
        &MinMax { min: false },
    )],
};

pub const FUNCTION_SET_AVG: AggregateFunctionSet = AggregateFunctionSet {
    name: "avg",
    aliases: &[],
    functions: &[
        RawAggregateFunction::new(
            Signature::new(&[DataTypeId::Int64], DataTypeId::Decimal128),
            &Avg,
        ),
        RawAggregateFunction::new(
            Signature::new(&[DataTypeId::Decimal64], DataTypeId::Decimal128),
            &Avg,
        ),
        RawAggregateFunction::new(
            Signature::new(&[DataTypeId::Decimal128], DataTypeId::Decimal128),
            &Avg,
        ),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Count;

impl AggregateFunction for Count {
    fn new_state(&self) -> Box<dyn AggregateState> {
        Box::new(CountState { count: 0 })
    }
}

#[derive(Debug)]
struct CountState {
    count: i64,
}

impl AggregateState for CountState {
    fn update(&mut self, args: &[ScalarValue]) -> Result<()> {
        // count(*) has no arguments and counts every row; count(expr) skips
        // nulls.
        match args {
            [] => self.count += 1,
            [v] if !v.is_null() => self.count += 1,
            _ => (),
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ScalarValue> {
        Ok(ScalarValue::Int64(self.count))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SumInt;

impl AggregateFunction for SumInt {
    fn new_state(&self) -> Box<dyn AggregateState> {
        Box::new(SumState {
            acc: None,
            scale: 0,
            kind: SumKind::Int,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SumUInt;

impl AggregateFunction for SumUInt {
    fn new_state(&self) -> Box<dyn AggregateState> {
        Box::new(SumState {
            acc: None,
            scale: 0,
            kind: SumKind::UInt,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SumDecimal;

impl AggregateFunction for SumDecimal {
    fn return_type(&self, inputs: &[DataType]) -> Option<DataType> {
        match inputs.first()? {
            DataType::Decimal64(m) | DataType::Decimal128(m) => {
                Some(DataType::Decimal128(DecimalTypeMeta::new(38, m.scale)))
            }
            _ => None,
        }
    }

    fn new_state(&self) -> Box<dyn AggregateState> {
        Box::new(SumState {
            acc: None,
            scale: 0,
            kind: SumKind::Decimal,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SumKind {
    Int,
    UInt,
    Decimal,
}

#[derive(Debug)]
struct SumState {
    /// Accumulated unscaled value; None until the first non-null input.
    acc: Option<i128>,
    scale: i8,
    kind: SumKind,
}

impl AggregateState for SumState {
    fn update(&mut self, args: &[ScalarValue]) -> Result<()> {
        let value = match args {
            [v] if v.is_null() => return Ok(()),
            [v] => v,
            _ => return Err(QuarryError::new("sum expects one argument")),
        };

        let (unscaled, scale) = value
            .as_decimal_parts()
            .ok_or_else(|| QuarryError::new(format!("sum over non-numeric: {value}")))?;
        self.scale = scale;
        let acc = self.acc.unwrap_or(0);
        self.acc = Some(
            acc.checked_add(unscaled)
                .ok_or_else(|| QuarryError::new("Numeric overflow in sum"))?,
        );
        Ok(())
    }

    fn finalize(&mut self) -> Result<ScalarValue> {
        let acc = match self.acc {
            Some(acc) => acc,
            None => return Ok(ScalarValue::Null),
        };
        match self.kind {
            SumKind::Int => i64::try_from(acc)
                .map(ScalarValue::Int64)
                .map_err(|_| QuarryError::new("Numeric overflow in sum")),
            SumKind::UInt => u64::try_from(acc)
                .map(ScalarValue::UInt64)
                .map_err(|_| QuarryError::new("Numeric overflow in sum")),
            SumKind::Decimal => Ok(ScalarValue::Decimal128 {
                value: acc,
                meta: DecimalTypeMeta::new(38, self.scale),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinMax {
    min: bool,
}

impl AggregateFunction for MinMax {
    fn return_type(&self, inputs: &[DataType]) -> Option<DataType> {
        inputs.first().cloned()
    }

    fn new_state(&self) -> Box<dyn AggregateState> {
        Box::new(MinMaxState {
            min: self.min,
            acc: None,
        })
    }
}

#[derive(Debug)]
struct MinMaxState {
    min: bool,
    acc: Option<ScalarValue>,
}

impl AggregateState for MinMaxState {
    fn update(&mut self, args: &[ScalarValue]) -> Result<()> {
        let value = match args {
            [v] if v.is_null() => return Ok(()),
            [v] => v,
            _ => return Err(QuarryError::new("min/max expects one argument")),
        };

        match &self.acc {
            None => self.acc = Some(value.clone()),
            Some(current) => {
                let ord = compare_values(value, current)?;
                let replace = if self.min {
                    ord.is_lt()
                } else {
                    ord.is_gt()
                };
                if replace {
                    self.acc = Some(value.clone());
                }
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ScalarValue> {
        Ok(self.acc.take().unwrap_or(ScalarValue::Null))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Avg;

const AVG_RESULT_SCALE: i8 = 6;

impl AggregateFunction for Avg {
    fn return_type(&self, _inputs: &[DataType]) -> Option<DataType> {
        Some(DataType::Decimal128(DecimalTypeMeta::new(
            38,
            AVG_RESULT_SCALE,
        )))
    }

    fn new_state(&self) -> Box<dyn AggregateState> {
        Box::new(AvgState {
            sum: 0,
            scale: 0,
            count: 0,
        })
    }
}

#[derive(Debug)]
struct AvgState {
    sum: i128,
    scale: i8,
    count: i64,
}

impl AggregateState for AvgState {
    fn update(&mut self, args: &[ScalarValue]) -> Result<()> {
        let value = match args {
            [v] if v.is_null() => return Ok(()),
            [v] => v,
            _ => return Err(QuarryError::new("avg expects one argument")),
        };
        let (unscaled, scale) = value
            .as_decimal_parts()
            .ok_or_else(|| QuarryError::new(format!("avg over non-numeric: {value}")))?;
        self.scale = scale;
        self.sum = self
            .sum
            .checked_add(unscaled)
            .ok_or_else(|| QuarryError::new("Numeric overflow in avg"))?;
        self.count += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<ScalarValue> {
        if self.count == 0 {
            return Ok(ScalarValue::Null);
        }
        // Rescale the sum to the output scale before dividing so the
        // division keeps fractional digits.
        let shift = (AVG_RESULT_SCALE - self.scale).max(0) as u32;
        let scaled = self
            .sum
            .checked_mul(10_i128.pow(shift))
            .ok_or_else(|| QuarryError::new("Numeric overflow in avg"))?;
        Ok(ScalarValue::Decimal128 {
            value: scaled / self.count as i128,
            meta: DecimalTypeMeta::new(38, AVG_RESULT_SCALE),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_star_vs_count_expr() {
        let mut star = Count.new_state();
        let mut expr = Count.new_state();
        star.update(&[]).unwrap();
        star.update(&[]).unwrap();
        expr.update(&[ScalarValue::Int32(1)]).unwrap();
        expr.update(&[ScalarValue::Null]).unwrap();

        assert_eq!(ScalarValue::Int64(2), star.finalize().unwrap());
        assert_eq!(ScalarValue::Int64(1), expr.finalize().unwrap());
    }

    #[test]
    fn sum_skips_nulls() {
        let mut state = SumInt.new_state();
        state.update(&[ScalarValue::Int64(2)]).unwrap();
        state.update(&[ScalarValue::Null]).unwrap();
        state.update(&[ScalarValue::Int64(40)]).unwrap();
        assert_eq!(ScalarValue::Int64(42), state.finalize().unwrap());
    }

    #[test]
    fn sum_all_null_is_null() {
        let mut state = SumInt.new_state();
        state.update(&[ScalarValue::Null]).unwrap();
        assert_eq!(ScalarValue::Null, state.finalize().unwrap());
    }

    #[test]
    fn min_max_over_mixed_widths() {
        let mut min = MinMax { min: true }.new_state();
        min.update(&[ScalarValue::Int64(5)]).unwrap();
        min.update(&[ScalarValue::Int64(-3)]).unwrap();
        assert_eq!(ScalarValue::Int64(-3), min.finalize().unwrap());

        let mut max = MinMax { min: false }.new_state();
        max.update(&[ScalarValue::Utf8("a".into())]).unwrap();
        max.update(&[ScalarValue::Utf8("c".into())]).unwrap();
        assert_eq!(ScalarValue::Utf8("c".into()), max.finalize().unwrap());
    }

    #[test]
    fn avg_keeps_fraction() {
        let mut state = Avg.new_state();
        state.update(&[ScalarValue::Int64(1)]).unwrap();
        state.update(&[ScalarValue::Int64(2)]).unwrap();
        let got = state.finalize().unwrap();
        assert_eq!(
            ScalarValue::Decimal128 {
                value: 1_500_000,
                meta: DecimalTypeMeta::new(38, 6)
            },
            got
        );
    }
}
