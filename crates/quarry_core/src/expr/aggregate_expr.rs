use std::fmt;

use crate::functions::PlannedAggregateFunction;

use super::Expression;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateExpr {
    pub agg: PlannedAggregateFunction,
    pub inputs: Vec<Expression>,
}

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.agg.name)?;
        if self.inputs.is_empty() {
            write!(f, "*")?;
        }
        for (idx, input) in self.inputs.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{input}")?;
        }
        write!(f, ")")
    }
}
