use std::fmt;

use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByExpr {
    pub expr: Expression,
    pub desc: bool,
}

impl fmt::Display for OrderByExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.expr, if self.desc { "DESC" } else { "ASC" })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalOrder {
    pub exprs: Vec<OrderByExpr>,
}

impl Explainable for LogicalOrder {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Order", conf)
            .with_values("expressions", &self.exprs)
            .build()
    }
}
