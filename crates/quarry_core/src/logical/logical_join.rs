use std::fmt;

use crate::ast::JoinHint;
use crate::explain::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;
use crate::expr::comparison_expr::{ComparisonExpr, ComparisonOperator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// Standard INNER join.
    Inner,
    /// Standard LEFT OUTER join.
    Left,
    /// Standard RIGHT OUTER join.
    Right,
}

impl JoinType {
    /// The side whose rows are preserved even without a match.
    pub const fn preserves_left(&self) -> bool {
        matches!(self, JoinType::Left)
    }

    pub const fn preserves_right(&self) -> bool {
        matches!(self, JoinType::Right)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inner => write!(f, "INNER"),
            Self::Left => write!(f, "LEFT"),
            Self::Right => write!(f, "RIGHT"),
        }
    }
}

/// A single equi-key pair.
///
/// Left/right references must be preserved: the expression on the left only
/// references the left side, the one on the right only the right side.
/// Either side may be an arbitrary expression, not only a bare column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCondition {
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub op: ComparisonOperator,
}

impl JoinCondition {
    /// Flips the sides of the condition, including flipping the operator.
    ///
    /// E.g. 'a >= b' becomes 'b <= a'.
    pub fn flip_sides(&mut self) {
        self.op = self.op.flip();
        std::mem::swap(&mut self.left, &mut self.right);
    }
}

impl From<ComparisonExpr> for JoinCondition {
    fn from(expr: ComparisonExpr) -> Self {
        JoinCondition {
            left: expr.left,
            right: expr.right,
            op: expr.op,
        }
    }
}

impl fmt::Display for JoinCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.op, self.right)
    }
}

/// Join with at least one equi-key condition, plus an optional residual
/// predicate evaluated per candidate pair.
///
/// The residual stays on the join node rather than becoming a filter above
/// it: outer joins must emit preserved rows whose key matched but whose
/// residual failed, which a post-join filter cannot express.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalComparisonJoin {
    pub join_type: JoinType,
    /// Equi-key conditions, combined conjunctively.
    pub conditions: Vec<JoinCondition>,
    /// Non-equi remainder of the original join condition.
    pub residual: Option<Expression>,
    pub hint: JoinHint,
}

impl Explainable for LogicalComparisonJoin {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let mut builder = EntryBuilder::new("ComparisonJoin", conf)
            .with_values("conditions", &self.conditions)
            .with_value("join_type", self.join_type);
        if let Some(residual) = &self.residual {
            builder = builder.with_value("residual", residual);
        }
        builder.build()
    }
}

/// Join on an arbitrary condition with no extractable equi-keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalArbitraryJoin {
    pub join_type: JoinType,
    pub condition: Expression,
    pub hint: JoinHint,
}

impl Explainable for LogicalArbitraryJoin {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("ArbitraryJoin", conf)
            .with_value("condition", &self.condition)
            .with_value("join_type", self.join_type)
            .build()
    }
}

/// Join with no condition at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalCrossJoin;

impl Explainable for LogicalCrossJoin {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("CrossJoin", conf).build()
    }
}
