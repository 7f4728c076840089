use std::collections::HashSet;

use quarry_error::Result;

use crate::expr::Expression;
use crate::expr::conjunction_expr::{ConjunctionExpr, ConjunctionOperator};
use crate::logical::binder::table_list::TableRef;
use crate::logical::logical_join::JoinCondition;

/// Result of decomposing a join condition into equi-key pairs plus a
/// residual.
///
/// Invariant: the union of table refs across all pairs and the residual
/// equals the refs of the original condition. No predicate is lost.
#[derive(Debug, Default)]
pub struct ExtractedConditions {
    /// Equality conditions with sides split cleanly across the join,
    /// normalized so `left` references the left side. Combined
    /// conjunctively.
    pub equi: Vec<JoinCondition>,
    /// Conjuncts that could not become equi-keys, to be re-ANDed.
    pub residual: Vec<Expression>,
}

impl ExtractedConditions {
    /// Fold the residual conjuncts back into one predicate.
    pub fn residual_predicate(residual: Vec<Expression>) -> Result<Option<Expression>> {
        match residual.len() {
            0 => Ok(None),
            1 => Ok(residual.into_iter().next()),
            _ => Ok(Some(
                ConjunctionExpr::try_new(ConjunctionOperator::And, residual)?.into(),
            )),
        }
    }

    /// Rebuild a predicate logically equivalent to the original condition
    /// from the equi pairs and the residual.
    pub fn reconstruct(&self) -> Result<Option<Expression>> {
        let mut conjuncts: Vec<Expression> = Vec::new();
        for condition in &self.equi {
            conjuncts.push(
                crate::expr::comparison_expr::ComparisonExpr {
                    op: condition.op,
                    left: condition.left.clone(),
                    right: condition.right.clone(),
                }
                .into(),
            );
        }
        conjuncts.extend(self.residual.iter().cloned());
        Self::residual_predicate(conjuncts)
    }
}

/// Decomposes a join condition against the table refs of the two join
/// inputs.
#[derive(Debug)]
pub struct JoinConditionExtractor<'a> {
    pub left_refs: &'a HashSet<TableRef>,
    pub right_refs: &'a HashSet<TableRef>,
}

impl<'a> JoinConditionExtractor<'a> {
    pub fn new(left_refs: &'a HashSet<TableRef>, right_refs: &'a HashSet<TableRef>) -> Self {
        JoinConditionExtractor {
            left_refs,
            right_refs,
        }
    }

    /// Split a condition into equi-key pairs and a residual.
    ///
    /// Only top-level AND conjuncts are considered; a top-level OR forces
    /// the entire condition into the residual. An equality conjunct becomes
    /// an equi pair when each side's refs fall exclusively on opposite join
    /// sides; each side may be an arbitrary expression, not only a bare
    /// column. A conjunct mixing both sides' refs, or using a non-equality
    /// operator, joins the residual.
    pub fn extract(&self, condition: Expression) -> Result<ExtractedConditions> {
        let conjuncts = match condition {
            Expression::Conjunction(conj) if conj.op == ConjunctionOperator::And => {
                conj.expressions
            }
            other => vec![other],
        };

        let mut extracted = ExtractedConditions::default();

        for conjunct in conjuncts {
            match conjunct {
                Expression::Comparison(cmp) if cmp.op.is_equality() => {
                    let left_side = cmp.left.get_table_refs();
                    let right_side = cmp.right.get_table_refs();

                    // A side referencing nothing (a constant) can't pin the
                    // conjunct to one join side.
                    if left_side.is_empty() || right_side.is_empty() {
                        extracted.residual.push(Expression::Comparison(cmp));
                        continue;
                    }

                    if left_side.is_subset(self.left_refs)
                        && right_side.is_subset(self.right_refs)
                    {
                        extracted.equi.push(JoinCondition::from(cmp));
                    } else if left_side.is_subset(self.right_refs)
                        && right_side.is_subset(self.left_refs)
                    {
                        let mut condition = JoinCondition::from(cmp);
                        condition.flip_sides();
                        extracted.equi.push(condition);
                    } else {
                        // Mixed refs on one side.
                        extracted.residual.push(Expression::Comparison(cmp));
                    }
                }
                other => extracted.residual.push(other),
            }
        }

        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{add, and, column, eq, gt, lit, or};
    use crate::scalars::datatype::DataType;

    fn refs(ids: &[u32]) -> HashSet<TableRef> {
        ids.iter().copied().map(TableRef).collect()
    }

    fn all_refs(extracted: &ExtractedConditions) -> HashSet<TableRef> {
        let mut out = HashSet::new();
        for condition in &extracted.equi {
            out.extend(condition.left.get_table_refs());
            out.extend(condition.right.get_table_refs());
        }
        for residual in &extracted.residual {
            out.extend(residual.get_table_refs());
        }
        out
    }

    #[test]
    fn plain_equality_becomes_equi_key() {
        let condition: Expression = eq(
            column((0, 0), DataType::Int32),
            column((1, 0), DataType::Int32),
        )
        .unwrap()
        .into();

        let left = refs(&[0]);
        let right = refs(&[1]);
        let got = JoinConditionExtractor::new(&left, &right)
            .extract(condition)
            .unwrap();

        assert_eq!(1, got.equi.len());
        assert!(got.residual.is_empty());
    }

    #[test]
    fn flipped_equality_normalized() {
        // b.id = a.id with a on the left side of the join.
        let condition: Expression = eq(
            column((1, 0), DataType::Int32),
            column((0, 0), DataType::Int32),
        )
        .unwrap()
        .into();

        let left = refs(&[0]);
        let right = refs(&[1]);
        let got = JoinConditionExtractor::new(&left, &right)
            .extract(condition)
            .unwrap();

        assert_eq!(1, got.equi.len());
        assert_eq!(refs(&[0]), got.equi[0].left.get_table_refs());
        assert_eq!(refs(&[1]), got.equi[0].right.get_table_refs());
    }

    #[test]
    fn expression_sides_supported() {
        // a.id = b.id + 1
        let condition: Expression = eq(
            column((0, 0), DataType::Int32),
            add(column((1, 0), DataType::Int32), lit(1_i32)).unwrap(),
        )
        .unwrap()
        .into();

        let left = refs(&[0]);
        let right = refs(&[1]);
        let got = JoinConditionExtractor::new(&left, &right)
            .extract(condition)
            .unwrap();

        assert_eq!(1, got.equi.len());
        assert!(got.residual.is_empty());
    }

    #[test]
    fn top_level_or_forces_residual() {
        let a = eq(
            column((0, 0), DataType::Int32),
            column((1, 0), DataType::Int32),
        )
        .unwrap()
        .into();
        let b = eq(
            column((0, 1), DataType::Int32),
            column((1, 1), DataType::Int32),
        )
        .unwrap()
        .into();
        let condition: Expression = or([a, b]).unwrap().into();

        let left = refs(&[0]);
        let right = refs(&[1]);
        let got = JoinConditionExtractor::new(&left, &right)
            .extract(condition.clone())
            .unwrap();

        assert!(got.equi.is_empty());
        assert_eq!(vec![condition], got.residual);
    }

    #[test]
    fn composite_keys_and_residual() {
        // a.x = b.x AND a.y = b.y AND a.z > b.z AND a.w = 4
        let k1: Expression = eq(
            column((0, 0), DataType::Int32),
            column((1, 0), DataType::Int32),
        )
        .unwrap()
        .into();
        let k2: Expression = eq(
            column((0, 1), DataType::Int32),
            column((1, 1), DataType::Int32),
        )
        .unwrap()
        .into();
        let ineq: Expression = gt(
            column((0, 2), DataType::Int32),
            column((1, 2), DataType::Int32),
        )
        .unwrap()
        .into();
        let constant: Expression = eq(column((0, 3), DataType::Int32), lit(4_i32))
            .unwrap()
            .into();

        let condition: Expression = and([k1, k2, ineq, constant]).unwrap().into();

        let left = refs(&[0]);
        let right = refs(&[1]);
        let got = JoinConditionExtractor::new(&left, &right)
            .extract(condition.clone())
            .unwrap();

        assert_eq!(2, got.equi.len());
        assert_eq!(2, got.residual.len());

        // No predicate loss: refs across pairs and residual equal the
        // original condition's refs.
        assert_eq!(condition.get_table_refs(), all_refs(&got));
    }

    #[test]
    fn mixed_side_equality_goes_residual() {
        // a.x + b.x = b.y mixes both sides on the left.
        let condition: Expression = eq(
            add(
                column((0, 0), DataType::Int32),
                column((1, 0), DataType::Int32),
            )
            .unwrap(),
            column((1, 1), DataType::Int32),
        )
        .unwrap()
        .into();

        let left = refs(&[0]);
        let right = refs(&[1]);
        let got = JoinConditionExtractor::new(&left, &right)
            .extract(condition)
            .unwrap();

        assert!(got.equi.is_empty());
        assert_eq!(1, got.residual.len());
    }

    #[test]
    fn reconstruct_round_trips() {
        let k1: Expression = eq(
            column((0, 0), DataType::Int32),
            column((1, 0), DataType::Int32),
        )
        .unwrap()
        .into();
        let ineq: Expression = gt(
            column((0, 1), DataType::Int32),
            column((1, 1), DataType::Int32),
        )
        .unwrap()
        .into();
        let condition: Expression = and([k1, ineq]).unwrap().into();

        let left = refs(&[0]);
        let right = refs(&[1]);
        let got = JoinConditionExtractor::new(&left, &right)
            .extract(condition.clone())
            .unwrap();

        let rebuilt = got.reconstruct().unwrap().unwrap();
        assert_eq!(condition, rebuilt);
    }
}
