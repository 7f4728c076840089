//! Common subexpression analysis for one row-evaluation scope.
//!
//! Structurally identical pure subtrees repeated within one operator's
//! expression list share a cache slot: the first evaluation fills the slot,
//! later occurrences read it. A subtree that calls a non-deterministic
//! function at any depth is excluded entirely, even when it appears inside
//! an otherwise-cacheable larger expression (the larger expression is then
//! excluded too).

use std::collections::HashMap;

use crate::expr::Expression;
use crate::functions::FunctionVolatility;
use crate::functions::registry::NondeterministicFunctions;

#[derive(Debug, Default)]
pub struct CseAnalysis {
    slots: HashMap<Expression, usize>,
    slot_count: usize,
}

impl CseAnalysis {
    /// Analyze the expressions of one row-evaluation scope.
    pub fn analyze<'a>(
        exprs: impl IntoIterator<Item = &'a Expression>,
        nondeterministic: &NondeterministicFunctions,
    ) -> Self {
        let mut counts: HashMap<&Expression, usize> = HashMap::new();
        let mut order: Vec<&Expression> = Vec::new();

        for expr in exprs {
            visit(expr, nondeterministic, &mut counts, &mut order);
        }

        let mut slots = HashMap::new();
        let mut slot_count = 0;
        for expr in order {
            if counts.get(expr).copied().unwrap_or(0) >= 2 {
                slots.insert(expr.clone(), slot_count);
                slot_count += 1;
            }
        }

        CseAnalysis { slots, slot_count }
    }

    pub fn slot_for(&self, expr: &Expression) -> Option<usize> {
        self.slots.get(expr).copied()
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }
}

fn visit<'a>(
    expr: &'a Expression,
    nondeterministic: &NondeterministicFunctions,
    counts: &mut HashMap<&'a Expression, usize>,
    order: &mut Vec<&'a Expression>,
) {
    if cacheable(expr, nondeterministic) {
        let count = counts.entry(expr).or_insert(0);
        *count += 1;
        if *count == 1 {
            order.push(expr);
        }
    }

    // Always descend: a pure subtree under an excluded parent may still be
    // shared with occurrences elsewhere.
    let _ = expr.for_each_child(&mut |child| {
        visit(child, nondeterministic, counts, order);
        Ok(())
    });
}

fn cacheable(expr: &Expression, nondeterministic: &NondeterministicFunctions) -> bool {
    // Leaves are cheaper to re-evaluate than to cache.
    if matches!(expr, Expression::Literal(_) | Expression::Column(_)) {
        return false;
    }
    // Subqueries already evaluate at most once per query.
    if matches!(expr, Expression::Subquery(_)) {
        return false;
    }
    !contains_nondeterministic(expr, nondeterministic)
}

/// Whether any node in the subtree, at any depth, is non-deterministic:
/// declared volatile on the function itself, or named in the registry's
/// published set.
pub fn contains_nondeterministic(
    expr: &Expression,
    nondeterministic: &NondeterministicFunctions,
) -> bool {
    match expr {
        Expression::ScalarFunction(f)
            if f.function.volatility() == FunctionVolatility::Volatile
                || nondeterministic.contains(f.function.name) =>
        {
            return true;
        }
        Expression::Subquery(sub) if sub.volatile => return true,
        _ => (),
    }

    let mut found = false;
    let _ = expr.for_each_child(&mut |child| {
        found = found || contains_nondeterministic(child, nondeterministic);
        Ok(())
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::scalar_function_expr::ScalarFunctionExpr;
    use crate::expr::{add, column};
    use crate::functions::registry::FunctionRegistry;
    use crate::scalars::datatype::DataType;

    fn registry() -> FunctionRegistry {
        FunctionRegistry::with_builtins().unwrap()
    }

    fn nondet() -> NondeterministicFunctions {
        NondeterministicFunctions::scan([&registry()])
    }

    fn call(name: &str, inputs: Vec<Expression>) -> Expression {
        let types = inputs
            .iter()
            .map(|i| i.datatype().unwrap())
            .collect::<Vec<_>>();
        let (function, _) = registry().resolve_scalar(name, &types).unwrap();
        Expression::ScalarFunction(ScalarFunctionExpr { function, inputs })
    }

    #[test]
    fn repeated_pure_subtree_gets_slot() {
        let arg: Expression = column((0, 0), DataType::Utf8).into();
        let a = call("upper", vec![arg.clone()]);
        let b = call("upper", vec![arg]);

        let analysis = CseAnalysis::analyze([&a, &b], &nondet());
        assert_eq!(1, analysis.slot_count());
        assert!(analysis.slot_for(&a).is_some());
        assert_eq!(analysis.slot_for(&a), analysis.slot_for(&b));
    }

    #[test]
    fn volatile_call_never_cached() {
        let a = call("random", vec![]);
        let b = call("random", vec![]);

        let analysis = CseAnalysis::analyze([&a, &b], &nondet());
        assert_eq!(0, analysis.slot_count());
        assert!(analysis.slot_for(&a).is_none());
    }

    #[test]
    fn containing_subtree_excluded_pure_inner_still_cached() {
        // abs(c) + random(), repeated. The containing add is excluded from
        // caching since it holds a volatile call at depth, but the pure
        // abs(c) inside still shares one slot across occurrences.
        let pure = call("abs", vec![column((0, 0), DataType::Int64).into()]);
        let tainted_a: Expression = add(pure.clone(), call("random", vec![])).unwrap().into();
        let tainted_b: Expression = add(pure.clone(), call("random", vec![])).unwrap().into();

        let analysis = CseAnalysis::analyze([&tainted_a, &tainted_b], &nondet());
        assert_eq!(1, analysis.slot_count());
        assert!(analysis.slot_for(&tainted_a).is_none());
        assert!(analysis.slot_for(&pure).is_some());
    }

    #[test]
    fn registry_published_name_excluded() {
        // A function not declared volatile on its implementation is still
        // excluded when the published set names it; the registry is
        // authoritative for non-determinism.
        let upper = call("upper", vec![column((0, 0), DataType::Utf8).into()]);
        assert!(!contains_nondeterministic(&upper, &nondet()));

        let host_set = NondeterministicFunctions::from_names(["UPPER"]);
        assert!(contains_nondeterministic(&upper, &host_set));

        let analysis = CseAnalysis::analyze([&upper, &upper], &host_set);
        assert_eq!(0, analysis.slot_count());
    }

    #[test]
    fn single_occurrence_not_cached() {
        let a = call("abs", vec![column((0, 0), DataType::Int64).into()]);
        let analysis = CseAnalysis::analyze([&a], &nondet());
        assert_eq!(0, analysis.slot_count());
    }
}
