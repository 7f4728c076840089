use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use quarry_error::{QuarryError, Result};

use super::implicit::{NO_CAST_SCORE, implicit_cast_score};
use super::{
    AggregateFunctionSet,
    FunctionVolatility,
    PlannedAggregateFunction,
    PlannedScalarFunction,
    RawAggregateFunction,
    RawScalarFunction,
    ScalarFunctionSet,
    Signature,
};
use crate::scalars::datatype::{DataType, DataTypeId};
use crate::util::fmt::DisplayAsList;

/// Function registry for a single engine instance.
///
/// Functions are registered explicitly at construction; lookup is
/// case-insensitive. No reflection or scanning happens at query time.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    scalars: HashMap<String, &'static ScalarFunctionSet>,
    aggregates: HashMap<String, &'static AggregateFunctionSet>,
}

/// Outcome of resolving a function name and argument types to one overload.
#[derive(Debug)]
pub struct ResolvedOverload<T: 'static> {
    pub raw: &'static T,
    /// Per-argument cast target, None when the argument is already the
    /// signature type.
    pub arg_casts: Vec<Option<DataType>>,
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        FunctionRegistry::default()
    }

    pub fn with_builtins() -> Result<Self> {
        let mut registry = FunctionRegistry::empty();
        for set in super::builtin::BUILTIN_SCALAR_SETS {
            registry.register_scalar_set(set)?;
        }
        for set in super::aggregate::BUILTIN_AGGREGATE_SETS {
            registry.register_aggregate_set(set)?;
        }
        Ok(registry)
    }

    pub fn register_scalar_set(&mut self, set: &'static ScalarFunctionSet) -> Result<()> {
        for name in std::iter::once(set.name).chain(set.aliases.iter().copied()) {
            let key = name.to_ascii_lowercase();
            if self.scalars.insert(key, set).is_some() {
                return Err(QuarryError::new(format!(
                    "Duplicate scalar function name: {name}"
                )));
            }
        }
        Ok(())
    }

    pub fn register_aggregate_set(&mut self, set: &'static AggregateFunctionSet) -> Result<()> {
        for name in std::iter::once(set.name).chain(set.aliases.iter().copied()) {
            let key = name.to_ascii_lowercase();
            if self.aggregates.insert(key, set).is_some() {
                return Err(QuarryError::new(format!(
                    "Duplicate aggregate function name: {name}"
                )));
            }
        }
        Ok(())
    }

    pub fn get_scalar(&self, name: &str) -> Option<&'static ScalarFunctionSet> {
        self.scalars.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn get_aggregate(&self, name: &str) -> Option<&'static AggregateFunctionSet> {
        self.aggregates.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn is_aggregate(&self, name: &str) -> bool {
        self.aggregates.contains_key(&name.to_ascii_lowercase())
    }

    /// Resolve a scalar call to its best-scoring overload.
    pub fn resolve_scalar(
        &self,
        name: &str,
        inputs: &[DataType],
    ) -> Result<(PlannedScalarFunction, Vec<Option<DataType>>)> {
        let set = self
            .get_scalar(name)
            .ok_or_else(|| QuarryError::new(format!("Unknown function: {name}")))?;

        let resolved = best_overload(set.functions, |f| &f.signature, inputs)
            .ok_or_else(|| overload_error(set.name, inputs))?;

        let return_type = resolved
            .raw
            .function
            .return_type(inputs)
            .or_else(|| DataType::default_for(resolved.raw.signature.return_type))
            .ok_or_else(|| {
                QuarryError::new(format!("Cannot determine return type for {name}"))
            })?;

        Ok((
            PlannedScalarFunction {
                name: set.name,
                raw: resolved.raw,
                return_type,
            },
            resolved.arg_casts,
        ))
    }

    /// Resolve an aggregate call to its best-scoring overload.
    pub fn resolve_aggregate(
        &self,
        name: &str,
        inputs: &[DataType],
    ) -> Result<(PlannedAggregateFunction, Vec<Option<DataType>>)> {
        let set = self
            .get_aggregate(name)
            .ok_or_else(|| QuarryError::new(format!("Unknown aggregate: {name}")))?;

        let resolved = best_overload(set.functions, |f| &f.signature, inputs)
            .ok_or_else(|| overload_error(set.name, inputs))?;

        let return_type = resolved
            .raw
            .function
            .return_type(inputs)
            .or_else(|| DataType::default_for(resolved.raw.signature.return_type))
            .ok_or_else(|| {
                QuarryError::new(format!("Cannot determine return type for {name}"))
            })?;

        Ok((
            PlannedAggregateFunction {
                name: set.name,
                raw: resolved.raw,
                return_type,
            },
            resolved.arg_casts,
        ))
    }

    fn scalar_sets(&self) -> impl Iterator<Item = &'static ScalarFunctionSet> + '_ {
        self.scalars.values().copied()
    }
}

fn overload_error(name: &str, inputs: &[DataType]) -> QuarryError {
    QuarryError::new(format!(
        "No overload of '{name}' matches argument types ({})",
        DisplayAsList(inputs)
    ))
}

fn best_overload<T, F>(
    candidates: &'static [T],
    signature: F,
    inputs: &[DataType],
) -> Option<ResolvedOverload<T>>
where
    F: Fn(&T) -> &Signature,
{
    let mut best: Option<(u32, &'static T)> = None;
    for candidate in candidates {
        if let Some(score) = score_signature(signature(candidate), inputs) {
            match best {
                Some((best_score, _)) if best_score >= score => {}
                _ => best = Some((score, candidate)),
            }
        }
    }

    let (_, raw) = best?;
    let sig = signature(raw);
    let arg_casts = inputs
        .iter()
        .enumerate()
        .map(|(idx, have)| {
            let want = sig
                .args
                .get(idx)
                .copied()
                .or(sig.variadic)
                .unwrap_or(DataTypeId::Any);
            if want == DataTypeId::Any || have.datatype_id() == want {
                None
            } else {
                DataType::default_for(want)
            }
        })
        .collect();

    Some(ResolvedOverload { raw, arg_casts })
}

fn score_signature(sig: &Signature, inputs: &[DataType]) -> Option<u32> {
    match sig.variadic {
        None if inputs.len() != sig.args.len() => return None,
        Some(_) if inputs.len() < sig.args.len() => return None,
        _ => (),
    }

    let mut total = 0;
    for (idx, have) in inputs.iter().enumerate() {
        let want = sig.args.get(idx).copied().or(sig.variadic)?;
        let score = if want == DataTypeId::Any || have.datatype_id() == want {
            NO_CAST_SCORE
        } else {
            implicit_cast_score(have.datatype_id(), want)?
        };
        total += score;
    }
    Some(total)
}

/// The set of function names whose results may vary across identical calls.
///
/// Read-only after build; rebuilt only when the set of registered function
/// libraries changes. Names are stored lowercase and compared
/// case-insensitively.
#[derive(Debug, Default)]
pub struct NondeterministicFunctions {
    names: HashSet<String>,
}

impl NondeterministicFunctions {
    pub fn empty() -> Self {
        NondeterministicFunctions::default()
    }

    /// Collect volatile function names from the given registries.
    ///
    /// Idempotent, order-independent, and duplicate-tolerant; an empty input
    /// yields an empty set.
    pub fn scan<'a>(registries: impl IntoIterator<Item = &'a FunctionRegistry>) -> Self {
        let mut names = HashSet::new();
        for registry in registries {
            for set in registry.scalar_sets() {
                let volatile = set
                    .functions
                    .iter()
                    .any(|f| f.function.volatility() == FunctionVolatility::Volatile);
                if volatile {
                    names.insert(set.name.to_ascii_lowercase());
                    names.extend(set.aliases.iter().map(|a| a.to_ascii_lowercase()));
                }
            }
        }
        NondeterministicFunctions { names }
    }

    /// Build from explicit names, for hosts whose function libraries live
    /// outside the registry.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        NondeterministicFunctions {
            names: names
                .into_iter()
                .map(|n| n.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

static GLOBAL_NONDETERMINISTIC: RwLock<Option<Arc<NondeterministicFunctions>>> =
    RwLock::new(None);

/// Atomically publish the process-wide nondeterministic set.
///
/// Built once per distinct registry set; concurrent readers see either the
/// previous or the new set, never a partial one.
pub fn publish_nondeterministic(set: Arc<NondeterministicFunctions>) {
    *GLOBAL_NONDETERMINISTIC.write() = Some(set);
}

/// Get the published process-wide set, empty if none was published.
pub fn global_nondeterministic() -> Arc<NondeterministicFunctions> {
    GLOBAL_NONDETERMINISTIC
        .read()
        .clone()
        .unwrap_or_else(|| Arc::new(NondeterministicFunctions::empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup_case_insensitive() {
        let registry = FunctionRegistry::with_builtins().unwrap();
        assert!(registry.get_scalar("UPPER").is_some());
        assert!(registry.get_scalar("upper").is_some());
        assert!(registry.get_aggregate("Count").is_some());
    }

    #[test]
    fn resolve_inserts_casts() {
        let registry = FunctionRegistry::with_builtins().unwrap();
        let (planned, casts) = registry
            .resolve_scalar("abs", &[DataType::Int16])
            .unwrap();
        assert_eq!(DataType::Int64, planned.return_type);
        assert_eq!(vec![Some(DataType::Int64)], casts);
    }

    #[test]
    fn unresolved_overload_errors() {
        let registry = FunctionRegistry::with_builtins().unwrap();
        let err = registry
            .resolve_scalar("abs", &[DataType::Utf8, DataType::Utf8])
            .unwrap_err();
        assert!(err.to_string().contains("No overload"));
    }

    #[test]
    fn scan_collects_volatile_names() {
        let registry = FunctionRegistry::with_builtins().unwrap();
        let set = NondeterministicFunctions::scan([&registry]);
        assert!(set.contains("random"));
        assert!(set.contains("RANDOM"));
        assert!(set.contains("now"));
        assert!(!set.contains("upper"));
    }

    #[test]
    fn scan_empty_input() {
        let set = NondeterministicFunctions::scan(std::iter::empty::<&FunctionRegistry>());
        assert!(set.is_empty());
    }

    #[test]
    fn scan_idempotent_and_duplicate_tolerant() {
        let registry = FunctionRegistry::with_builtins().unwrap();
        let once = NondeterministicFunctions::scan([&registry]);
        let twice = NondeterministicFunctions::scan([&registry, &registry]);
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn publish_then_read_global() {
        let registry = FunctionRegistry::with_builtins().unwrap();
        let set = Arc::new(NondeterministicFunctions::scan([&registry]));
        publish_nondeterministic(set.clone());
        assert!(global_nondeterministic().contains("random"));
    }
}
