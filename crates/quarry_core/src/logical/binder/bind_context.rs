use std::fmt;

use indexmap::IndexMap;
use quarry_error::{QuarryError, Result};

use super::bind_query::BoundQuery;
use super::table_list::{Table, TableList, TableRef};
use crate::logical::logical_materialization::MaterializationRef;
use crate::logical::operator::LogicalOperator;
use crate::observe::{PhaseObserver, QueryPhase, UnitId};
use crate::scalars::datatype::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindScopeRef(pub usize);

/// Reference to an uncorrelated scalar subquery bound in this context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubqueryRef(pub u32);

impl fmt::Display for SubqueryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sq_{}", self.0)
    }
}

/// A CTE body bound once at its declaration.
///
/// `bound` is filled during binding, `plan` during logical planning; every
/// reference scans the shared materialization instead of rebinding the body.
#[derive(Debug)]
pub struct BoundMaterialization {
    pub mat_ref: MaterializationRef,
    pub name: String,
    pub column_names: Vec<String>,
    pub column_types: Vec<DataType>,
    pub column_nullable: Vec<bool>,
    pub bound: Option<BoundQuery>,
    pub plan: Option<LogicalOperator>,
}

#[derive(Debug)]
pub struct BoundSubquery {
    pub subquery_ref: SubqueryRef,
    pub output_type: DataType,
    pub bound: Option<Box<BoundQuery>>,
    pub plan: Option<LogicalOperator>,
}

/// One lexical scope: a query unit's FROM namespace plus its declared CTEs.
#[derive(Debug, Default)]
struct BindScope {
    parent: Option<BindScopeRef>,
    /// Alias (lowercased) to table. Uniqueness enforced on registration.
    aliases: IndexMap<String, TableRef>,
    /// Tables visible for unqualified column resolution, in FROM order.
    tables: Vec<TableRef>,
    /// CTEs declared in this scope, visible to this scope and descendants.
    ctes: IndexMap<String, MaterializationRef>,
}

/// Per-compilation context: scopes, bound tables, materializations,
/// subqueries, query-unit ids, and the phase observer.
///
/// Nothing here outlives one compilation; the only process-lifetime state in
/// the crate is the published nondeterministic-function set.
pub struct BindContext<'a> {
    pub table_list: TableList,
    scopes: Vec<BindScope>,
    pub materializations: Vec<BoundMaterialization>,
    pub subqueries: Vec<BoundSubquery>,
    unit_counter: u32,
    observer: &'a mut dyn PhaseObserver,
}

impl fmt::Debug for BindContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindContext")
            .field("table_list", &self.table_list)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

impl<'a> BindContext<'a> {
    pub fn new(observer: &'a mut dyn PhaseObserver) -> Self {
        BindContext {
            table_list: TableList::default(),
            scopes: vec![BindScope::default()],
            materializations: Vec::new(),
            subqueries: Vec::new(),
            unit_counter: 0,
            observer,
        }
    }

    pub fn root_scope(&self) -> BindScopeRef {
        BindScopeRef(0)
    }

    pub fn new_child_scope(&mut self, parent: BindScopeRef) -> BindScopeRef {
        let scope_ref = BindScopeRef(self.scopes.len());
        self.scopes.push(BindScope {
            parent: Some(parent),
            ..BindScope::default()
        });
        scope_ref
    }

    /// Allocate a stable id for a logical query unit (outer query, CTE body,
    /// set-op branch).
    pub fn new_unit(&mut self) -> UnitId {
        let unit = UnitId(self.unit_counter);
        self.unit_counter += 1;
        unit
    }

    pub fn mark_phase(&mut self, unit: UnitId, phase: QueryPhase) {
        self.observer.on_phase(unit, phase);
    }

    /// Bind a named table into a scope's FROM namespace.
    ///
    /// The alias must be unique within the scope; duplicate registration is a
    /// hard error.
    pub fn push_table(
        &mut self,
        scope: BindScopeRef,
        alias: String,
        column_names: Vec<String>,
        column_types: Vec<DataType>,
        column_nullable: Vec<bool>,
    ) -> Result<TableRef> {
        let key = alias.to_ascii_lowercase();
        if self.scope(scope)?.aliases.contains_key(&key) {
            return Err(QuarryError::new(format!(
                "Duplicate table alias '{alias}' in scope"
            )));
        }

        let reference = self.table_list.push_table(
            Some(alias),
            column_names,
            column_types,
            column_nullable,
        );

        let scope = self.scope_mut(scope)?;
        scope.aliases.insert(key, reference);
        scope.tables.push(reference);
        Ok(reference)
    }

    /// Bind an anonymous output table (projection, aggregate, set-op
    /// output). Not visible for name resolution.
    pub fn push_ephemeral_table(
        &mut self,
        column_names: Vec<String>,
        column_types: Vec<DataType>,
        column_nullable: Vec<bool>,
    ) -> TableRef {
        self.table_list
            .push_table(None, column_names, column_types, column_nullable)
    }

    pub fn get_table(&self, reference: TableRef) -> Result<&Table> {
        self.table_list.get(reference)
    }

    /// Resolve a table alias within one scope (no parent traversal; outer
    /// aliases are not visible, which keeps subqueries uncorrelated).
    pub fn resolve_alias(&self, scope: BindScopeRef, alias: &str) -> Result<Option<TableRef>> {
        let key = alias.to_ascii_lowercase();
        Ok(self.scope(scope)?.aliases.get(&key).copied())
    }

    /// Whether the alias resolves in any ancestor scope. Used to distinguish
    /// a correlated reference from a plain unknown name.
    pub fn alias_visible_in_ancestors(&self, scope: BindScopeRef, alias: &str) -> Result<bool> {
        let key = alias.to_ascii_lowercase();
        let mut current = self.scope(scope)?.parent;
        while let Some(scope_ref) = current {
            let scope = self.scope(scope_ref)?;
            if scope.aliases.contains_key(&key) {
                return Ok(true);
            }
            current = scope.parent;
        }
        Ok(false)
    }

    pub fn tables_in_scope(&self, scope: BindScopeRef) -> Result<Vec<TableRef>> {
        Ok(self.scope(scope)?.tables.clone())
    }

    /// All alias and column names visible in a scope, for error suggestions.
    pub fn names_in_scope(&self, scope: BindScopeRef) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let scope = self.scope(scope)?;
        for (alias, table_ref) in &scope.aliases {
            names.push(alias.clone());
            let table = self.table_list.get(*table_ref)?;
            names.extend(table.column_names.iter().cloned());
        }
        Ok(names)
    }

    pub fn add_cte(
        &mut self,
        scope: BindScopeRef,
        name: String,
        column_names: Vec<String>,
        column_types: Vec<DataType>,
        column_nullable: Vec<bool>,
        bound: BoundQuery,
    ) -> Result<MaterializationRef> {
        let key = name.to_ascii_lowercase();
        if self.scope(scope)?.ctes.contains_key(&key) {
            return Err(QuarryError::new(format!("Duplicate CTE name '{name}'")));
        }

        let mat_ref = MaterializationRef(self.materializations.len() as u32);
        self.materializations.push(BoundMaterialization {
            mat_ref,
            name,
            column_names,
            column_types,
            column_nullable,
            bound: Some(bound),
            plan: None,
        });
        self.scope_mut(scope)?.ctes.insert(key, mat_ref);
        Ok(mat_ref)
    }

    /// Resolve a CTE by name, walking parent scopes.
    pub fn resolve_cte(
        &self,
        scope: BindScopeRef,
        name: &str,
    ) -> Result<Option<MaterializationRef>> {
        let key = name.to_ascii_lowercase();
        let mut current = Some(scope);
        while let Some(scope_ref) = current {
            let scope = self.scope(scope_ref)?;
            if let Some(mat_ref) = scope.ctes.get(&key) {
                return Ok(Some(*mat_ref));
            }
            current = scope.parent;
        }
        Ok(None)
    }

    pub fn get_materialization(&self, mat_ref: MaterializationRef) -> Result<&BoundMaterialization> {
        self.materializations
            .get(mat_ref.0 as usize)
            .ok_or_else(|| QuarryError::new(format!("Missing materialization: {mat_ref}")))
    }

    /// Take the planned materialization bodies, in mat-ref order. Called
    /// once by the physical planner.
    pub fn take_materialization_plans(&mut self) -> Result<Vec<LogicalOperator>> {
        self.materializations
            .iter_mut()
            .map(|m| {
                m.plan
                    .take()
                    .ok_or_else(|| QuarryError::new("Materialization plan missing"))
            })
            .collect()
    }

    /// Take the planned subquery bodies, in subquery-ref order.
    pub fn take_subquery_plans(&mut self) -> Result<Vec<LogicalOperator>> {
        self.subqueries
            .iter_mut()
            .map(|s| {
                s.plan
                    .take()
                    .ok_or_else(|| QuarryError::new("Subquery plan missing"))
            })
            .collect()
    }

    pub fn add_subquery(&mut self, output_type: DataType, bound: BoundQuery) -> SubqueryRef {
        let subquery_ref = SubqueryRef(self.subqueries.len() as u32);
        self.subqueries.push(BoundSubquery {
            subquery_ref,
            output_type,
            bound: Some(Box::new(bound)),
            plan: None,
        });
        subquery_ref
    }

    fn scope(&self, scope: BindScopeRef) -> Result<&BindScope> {
        self.scopes
            .get(scope.0)
            .ok_or_else(|| QuarryError::new("Missing bind scope"))
    }

    fn scope_mut(&mut self, scope: BindScopeRef) -> Result<&mut BindScope> {
        self.scopes
            .get_mut(scope.0)
            .ok_or_else(|| QuarryError::new("Missing bind scope"))
    }
}

/// Closest name suggestion for unknown identifier errors.
pub fn find_similar(name: &str, candidates: &[String]) -> Option<String> {
    let mut best: Option<(f64, &String)> = None;
    for candidate in candidates {
        let score = strsim::jaro_winkler(
            &name.to_ascii_lowercase(),
            &candidate.to_ascii_lowercase(),
        );
        if score > 0.8 {
            match best {
                Some((best_score, _)) if best_score >= score => {}
                _ => best = Some((score, candidate)),
            }
        }
    }
    best.map(|(_, name)| name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::RecordingObserver;

    #[test]
    fn duplicate_alias_in_scope_errors() {
        let mut observer = RecordingObserver::new();
        let mut ctx = BindContext::new(&mut observer);
        let scope = ctx.root_scope();

        ctx.push_table(
            scope,
            "a".to_string(),
            vec!["id".to_string()],
            vec![DataType::Int32],
            vec![false],
        )
        .unwrap();

        let err = ctx
            .push_table(
                scope,
                "A".to_string(),
                vec!["id".to_string()],
                vec![DataType::Int32],
                vec![false],
            )
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate table alias"));
    }

    #[test]
    fn same_alias_in_sibling_scopes_allowed() {
        let mut observer = RecordingObserver::new();
        let mut ctx = BindContext::new(&mut observer);
        let root = ctx.root_scope();
        let left = ctx.new_child_scope(root);
        let right = ctx.new_child_scope(root);

        for scope in [left, right] {
            ctx.push_table(
                scope,
                "t".to_string(),
                vec!["id".to_string()],
                vec![DataType::Int32],
                vec![false],
            )
            .unwrap();
        }
    }

    #[test]
    fn cte_visible_from_child_scope() {
        let mut observer = RecordingObserver::new();
        let mut ctx = BindContext::new(&mut observer);
        let root = ctx.root_scope();

        let bound = BoundQuery::empty_for_test();
        ctx.add_cte(
            root,
            "totals".to_string(),
            vec!["n".to_string()],
            vec![DataType::Int64],
            vec![false],
            bound,
        )
        .unwrap();

        let child = ctx.new_child_scope(root);
        assert!(ctx.resolve_cte(child, "TOTALS").unwrap().is_some());
    }

    #[test]
    fn suggestions() {
        let candidates = vec!["city".to_string(), "population".to_string()];
        assert_eq!(Some("city".to_string()), find_similar("citty", &candidates));
        assert_eq!(None, find_similar("zzz", &candidates));
    }
}
