use std::sync::Arc;

use quarry_error::Result;

use crate::ast::QueryExpr;
use crate::catalog::SourceProvider;
use crate::explain::ExplainConfig;
use crate::functions::registry::{FunctionRegistry, NondeterministicFunctions};
use crate::logical::binder::bind_context::BindContext;
use crate::logical::binder::bind_query::QueryBinder;
use crate::logical::planner::plan_select::QueryPlanner;
use crate::observe::{PhaseObserver, TracingObserver};
use crate::optimizer::Optimizer;
use crate::physical::operators::RowStream;
use crate::physical::planner::PhysicalPlanner;
use crate::physical::{ExecContext, ExecutionConfig, PhysicalPlan, QueryHandle};
use crate::scalars::datatype::DataType;
use crate::scalars::row::Row;

/// A session compiles and executes queries against the engine's provider.
#[derive(Debug)]
pub struct Session {
    registry: Arc<FunctionRegistry>,
    provider: Arc<dyn SourceProvider>,
    nondeterministic: Arc<NondeterministicFunctions>,
    config: ExecutionConfig,
}

impl Session {
    pub(crate) fn new(
        registry: Arc<FunctionRegistry>,
        provider: Arc<dyn SourceProvider>,
        nondeterministic: Arc<NondeterministicFunctions>,
        config: ExecutionConfig,
    ) -> Self {
        Session {
            registry,
            provider,
            nondeterministic,
            config,
        }
    }

    /// Compile a query with the default tracing phase observer.
    pub fn compile(&self, query: &QueryExpr) -> Result<CompiledQuery> {
        let mut observer = TracingObserver;
        self.compile_with_observer(query, &mut observer)
    }

    /// Compile a query, emitting phase markers to the given observer.
    ///
    /// Compilation is single-threaded and synchronous: bind (types, aliases,
    /// phase markers), plan, rewrite, then select join strategies. All
    /// compile-time errors surface here, before any row is processed.
    pub fn compile_with_observer(
        &self,
        query: &QueryExpr,
        observer: &mut dyn PhaseObserver,
    ) -> Result<CompiledQuery> {
        let handle = QueryHandle::new();
        let span = tracing::debug_span!("compile", query_id = %handle.query_id());
        let _guard = span.enter();

        let mut ctx = BindContext::new(observer);
        let scope = ctx.root_scope();

        let bound = QueryBinder::new(scope, &self.registry, self.provider.as_ref())
            .bind(&mut ctx, query)?;
        tracing::trace!("bound query");

        let plan = QueryPlanner.plan_root(&mut ctx, bound)?;

        let optimizer = Optimizer;
        let plan = optimizer.optimize(plan)?;
        optimizer.optimize_context(&mut ctx)?;
        tracing::trace!("optimized logical plan");

        let mat_plans = ctx.take_materialization_plans()?;
        let sub_plans = ctx.take_subquery_plans()?;
        let physical = PhysicalPlanner::new(&ctx.table_list, &self.nondeterministic)
            .plan(plan, mat_plans, sub_plans)?;
        tracing::debug!("query compiled");

        Ok(CompiledQuery {
            plan: Arc::new(physical),
            handle,
            config: self.config.clone(),
        })
    }

    /// Compile and execute in one step.
    pub fn execute(&self, query: &QueryExpr) -> Result<QueryResult> {
        self.compile(query)?.execute()
    }
}

/// A fully bound, rewritten, strategy-annotated plan, ready for execution or
/// for translation by an external code emitter.
#[derive(Debug)]
pub struct CompiledQuery {
    plan: Arc<PhysicalPlan>,
    handle: QueryHandle,
    config: ExecutionConfig,
}

impl CompiledQuery {
    /// The cancellation handle for executions of this query.
    pub fn handle(&self) -> QueryHandle {
        self.handle.clone()
    }

    /// The annotated physical plan.
    pub fn plan(&self) -> &Arc<PhysicalPlan> {
        &self.plan
    }

    pub fn output_schema(&self) -> impl Iterator<Item = (&str, &DataType)> {
        self.plan
            .output_names
            .iter()
            .map(String::as_str)
            .zip(self.plan.output_types.iter())
    }

    pub fn explain(&self, verbose: bool) -> String {
        self.plan.root.explain_tree(ExplainConfig { verbose })
    }

    /// Explain as a JSON tree, one object per operator.
    pub fn explain_json(&self) -> Result<String> {
        fn node(op: &crate::physical::operators::PhysicalOperator) -> serde_json::Value {
            let entry = crate::explain::Explainable::explain_entry(
                op,
                ExplainConfig { verbose: true },
            );
            serde_json::json!({
                "name": entry.name,
                "items": entry.items,
                "children": op.children().iter().map(|c| node(c)).collect::<Vec<_>>(),
            })
        }

        serde_json::to_string_pretty(&node(&self.plan.root))
            .map_err(|e| quarry_error::QuarryError::with_source("Explain failed", Box::new(e)))
    }

    /// Begin executing; rows stream synchronously from the result.
    pub fn execute(&self) -> Result<QueryResult> {
        let ctx = ExecContext::new(self.plan.clone(), self.handle.clone(), self.config.clone());
        let stream = self.plan.root.open(&ctx)?;
        Ok(QueryResult {
            schema: self
                .plan
                .output_names
                .iter()
                .cloned()
                .zip(self.plan.output_types.iter().cloned())
                .collect(),
            stream,
        })
    }
}

pub struct QueryResult {
    pub schema: Vec<(String, DataType)>,
    stream: Box<dyn RowStream>,
}

impl QueryResult {
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        self.stream.next_row()
    }

    /// Drain all rows.
    pub fn collect(mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row);
        }
        Ok(rows)
    }
}

impl std::fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}
