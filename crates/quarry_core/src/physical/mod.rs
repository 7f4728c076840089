pub mod evaluator;
pub mod operators;
pub mod planner;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use quarry_error::{QuarryError, Result};
use uuid::Uuid;

use self::operators::PhysicalOperator;
use crate::scalars::datatype::DataType;
use crate::scalars::row::Row;
use crate::scalars::value::ScalarValue;

/// Externally supplied cancellation handle for a query.
///
/// Executors observe the flag between phases (build, sort, probe/merge) and
/// periodically inside streaming loops, so long joins can be aborted without
/// blocking indefinitely.
#[derive(Debug, Clone)]
pub struct QueryHandle {
    query_id: Uuid,
    canceled: Arc<AtomicBool>,
}

impl QueryHandle {
    pub fn new() -> Self {
        QueryHandle {
            query_id: Uuid::new_v4(),
            canceled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }

    pub fn check_canceled(&self) -> Result<()> {
        if self.is_canceled() {
            return Err(QuarryError::new("Query canceled")
                .with_field("query_id", self.query_id));
        }
        Ok(())
    }
}

impl Default for QueryHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A fully planned, strategy-annotated physical plan.
///
/// This is the artifact handed to the external code emitter, and what the
/// built-in row pipeline executes.
#[derive(Debug)]
pub struct PhysicalPlan {
    pub root: PhysicalOperator,
    /// Plans for bound materializations (CTE bodies), indexed by mat ref.
    pub materializations: Vec<PhysicalOperator>,
    /// Plans for uncorrelated scalar subqueries, indexed by subquery ref.
    pub subqueries: Vec<PhysicalOperator>,
    pub output_names: Vec<String>,
    pub output_types: Vec<DataType>,
}

/// Runtime knobs for query execution.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExecutionConfig {
    /// Rows processed between cancellation checks in streaming loops.
    pub cancel_check_interval: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            cancel_check_interval: 1024,
        }
    }
}

/// Per-execution state: cancellation handle plus lazily filled caches for
/// materializations and scalar subqueries.
///
/// Cheap to clone; streams hold clones.
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub handle: QueryHandle,
    pub config: ExecutionConfig,
    plan: Arc<PhysicalPlan>,
    mat_cache: Arc<Vec<Mutex<Option<Arc<Vec<Row>>>>>>,
    sub_cache: Arc<Vec<Mutex<Option<ScalarValue>>>>,
}

impl ExecContext {
    /// Cancellation check pacing for streaming loops.
    pub fn check_canceled_every(&self, count: usize) -> Result<()> {
        if count % self.config.cancel_check_interval.max(1) == 0 {
            self.handle.check_canceled()?;
        }
        Ok(())
    }

    pub fn new(plan: Arc<PhysicalPlan>, handle: QueryHandle, config: ExecutionConfig) -> Self {
        let mat_cache = Arc::new(
            (0..plan.materializations.len())
                .map(|_| Mutex::new(None))
                .collect::<Vec<_>>(),
        );
        let sub_cache = Arc::new(
            (0..plan.subqueries.len())
                .map(|_| Mutex::new(None))
                .collect::<Vec<_>>(),
        );
        ExecContext {
            handle,
            config,
            plan,
            mat_cache,
            sub_cache,
        }
    }

    /// Rows of a materialization, executing its plan on first use.
    pub fn materialized_rows(&self, idx: usize) -> Result<Arc<Vec<Row>>> {
        if let Some(rows) = self
            .mat_cache
            .get(idx)
            .ok_or_else(|| QuarryError::new("Missing materialization cache slot"))?
            .lock()
            .clone()
        {
            return Ok(rows);
        }

        // Compute without holding the lock: the plan may reference other
        // materializations.
        let operator = self
            .plan
            .materializations
            .get(idx)
            .ok_or_else(|| QuarryError::new("Missing materialization plan"))?;
        let mut stream = operator.open(self)?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next_row()? {
            rows.push(row);
        }

        let rows = Arc::new(rows);
        *self.mat_cache[idx].lock() = Some(rows.clone());
        Ok(rows)
    }

    /// Value of an uncorrelated scalar subquery, executing its plan on first
    /// use.
    ///
    /// Zero rows yield null; more than one row is an error.
    pub fn subquery_value(&self, idx: usize) -> Result<ScalarValue> {
        if let Some(value) = self
            .sub_cache
            .get(idx)
            .ok_or_else(|| QuarryError::new("Missing subquery cache slot"))?
            .lock()
            .clone()
        {
            return Ok(value);
        }

        let operator = self
            .plan
            .subqueries
            .get(idx)
            .ok_or_else(|| QuarryError::new("Missing subquery plan"))?;
        let mut stream = operator.open(self)?;

        let value = match stream.next_row()? {
            None => ScalarValue::Null,
            Some(row) => {
                if stream.next_row()?.is_some() {
                    return Err(QuarryError::new("Scalar subquery returned more than one row"));
                }
                row.values
                    .into_iter()
                    .next()
                    .unwrap_or(ScalarValue::Null)
            }
        };

        *self.sub_cache[idx].lock() = Some(value.clone());
        Ok(value)
    }
}
