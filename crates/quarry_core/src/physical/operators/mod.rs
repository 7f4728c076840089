pub mod filter;
pub mod hash_aggregate;
pub mod hash_join;
pub mod limit;
pub mod merge_join;
pub mod nested_loop_join;
pub mod project;
pub mod scan;
pub mod sort;
pub mod union;

use quarry_error::Result;

use super::ExecContext;
use crate::explain::{ExplainConfig, ExplainEntry, Explainable};
use crate::scalars::row::Row;

/// A synchronous stream of rows.
///
/// Execution is single-threaded per query; operators pull from their inputs
/// and observe the query handle's cancellation flag between phases and
/// periodically inside long loops.
pub trait RowStream: Send {
    fn next_row(&mut self) -> Result<Option<Row>>;
}

/// Drain a stream into a vec, checking cancellation as rows arrive.
pub(crate) fn collect_rows(
    stream: &mut dyn RowStream,
    ctx: &ExecContext,
) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    while let Some(row) = stream.next_row()? {
        ctx.check_canceled_every(rows.len())?;
        rows.push(row);
    }
    Ok(rows)
}

/// A planned physical operator: a blueprint that opens into per-execution
/// row streams.
#[derive(Debug)]
pub enum PhysicalOperator {
    SingleRow(scan::SingleRowExec),
    Scan(scan::ScanExec),
    MaterializationScan(scan::MaterializationScanExec),
    Filter(filter::FilterExec),
    Project(project::ProjectExec),
    HashAggregate(hash_aggregate::HashAggregateExec),
    Sort(sort::SortExec),
    Limit(limit::LimitExec),
    Union(union::UnionExec),
    HashJoin(hash_join::HashJoinExec),
    MergeJoin(merge_join::MergeJoinExec),
    NestedLoopJoin(nested_loop_join::NestedLoopJoinExec),
}

impl PhysicalOperator {
    pub fn open(&self, ctx: &ExecContext) -> Result<Box<dyn RowStream>> {
        match self {
            Self::SingleRow(exec) => exec.open(ctx),
            Self::Scan(exec) => exec.open(ctx),
            Self::MaterializationScan(exec) => exec.open(ctx),
            Self::Filter(exec) => exec.open(ctx),
            Self::Project(exec) => exec.open(ctx),
            Self::HashAggregate(exec) => exec.open(ctx),
            Self::Sort(exec) => exec.open(ctx),
            Self::Limit(exec) => exec.open(ctx),
            Self::Union(exec) => exec.open(ctx),
            Self::HashJoin(exec) => exec.open(ctx),
            Self::MergeJoin(exec) => exec.open(ctx),
            Self::NestedLoopJoin(exec) => exec.open(ctx),
        }
    }

    pub fn children(&self) -> Vec<&PhysicalOperator> {
        match self {
            Self::SingleRow(_) | Self::Scan(_) | Self::MaterializationScan(_) => Vec::new(),
            Self::Filter(exec) => vec![&exec.input],
            Self::Project(exec) => vec![&exec.input],
            Self::HashAggregate(exec) => vec![&exec.input],
            Self::Sort(exec) => vec![&exec.input],
            Self::Limit(exec) => vec![&exec.input],
            Self::Union(exec) => vec![&exec.left, &exec.right],
            Self::HashJoin(exec) => vec![&exec.left, &exec.right],
            Self::MergeJoin(exec) => vec![&exec.left, &exec.right],
            Self::NestedLoopJoin(exec) => vec![&exec.left, &exec.right],
        }
    }

    /// Render the operator tree with one indented line per node.
    pub fn explain_tree(&self, conf: ExplainConfig) -> String {
        fn render(op: &PhysicalOperator, conf: ExplainConfig, indent: usize, out: &mut String) {
            out.push_str(&"  ".repeat(indent));
            out.push_str(&op.explain_entry(conf).to_string());
            out.push('\n');
            for child in op.children() {
                render(child, conf, indent + 1, out);
            }
        }

        let mut out = String::new();
        render(self, conf, 0, &mut out);
        out
    }
}

impl Explainable for PhysicalOperator {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        match self {
            Self::SingleRow(exec) => exec.explain_entry(conf),
            Self::Scan(exec) => exec.explain_entry(conf),
            Self::MaterializationScan(exec) => exec.explain_entry(conf),
            Self::Filter(exec) => exec.explain_entry(conf),
            Self::Project(exec) => exec.explain_entry(conf),
            Self::HashAggregate(exec) => exec.explain_entry(conf),
            Self::Sort(exec) => exec.explain_entry(conf),
            Self::Limit(exec) => exec.explain_entry(conf),
            Self::Union(exec) => exec.explain_entry(conf),
            Self::HashJoin(exec) => exec.explain_entry(conf),
            Self::MergeJoin(exec) => exec.explain_entry(conf),
            Self::NestedLoopJoin(exec) => exec.explain_entry(conf),
        }
    }
}
