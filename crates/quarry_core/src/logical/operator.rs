use quarry_error::{QuarryError, Result};

use super::binder::table_list::TableRef;
use super::logical_aggregate::LogicalAggregate;
use super::logical_distinct::LogicalDistinct;
use super::logical_filter::LogicalFilter;
use super::logical_join::{LogicalArbitraryJoin, LogicalComparisonJoin, LogicalCrossJoin};
use super::logical_limit::LogicalLimit;
use super::logical_materialization::LogicalMaterializationScan;
use super::logical_order::LogicalOrder;
use super::logical_project::LogicalProject;
use super::logical_scan::LogicalScan;
use super::logical_setop::LogicalSetop;
use super::logical_single_row::LogicalSingleRow;
use super::statistics::StatisticsValue;
use crate::explain::{ExplainConfig, ExplainEntry, ExplainValue, Explainable};
use crate::expr::Expression;

/// Wrapper around nodes in the logical plan holding the node's children and
/// shared metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<N> {
    pub node: N,
    pub children: Vec<LogicalOperator>,
    /// Estimated output cardinality. Unknown unless a source reports a row
    /// count.
    pub estimated_cardinality: StatisticsValue<usize>,
}

impl<N> Node<N> {
    pub fn new(node: N, children: Vec<LogicalOperator>) -> Self {
        Node {
            node,
            children,
            estimated_cardinality: StatisticsValue::Unknown,
        }
    }

    pub fn into_inner(self) -> N {
        self.node
    }

    pub fn take_one_child_exact(&mut self) -> Result<LogicalOperator> {
        if self.children.len() != 1 {
            return Err(QuarryError::new(format!(
                "Expected 1 child to operator, have {}",
                self.children.len()
            )));
        }
        Ok(self.children.pop().unwrap())
    }

    pub fn get_one_child_exact(&self) -> Result<&LogicalOperator> {
        if self.children.len() != 1 {
            return Err(QuarryError::new(format!(
                "Expected 1 child to operator, have {}",
                self.children.len()
            )));
        }
        Ok(&self.children[0])
    }

    pub fn take_two_children_exact(&mut self) -> Result<[LogicalOperator; 2]> {
        if self.children.len() != 2 {
            return Err(QuarryError::new(format!(
                "Expected 2 children to operator, have {}",
                self.children.len()
            )));
        }
        let second = self.children.pop().unwrap();
        let first = self.children.pop().unwrap();
        Ok([first, second])
    }

    /// Get all table refs from the immediate children of this node.
    pub fn get_children_table_refs(&self) -> Vec<TableRef> {
        self.children.iter().fold(Vec::new(), |mut refs, child| {
            refs.append(&mut child.get_output_table_refs());
            refs
        })
    }
}

impl<N: Explainable> Explainable for Node<N> {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let mut ent = self.node.explain_entry(conf);
        if conf.verbose {
            ent.items.insert(
                "cardinality".to_string(),
                ExplainValue::Value(self.estimated_cardinality.to_string()),
            );
        }
        ent
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogicalOperator {
    SingleRow(Node<LogicalSingleRow>),
    Scan(Node<LogicalScan>),
    MaterializationScan(Node<LogicalMaterializationScan>),
    Filter(Node<LogicalFilter>),
    Project(Node<LogicalProject>),
    Aggregate(Node<LogicalAggregate>),
    Distinct(Node<LogicalDistinct>),
    Order(Node<LogicalOrder>),
    Limit(Node<LogicalLimit>),
    Setop(Node<LogicalSetop>),
    CrossJoin(Node<LogicalCrossJoin>),
    ComparisonJoin(Node<LogicalComparisonJoin>),
    ArbitraryJoin(Node<LogicalArbitraryJoin>),
}

impl LogicalOperator {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SingleRow(_) => "SingleRow",
            Self::Scan(_) => "Scan",
            Self::MaterializationScan(_) => "MaterializationScan",
            Self::Filter(_) => "Filter",
            Self::Project(_) => "Project",
            Self::Aggregate(_) => "Aggregate",
            Self::Distinct(_) => "Distinct",
            Self::Order(_) => "Order",
            Self::Limit(_) => "Limit",
            Self::Setop(_) => "SetOp",
            Self::CrossJoin(_) => "CrossJoin",
            Self::ComparisonJoin(_) => "ComparisonJoin",
            Self::ArbitraryJoin(_) => "ArbitraryJoin",
        }
    }

    pub fn estimated_cardinality(&self) -> StatisticsValue<usize> {
        match self {
            Self::SingleRow(n) => n.estimated_cardinality,
            Self::Scan(n) => n.estimated_cardinality,
            Self::MaterializationScan(n) => n.estimated_cardinality,
            Self::Filter(n) => n.estimated_cardinality,
            Self::Project(n) => n.estimated_cardinality,
            Self::Aggregate(n) => n.estimated_cardinality,
            Self::Distinct(n) => n.estimated_cardinality,
            Self::Order(n) => n.estimated_cardinality,
            Self::Limit(n) => n.estimated_cardinality,
            Self::Setop(n) => n.estimated_cardinality,
            Self::CrossJoin(n) => n.estimated_cardinality,
            Self::ComparisonJoin(n) => n.estimated_cardinality,
            Self::ArbitraryJoin(n) => n.estimated_cardinality,
        }
    }

    pub fn children(&self) -> &[LogicalOperator] {
        match self {
            Self::SingleRow(n) => &n.children,
            Self::Scan(n) => &n.children,
            Self::MaterializationScan(n) => &n.children,
            Self::Filter(n) => &n.children,
            Self::Project(n) => &n.children,
            Self::Aggregate(n) => &n.children,
            Self::Distinct(n) => &n.children,
            Self::Order(n) => &n.children,
            Self::Limit(n) => &n.children,
            Self::Setop(n) => &n.children,
            Self::CrossJoin(n) => &n.children,
            Self::ComparisonJoin(n) => &n.children,
            Self::ArbitraryJoin(n) => &n.children,
        }
    }

    pub fn children_mut(&mut self) -> &mut Vec<LogicalOperator> {
        match self {
            Self::SingleRow(n) => &mut n.children,
            Self::Scan(n) => &mut n.children,
            Self::MaterializationScan(n) => &mut n.children,
            Self::Filter(n) => &mut n.children,
            Self::Project(n) => &mut n.children,
            Self::Aggregate(n) => &mut n.children,
            Self::Distinct(n) => &mut n.children,
            Self::Order(n) => &mut n.children,
            Self::Limit(n) => &mut n.children,
            Self::Setop(n) => &mut n.children,
            Self::CrossJoin(n) => &mut n.children,
            Self::ComparisonJoin(n) => &mut n.children,
            Self::ArbitraryJoin(n) => &mut n.children,
        }
    }

    /// Table refs representing the output of this operator.
    ///
    /// After planning, an operator only references the table refs of its
    /// direct children; physical planning relies on this to generate flat
    /// column indexes.
    pub fn get_output_table_refs(&self) -> Vec<TableRef> {
        match self {
            Self::SingleRow(_) => Vec::new(),
            Self::Scan(n) => vec![n.node.table_ref],
            Self::MaterializationScan(n) => vec![n.node.table_ref],
            Self::Project(n) => vec![n.node.projection_table],
            Self::Aggregate(n) => {
                let mut refs = Vec::new();
                refs.extend(n.node.group_table);
                refs.extend(n.node.aggregates_table);
                refs
            }
            Self::Setop(n) => vec![n.node.setop_table],
            Self::Filter(n) => n.get_children_table_refs(),
            Self::Distinct(n) => n.get_children_table_refs(),
            Self::Order(n) => n.get_children_table_refs(),
            Self::Limit(n) => n.get_children_table_refs(),
            Self::CrossJoin(n) => n.get_children_table_refs(),
            Self::ComparisonJoin(n) => n.get_children_table_refs(),
            Self::ArbitraryJoin(n) => n.get_children_table_refs(),
        }
    }

    pub fn for_each_expr<'a, F>(&'a self, func: &mut F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        match self {
            Self::SingleRow(_)
            | Self::Scan(_)
            | Self::MaterializationScan(_)
            | Self::Distinct(_)
            | Self::Limit(_)
            | Self::Setop(_)
            | Self::CrossJoin(_) => Ok(()),
            Self::Filter(n) => func(&n.node.filter),
            Self::Project(n) => n.node.projections.iter().try_for_each(func),
            Self::Aggregate(n) => {
                for expr in n.node.aggregates.iter().chain(n.node.group_exprs.iter()) {
                    func(expr)?;
                }
                Ok(())
            }
            Self::Order(n) => {
                for order in &n.node.exprs {
                    func(&order.expr)?;
                }
                Ok(())
            }
            Self::ComparisonJoin(n) => {
                for condition in &n.node.conditions {
                    func(&condition.left)?;
                    func(&condition.right)?;
                }
                if let Some(residual) = &n.node.residual {
                    func(residual)?;
                }
                Ok(())
            }
            Self::ArbitraryJoin(n) => func(&n.node.condition),
        }
    }

    pub fn for_each_expr_mut<F>(&mut self, func: &mut F) -> Result<()>
    where
        F: FnMut(&mut Expression) -> Result<()>,
    {
        match self {
            Self::SingleRow(_)
            | Self::Scan(_)
            | Self::MaterializationScan(_)
            | Self::Distinct(_)
            | Self::Limit(_)
            | Self::Setop(_)
            | Self::CrossJoin(_) => Ok(()),
            Self::Filter(n) => func(&mut n.node.filter),
            Self::Project(n) => n.node.projections.iter_mut().try_for_each(func),
            Self::Aggregate(n) => {
                for expr in n
                    .node
                    .aggregates
                    .iter_mut()
                    .chain(n.node.group_exprs.iter_mut())
                {
                    func(expr)?;
                }
                Ok(())
            }
            Self::Order(n) => {
                for order in &mut n.node.exprs {
                    func(&mut order.expr)?;
                }
                Ok(())
            }
            Self::ComparisonJoin(n) => {
                for condition in &mut n.node.conditions {
                    func(&mut condition.left)?;
                    func(&mut condition.right)?;
                }
                if let Some(residual) = &mut n.node.residual {
                    func(residual)?;
                }
                Ok(())
            }
            Self::ArbitraryJoin(n) => func(&mut n.node.condition),
        }
    }

    /// Replace children using the given function, bottom-up.
    pub fn modify_replace_children<F>(&mut self, modify: &mut F) -> Result<()>
    where
        F: FnMut(LogicalOperator) -> Result<LogicalOperator>,
    {
        let children = self.children_mut();
        let mut new_children = Vec::with_capacity(children.len());
        for child in children.drain(..) {
            new_children.push(modify(child)?);
        }
        *children = new_children;
        Ok(())
    }

    /// Post-order walk applying `rewrite` to every node.
    pub fn walk_mut<F>(self, rewrite: &mut F) -> Result<LogicalOperator>
    where
        F: FnMut(LogicalOperator) -> Result<LogicalOperator>,
    {
        let mut op = self;
        op.modify_replace_children(&mut |child| child.walk_mut(rewrite))?;
        rewrite(op)
    }

    /// Render the operator tree with one indented line per node.
    pub fn explain_tree(&self, conf: ExplainConfig) -> String {
        fn render(op: &LogicalOperator, conf: ExplainConfig, indent: usize, out: &mut String) {
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

impl Explainable for LogicalOperator {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        match self {
            Self::SingleRow(n) => n.explain_entry(conf),
            Self::Scan(n) => n.explain_entry(conf),
            Self::MaterializationScan(n) => n.explain_entry(conf),
            Self::Filter(n) => n.explain_entry(conf),
            Self::Project(n) => n.explain_entry(conf),
            Self::Aggregate(n) => n.explain_entry(conf),
            Self::Distinct(n) => n.explain_entry(conf),
            Self::Order(n) => n.explain_entry(conf),
            Self::Limit(n) => n.explain_entry(conf),
            Self::Setop(n) => n.explain_entry(conf),
            Self::CrossJoin(n) => n.explain_entry(conf),
            Self::ComparisonJoin(n) => n.explain_entry(conf),
            Self::ArbitraryJoin(n) => n.explain_entry(conf),
        }
    }
}
