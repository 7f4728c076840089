use std::sync::Arc;

use quarry_error::{QuarryError, Result};

use super::bind_context::{BindContext, BindScopeRef};
use super::expr_binder::ExpressionBinder;
use super::table_list::TableRef;
use crate::ast::{FromItem, JoinHint, JoinKind};
use crate::catalog::{RowSource, SourceProvider};
use crate::expr::Expression;
use crate::functions::registry::FunctionRegistry;
use crate::logical::logical_materialization::MaterializationRef;
use crate::scalars::datatype::DataType;

#[derive(Debug)]
pub enum BoundFrom {
    /// SELECT without FROM.
    Empty,
    Source(BoundSource),
    CteScan(BoundCteScan),
    Join(Box<BoundJoin>),
}

impl BoundFrom {
    pub fn table_refs(&self) -> Vec<TableRef> {
        match self {
            Self::Empty => Vec::new(),
            Self::Source(source) => vec![source.table_ref],
            Self::CteScan(scan) => vec![scan.table_ref],
            Self::Join(join) => {
                let mut refs = join.left_refs.clone();
                refs.extend_from_slice(&join.right_refs);
                refs
            }
        }
    }
}

#[derive(Debug)]
pub struct BoundSource {
    pub table_ref: TableRef,
    pub name: String,
    pub source: Arc<dyn RowSource>,
    pub column_types: Vec<DataType>,
    pub estimated_rows: Option<usize>,
}

#[derive(Debug)]
pub struct BoundCteScan {
    pub table_ref: TableRef,
    pub mat_ref: MaterializationRef,
}

#[derive(Debug)]
pub struct BoundJoin {
    pub left: BoundFrom,
    pub right: BoundFrom,
    pub kind: JoinKind,
    /// Bound join condition. None only for cross joins.
    pub condition: Option<Expression>,
    pub left_refs: Vec<TableRef>,
    pub right_refs: Vec<TableRef>,
    pub hint: JoinHint,
}

#[derive(Debug)]
pub struct FromBinder<'b> {
    pub scope: BindScopeRef,
    pub registry: &'b FunctionRegistry,
    pub provider: &'b dyn SourceProvider,
}

impl<'b> FromBinder<'b> {
    pub fn new(
        scope: BindScopeRef,
        registry: &'b FunctionRegistry,
        provider: &'b dyn SourceProvider,
    ) -> Self {
        FromBinder {
            scope,
            registry,
            provider,
        }
    }

    pub fn bind(&self, ctx: &mut BindContext, from: Option<&FromItem>) -> Result<BoundFrom> {
        match from {
            None => Ok(BoundFrom::Empty),
            Some(item) => self.bind_item(ctx, item),
        }
    }

    fn bind_item(&self, ctx: &mut BindContext, item: &FromItem) -> Result<BoundFrom> {
        match item {
            FromItem::Source { name, alias } => self.bind_source(ctx, name, alias.as_deref()),
            FromItem::Join(join) => {
                let left = self.bind_item(ctx, &join.left)?;
                let right = self.bind_item(ctx, &join.right)?;
                let left_refs = left.table_refs();
                let right_refs = right.table_refs();

                let condition = match (&join.condition, join.kind) {
                    (None, JoinKind::Cross) => None,
                    (Some(_), JoinKind::Cross) => {
                        return Err(QuarryError::new("CROSS JOIN cannot have a condition"));
                    }
                    (None, _) => {
                        return Err(QuarryError::new("JOIN requires an ON condition"));
                    }
                    (Some(condition), _) => {
                        let binder =
                            ExpressionBinder::new(self.scope, self.registry, self.provider);
                        let bound = binder.bind(ctx, condition)?;
                        let datatype = bound.datatype()?;
                        if !matches!(datatype, DataType::Boolean | DataType::Null) {
                            return Err(QuarryError::new(format!(
                                "Join condition must be a boolean, got {datatype}"
                            )));
                        }
                        Some(bound)
                    }
                };

                Ok(BoundFrom::Join(Box::new(BoundJoin {
                    left,
                    right,
                    kind: join.kind,
                    condition,
                    left_refs,
                    right_refs,
                    hint: join.hint,
                })))
            }
        }
    }

    fn bind_source(
        &self,
        ctx: &mut BindContext,
        name: &str,
        alias: Option<&str>,
    ) -> Result<BoundFrom> {
        let bind_alias = alias.unwrap_or(name).to_string();

        // CTEs shadow provider sources.
        if let Some(mat_ref) = ctx.resolve_cte(self.scope, name)? {
            let mat = ctx.get_materialization(mat_ref)?;
            let column_names = mat.column_names.clone();
            let column_types = mat.column_types.clone();
            let column_nullable = mat.column_nullable.clone();

            let table_ref = ctx.push_table(
                self.scope,
                bind_alias,
                column_names,
                column_types,
                column_nullable,
            )?;
            return Ok(BoundFrom::CteScan(BoundCteScan { table_ref, mat_ref }));
        }

        let handle = self.provider.resolve(name)?.ok_or_else(|| {
            QuarryError::new(format!("Unknown source '{name}'"))
        })?;

        let column_names = handle.schema.column_names().map(String::from).collect();
        let column_types: Vec<_> = handle
            .schema
            .columns
            .iter()
            .map(|c| c.datatype.clone())
            .collect();
        let column_nullable = handle.schema.columns.iter().map(|c| c.nullable).collect();

        let table_ref = ctx.push_table(
            self.scope,
            bind_alias,
            column_names,
            column_types.clone(),
            column_nullable,
        )?;

        Ok(BoundFrom::Source(BoundSource {
            table_ref,
            name: name.to_string(),
            estimated_rows: handle.source.estimated_rows(),
            source: handle.source,
            column_types,
        }))
    }
}
