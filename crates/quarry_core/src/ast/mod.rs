//! Alias-annotated parse tree consumed from the external front-end.
//!
//! The lexer/grammar producing these types is not part of this crate; the
//! binder consumes them as-is. Expressions are untyped until bound.

use crate::scalars::datatype::DataType;
use crate::scalars::value::ScalarValue;

#[derive(Debug, Clone, PartialEq)]
pub enum AstExpr {
    /// A literal value. Numeric literals arrive already shaped by the
    /// front-end (smallest fitting integer type, decimal for fractions).
    Literal(ScalarValue),
    /// Optionally qualified column reference.
    Column {
        alias: Option<String>,
        name: String,
    },
    Binary {
        op: BinaryOperator,
        left: Box<AstExpr>,
        right: Box<AstExpr>,
    },
    Call {
        name: String,
        args: Vec<AstExpr>,
    },
    Case {
        cases: Vec<(AstExpr, AstExpr)>,
        else_expr: Option<Box<AstExpr>>,
    },
    Cast {
        expr: Box<AstExpr>,
        datatype: DataType,
    },
    Index {
        expr: Box<AstExpr>,
        index: Box<AstExpr>,
    },
    Subquery(Box<QueryExpr>),
    /// `*`, only valid as a bare select item or inside `count(*)`.
    Wildcard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryExpr {
    pub ctes: Vec<Cte>,
    pub body: QueryBody,
}

impl QueryExpr {
    pub fn select(select: SelectQuery) -> Self {
        QueryExpr {
            ctes: Vec::new(),
            body: QueryBody::Select(Box::new(select)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub query: QueryExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryBody {
    Select(Box<SelectQuery>),
    Setop(Box<Setop>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Setop {
    pub kind: SetopKind,
    pub all: bool,
    pub left: QueryBody,
    pub right: QueryBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetopKind {
    Union,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectQuery {
    pub distinct: bool,
    pub projections: Vec<SelectItem>,
    pub from: Option<FromItem>,
    pub filter: Option<AstExpr>,
    pub group_by: Vec<AstExpr>,
    pub having: Option<AstExpr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// All columns from every table in scope.
    Wildcard,
    Expr {
        expr: AstExpr,
        alias: Option<String>,
    },
}

impl SelectItem {
    pub fn expr(expr: AstExpr) -> Self {
        SelectItem::Expr { expr, alias: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    /// A named source (provider table or CTE), optionally aliased.
    Source {
        name: String,
        alias: Option<String>,
    },
    Join(Box<JoinItem>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinItem {
    pub left: FromItem,
    pub right: FromItem,
    pub kind: JoinKind,
    /// Join condition subtree from the front-end. None only for cross joins.
    pub condition: Option<AstExpr>,
    pub hint: JoinHint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

/// Physical strategy hint attached by the front-end, honored when legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinHint {
    #[default]
    Auto,
    Hash,
    Merge,
    Loop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: AstExpr,
    pub desc: bool,
}

// Convenience constructors used by embedding hosts and tests.

pub fn col(name: &str) -> AstExpr {
    AstExpr::Column {
        alias: None,
        name: name.to_string(),
    }
}

pub fn qualified(alias: &str, name: &str) -> AstExpr {
    AstExpr::Column {
        alias: Some(alias.to_string()),
        name: name.to_string(),
    }
}

pub fn lit(value: impl Into<ScalarValue>) -> AstExpr {
    AstExpr::Literal(value.into())
}

pub fn binary(op: BinaryOperator, left: AstExpr, right: AstExpr) -> AstExpr {
    AstExpr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub fn call(name: &str, args: Vec<AstExpr>) -> AstExpr {
    AstExpr::Call {
        name: name.to_string(),
        args,
    }
}
