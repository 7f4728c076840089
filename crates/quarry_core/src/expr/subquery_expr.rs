use std::fmt;

use crate::logical::binder::bind_context::SubqueryRef;
use crate::scalars::datatype::DataType;

/// An uncorrelated scalar subquery.
///
/// The bound subquery plan lives in the bind context, addressed by ref; the
/// expression node only carries its identity and output type. The subquery
/// evaluates at most once per query execution unless it contains volatile
/// calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubqueryExpr {
    pub subquery_ref: SubqueryRef,
    pub return_type: DataType,
    /// True when the subquery's plan contains a volatile function call.
    pub volatile: bool,
}

impl fmt::Display for SubqueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subquery({})", self.subquery_ref)
    }
}
