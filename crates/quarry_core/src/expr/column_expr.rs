use std::fmt;

use crate::logical::binder::table_list::TableRef;
use crate::scalars::datatype::DataType;

/// Reference to a column in a bound table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnExpr {
    pub table_ref: TableRef,
    /// Index into the table's columns.
    pub column: usize,
    pub datatype: DataType,
    pub nullable: bool,
}

impl fmt::Display for ColumnExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table_ref, self.column)
    }
}
