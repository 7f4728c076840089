use std::fmt;

use quarry_error::{QuarryError, Result};

use crate::scalars::datatype::DataType;

/// Reference to a bound table (any row-producing thing in a query: a source,
/// a projection output, an aggregate output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef(pub u32);

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub reference: TableRef,
    pub alias: Option<String>,
    pub column_names: Vec<String>,
    pub column_types: Vec<DataType>,
    pub column_nullable: Vec<bool>,
}

impl Table {
    pub fn num_columns(&self) -> usize {
        self.column_types.len()
    }
}

/// All tables bound during one compilation, addressed by ref.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TableList {
    tables: Vec<Table>,
}

impl TableList {
    pub const fn empty() -> Self {
        TableList { tables: Vec::new() }
    }

    pub fn push_table(
        &mut self,
        alias: Option<String>,
        column_names: Vec<String>,
        column_types: Vec<DataType>,
        column_nullable: Vec<bool>,
    ) -> TableRef {
        debug_assert_eq!(column_names.len(), column_types.len());
        debug_assert_eq!(column_names.len(), column_nullable.len());

        let reference = TableRef(self.tables.len() as u32);
        self.tables.push(Table {
            reference,
            alias,
            column_names,
            column_types,
            column_nullable,
        });
        reference
    }

    pub fn get(&self, reference: TableRef) -> Result<&Table> {
        self.tables
            .get(reference.0 as usize)
            .ok_or_else(|| QuarryError::new(format!("Missing table in list: {reference}")))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }
}
