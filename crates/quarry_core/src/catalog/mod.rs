//! Schema-provider boundary.
//!
//! Row sources and column metadata come from external providers; the core
//! only consumes this interface during binding and scan execution.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use quarry_error::Result;

use crate::scalars::datatype::DataType;
use crate::scalars::row::Row;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub datatype: DataType,
    pub nullable: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, datatype: DataType, nullable: bool) -> Self {
        ColumnSchema {
            name: name.into(),
            datatype,
            nullable,
        }
    }
}

/// Ordered column metadata for one row source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSchema {
    pub columns: Vec<ColumnSchema>,
}

impl SourceSchema {
    pub fn new(columns: Vec<ColumnSchema>) -> Self {
        SourceSchema { columns }
    }

    /// Case-insensitive name to index resolution.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

pub type SourceRows = Box<dyn Iterator<Item = Result<Row>> + Send>;

/// An enumerable collection of rows.
pub trait RowSource: Debug + Send + Sync {
    /// Open the source for scanning.
    ///
    /// A source may legitimately return `None` for its row collection;
    /// callers normalize that to an empty stream before iteration, never a
    /// fault.
    fn scan(&self) -> Result<Option<SourceRows>>;

    /// Row count hint used for join build-side selection. None when unknown.
    fn estimated_rows(&self) -> Option<usize> {
        None
    }
}

/// A resolved source: schema plus rows.
#[derive(Debug, Clone)]
pub struct SourceHandle {
    pub schema: SourceSchema,
    pub source: Arc<dyn RowSource>,
}

/// Resolves source names to row sources during binding.
pub trait SourceProvider: Debug + Send + Sync {
    /// Resolve a source by name, returning None when the name is unknown.
    fn resolve(&self, name: &str) -> Result<Option<SourceHandle>>;
}

/// In-memory source over owned rows, for tests and embedding hosts.
#[derive(Debug)]
pub struct MemorySource {
    schema: SourceSchema,
    rows: Vec<Row>,
    /// When set, `scan` reports a missing row collection instead of rows.
    absent: bool,
}

impl MemorySource {
    pub fn new(schema: SourceSchema, rows: Vec<Row>) -> Self {
        MemorySource {
            schema,
            rows,
            absent: false,
        }
    }

    /// A source whose row collection is absent (scan yields None).
    pub fn absent(schema: SourceSchema) -> Self {
        MemorySource {
            schema,
            rows: Vec::new(),
            absent: true,
        }
    }

    pub fn schema(&self) -> &SourceSchema {
        &self.schema
    }
}

impl RowSource for MemorySource {
    fn scan(&self) -> Result<Option<SourceRows>> {
        if self.absent {
            return Ok(None);
        }
        let rows = self.rows.clone();
        Ok(Some(Box::new(rows.into_iter().map(Ok))))
    }

    fn estimated_rows(&self) -> Option<usize> {
        if self.absent {
            Some(0)
        } else {
            Some(self.rows.len())
        }
    }
}

/// Provider over a fixed set of named in-memory sources.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    sources: HashMap<String, Arc<MemorySource>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        MemoryProvider::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, source: MemorySource) {
        self.sources
            .insert(name.into().to_ascii_lowercase(), Arc::new(source));
    }
}

impl SourceProvider for MemoryProvider {
    fn resolve(&self, name: &str) -> Result<Option<SourceHandle>> {
        Ok(self
            .sources
            .get(&name.to_ascii_lowercase())
            .map(|source| SourceHandle {
                schema: source.schema().clone(),
                source: source.clone() as Arc<dyn RowSource>,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalars::value::ScalarValue;

    #[test]
    fn resolve_case_insensitive() {
        let mut provider = MemoryProvider::new();
        provider.insert(
            "People",
            MemorySource::new(
                SourceSchema::new(vec![ColumnSchema::new("Name", DataType::Utf8, false)]),
                vec![Row::new(vec![ScalarValue::Utf8("ada".into())])],
            ),
        );

        assert!(provider.resolve("people").unwrap().is_some());
        assert!(provider.resolve("PEOPLE").unwrap().is_some());
        assert!(provider.resolve("missing").unwrap().is_none());
    }

    #[test]
    fn absent_rows_scan_none() {
        let source = MemorySource::absent(SourceSchema::default());
        assert!(source.scan().unwrap().is_none());
    }
}
