//! Plan explain rendering.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExplainConfig {
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExplainValue {
    Value(String),
    Values(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainEntry {
    pub name: &'static str,
    pub items: BTreeMap<String, ExplainValue>,
}

impl fmt::Display for ExplainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.items.is_empty() {
            return Ok(());
        }
        write!(f, " (")?;
        for (idx, (key, value)) in self.items.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            match value {
                ExplainValue::Value(v) => write!(f, "{key} = {v}")?,
                ExplainValue::Values(vs) => write!(f, "{key} = [{}]", vs.join(", "))?,
            }
        }
        write!(f, ")")
    }
}

pub trait Explainable {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry;
}

#[derive(Debug)]
pub struct EntryBuilder {
    name: &'static str,
    conf: ExplainConfig,
    items: BTreeMap<String, ExplainValue>,
}

impl EntryBuilder {
    pub fn new(name: &'static str, conf: ExplainConfig) -> Self {
        EntryBuilder {
            name,
            conf,
            items: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.items
            .insert(key.to_string(), ExplainValue::Value(value.to_string()));
        self
    }

    pub fn with_values<I>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        self.items.insert(
            key.to_string(),
            ExplainValue::Values(values.into_iter().map(|v| v.to_string()).collect()),
        );
        self
    }

    /// Insert only when explaining verbosely.
    pub fn with_value_if_verbose(self, key: &str, value: impl fmt::Display) -> Self {
        if self.conf.verbose {
            self.with_value(key, value)
        } else {
            self
        }
    }

    pub fn build(self) -> ExplainEntry {
        ExplainEntry {
            name: self.name,
            items: self.items,
        }
    }
}
