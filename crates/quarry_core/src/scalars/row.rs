use std::fmt;

use super::value::ScalarValue;

/// A fixed-arity row of scalar values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub values: Vec<ScalarValue>,
}

impl Row {
    pub fn new(values: Vec<ScalarValue>) -> Self {
        Row { values }
    }

    /// A row of `width` null slots, used for the absent side of an outer
    /// join.
    pub fn nulls(width: usize) -> Self {
        Row {
            values: vec![ScalarValue::Null; width],
        }
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }

    /// Concatenate two rows into a combined join output row.
    pub fn concat(left: &Row, right: &Row) -> Self {
        let mut values = Vec::with_capacity(left.width() + right.width());
        values.extend_from_slice(&left.values);
        values.extend_from_slice(&right.values);
        Row { values }
    }
}

impl From<Vec<ScalarValue>> for Row {
    fn from(values: Vec<ScalarValue>) -> Self {
        Row { values }
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (idx, val) in self.values.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{val}")?;
        }
        write!(f, ")")
    }
}
