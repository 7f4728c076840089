use std::fmt;

/// A statistics value that may not be known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticsValue<T> {
    Exact(T),
    Unknown,
}

impl<T> StatisticsValue<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Exact(v) => Some(v),
            Self::Unknown => None,
        }
    }
}

impl<T: fmt::Display> fmt::Display for StatisticsValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{v}"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
