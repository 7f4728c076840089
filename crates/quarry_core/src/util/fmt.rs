use std::fmt;

/// Displays a slice as a comma-separated list.
#[derive(Debug)]
pub struct DisplayAsList<'a, T>(pub &'a [T]);

impl<T: fmt::Display> fmt::Display for DisplayAsList<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, item) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}
