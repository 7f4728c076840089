//! Error type shared by all quarry crates.

use std::borrow::Cow;
use std::error::Error;
use std::fmt;

pub type Result<T, E = QuarryError> = std::result::Result<T, E>;

/// An error that can originate anywhere in query compilation or execution.
///
/// Errors are messages plus optional key/value fields for context. Fields are
/// included in the rendered output after the message.
#[derive(Debug)]
pub struct QuarryError {
    inner: Box<ErrorInner>,
}

#[derive(Debug)]
struct ErrorInner {
    msg: Cow<'static, str>,
    fields: Vec<(Cow<'static, str>, String)>,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl QuarryError {
    pub fn new(msg: impl Into<Cow<'static, str>>) -> Self {
        QuarryError {
            inner: Box::new(ErrorInner {
                msg: msg.into(),
                fields: Vec::new(),
                source: None,
            }),
        }
    }

    pub fn with_source(
        msg: impl Into<Cow<'static, str>>,
        source: Box<dyn Error + Send + Sync>,
    ) -> Self {
        QuarryError {
            inner: Box::new(ErrorInner {
                msg: msg.into(),
                fields: Vec::new(),
                source: Some(source),
            }),
        }
    }

    /// Attach a named field to the error.
    pub fn with_field(mut self, key: impl Into<Cow<'static, str>>, value: impl fmt::Display) -> Self {
        self.inner.fields.push((key.into(), value.to_string()));
        self
    }

    pub fn message(&self) -> &str {
        &self.inner.msg
    }
}

impl fmt::Display for QuarryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.msg)?;
        for (key, value) in &self.inner.fields {
            write!(f, "\n  {key}: {value}")?;
        }
        Ok(())
    }
}

impl Error for QuarryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source.as_ref().map(|s| s.as_ref() as _)
    }
}

/// Extension trait for adding context to results holding arbitrary errors.
pub trait ResultExt<T> {
    /// Wrap the error with a static context message.
    fn context(self, msg: &'static str) -> Result<T>;

    /// Wrap the error with a lazily produced context message.
    fn context_fn<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<Cow<'static, str>>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Error + Send + Sync + 'static,
{
    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| QuarryError::with_source(msg, Box::new(e)))
    }

    fn context_fn<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<Cow<'static, str>>,
    {
        self.map_err(|e| QuarryError::with_source(f(), Box::new(e)))
    }
}

/// Extension trait for treating a None as an error.
pub trait OptionExt<T> {
    /// Errors with "Missing {thing}" if the option is None.
    fn required(self, thing: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, thing: &'static str) -> Result<T> {
        match self {
            Some(v) => Ok(v),
            None => Err(QuarryError::new(format!("Missing {thing}"))),
        }
    }
}

/// Return early with a "Not implemented" error.
#[macro_export]
macro_rules! not_implemented {
    ($($arg:tt)*) => {
        return Err($crate::QuarryError::new(format!("Not implemented: {}", format_args!($($arg)*))))
    };
}
