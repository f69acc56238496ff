use std::fmt;

use thiserror::Error;

/// Canonical result for the compiler crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Compile-time failures. None of these are recovered locally: an operator
/// either compiles completely or its compilation is abandoned.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Wrong port/argument counts, mixed consumption units, bad strategy.
    #[error("shape error at {operator}: {message}")]
    Shape { operator: String, message: String },

    /// Derived facts that cannot be bound (cases, properties, attributes).
    #[error("binding error at {operator}: {message}")]
    Binding { operator: String, message: String },

    /// The runtime-logic resolver cannot find a declared reference.
    #[error("cannot resolve {reference}: {message}")]
    Resolution { reference: String, message: String },

    #[error("unsupported operator kind: {0}")]
    UnsupportedKind(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("hashing error: {0}")]
    Hash(String),

    #[error("internal invariant failed: {0}")]
    Invariant(String),
}

impl Error {
    pub fn shape(operator: impl fmt::Display, message: impl Into<String>) -> Self {
        Error::Shape {
            operator: operator.to_string(),
            message: message.into(),
        }
    }

    pub fn binding(operator: impl fmt::Display, message: impl Into<String>) -> Self {
        Error::Binding {
            operator: operator.to_string(),
            message: message.into(),
        }
    }

    pub fn resolution(reference: impl fmt::Display, message: impl Into<String>) -> Self {
        Error::Resolution {
            reference: reference.to_string(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Hash(e.to_string())
    }
}

/// Every error collected while compiling a batch of operators.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub errors: Vec<Error>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok(value)` when nothing was collected.
    pub fn into_result<T>(self, value: T) -> std::result::Result<T, Diagnostics> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} compile error(s)", self.errors.len())?;
        for e in &self.errors {
            writeln!(f, "  - {}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

impl From<Error> for Diagnostics {
    fn from(e: Error) -> Self {
        Diagnostics { errors: vec![e] }
    }
}
