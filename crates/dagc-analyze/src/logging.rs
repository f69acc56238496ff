//! Logging analysis: the declared severity level.

use std::fmt;

use serde::{Deserialize, Serialize};

use dagc_core::dag::{attr, Operator, OperatorKind, UserKind};
use dagc_core::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        };
        f.write_str(s)
    }
}

pub fn is_supported(op: &Operator) -> bool {
    op.kind == OperatorKind::User(UserKind::Logging)
}

pub fn analyze(op: &Operator) -> Result<LogLevel> {
    if !is_supported(op) {
        return Err(Error::UnsupportedKind(format!("{} is not logging", op.kind)));
    }
    let raw = op.attribute(attr::LOGGING_LEVEL).ok_or_else(|| {
        Error::binding(op, format!("missing '{}' attribute", attr::LOGGING_LEVEL))
    })?;
    match raw.trim().to_ascii_uppercase().as_str() {
        "ERROR" => Ok(LogLevel::Error),
        "WARN" => Ok(LogLevel::Warn),
        "INFO" => Ok(LogLevel::Info),
        "DEBUG" => Ok(LogLevel::Debug),
        _ => Err(Error::binding(
            op,
            format!("unknown logging level '{}'", raw),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(level: Option<&str>) -> Operator {
        let mut b = Operator::builder(OperatorKind::User(UserKind::Logging)).input("in", "M");
        if let Some(l) = level {
            b = b.attribute(attr::LOGGING_LEVEL, l);
        }
        b.build()
    }

    #[test]
    fn level_is_case_insensitive() {
        assert_eq!(analyze(&op(Some("warn"))).unwrap(), LogLevel::Warn);
        assert_eq!(analyze(&op(Some(" INFO"))).unwrap(), LogLevel::Info);
    }

    #[test]
    fn missing_or_unknown_level_fails() {
        assert!(matches!(analyze(&op(None)), Err(Error::Binding { .. })));
        assert!(matches!(analyze(&op(Some("LOUD"))), Err(Error::Binding { .. })));
    }
}
