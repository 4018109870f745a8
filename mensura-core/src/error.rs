//! Structured errors for unit arithmetic
//!
//! Every failure carries a machine-readable code and, where one exists, a
//! suggestion for fixing the call.

use crate::NumberError;
use thiserror::Error;

/// Standard error codes (machine-readable)
pub mod codes {
    pub const DIMENSIONALITY: &str = "DIMENSIONALITY";
    pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
    pub const INDEX_OUT_OF_RANGE: &str = "INDEX_OUT_OF_RANGE";
    pub const UNDEFINED_UNIT: &str = "UNDEFINED_UNIT";
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const SYSTEM_DEFINITION: &str = "SYSTEM_DEFINITION";
    pub const UNKNOWN_ATTRIBUTE: &str = "UNKNOWN_ATTRIBUTE";
    pub const NUMBER_ERROR: &str = "NUMBER_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Errors raised by quantities, registries and systems
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    /// Operands (or conversion endpoints) have different dimensionality
    #[error("Cannot convert from '{from}' ({from_dim}) to '{to}' ({to_dim})")]
    Dimensionality {
        from: String,
        to: String,
        from_dim: String,
        to_dim: String,
    },

    /// Invalid argument combination (construction, error bars, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Index {index} out of range for {len} elements")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Undefined unit: {0}")]
    UndefinedUnit(String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// Malformed or inconsistent system definition
    #[error("System definition error at line {line}: {message}")]
    SystemDefinition { line: usize, message: String },

    #[error("Unknown attribute '{name}' in {owner}")]
    UnknownAttribute {
        owner: String,
        name: String,
        suggestions: Vec<String>,
    },

    #[error(transparent)]
    Number(#[from] NumberError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UnitError {
    /// Dimensionality error between two unit renderings
    pub fn dimensionality(from: impl ToString, to: impl ToString) -> Self {
        UnitError::Dimensionality {
            from: from.to_string(),
            to: to.to_string(),
            from_dim: String::new(),
            to_dim: String::new(),
        }
    }

    /// Dimensionality error carrying both dimensionalities
    pub fn dimensionality_with(
        from: impl ToString,
        to: impl ToString,
        from_dim: impl ToString,
        to_dim: impl ToString,
    ) -> Self {
        UnitError::Dimensionality {
            from: from.to_string(),
            to: to.to_string(),
            from_dim: from_dim.to_string(),
            to_dim: to_dim.to_string(),
        }
    }

    pub fn system_definition(line: usize, message: impl Into<String>) -> Self {
        UnitError::SystemDefinition { line, message: message.into() }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            UnitError::Dimensionality { .. } => codes::DIMENSIONALITY,
            UnitError::InvalidArgument(_) => codes::INVALID_ARGUMENT,
            UnitError::IndexOutOfRange { .. } => codes::INDEX_OUT_OF_RANGE,
            UnitError::UndefinedUnit(_) => codes::UNDEFINED_UNIT,
            UnitError::Parse(_) => codes::PARSE_ERROR,
            UnitError::SystemDefinition { .. } => codes::SYSTEM_DEFINITION,
            UnitError::UnknownAttribute { .. } => codes::UNKNOWN_ATTRIBUTE,
            UnitError::Number(_) => codes::NUMBER_ERROR,
            UnitError::Internal(_) => codes::INTERNAL,
        }
    }

    /// Suggestion for fixing the error, if one applies
    pub fn suggestion(&self) -> Option<String> {
        match self {
            UnitError::Dimensionality { .. } => {
                Some("Convert both operands to units of the same dimension".to_string())
            }
            UnitError::UndefinedUnit(name) => Some(format!("Define '{}' in the registry or check spelling", name)),
            UnitError::SystemDefinition { .. } => {
                Some("Expected '@system <name> [using <group>, ...]' followed by 'new_unit[: old_unit]' lines".to_string())
            }
            UnitError::UnknownAttribute { suggestions, .. } if !suggestions.is_empty() => {
                Some(format!("Similar: {}", suggestions.join(", ")))
            }
            UnitError::Internal(_) => Some("This is a bug, please report it".to_string()),
            _ => None,
        }
    }

    pub fn is_dimensionality(&self) -> bool {
        matches!(self, UnitError::Dimensionality { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(UnitError::dimensionality("meter", "second").code(), codes::DIMENSIONALITY);
        assert_eq!(UnitError::system_definition(3, "bad").code(), codes::SYSTEM_DEFINITION);
        let err: UnitError = NumberError::DivisionByZero.into();
        assert_eq!(err.code(), codes::NUMBER_ERROR);
    }

    #[test]
    fn test_display() {
        let err = UnitError::dimensionality_with("meter", "second", "[length]", "[time]");
        assert_eq!(err.to_string(), "Cannot convert from 'meter' ([length]) to 'second' ([time])");
        assert!(err.is_dimensionality());
        assert_eq!(
            UnitError::system_definition(1, "Invalid System header syntax").to_string(),
            "System definition error at line 1: Invalid System header syntax"
        );
    }

    #[test]
    fn test_suggestions() {
        let err = UnitError::UnknownAttribute {
            owner: "systems".to_string(),
            name: "mk".to_string(),
            suggestions: vec!["mks".to_string()],
        };
        assert_eq!(err.suggestion().as_deref(), Some("Similar: mks"));
        assert!(UnitError::Parse("x".to_string()).suggestion().is_none());
    }
}
