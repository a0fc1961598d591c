use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Status, StatusCode};

/// Errors raised while building registries, expressions, targets and rules.
///
/// None of these are produced at request time: anything that goes wrong while
/// evaluating a request is an [`IndeterminateError`].
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum PolicyError {
    #[error("failed to parse value: {0}")]
    ParseError(String),

    #[error("unsupported datatype or native value: {0}")]
    UnsupportedType(String),

    #[error("duplicate datatype registration: {0}")]
    DuplicateDatatype(String),

    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    #[error("invalid condition: {0}")]
    InvalidCondition(String),

    /// The condition folds to false, so the rule it belongs to can never apply.
    #[error("invalid condition: Condition expression equivalent to constant False is invalid")]
    ConstantFalseCondition,

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("invalid match: {0}")]
    InvalidMatch(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for PolicyError {
    fn from(err: serde_json::Error) -> Self {
        PolicyError::InvalidConfig(err.to_string())
    }
}

impl From<regex::Error> for PolicyError {
    fn from(err: regex::Error) -> Self {
        PolicyError::InvalidExpression(err.to_string())
    }
}

/// A request-time evaluation failure.
///
/// Carries an XACML status code and an optional chain of causes. These are
/// always recovered at the rule boundary and turned into an Indeterminate
/// decision.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct IndeterminateError {
    code: StatusCode,
    message: String,
    #[source]
    cause: Option<Box<IndeterminateError>>,
}

impl IndeterminateError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::new(StatusCode::ProcessingError, message)
    }

    pub fn missing_attribute(message: impl Into<String>) -> Self {
        Self::new(StatusCode::MissingAttribute, message)
    }

    /// Wrap `self` as the cause of a new error with the same status code.
    pub fn wrap(self, message: impl Into<String>) -> Self {
        Self {
            code: self.code,
            message: message.into(),
            cause: Some(Box::new(self)),
        }
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&IndeterminateError> {
        self.cause.as_deref()
    }

    /// True when the failure only says that request data was not available.
    ///
    /// Used by the constant probe: an expression failing this way with no
    /// context at all is context-dependent, not broken.
    pub fn is_missing_data(&self) -> bool {
        self.code == StatusCode::MissingAttribute
    }

    pub fn to_status(&self) -> Status {
        Status {
            code: self.code,
            message: Some(self.message.clone()),
            cause: self.cause.as_ref().map(|c| Box::new(c.to_status())),
        }
    }
}

impl From<IndeterminateError> for Status {
    fn from(err: IndeterminateError) -> Self {
        err.to_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_wrap_keeps_status_code_and_chain() {
        let inner = IndeterminateError::missing_attribute("subject-id not found");
        let outer = inner.clone().wrap("Error evaluating Match[string-equal]");

        assert_eq!(outer.code(), StatusCode::MissingAttribute);
        assert_eq!(outer.cause(), Some(&inner));
        assert!(outer.is_missing_data());
        assert_eq!(
            outer.source().map(|s| s.to_string()),
            Some("subject-id not found".to_string())
        );
    }

    #[test]
    fn test_to_status_mirrors_chain() {
        let err = IndeterminateError::processing("boom").wrap("outer");
        let status = err.to_status();
        assert_eq!(status.code, StatusCode::ProcessingError);
        assert_eq!(status.message.as_deref(), Some("outer"));
        let cause = status.cause.expect("cause is kept");
        assert_eq!(cause.message.as_deref(), Some("boom"));
        assert!(cause.cause.is_none());
    }

    #[test]
    fn test_policy_error_display() {
        let err = PolicyError::UnsupportedType("urn:example:foo".into());
        assert_eq!(
            err.to_string(),
            "unsupported datatype or native value: urn:example:foo"
        );
    }

    #[test]
    fn test_policy_error_serialization() {
        let err = PolicyError::ParseError("integer overflow".into());
        let serialized = serde_json::to_value(&err).unwrap();
        let deserialized: PolicyError = serde_json::from_value(serialized).unwrap();
        assert_eq!(err, deserialized);
    }

    #[test]
    fn test_config_error_from_serde() {
        let err: PolicyError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, PolicyError::InvalidConfig(_)));
    }
}
