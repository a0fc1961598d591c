//! XACML status codes and the serializable status detail of a decision.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// XACML 3.0 status codes (section 7.19.4 / B.8).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString,
)]
pub enum StatusCode {
    #[serde(rename = "urn:oasis:names:tc:xacml:1.0:status:ok")]
    #[strum(serialize = "urn:oasis:names:tc:xacml:1.0:status:ok")]
    Ok,
    #[serde(rename = "urn:oasis:names:tc:xacml:1.0:status:missing-attribute")]
    #[strum(serialize = "urn:oasis:names:tc:xacml:1.0:status:missing-attribute")]
    MissingAttribute,
    #[serde(rename = "urn:oasis:names:tc:xacml:1.0:status:syntax-error")]
    #[strum(serialize = "urn:oasis:names:tc:xacml:1.0:status:syntax-error")]
    SyntaxError,
    #[serde(rename = "urn:oasis:names:tc:xacml:1.0:status:processing-error")]
    #[strum(serialize = "urn:oasis:names:tc:xacml:1.0:status:processing-error")]
    ProcessingError,
}

/// Status detail attached to a decision, with the chain of causes kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Status {
    pub code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(no_recursion)]
    pub cause: Option<Box<Status>>,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: None,
            cause: None,
        }
    }

    /// Messages from this status down to the innermost cause.
    pub fn messages(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = Some(self);
        while let Some(status) = current {
            if let Some(message) = status.message.as_deref() {
                out.push(message);
            }
            current = status.cause.as_deref();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_code_urns() {
        assert_eq!(
            StatusCode::MissingAttribute.to_string(),
            "urn:oasis:names:tc:xacml:1.0:status:missing-attribute"
        );
        assert_eq!(
            StatusCode::from_str("urn:oasis:names:tc:xacml:1.0:status:processing-error").unwrap(),
            StatusCode::ProcessingError
        );
        assert!(StatusCode::from_str("processing-error").is_err());
    }

    #[test]
    fn test_status_code_serializes_as_urn() {
        let json = serde_json::to_value(StatusCode::SyntaxError).unwrap();
        assert_eq!(json, "urn:oasis:names:tc:xacml:1.0:status:syntax-error");
    }

    #[test]
    fn test_status_messages_walk_the_chain() {
        let status = Status {
            code: StatusCode::ProcessingError,
            message: Some("outer".into()),
            cause: Some(Box::new(Status {
                code: StatusCode::ProcessingError,
                message: Some("inner".into()),
                cause: None,
            })),
        };
        assert_eq!(status.messages(), vec!["outer", "inner"]);
        assert!(Status::ok().messages().is_empty());
    }
}
