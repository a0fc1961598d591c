//! Evaluated obligations and advice handed to the enforcement point.

use serde::{Deserialize, Serialize};
use strum_macros::Display;
use utoipa::ToSchema;

use super::attr_value::AttributeValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Display)]
pub enum PepActionKind {
    Obligation,
    Advice,
}

/// One resolved attribute assignment of an obligation or advice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AttributeAssignment {
    pub attribute_id: String,
    #[schema(value_type = Object)]
    pub value: AttributeValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

/// An obligation (mandatory) or advice (advisory) with its resolved assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PepAction {
    id: String,
    mandatory: bool,
    assignments: Vec<AttributeAssignment>,
}

impl PepAction {
    pub fn new(
        id: impl Into<String>,
        kind: PepActionKind,
        assignments: Vec<AttributeAssignment>,
    ) -> Self {
        Self {
            id: id.into(),
            mandatory: kind == PepActionKind::Obligation,
            assignments,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn kind(&self) -> PepActionKind {
        if self.mandatory {
            PepActionKind::Obligation
        } else {
            PepActionKind::Advice
        }
    }

    pub fn assignments(&self) -> &[AttributeAssignment] {
        &self.assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_maps_to_mandatory_flag() {
        let obligation = PepAction::new("log", PepActionKind::Obligation, vec![]);
        let advice = PepAction::new("notify", PepActionKind::Advice, vec![]);
        assert!(obligation.is_mandatory());
        assert!(!advice.is_mandatory());
        assert_eq!(obligation.kind(), PepActionKind::Obligation);
        assert_eq!(advice.kind(), PepActionKind::Advice);
    }

    #[test]
    fn test_assignment_serialization_skips_absent_fields() {
        let assignment = AttributeAssignment {
            attribute_id: "urn:example:reason".into(),
            value: AttributeValue::from("audit"),
            category: None,
            issuer: None,
        };
        let json = serde_json::to_value(&assignment).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "attribute_id": "urn:example:reason",
                "value": {
                    "datatype": "http://www.w3.org/2001/XMLSchema#string",
                    "value": "audit"
                }
            })
        );
    }
}
