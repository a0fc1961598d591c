//! Effects, decisions and the per-evaluation decision result.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumString};
use utoipa::ToSchema;

use crate::error::IndeterminateError;

use super::pep_action::PepAction;
use super::status::Status;

/// The outcome a rule produces when it applies.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    StrumDisplay,
    EnumString,
)]
pub enum Effect {
    Permit,
    Deny,
}

/// The effect an element would have had if it had not failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ExtendedEffect {
    Permit,
    Deny,
    DenyOrPermit,
}

impl From<Effect> for ExtendedEffect {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Permit => ExtendedEffect::Permit,
            Effect::Deny => ExtendedEffect::Deny,
        }
    }
}

impl Display for ExtendedEffect {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Permit => write!(f, "P"),
            Self::Deny => write!(f, "D"),
            Self::DenyOrPermit => write!(f, "DP"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Decision {
    Permit,
    Deny,
    NotApplicable,
    Indeterminate { extended_effect: ExtendedEffect },
}

impl From<Effect> for Decision {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Permit => Decision::Permit,
            Effect::Deny => Decision::Deny,
        }
    }
}

impl Display for Decision {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Permit => write!(f, "Permit"),
            Self::Deny => write!(f, "Deny"),
            Self::NotApplicable => write!(f, "NotApplicable"),
            Self::Indeterminate { extended_effect } => {
                write!(f, "Indeterminate{{{extended_effect}}}")
            }
        }
    }
}

/// Reference to a policy or policy set that contributed to a decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct PolicyRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// The result of one evaluation call. Built fresh for every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DecisionResult {
    decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<Status>,
    obligations: Vec<PepAction>,
    advice: Vec<PepAction>,
    applicable_policies: Vec<PolicyRef>,
}

impl DecisionResult {
    pub fn not_applicable() -> Self {
        Self::bare(Decision::NotApplicable, None)
    }

    pub fn indeterminate(extended_effect: ExtendedEffect, cause: &IndeterminateError) -> Self {
        Self::bare(
            Decision::Indeterminate { extended_effect },
            Some(cause.to_status()),
        )
    }

    /// Permit or Deny with the obligations and advice that fired.
    pub fn simple(effect: Effect, obligations: Vec<PepAction>, advice: Vec<PepAction>) -> Self {
        Self {
            decision: effect.into(),
            status: None,
            obligations,
            advice,
            applicable_policies: Vec::new(),
        }
    }

    fn bare(decision: Decision, status: Option<Status>) -> Self {
        Self {
            decision,
            status,
            obligations: Vec::new(),
            advice: Vec::new(),
            applicable_policies: Vec::new(),
        }
    }

    /// Record a policy that was applicable; used by policy-level evaluators.
    pub fn with_applicable_policy(mut self, policy: PolicyRef) -> Self {
        self.applicable_policies.push(policy);
        self
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn obligations(&self) -> &[PepAction] {
        &self.obligations
    }

    pub fn advice(&self) -> &[PepAction] {
        &self.advice
    }

    pub fn applicable_policies(&self) -> &[PolicyRef] {
        &self.applicable_policies
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self.decision, Decision::Indeterminate { .. })
    }
}

impl Display for DecisionResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}(obligations={}; advice={})",
            self.decision,
            self.obligations.len(),
            self.advice.len()
        )
    }
}
