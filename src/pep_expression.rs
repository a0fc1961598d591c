//! Obligation and advice expressions as written in a rule.

use std::sync::Arc;

use crate::context::EvaluationContext;
use crate::error::{IndeterminateError, PolicyError};
use crate::expression::{CompiledExpression, Expression, ExpressionRef, Value};
use crate::types::{AttributeAssignment, Effect, PepAction, PepActionKind};

/// Produces attribute assignments from an expression.
///
/// A bag result yields one assignment per element.
#[derive(Debug, Clone)]
pub struct AttributeAssignmentExpression {
    attribute_id: String,
    category: Option<String>,
    issuer: Option<String>,
    expression: Arc<CompiledExpression>,
}

impl AttributeAssignmentExpression {
    pub fn new(
        attribute_id: impl Into<String>,
        expression: ExpressionRef,
    ) -> Result<Self, PolicyError> {
        Ok(Self {
            attribute_id: attribute_id.into(),
            category: None,
            issuer: None,
            expression: Arc::new(CompiledExpression::new(expression)?),
        })
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn attribute_id(&self) -> &str {
        &self.attribute_id
    }

    pub fn evaluate(
        &self,
        context: &mut EvaluationContext,
    ) -> Result<Vec<AttributeAssignment>, IndeterminateError> {
        let value = self.expression.evaluate(Some(context)).map_err(|e| {
            e.wrap(format!(
                "Error evaluating AttributeAssignmentExpression[{}]",
                self.attribute_id
            ))
        })?;
        let values = match value {
            Value::Single(v) => vec![v],
            Value::Bag(bag) => bag.values().to_vec(),
        };
        Ok(values
            .into_iter()
            .map(|value| AttributeAssignment {
                attribute_id: self.attribute_id.clone(),
                value,
                category: self.category.clone(),
                issuer: self.issuer.clone(),
            })
            .collect())
    }
}

/// An obligation or advice attached to a rule, with the effect it applies to.
#[derive(Debug, Clone)]
pub struct PepActionExpression {
    action_id: String,
    kind: PepActionKind,
    applies_to: Effect,
    assignments: Vec<AttributeAssignmentExpression>,
}

impl PepActionExpression {
    pub fn obligation(action_id: impl Into<String>, applies_to: Effect) -> Self {
        Self::new(action_id, PepActionKind::Obligation, applies_to)
    }

    pub fn advice(action_id: impl Into<String>, applies_to: Effect) -> Self {
        Self::new(action_id, PepActionKind::Advice, applies_to)
    }

    fn new(action_id: impl Into<String>, kind: PepActionKind, applies_to: Effect) -> Self {
        Self {
            action_id: action_id.into(),
            kind,
            applies_to,
            assignments: Vec::new(),
        }
    }

    pub fn with_assignment(mut self, assignment: AttributeAssignmentExpression) -> Self {
        self.assignments.push(assignment);
        self
    }

    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    pub fn kind(&self) -> PepActionKind {
        self.kind
    }

    pub fn applies_to(&self) -> Effect {
        self.applies_to
    }

    /// All assignments or nothing.
    pub fn evaluate(
        &self,
        context: &mut EvaluationContext,
    ) -> Result<PepAction, IndeterminateError> {
        let mut assignments = Vec::new();
        for assignment in &self.assignments {
            let produced = assignment.evaluate(context).map_err(|e| {
                e.wrap(format!("Error evaluating {} '{}'", self.kind, self.action_id))
            })?;
            assignments.extend(produced);
        }
        Ok(PepAction::new(self.action_id.clone(), self.kind, assignments))
    }
}
