use std::sync::Arc;

use crate::context::EvaluationContext;
use crate::error::{IndeterminateError, PolicyError};
use crate::expression::{CompiledExpression, Expression, ExpressionRef};
use crate::types::Datatype;

/// A rule condition.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Absent, or folded to constant true.
    True,
    Expression(Arc<CompiledExpression>),
}

impl Condition {
    pub const TRUE: Condition = Condition::True;

    /// Build a condition, folding constant expressions.
    ///
    /// The expression must be a single boolean. A constant false condition
    /// makes the rule useless and is rejected with
    /// [`PolicyError::ConstantFalseCondition`].
    pub fn from_expression(expression: Option<ExpressionRef>) -> Result<Self, PolicyError> {
        let Some(expression) = expression else {
            return Ok(Self::TRUE);
        };
        if expression.returns_bag() || expression.datatype() != Datatype::BOOLEAN {
            return Err(PolicyError::InvalidCondition(format!(
                "condition must be a single boolean, got {}{}",
                if expression.returns_bag() { "bag of " } else { "" },
                expression.datatype()
            )));
        }
        let compiled = CompiledExpression::new(expression)?;
        match compiled.constant_value() {
            None => Ok(Self::Expression(Arc::new(compiled))),
            Some(value) => match value.as_bool() {
                Ok(true) => Ok(Self::TRUE),
                Ok(false) => Err(PolicyError::ConstantFalseCondition),
                Err(e) => Err(PolicyError::InvalidCondition(e.to_string())),
            },
        }
    }

    pub fn is_always_true(&self) -> bool {
        matches!(self, Self::True)
    }

    pub fn evaluate(&self, context: &mut EvaluationContext) -> Result<bool, IndeterminateError> {
        match self {
            Self::True => Ok(true),
            Self::Expression(expression) => expression
                .evaluate(Some(context))
                .and_then(|value| value.as_bool())
                .map_err(|e| e.wrap("Error evaluating Condition")),
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::TRUE
    }
}
