//! The expression evaluation contract and the reference expressions.
//!
//! Every node evaluates against an optional [`EvaluationContext`]. Passing no
//! context is how the constant probe works: a node that needs request data
//! fails with a missing-attribute status, which marks it as context
//! dependent. [`CompiledExpression`] runs that probe once and keeps the
//! folded value.
//!
//! [`Apply`] compiles each of its arguments this way, so every constant
//! sub-tree is folded once when the tree is built rather than on every
//! request.

use std::fmt::Debug;
use std::sync::Arc;

use crate::context::{AttributeFqn, EvaluationContext};
use crate::error::{IndeterminateError, PolicyError};
use crate::functions::FunctionRef;
use crate::types::{AttributeValue, Bag, BagSource, Datatype};

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Single(AttributeValue),
    Bag(Bag),
}

impl Value {
    pub fn datatype(&self) -> Datatype {
        match self {
            Self::Single(v) => v.datatype(),
            Self::Bag(b) => b.datatype().clone(),
        }
    }

    pub fn as_single(&self) -> Result<&AttributeValue, IndeterminateError> {
        match self {
            Self::Single(v) => Ok(v),
            Self::Bag(b) => Err(IndeterminateError::processing(format!(
                "expected a single {} value, got a bag",
                b.datatype()
            ))),
        }
    }

    pub fn as_bag(&self) -> Result<&Bag, IndeterminateError> {
        match self {
            Self::Bag(b) => Ok(b),
            Self::Single(v) => Err(IndeterminateError::processing(format!(
                "expected a bag, got single value '{v}'"
            ))),
        }
    }

    pub fn as_bool(&self) -> Result<bool, IndeterminateError> {
        let value = self.as_single()?;
        value.as_bool().ok_or_else(|| {
            IndeterminateError::processing(format!(
                "expected a boolean, got {} value '{value}'",
                value.datatype()
            ))
        })
    }

    /// Single values become a one-element computed bag.
    pub fn into_bag(self) -> Bag {
        match self {
            Self::Bag(b) => b,
            Self::Single(v) => Bag::singleton(v, BagSource::Computed),
        }
    }
}

pub trait Expression: Send + Sync + Debug {
    /// Datatype of the value, or of the bag's elements.
    fn datatype(&self) -> Datatype;

    fn returns_bag(&self) -> bool;

    fn evaluate(&self, context: Option<&mut EvaluationContext>)
    -> Result<Value, IndeterminateError>;
}

pub type ExpressionRef = Arc<dyn Expression>;

/// An expression with its constant-probe result memoized.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    expression: ExpressionRef,
    constant: Option<Value>,
}

impl CompiledExpression {
    /// Probe `expression` once with no context.
    ///
    /// Success folds it to a constant. A missing-data failure marks it as
    /// context dependent. Any other failure means the expression can never
    /// succeed and is rejected.
    pub fn new(expression: ExpressionRef) -> Result<Self, PolicyError> {
        let constant = match expression.evaluate(None) {
            Ok(value) => Some(value),
            Err(e) if e.is_missing_data() => None,
            Err(e) => {
                return Err(PolicyError::InvalidExpression(format!(
                    "expression always fails: {}",
                    e.to_status().messages().join(": ")
                )));
            }
        };
        Ok(Self {
            expression,
            constant,
        })
    }

    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }

    pub fn constant_value(&self) -> Option<&Value> {
        self.constant.as_ref()
    }

    pub fn inner(&self) -> &ExpressionRef {
        &self.expression
    }
}

impl Expression for CompiledExpression {
    fn datatype(&self) -> Datatype {
        self.expression.datatype()
    }

    fn returns_bag(&self) -> bool {
        self.expression.returns_bag()
    }

    fn evaluate(
        &self,
        context: Option<&mut EvaluationContext>,
    ) -> Result<Value, IndeterminateError> {
        match &self.constant {
            Some(value) => Ok(value.clone()),
            None => self.expression.evaluate(context),
        }
    }
}

/// A literal attribute value.
#[derive(Debug, Clone)]
pub struct Literal {
    value: AttributeValue,
}

impl Literal {
    pub fn new(value: AttributeValue) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &AttributeValue {
        &self.value
    }
}

impl Expression for Literal {
    fn datatype(&self) -> Datatype {
        self.value.datatype()
    }

    fn returns_bag(&self) -> bool {
        false
    }

    fn evaluate(&self, _: Option<&mut EvaluationContext>) -> Result<Value, IndeterminateError> {
        Ok(Value::Single(self.value.clone()))
    }
}

/// Reads a bag of request attributes.
#[derive(Debug, Clone)]
pub struct AttributeDesignator {
    attribute: AttributeFqn,
    datatype: Datatype,
    must_be_present: bool,
}

impl AttributeDesignator {
    pub fn new(attribute: AttributeFqn, datatype: Datatype) -> Self {
        Self {
            attribute,
            datatype,
            must_be_present: false,
        }
    }

    /// An empty result becomes a missing-attribute error.
    pub fn must_be_present(mut self) -> Self {
        self.must_be_present = true;
        self
    }

    pub fn attribute(&self) -> &AttributeFqn {
        &self.attribute
    }
}

impl Expression for AttributeDesignator {
    fn datatype(&self) -> Datatype {
        self.datatype.clone()
    }

    fn returns_bag(&self) -> bool {
        true
    }

    fn evaluate(
        &self,
        context: Option<&mut EvaluationContext>,
    ) -> Result<Value, IndeterminateError> {
        let Some(context) = context else {
            return Err(IndeterminateError::missing_attribute(format!(
                "no evaluation context to resolve {}",
                self.attribute
            )));
        };
        let bag = context.attribute(&self.attribute, &self.datatype)?;
        if bag.is_empty() && self.must_be_present {
            return Err(IndeterminateError::missing_attribute(format!(
                "missing attribute {} of type {}",
                self.attribute, self.datatype
            )));
        }
        Ok(Value::Bag(bag))
    }
}

/// Applies a function to argument expressions.
#[derive(Debug, Clone)]
pub struct Apply {
    function: FunctionRef,
    args: Vec<ExpressionRef>,
}

impl Apply {
    /// Fails if the function rejects the argument types or an argument can
    /// never be evaluated. Constant arguments are folded.
    pub fn new(function: FunctionRef, args: Vec<ExpressionRef>) -> Result<Self, PolicyError> {
        function.validate(&args)?;
        let args = args
            .into_iter()
            .map(|arg| CompiledExpression::new(arg).map(|c| Arc::new(c) as ExpressionRef))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { function, args })
    }
}

impl Expression for Apply {
    fn datatype(&self) -> Datatype {
        self.function.return_type()
    }

    fn returns_bag(&self) -> bool {
        false
    }

    fn evaluate(
        &self,
        context: Option<&mut EvaluationContext>,
    ) -> Result<Value, IndeterminateError> {
        self.function
            .call(&self.args, context)
            .map_err(|e| e.wrap(format!("Error calling function {}", self.function.id())))
    }
}
