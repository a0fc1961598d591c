// src/lib.rs
pub use condition::Condition;
pub use config::RegistryConfig;
pub use context::{
    AttributeFqn, AttributeProvider, CATEGORY_ACTION, CATEGORY_ENVIRONMENT, CATEGORY_RESOURCE,
    CATEGORY_SUBJECT, EvaluationContext,
};
pub use error::{IndeterminateError, PolicyError};
pub use expression::{
    Apply, AttributeDesignator, CompiledExpression, Expression, ExpressionRef, Literal, Value,
};
pub use functions::{
    ArithmeticOp, ComparisonFunction, ComparisonOp, EqualFunction, Function, FunctionRef,
    IntegerArithmetic, LogicalFunction, LogicalOp, MatchFunction, MatchFunctionRef,
    OneAndOnlyFunction, RegexpMatchFunction,
};
pub use pep_expression::{AttributeAssignmentExpression, PepActionExpression};
pub use policy_match::{AllOf, AnyOf, Match, MatchResult, Target};
pub use registry::{
    AttributeValueFactory, AttributeValueRegistry, FactoryRef, NativeKind, NativeValue,
    PatternFactory, RegistryBuilder, StandardFactory,
};
pub use rule::{RuleDefinition, RuleEvaluator};
pub use types::*;

mod condition;
mod config;
mod context;
mod error;
mod expression;
mod functions;
mod pep_expression;
mod policy_match;
mod registry;
mod rule;
mod timers;
mod types;

#[cfg(feature = "observability")]
pub mod metrics;
