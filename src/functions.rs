//! Functions callable from `Apply` expressions and from target `Match`es.
//!
//! Only a core set is shipped: typed equality and ordering, regular
//! expression matching, boolean logic, checked integer arithmetic and
//! `one-and-only`. Anything else plugs in through [`Function`] or
//! [`MatchFunction`].

use std::cmp::Ordering;
use std::fmt::Debug;
use std::sync::Arc;

use regex::Regex;
use strum_macros::{Display, EnumIter};

use crate::context::EvaluationContext;
use crate::error::{IndeterminateError, PolicyError};
use crate::expression::{ExpressionRef, Value};
use crate::types::{AttributeValue, Datatype, IntegerValue, StandardDatatype};

const FUNCTION_PREFIX: &str = "urn:oasis:names:tc:xacml:1.0:function:";

/// A function applied to argument expressions.
///
/// Functions receive the unevaluated arguments so that they can
/// short-circuit, as `and` and `or` do.
pub trait Function: Send + Sync + Debug {
    fn id(&self) -> &str;

    fn return_type(&self) -> Datatype;

    /// Checked once when the enclosing `Apply` is built.
    fn validate(&self, args: &[ExpressionRef]) -> Result<(), PolicyError>;

    fn call(
        &self,
        args: &[ExpressionRef],
        context: Option<&mut EvaluationContext>,
    ) -> Result<Value, IndeterminateError>;
}

pub type FunctionRef = Arc<dyn Function>;

/// A boolean function of a policy literal and one attribute value.
pub trait MatchFunction: Send + Sync + Debug {
    fn id(&self) -> &str;

    /// Datatypes of the literal and of the attribute value, in that order.
    fn param_types(&self) -> (Datatype, Datatype);

    fn matches(
        &self,
        literal: &AttributeValue,
        value: &AttributeValue,
    ) -> Result<bool, IndeterminateError>;
}

pub type MatchFunctionRef = Arc<dyn MatchFunction>;

fn check_args(id: &str, args: &[ExpressionRef], expected: &[Datatype]) -> Result<(), PolicyError> {
    if args.len() != expected.len() {
        return Err(PolicyError::InvalidExpression(format!(
            "{id} expects {} arguments, got {}",
            expected.len(),
            args.len()
        )));
    }
    for (index, (arg, datatype)) in args.iter().zip(expected).enumerate() {
        if arg.returns_bag() || arg.datatype() != *datatype {
            return Err(PolicyError::InvalidExpression(format!(
                "{id} argument #{index} must be a single {datatype}, got {}{}",
                if arg.returns_bag() { "bag of " } else { "" },
                arg.datatype()
            )));
        }
    }
    Ok(())
}

fn eval_arg(
    arg: &ExpressionRef,
    index: usize,
    context: Option<&mut EvaluationContext>,
) -> Result<Value, IndeterminateError> {
    arg.evaluate(context)
        .map_err(|e| e.wrap(format!("Error evaluating argument #{index}")))
}

fn eval_single_args(
    args: &[ExpressionRef],
    mut context: Option<&mut EvaluationContext>,
) -> Result<Vec<AttributeValue>, IndeterminateError> {
    args.iter()
        .enumerate()
        .map(|(index, arg)| {
            eval_arg(arg, index, context.as_deref_mut())
                .and_then(|value| value.as_single().cloned())
        })
        .collect()
}

fn type_mismatch(id: &str, value: &AttributeValue) -> IndeterminateError {
    IndeterminateError::processing(format!(
        "{id} cannot be applied to {} value '{value}'",
        value.datatype()
    ))
}

fn two_args(
    id: &str,
    args: &[AttributeValue],
) -> Result<(AttributeValue, AttributeValue), IndeterminateError> {
    match args {
        [a, b] => Ok((a.clone(), b.clone())),
        _ => Err(IndeterminateError::processing(format!(
            "{id} expects 2 arguments, got {}",
            args.len()
        ))),
    }
}

/// `{type}-equal` for any datatype, standard or extension.
#[derive(Debug, Clone)]
pub struct EqualFunction {
    id: String,
    datatype: Datatype,
}

impl EqualFunction {
    pub fn new(datatype: Datatype) -> Self {
        let id = match datatype.standard() {
            Some(standard) => format!("{FUNCTION_PREFIX}{}-equal", standard.short_name()),
            None => format!("{}-equal", datatype.id()),
        };
        Self { id, datatype }
    }
}

impl MatchFunction for EqualFunction {
    fn id(&self) -> &str {
        &self.id
    }

    fn param_types(&self) -> (Datatype, Datatype) {
        (self.datatype.clone(), self.datatype.clone())
    }

    fn matches(
        &self,
        literal: &AttributeValue,
        value: &AttributeValue,
    ) -> Result<bool, IndeterminateError> {
        if literal.datatype() != self.datatype {
            return Err(type_mismatch(&self.id, literal));
        }
        if value.datatype() != self.datatype {
            return Err(type_mismatch(&self.id, value));
        }
        Ok(literal == value)
    }
}

impl Function for EqualFunction {
    fn id(&self) -> &str {
        &self.id
    }

    fn return_type(&self) -> Datatype {
        Datatype::BOOLEAN
    }

    fn validate(&self, args: &[ExpressionRef]) -> Result<(), PolicyError> {
        check_args(&self.id, args, &[self.datatype.clone(), self.datatype.clone()])
    }

    fn call(
        &self,
        args: &[ExpressionRef],
        context: Option<&mut EvaluationContext>,
    ) -> Result<Value, IndeterminateError> {
        let (a, b) = two_args(&self.id, &eval_single_args(args, context)?)?;
        Ok(Value::Single(AttributeValue::Boolean(self.matches(&a, &b)?)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum ComparisonOp {
    #[strum(serialize = "greater-than")]
    GreaterThan,
    #[strum(serialize = "greater-than-or-equal")]
    GreaterThanOrEqual,
    #[strum(serialize = "less-than")]
    LessThan,
    #[strum(serialize = "less-than-or-equal")]
    LessThanOrEqual,
}

impl ComparisonOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::GreaterThan => ordering == Ordering::Greater,
            Self::GreaterThanOrEqual => ordering != Ordering::Less,
            Self::LessThan => ordering == Ordering::Less,
            Self::LessThanOrEqual => ordering != Ordering::Greater,
        }
    }
}

/// Ordering comparisons on integers, doubles and strings.
///
/// Any comparison involving `NaN` is false.
#[derive(Debug, Clone)]
pub struct ComparisonFunction {
    id: String,
    datatype: StandardDatatype,
    op: ComparisonOp,
}

impl ComparisonFunction {
    pub fn new(datatype: StandardDatatype, op: ComparisonOp) -> Result<Self, PolicyError> {
        if !matches!(
            datatype,
            StandardDatatype::Integer | StandardDatatype::Double | StandardDatatype::String
        ) {
            return Err(PolicyError::UnsupportedType(format!(
                "{} has no {op} function",
                datatype.id()
            )));
        }
        Ok(Self {
            id: format!("{FUNCTION_PREFIX}{}-{op}", datatype.short_name()),
            datatype,
            op,
        })
    }

    fn compare(&self, a: &AttributeValue, b: &AttributeValue) -> Result<bool, IndeterminateError> {
        let expected = self.datatype.datatype();
        if let Some(wrong) = [a, b].into_iter().find(|v| v.datatype() != expected) {
            return Err(type_mismatch(&self.id, wrong));
        }
        let ordering = match (a, b) {
            (AttributeValue::Integer(x), AttributeValue::Integer(y)) => Some(x.cmp(y)),
            (AttributeValue::Double(x), AttributeValue::Double(y)) => {
                x.value().partial_cmp(&y.value())
            }
            _ => a.as_str().zip(b.as_str()).map(|(x, y)| x.cmp(y)),
        };
        Ok(ordering.is_some_and(|o| self.op.holds(o)))
    }
}

impl MatchFunction for ComparisonFunction {
    fn id(&self) -> &str {
        &self.id
    }

    fn param_types(&self) -> (Datatype, Datatype) {
        (self.datatype.datatype(), self.datatype.datatype())
    }

    fn matches(
        &self,
        literal: &AttributeValue,
        value: &AttributeValue,
    ) -> Result<bool, IndeterminateError> {
        self.compare(literal, value)
    }
}

impl Function for ComparisonFunction {
    fn id(&self) -> &str {
        &self.id
    }

    fn return_type(&self) -> Datatype {
        Datatype::BOOLEAN
    }

    fn validate(&self, args: &[ExpressionRef]) -> Result<(), PolicyError> {
        let datatype = self.datatype.datatype();
        check_args(&self.id, args, &[datatype.clone(), datatype])
    }

    fn call(
        &self,
        args: &[ExpressionRef],
        context: Option<&mut EvaluationContext>,
    ) -> Result<Value, IndeterminateError> {
        let (a, b) = two_args(&self.id, &eval_single_args(args, context)?)?;
        Ok(Value::Single(AttributeValue::Boolean(self.compare(&a, &b)?)))
    }
}

/// `string-regexp-match`: the first argument is the pattern.
///
/// The pattern is unanchored; an invalid pattern is a processing error.
#[derive(Debug, Clone, Default)]
pub struct RegexpMatchFunction;

impl RegexpMatchFunction {
    pub const ID: &'static str = "urn:oasis:names:tc:xacml:1.0:function:string-regexp-match";

    fn is_match(
        &self,
        pattern: &AttributeValue,
        value: &AttributeValue,
    ) -> Result<bool, IndeterminateError> {
        let (AttributeValue::String(pattern), AttributeValue::String(value)) = (pattern, value)
        else {
            return Err(IndeterminateError::processing(format!(
                "{} expects two strings, got {} and {}",
                Self::ID,
                pattern.datatype(),
                value.datatype()
            )));
        };
        let regex = Regex::new(pattern).map_err(|e| {
            IndeterminateError::processing(format!("invalid regular expression '{pattern}': {e}"))
        })?;
        Ok(regex.is_match(value))
    }
}

impl MatchFunction for RegexpMatchFunction {
    fn id(&self) -> &str {
        Self::ID
    }

    fn param_types(&self) -> (Datatype, Datatype) {
        (Datatype::STRING, Datatype::STRING)
    }

    fn matches(
        &self,
        literal: &AttributeValue,
        value: &AttributeValue,
    ) -> Result<bool, IndeterminateError> {
        self.is_match(literal, value)
    }
}

impl Function for RegexpMatchFunction {
    fn id(&self) -> &str {
        Self::ID
    }

    fn return_type(&self) -> Datatype {
        Datatype::BOOLEAN
    }

    fn validate(&self, args: &[ExpressionRef]) -> Result<(), PolicyError> {
        check_args(Self::ID, args, &[Datatype::STRING, Datatype::STRING])
    }

    fn call(
        &self,
        args: &[ExpressionRef],
        context: Option<&mut EvaluationContext>,
    ) -> Result<Value, IndeterminateError> {
        let (pattern, value) = two_args(Self::ID, &eval_single_args(args, context)?)?;
        Ok(Value::Single(AttributeValue::Boolean(self.is_match(&pattern, &value)?)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

/// `and`, `or` and `not`.
///
/// `and` and `or` take any number of arguments and stop at the first
/// argument that decides the result; later arguments are not evaluated.
#[derive(Debug, Clone)]
pub struct LogicalFunction {
    id: String,
    op: LogicalOp,
}

impl LogicalFunction {
    pub fn new(op: LogicalOp) -> Self {
        Self {
            id: format!("{FUNCTION_PREFIX}{op}"),
            op,
        }
    }
}

impl Function for LogicalFunction {
    fn id(&self) -> &str {
        &self.id
    }

    fn return_type(&self) -> Datatype {
        Datatype::BOOLEAN
    }

    fn validate(&self, args: &[ExpressionRef]) -> Result<(), PolicyError> {
        match self.op {
            LogicalOp::Not => check_args(&self.id, args, &[Datatype::BOOLEAN]),
            LogicalOp::And | LogicalOp::Or => {
                let expected = vec![Datatype::BOOLEAN; args.len()];
                check_args(&self.id, args, &expected)
            }
        }
    }

    fn call(
        &self,
        args: &[ExpressionRef],
        mut context: Option<&mut EvaluationContext>,
    ) -> Result<Value, IndeterminateError> {
        let decisive = match self.op {
            LogicalOp::Not => {
                let [arg] = args else {
                    return Err(IndeterminateError::processing(format!(
                        "{} expects 1 argument, got {}",
                        self.id,
                        args.len()
                    )));
                };
                let value = eval_arg(arg, 0, context)?.as_bool()?;
                return Ok(Value::Single(AttributeValue::Boolean(!value)));
            }
            LogicalOp::And => false,
            LogicalOp::Or => true,
        };
        for (index, arg) in args.iter().enumerate() {
            if eval_arg(arg, index, context.as_deref_mut())?.as_bool()? == decisive {
                return Ok(Value::Single(AttributeValue::Boolean(decisive)));
            }
        }
        Ok(Value::Single(AttributeValue::Boolean(!decisive)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
}

/// `integer-add`, `integer-subtract` and `integer-multiply`.
///
/// Overflow of the operands' precision is a processing error.
#[derive(Debug, Clone)]
pub struct IntegerArithmetic {
    id: String,
    op: ArithmeticOp,
}

impl IntegerArithmetic {
    pub fn new(op: ArithmeticOp) -> Self {
        Self {
            id: format!("{FUNCTION_PREFIX}integer-{op}"),
            op,
        }
    }

    fn apply(
        &self,
        a: &IntegerValue,
        b: &IntegerValue,
    ) -> Result<IntegerValue, IndeterminateError> {
        match self.op {
            ArithmeticOp::Add => a.checked_add(b),
            ArithmeticOp::Subtract => a.checked_sub(b),
            ArithmeticOp::Multiply => a.checked_mul(b),
        }
    }
}

impl Function for IntegerArithmetic {
    fn id(&self) -> &str {
        &self.id
    }

    fn return_type(&self) -> Datatype {
        Datatype::INTEGER
    }

    fn validate(&self, args: &[ExpressionRef]) -> Result<(), PolicyError> {
        check_args(&self.id, args, &[Datatype::INTEGER, Datatype::INTEGER])
    }

    fn call(
        &self,
        args: &[ExpressionRef],
        context: Option<&mut EvaluationContext>,
    ) -> Result<Value, IndeterminateError> {
        let (a, b) = two_args(&self.id, &eval_single_args(args, context)?)?;
        let (Some(x), Some(y)) = (a.as_integer(), b.as_integer()) else {
            return Err(type_mismatch(&self.id, &a));
        };
        Ok(Value::Single(AttributeValue::Integer(self.apply(x, y)?)))
    }
}

/// `{type}-one-and-only`: the single value of a one-element bag.
#[derive(Debug, Clone)]
pub struct OneAndOnlyFunction {
    id: String,
    datatype: Datatype,
}

impl OneAndOnlyFunction {
    pub fn new(datatype: Datatype) -> Self {
        let id = match datatype.standard() {
            Some(standard) => format!("{FUNCTION_PREFIX}{}-one-and-only", standard.short_name()),
            None => format!("{}-one-and-only", datatype.id()),
        };
        Self { id, datatype }
    }
}

impl Function for OneAndOnlyFunction {
    fn id(&self) -> &str {
        &self.id
    }

    fn return_type(&self) -> Datatype {
        self.datatype.clone()
    }

    fn validate(&self, args: &[ExpressionRef]) -> Result<(), PolicyError> {
        match args {
            [arg] if arg.returns_bag() && arg.datatype() == self.datatype => Ok(()),
            _ => Err(PolicyError::InvalidExpression(format!(
                "{} expects one bag of {}",
                self.id, self.datatype
            ))),
        }
    }

    fn call(
        &self,
        args: &[ExpressionRef],
        context: Option<&mut EvaluationContext>,
    ) -> Result<Value, IndeterminateError> {
        let [arg] = args else {
            return Err(IndeterminateError::processing(format!(
                "{} expects 1 argument, got {}",
                self.id,
                args.len()
            )));
        };
        let value = eval_arg(arg, 0, context)?;
        Ok(Value::Single(value.as_bag()?.one_and_only()?.clone()))
    }
}
