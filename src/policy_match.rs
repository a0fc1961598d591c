//! Target matching with three-valued results.
//!
//! A [`Target`] is a conjunction of [`AnyOf`]s, an `AnyOf` a disjunction of
//! [`AllOf`]s and an `AllOf` a conjunction of [`Match`]es. Failures are
//! values of [`MatchResult`], never errors, so that each level can decide
//! how an undecided child combines with its siblings.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::context::EvaluationContext;
use crate::error::{IndeterminateError, PolicyError};
use crate::expression::{CompiledExpression, ExpressionRef};
use crate::functions::MatchFunctionRef;
use crate::types::AttributeValue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Match,
    NoMatch,
    Indeterminate(IndeterminateError),
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

impl Display for MatchResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Match => write!(f, "MATCH"),
            Self::NoMatch => write!(f, "NO_MATCH"),
            Self::Indeterminate(e) => write!(f, "INDETERMINATE({e})"),
        }
    }
}

/// Compares a policy literal with every value of an attribute bag.
#[derive(Debug, Clone)]
pub struct Match {
    function: MatchFunctionRef,
    literal: AttributeValue,
    expression: ExpressionRef,
}

impl Match {
    /// Type-checks the operands and folds a constant attribute expression.
    pub fn new(
        function: MatchFunctionRef,
        literal: AttributeValue,
        expression: ExpressionRef,
    ) -> Result<Self, PolicyError> {
        let (literal_type, value_type) = function.param_types();
        if !expression.returns_bag() {
            return Err(PolicyError::InvalidMatch(format!(
                "{}: attribute expression must return a bag",
                function.id()
            )));
        }
        if literal.datatype() != literal_type {
            return Err(PolicyError::InvalidMatch(format!(
                "{}: literal '{literal}' is {}, expected {literal_type}",
                function.id(),
                literal.datatype()
            )));
        }
        if expression.datatype() != value_type {
            return Err(PolicyError::InvalidMatch(format!(
                "{}: attribute bag is {}, expected {value_type}",
                function.id(),
                expression.datatype()
            )));
        }
        let expression: ExpressionRef = Arc::new(CompiledExpression::new(expression)?);
        Ok(Self {
            function,
            literal,
            expression,
        })
    }

    pub fn function_id(&self) -> &str {
        self.function.id()
    }

    pub fn evaluate(&self, context: &mut EvaluationContext) -> MatchResult {
        let bag = match self
            .expression
            .evaluate(Some(context))
            .and_then(|value| value.as_bag().cloned())
        {
            Ok(bag) => bag,
            Err(e) => {
                return MatchResult::Indeterminate(e.wrap(format!(
                    "Error evaluating attribute of Match[{}]",
                    self.function.id()
                )));
            }
        };

        let mut first_error = None;
        for value in &bag {
            match self.function.matches(&self.literal, value) {
                Ok(true) => return MatchResult::Match,
                Ok(false) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => MatchResult::Indeterminate(
                e.wrap(format!("Error evaluating Match[{}]", self.function.id())),
            ),
            None => MatchResult::NoMatch,
        }
    }
}

/// Conjunction of matches; a single non-match decides the result.
#[derive(Debug, Clone)]
pub struct AllOf {
    matches: Vec<Match>,
}

impl AllOf {
    pub fn new(matches: Vec<Match>) -> Result<Self, PolicyError> {
        if matches.is_empty() {
            return Err(PolicyError::InvalidTarget(
                "AllOf must contain at least one Match".to_string(),
            ));
        }
        Ok(Self { matches })
    }

    /// Every child is evaluated. The last `NO_MATCH`, or else the last
    /// `INDETERMINATE`, is returned.
    pub fn evaluate(&self, context: &mut EvaluationContext) -> MatchResult {
        let mut no_match = None;
        let mut indeterminate = None;
        for m in &self.matches {
            match m.evaluate(context) {
                MatchResult::Match => {}
                MatchResult::NoMatch => no_match = Some(MatchResult::NoMatch),
                result @ MatchResult::Indeterminate(_) => indeterminate = Some(result),
            }
        }
        no_match.or(indeterminate).unwrap_or(MatchResult::Match)
    }
}

/// Disjunction of `AllOf`s.
#[derive(Debug, Clone)]
pub struct AnyOf {
    all_ofs: Vec<AllOf>,
}

impl AnyOf {
    pub fn new(all_ofs: Vec<AllOf>) -> Result<Self, PolicyError> {
        if all_ofs.is_empty() {
            return Err(PolicyError::InvalidTarget(
                "AnyOf must contain at least one AllOf".to_string(),
            ));
        }
        Ok(Self { all_ofs })
    }

    /// First `MATCH` wins; otherwise the first `INDETERMINATE`.
    pub fn evaluate(&self, context: &mut EvaluationContext) -> MatchResult {
        let mut first_indeterminate = None;
        for all_of in &self.all_ofs {
            match all_of.evaluate(context) {
                MatchResult::Match => return MatchResult::Match,
                MatchResult::NoMatch => {}
                result @ MatchResult::Indeterminate(_) => {
                    first_indeterminate.get_or_insert(result);
                }
            }
        }
        first_indeterminate.unwrap_or(MatchResult::NoMatch)
    }
}

/// Conjunction of `AnyOf`s. An empty target matches every request.
#[derive(Debug, Clone, Default)]
pub struct Target {
    any_ofs: Vec<AnyOf>,
}

impl Target {
    pub fn new(any_ofs: Vec<AnyOf>) -> Self {
        Self { any_ofs }
    }

    pub fn match_all() -> Self {
        Self::default()
    }

    pub fn is_match_all(&self) -> bool {
        self.any_ofs.is_empty()
    }

    /// Stops at the first child that does not match.
    pub fn evaluate(&self, context: &mut EvaluationContext) -> MatchResult {
        for (index, any_of) in self.any_ofs.iter().enumerate() {
            match any_of.evaluate(context) {
                MatchResult::Match => {}
                MatchResult::NoMatch => return MatchResult::NoMatch,
                MatchResult::Indeterminate(e) => {
                    return MatchResult::Indeterminate(
                        e.wrap(format!("Error evaluating Target AnyOf #{index}")),
                    );
                }
            }
        }
        MatchResult::Match
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proptest::prelude::*;

    use crate::context::{AttributeFqn, CATEGORY_RESOURCE, CATEGORY_SUBJECT};
    use crate::expression::{AttributeDesignator, Expression, Literal, Value};
    use crate::functions::{EqualFunction, MatchFunction};
    use crate::types::{Bag, BagSource, Datatype, StatusCode};

    /// Literal "match", "no-match" or "error" decides the comparison result.
    #[derive(Debug)]
    struct Scripted;

    impl MatchFunction for Scripted {
        fn id(&self) -> &str {
            "urn:test:scripted"
        }

        fn param_types(&self) -> (Datatype, Datatype) {
            (Datatype::STRING, Datatype::STRING)
        }

        fn matches(
            &self,
            literal: &AttributeValue,
            _: &AttributeValue,
        ) -> Result<bool, IndeterminateError> {
            match literal.as_str() {
                Some("match") => Ok(true),
                Some("no-match") => Ok(false),
                _ => Err(IndeterminateError::processing("scripted failure")),
            }
        }
    }

    #[derive(Debug)]
    struct OneValueBag;

    impl Expression for OneValueBag {
        fn datatype(&self) -> Datatype {
            Datatype::STRING
        }

        fn returns_bag(&self) -> bool {
            true
        }

        fn evaluate(&self, _: Option<&mut EvaluationContext>) -> Result<Value, IndeterminateError> {
            Ok(Value::Bag(Bag::singleton("x".into(), BagSource::Request)))
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Outcome {
        Match,
        NoMatch,
        Indeterminate,
    }

    impl Outcome {
        fn of(result: &MatchResult) -> Self {
            match result {
                MatchResult::Match => Self::Match,
                MatchResult::NoMatch => Self::NoMatch,
                MatchResult::Indeterminate(_) => Self::Indeterminate,
            }
        }
    }

    fn outcome() -> impl Strategy<Value = Outcome> {
        prop_oneof![
            Just(Outcome::Match),
            Just(Outcome::NoMatch),
            Just(Outcome::Indeterminate),
        ]
    }

    fn scripted(outcome: Outcome) -> Match {
        let literal = match outcome {
            Outcome::Match => "match",
            Outcome::NoMatch => "no-match",
            Outcome::Indeterminate => "error",
        };
        Match::new(Arc::new(Scripted), literal.into(), Arc::new(OneValueBag)).unwrap()
    }

    fn all_of(outcome: Outcome) -> AllOf {
        AllOf::new(vec![scripted(outcome)]).unwrap()
    }

    fn any_of(outcome: Outcome) -> AnyOf {
        AnyOf::new(vec![all_of(outcome)]).unwrap()
    }

    fn role_designator() -> ExpressionRef {
        Arc::new(AttributeDesignator::new(
            AttributeFqn::new(CATEGORY_SUBJECT, "role"),
            Datatype::STRING,
        ))
    }

    fn role_equals(role: &str) -> Match {
        Match::new(
            Arc::new(EqualFunction::new(Datatype::STRING)),
            role.into(),
            role_designator(),
        )
        .unwrap()
    }

    fn context_with_roles(roles: &[&str]) -> EvaluationContext {
        let values = roles.iter().map(|r| AttributeValue::from(*r)).collect();
        EvaluationContext::new().with_attribute(
            AttributeFqn::new(CATEGORY_SUBJECT, "role"),
            Bag::new(Datatype::STRING, values, BagSource::Request).unwrap(),
        )
    }

    #[test]
    fn test_match_any_bag_element() {
        let m = role_equals("admin");
        assert_eq!(
            m.evaluate(&mut context_with_roles(&["user", "admin"])),
            MatchResult::Match
        );
        assert_eq!(
            m.evaluate(&mut context_with_roles(&["user"])),
            MatchResult::NoMatch
        );
        assert_eq!(
            m.evaluate(&mut context_with_roles(&[])),
            MatchResult::NoMatch
        );
    }

    #[test]
    fn test_match_attribute_failure_is_indeterminate() {
        let designator: ExpressionRef = Arc::new(
            AttributeDesignator::new(AttributeFqn::new(CATEGORY_SUBJECT, "role"), Datatype::STRING)
                .must_be_present(),
        );
        let m = Match::new(
            Arc::new(EqualFunction::new(Datatype::STRING)),
            "admin".into(),
            designator,
        )
        .unwrap();
        let MatchResult::Indeterminate(e) = m.evaluate(&mut EvaluationContext::new()) else {
            panic!("expected indeterminate");
        };
        assert_eq!(e.code(), StatusCode::MissingAttribute);
        assert!(e.message().contains("Match[urn:oasis:names:tc:xacml:1.0:function:string-equal]"));
    }

    #[test]
    fn test_match_construction_is_type_checked() {
        let equal = Arc::new(EqualFunction::new(Datatype::STRING));
        let literal: ExpressionRef = Arc::new(Literal::new("admin".into()));
        assert!(matches!(
            Match::new(equal.clone(), "admin".into(), literal),
            Err(PolicyError::InvalidMatch(_))
        ));
        assert!(matches!(
            Match::new(equal.clone(), true.into(), role_designator()),
            Err(PolicyError::InvalidMatch(_))
        ));
        let resource_ids: ExpressionRef = Arc::new(AttributeDesignator::new(
            AttributeFqn::new(CATEGORY_RESOURCE, "id"),
            Datatype::ANY_URI,
        ));
        assert!(matches!(
            Match::new(equal, "admin".into(), resource_ids),
            Err(PolicyError::InvalidMatch(_))
        ));
    }

    #[test]
    fn test_match_keeps_first_comparison_failure() {
        #[derive(Debug)]
        struct FailsOnValue;

        impl MatchFunction for FailsOnValue {
            fn id(&self) -> &str {
                "urn:test:fails-on-value"
            }

            fn param_types(&self) -> (Datatype, Datatype) {
                (Datatype::STRING, Datatype::STRING)
            }

            fn matches(
                &self,
                _: &AttributeValue,
                value: &AttributeValue,
            ) -> Result<bool, IndeterminateError> {
                Err(IndeterminateError::processing(format!("bad {value}")))
            }
        }

        let m = Match::new(Arc::new(FailsOnValue), "x".into(), role_designator()).unwrap();
        let MatchResult::Indeterminate(e) = m.evaluate(&mut context_with_roles(&["a", "b"])) else {
            panic!("expected indeterminate");
        };
        assert_eq!(e.cause().unwrap().message(), "bad a");
    }

    #[test]
    fn test_constant_attribute_bag_is_evaluated_once() {
        #[derive(Debug, Default)]
        struct CountingBag {
            calls: AtomicUsize,
        }

        impl Expression for CountingBag {
            fn datatype(&self) -> Datatype {
                Datatype::STRING
            }

            fn returns_bag(&self) -> bool {
                true
            }

            fn evaluate(
                &self,
                _: Option<&mut EvaluationContext>,
            ) -> Result<Value, IndeterminateError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Bag(Bag::singleton("admin".into(), BagSource::Computed)))
            }
        }

        let bag = Arc::new(CountingBag::default());
        let m = Match::new(
            Arc::new(EqualFunction::new(Datatype::STRING)),
            "admin".into(),
            bag.clone() as ExpressionRef,
        )
        .unwrap();
        assert_eq!(bag.calls.load(Ordering::SeqCst), 1);
        for _ in 0..5 {
            assert_eq!(m.evaluate(&mut EvaluationContext::new()), MatchResult::Match);
        }
        assert_eq!(bag.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_containers_are_rejected() {
        assert_eq!(
            AnyOf::new(vec![]).unwrap_err(),
            PolicyError::InvalidTarget("AnyOf must contain at least one AllOf".to_string())
        );
        assert!(matches!(
            AllOf::new(vec![]),
            Err(PolicyError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_empty_target_matches() {
        let target = Target::match_all();
        assert!(target.is_match_all());
        assert!(target.evaluate(&mut EvaluationContext::new()).is_match());
    }

    #[test]
    fn test_target_indeterminate_before_no_match() {
        let target = Target::new(vec![
            any_of(Outcome::Indeterminate),
            any_of(Outcome::NoMatch),
        ]);
        assert_eq!(
            Outcome::of(&target.evaluate(&mut EvaluationContext::new())),
            Outcome::Indeterminate
        );

        let reversed = Target::new(vec![
            any_of(Outcome::NoMatch),
            any_of(Outcome::Indeterminate),
        ]);
        assert_eq!(
            reversed.evaluate(&mut EvaluationContext::new()),
            MatchResult::NoMatch
        );
    }

    proptest! {
        #[test]
        fn prop_all_of_no_match_dominates(outcomes in prop::collection::vec(outcome(), 1..8)) {
            let all_of = AllOf::new(outcomes.iter().map(|o| scripted(*o)).collect()).unwrap();
            let result = Outcome::of(&all_of.evaluate(&mut EvaluationContext::new()));
            let expected = if outcomes.contains(&Outcome::NoMatch) {
                Outcome::NoMatch
            } else if outcomes.contains(&Outcome::Indeterminate) {
                Outcome::Indeterminate
            } else {
                Outcome::Match
            };
            prop_assert_eq!(result, expected);
        }

        #[test]
        fn prop_any_of_match_wins(outcomes in prop::collection::vec(outcome(), 1..8)) {
            let any_of = AnyOf::new(outcomes.iter().map(|o| all_of(*o)).collect()).unwrap();
            let result = Outcome::of(&any_of.evaluate(&mut EvaluationContext::new()));
            let expected = if outcomes.contains(&Outcome::Match) {
                Outcome::Match
            } else if outcomes.contains(&Outcome::Indeterminate) {
                Outcome::Indeterminate
            } else {
                Outcome::NoMatch
            };
            prop_assert_eq!(result, expected);
        }

        #[test]
        fn prop_target_returns_first_non_match(outcomes in prop::collection::vec(outcome(), 0..8)) {
            let target = Target::new(outcomes.iter().map(|o| any_of(*o)).collect());
            let result = Outcome::of(&target.evaluate(&mut EvaluationContext::new()));
            let expected = outcomes
                .iter()
                .copied()
                .find(|o| *o != Outcome::Match)
                .unwrap_or(Outcome::Match);
            prop_assert_eq!(result, expected);
        }
    }
}
