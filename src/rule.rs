//! Rule compilation and evaluation.
//!
//! A [`RuleDefinition`] is what a policy loader produces. It is compiled once
//! into a [`RuleEvaluator`], which is immutable and shared by concurrent
//! requests. Evaluation never fails: every runtime error becomes an
//! `Indeterminate` decision carrying the rule's effect.

#[cfg(feature = "observability")]
use std::time::Instant;

use tracing::{debug, warn};

use crate::condition::Condition;
use crate::context::EvaluationContext;
use crate::error::PolicyError;
use crate::expression::ExpressionRef;
use crate::pep_expression::PepActionExpression;
use crate::policy_match::{MatchResult, Target};
use crate::timers::{PhaseTimer, RulePhaseDurations};
use crate::types::{DecisionResult, Effect, ExtendedEffect, PepActionKind};

/// A rule as read from a policy, before compilation.
#[derive(Debug, Clone)]
pub struct RuleDefinition {
    pub id: String,
    pub effect: Effect,
    pub description: Option<String>,
    pub target: Target,
    pub condition: Option<ExpressionRef>,
    pub pep_actions: Vec<PepActionExpression>,
}

impl RuleDefinition {
    /// A rule that applies to every request.
    pub fn new(id: impl Into<String>, effect: Effect) -> Self {
        Self {
            id: id.into(),
            effect,
            description: None,
            target: Target::match_all(),
            condition: None,
            pep_actions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn with_condition(mut self, condition: ExpressionRef) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Add an obligation or advice.
    pub fn with_pep_action(mut self, action: PepActionExpression) -> Self {
        self.pep_actions.push(action);
        self
    }
}

#[derive(Debug, Clone)]
enum RuleBody {
    Evaluable {
        target: Target,
        condition: Condition,
        pep_actions: Vec<PepActionExpression>,
    },
    /// The condition is constant false. Nothing is evaluated.
    NeverApplicable,
}

#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    id: String,
    effect: Effect,
    description: Option<String>,
    body: RuleBody,
    always_applicable: bool,
    has_any_pep_action: bool,
}

impl RuleEvaluator {
    pub fn compile(definition: RuleDefinition) -> Result<Self, PolicyError> {
        let RuleDefinition {
            id,
            effect,
            description,
            target,
            condition,
            pep_actions,
        } = definition;

        let declared = pep_actions.len();
        let pep_actions: Vec<PepActionExpression> = pep_actions
            .into_iter()
            .filter(|action| {
                let keep = action.applies_to() == effect;
                if !keep {
                    warn!(
                        event = "Rule",
                        phase = "Compile",
                        rule_id = %id,
                        action_id = action.action_id(),
                        kind = %action.kind(),
                        applies_to = %action.applies_to(),
                        "Ignoring PEP action whose effect differs from the rule effect"
                    );
                }
                keep
            })
            .collect();
        let discarded = declared - pep_actions.len();

        let body = match Condition::from_expression(condition) {
            Ok(condition) => RuleBody::Evaluable {
                target,
                condition,
                pep_actions,
            },
            Err(PolicyError::ConstantFalseCondition) => {
                warn!(
                    event = "Rule",
                    phase = "Compile",
                    rule_id = %id,
                    "Condition is always false, rule will never apply"
                );
                RuleBody::NeverApplicable
            }
            Err(e) => return Err(e),
        };

        let (always_applicable, has_any_pep_action) = match &body {
            RuleBody::Evaluable {
                target,
                condition,
                pep_actions,
            } => (
                target.is_match_all() && condition.is_always_true(),
                !pep_actions.is_empty(),
            ),
            RuleBody::NeverApplicable => (false, false),
        };

        debug!(
            event = "Rule",
            phase = "Compile",
            rule_id = %id,
            effect = %effect,
            always_applicable,
            has_any_pep_action,
            discarded_pep_actions = discarded
        );

        #[cfg(feature = "observability")]
        crate::metrics::record_rule_compiled(crate::metrics::RuleCompileStats {
            rule_id: id.clone(),
            never_applicable: matches!(body, RuleBody::NeverApplicable),
            discarded_pep_actions: discarded,
        });

        Ok(Self {
            id,
            effect,
            description,
            body,
            always_applicable,
            has_any_pep_action,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Target is match-all and the condition is always true.
    pub fn is_always_applicable(&self) -> bool {
        self.always_applicable
    }

    /// Obligations or advice remain after dropping those for the other effect.
    pub fn has_any_pep_action(&self) -> bool {
        self.has_any_pep_action
    }

    /// Behaves exactly like an unconditional Permit or Deny with no actions.
    pub fn is_empty_equivalent(&self) -> bool {
        self.always_applicable && !self.has_any_pep_action
    }

    pub fn is_never_applicable(&self) -> bool {
        matches!(self.body, RuleBody::NeverApplicable)
    }

    pub fn evaluate(&self, context: &mut EvaluationContext) -> DecisionResult {
        #[cfg(feature = "observability")]
        let start = Instant::now();

        let mut phases = RulePhaseDurations::default();
        let result = match &self.body {
            RuleBody::NeverApplicable => DecisionResult::not_applicable(),
            RuleBody::Evaluable {
                target,
                condition,
                pep_actions,
            } => self.decide(target, condition, pep_actions, context, &mut phases),
        };

        debug!(
            event = "Rule",
            phase = "Decision",
            rule_id = %self.id,
            decision = %result.decision(),
            target_us = phases.target.as_micros() as u64,
            condition_us = phases.condition.as_micros() as u64,
            pep_actions_us = phases.pep_actions.as_micros() as u64
        );

        #[cfg(feature = "observability")]
        {
            let duration = start.elapsed();
            crate::metrics::record_rule_evaluation(
                &crate::metrics::RuleEvaluationStats {
                    rule_id: self.id.clone(),
                    decision: result.decision().into(),
                    duration,
                },
                &crate::metrics::RuleEvaluationPhases {
                    target_ms: phases.target.as_secs_f64() * 1_000.0,
                    condition_ms: phases.condition.as_secs_f64() * 1_000.0,
                    pep_actions_ms: phases.pep_actions.as_secs_f64() * 1_000.0,
                    total_ms: duration.as_secs_f64() * 1_000.0,
                },
            );
        }

        result
    }

    fn decide(
        &self,
        target: &Target,
        condition: &Condition,
        pep_actions: &[PepActionExpression],
        context: &mut EvaluationContext,
        phases: &mut RulePhaseDurations,
    ) -> DecisionResult {
        let extended = ExtendedEffect::from(self.effect);

        let matched = {
            let _timer = PhaseTimer::new(&mut phases.target);
            target.evaluate(context)
        };
        match matched {
            MatchResult::Match => {}
            MatchResult::NoMatch => return DecisionResult::not_applicable(),
            MatchResult::Indeterminate(e) => {
                debug!(event = "Rule", phase = "Target", rule_id = %self.id, error = %e);
                return DecisionResult::indeterminate(
                    extended,
                    &e.wrap(format!("Error evaluating Target of Rule '{}'", self.id)),
                );
            }
        }

        let holds = {
            let _timer = PhaseTimer::new(&mut phases.condition);
            condition.evaluate(context)
        };
        match holds {
            Ok(true) => {}
            Ok(false) => return DecisionResult::not_applicable(),
            Err(e) => {
                debug!(event = "Rule", phase = "Condition", rule_id = %self.id, error = %e);
                return DecisionResult::indeterminate(
                    extended,
                    &e.wrap(format!("Error evaluating Condition of Rule '{}'", self.id)),
                );
            }
        }

        let _timer = PhaseTimer::new(&mut phases.pep_actions);
        let mut obligations = Vec::new();
        let mut advice = Vec::new();
        for action in pep_actions {
            match action.evaluate(context) {
                Ok(evaluated) => match evaluated.kind() {
                    PepActionKind::Obligation => obligations.push(evaluated),
                    PepActionKind::Advice => advice.push(evaluated),
                },
                Err(e) => {
                    debug!(event = "Rule", phase = "PepActions", rule_id = %self.id, error = %e);
                    return DecisionResult::indeterminate(
                        extended,
                        &e.wrap(format!(
                            "Error evaluating obligations/advice of Rule '{}'",
                            self.id
                        )),
                    );
                }
            }
        }
        DecisionResult::simple(self.effect, obligations, advice)
    }
}
