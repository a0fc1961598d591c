//! Vendor-agnostic metrics collection via a pluggable sink.
//!
//! The library never talks to a metrics backend directly. Consumers implement
//! [`MetricsSink`] and install it once with [`set_sink`]; every rule
//! evaluation and every rule compilation is then reported to it.
//!
//! **Note:** This module is only available when the `observability` feature is enabled.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use treetop_xacml::metrics::{MetricsSink, RuleCompileStats, RuleEvaluationStats};
//!
//! #[derive(Default)]
//! struct Counter {
//!     evaluations: AtomicU64,
//! }
//!
//! impl MetricsSink for Counter {
//!     fn on_rule_evaluation(&self, _stats: &RuleEvaluationStats) {
//!         self.evaluations.fetch_add(1, Ordering::Relaxed);
//!     }
//!
//!     fn on_rule_compiled(&self, _stats: &RuleCompileStats) {}
//! }
//!
//! treetop_xacml::metrics::set_sink(Arc::new(Counter::default()));
//! ```

use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use strum_macros::Display;
use tracing::warn;

use crate::types::Decision;

/// Decision outcome without the extended effect detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
pub enum DecisionKind {
    Permit,
    Deny,
    NotApplicable,
    Indeterminate,
}

impl From<Decision> for DecisionKind {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Permit => Self::Permit,
            Decision::Deny => Self::Deny,
            Decision::NotApplicable => Self::NotApplicable,
            Decision::Indeterminate { .. } => Self::Indeterminate,
        }
    }
}

/// Snapshot of one rule evaluation, passed to [`MetricsSink::on_rule_evaluation`].
#[derive(Debug, Clone, Serialize)]
pub struct RuleEvaluationStats {
    pub rule_id: String,
    pub decision: DecisionKind,
    /// Wall-clock time spent in `RuleEvaluator::evaluate`.
    pub duration: Duration,
}

/// Per-phase timings of a rule evaluation, in milliseconds.
///
/// Phases that were not reached are zero.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleEvaluationPhases {
    pub target_ms: f64,
    pub condition_ms: f64,
    pub pep_actions_ms: f64,
    pub total_ms: f64,
}

impl RuleEvaluationPhases {
    /// Time not accounted for by the measured phases.
    pub fn overhead_ms(&self) -> f64 {
        self.total_ms - (self.target_ms + self.condition_ms + self.pep_actions_ms)
    }
}

/// Emitted once per compiled rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleCompileStats {
    pub rule_id: String,
    pub never_applicable: bool,
    /// Obligations and advice discarded because their effect differs from the rule's.
    pub discarded_pep_actions: usize,
}

/// Consumer of rule metrics.
///
/// Called synchronously on the evaluation path, possibly from many threads
/// at once, so implementations must not block.
pub trait MetricsSink: Send + Sync {
    fn on_rule_evaluation(&self, stats: &RuleEvaluationStats);

    fn on_rule_compiled(&self, stats: &RuleCompileStats);

    /// Optional breakdown by phase. Ignored by default.
    fn on_rule_evaluation_phases(
        &self,
        _stats: &RuleEvaluationStats,
        _phases: &RuleEvaluationPhases,
    ) {
    }
}

/// Used until [`set_sink`] is called.
struct NoOpSink;

impl MetricsSink for NoOpSink {
    fn on_rule_evaluation(&self, _stats: &RuleEvaluationStats) {}
    fn on_rule_compiled(&self, _stats: &RuleCompileStats) {}
}

static SINK: OnceLock<Arc<dyn MetricsSink>> = OnceLock::new();
static NO_OP: NoOpSink = NoOpSink;

fn sink() -> &'static dyn MetricsSink {
    match SINK.get() {
        Some(sink) => sink.as_ref(),
        None => &NO_OP,
    }
}

/// Install the global metrics sink.
///
/// Only the first call wins. Events emitted before it are dropped; later
/// calls are logged and ignored.
pub fn set_sink(sink: Arc<dyn MetricsSink>) {
    if SINK.set(sink).is_err() {
        warn!(
            event = "Metrics",
            phase = "SetSink",
            "Metrics sink was already initialized, ignoring set_sink"
        );
    }
}

pub(crate) fn record_rule_evaluation(stats: &RuleEvaluationStats, phases: &RuleEvaluationPhases) {
    let sink = sink();
    sink.on_rule_evaluation(stats);
    sink.on_rule_evaluation_phases(stats, phases);
}

pub(crate) fn record_rule_compiled(stats: RuleCompileStats) {
    sink().on_rule_compiled(&stats);
}
