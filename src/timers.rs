//! RAII phase timing for rule evaluation.

use std::time::{Duration, Instant};

/// Adds the time between creation and drop to `slot`.
///
/// Early returns inside the measured scope are still counted.
///
/// ```rust,ignore
/// let mut condition = Duration::ZERO;
/// let holds = {
///     let _timer = PhaseTimer::new(&mut condition);
///     rule_condition.evaluate(&mut ctx)
/// };
/// ```
pub(crate) struct PhaseTimer<'a> {
    start: Instant,
    slot: &'a mut Duration,
}

impl<'a> PhaseTimer<'a> {
    pub(crate) fn new(slot: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            slot,
        }
    }
}

impl Drop for PhaseTimer<'_> {
    fn drop(&mut self) {
        *self.slot += self.start.elapsed();
    }
}

/// Durations of the phases of one rule evaluation.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct RulePhaseDurations {
    pub(crate) target: Duration,
    pub(crate) condition: Duration,
    pub(crate) pep_actions: Duration,
}
