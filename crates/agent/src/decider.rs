//! Decider: the control state machine's transition function.
//!
//! A pure function of the plan, the history and the error count. Rules are
//! evaluated in strict priority order:
//!
//! 1. no plan, or an empty plan → finish
//! 2. error budget reached → finish
//! 3. no reflection yet → finish when every step ran, else continue
//! 4. last reflection says the goal is satisfied → finish
//! 5. useful step with enough confidence → finish when every step ran,
//!    else continue
//! 6. otherwise → replan (or one corrected retry, when enabled)

use planloop_config::AgentConfig;
use planloop_core::plan::{ActionType, HistoryEntry, Plan};
use planloop_core::session::FinishReason;
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    pub max_error_budget: u32,
    pub confidence_threshold: f64,
    pub allow_retry: bool,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            max_error_budget: 3,
            confidence_threshold: 0.6,
            allow_retry: false,
        }
    }
}

impl From<&AgentConfig> for DecisionPolicy {
    fn from(config: &AgentConfig) -> Self {
        Self {
            max_error_budget: config.max_error_budget,
            confidence_threshold: config.confidence_threshold,
            allow_retry: config.allow_retry,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Finish(FinishReason),
    Replan,
    ContinueExecute,
    /// Re-run the current step with this input.
    Retry(Map<String, Value>),
}

impl Decision {
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Finish(_) => ActionType::Finish,
            Self::Replan => ActionType::Replan,
            Self::ContinueExecute => ActionType::Proceed,
            Self::Retry(_) => ActionType::Retry,
        }
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Self::Finish(_))
    }
}

/// Entries recorded against the current plan: everything after the most
/// recent REPLAN decision.
fn current_plan_entries(history: &[HistoryEntry]) -> &[HistoryEntry] {
    let start = history
        .iter()
        .rposition(|e| {
            e.as_action()
                .is_some_and(|a| a.action_type == ActionType::Replan)
        })
        .map(|i| i + 1)
        .unwrap_or(0);
    &history[start..]
}

/// Number of distinct step positions executed against the current plan.
pub fn executed_steps(history: &[HistoryEntry]) -> usize {
    current_plan_entries(history)
        .iter()
        .filter_map(HistoryEntry::as_step)
        .map(|s| s.step_id)
        .collect::<HashSet<_>>()
        .len()
}

fn already_retried(history: &[HistoryEntry], step_id: usize) -> bool {
    current_plan_entries(history).iter().any(|e| {
        e.as_action()
            .is_some_and(|a| a.action_type == ActionType::Retry && a.step_id == Some(step_id))
    })
}

pub fn decide(
    plan: Option<&Plan>,
    history: &[HistoryEntry],
    error_count: u32,
    policy: &DecisionPolicy,
) -> Decision {
    let Some(plan) = plan.filter(|p| !p.is_empty()) else {
        return Decision::Finish(FinishReason::EmptyPlan);
    };

    if error_count >= policy.max_error_budget {
        return Decision::Finish(FinishReason::ErrorBudgetExhausted);
    }

    let executed = executed_steps(history);
    let complete_or_continue = if executed >= plan.len() {
        Decision::Finish(FinishReason::PlanCompleted)
    } else {
        Decision::ContinueExecute
    };

    let Some(reflection) = history.iter().rev().find_map(HistoryEntry::as_reflection) else {
        return complete_or_continue;
    };

    if reflection.is_finished {
        return Decision::Finish(FinishReason::GoalSatisfied);
    }

    if reflection.is_success && reflection.confidence >= policy.confidence_threshold {
        return complete_or_continue;
    }

    if policy.allow_retry {
        if let Some(corrected) = &reflection.corrected_input {
            if !already_retried(history, reflection.step_id) {
                return Decision::Retry(corrected.clone());
            }
        }
    }

    Decision::Replan
}
