//! Per-query session state.
//!
//! A [`Session`] is created once per user goal and owned by the task running
//! the loop. Its history is append-only: [`Session::push`] is the only way
//! in, and nothing is ever removed.

use crate::plan::{HistoryEntry, Plan, Reflection, Step};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// A reflection declared the whole goal satisfied.
    GoalSatisfied,
    /// Every step of the current plan ran and the last one was judged useful.
    PlanCompleted,
    /// No plan, or a plan without steps.
    EmptyPlan,
    /// Too many failed step executions.
    ErrorBudgetExhausted,
    /// The orchestrator's hard iteration ceiling was reached.
    IterationCeiling,
    /// The oracle could not be reached while planning.
    OracleUnavailable,
    /// The progress receiver went away.
    Cancelled,
    /// The goal was answered without planning (conversation or refusal).
    AnsweredDirectly,
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::GoalSatisfied => "goal satisfied",
            Self::PlanCompleted => "plan completed",
            Self::EmptyPlan => "empty plan",
            Self::ErrorBudgetExhausted => "error budget exhausted",
            Self::IterationCeiling => "iteration ceiling reached",
            Self::OracleUnavailable => "oracle unavailable",
            Self::Cancelled => "cancelled",
            Self::AnsweredDirectly => "answered directly",
        };
        f.write_str(s)
    }
}

/// Explicit loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "reason", rename_all = "snake_case")]
pub enum LoopPhase {
    Planning,
    Executing,
    Reflecting,
    Deciding,
    Done(FinishReason),
}

impl LoopPhase {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    initial_query: String,
    plan: Option<Plan>,
    history: Vec<HistoryEntry>,
    error_count: u32,
    cursor: usize,
    final_answer: Option<String>,
    phase: LoopPhase,
}

impl Session {
    pub fn new(initial_query: impl Into<String>) -> Self {
        Self {
            initial_query: initial_query.into(),
            plan: None,
            history: Vec::new(),
            error_count: 0,
            cursor: 1,
            final_answer: None,
            phase: LoopPhase::Planning,
        }
    }

    pub fn initial_query(&self) -> &str {
        &self.initial_query
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    /// Replace the current plan wholesale and rewind the cursor to step 1.
    pub fn replace_plan(&mut self, plan: Option<Plan>) {
        self.plan = plan;
        self.cursor = 1;
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Append one entry to the history.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    /// Write an executed step's outcome back into the plan and append the
    /// step to history. The planned input is left as planned.
    ///
    /// This is the only place `error_count` grows.
    pub fn record_step(&mut self, step: Step) {
        if !step.is_success {
            self.error_count += 1;
        }
        if let Some(slot) = self
            .plan
            .as_mut()
            .and_then(|plan| plan.step_mut(step.step_id))
        {
            slot.result = step.result.clone();
            slot.is_success = step.is_success;
            slot.error_message = step.error_message.clone();
        }
        self.history.push(HistoryEntry::Step(step));
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Next step_id to execute.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn advance_cursor(&mut self) {
        self.cursor += 1;
    }

    /// The step under the cursor, if the plan has one there.
    pub fn current_step(&self) -> Option<&Step> {
        self.plan.as_ref().and_then(|p| p.step(self.cursor))
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    pub fn set_final_answer(&mut self, answer: impl Into<String>) {
        self.final_answer = Some(answer.into());
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: LoopPhase) {
        self.phase = phase;
    }

    /// Result of the most recent successful step, however far back.
    pub fn last_successful_result(&self) -> Option<&Value> {
        self.history
            .iter()
            .rev()
            .filter_map(HistoryEntry::as_step)
            .find(|s| s.is_success)
            .and_then(|s| s.result.as_ref())
    }

    pub fn last_reflection(&self) -> Option<&Reflection> {
        self.history
            .iter()
            .rev()
            .find_map(HistoryEntry::as_reflection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Action, ActionType};
    use serde_json::json;

    fn two_step_plan() -> Plan {
        Plan::new(
            "goal",
            vec![
                Step::new(1, "a", json!({}), ""),
                Step::new(2, "b", json!({}), ""),
            ],
        )
    }

    #[test]
    fn new_session_starts_planning() {
        let session = Session::new("find papers");
        assert_eq!(session.initial_query(), "find papers");
        assert_eq!(session.phase(), LoopPhase::Planning);
        assert_eq!(session.cursor(), 1);
        assert!(session.plan().is_none());
        assert!(session.history().is_empty());
    }

    #[test]
    fn record_step_counts_failures_only() {
        let mut session = Session::new("g");
        session.replace_plan(Some(two_step_plan()));

        let mut ok = Step::new(1, "a", json!({}), "");
        ok.succeed(json!("r1"));
        session.record_step(ok);
        assert_eq!(session.error_count(), 0);

        let mut bad = Step::new(2, "b", json!({}), "");
        bad.fail("nope", None);
        session.record_step(bad);
        assert_eq!(session.error_count(), 1);
        assert_eq!(session.history().len(), 2);

        let plan = session.plan().unwrap();
        assert!(plan.step(1).unwrap().is_success);
        assert_eq!(plan.step(2).unwrap().error_message.as_deref(), Some("nope"));
    }

    #[test]
    fn history_grows_by_one_per_push() {
        let mut session = Session::new("g");
        session.push(HistoryEntry::Action(Action::new(ActionType::Proceed, "")));
        assert_eq!(session.history().len(), 1);
        session.push(HistoryEntry::Reflection(Reflection::fallback(&Step::new(
            1,
            "a",
            json!({}),
            "",
        ))));
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn last_successful_result_skips_failures() {
        let mut session = Session::new("g");
        let mut first = Step::new(1, "a", json!({}), "");
        first.succeed(json!(["Paper A"]));
        session.record_step(first);
        let mut second = Step::new(2, "b", json!({}), "");
        second.fail("down", Some(json!("error occurred: down")));
        session.record_step(second);

        assert_eq!(session.last_successful_result(), Some(&json!(["Paper A"])));
    }

    #[test]
    fn replace_plan_rewinds_cursor() {
        let mut session = Session::new("g");
        session.replace_plan(Some(two_step_plan()));
        session.advance_cursor();
        assert_eq!(session.current_step().map(|s| s.step_id), Some(2));
        session.replace_plan(Some(two_step_plan()));
        assert_eq!(session.cursor(), 1);
        session.replace_plan(None);
        assert!(session.current_step().is_none());
    }

    #[test]
    fn phase_serializes_with_reason() {
        let json = serde_json::to_value(LoopPhase::Done(FinishReason::ErrorBudgetExhausted))
            .unwrap();
        assert_eq!(json["phase"], "done");
        assert_eq!(json["reason"], "error_budget_exhausted");
        assert!(LoopPhase::Done(FinishReason::EmptyPlan).is_done());
        assert!(!LoopPhase::Executing.is_done());
    }
}
