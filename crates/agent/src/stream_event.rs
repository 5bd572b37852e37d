//! Progress events emitted while a session runs.
//!
//! `ProgressEvent` is what [`Orchestrator::run_stream`](crate::Orchestrator::run_stream)
//! sends over its channel. Events serialize as tagged JSON objects so the
//! CLI can print them as JSON lines:
//! - `intent_classified` — routing verdict, when routing is enabled
//! - `plan_created`      — a new plan (initial or replanned)
//! - `step_result`       — one executed step
//! - `reflection`        — the judgment on that step
//! - `decision`          — the control decision taken next
//! - `final_answer`      — the session is over
//! - `error`             — a non-fatal problem worth surfacing

use planloop_core::plan::{ActionType, Plan};
use planloop_core::session::FinishReason;
use serde::{Deserialize, Serialize};

use crate::router::Intent;

/// One line of a plan summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub step_id: usize,
    pub tool_name: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    IntentClassified {
        intent: Intent,
    },

    PlanCreated {
        goal: String,
        steps: Vec<PlannedStep>,
    },

    StepResult {
        step_id: usize,
        tool_name: String,
        success: bool,
        /// Rendered result, truncated.
        output: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    Reflection {
        step_id: usize,
        is_success: bool,
        confidence: f64,
        critique: String,
    },

    Decision {
        action: ActionType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step_id: Option<usize>,
        reasoning: String,
    },

    FinalAnswer {
        answer: String,
        reason: FinishReason,
        iterations: u32,
    },

    Error {
        message: String,
    },
}

impl ProgressEvent {
    pub fn plan_created(plan: &Plan) -> Self {
        Self::PlanCreated {
            goal: plan.goal.clone(),
            steps: plan
                .steps
                .iter()
                .map(|s| PlannedStep {
                    step_id: s.step_id,
                    tool_name: s.tool_name.clone(),
                    reasoning: s.reasoning.clone(),
                })
                .collect(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::IntentClassified { .. } => "intent_classified",
            Self::PlanCreated { .. } => "plan_created",
            Self::StepResult { .. } => "step_result",
            Self::Reflection { .. } => "reflection",
            Self::Decision { .. } => "decision",
            Self::FinalAnswer { .. } => "final_answer",
            Self::Error { .. } => "error",
        }
    }
}
