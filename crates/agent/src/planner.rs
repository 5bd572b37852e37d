//! Planner: goal + condensed history + capability catalog → new Plan.
//!
//! Every plan it returns has contiguous step ids, only names catalogued
//! capabilities, and carries inputs that validate against each capability's
//! parameter list. Anything else is rejected and corrected through the
//! oracle's retry loop.

use planloop_core::error::ProviderError;
use planloop_core::plan::{HistoryEntry, Plan};
use planloop_core::tool::CapabilitySpec;
use tracing::{info, warn};

use crate::oracle::{OracleError, StructuredOracle};
use crate::prompt;

/// Why no plan was produced.
#[derive(Debug, thiserror::Error)]
pub enum PlanningFailure {
    /// The oracle never produced a usable plan.
    #[error("could not parse a valid plan after {attempts} attempt(s): {reason}")]
    Unparsable { attempts: u32, reason: String },

    /// The oracle returned a plan without steps.
    #[error("the planner returned an empty plan")]
    Empty,

    /// The oracle could not be reached. Aborts the session.
    #[error("the reasoning service is unavailable: {0}")]
    OracleUnavailable(ProviderError),
}

pub struct Planner {
    oracle: StructuredOracle,
    max_attempts: u32,
    history_result_chars: usize,
}

impl Planner {
    pub fn new(oracle: StructuredOracle) -> Self {
        Self {
            oracle,
            max_attempts: 3,
            history_result_chars: 200,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_history_result_chars(mut self, chars: usize) -> Self {
        self.history_result_chars = chars;
        self
    }

    /// Produce a complete new plan for `goal`.
    pub async fn plan(
        &self,
        goal: &str,
        history: &[HistoryEntry],
        catalog: &[CapabilitySpec],
    ) -> Result<Plan, PlanningFailure> {
        let condensed = prompt::condense_history(history, self.history_result_chars);
        let user_prompt = prompt::planner(goal, catalog, &condensed);

        let result = self
            .oracle
            .call(prompt::PLANNER_SYSTEM, &user_prompt, self.max_attempts, |plan: Plan| {
                validate_plan(plan, catalog)
            })
            .await;

        let mut plan = match result {
            Ok(plan) => plan,
            Err(OracleError::Unavailable(e)) => {
                warn!(error = %e, "Planner could not reach the oracle");
                return Err(PlanningFailure::OracleUnavailable(e));
            }
            Err(OracleError::Unparsable { attempts, reason }) => {
                warn!(attempts, reason = %reason, "Planner gave up on unparsable output");
                return Err(PlanningFailure::Unparsable { attempts, reason });
            }
        };

        if plan.is_empty() {
            warn!("Planner returned a plan without steps");
            return Err(PlanningFailure::Empty);
        }

        plan.goal = goal.to_string();
        for step in &mut plan.steps {
            step.reset_outcome();
        }

        info!(
            steps = plan.len(),
            tools = ?plan.steps.iter().map(|s| s.tool_name.as_str()).collect::<Vec<_>>(),
            "Plan generated"
        );
        Ok(plan)
    }
}

/// Check a parsed plan against the catalog.
pub fn validate_plan(plan: Plan, catalog: &[CapabilitySpec]) -> Result<Plan, String> {
    plan.validate_shape()?;
    for step in &plan.steps {
        let spec = catalog
            .iter()
            .find(|c| c.name == step.tool_name)
            .ok_or_else(|| {
                format!(
                    "step {} uses unknown tool '{}' (available: {})",
                    step.step_id,
                    step.tool_name,
                    catalog
                        .iter()
                        .map(|c| c.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })?;
        spec.validate_input(&step.tool_input)
            .map_err(|e| format!("step {}: {e}", step.step_id))?;
    }
    Ok(plan)
}
