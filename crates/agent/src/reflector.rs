//! Reflector: judges whether the last step's outcome serves the goal.

use planloop_core::plan::{HistoryEntry, Reflection, Step};
use planloop_core::session::Session;
use tracing::{info, warn};

use crate::oracle::StructuredOracle;
use crate::prompt;

pub struct Reflector {
    oracle: StructuredOracle,
    max_attempts: u32,
}

impl Reflector {
    pub fn new(oracle: StructuredOracle) -> Self {
        Self {
            oracle,
            max_attempts: 1,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Produce exactly one reflection for `step` and append it to history.
    ///
    /// Never fails: an unusable or unreachable oracle yields
    /// [`Reflection::fallback`].
    pub async fn reflect(&self, session: &mut Session, step: &Step) -> Reflection {
        let user_prompt = prompt::reflector(session.initial_query(), session.plan(), step);

        let reflection = match self
            .oracle
            .call(prompt::REFLECTOR_SYSTEM, &user_prompt, self.max_attempts, |r: Reflection| {
                Ok(r)
            })
            .await
        {
            Ok(r) => {
                let mut r = r.normalized();
                r.step_id = step.step_id;
                r
            }
            Err(e) => {
                warn!(step_id = step.step_id, error = %e, "Reflection failed, using fallback");
                Reflection::fallback(step)
            }
        };

        info!(
            step_id = reflection.step_id,
            is_success = reflection.is_success,
            confidence = reflection.confidence,
            is_finished = reflection.is_finished,
            "Reflection recorded"
        );

        session.push(HistoryEntry::Reflection(reflection.clone()));
        reflection
    }
}
