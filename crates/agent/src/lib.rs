//! The planloop agent loop.
//!
//! A session follows a **Plan → Execute → Reflect → Decide** cycle:
//!
//! 1. **Plan**: the [`Planner`] turns the goal, the capability catalog and
//!    the condensed history into an ordered [`Plan`](planloop_core::Plan)
//! 2. **Execute**: the [`Executor`] runs the step under the cursor
//! 3. **Reflect**: the [`Reflector`] judges whether the outcome serves the goal
//! 4. **Decide**: [`decide`] picks finish, continue, replan or retry
//!
//! The [`Orchestrator`] drives the cycle until a decision finishes it or the
//! iteration ceiling is hit, then synthesizes the final answer.

pub mod decider;
pub mod executor;
pub mod oracle;
pub mod orchestrator;
pub mod planner;
pub mod prompt;
pub mod reflector;
pub mod router;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use decider::{Decision, DecisionPolicy, decide};
pub use executor::Executor;
pub use oracle::{OracleError, StructuredOracle};
pub use orchestrator::{NO_CONCLUSION, ORACLE_UNAVAILABLE, Orchestrator, RunOutcome};
pub use planner::{Planner, PlanningFailure};
pub use reflector::Reflector;
pub use router::{Intent, IntentRouter};
pub use stream_event::{PlannedStep, ProgressEvent};
