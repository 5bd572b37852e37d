//! Orchestrator: plan, then execute/reflect/decide until finished.
//!
//! One session per call. All per-session state lives in a [`Session`] owned
//! by the running future; the components themselves are shared behind
//! `Arc` so independent sessions can run concurrently.

use planloop_config::AppConfig;
use planloop_core::plan::{Action, HistoryEntry, Reflection, Step};
use planloop_core::provider::Provider;
use planloop_core::session::{FinishReason, LoopPhase, Session};
use planloop_core::text::{render_value, strip_reasoning_markup, truncate_chars};
use planloop_core::tool::{CapabilitySpec, SoftFailureMarkers, ToolRegistry};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::decider::{Decision, DecisionPolicy, decide};
use crate::executor::Executor;
use crate::oracle::StructuredOracle;
use crate::planner::{Planner, PlanningFailure};
use crate::reflector::Reflector;
use crate::router::{Intent, IntentRouter};
use crate::stream_event::ProgressEvent;

/// Answer used when no step ever succeeded.
pub const NO_CONCLUSION: &str = "I could not reach a conclusion for this request.";

/// Answer used when planning could not reach the oracle.
pub const ORACLE_UNAVAILABLE: &str =
    "The reasoning service could not be reached, so no answer could be produced. \
     Please try again later.";

const EVENT_OUTPUT_CHARS: usize = 500;

/// The result of one session.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub answer: String,
    pub reason: FinishReason,
    /// Executor iterations spent.
    pub iterations: u32,
    pub session: Session,
}

impl RunOutcome {
    /// Whether the answer came from a successful step or a direct reply.
    pub fn reached_conclusion(&self) -> bool {
        self.answer != NO_CONCLUSION && self.answer != ORACLE_UNAVAILABLE
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    planner: Arc<Planner>,
    executor: Arc<Executor>,
    reflector: Arc<Reflector>,
    router: Option<Arc<IntentRouter>>,
    catalog: Arc<Vec<CapabilitySpec>>,
    policy: DecisionPolicy,
    max_iterations: u32,
}

impl Orchestrator {
    pub fn new(planner: Planner, executor: Executor, reflector: Reflector) -> Self {
        let catalog = Arc::new(executor.tools().catalog());
        Self {
            planner: Arc::new(planner),
            executor: Arc::new(executor),
            reflector: Arc::new(reflector),
            router: None,
            catalog,
            policy: DecisionPolicy::default(),
            max_iterations: 10,
        }
    }

    /// Wire every component from configuration.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: &AppConfig,
    ) -> Self {
        let oracle = StructuredOracle::new(provider, &config.default_model)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens);
        let agent = &config.agent;

        let planner = Planner::new(oracle.clone())
            .with_max_attempts(agent.planner_max_attempts)
            .with_history_result_chars(agent.history_result_chars);
        let executor = Executor::new(tools)
            .with_timeout(Duration::from_secs(config.tools.timeout_secs))
            .with_markers(SoftFailureMarkers::new(
                config.tools.soft_failure_markers.iter().cloned(),
            ));
        let reflector = Reflector::new(oracle.clone()).with_max_attempts(agent.reflector_max_attempts);

        let mut orchestrator = Self::new(planner, executor, reflector)
            .with_policy(DecisionPolicy::from(agent))
            .with_max_iterations(agent.max_iterations);
        if agent.route_intents {
            orchestrator = orchestrator.with_router(IntentRouter::new(oracle));
        }
        orchestrator
    }

    pub fn with_router(mut self, router: IntentRouter) -> Self {
        self.router = Some(Arc::new(router));
        self
    }

    pub fn with_policy(mut self, policy: DecisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Hard ceiling on executor iterations, independent of the decider.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn catalog(&self) -> &[CapabilitySpec] {
        &self.catalog
    }

    /// Run a session to completion.
    pub async fn run(&self, goal: &str) -> RunOutcome {
        self.drive(goal, None).await
    }

    /// Run a session, sending progress events to `events`.
    ///
    /// Stops at the next iteration boundary once the receiver is dropped.
    pub async fn run_with_events(
        &self,
        goal: &str,
        events: mpsc::Sender<ProgressEvent>,
    ) -> RunOutcome {
        self.drive(goal, Some(&events)).await
    }

    /// Streaming variant of [`run`](Self::run).
    ///
    /// The session runs on a background task; the returned receiver yields
    /// its events and ends after `final_answer`.
    pub fn run_stream(&self, goal: impl Into<String>) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel::<ProgressEvent>(128);
        let this = self.clone();
        let goal = goal.into();
        tokio::spawn(async move {
            this.run_with_events(&goal, tx).await;
        });
        rx
    }

    async fn drive(&self, goal: &str, events: Option<&mpsc::Sender<ProgressEvent>>) -> RunOutcome {
        let mut session = Session::new(goal);
        let mut iterations = 0u32;
        info!(goal = %goal, "Session started");

        let reason = if is_cancelled(events) {
            FinishReason::Cancelled
        } else if let Some(reply) = self.route(goal, events).await {
            session.set_final_answer(reply);
            FinishReason::AnsweredDirectly
        } else {
            match self.replan(&mut session, events).await {
                Err(reason) => reason,
                Ok(()) => self.iterate(&mut session, events, &mut iterations).await,
            }
        };

        session.set_phase(LoopPhase::Done(reason));
        let answer = match session.final_answer() {
            Some(answer) => answer.to_string(),
            None => synthesize_answer(&session, reason),
        };
        session.set_final_answer(answer.clone());

        info!(
            reason = %reason,
            iterations,
            errors = session.error_count(),
            history = session.history().len(),
            "Session finished"
        );
        emit(
            events,
            ProgressEvent::FinalAnswer {
                answer: answer.clone(),
                reason,
                iterations,
            },
        )
        .await;

        RunOutcome {
            answer,
            reason,
            iterations,
            session,
        }
    }

    async fn route(&self, goal: &str, events: Option<&mpsc::Sender<ProgressEvent>>) -> Option<String> {
        let router = self.router.as_ref()?;
        let intent = router.classify(goal).await;
        emit(events, ProgressEvent::IntentClassified { intent }).await;
        if intent == Intent::DomainQuestion {
            return None;
        }
        router.direct_reply(intent, goal).await
    }

    /// Install a fresh plan. Only an unreachable oracle ends the session
    /// here; other planning failures leave the session without a plan.
    async fn replan(
        &self,
        session: &mut Session,
        events: Option<&mpsc::Sender<ProgressEvent>>,
    ) -> Result<(), FinishReason> {
        session.set_phase(LoopPhase::Planning);
        let goal = session.initial_query().to_string();

        match self.planner.plan(&goal, session.history(), &self.catalog).await {
            Ok(plan) => {
                emit(events, ProgressEvent::plan_created(&plan)).await;
                session.replace_plan(Some(plan));
                Ok(())
            }
            Err(PlanningFailure::OracleUnavailable(e)) => {
                emit(
                    events,
                    ProgressEvent::Error {
                        message: format!("planning aborted: {e}"),
                    },
                )
                .await;
                session.replace_plan(None);
                Err(FinishReason::OracleUnavailable)
            }
            Err(e) => {
                emit(
                    events,
                    ProgressEvent::Error {
                        message: e.to_string(),
                    },
                )
                .await;
                session.replace_plan(None);
                Ok(())
            }
        }
    }

    async fn iterate(
        &self,
        session: &mut Session,
        events: Option<&mpsc::Sender<ProgressEvent>>,
        iterations: &mut u32,
    ) -> FinishReason {
        let mut override_input: Option<Value> = None;

        loop {
            if is_cancelled(events) {
                warn!("Progress receiver dropped, cancelling session");
                return FinishReason::Cancelled;
            }
            if *iterations >= self.max_iterations {
                warn!(max = self.max_iterations, "Iteration ceiling reached");
                let reason = FinishReason::IterationCeiling;
                self.record_decision(session, events, &Decision::Finish(reason), None, reason.to_string())
                    .await;
                return reason;
            }

            session.set_phase(LoopPhase::Executing);
            let Some(step) = self.executor.execute(session, override_input.take()).await else {
                // Nothing to execute: let the decider close the session.
                session.set_phase(LoopPhase::Deciding);
                let reason = match decide(
                    session.plan(),
                    session.history(),
                    session.error_count(),
                    &self.policy,
                ) {
                    Decision::Finish(reason) => reason,
                    _ => FinishReason::PlanCompleted,
                };
                let decision = Decision::Finish(reason);
                let reasoning = describe(&decision, None);
                self.record_decision(session, events, &decision, None, reasoning).await;
                return reason;
            };
            *iterations += 1;
            emit(events, step_event(&step)).await;

            session.set_phase(LoopPhase::Reflecting);
            let reflection = self.reflector.reflect(session, &step).await;
            emit(
                events,
                ProgressEvent::Reflection {
                    step_id: reflection.step_id,
                    is_success: reflection.is_success,
                    confidence: reflection.confidence,
                    critique: reflection.critique.clone(),
                },
            )
            .await;

            session.set_phase(LoopPhase::Deciding);
            let decision = decide(
                session.plan(),
                session.history(),
                session.error_count(),
                &self.policy,
            );
            let reasoning = describe(&decision, Some(&reflection));
            self.record_decision(session, events, &decision, Some(step.step_id), reasoning)
                .await;

            match decision {
                Decision::Finish(reason) => return reason,
                Decision::ContinueExecute => session.advance_cursor(),
                Decision::Retry(input) => override_input = Some(Value::Object(input)),
                Decision::Replan => {
                    if let Err(reason) = self.replan(session, events).await {
                        return reason;
                    }
                }
            }
        }
    }

    async fn record_decision(
        &self,
        session: &mut Session,
        events: Option<&mpsc::Sender<ProgressEvent>>,
        decision: &Decision,
        step_id: Option<usize>,
        reasoning: String,
    ) {
        let mut action = Action::new(decision.action_type(), reasoning);
        action.step_id = step_id;
        if let Decision::Retry(input) = decision {
            action.corrected_input = Some(input.clone());
        }

        info!(action = %action.action_type, step_id = ?step_id, "Decision taken");
        emit(
            events,
            ProgressEvent::Decision {
                action: action.action_type,
                step_id,
                reasoning: action.reasoning.clone(),
            },
        )
        .await;
        session.push(HistoryEntry::Action(action));
    }
}

fn is_cancelled(events: Option<&mpsc::Sender<ProgressEvent>>) -> bool {
    events.is_some_and(|tx| tx.is_closed())
}

async fn emit(events: Option<&mpsc::Sender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(tx) = events {
        // A closed channel is noticed at the next iteration boundary.
        let _ = tx.send(event).await;
    }
}

fn step_event(step: &Step) -> ProgressEvent {
    let output = step
        .result
        .as_ref()
        .map(|r| truncate_chars(&strip_reasoning_markup(&render_value(r)), EVENT_OUTPUT_CHARS))
        .unwrap_or_default();
    ProgressEvent::StepResult {
        step_id: step.step_id,
        tool_name: step.tool_name.clone(),
        success: step.is_success,
        output,
        error: step.error_message.clone(),
    }
}

fn describe(decision: &Decision, reflection: Option<&Reflection>) -> String {
    match (decision, reflection) {
        (Decision::Finish(reason), _) => format!("finishing: {reason}"),
        (Decision::ContinueExecute, Some(r)) => format!(
            "step {} judged useful (confidence {:.2}), moving to the next step",
            r.step_id, r.confidence
        ),
        (Decision::ContinueExecute, None) => "moving to the next step".into(),
        (Decision::Retry(_), Some(r)) => {
            format!("retrying step {} with corrected input: {}", r.step_id, r.critique)
        }
        (Decision::Retry(_), None) => "retrying with corrected input".into(),
        (Decision::Replan, Some(r)) if !r.critique.is_empty() => {
            format!("replanning: {}", r.critique)
        }
        (Decision::Replan, _) => "replanning: the last step did not serve the goal".into(),
    }
}

/// The most recent successful result as clean text, else a fixed message.
fn synthesize_answer(session: &Session, reason: FinishReason) -> String {
    let answer = session
        .last_successful_result()
        .map(|r| strip_reasoning_markup(&render_value(r)))
        .unwrap_or_default();
    if !answer.is_empty() {
        return answer;
    }
    match reason {
        FinishReason::OracleUnavailable => ORACLE_UNAVAILABLE.to_string(),
        _ => NO_CONCLUSION.to_string(),
    }
}
