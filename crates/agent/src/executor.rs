//! Executor: runs exactly one step of the current plan.
//!
//! Resolves placeholders against the latest successful result, invokes the
//! capability under a timeout, classifies the outcome, and records the step
//! in the session. Step failures are data, never errors.

use planloop_core::error::ToolError;
use planloop_core::plan::{Step, resolve_placeholders};
use planloop_core::session::Session;
use planloop_core::tool::{SoftFailureMarkers, ToolRegistry};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Executor {
    tools: Arc<ToolRegistry>,
    timeout: Duration,
    markers: SoftFailureMarkers,
}

impl Executor {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            timeout: Duration::from_secs(120),
            markers: SoftFailureMarkers::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_markers(mut self, markers: SoftFailureMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Execute the step under the session's cursor.
    ///
    /// `override_input` replaces the planned input (corrected retries).
    /// Returns `None` without touching the session when there is no plan
    /// or the cursor is out of range.
    pub async fn execute(&self, session: &mut Session, override_input: Option<Value>) -> Option<Step> {
        let mut step = session.current_step()?.clone();
        if let Some(input) = override_input {
            step.tool_input = input;
        }

        let previous = session
            .last_successful_result()
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let resolved = resolve_placeholders(&step.tool_input, &previous);

        info!(step_id = step.step_id, tool = %step.tool_name, "Executing step");
        debug!(step_id = step.step_id, input = %resolved, "Resolved step input");

        self.run(&mut step, resolved).await;

        if step.is_success {
            info!(step_id = step.step_id, tool = %step.tool_name, "Step succeeded");
        } else {
            warn!(
                step_id = step.step_id,
                tool = %step.tool_name,
                error = step.error_message.as_deref().unwrap_or(""),
                "Step failed"
            );
        }

        session.record_step(step.clone());
        Some(step)
    }

    async fn run(&self, step: &mut Step, input: Value) {
        let Some(tool) = self.tools.get(&step.tool_name) else {
            step.fail(ToolError::NotFound(step.tool_name.clone()).to_string(), None);
            return;
        };

        match tokio::time::timeout(self.timeout, tool.execute(input)).await {
            Ok(Ok(output)) => match self.markers.detect(&output) {
                Some(message) => {
                    let err = ToolError::SoftFailure {
                        tool_name: step.tool_name.clone(),
                        message,
                    };
                    step.fail(err.to_string(), Some(output));
                }
                None => step.succeed(output),
            },
            Ok(Err(e)) => step.fail(e.to_string(), None),
            Err(_) => {
                let err = ToolError::Timeout {
                    tool_name: step.tool_name.clone(),
                    timeout_secs: self.timeout.as_secs(),
                };
                step.fail(err.to_string(), None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedTool;
    use async_trait::async_trait;
    use planloop_core::plan::{HistoryEntry, PLACEHOLDER, Plan};
    use planloop_core::tool::{ParameterSpec, Tool};
    use serde_json::json;

    fn session_with(steps: Vec<Step>) -> Session {
        let mut session = Session::new("goal");
        session.replace_plan(Some(Plan::new("goal", steps)));
        session
    }

    fn registry(tools: Vec<Arc<dyn Tool>>) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        Arc::new(registry)
    }

    #[tokio::test]
    async fn successful_step_is_recorded() {
        let finder = Arc::new(ScriptedTool::returning("finder", json!(["Paper A", "Paper B"])));
        let executor = Executor::new(registry(vec![finder]));
        let mut session = session_with(vec![Step::new(1, "finder", json!({}), "")]);

        let step = executor.execute(&mut session, None).await.unwrap();
        assert!(step.is_success);
        assert_eq!(step.result, Some(json!(["Paper A", "Paper B"])));
        assert_eq!(session.error_count(), 0);
        assert_eq!(session.history().len(), 1);
        assert!(session.plan().unwrap().step(1).unwrap().is_success);
    }

    #[tokio::test]
    async fn placeholder_gets_previous_result() {
        let finder = Arc::new(ScriptedTool::returning("finder", json!(["Paper A", "Paper B"])));
        let reader = Arc::new(ScriptedTool::returning("reader", json!("summary")));
        let executor = Executor::new(registry(vec![finder, reader.clone()]));
        let mut session = session_with(vec![
            Step::new(1, "finder", json!({}), ""),
            Step::new(2, "reader", json!({"context": PLACEHOLDER, "query": "q"}), ""),
        ]);

        executor.execute(&mut session, None).await;
        session.advance_cursor();
        executor.execute(&mut session, None).await;

        assert_eq!(
            reader.inputs(),
            vec![json!({"context": ["Paper A", "Paper B"], "query": "q"})]
        );
    }

    #[tokio::test]
    async fn placeholder_without_prior_success_is_empty_array() {
        let reader = Arc::new(ScriptedTool::returning("reader", json!("x")));
        let executor = Executor::new(registry(vec![reader.clone()]));
        let mut session = session_with(vec![Step::new(
            1,
            "reader",
            json!({"context": {"nested": [PLACEHOLDER]}}),
            "",
        )]);
        executor.execute(&mut session, None).await;
        assert_eq!(reader.inputs(), vec![json!({"context": {"nested": [[]]}})]);
    }

    #[tokio::test]
    async fn placeholder_skips_back_over_failures() {
        let failing = Arc::new(ScriptedTool::new(
            "flaky",
            vec![],
            vec![Ok(json!("[tool_error] boom"))],
        ));
        let finder = Arc::new(ScriptedTool::returning("finder", json!(["Paper A"])));
        let reader = Arc::new(ScriptedTool::returning("reader", json!("ok")));
        let executor = Executor::new(registry(vec![finder, failing, reader.clone()]));
        let mut session = session_with(vec![
            Step::new(1, "finder", json!({}), ""),
            Step::new(2, "flaky", json!({}), ""),
            Step::new(3, "reader", json!({"context": PLACEHOLDER}), ""),
        ]);
        for _ in 0..3 {
            executor.execute(&mut session, None).await;
            session.advance_cursor();
        }
        assert_eq!(reader.inputs(), vec![json!({"context": ["Paper A"]})]);
        assert_eq!(session.error_count(), 1);
    }

    #[tokio::test]
    async fn unknown_tool_fails_without_invoking() {
        let executor = Executor::new(registry(vec![]));
        let mut session = session_with(vec![Step::new(1, "paper_finder", json!({}), "")]);
        let step = executor.execute(&mut session, None).await.unwrap();
        assert!(!step.is_success);
        assert_eq!(
            step.error_message.as_deref(),
            Some("capability not found: paper_finder")
        );
        assert_eq!(session.error_count(), 1);
    }

    #[tokio::test]
    async fn tool_error_and_soft_failure_are_failures() {
        let erroring = Arc::new(ScriptedTool::new(
            "erroring",
            vec![],
            vec![Err(ToolError::ExecutionFailed {
                tool_name: "erroring".into(),
                reason: "db down".into(),
            })],
        ));
        let soft = Arc::new(ScriptedTool::returning(
            "soft",
            json!({"output": "查询时出现错误: no such column"}),
        ));
        let executor = Executor::new(registry(vec![erroring, soft]));
        let mut session = session_with(vec![
            Step::new(1, "erroring", json!({}), ""),
            Step::new(2, "soft", json!({}), ""),
        ]);

        let first = executor.execute(&mut session, None).await.unwrap();
        assert!(first.error_message.unwrap().contains("db down"));

        session.advance_cursor();
        let second = executor.execute(&mut session, None).await.unwrap();
        assert!(!second.is_success);
        assert!(second.result.is_some());
        assert_eq!(session.error_count(), 2);
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "never finishes in time"
        }
        fn parameters(&self) -> Vec<ParameterSpec> {
            vec![]
        }
        async fn execute(&self, _input: Value) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(json!("late"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out() {
        let executor =
            Executor::new(registry(vec![Arc::new(SlowTool)])).with_timeout(Duration::from_secs(5));
        let mut session = session_with(vec![Step::new(1, "slow", json!({}), "")]);
        let step = executor.execute(&mut session, None).await.unwrap();
        assert!(!step.is_success);
        assert!(step.error_message.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn override_input_replaces_planned_input() {
        let tool = Arc::new(ScriptedTool::returning("finder", json!(["X"])));
        let executor = Executor::new(registry(vec![tool.clone()]));
        let mut session = session_with(vec![Step::new(1, "finder", json!({"query": "bad"}), "")]);
        let step = executor
            .execute(&mut session, Some(json!({"query": "good"})))
            .await
            .unwrap();
        assert_eq!(step.tool_input, json!({"query": "good"}));
        assert_eq!(tool.inputs(), vec![json!({"query": "good"})]);
    }

    #[tokio::test]
    async fn no_plan_or_out_of_range_is_a_no_op() {
        let executor = Executor::new(registry(vec![]));
        let mut session = Session::new("g");
        assert!(executor.execute(&mut session, None).await.is_none());
        assert!(session.history().is_empty());

        let mut session = session_with(vec![Step::new(1, "a", json!({}), "")]);
        session.advance_cursor();
        assert!(executor.execute(&mut session, None).await.is_none());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn history_grows_by_exactly_one() {
        let tool = Arc::new(ScriptedTool::returning("a", json!("r")));
        let executor = Executor::new(registry(vec![tool]));
        let mut session = session_with(vec![Step::new(1, "a", json!({}), "")]);
        executor.execute(&mut session, None).await;
        executor.execute(&mut session, None).await;
        assert_eq!(session.history().len(), 2);
        assert!(matches!(session.history()[1], HistoryEntry::Step(_)));
    }
}
