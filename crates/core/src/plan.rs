//! Plan, Step, Reflection and Action: the values the loop passes around.
//!
//! A [`Plan`] is immutable in shape once the planner produces it. The only
//! mutation is recording a step's outcome through [`Step::succeed`] or
//! [`Step::fail`], which keep `is_success` and `error_message` consistent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved value a step uses to consume the previous successful result.
pub const PLACEHOLDER: &str = "__PREVIOUS_STEP_RESULT__";

/// One tool invocation with its input, reasoning, and outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based position in the plan
    pub step_id: usize,

    pub tool_name: String,

    #[serde(default = "empty_object")]
    pub tool_input: Value,

    #[serde(default)]
    pub reasoning: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default)]
    pub is_success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Step {
    pub fn new(
        step_id: usize,
        tool_name: impl Into<String>,
        tool_input: Value,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            step_id,
            tool_name: tool_name.into(),
            tool_input,
            reasoning: reasoning.into(),
            result: None,
            is_success: false,
            error_message: None,
        }
    }

    /// Record a successful outcome.
    pub fn succeed(&mut self, result: Value) {
        self.result = Some(result);
        self.is_success = true;
        self.error_message = None;
    }

    /// Record a failed outcome. `result` keeps whatever the tool returned,
    /// if anything (a soft-failure string, for instance).
    pub fn fail(&mut self, message: impl Into<String>, result: Option<Value>) {
        self.result = result;
        self.is_success = false;
        self.error_message = Some(message.into());
    }

    /// Clear runtime fields so the step looks freshly planned.
    pub fn reset_outcome(&mut self) {
        self.result = None;
        self.is_success = false;
        self.error_message = None;
    }

    /// Whether this step has been executed (successfully or not).
    pub fn is_executed(&self) -> bool {
        self.is_success || self.error_message.is_some()
    }
}

/// Ordered sequence of steps produced to satisfy a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub goal: String,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(goal: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            goal: goal.into(),
            steps,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Look up a step by its 1-based id.
    pub fn step(&self, step_id: usize) -> Option<&Step> {
        step_id.checked_sub(1).and_then(|i| self.steps.get(i))
    }

    pub fn step_mut(&mut self, step_id: usize) -> Option<&mut Step> {
        step_id.checked_sub(1).and_then(|i| self.steps.get_mut(i))
    }

    /// Check that step ids run contiguously from 1.
    pub fn validate_shape(&self) -> Result<(), String> {
        for (i, step) in self.steps.iter().enumerate() {
            if step.step_id != i + 1 {
                return Err(format!(
                    "step ids must be contiguous from 1: position {} has step_id {}",
                    i + 1,
                    step.step_id
                ));
            }
            if step.tool_name.trim().is_empty() {
                return Err(format!("step {} has an empty tool_name", step.step_id));
            }
        }
        Ok(())
    }
}

/// A judgment of whether a step's outcome serves the goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    #[serde(default)]
    pub step_id: usize,

    #[serde(default)]
    pub critique: String,

    /// Semantic verdict; may differ from the step's raw `is_success`.
    pub is_success: bool,

    pub confidence: f64,

    #[serde(default)]
    pub suggestion: String,

    /// Whether the whole goal is already satisfied.
    #[serde(default)]
    pub is_finished: bool,

    /// Replacement input, only consulted when retries are enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_input: Option<Map<String, Value>>,
}

impl Reflection {
    /// Conservative verdict used when the oracle's judgment is unavailable.
    pub fn fallback(step: &Step) -> Self {
        Self {
            step_id: step.step_id,
            critique: "reflection unavailable; falling back to the raw step outcome".into(),
            is_success: step.is_success,
            confidence: 0.0,
            suggestion: "replan".into(),
            is_finished: false,
            corrected_input: None,
        }
    }

    /// Clamp confidence into [0, 1]. Non-finite values become 0.
    pub fn normalized(mut self) -> Self {
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }
}

/// The control decision kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Proceed,
    Retry,
    Replan,
    Finish,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Proceed => "PROCEED",
            Self::Retry => "RETRY",
            Self::Replan => "REPLAN",
            Self::Finish => "FINISH",
        };
        f.write_str(s)
    }
}

/// A recorded control decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub action_type: ActionType,

    /// Step the decision was taken after, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_input: Option<Map<String, Value>>,

    #[serde(default)]
    pub reasoning: String,
}

impl Action {
    pub fn new(action_type: ActionType, reasoning: impl Into<String>) -> Self {
        Self {
            action_type,
            step_id: None,
            corrected_input: None,
            reasoning: reasoning.into(),
        }
    }

    pub fn with_step(mut self, step_id: usize) -> Self {
        self.step_id = Some(step_id);
        self
    }
}

/// One entry of a session's append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    Step(Step),
    Reflection(Reflection),
    Action(Action),
}

impl HistoryEntry {
    pub fn as_step(&self) -> Option<&Step> {
        match self {
            Self::Step(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reflection(&self) -> Option<&Reflection> {
        match self {
            Self::Reflection(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<&Action> {
        match self {
            Self::Action(a) => Some(a),
            _ => None,
        }
    }
}

/// Replace every placeholder sentinel inside `input`, at any depth.
///
/// Only values exactly equal to the sentinel are replaced; keys and all
/// other values are copied unchanged.
pub fn resolve_placeholders(input: &Value, replacement: &Value) -> Value {
    match input {
        Value::String(s) if s == PLACEHOLDER => replacement.clone(),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| resolve_placeholders(v, replacement))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_placeholders(v, replacement)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Whether `input` contains the sentinel anywhere.
pub fn contains_placeholder(input: &Value) -> bool {
    match input {
        Value::String(s) => s == PLACEHOLDER,
        Value::Array(items) => items.iter().any(contains_placeholder),
        Value::Object(map) => map.values().any(contains_placeholder),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn succeed_and_fail_keep_invariant() {
        let mut step = Step::new(1, "record_finder", json!({}), "look up");
        step.fail("boom", None);
        assert!(!step.is_success);
        assert_eq!(step.error_message.as_deref(), Some("boom"));

        step.succeed(json!(["Paper A"]));
        assert!(step.is_success);
        assert!(step.error_message.is_none());
        assert!(step.is_executed());

        step.reset_outcome();
        assert!(!step.is_executed());
        assert!(step.result.is_none());
    }

    #[test]
    fn placeholder_resolves_at_top_level() {
        let input = json!({"context": PLACEHOLDER, "query": "summarize"});
        let resolved = resolve_placeholders(&input, &json!(["Paper A", "Paper B"]));
        assert_eq!(
            resolved,
            json!({"context": ["Paper A", "Paper B"], "query": "summarize"})
        );
    }

    #[test]
    fn placeholder_resolves_at_any_depth() {
        let input = json!({
            "outer": {"inner": [1, PLACEHOLDER, {"deep": PLACEHOLDER}]},
            "keep": "__PREVIOUS_STEP_RESULT__ as text",
            PLACEHOLDER: "keys are not values"
        });
        let resolved = resolve_placeholders(&input, &json!("R"));
        assert_eq!(resolved["outer"]["inner"], json!([1, "R", {"deep": "R"}]));
        assert_eq!(resolved["keep"], json!("__PREVIOUS_STEP_RESULT__ as text"));
        assert_eq!(resolved[PLACEHOLDER], json!("keys are not values"));
        assert!(!contains_placeholder(&resolved["outer"]));
    }

    #[test]
    fn input_without_placeholder_is_unchanged() {
        let input = json!({"a": [1, 2, {"b": null}], "c": true});
        assert_eq!(resolve_placeholders(&input, &json!("X")), input);
        assert!(!contains_placeholder(&input));
    }

    #[test]
    fn plan_shape_validation() {
        let ok = Plan::new(
            "g",
            vec![
                Step::new(1, "a", json!({}), ""),
                Step::new(2, "b", json!({}), ""),
            ],
        );
        assert!(ok.validate_shape().is_ok());
        assert_eq!(ok.step(2).map(|s| s.tool_name.as_str()), Some("b"));
        assert!(ok.step(0).is_none());
        assert!(ok.step(3).is_none());

        let gap = Plan::new(
            "g",
            vec![
                Step::new(1, "a", json!({}), ""),
                Step::new(3, "b", json!({}), ""),
            ],
        );
        assert!(gap.validate_shape().is_err());
    }

    #[test]
    fn plan_parses_from_oracle_shape() {
        let raw = r#"{
            "goal": "ignored",
            "steps": [
                {"step_id": 1, "tool_name": "record_finder",
                 "tool_input": {"name_like": "graph"}, "reasoning": "lookup"}
            ]
        }"#;
        let plan: Plan = serde_json::from_str(raw).unwrap();
        assert_eq!(plan.len(), 1);
        assert!(!plan.steps[0].is_success);
        assert!(plan.steps[0].result.is_none());
    }

    #[test]
    fn reflection_confidence_is_clamped() {
        let raw = r#"{"is_success": true, "confidence": 1.7}"#;
        let r: Reflection = serde_json::from_str(raw).unwrap();
        assert!((r.normalized().confidence - 1.0).abs() < f64::EPSILON);

        let r = Reflection {
            confidence: -0.3,
            ..Reflection::fallback(&Step::new(1, "a", json!({}), ""))
        };
        assert_eq!(r.normalized().confidence, 0.0);
    }

    #[test]
    fn fallback_mirrors_step_outcome() {
        let mut step = Step::new(2, "a", json!({}), "");
        step.succeed(json!("ok"));
        let r = Reflection::fallback(&step);
        assert_eq!(r.step_id, 2);
        assert!(r.is_success);
        assert_eq!(r.confidence, 0.0);
        assert!(!r.is_finished);
        assert_eq!(r.suggestion, "replan");
    }

    #[test]
    fn history_entry_is_tagged() {
        let entry = HistoryEntry::Action(Action::new(ActionType::Replan, "low confidence"));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "action");
        assert_eq!(json["action_type"], "REPLAN");
        let back: HistoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
