//! Tool trait: the abstraction over planner capabilities.
//!
//! A capability is anything the planner can name in a step: a structured
//! record finder, a retrieval-and-reasoning call, a forecasting model. The
//! loop only sees the uniform contract defined here.
//!
//! Tools can fail through two channels, and callers must check both:
//! returning `Err(ToolError)`, or returning a value whose text carries one of
//! the [`SoftFailureMarkers`].

use crate::error::ToolError;
use crate::plan::PLACEHOLDER;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// The type expected for a single tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    /// Accepts any JSON value (e.g. a `context` fed from a previous step).
    Any,
}

impl ParamKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }
}

/// One named, typed parameter of a capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub description: String,
}

impl ParameterSpec {
    /// A parameter the planner must always supply.
    pub fn required(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
        }
    }

    /// A parameter the planner may leave out.
    pub fn optional(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: description.into(),
        }
    }
}

/// Catalog entry describing one capability to the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
}

impl CapabilitySpec {
    /// Check a planned `tool_input` against this capability's parameters.
    ///
    /// The placeholder sentinel is accepted for any parameter: its real
    /// value is only known once the previous step has run.
    pub fn validate_input(&self, input: &Value) -> Result<(), String> {
        let Some(map) = input.as_object() else {
            return Err(format!("tool_input for '{}' must be an object", self.name));
        };

        for key in map.keys() {
            if !self.parameters.iter().any(|p| &p.name == key) {
                return Err(format!(
                    "unknown parameter '{}' for '{}' (expected one of: {})",
                    key,
                    self.name,
                    self.parameter_names().join(", ")
                ));
            }
        }

        for param in &self.parameters {
            match map.get(&param.name) {
                None | Some(Value::Null) => {
                    if param.required {
                        return Err(format!(
                            "missing required parameter '{}' for '{}'",
                            param.name, self.name
                        ));
                    }
                }
                Some(Value::String(s)) if s == PLACEHOLDER => {}
                Some(value) => {
                    if !param.kind.accepts(value) {
                        return Err(format!(
                            "parameter '{}' for '{}' must be {:?}, got {}",
                            param.name, self.name, param.kind, value
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }
}

/// The core Tool trait.
///
/// Each capability implements this trait and is registered once in the
/// [`ToolRegistry`], which is then shared with the executor.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "record_finder").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the planner).
    fn description(&self) -> &str;

    /// The typed parameter list.
    fn parameters(&self) -> Vec<ParameterSpec>;

    /// Execute the tool with already-resolved input.
    async fn execute(&self, input: Value) -> std::result::Result<Value, ToolError>;

    /// Convert this tool into a catalog entry for the planner.
    fn to_spec(&self) -> CapabilitySpec {
        CapabilitySpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// A registry of available capabilities.
///
/// Built once at startup and injected into the executor; the planner reads
/// its [`catalog`](Self::catalog).
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Catalog of all capabilities, sorted by name so prompts are stable.
    pub fn catalog(&self) -> Vec<CapabilitySpec> {
        let mut specs: Vec<CapabilitySpec> = self.tools.values().map(|t| t.to_spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Look up and execute a tool.
    pub async fn execute(&self, name: &str, input: Value) -> std::result::Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(input).await
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Textual markers with which a tool may report failure instead of erroring.
///
/// Matching is case-insensitive substring search over the returned text:
/// a plain string result, or the `error` / `output` string of an object.
#[derive(Debug, Clone)]
pub struct SoftFailureMarkers {
    markers: Vec<String>,
}

impl SoftFailureMarkers {
    pub fn new(markers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.into().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// Return the offending text if `value` carries a failure marker.
    pub fn detect(&self, value: &Value) -> Option<String> {
        let candidates: Vec<&str> = match value {
            Value::String(s) => vec![s.as_str()],
            Value::Object(map) => ["error", "output"]
                .iter()
                .filter_map(|k| map.get(*k).and_then(Value::as_str))
                .collect(),
            _ => Vec::new(),
        };

        candidates.into_iter().find_map(|text| {
            let lowered = text.to_lowercase();
            self.markers
                .iter()
                .any(|m| lowered.contains(m.as_str()))
                .then(|| text.to_string())
        })
    }
}

impl Default for SoftFailureMarkers {
    fn default() -> Self {
        Self::new(DEFAULT_SOFT_FAILURE_MARKERS.iter().copied())
    }
}

/// Markers recognised when configuration does not override them.
pub const DEFAULT_SOFT_FAILURE_MARKERS: &[&str] =
    &["出现错误:", "出现错误：", "error occurred:", "[tool_error]"];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters(&self) -> Vec<ParameterSpec> {
            vec![
                ParameterSpec::required("text", ParamKind::String, "Text to echo"),
                ParameterSpec::optional("times", ParamKind::Integer, "Repeat count"),
            ]
        }
        async fn execute(&self, input: Value) -> std::result::Result<Value, ToolError> {
            Ok(input["text"].clone())
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn registry_catalog() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let catalog = registry.catalog();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].name, "echo");
        assert_eq!(catalog[0].parameters.len(), 2);
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let out = registry
            .execute("echo", json!({"text": "hello world"}))
            .await
            .unwrap();
        assert_eq!(out, json!("hello world"));
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let registry = ToolRegistry::new();
        let err = registry.execute("nonexistent", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn validate_accepts_well_formed_input() {
        let spec = EchoTool.to_spec();
        assert!(spec.validate_input(&json!({"text": "hi", "times": 2})).is_ok());
        assert!(spec.validate_input(&json!({"text": "hi"})).is_ok());
    }

    #[test]
    fn validate_rejects_missing_unknown_and_mistyped() {
        let spec = EchoTool.to_spec();
        let missing = spec.validate_input(&json!({"times": 2})).unwrap_err();
        assert!(missing.contains("missing required parameter 'text'"));

        let unknown = spec.validate_input(&json!({"text": "a", "colour": "red"})).unwrap_err();
        assert!(unknown.contains("unknown parameter 'colour'"));

        let mistyped = spec.validate_input(&json!({"text": 42})).unwrap_err();
        assert!(mistyped.contains("must be String"));

        assert!(spec.validate_input(&json!(["text"])).is_err());
    }

    #[test]
    fn validate_accepts_placeholder_for_any_kind() {
        let spec = EchoTool.to_spec();
        assert!(
            spec.validate_input(&json!({"text": PLACEHOLDER, "times": PLACEHOLDER}))
                .is_ok()
        );
    }

    #[test]
    fn soft_failure_detects_marked_strings() {
        let markers = SoftFailureMarkers::default();
        assert!(markers.detect(&json!("查询时出现错误: no such table")).is_some());
        assert!(markers.detect(&json!("An ERROR OCCURRED: timeout")).is_some());
        assert!(markers.detect(&json!({"error": "[TOOL_ERROR] bad filter"})).is_some());
        assert!(markers.detect(&json!("Paper A, Paper B")).is_none());
        assert!(markers.detect(&json!(["error occurred:"])).is_none());
    }

    #[test]
    fn custom_markers_replace_defaults() {
        let markers = SoftFailureMarkers::new(["FAILED"]);
        assert!(markers.detect(&json!("step failed badly")).is_some());
        assert!(markers.detect(&json!("error occurred: x")).is_none());
    }
}
