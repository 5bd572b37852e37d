//! Shared test helpers for agent tests.

use async_trait::async_trait;
use planloop_core::error::{ProviderError, ToolError};
use planloop_core::message::Message;
use planloop_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use planloop_core::tool::{ParamKind, ParameterSpec, Tool};
use serde_json::Value;
use std::sync::Mutex;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue.
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Scripted text replies, in order.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(make_text_response(t))).collect())
    }

    /// A provider whose first call fails.
    pub fn failing(error: ProviderError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The `index`-th request received.
    pub fn request(&self, index: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let index = requests.len();

        if index >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                index,
                responses.len()
            );
        }

        requests.push(request);
        responses[index].clone()
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A tool that returns a fixed value and records the inputs it saw.
pub struct ScriptedTool {
    name: String,
    params: Vec<ParameterSpec>,
    outputs: Mutex<Vec<Result<Value, ToolError>>>,
    inputs: Mutex<Vec<Value>>,
}

impl ScriptedTool {
    /// Outputs are returned in order; the last one repeats.
    pub fn new(name: &str, params: Vec<ParameterSpec>, outputs: Vec<Result<Value, ToolError>>) -> Self {
        Self {
            name: name.into(),
            params,
            outputs: Mutex::new(outputs),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// A tool accepting any single optional `context` parameter.
    pub fn returning(name: &str, output: Value) -> Self {
        Self::new(
            name,
            vec![
                ParameterSpec::optional("query", ParamKind::String, "query"),
                ParameterSpec::optional("context", ParamKind::Any, "context"),
            ],
            vec![Ok(output)],
        )
    }

    pub fn inputs(&self) -> Vec<Value> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for ScriptedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "scripted test tool"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        self.params.clone()
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        self.inputs.lock().unwrap().push(input);
        let mut outputs = self.outputs.lock().unwrap();
        if outputs.len() > 1 {
            outputs.remove(0)
        } else {
            outputs[0].clone()
        }
    }
}
