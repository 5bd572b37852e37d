//! Forecast tool: forward-looking analysis grounded in gathered evidence.
//!
//! Meant as the last step of a plan: trend prediction, causal reasoning or
//! experiment design over the context collected by earlier steps. Without
//! context it refuses with a soft-failure marked message instead of
//! speculating.

use crate::semantic_search::is_blank;
use async_trait::async_trait;
use planloop_core::error::ToolError;
use planloop_core::message::Message;
use planloop_core::provider::{Provider, ProviderRequest};
use planloop_core::text::{render_value, strip_reasoning_markup};
use planloop_core::tool::{ParamKind, ParameterSpec, Tool};
use serde_json::Value;
use std::sync::Arc;

const FORECAST_SYSTEM: &str = "You are a forward-looking chief scientist. Based on the evidence \
provided, identify gaps and likely breakthroughs, reason about cause and effect, or design a \
rigorous experiment with controls and key measurements. Stay grounded in the evidence.";

/// Soft-failure message for a forecast requested without evidence.
pub const EMPTY_CONTEXT: &str =
    "[tool_error] cannot forecast without context: the previous retrieval steps returned nothing";

pub struct ForecastTool {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ForecastTool {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Tool for ForecastTool {
    fn name(&self) -> &str {
        "forecast"
    }

    fn description(&self) -> &str {
        "Forward-looking analysis: trend prediction, causal reasoning or experiment design. \
         Call it last, after earlier steps have gathered the evidence passed as `context`."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required(
                "question",
                ParamKind::String,
                "The forward-looking question to analyse",
            ),
            ParameterSpec::required(
                "context",
                ParamKind::Any,
                "Evidence gathered by previous steps",
            ),
        ]
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let question = input["question"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'question' argument".into()))?;

        let context = &input["context"];
        if is_blank(context) {
            return Ok(Value::String(EMPTY_CONTEXT.into()));
        }

        let messages = vec![
            Message::system(FORECAST_SYSTEM),
            Message::user(format!(
                "### Evidence\n{}\n\n### Question\n{}\n\n### Analysis",
                render_value(context),
                question
            )),
        ];

        let response = self
            .provider
            .complete(ProviderRequest::new(&self.model, messages))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        Ok(Value::String(strip_reasoning_markup(&response.message.content)))
    }
}
