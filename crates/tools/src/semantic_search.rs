//! Semantic analysis tool: oracle-backed reading and summarizing.
//!
//! Two modes:
//! - with `context`: answer `query` strictly from the supplied context
//!   (typically a previous step's result, fed through the placeholder)
//! - without `context`: answer the open question
//!
//! Oracle failures are reported as [`ToolError::ExecutionFailed`].

use async_trait::async_trait;
use planloop_core::error::ToolError;
use planloop_core::message::Message;
use planloop_core::provider::{Provider, ProviderRequest};
use planloop_core::text::{render_value, strip_reasoning_markup};
use planloop_core::tool::{ParamKind, ParameterSpec, Tool};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const CONTEXTUAL_SYSTEM: &str = "You are a careful research analyst. Answer the question using \
ONLY the context provided. Do not use outside knowledge. If the context does not contain the \
answer, say so.";

const OPEN_SYSTEM: &str = "You are a careful research analyst. Answer the question concisely \
and factually.";

/// Returned when the oracle answers with nothing usable.
pub const NO_INFORMATION: &str = "no relevant information was found for the query";

pub struct SemanticSearchTool {
    provider: Arc<dyn Provider>,
    model: String,
}

impl SemanticSearchTool {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    fn build_messages(query: &str, context: Option<&Value>) -> Vec<Message> {
        match context {
            Some(ctx) => vec![
                Message::system(CONTEXTUAL_SYSTEM),
                Message::user(format!(
                    "### Context\n{}\n\n### Question\n{}\n\n### Answer",
                    render_value(ctx),
                    query
                )),
            ],
            None => vec![Message::system(OPEN_SYSTEM), Message::user(query)],
        }
    }
}

/// `null`, empty strings and empty collections count as no context.
pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl Tool for SemanticSearchTool {
    fn name(&self) -> &str {
        "semantic_search"
    }

    fn description(&self) -> &str {
        "Semantic reading and summarizing. With only `query` it answers an open question. \
         With `context` (e.g. the titles found by a previous step) it answers `query` \
         strictly from that context."
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("query", ParamKind::String, "The question to answer"),
            ParameterSpec::optional(
                "context",
                ParamKind::Any,
                "Material to answer from, usually a previous step's result",
            ),
        ]
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let query = input["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let context = input.get("context").filter(|c| !is_blank(c));

        debug!(contextual = context.is_some(), "semantic_search");

        let request = ProviderRequest::new(&self.model, Self::build_messages(query, context));
        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        let answer = strip_reasoning_markup(&response.message.content);
        if answer.is_empty() {
            return Ok(Value::String(NO_INFORMATION.into()));
        }
        Ok(Value::String(answer))
    }
}
