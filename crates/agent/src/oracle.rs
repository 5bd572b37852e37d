//! Structured oracle calls: prompt, parse, correct, give up.
//!
//! The reasoning oracle answers in free text. [`StructuredOracle::call`]
//! extracts a JSON object from that text, deserializes it into the target
//! type, runs a caller-supplied validation, and on failure re-prompts with
//! a corrective follow-up, up to a fixed number of attempts.

use planloop_core::error::ProviderError;
use planloop_core::message::Message;
use planloop_core::provider::{Provider, ProviderRequest};
use planloop_core::text::strip_reasoning_markup;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::prompt;

/// Why a structured call produced no value.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The provider could not be reached (after its own retries).
    #[error("oracle unavailable: {0}")]
    Unavailable(#[from] ProviderError),

    /// Every attempt returned text that did not parse or validate.
    #[error("oracle output unusable after {attempts} attempt(s): {reason}")]
    Unparsable { attempts: u32, reason: String },
}

/// A provider bound to a model and sampling settings.
#[derive(Clone)]
pub struct StructuredOracle {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl StructuredOracle {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.1,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn request(&self, messages: Vec<Message>) -> ProviderRequest {
        let mut request = ProviderRequest::new(&self.model, messages);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request
    }

    /// One plain-text exchange, reasoning markup removed.
    pub async fn complete_text(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let messages = vec![Message::system(system), Message::user(prompt)];
        let response = self.provider.complete(self.request(messages)).await?;
        Ok(strip_reasoning_markup(&response.message.content))
    }

    /// Ask for a `T`, validating it with `validate`.
    ///
    /// `validate` may also normalize the value; its error string is fed
    /// back to the oracle in the corrective prompt.
    pub async fn call<T, F>(
        &self,
        system: &str,
        prompt: &str,
        max_attempts: u32,
        validate: F,
    ) -> Result<T, OracleError>
    where
        T: DeserializeOwned,
        F: Fn(T) -> Result<T, String>,
    {
        let max_attempts = max_attempts.max(1);
        let mut messages = vec![Message::system(system), Message::user(prompt)];
        let mut reason = String::new();

        for attempt in 1..=max_attempts {
            let response = self.provider.complete(self.request(messages.clone())).await?;
            let raw = response.message.content;

            match parse_structured::<T>(&raw).and_then(&validate) {
                Ok(value) => {
                    debug!(attempt, "Structured oracle output accepted");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "Oracle output rejected");
                    reason = e;
                    if attempt < max_attempts {
                        messages.push(Message::assistant(raw));
                        messages.push(Message::user(prompt::correction(&reason)));
                    }
                }
            }
        }

        Err(OracleError::Unparsable {
            attempts: max_attempts,
            reason,
        })
    }
}

/// Parse free-form oracle text into `T`.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let cleaned = strip_reasoning_markup(raw);
    let json = extract_json(&cleaned).ok_or_else(|| "no JSON object found in the reply".to_string())?;
    serde_json::from_str(json).map_err(|e| format!("reply does not match the expected schema: {e}"))
}

/// Locate the JSON object in a reply.
///
/// Prefers a fenced ```json block (or any fenced block that starts with
/// `{`), otherwise takes the span from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<&str> {
    let mut rest = text;
    while let Some(start) = rest.find("```") {
        let after = &rest[start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let Some(end) = after[body_start..].find("```") else {
            break;
        };
        let body = after[body_start..body_start + end].trim();
        if body.starts_with('{') {
            return Some(body);
        }
        rest = &after[body_start + end + 3..];
    }

    let open = text.find('{')?;
    let close = text.rfind('}')?;
    (close > open).then(|| &text[open..=close])
}
