//! Shared test utilities for the tools crate.

use async_trait::async_trait;
use planloop_core::error::ProviderError;
use planloop_core::message::{Message, Role};
use planloop_core::provider::{Provider, ProviderRequest, ProviderResponse};
use std::sync::Mutex;

/// A provider that returns one canned reply (or error) and records requests.
pub struct RecordingProvider {
    reply: Result<String, ProviderError>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl RecordingProvider {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            reply: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_with_role(&self, role: Role) -> String {
        let requests = self.requests.lock().unwrap();
        requests
            .last()
            .and_then(|r| r.messages.iter().rev().find(|m| m.role == role))
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    /// Content of the last user message sent.
    pub fn last_prompt(&self) -> String {
        self.last_with_role(Role::User)
    }

    pub fn last_system(&self) -> String {
        self.last_with_role(Role::System)
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        match &self.reply {
            Ok(text) => Ok(ProviderResponse {
                message: Message::assistant(text.clone()),
                usage: None,
                model: "mock".into(),
            }),
            Err(e) => Err(e.clone()),
        }
    }
}
