//! Intent routing ahead of planning.
//!
//! Greetings and off-topic requests never reach the planner: the first get
//! a short conversational reply, the second a fixed refusal. Anything the
//! classifier cannot place is treated as a domain question.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::oracle::StructuredOracle;
use crate::prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    DomainQuestion,
    Conversation,
    OutOfDomain,
}

impl Intent {
    /// Read a label from the classifier's reply. The last word wins.
    pub fn from_reply(reply: &str) -> Self {
        let label = reply
            .split_whitespace()
            .last()
            .unwrap_or("")
            .trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
            .to_lowercase();

        match label.as_str() {
            "conversation" | "daily_conversation" => Self::Conversation,
            "out_of_domain" | "out_of_domain_question" => Self::OutOfDomain,
            "domain_question" | "domain_specific_question" => Self::DomainQuestion,
            other => {
                warn!(label = other, "Unrecognized intent label, treating as domain question");
                Self::DomainQuestion
            }
        }
    }
}

const CONVERSATION_FALLBACK: &str =
    "Hello! Ask me a research question about the records in my catalog.";

pub struct IntentRouter {
    oracle: StructuredOracle,
}

impl IntentRouter {
    pub fn new(oracle: StructuredOracle) -> Self {
        Self { oracle }
    }

    pub async fn classify(&self, goal: &str) -> Intent {
        match self
            .oracle
            .complete_text(prompt::INTENT_SYSTEM, &prompt::intent(goal))
            .await
        {
            Ok(reply) => {
                let intent = Intent::from_reply(&reply);
                info!(intent = ?intent, "Intent classified");
                intent
            }
            Err(e) => {
                warn!(error = %e, "Intent classification failed, treating as domain question");
                Intent::DomainQuestion
            }
        }
    }

    /// The answer for intents that skip planning; `None` for domain questions.
    pub async fn direct_reply(&self, intent: Intent, goal: &str) -> Option<String> {
        match intent {
            Intent::DomainQuestion => None,
            Intent::OutOfDomain => Some(prompt::OUT_OF_DOMAIN_REPLY.to_string()),
            Intent::Conversation => {
                let reply = self
                    .oracle
                    .complete_text(prompt::CONVERSATION_SYSTEM, goal)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "Conversational reply failed");
                        String::new()
                    });
                if reply.is_empty() {
                    Some(CONVERSATION_FALLBACK.to_string())
                } else {
                    Some(reply)
                }
            }
        }
    }
}
