//! Reasoning-oracle backends for planloop.
//!
//! All providers implement the `planloop_core::Provider` trait.
//! The router selects the correct provider based on configuration and wraps
//! it in the retry/timeout policy.

pub mod openai_compat;
pub mod reliable;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use reliable::RetryingProvider;
pub use router::{ProviderRouter, build_from_config, build_oracle};
