//! # planloop Core
//!
//! Domain types, traits, and error definitions for the planloop
//! plan-execute-reflect runtime. This crate has **no runtime dependencies**:
//! it defines the model that every other crate implements against.
//!
//! ## Layout
//!
//! - [`plan`] and [`session`]: the values the control loop passes around
//! - [`tool`]: the capability contract and registry
//! - [`provider`]: the reasoning-oracle contract
//! - [`text`]: markup cleaning and truncation helpers

pub mod error;
pub mod message;
pub mod plan;
pub mod provider;
pub mod session;
pub mod text;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError};
pub use message::{Message, Role};
pub use plan::{Action, ActionType, HistoryEntry, PLACEHOLDER, Plan, Reflection, Step};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use session::{FinishReason, LoopPhase, Session};
pub use tool::{CapabilitySpec, ParamKind, ParameterSpec, SoftFailureMarkers, Tool, ToolRegistry};
