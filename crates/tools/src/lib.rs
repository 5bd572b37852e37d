//! Reference capabilities for planloop.
//!
//! Three tools cover the usual "precise lookup, then read, then look ahead"
//! shape of a research goal: a structured record finder, an oracle-backed
//! semantic analysis tool, and a forward-looking forecast tool.

pub mod forecast;
pub mod record_finder;
pub mod semantic_search;

#[cfg(test)]
pub(crate) mod test_helpers;

use planloop_config::ToolsConfig;
use planloop_core::error::ToolError;
use planloop_core::provider::Provider;
use planloop_core::tool::ToolRegistry;
use std::sync::Arc;

pub use forecast::ForecastTool;
pub use record_finder::{Record, RecordFinderTool};
pub use semantic_search::SemanticSearchTool;

/// Create the default registry with all reference tools.
///
/// The record catalog is read from `tools.catalog_path`; without one the
/// record finder starts empty and every lookup reports no matches.
pub fn default_registry(
    provider: Arc<dyn Provider>,
    model: &str,
    config: &ToolsConfig,
) -> Result<ToolRegistry, ToolError> {
    let finder = match &config.catalog_path {
        Some(path) => RecordFinderTool::load(path)?,
        None => {
            tracing::warn!("No tools.catalog_path configured, record_finder has no records");
            RecordFinderTool::new(Vec::new())
        }
    };
    tracing::debug!(records = finder.len(), "Record catalog loaded");

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(finder));
    registry.register(Arc::new(SemanticSearchTool::new(provider.clone(), model)));
    registry.register(Arc::new(ForecastTool::new(provider, model)));
    Ok(registry)
}
