pub mod doctor;
pub mod init;
pub mod run;
pub mod tools;

use planloop_config::AppConfig;
use planloop_core::provider::Provider;
use planloop_core::tool::ToolRegistry;
use std::sync::Arc;

/// The retrying oracle and the tool registry built on it.
pub fn build_runtime(
    config: &AppConfig,
) -> Result<(Arc<dyn Provider>, Arc<ToolRegistry>), Box<dyn std::error::Error>> {
    let provider = planloop_providers::build_oracle(config)?;
    let tools = planloop_tools::default_registry(provider.clone(), &config.default_model, &config.tools)?;
    Ok((provider, Arc::new(tools)))
}
