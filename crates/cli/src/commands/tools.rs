//! `planloop tools` — show the capability catalog the planner sees.

use planloop_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let (_, tools) = super::build_runtime(&config)?;

    println!("🧰 {} capabilities\n", tools.len());
    print!("{}", planloop_agent::prompt::render_catalog(&tools.catalog()));
    Ok(())
}
