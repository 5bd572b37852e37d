//! `planloop doctor` — Diagnose configuration and provider health.

use planloop_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 planloop Doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    if !config_path.exists() {
        println!("  ⚠️  No config file — using defaults (run `planloop init`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 blocking issue found.");
            return Ok(());
        }
    };

    println!(
        "  ℹ️  Provider: {} / model: {}",
        config.default_provider, config.default_model
    );
    if config.default_provider != "ollama" && !config.has_api_key() {
        println!("  ⚠️  No API key configured — set PLANLOOP_API_KEY or api_key in config.toml");
        issues += 1;
    }

    match &config.tools.catalog_path {
        Some(path) if path.exists() => println!("  ✅ Record catalog: {}", path.display()),
        Some(path) => {
            println!("  ❌ Record catalog missing: {}", path.display());
            issues += 1;
        }
        None => {
            println!("  ⚠️  No tools.catalog_path — record_finder will find nothing");
            issues += 1;
        }
    }

    match planloop_providers::build_oracle(&config) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider reachable"),
            Ok(false) => {
                println!("  ❌ Provider answered but reported unhealthy");
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider unreachable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Provider not configured: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
