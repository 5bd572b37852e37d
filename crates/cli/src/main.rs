//! planloop CLI — the main entry point.
//!
//! Commands:
//! - `run`     — Plan and answer a research goal
//! - `tools`   — Show the capability catalog
//! - `init`    — Write the default config
//! - `doctor`  — Check config and provider health

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "planloop",
    about = "planloop — plan, execute, reflect and decide over research tools",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a goal with the plan/execute/reflect loop
    Run {
        /// The natural-language goal
        goal: String,

        /// Print progress events as JSON lines on stdout
        #[arg(long)]
        json: bool,

        /// Override `agent.max_iterations`
        #[arg(long)]
        max_iterations: Option<u32>,
    },

    /// List the available capabilities
    Tools,

    /// Write the default configuration file
    Init,

    /// Diagnose configuration and provider health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the answer
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            goal,
            json,
            max_iterations,
        } => commands::run::run(goal, json, max_iterations).await?,
        Commands::Tools => commands::tools::run().await?,
        Commands::Init => commands::init::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
