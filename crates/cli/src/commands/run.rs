//! `planloop run` — answer one goal.

use planloop_agent::{Orchestrator, ProgressEvent};
use planloop_config::AppConfig;
use planloop_core::session::FinishReason;

pub async fn run(
    goal: String,
    json: bool,
    max_iterations: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(max) = max_iterations {
        config.agent.max_iterations = max;
        config.validate()?;
    }

    let (provider, tools) = super::build_runtime(&config)?;
    let orchestrator = Orchestrator::from_config(provider, tools, &config);

    tracing::debug!(
        provider = %config.default_provider,
        model = %config.default_model,
        tools = orchestrator.catalog().len(),
        "Starting run"
    );
    let mut events = orchestrator.run_stream(goal);
    let mut outcome: Option<(String, FinishReason)> = None;

    while let Some(event) = events.recv().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            print_progress(&event);
        }
        if let ProgressEvent::FinalAnswer { answer, reason, .. } = event {
            outcome = Some((answer, reason));
        }
    }

    let (answer, reason) = outcome.ok_or("The session ended without producing an answer")?;
    if !json {
        eprintln!("  ({reason})\n");
        println!("{answer}");
    }
    Ok(())
}

fn print_progress(event: &ProgressEvent) {
    match event {
        ProgressEvent::IntentClassified { intent } => eprintln!("🧭 Intent: {intent:?}"),
        ProgressEvent::PlanCreated { steps, .. } => {
            eprintln!("📋 Plan ({} step(s)):", steps.len());
            for step in steps {
                eprintln!("   {}. {} — {}", step.step_id, step.tool_name, step.reasoning);
            }
        }
        ProgressEvent::StepResult {
            step_id,
            tool_name,
            success,
            output,
            error,
        } => {
            if *success {
                eprintln!("✅ Step {step_id} ({tool_name}): {output}");
            } else {
                eprintln!(
                    "❌ Step {step_id} ({tool_name}) failed: {}",
                    error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        ProgressEvent::Reflection {
            confidence,
            critique,
            ..
        } => eprintln!("🤔 Reflection ({confidence:.2}): {critique}"),
        ProgressEvent::Decision {
            action, reasoning, ..
        } => eprintln!("➡️  {action}: {reasoning}"),
        ProgressEvent::FinalAnswer { .. } => eprintln!("\n🏁 Done"),
        ProgressEvent::Error { message } => eprintln!("⚠️  {message}"),
    }
}
