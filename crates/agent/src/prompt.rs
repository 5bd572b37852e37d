//! Prompt rendering for planner, reflector and intent router.

use planloop_core::plan::{HistoryEntry, PLACEHOLDER, Plan, Step};
use planloop_core::text::{render_value, truncate_chars};
use planloop_core::tool::{CapabilitySpec, ParamKind};

pub const PLANNER_SYSTEM: &str = "You are a meticulous research planner. Break the user's goal \
into a short sequence of concrete tool invocations and reply with a single JSON object. \
Never invent tools or parameters.";

pub const REFLECTOR_SYSTEM: &str = "You are a strict evaluator of tool results. Judge whether \
the last executed step produced something that actually serves the user's goal and reply \
with a single JSON object.";

pub const INTENT_SYSTEM: &str = "You classify user requests for a research assistant. Reply \
with exactly one word.";

pub const CONVERSATION_SYSTEM: &str = "You are a friendly research assistant. Reply briefly \
and politely.";

/// Refusal for requests outside the assistant's domain.
pub const OUT_OF_DOMAIN_REPLY: &str = "Sorry, I am a research assistant focused on my record \
catalog and its literature, so I cannot help with questions outside that domain.";

const PLANNER_EXAMPLE: &str = r#"Goal: "Find papers about TFN membranes published after 2022 and summarize their advantages over TFC membranes."

```json
{
  "goal": "Find papers about TFN membranes published after 2022 and summarize their advantages over TFC membranes.",
  "steps": [
    {
      "step_id": 1,
      "tool_name": "record_finder",
      "tool_input": {"name_like": "TFN", "min_year": 2022},
      "reasoning": "Precise lookup of the papers matching both explicit conditions."
    },
    {
      "step_id": 2,
      "tool_name": "semantic_search",
      "tool_input": {
        "context": "__PREVIOUS_STEP_RESULT__",
        "query": "Based on these papers, summarize the advantages of TFN over TFC membranes."
      },
      "reasoning": "Read the papers found in step 1 and answer the second half of the goal."
    }
  ]
}
```"#;

fn kind_name(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::String => "string",
        ParamKind::Integer => "integer",
        ParamKind::Number => "number",
        ParamKind::Boolean => "boolean",
        ParamKind::Array => "array",
        ParamKind::Object => "object",
        ParamKind::Any => "any",
    }
}

/// Render the capability catalog for the planner.
pub fn render_catalog(catalog: &[CapabilitySpec]) -> String {
    let mut out = String::new();
    for (i, spec) in catalog.iter().enumerate() {
        out.push_str(&format!("{}. `{}`: {}\n", i + 1, spec.name, spec.description));
        for param in &spec.parameters {
            out.push_str(&format!(
                "   - `{}` ({}, {}): {}\n",
                param.name,
                kind_name(param.kind),
                if param.required { "required" } else { "optional" },
                param.description
            ));
        }
    }
    out
}

/// Condense history for the planner: one line per entry, results truncated.
pub fn condense_history(history: &[HistoryEntry], max_result_chars: usize) -> String {
    history
        .iter()
        .map(|entry| match entry {
            HistoryEntry::Step(step) => condense_step(step, max_result_chars),
            HistoryEntry::Reflection(r) => format!(
                "- Reflection on step {}: success={}, confidence={:.2}. Critique: {} Suggestion: {}",
                r.step_id, r.is_success, r.confidence, r.critique, r.suggestion
            ),
            HistoryEntry::Action(a) => format!("- Decision: {}. {}", a.action_type, a.reasoning),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn condense_step(step: &Step, max_result_chars: usize) -> String {
    let outcome = if step.is_success {
        let result = step.result.as_ref().map(render_value).unwrap_or_default();
        format!("succeeded: {}", truncate_chars(&result, max_result_chars))
    } else {
        format!(
            "failed: {}",
            truncate_chars(step.error_message.as_deref().unwrap_or(""), max_result_chars)
        )
    };
    format!(
        "- Step {} `{}` with {} {}",
        step.step_id, step.tool_name, step.tool_input, outcome
    )
}

pub fn planner(goal: &str, catalog: &[CapabilitySpec], history: &str) -> String {
    let history_block = if history.is_empty() {
        String::new()
    } else {
        format!(
            "\n# Previous attempts\nEarlier plans did not reach the goal. Learn from this \
             history and avoid repeating failed steps:\n{history}\n"
        )
    };

    format!(
        "# Available tools\n{catalog}\n\
         # Rules\n\
         - Use only the tools and parameters listed above.\n\
         - For \"find X, then summarize X\" goals, plan two steps: a precise lookup, then a \
         reading step.\n\
         - To feed a step with the previous step's result, use the literal string \
         \"{PLACEHOLDER}\" as the parameter value.\n\
         - Number steps from 1 without gaps.\n\
         - Reply with one JSON object with `goal` and `steps`; each step has `step_id`, \
         `tool_name`, `tool_input` and `reasoning`.\n\n\
         # Example\n{PLANNER_EXAMPLE}\n{history_block}\n\
         # Task\nGoal: {goal}\n",
        catalog = render_catalog(catalog),
    )
}

pub fn reflector(goal: &str, plan: Option<&Plan>, step: &Step) -> String {
    let plan_json = plan
        .and_then(|p| serde_json::to_string_pretty(p).ok())
        .unwrap_or_else(|| "null".into());
    let step_json = serde_json::to_string_pretty(step).unwrap_or_default();

    format!(
        "# Goal\n{goal}\n\n# Plan\n```json\n{plan_json}\n```\n\n\
         # Just executed\n```json\n{step_json}\n```\n\n\
         # Reply format\n\
         {{\"critique\": \"short critical assessment\", \"is_success\": true, \
         \"confidence\": 0.9, \"suggestion\": \"concrete next move\", \"is_finished\": false}}\n\n\
         `is_success` says whether this step's result is useful toward the goal, \
         `confidence` (0.0 to 1.0) how sure you are, and `is_finished` whether the whole goal \
         is already answered. Optionally add `corrected_input` with a fixed `tool_input` \
         if only the parameters were wrong.\n"
    )
}

pub fn intent(goal: &str) -> String {
    format!(
        "Classify the request into one of:\n\
         - `domain_question`: a research question about the records, materials or literature\n\
         - `conversation`: greetings, small talk, or questions about the assistant itself\n\
         - `out_of_domain`: anything else (history, finance, entertainment...)\n\n\
         Request: \"{goal}\"\nAnswer:"
    )
}

/// Follow-up sent after an unusable reply.
pub fn correction(reason: &str) -> String {
    format!(
        "Your previous reply could not be used: {reason}. Reply again with only the corrected \
         JSON object, with no other text."
    )
}
