//! Final answer synthesis

use switchboard_llm::{CompletionRequest, Message};
use tracing::debug;

use super::core::Orchestrator;
use crate::error::Result;
use crate::task_store::StepOutcome;

const SYNTHESIS_PROMPT: &str = "You combine the work of several specialist agents into one \
answer for the user. Use the agents' results, mention any step that failed, and reply with \
the final answer only.";

/// Plain-text transcript of a finished plan
pub(super) fn transcript(request: &str, analysis: &str, outcomes: &[StepOutcome]) -> String {
    let mut text = format!("Original request:\n{}\n\nAnalysis:\n{}\n\nAgent results:", request, analysis);

    if outcomes.is_empty() {
        text.push_str("\n(none)");
    }
    for outcome in outcomes {
        let result = &outcome.result;
        if result.success {
            text.push_str(&format!(
                "\n[{}] {} ({}): {}",
                outcome.step_id,
                result.agent_name,
                outcome.agent_id,
                result.text()
            ));
        } else {
            text.push_str(&format!(
                "\n[{}] {} ({}): FAILED: {}",
                outcome.step_id,
                result.agent_name,
                outcome.agent_id,
                result.text()
            ));
        }
    }

    text
}

impl Orchestrator {
    /// One completion over the transcript. Errors here are fatal to the task.
    pub(super) async fn synthesize(
        &self,
        request: &str,
        analysis: &str,
        outcomes: &[StepOutcome],
    ) -> Result<String> {
        let mut completion = CompletionRequest::new(vec![
            Message::system(SYNTHESIS_PROMPT),
            Message::user(transcript(request, analysis, outcomes)),
        ]);
        if let Some(max_tokens) = self.config.synthesis_max_tokens {
            completion = completion.with_max_tokens(max_tokens);
        }

        debug!(results = outcomes.len(), "Synthesizing final answer");
        let response = self.provider.complete(completion).await?;
        Ok(response.content)
    }
}
