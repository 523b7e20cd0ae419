//! Ungrounded answer, used when the grounded path fails.

use groundqa_llm::{CompletionRequest, LLMProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{complete_text, SynthesisError, SynthesisTask};
use crate::state::{Answer, AnswerKind};

/// Prefix on every fallback answer.
pub const UNGROUNDED_DISCLAIMER: &str = "The knowledge graph query failed. Here is a general answer from the LLM, which may be less factually grounded:\n\n";

pub struct GeneralKnowledgeFallback {
    provider: Arc<dyn LLMProvider>,
    timeout: Option<Duration>,
}

impl GeneralKnowledgeFallback {
    pub fn new(provider: Arc<dyn LLMProvider>, timeout: Option<Duration>) -> Self {
        Self { provider, timeout }
    }

    /// Raw question, no grounding instructions, provider-default temperature.
    pub async fn synthesize_general(&self, question: &str) -> Result<Answer, SynthesisError> {
        let text = complete_text(
            self.provider.as_ref(),
            CompletionRequest::prompt(question),
            SynthesisTask::General,
            self.timeout,
        )
        .await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(SynthesisError::EmptyCompletion {
                task: SynthesisTask::General,
            });
        }
        info!("general-knowledge answer synthesized");
        Ok(Answer::new(
            AnswerKind::General,
            format!("{UNGROUNDED_DISCLAIMER}{text}"),
        ))
    }
}
