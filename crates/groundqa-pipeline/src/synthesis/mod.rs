//! LLM-backed pipeline stages.
//!
//! All three stages share one completion call shape and differ only in
//! prompt and temperature:
//!
//! | stage | temperature |
//! |---|---|
//! | [`QuerySynthesizer`] | 0.1 |
//! | [`AnswerSynthesizer`] | 0.5 |
//! | [`GeneralKnowledgeFallback`] | provider default |

pub mod answer;
pub mod general;
pub mod query;

use groundqa_llm::{CompletionRequest, FinishReason, LLMError, LLMProvider};
use std::time::Duration;
use tracing::{debug, warn};

pub use answer::{AnswerSynthesizer, NO_FACTS_MESSAGE};
pub use general::{GeneralKnowledgeFallback, UNGROUNDED_DISCLAIMER};
pub use query::{strip_code_fences, QuerySynthesizer};

/// Which LLM call site failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisTask {
    Query,
    Answer,
    General,
}

impl std::fmt::Display for SynthesisTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SynthesisTask::Query => "SPARQL query generation",
            SynthesisTask::Answer => "grounded answer generation",
            SynthesisTask::General => "general answer generation",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("{task} failed: {source}")]
    Llm {
        task: SynthesisTask,
        #[source]
        source: LLMError,
    },
    #[error("{task} timed out after {}s", .after.as_secs())]
    Timeout { task: SynthesisTask, after: Duration },
    #[error("{task} returned no usable text")]
    EmptyCompletion { task: SynthesisTask },
    #[error("{task} was cut off at the output token limit")]
    Truncated { task: SynthesisTask },
}

impl SynthesisError {
    pub fn task(&self) -> SynthesisTask {
        match self {
            SynthesisError::Llm { task, .. }
            | SynthesisError::Timeout { task, .. }
            | SynthesisError::EmptyCompletion { task }
            | SynthesisError::Truncated { task } => *task,
        }
    }
}

/// Send one completion, bounded by `timeout` when set.
///
/// A query cut off at the token limit is an error; truncated prose is kept.
pub(crate) async fn complete_text(
    provider: &dyn LLMProvider,
    request: CompletionRequest,
    task: SynthesisTask,
    timeout: Option<Duration>,
) -> Result<String, SynthesisError> {
    debug!(%task, temperature = ?request.temperature, "llm completion");
    let call = provider.complete(request);
    let result = match timeout {
        Some(after) => match tokio::time::timeout(after, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%task, secs = after.as_secs(), "llm call timed out");
                return Err(SynthesisError::Timeout { task, after });
            }
        },
        None => call.await,
    };

    match result {
        Ok(response) => {
            debug!(
                %task,
                model = %response.model,
                prompt_tokens = response.usage.prompt_tokens,
                completion_tokens = response.usage.completion_tokens,
                "llm completion finished"
            );
            match response.finish_reason {
                FinishReason::Length if task == SynthesisTask::Query => {
                    warn!(%task, "llm output truncated");
                    return Err(SynthesisError::Truncated { task });
                }
                FinishReason::Length => warn!(%task, "llm output truncated, keeping partial text"),
                FinishReason::ContentFilter => warn!(%task, "llm output filtered by provider"),
                FinishReason::Stop => {}
            }
            Ok(response.content)
        }
        Err(LLMError::Timeout(after)) => Err(SynthesisError::Timeout { task, after }),
        Err(source) => {
            warn!(%task, error = %source, "llm call failed");
            Err(SynthesisError::Llm { task, source })
        }
    }
}
