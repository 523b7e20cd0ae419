//! Drives one question through the pipeline and publishes every transition.

use groundqa_llm::{LLMProvider, DEFAULT_LLM_TIMEOUT_SECS};
use groundqa_sparql::{GraphServiceError, KnowledgeGraph};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::{Answer, FailureKind, RunContext};
use crate::synthesis::answer::DEFAULT_MAX_PROMPT_BINDINGS;
use crate::synthesis::{
    AnswerSynthesizer, GeneralKnowledgeFallback, QuerySynthesizer, SynthesisError,
};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bound on every LLM call; `None` waits indefinitely.
    pub llm_timeout: Option<Duration>,
    /// Rows of the FactSet embedded in the answer prompt.
    pub max_prompt_bindings: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            llm_timeout: Some(Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS)),
            max_prompt_bindings: DEFAULT_MAX_PROMPT_BINDINGS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorError {
    #[error("a question is already being answered; wait for it to finish")]
    Busy,
}

/// Failure of a grounded stage, before it is folded into the run's error.
#[derive(Debug, thiserror::Error)]
enum StageFailure {
    #[error(transparent)]
    Graph(#[from] GraphServiceError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

impl StageFailure {
    fn kind(&self) -> FailureKind {
        match self {
            StageFailure::Graph(_) => FailureKind::GraphService,
            StageFailure::Synthesis(_) => FailureKind::Synthesis,
        }
    }
}

/// Owns the current [`RunContext`] and runs at most one question at a time.
pub struct Orchestrator {
    graph: Arc<dyn KnowledgeGraph>,
    query: QuerySynthesizer,
    answer: AnswerSynthesizer,
    fallback: GeneralKnowledgeFallback,
    state: watch::Sender<RunContext>,
    in_flight: Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        graph: Arc<dyn KnowledgeGraph>,
        config: PipelineConfig,
    ) -> Self {
        let (state, _) = watch::channel(RunContext::default());
        Self {
            graph,
            query: QuerySynthesizer::new(provider.clone(), config.llm_timeout),
            answer: AnswerSynthesizer::new(provider.clone(), config.llm_timeout)
                .max_prompt_bindings(config.max_prompt_bindings),
            fallback: GeneralKnowledgeFallback::new(provider, config.llm_timeout),
            state,
            in_flight: Mutex::new(()),
        }
    }

    /// Receives a clone of the run after every transition.
    pub fn subscribe(&self) -> watch::Receiver<RunContext> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> RunContext {
        self.state.borrow().clone()
    }

    /// Answer `question`, returning the settled run.
    ///
    /// Blank input is ignored (`Ok(None)`, no transition). A call made while
    /// another run is in flight is rejected with [`OrchestratorError::Busy`]
    /// and leaves that run untouched. Stage failures never surface here;
    /// they are recorded in the returned [`RunContext`].
    pub async fn answer(&self, question: &str) -> Result<Option<RunContext>, OrchestratorError> {
        let question = question.trim();
        if question.is_empty() {
            debug!("ignoring empty question");
            return Ok(None);
        }
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| OrchestratorError::Busy)?;

        let mut run = RunContext::begin(question);
        info!(run_id = %run.run_id, question, "pipeline run started");
        self.publish(&run);

        match self.run_grounded(&mut run).await {
            Ok(answer) => {
                run.done(answer);
                info!(run_id = %run.run_id, "pipeline run done");
                self.publish(&run);
            }
            Err(failure) => {
                warn!(
                    run_id = %run.run_id,
                    stage = %run.state,
                    error = %failure,
                    "pipeline stage failed; falling back to general answer"
                );
                run.fail(failure.kind(), failure.to_string());
                self.publish(&run);

                match self.fallback.synthesize_general(&run.question).await {
                    Ok(answer) => run.fallback_answer(answer),
                    Err(e) => {
                        warn!(run_id = %run.run_id, error = %e, "fallback failed");
                        run.fallback_failed(e.to_string());
                    }
                }
                self.publish(&run);
            }
        }

        Ok(Some(run))
    }

    /// Run [`Orchestrator::answer`] on the tokio runtime; observe via [`Orchestrator::subscribe`].
    pub fn spawn_answer(
        self: Arc<Self>,
        question: impl Into<String>,
    ) -> JoinHandle<Result<Option<RunContext>, OrchestratorError>> {
        let question = question.into();
        tokio::spawn(async move { self.answer(&question).await })
    }

    async fn run_grounded(&self, run: &mut RunContext) -> Result<Answer, StageFailure> {
        let query = self.query.synthesize(&run.question).await?;
        debug!(run_id = %run.run_id, %query, "structured query");
        run.query_ready(query.clone());
        self.publish(run);

        let facts = self.graph.execute(&query).await?;
        info!(
            run_id = %run.run_id,
            graph = %self.graph.describe(),
            bindings = facts.len(),
            "graph query returned"
        );
        run.facts_ready(facts.clone());
        self.publish(run);

        Ok(self.answer.synthesize_from_facts(&run.question, &facts).await?)
    }

    fn publish(&self, run: &RunContext) {
        self.state.send_replace(run.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AnswerKind, PipelineState};
    use groundqa_llm::{MockProvider, MockReply};
    use groundqa_sparql::{Binding, FactSet, MockGraph, Term};

    fn inception_facts() -> FactSet {
        FactSet::new(
            vec!["director".to_string()],
            vec![Binding::new().with(
                "director",
                Term::uri("http://dbpedia.org/resource/Christopher_Nolan"),
            )],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_whitespace_question_is_noop() {
        let provider = Arc::new(MockProvider::failing("must not be called"));
        let orch = Orchestrator::new(
            provider.clone(),
            Arc::new(MockGraph::returning(inception_facts())),
            PipelineConfig::default(),
        );

        assert_eq!(orch.answer("   \n\t").await.unwrap().map(|r| r.state), None);
        assert_eq!(orch.snapshot().state, PipelineState::Idle);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_answer_synthesis_failure_keeps_facts() {
        let provider = Arc::new(MockProvider::new(vec![
            MockReply::Text("SELECT ?director WHERE { dbr:Inception dbo:director ?director }".into()),
            MockReply::Error("overloaded".into()),
            MockReply::Text("Christopher Nolan.".into()),
        ]));
        let orch = Orchestrator::new(
            provider,
            Arc::new(MockGraph::returning(inception_facts())),
            PipelineConfig::default(),
        );

        let run = orch.answer("Who directed Inception?").await.unwrap().unwrap();

        assert_eq!(run.state, PipelineState::Error);
        let error = run.error.as_ref().unwrap();
        assert_eq!(error.stage, PipelineState::SynthesizingAnswer);
        assert_eq!(error.kind, FailureKind::Synthesis);
        assert_eq!(run.facts, Some(inception_facts()));
        assert_eq!(run.answer.as_ref().unwrap().kind, AnswerKind::General);
    }

    #[tokio::test]
    async fn test_snapshot_tracks_settled_run() {
        let orch = Orchestrator::new(
            Arc::new(MockProvider::always("SELECT ?s WHERE { ?s ?p ?o }")),
            Arc::new(MockGraph::returning(FactSet::default())),
            PipelineConfig::default(),
        );

        let run = orch.answer("Anything?").await.unwrap().unwrap();
        let snapshot = orch.snapshot();

        assert_eq!(snapshot.run_id, run.run_id);
        assert_eq!(snapshot.state, PipelineState::Done);
        assert!(snapshot.is_settled());
    }
}
