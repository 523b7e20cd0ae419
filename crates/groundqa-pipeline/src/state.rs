//! Run state: the value observers see at every transition.

use chrono::{DateTime, Utc};
use groundqa_sparql::{FactSet, StructuredQuery};
use serde::Serialize;
use uuid::Uuid;

/// Stage of one pipeline run.
///
/// ```text
/// IDLE → SYNTHESIZING_QUERY → QUERYING_GRAPH → SYNTHESIZING_ANSWER → DONE
///              │                    │                  │
///              └────────────────────┴──────────────────┴──► ERROR
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Idle,
    SynthesizingQuery,
    QueryingGraph,
    SynthesizingAnswer,
    Done,
    Error,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Idle => "IDLE",
            PipelineState::SynthesizingQuery => "SYNTHESIZING_QUERY",
            PipelineState::QueryingGraph => "QUERYING_GRAPH",
            PipelineState::SynthesizingAnswer => "SYNTHESIZING_ANSWER",
            PipelineState::Done => "DONE",
            PipelineState::Error => "ERROR",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Error)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    /// Built from graph facts.
    Grounded,
    /// The graph returned nothing; canned message.
    NoFacts,
    /// Ungrounded fallback.
    General,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub kind: AnswerKind,
    pub text: String,
}

impl Answer {
    pub fn new(kind: AnswerKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Which service a stage failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    GraphService,
    Synthesis,
}

/// Why a run ended in `ERROR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunError {
    /// The working stage that failed.
    pub stage: PipelineState,
    pub kind: FailureKind,
    pub message: String,
    /// Set when the fallback attempt failed too.
    pub fallback_error: Option<String>,
}

impl RunError {
    pub fn fallback_failed(&self) -> bool {
        self.fallback_error.is_some()
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.fallback_error {
            None => write!(
                f,
                "Error at step {}: {}. Attempting to generate a general answer.",
                self.stage, self.message
            ),
            Some(fallback) => write!(
                f,
                "The entire pipeline failed. Initial error: {}. Fallback error: {}",
                self.message, fallback
            ),
        }
    }
}

/// Everything known about the current run.
///
/// Only the orchestrator mutates it; observers get clones.
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    pub run_id: Uuid,
    pub question: String,
    pub state: PipelineState,
    /// Every state entered by this run, in order.
    pub transitions: Vec<PipelineState>,
    pub structured_query: Option<StructuredQuery>,
    pub facts: Option<FactSet>,
    pub answer: Option<Answer>,
    pub error: Option<RunError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            run_id: Uuid::nil(),
            question: String::new(),
            state: PipelineState::Idle,
            transitions: Vec::new(),
            structured_query: None,
            facts: None,
            answer: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

impl RunContext {
    /// Fresh run, already in `SYNTHESIZING_QUERY`.
    pub(crate) fn begin(question: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            question: question.to_string(),
            state: PipelineState::SynthesizingQuery,
            transitions: vec![PipelineState::SynthesizingQuery],
            ..Self::default()
        }
    }

    fn enter(&mut self, state: PipelineState) {
        self.state = state;
        self.transitions.push(state);
    }

    pub(crate) fn query_ready(&mut self, query: StructuredQuery) {
        self.structured_query = Some(query);
        self.enter(PipelineState::QueryingGraph);
    }

    pub(crate) fn facts_ready(&mut self, facts: FactSet) {
        self.facts = Some(facts);
        self.enter(PipelineState::SynthesizingAnswer);
    }

    pub(crate) fn done(&mut self, answer: Answer) {
        self.answer = Some(answer);
        self.enter(PipelineState::Done);
        self.finished_at = Some(Utc::now());
    }

    /// Enter `ERROR` from the current working stage. Earlier results stay.
    pub(crate) fn fail(&mut self, kind: FailureKind, message: String) {
        self.error = Some(RunError {
            stage: self.state,
            kind,
            message,
            fallback_error: None,
        });
        self.enter(PipelineState::Error);
    }

    pub(crate) fn fallback_answer(&mut self, answer: Answer) {
        self.answer = Some(answer);
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn fallback_failed(&mut self, message: String) {
        if let Some(error) = self.error.as_mut() {
            error.fallback_error = Some(message);
        }
        self.finished_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Finished, including the fallback attempt after an error.
    pub fn is_settled(&self) -> bool {
        self.finished_at.is_some()
    }

    /// User-facing error text, if the run failed.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}
