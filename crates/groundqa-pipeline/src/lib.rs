//! GroundQA pipeline: answer questions from knowledge-graph facts.
//!
//! ```text
//!   question ──► QuerySynthesizer ──► KnowledgeGraph ──► AnswerSynthesizer ──► answer
//!                      │                    │                   │
//!                      └────── failure ─────┴───────────────────┘
//!                                   │
//!                                   ▼
//!                        GeneralKnowledgeFallback ──► disclaimed answer
//! ```
//!
//! [`Orchestrator`] owns the run state and publishes a [`RunContext`] on a
//! `tokio::sync::watch` channel at every transition.

pub mod orchestrator;
pub mod state;
pub mod synthesis;

pub use orchestrator::{Orchestrator, OrchestratorError, PipelineConfig};
pub use state::{Answer, AnswerKind, FailureKind, PipelineState, RunContext, RunError};
pub use synthesis::{
    strip_code_fences, AnswerSynthesizer, GeneralKnowledgeFallback, QuerySynthesizer,
    SynthesisError, SynthesisTask, NO_FACTS_MESSAGE, UNGROUNDED_DISCLAIMER,
};
