//! Scripted [`KnowledgeGraph`] for tests and offline demos.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::{FactSet, GraphServiceError, KnowledgeGraph, StructuredQuery};

#[derive(Debug, Clone)]
pub enum MockGraphReply {
    Facts(FactSet),
    Error(GraphServiceError),
}

/// Replays scripted replies and records the queries it was asked.
pub struct MockGraph {
    script: Mutex<VecDeque<MockGraphReply>>,
    fallback: MockGraphReply,
    queries: Mutex<Vec<StructuredQuery>>,
}

impl MockGraph {
    pub fn new(replies: Vec<MockGraphReply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            fallback: MockGraphReply::Facts(FactSet::default()),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with `facts`.
    pub fn returning(facts: FactSet) -> Self {
        Self {
            fallback: MockGraphReply::Facts(facts),
            ..Self::new(Vec::new())
        }
    }

    /// Always fails with `error`.
    pub fn failing(error: GraphServiceError) -> Self {
        Self {
            fallback: MockGraphReply::Error(error),
            ..Self::new(Vec::new())
        }
    }

    pub fn queries(&self) -> Vec<StructuredQuery> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl KnowledgeGraph for MockGraph {
    async fn execute(&self, query: &StructuredQuery) -> Result<FactSet, GraphServiceError> {
        self.queries.lock().push(query.clone());
        let reply = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match reply {
            MockGraphReply::Facts(facts) => Ok(facts),
            MockGraphReply::Error(e) => Err(e),
        }
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}
