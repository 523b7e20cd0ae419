//! GroundQA SPARQL: the graph side of grounded question answering.
//!
//! ```text
//!   StructuredQuery ──► SparqlClient ──HTTP GET──► endpoint (DBpedia)
//!                                                      │
//!   FactSet ◄──── validate ◄──── sparql-results+json ◄─┘
//! ```
//!
//! The query text is passed through opaquely; only the result set is
//! checked. Everything downstream talks to the graph through
//! [`KnowledgeGraph`] so tests can substitute [`MockGraph`].

pub mod client;
pub mod error;
pub mod mock;
pub mod results;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::{
    SparqlClient, SparqlConfig, DEFAULT_SPARQL_ENDPOINT, DEFAULT_SPARQL_TIMEOUT_MS,
    GROUNDQA_SPARQL_ENDPOINT_ENV, GROUNDQA_SPARQL_TIMEOUT_MS_ENV, SPARQL_RESULTS_JSON,
};
pub use error::GraphServiceError;
pub use mock::{MockGraph, MockGraphReply};
pub use results::{Binding, FactSet, Term, TermKind};

/// A query in the graph query language. Never inspected, only forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredQuery(String);

impl StructuredQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StructuredQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A queryable knowledge graph.
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    /// Execute one query. Exactly one remote call, no retries.
    async fn execute(&self, query: &StructuredQuery) -> Result<FactSet, GraphServiceError>;

    /// Short label for logs and status lines.
    fn describe(&self) -> String;
}
