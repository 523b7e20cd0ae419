//! Question → SPARQL.

use groundqa_llm::{CompletionRequest, LLMProvider};
use groundqa_sparql::StructuredQuery;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{complete_text, SynthesisError, SynthesisTask};

/// Near-deterministic: query syntax has to be exact.
pub const QUERY_TEMPERATURE: f32 = 0.1;

const QUERY_PROMPT: &str = r#"You are an expert in SPARQL and the DBpedia knowledge graph.
Translate the user's natural language question into one valid SPARQL query that retrieves the relevant facts from DBpedia.
Use the usual prefixes such as 'dbo:', 'dbp:', 'dbr:' and 'rdfs:'.
Return only the SPARQL query itself: no explanations, no markdown, no code fences, no other text."#;

pub struct QuerySynthesizer {
    provider: Arc<dyn LLMProvider>,
    timeout: Option<Duration>,
}

impl QuerySynthesizer {
    pub fn new(provider: Arc<dyn LLMProvider>, timeout: Option<Duration>) -> Self {
        Self { provider, timeout }
    }

    pub fn prompt(question: &str) -> String {
        format!("{QUERY_PROMPT}\n\nThe user's question is: \"{question}\"")
    }

    pub async fn synthesize(&self, question: &str) -> Result<StructuredQuery, SynthesisError> {
        let request = CompletionRequest::prompt(Self::prompt(question))
            .with_temperature(QUERY_TEMPERATURE);
        let raw = complete_text(
            self.provider.as_ref(),
            request,
            SynthesisTask::Query,
            self.timeout,
        )
        .await?;

        let text = strip_code_fences(&raw);
        if text.is_empty() {
            return Err(SynthesisError::EmptyCompletion {
                task: SynthesisTask::Query,
            });
        }
        info!(query_len = text.len(), "SPARQL query synthesized");
        Ok(StructuredQuery::new(text))
    }
}

/// Strip markdown code fences that models add despite being told not to.
///
/// Removes a leading fence (with an optional info string such as `sparql`)
/// and a trailing fence, trimming whitespace, until nothing changes. The
/// result is a fixed point, so applying it twice equals applying it once.
pub fn strip_code_fences(text: &str) -> String {
    let mut s = text.trim();
    loop {
        let before = s.len();
        if let Some(rest) = s.strip_prefix("```") {
            s = skip_info_string(rest).trim_start();
        }
        if let Some(rest) = s.strip_suffix("```") {
            s = rest.trim_end();
        }
        if s.len() == before {
            return s.to_string();
        }
    }
}

/// Words that open a SPARQL query and so can never be a fence tag.
const QUERY_KEYWORDS: [&str; 6] = ["SELECT", "ASK", "CONSTRUCT", "DESCRIBE", "PREFIX", "BASE"];

/// Drop a fence info string: a bare word ending the line, or `sparql` anywhere.
/// A SPARQL keyword alone on the fence line belongs to the query.
fn skip_info_string(rest: &str) -> &str {
    let tag_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(rest.len());
    if tag_len == 0 {
        return rest;
    }
    let (tag, after) = rest.split_at(tag_len);
    if tag.eq_ignore_ascii_case("sparql") {
        return after;
    }
    let is_keyword = QUERY_KEYWORDS.iter().any(|k| tag.eq_ignore_ascii_case(k));
    let ends_line = after.is_empty() || after.starts_with('\n') || after.starts_with("\r\n");
    if ends_line && !is_keyword {
        after
    } else {
        rest
    }
}
