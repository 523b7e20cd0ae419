//! (Question, facts) → grounded answer.

use groundqa_llm::{CompletionRequest, LLMProvider};
use groundqa_sparql::FactSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{complete_text, SynthesisError, SynthesisTask};
use crate::state::{Answer, AnswerKind};

/// Balances faithfulness to the facts with natural phrasing.
pub const ANSWER_TEMPERATURE: f32 = 0.5;

pub const DEFAULT_MAX_PROMPT_BINDINGS: usize = 100;

/// Returned verbatim when the graph produced no bindings.
pub const NO_FACTS_MESSAGE: &str = "I couldn't find any specific facts in the knowledge graph for your question. I'll try to answer based on my general knowledge, but it might not be precise. \n\nLet me try: ";

const ANSWER_PROMPT: &str = r#"You are a helpful question answering assistant.
Give a clear, concise, natural language answer to the user's question using *only* the factual data below, which was retrieved from a knowledge graph.
Do not add any information that is not present in the data.
If the data is insufficient to answer the question, say that you cannot answer with the given facts."#;

pub struct AnswerSynthesizer {
    provider: Arc<dyn LLMProvider>,
    timeout: Option<Duration>,
    max_prompt_bindings: usize,
}

impl AnswerSynthesizer {
    pub fn new(provider: Arc<dyn LLMProvider>, timeout: Option<Duration>) -> Self {
        Self {
            provider,
            timeout,
            max_prompt_bindings: DEFAULT_MAX_PROMPT_BINDINGS,
        }
    }

    pub fn max_prompt_bindings(mut self, n: usize) -> Self {
        self.max_prompt_bindings = n.max(1);
        self
    }

    pub fn prompt(&self, question: &str, facts: &FactSet) -> String {
        let mut prompt = format!(
            "{ANSWER_PROMPT}\n\nUser's original question: \"{question}\"\n\nFactual data:\n{}",
            facts.bindings_json(self.max_prompt_bindings)
        );
        let omitted = facts.len().saturating_sub(self.max_prompt_bindings);
        if omitted > 0 {
            prompt.push_str(&format!(
                "\n\n({omitted} further result rows were omitted for length.)"
            ));
        }
        prompt
    }

    /// Zero bindings short-circuits to [`NO_FACTS_MESSAGE`] without an LLM call.
    pub async fn synthesize_from_facts(
        &self,
        question: &str,
        facts: &FactSet,
    ) -> Result<Answer, SynthesisError> {
        if facts.is_empty() {
            info!("no graph facts; returning canned answer");
            return Ok(Answer::new(AnswerKind::NoFacts, NO_FACTS_MESSAGE));
        }

        let request = CompletionRequest::prompt(self.prompt(question, facts))
            .with_temperature(ANSWER_TEMPERATURE);
        let text = complete_text(
            self.provider.as_ref(),
            request,
            SynthesisTask::Answer,
            self.timeout,
        )
        .await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(SynthesisError::EmptyCompletion {
                task: SynthesisTask::Answer,
            });
        }
        info!(bindings = facts.len(), "grounded answer synthesized");
        Ok(Answer::new(AnswerKind::Grounded, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundqa_llm::MockProvider;
    use groundqa_sparql::{Binding, Term};

    fn director_facts(rows: usize) -> FactSet {
        let bindings = (0..rows)
            .map(|i| {
                Binding::new().with(
                    "director",
                    Term::uri(format!("http://dbpedia.org/resource/Director_{i}")),
                )
            })
            .collect();
        FactSet::new(vec!["director".to_string()], bindings).unwrap()
    }

    #[tokio::test]
    async fn empty_facts_skip_the_llm() {
        let provider = Arc::new(MockProvider::failing("must not be called"));
        let synth = AnswerSynthesizer::new(provider.clone(), None);

        let answer = synth
            .synthesize_from_facts("Who directed Inception?", &FactSet::default())
            .await
            .unwrap();

        assert_eq!(answer.kind, AnswerKind::NoFacts);
        assert_eq!(answer.text, NO_FACTS_MESSAGE);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn facts_are_embedded_at_moderate_temperature() {
        let provider = Arc::new(MockProvider::always("  Director_0 directed it.\n"));
        let synth = AnswerSynthesizer::new(provider.clone(), None);

        let answer = synth
            .synthesize_from_facts("Who directed Inception?", &director_facts(1))
            .await
            .unwrap();

        assert_eq!(answer.kind, AnswerKind::Grounded);
        assert_eq!(answer.text, "Director_0 directed it.");

        let request = &provider.requests()[0];
        assert_eq!(request.temperature, Some(ANSWER_TEMPERATURE));
        let prompt = request.user_text();
        assert!(prompt.contains("*only*"));
        assert!(prompt.contains("http://dbpedia.org/resource/Director_0"));
    }

    #[test]
    fn prompt_caps_bindings() {
        let synth = AnswerSynthesizer::new(Arc::new(MockProvider::always("")), None)
            .max_prompt_bindings(2);
        let prompt = synth.prompt("q", &director_facts(5));

        assert!(prompt.contains("Director_1"));
        assert!(!prompt.contains("Director_2"));
        assert!(prompt.contains("3 further result rows were omitted"));
    }

    #[tokio::test]
    async fn llm_failure_is_synthesis_error() {
        let synth = AnswerSynthesizer::new(Arc::new(MockProvider::failing("boom")), None);
        let err = synth
            .synthesize_from_facts("q", &director_facts(1))
            .await
            .unwrap_err();
        assert_eq!(err.task(), SynthesisTask::Answer);
    }
}
