//! `groundqa ask` and `groundqa sparql`: run the pipeline and render results.

use anyhow::{anyhow, Result};
use colored::Colorize;
use groundqa_pipeline::{AnswerKind, Orchestrator, PipelineState, RunContext};
use groundqa_sparql::{FactSet, KnowledgeGraph, SparqlClient, StructuredQuery};
use std::sync::Arc;

use crate::config::ResolvedConfig;

const MAX_TABLE_ROWS: usize = 20;

pub fn build_orchestrator(config: &ResolvedConfig) -> Result<Arc<Orchestrator>> {
    let provider = groundqa_llm::create_provider(config.llm.clone())
        .map_err(|e| anyhow!("failed to create LLM client: {e}"))?;
    let graph = SparqlClient::new(config.sparql.clone())
        .map_err(|e| anyhow!("failed to create SPARQL client: {e}"))?;
    Ok(Arc::new(Orchestrator::new(
        provider,
        Arc::new(graph),
        config.pipeline(),
    )))
}

/// Answer one question, printing each stage as it is entered.
pub async fn ask_live(orchestrator: Arc<Orchestrator>, question: &str) -> Result<()> {
    let mut rx = orchestrator.subscribe();
    let previous = rx.borrow_and_update().run_id;
    let mut handle = orchestrator.clone().spawn_answer(question.to_string());

    let mut shown = 0usize;
    let joined = loop {
        {
            let run = rx.borrow_and_update();
            if run.run_id != previous {
                for state in run.transitions.iter().skip(shown) {
                    eprintln!("{}", render_transition(*state, &run));
                }
                shown = run.transitions.len();
            }
        }
        tokio::select! {
            joined = &mut handle => break joined,
            changed = rx.changed() => {
                if changed.is_err() {
                    break (&mut handle).await;
                }
            }
        }
    };

    let run = joined
        .map_err(|e| anyhow!("pipeline task failed: {e}"))?
        .map_err(|e| anyhow!("{e}"))?;
    if let Some(run) = run {
        for state in run.transitions.iter().skip(shown) {
            eprintln!("{}", render_transition(*state, &run));
        }
        println!("{}", render_run(&run));
    }
    Ok(())
}

/// Answer one question and print the whole run as JSON.
pub async fn ask_json(orchestrator: &Orchestrator, question: &str) -> Result<()> {
    let run = orchestrator
        .answer(question)
        .await
        .map_err(|e| anyhow!("{e}"))?;
    match run {
        Some(run) => println!("{}", serde_json::to_string_pretty(&run)?),
        None => println!("null"),
    }
    Ok(())
}

pub async fn cmd_sparql(client: &SparqlClient, query: &str, json: bool) -> Result<()> {
    let query = StructuredQuery::new(query.trim());
    if query.as_str().is_empty() {
        return Err(anyhow!("empty query"));
    }
    eprintln!("{} {}", "Querying".green().bold(), client.describe());
    let facts = client
        .execute(&query)
        .await
        .map_err(|e| anyhow!("{e}"))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&facts.to_json_value())?);
    } else {
        println!("{}", render_facts(&facts, MAX_TABLE_ROWS));
    }
    Ok(())
}

fn render_transition(state: PipelineState, run: &RunContext) -> String {
    let label = match state {
        PipelineState::Idle => return String::new(),
        PipelineState::SynthesizingQuery => "Generating SPARQL query...".to_string(),
        PipelineState::QueryingGraph => "Querying knowledge graph...".to_string(),
        PipelineState::SynthesizingAnswer => match &run.facts {
            Some(facts) => format!("Synthesizing answer from {} result rows...", facts.len()),
            None => "Synthesizing answer...".to_string(),
        },
        PipelineState::Done => "Done.".to_string(),
        PipelineState::Error => "Stage failed.".to_string(),
    };
    format!("{} {}", "→".yellow(), label.dimmed())
}

pub fn render_run(run: &RunContext) -> String {
    let mut out = String::new();

    if let Some(query) = &run.structured_query {
        out.push_str(&format!("{}\n{}\n\n", "SPARQL".cyan().bold(), query));
    }
    if let Some(facts) = &run.facts {
        out.push_str(&format!(
            "{}\n{}\n\n",
            "Facts".cyan().bold(),
            render_facts(facts, MAX_TABLE_ROWS)
        ));
    }
    if let Some(error) = &run.error {
        out.push_str(&format!("{} {}\n\n", "error:".red().bold(), error));
    }
    if let Some(answer) = &run.answer {
        let heading = match answer.kind {
            AnswerKind::Grounded => "Answer".green().bold(),
            AnswerKind::NoFacts => "Answer (no facts found)".yellow().bold(),
            AnswerKind::General => "Answer (ungrounded)".yellow().bold(),
        };
        out.push_str(&format!("{heading}\n{}", answer.text));
    }
    out.trim_end().to_string()
}

/// Tab-separated table of bindings, URIs shortened to their local name.
pub fn render_facts(facts: &FactSet, max_rows: usize) -> String {
    if facts.is_empty() {
        return "(no results)".to_string();
    }
    let mut lines = vec![facts.vars().join("\t")];
    for binding in facts.bindings().iter().take(max_rows) {
        let row: Vec<&str> = facts
            .vars()
            .iter()
            .map(|var| binding.get(var).map(|t| t.display_value()).unwrap_or("-"))
            .collect();
        lines.push(row.join("\t"));
    }
    if facts.len() > max_rows {
        lines.push(format!("... {} more rows", facts.len() - max_rows));
    }
    lines.join("\n")
}
