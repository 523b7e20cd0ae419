//! GroundQA CLI
//!
//! Answers natural-language questions from knowledge-graph facts:
//! - `ask`: question → SPARQL → facts → grounded answer (general answer on failure)
//! - `sparql`: run a raw SPARQL query against the configured endpoint
//! - `repl`: interactive question loop
//! - `config`: show the resolved provider and endpoint

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use groundqa_sparql::SparqlClient;
use tracing::Level;

mod ask;
mod config;
mod repl;

use config::GlobalArgs;

#[derive(Parser)]
#[command(name = "groundqa")]
#[command(
    author,
    version,
    about = "GroundQA: knowledge-graph-grounded question answering"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question from DBpedia facts.
    ///
    /// Falls back to an ungrounded LLM answer (clearly marked) when query
    /// generation, the graph query, or answer synthesis fails.
    Ask {
        /// The question, in plain language
        question: String,
        /// Print the whole run (query, facts, answer, error) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute a SPARQL query directly and print the result rows.
    Sparql {
        /// SPARQL query text
        query: String,
        /// Print the raw SPARQL JSON result set
        #[arg(long)]
        json: bool,
    },

    /// Interactive question loop.
    Repl,

    /// Show the resolved LLM provider and SPARQL endpoint.
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))?;

    match cli.command {
        Commands::Ask { question, json } => {
            if question.trim().is_empty() {
                eprintln!("{} nothing to ask", "info:".yellow().bold());
                return Ok(());
            }
            let config = config::resolve(&cli.global)?;
            let orchestrator = ask::build_orchestrator(&config)?;
            if json {
                rt.block_on(ask::ask_json(&orchestrator, &question))?;
            } else {
                rt.block_on(ask::ask_live(orchestrator, &question))?;
            }
        }
        Commands::Sparql { query, json } => {
            let sparql = config::resolve_sparql_only(&cli.global)?;
            let client = SparqlClient::new(sparql).map_err(|e| anyhow!("{e}"))?;
            rt.block_on(ask::cmd_sparql(&client, &query, json))?;
        }
        Commands::Repl => {
            let config = config::resolve(&cli.global)?;
            repl::cmd_repl(rt, config)?;
        }
        Commands::Config => {
            let config = config::resolve(&cli.global)?;
            for status in config.status_lines() {
                println!("{status}");
            }
        }
    }

    Ok(())
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
