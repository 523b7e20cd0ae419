//! Interactive question loop.
//!
//! By default we use `rustyline` for line editing and history.
//! A minimal stdin-based fallback exists behind `--no-default-features`.

#[cfg(feature = "repl-rustyline")]
use anyhow::anyhow;
use anyhow::Result;
use colored::Colorize;
use groundqa_pipeline::Orchestrator;
#[cfg(not(feature = "repl-rustyline"))]
use std::io::{self, Write};
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::ask;
use crate::config::ResolvedConfig;

const PROMPT: &str = "groundqa> ";

enum ReplControl {
    Continue,
    Exit,
}

/// One input line. Commands start with `:`; anything else is a question.
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Empty,
    Exit,
    Help,
    Config,
    Last,
    Question(&'a str),
}

fn parse_line(line: &str) -> ReplCommand<'_> {
    match line.trim() {
        "" => ReplCommand::Empty,
        "exit" | "quit" | ":q" | ":quit" => ReplCommand::Exit,
        ":help" | ":h" | ":?" => ReplCommand::Help,
        ":config" => ReplCommand::Config,
        ":last" => ReplCommand::Last,
        question => ReplCommand::Question(question),
    }
}

struct ReplState {
    rt: Runtime,
    orchestrator: Arc<Orchestrator>,
    config: ResolvedConfig,
}

pub fn cmd_repl(rt: Runtime, config: ResolvedConfig) -> Result<()> {
    let orchestrator = ask::build_orchestrator(&config)?;
    let state = ReplState {
        rt,
        orchestrator,
        config,
    };

    #[cfg(feature = "repl-rustyline")]
    {
        cmd_repl_rustyline(&state)
    }
    #[cfg(not(feature = "repl-rustyline"))]
    {
        cmd_repl_simple(&state)
    }
}

#[cfg(not(feature = "repl-rustyline"))]
fn cmd_repl_simple(state: &ReplState) -> Result<()> {
    print_banner();

    let stdin = io::stdin();
    loop {
        print!("{}", PROMPT.cyan().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }

        match dispatch_line(state, &line) {
            Ok(ReplControl::Continue) => {}
            Ok(ReplControl::Exit) => break,
            Err(e) => eprintln!("{} {e}", "error:".red().bold()),
        }
    }

    Ok(())
}

#[cfg(feature = "repl-rustyline")]
fn cmd_repl_rustyline(state: &ReplState) -> Result<()> {
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    print_banner();

    let mut rl = DefaultEditor::new().map_err(|e| anyhow!("failed to init rustyline: {e}"))?;

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(l) => l,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };

        if !line.trim().is_empty() {
            rl.add_history_entry(line.trim())
                .map_err(|e| anyhow!("failed to record history: {e}"))?;
        }

        match dispatch_line(state, &line) {
            Ok(ReplControl::Continue) => {}
            Ok(ReplControl::Exit) => break,
            Err(e) => eprintln!("{} {e}", "error:".red().bold()),
        }
    }

    Ok(())
}

fn print_banner() {
    println!("{}", "GroundQA REPL".green().bold());
    println!("Ask a question in plain language. Type `:help` for commands, `exit` to quit.\n");
}

fn dispatch_line(state: &ReplState, line: &str) -> Result<ReplControl> {
    match parse_line(line) {
        ReplCommand::Empty => Ok(ReplControl::Continue),
        ReplCommand::Exit => Ok(ReplControl::Exit),
        ReplCommand::Help => {
            println!("  <question>   answer from knowledge-graph facts (general answer on failure)");
            println!("  :last        show the previous run as JSON");
            println!("  :config      show provider and endpoint");
            println!("  exit, :q     leave the REPL");
            Ok(ReplControl::Continue)
        }
        ReplCommand::Config => {
            for status in state.config.status_lines() {
                println!("{status}");
            }
            Ok(ReplControl::Continue)
        }
        ReplCommand::Last => {
            let run = state.orchestrator.snapshot();
            println!("{}", serde_json::to_string_pretty(&run)?);
            Ok(ReplControl::Continue)
        }
        ReplCommand::Question(question) => {
            state
                .rt
                .block_on(ask::ask_live(state.orchestrator.clone(), question))?;
            println!();
            Ok(ReplControl::Continue)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_need_colon_prefix() {
        assert_eq!(parse_line(":help"), ReplCommand::Help);
        assert_eq!(parse_line("  :config \n"), ReplCommand::Config);
        assert_eq!(parse_line(":last"), ReplCommand::Last);
        assert_eq!(parse_line(":q"), ReplCommand::Exit);
        assert_eq!(parse_line("exit"), ReplCommand::Exit);
        assert_eq!(parse_line("   "), ReplCommand::Empty);
    }

    #[test]
    fn test_command_words_without_colon_are_questions() {
        assert_eq!(parse_line("help"), ReplCommand::Question("help"));
        assert_eq!(parse_line("config"), ReplCommand::Question("config"));
        assert_eq!(parse_line("?"), ReplCommand::Question("?"));
        assert_eq!(
            parse_line(" What is config? \n"),
            ReplCommand::Question("What is config?")
        );
    }
}
