//! Flag-over-environment configuration for the CLI.

use anyhow::{anyhow, Result};
use clap::Args;
use groundqa_llm::llm::providers::{GROUNDQA_LLM_PROVIDER_ENV, GROUNDQA_LLM_TIMEOUT_SECS_ENV};
use groundqa_llm::LLMConfig;
use groundqa_pipeline::PipelineConfig;
use groundqa_sparql::SparqlConfig;

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// LLM provider: gemini|openai|anthropic|local (overrides GROUNDQA_LLM_PROVIDER)
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Model name for the selected provider
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// SPARQL endpoint URL (overrides GROUNDQA_SPARQL_ENDPOINT)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Per-call LLM timeout in seconds; 0 disables (overrides GROUNDQA_LLM_TIMEOUT_SECS)
    #[arg(long, global = true)]
    pub llm_timeout_secs: Option<u64>,

    /// Debug-level logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub llm: LLMConfig,
    pub sparql: SparqlConfig,
}

impl ResolvedConfig {
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            llm_timeout: self.llm.timeout,
            ..PipelineConfig::default()
        }
    }

    pub fn status_lines(&self) -> Vec<String> {
        vec![
            self.llm.status_line(),
            format!(
                "sparql: endpoint={} timeout={}ms",
                self.sparql.endpoint, self.sparql.timeout_hint_ms
            ),
        ]
    }
}

pub fn resolve(args: &GlobalArgs) -> Result<ResolvedConfig> {
    Ok(ResolvedConfig {
        llm: resolve_llm(args, |name| std::env::var(name).ok())?,
        sparql: resolve_sparql(args, |name| std::env::var(name).ok())?,
    })
}

/// The SPARQL side only; `sparql` needs no LLM credentials.
pub fn resolve_sparql_only(args: &GlobalArgs) -> Result<SparqlConfig> {
    resolve_sparql(args, |name| std::env::var(name).ok())
}

fn resolve_llm<F>(args: &GlobalArgs, lookup: F) -> Result<LLMConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let timeout_flag = args.llm_timeout_secs.map(|secs| secs.to_string());
    let layered = |name: &str| {
        if name == GROUNDQA_LLM_PROVIDER_ENV {
            if let Some(provider) = &args.provider {
                return Some(provider.clone());
            }
        }
        if name == GROUNDQA_LLM_TIMEOUT_SECS_ENV {
            if let Some(secs) = &timeout_flag {
                return Some(secs.clone());
            }
        }
        lookup(name)
    };

    let mut config = LLMConfig::from_lookup(layered).map_err(|e| anyhow!("{e}"))?;
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    Ok(config)
}

fn resolve_sparql<F>(args: &GlobalArgs, lookup: F) -> Result<SparqlConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = SparqlConfig::from_lookup(lookup).map_err(|e| anyhow!("{e}"))?;
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundqa_llm::Provider;
    use std::collections::HashMap;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_flags_override_environment() {
        let args = GlobalArgs {
            provider: Some("openai".to_string()),
            model: Some("gpt-4o".to_string()),
            llm_timeout_secs: Some(0),
            ..GlobalArgs::default()
        };
        let lookup = env(&[
            ("GEMINI_API_KEY", "g-key"),
            ("OPENAI_API_KEY", "o-key"),
            ("GROUNDQA_LLM_TIMEOUT_SECS", "45"),
        ]);

        let config = resolve_llm(&args, lookup).unwrap();
        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_environment_used_without_flags() {
        let lookup = env(&[("API_KEY", "legacy"), ("GROUNDQA_LLM_TIMEOUT_SECS", "45")]);
        let config = resolve_llm(&GlobalArgs::default(), lookup).unwrap();
        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.api_key, "legacy");
        assert_eq!(config.timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_missing_credentials_is_an_error() {
        let err = resolve_llm(&GlobalArgs::default(), env(&[])).unwrap_err();
        assert!(err.to_string().contains("No LLM provider configured"));
    }

    #[test]
    fn test_sparql_endpoint_flag_and_timeout_env() {
        let args = GlobalArgs {
            endpoint: Some("http://localhost:3030/ds/sparql".to_string()),
            ..GlobalArgs::default()
        };
        let config = resolve_sparql(
            &args,
            env(&[
                ("GROUNDQA_SPARQL_ENDPOINT", "http://ignored/sparql"),
                ("GROUNDQA_SPARQL_TIMEOUT_MS", "5000"),
            ]),
        )
        .unwrap();
        assert_eq!(config.endpoint, "http://localhost:3030/ds/sparql");
        assert_eq!(config.timeout_hint_ms, 5000);

        let err = resolve_sparql(
            &GlobalArgs::default(),
            env(&[("GROUNDQA_SPARQL_TIMEOUT_MS", "soon")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("expected integer milliseconds"));
    }
}
