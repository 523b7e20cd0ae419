//! SPARQL protocol client (HTTP GET, JSON results).

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::error::GraphServiceError;
use crate::results::FactSet;
use crate::{KnowledgeGraph, StructuredQuery};

pub const GROUNDQA_SPARQL_ENDPOINT_ENV: &str = "GROUNDQA_SPARQL_ENDPOINT";
pub const GROUNDQA_SPARQL_TIMEOUT_MS_ENV: &str = "GROUNDQA_SPARQL_TIMEOUT_MS";

pub const DEFAULT_SPARQL_ENDPOINT: &str = "https://dbpedia.org/sparql";
pub const DEFAULT_SPARQL_TIMEOUT_MS: u64 = 30_000;
pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparqlConfig {
    pub endpoint: String,
    /// Sent as the `timeout` query parameter; the endpoint enforces it.
    pub timeout_hint_ms: u64,
}

impl Default for SparqlConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SPARQL_ENDPOINT.to_string(),
            timeout_hint_ms: DEFAULT_SPARQL_TIMEOUT_MS,
        }
    }
}

impl SparqlConfig {
    /// Resolve from a variable source, falling back to DBpedia.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GraphServiceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(endpoint) = get(GROUNDQA_SPARQL_ENDPOINT_ENV) {
            config.endpoint = endpoint;
        }
        if let Some(v) = get(GROUNDQA_SPARQL_TIMEOUT_MS_ENV) {
            config.timeout_hint_ms = v.parse::<u64>().map_err(|_| {
                GraphServiceError::InvalidConfig(format!(
                    "{GROUNDQA_SPARQL_TIMEOUT_MS_ENV}={v:?} (expected integer milliseconds)"
                ))
            })?;
        }
        Ok(config)
    }
}

/// Executes structured queries against one SPARQL endpoint.
///
/// One attempt per call; failures propagate immediately.
#[derive(Debug, Clone)]
pub struct SparqlClient {
    http: Client,
    endpoint: Url,
    timeout_hint_ms: u64,
}

impl SparqlClient {
    pub fn new(config: SparqlConfig) -> Result<Self, GraphServiceError> {
        let endpoint = Url::parse(config.endpoint.trim())
            .map_err(|_| GraphServiceError::InvalidEndpoint(config.endpoint.clone()))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(GraphServiceError::InvalidEndpoint(config.endpoint));
        }
        Ok(Self {
            http: Client::new(),
            endpoint,
            timeout_hint_ms: config.timeout_hint_ms,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Full request URL for `query`.
    pub fn request_url(&self, query: &StructuredQuery) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("query", query.as_str())
            .append_pair("format", SPARQL_RESULTS_JSON)
            .append_pair("timeout", &self.timeout_hint_ms.to_string());
        url
    }

    pub async fn execute(&self, query: &StructuredQuery) -> Result<FactSet, GraphServiceError> {
        let url = self.request_url(query);
        debug!(endpoint = %self.endpoint, query_len = query.as_str().len(), "executing SPARQL query");

        let response = self
            .http
            .get(url)
            .header(ACCEPT, SPARQL_RESULTS_JSON)
            .send()
            .await
            .map_err(|e| GraphServiceError::Transport {
                endpoint: self.endpoint.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default().trim().to_string();
            warn!(status = status.as_u16(), "SPARQL endpoint rejected query");
            return Err(GraphServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| GraphServiceError::Transport {
                endpoint: self.endpoint.to_string(),
                message: e.to_string(),
            })?;

        let facts = FactSet::from_json_slice(&body)?;
        debug!(
            vars = facts.vars().len(),
            bindings = facts.len(),
            "SPARQL result set decoded"
        );
        Ok(facts)
    }
}

#[async_trait]
impl KnowledgeGraph for SparqlClient {
    async fn execute(&self, query: &StructuredQuery) -> Result<FactSet, GraphServiceError> {
        SparqlClient::execute(self, query).await
    }

    fn describe(&self) -> String {
        format!("sparql({})", self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_url_encodes_protocol_params() {
        let client = SparqlClient::new(SparqlConfig::default()).unwrap();
        let query = StructuredQuery::new("SELECT ?d WHERE { dbr:Inception dbo:director ?d }");
        let url = client.request_url(&query);

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("query".to_string(), query.as_str().to_string()),
                ("format".to_string(), SPARQL_RESULTS_JSON.to_string()),
                ("timeout".to_string(), "30000".to_string()),
            ]
        );
        assert!(url.as_str().starts_with("https://dbpedia.org/sparql?"));
    }

    #[test]
    fn rejects_non_http_endpoint() {
        for endpoint in ["not a url", "ftp://example.org/sparql"] {
            let err = SparqlClient::new(SparqlConfig {
                endpoint: endpoint.to_string(),
                ..Default::default()
            })
            .unwrap_err();
            assert!(matches!(err, GraphServiceError::InvalidEndpoint(_)));
        }
    }

    #[test]
    fn config_from_lookup_defaults_to_dbpedia() {
        let config = SparqlConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, SparqlConfig::default());

        let config = SparqlConfig::from_lookup(|name| match name {
            GROUNDQA_SPARQL_ENDPOINT_ENV => Some(" http://localhost:3030/ds/sparql ".to_string()),
            GROUNDQA_SPARQL_TIMEOUT_MS_ENV => Some("5000".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.endpoint, "http://localhost:3030/ds/sparql");
        assert_eq!(config.timeout_hint_ms, 5000);

        let err = SparqlConfig::from_lookup(|name| {
            (name == GROUNDQA_SPARQL_TIMEOUT_MS_ENV).then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, GraphServiceError::InvalidConfig(_)));
    }
}
