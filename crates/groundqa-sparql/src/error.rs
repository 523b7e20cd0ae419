/// Failure talking to the graph endpoint or decoding its answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphServiceError {
    #[error("SPARQL endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to reach SPARQL endpoint {endpoint}: {message}")]
    Transport { endpoint: String, message: String },
    #[error("invalid SPARQL result set: {0}")]
    InvalidResultSet(String),
    #[error("invalid SPARQL endpoint {0:?}")]
    InvalidEndpoint(String),
    #[error("invalid SPARQL configuration: {0}")]
    InvalidConfig(String),
}
