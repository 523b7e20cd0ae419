//! SparqlClient against a local mock endpoint.

use groundqa_sparql::*;
use mockito::Matcher;
use std::io::Write;

const QUERY: &str = "SELECT ?director WHERE { dbr:Inception dbo:director ?director }";

fn client_for(server: &mockito::ServerGuard) -> SparqlClient {
    SparqlClient::new(SparqlConfig {
        endpoint: format!("{}/sparql", server.url()),
        timeout_hint_ms: 30_000,
    })
    .unwrap()
}

#[tokio::test]
async fn test_execute_sends_protocol_params_and_decodes() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/sparql")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("query".into(), QUERY.into()),
            Matcher::UrlEncoded("format".into(), SPARQL_RESULTS_JSON.into()),
            Matcher::UrlEncoded("timeout".into(), "30000".into()),
        ]))
        .match_header("accept", SPARQL_RESULTS_JSON)
        .with_status(200)
        .with_header("content-type", SPARQL_RESULTS_JSON)
        .with_body(
            r#"{ "head": { "vars": ["director"] },
                 "results": { "bindings": [
                   { "director": { "type": "uri", "value": "http://dbpedia.org/resource/Christopher_Nolan" } }
                 ] } }"#,
        )
        .create_async()
        .await;

    let facts = client_for(&server)
        .execute(&StructuredQuery::new(QUERY))
        .await
        .unwrap();

    assert_eq!(facts.len(), 1);
    assert_eq!(
        facts.bindings()[0].get("director").unwrap().display_value(),
        "Christopher_Nolan"
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_non_success_status_carries_status_and_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/sparql")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("Service Temporarily Unavailable")
        .expect(1)
        .create_async()
        .await;

    let err = client_for(&server)
        .execute(&StructuredQuery::new(QUERY))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        GraphServiceError::Status {
            status: 503,
            body: "Service Temporarily Unavailable".to_string()
        }
    );
    assert!(err.to_string().contains("503"));
    // single attempt, no retry
    mock.assert_async().await;
}

#[tokio::test]
async fn test_status_survives_broken_error_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/sparql")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_chunked_body(|w| {
            w.write_all(b"Service Tempor")?;
            w.flush()?;
            std::thread::sleep(std::time::Duration::from_millis(50));
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "upstream went away",
            ))
        })
        .create_async()
        .await;

    let err = client_for(&server)
        .execute(&StructuredQuery::new(QUERY))
        .await
        .unwrap_err();

    assert!(
        matches!(err, GraphServiceError::Status { status: 503, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_unparsable_body_is_graph_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/sparql")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("Virtuoso 37000 Error SP030: SPARQL compiler, line 1: syntax error")
        .create_async()
        .await;

    let err = client_for(&server)
        .execute(&StructuredQuery::new("SELEKT"))
        .await
        .unwrap_err();

    assert!(matches!(err, GraphServiceError::InvalidResultSet(_)));
}

#[tokio::test]
async fn test_empty_result_set_is_ok() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/sparql")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{ "head": { "vars": ["x"] }, "results": { "bindings": [] } }"#)
        .create_async()
        .await;

    let facts = client_for(&server)
        .execute(&StructuredQuery::new(QUERY))
        .await
        .unwrap();

    assert!(facts.is_empty());
    assert_eq!(facts.vars(), &["x".to_string()]);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let client = SparqlClient::new(SparqlConfig {
        endpoint: "http://127.0.0.1:9/sparql".to_string(),
        timeout_hint_ms: 1_000,
    })
    .unwrap();

    let err = client.execute(&StructuredQuery::new(QUERY)).await.unwrap_err();
    assert!(matches!(err, GraphServiceError::Transport { .. }));
}
