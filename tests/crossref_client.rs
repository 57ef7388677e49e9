//! `CrossrefClient` against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use crossref_ris::{Config, CrossrefClient, Pipeline, ResolverError, RisFileWriter};
use mockito::{Matcher, Server};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn config_for(server: &Server) -> Config {
    Config {
        base_url: format!("{}/works", server.url()),
        mailto: Some("lab@example.org".into()),
        timeout: Duration::from_secs(5),
        log_file: None,
        ..Config::default()
    }
}

fn query(title: &str) -> Matcher {
    Matcher::UrlEncoded("query".into(), title.into())
}

#[tokio::test]
async fn search_sends_query_and_parses_items() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/works")
        .match_query(Matcher::AllOf(vec![
            query("Perovskite solar cells"),
            Matcher::UrlEncoded("rows".into(), "5".into()),
            Matcher::UrlEncoded("mailto".into(), "lab@example.org".into()),
        ]))
        .match_header(
            "user-agent",
            Matcher::Regex(r"^crossref-ris/\S+ \(mailto:lab@example\.org\)$".into()),
        )
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "status": "ok",
                "message": {
                    "total-results": 2,
                    "items": [
                        {"title": ["Cover Picture"]},
                        {"title": ["Perovskite Solar Cells"], "DOI": "10.1/psc"}
                    ]
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = CrossrefClient::new(&config_for(&server)).unwrap();
    let resp = client.search_works("Perovskite solar cells", 5).await.unwrap();

    mock.assert_async().await;
    assert_eq!(resp.total_results, 2);
    assert_eq!(resp.items[1].doi(), Some("10.1/psc"));
}

#[tokio::test]
async fn status_codes_map_to_errors() {
    let mut server = Server::new_async().await;
    let _limited = server
        .mock("GET", "/works")
        .match_query(query("a"))
        .with_status(429)
        .with_header("retry-after", "7")
        .create_async()
        .await;
    let _unavailable = server
        .mock("GET", "/works")
        .match_query(query("b"))
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;
    let _bad = server
        .mock("GET", "/works")
        .match_query(query("c"))
        .with_status(400)
        .with_body("bad query")
        .create_async()
        .await;
    let client = CrossrefClient::new(&config_for(&server)).unwrap();

    let limited = client.search_works("a", 5).await.unwrap_err();
    assert!(matches!(
        limited,
        ResolverError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(7)
    ));
    assert!(limited.is_transient());

    let unavailable = client.search_works("b", 5).await.unwrap_err();
    assert!(matches!(
        unavailable,
        ResolverError::Api { status: 503, ref message } if message == "maintenance"
    ));
    assert!(unavailable.is_transient());

    let bad = client.search_works("c", 5).await.unwrap_err();
    assert!(matches!(bad, ResolverError::Api { status: 400, .. }));
    assert!(!bad.is_transient());
}

#[tokio::test]
async fn pipeline_over_http_skips_cover_picture() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/works")
        .match_query(query("Perovskite solar cells"))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "status": "ok",
                "message": {
                    "total-results": 2,
                    "items": [
                        {"title": ["Cover Picture"], "DOI": "10.1/cover"},
                        {
                            "title": ["Perovskite Solar Cells"],
                            "abstract": "<jats:p>Efficient\ncells.</jats:p>",
                            "DOI": "10.1/psc"
                        }
                    ]
                }
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.ris");
    let pipeline = Pipeline::crossref(&config_for(&server)).unwrap();

    let summary = pipeline
        .run(
            &["Perovskite solar cells".to_string()],
            Arc::new(RisFileWriter::new(&output)),
            CancellationToken::new(),
        )
        .await;

    mock.assert_async().await;
    assert_eq!(summary.resolved, 1);
    let contents = std::fs::read_to_string(&output).unwrap();
    assert_eq!(
        contents,
        "TY  - JOUR\nTI  - Perovskite Solar Cells\nAB  - Efficient cells.\nDO  - 10.1/psc\nER  - "
    );
}
