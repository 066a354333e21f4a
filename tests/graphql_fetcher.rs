//! Integration tests for the GraphQL session against a mock endpoint.

use std::sync::Arc;
use std::time::Duration;

use harvester_core::{
    FailureDisposition, FetchSession, GraphqlSessionFactory, HarvestSettings, Harvester,
    RecordStore, SessionFactory,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_warmup(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/problems/two-sum/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(server)
        .await;
}

fn question(slug: &str) -> serde_json::Value {
    json!({
        "data": {
            "question": {
                "questionId": "1",
                "questionFrontendId": "1",
                "title": "Two Sum",
                "titleSlug": slug,
                "difficulty": "Easy",
                "content": "<p>Add two numbers.</p><p><strong>Example 1:</strong></p><pre>Input: 1</pre>",
                "topicTags": [{"name": "Array", "slug": "array"}],
                "stats": "{\"totalAcceptedRaw\": 7, \"totalSubmissionRaw\": 10, \"acRate\": \"70.0%\"}",
                "similarQuestions": "[]",
                "hints": [],
                "categoryTitle": "Algorithms",
                "isPaidOnly": false
            }
        }
    })
}

fn factory(server: &MockServer) -> GraphqlSessionFactory {
    GraphqlSessionFactory::new(&server.uri()).unwrap()
}

#[tokio::test]
async fn test_fetch_returns_question_payload() {
    let server = MockServer::start().await;
    mount_warmup(&server).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_partial_json(json!({"variables": {"titleSlug": "two-sum"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(question("two-sum")))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = factory(&server).connect().await.unwrap();
    let payload = session.fetch("two-sum").await.unwrap().unwrap();

    assert_eq!(payload.title_slug, "two-sum");
    assert_eq!(payload.topic_tags[0].name, "Array");
    assert!(payload.content.contains("Add two numbers"));
}

#[tokio::test]
async fn test_null_question_is_no_data() {
    let server = MockServer::start().await;
    mount_warmup(&server).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"question": null}})))
        .mount(&server)
        .await;

    let mut session = factory(&server).connect().await.unwrap();
    assert!(session.fetch("missing-problem").await.unwrap().is_none());
}

#[tokio::test]
async fn test_forbidden_loses_session() {
    let server = MockServer::start().await;
    mount_warmup(&server).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let mut session = factory(&server).connect().await.unwrap();
    let error = session.fetch("two-sum").await.unwrap_err();
    assert!(error.is_session_fatal());
}

#[tokio::test]
async fn test_server_error_is_soft_failure() {
    let server = MockServer::start().await;
    mount_warmup(&server).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut session = factory(&server).connect().await.unwrap();
    let error = session.fetch("two-sum").await.unwrap_err();
    assert_eq!(error.disposition(), FailureDisposition::SoftFailure);
    assert!(error.to_string().contains("HTTP 503"));
}

#[tokio::test]
async fn test_read_timeout_is_soft_failure() {
    let server = MockServer::start().await;
    mount_warmup(&server).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(question("two-sum"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let mut session = factory(&server)
        .with_timeouts(Duration::from_secs(5), Duration::from_millis(200))
        .connect()
        .await
        .unwrap();
    let error = session.fetch("two-sum").await.unwrap_err();
    assert_eq!(error.disposition(), FailureDisposition::SoftFailure);
}

#[tokio::test]
async fn test_failed_warmup_is_connect_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/problems/two-sum/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let error = factory(&server).connect().await.err().unwrap();
    assert_eq!(error.disposition(), FailureDisposition::RetryConnect);
    assert!(error.to_string().contains("HTTP 500"));
}

#[tokio::test]
async fn test_csrf_cookie_from_warmup_is_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/problems/two-sum/"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("set-cookie", "csrftoken=tok123; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("x-csrftoken", "tok123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(question("two-sum")))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = factory(&server).connect().await.unwrap();
    assert!(session.fetch("two-sum").await.unwrap().is_some());
}

#[tokio::test]
async fn test_harvest_through_graphql_session() {
    let server = MockServer::start().await;
    mount_warmup(&server).await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(question("two-sum")))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = RecordStore::open(dir.path()).unwrap();
    let harvester = Harvester::new(
        Arc::new(factory(&server)),
        store.clone(),
        HarvestSettings::without_delays(),
    );

    let summary = harvester.run(vec!["two-sum".to_string()]).await.unwrap();

    assert!(summary.is_complete());
    let record = store.load("two-sum").unwrap().unwrap();
    assert_eq!(record.title, "Two Sum");
    assert_eq!(record.total_accepted, 7);
    assert!(record.examples.contains("Example 1:"));
}
