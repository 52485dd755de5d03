use std::time::Duration;

use sentinel::artifact::Category;
use sentinel::llm::{BackendConfig, LlmBackend, Provider, DRY_RUN_SENTINEL};
use sentinel::SentinelError;

const OPENAI_BODY: &str = r#"{
    "model": "gpt-4o-mini",
    "choices": [{
        "message": {"role": "assistant", "content": "This is a test summary"},
        "finish_reason": "stop"
    }],
    "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
}"#;

#[tokio::test]
async fn test_hosted_backend_with_mock() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("authorization", "Bearer fake-api-key")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"model":"gpt-4o-mini"}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(OPENAI_BODY)
        .create_async()
        .await;

    let cfg = BackendConfig::new(Provider::Hosted, server.url(), "gpt-4o-mini").with_credential("fake-api-key");
    let backend = LlmBackend::from_config(&cfg).await.unwrap();
    assert_eq!(backend.name(), "hosted");

    let summary = backend.summarize(Category::SocialNews, "1. Story  Link: x").await.unwrap();
    assert_eq!(summary, "This is a test summary");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_hosted_backend_requires_credential() {
    let cfg = BackendConfig::new(Provider::Hosted, "http://localhost:1", "gpt-4o-mini");
    let result = LlmBackend::from_config(&cfg).await;
    assert!(matches!(result, Err(SentinelError::Validation(_))));
}

#[tokio::test]
async fn test_local_backend_native_shape() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"model":"llama3","stream":false}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"model":"llama3","created_at":"2024-05-01T10:00:00Z",
                "message":{"role":"assistant","content":"local summary"},
                "done":true,"prompt_eval_count":20,"eval_count":8}"#,
        )
        .create_async()
        .await;

    let cfg = BackendConfig::new(Provider::Local, format!("{}/api/chat", server.url()), "llama3");
    let backend = LlmBackend::from_config(&cfg).await.unwrap();

    let summary = backend.summarize(Category::RepoActivity, "# Progress").await.unwrap();
    assert_eq!(summary, "local summary");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_backend_error_status() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_status(401)
        .with_body(r#"{"error": {"message": "invalid api key"}}"#)
        .create_async()
        .await;

    let cfg = BackendConfig::new(Provider::Hosted, server.url(), "gpt-4o-mini").with_credential("bad");
    let backend = LlmBackend::from_config(&cfg).await.unwrap();

    let err = backend.summarize(Category::News, "content").await.unwrap_err();
    assert!(matches!(err, SentinelError::Backend { .. }));
    assert!(err.to_string().contains("401"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_backend_timeout() {
    let mut server = mockito::Server::new_async().await;

    // Mock slow response
    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(std::time::Duration::from_secs(3));
            w.write_all(b"too late")
        })
        .create_async()
        .await;

    let cfg = BackendConfig::new(Provider::Hosted, server.url(), "gpt-4o-mini")
        .with_credential("fake-api-key")
        .with_timeout(Duration::from_secs(1));
    let backend = LlmBackend::from_config(&cfg).await.unwrap();

    let err = backend.summarize(Category::News, "content").await.unwrap_err();
    assert!(matches!(err, SentinelError::Backend { .. }));
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn test_transient_failure_retried_once() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_status(503)
        .expect(2)
        .create_async()
        .await;

    let cfg = BackendConfig::new(Provider::Hosted, server.url(), "gpt-4o-mini")
        .with_credential("fake-api-key")
        .with_retry(Duration::from_millis(10));
    let backend = LlmBackend::from_config(&cfg).await.unwrap();

    let err = backend.summarize(Category::Bibliography, "content").await.unwrap_err();
    assert!(matches!(err, SentinelError::Backend { .. }));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_dry_run_makes_no_call() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let prompt_file = dir.path().join("diag").join("prompt.txt");
    let cfg = BackendConfig::new(Provider::Hosted, server.url(), "gpt-4o-mini").with_dry_run(&prompt_file);
    let backend = LlmBackend::from_config(&cfg).await.unwrap();

    let summary = backend.summarize(Category::News, "1. [Title1](http://news1)").await.unwrap();
    assert_eq!(summary, DRY_RUN_SENTINEL);

    let saved = std::fs::read_to_string(&prompt_file).unwrap();
    assert!(saved.contains("news editor"));
    assert!(saved.contains("1. [Title1](http://news1)"));

    mock.assert_async().await;
}
