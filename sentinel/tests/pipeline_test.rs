use mockito::Matcher;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sentinel::artifact::{ArtifactStore, Category};
use sentinel::llm::{BackendConfig, Provider, DRY_RUN_SENTINEL};
use sentinel::pipeline::{Pipeline, PipelineOutcome, SourceRequest, Sources};
use sentinel::report::generate_report;
use sentinel::sources::{
    BaiduNewsClient, GithubClient, HackerNewsClient, HttpSettings, NewsMode, SkipReason, WosClient,
};
use sentinel::SentinelError;

fn pipeline(base_url: &str, root: &Path) -> Pipeline {
    let http = HttpSettings {
        timeout: Duration::from_secs(5),
        user_agent: "sentinel-test".to_string(),
    };
    let sources = Sources {
        github: Arc::new(GithubClient::new(&http, base_url, None).unwrap()),
        hacker_news: HackerNewsClient::new(&http, format!("{}/news", base_url)).unwrap(),
        news: BaiduNewsClient::new(&http, format!("{}/baidu", base_url)).unwrap(),
        wos: WosClient::new(&http, base_url, None)
            .unwrap()
            .with_retry_wait(Duration::from_millis(10)),
    };
    Pipeline::new(
        ArtifactStore::new(root.join("out")),
        sources,
        root.join("subscriptions.json"),
    )
}

fn dry_run(root: &Path) -> BackendConfig {
    BackendConfig::new(Provider::Hosted, "http://127.0.0.1:9", "gpt-4o-mini").with_dry_run(root.join("prompt.txt"))
}

#[tokio::test]
async fn test_missing_artifact_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("hacker_news/2024-05-01/10-00-00.md");

    let result = generate_report(&missing, &dry_run(dir.path()), Category::SocialNews).await;

    assert!(matches!(result, Err(SentinelError::Io { .. })));
    assert!(!dir.path().join("hacker_news/2024-05-01/10-00-00_report.md").exists());
    assert!(!dir.path().join("prompt.txt").exists());
}

#[tokio::test]
async fn test_run_exports_and_reports() {
    let mut server = mockito::Server::new_async().await;
    let page = server
        .mock("GET", "/baidu")
        .with_status(200)
        .with_body(
            r#"<html><body>
                <div class="hotnews"><a href="http://news1">Title1</a></div>
                <ul class="ulist focuslistnews"><li><a href="http://news2">Title2</a></li></ul>
            </body></html>"#,
        )
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&server.url(), dir.path());

    let outcome = pipeline
        .run(&SourceRequest::News(NewsMode::All), &dry_run(dir.path()))
        .await
        .unwrap();
    let PipelineOutcome::Reported(report) = outcome else {
        panic!("expected a report");
    };

    assert_eq!(report.content, DRY_RUN_SENTINEL);
    assert_eq!(report.backend, "dry-run");
    assert_eq!(report.category, Category::News);
    assert!(report.path.to_string_lossy().ends_with("_report.md"));
    assert!(report.path.exists());
    assert!(report.source_artifact.starts_with(dir.path().join("out/baidu_news")));

    let prompt = std::fs::read_to_string(dir.path().join("prompt.txt")).unwrap();
    assert!(prompt.contains("## Breaking"));
    assert!(prompt.contains("## Latest"));

    page.assert_async().await;
}

#[tokio::test]
async fn test_run_skips_report_without_artifact() {
    let mut server = mockito::Server::new_async().await;
    let _page = server
        .mock("GET", "/news")
        .with_status(200)
        .with_body("<html><body><table></table></body></html>")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&server.url(), dir.path());

    let outcome = pipeline
        .run(&SourceRequest::SocialNews, &dry_run(dir.path()))
        .await
        .unwrap();

    assert!(matches!(outcome, PipelineOutcome::Skipped(SkipReason::NoData)));
    assert!(!dir.path().join("prompt.txt").exists());
    assert!(!dir.path().join("out").exists());
}

#[tokio::test]
async fn test_run_subscriptions_continues_past_failures() {
    let mut server = mockito::Server::new_async().await;
    // mocks are removed from the server when dropped
    let mut mocks = Vec::new();
    for path in ["/repos/octo/hello/commits", "/repos/octo/hello/issues"] {
        let mock = server
            .mock("GET", path)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[{"sha":"abcdef1234567","html_url":"https://github.com/octo/hello/commit/abcdef1",
                     "commit":{"message":"Fix parser","author":{"name":"Alice"}},
                     "number":1,"title":"t","state":"open","user":{"login":"bob"}}]"#,
            )
            .create_async()
            .await;
        mocks.push(mock);
    }
    let pulls = server
        .mock("GET", "/repos/octo/hello/pulls")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let broken = server
        .mock("GET", Matcher::Regex(r"^/repos/broken/repo/".to_string()))
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;
    mocks.push(pulls);
    mocks.push(broken);

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("subscriptions.json"),
        r#"["broken/repo", "octo/hello"]"#,
    )
    .unwrap();
    let pipeline = pipeline(&server.url(), dir.path());

    let results = pipeline.run_subscriptions(1, &dry_run(dir.path())).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "broken/repo");
    assert!(matches!(
        results[0].1,
        Ok(PipelineOutcome::Skipped(SkipReason::FetchFailed(_)))
    ));
    assert_eq!(results[1].0, "octo/hello");
    assert!(matches!(results[1].1, Ok(PipelineOutcome::Reported(_))));
}
