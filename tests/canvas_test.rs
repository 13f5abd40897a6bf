// tests/canvas_test.rs

use caption_audit::{
    AuditJobContext,
    canvas::CanvasClient,
    cli::Cli,
    config::AppConfig,
    error::AppError,
    workflows,
};
use clap::Parser;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::Value;
use std::{
    fs,
    path::Path,
    sync::{Arc, atomic::AtomicBool},
    time::Duration,
};
use tempfile::TempDir;

fn test_config(server: &ServerGuard, data_dir: &Path) -> AppConfig {
    AppConfig {
        data_dir: data_dir.to_path_buf(),
        canvas_base_url: format!("{}/api/v1", server.url()),
        canvas_token: Some("canvas-token".to_string()),
        max_retries: 0,
        page_delay: Duration::ZERO,
        ..Default::default()
    }
}

fn client(config: &AppConfig) -> CanvasClient {
    CanvasClient::new(Arc::new(config.clone())).unwrap()
}

async fn mock_course_modules(server: &mut ServerGuard, course_id: u64) -> Vec<mockito::Mock> {
    let base = server.url();
    let modules = server
        .mock("GET", format!("/api/v1/courses/{}/modules", course_id).as_str())
        .match_query(Matcher::Exact("per_page=100".into()))
        .match_header("authorization", "Bearer canvas-token")
        .with_status(200)
        .with_body(format!(
            r#"[
                {{"id": 10, "name": "Week 1", "items_url": "{base}/api/v1/courses/{course_id}/modules/10/items"}},
                {{"id": 11, "name": "Week 2"}}
            ]"#
        ))
        .create_async()
        .await;
    let week1 = server
        .mock("GET", format!("/api/v1/courses/{}/modules/10/items", course_id).as_str())
        .with_status(200)
        .with_body(
            r#"[
                {"id": 1, "title": "Intro", "type": "ExternalUrl", "external_url": "https://youtu.be/abc"},
                {"id": 2, "title": "Lecture", "type": "File", "url": "https://canvas.test/api/v1/courses/1/files/9"},
                {"id": 3, "title": "Header", "type": "SubHeader"}
            ]"#,
        )
        .create_async()
        .await;
    let week2 = server
        .mock("GET", format!("/api/v1/courses/{}/modules/11/items", course_id).as_str())
        .with_status(200)
        .with_body(
            r#"[
                {"id": 4, "type": "ExternalTool", "url": "https://canvas.test/api/v1/courses/1/external_tools/5",
                 "external_url": "https://uccs1.hosted.panopto.com/Panopto/Pages/Viewer.aspx?id=1"}
            ]"#,
        )
        .create_async()
        .await;
    vec![modules, week1, week2]
}

#[tokio::test]
async fn test_list_courses_follows_link_header() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());
    let page2_url = format!("{}/api/v1/courses?page=2&per_page=100", server.url());

    let page1 = server
        .mock("GET", "/api/v1/courses")
        .match_query(Matcher::Exact("per_page=100".into()))
        .match_header("authorization", "Bearer canvas-token")
        .with_status(200)
        .with_header("link", &format!(r#"<{}>; rel="next", <{}>; rel="last""#, page2_url, page2_url))
        .with_body(r#"[{"id": 1, "name": "Biology"}, {"id": 2, "name": "Chemistry"}]"#)
        .create_async()
        .await;
    let page2 = server
        .mock("GET", "/api/v1/courses")
        .match_query(Matcher::Exact("page=2&per_page=100".into()))
        .with_status(200)
        // 最后一页的 next 指向自己，不能死循环
        .with_header("link", &format!(r#"<{}>; rel="next""#, page2_url))
        .with_body(r#"[{"id": 3}]"#)
        .create_async()
        .await;

    let courses = client(&config).list_courses().await.unwrap();
    let ids: Vec<u64> = courses.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(courses[0].name.as_deref(), Some("Biology"));
    assert_eq!(courses[2].name, None);
    page1.assert_async().await;
    page2.assert_async().await;
}

#[tokio::test]
async fn test_course_links_collects_url_and_external_url() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());
    let mocks = mock_course_modules(&mut server, 1).await;

    let links = client(&config).course_links("1").await.unwrap();
    assert_eq!(
        links,
        vec![
            "https://youtu.be/abc",
            "https://canvas.test/api/v1/courses/1/files/9",
            "https://canvas.test/api/v1/courses/1/external_tools/5",
            "https://uccs1.hosted.panopto.com/Panopto/Pages/Viewer.aspx?id=1",
        ]
    );
    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_failed_module_is_skipped() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());

    let _modules = server
        .mock("GET", "/api/v1/courses/5/modules")
        .match_query(Matcher::Exact("per_page=100".into()))
        .with_status(200)
        .with_body(r#"[{"id": 50, "name": "Broken"}, {"id": 51, "name": "Fine"}]"#)
        .create_async()
        .await;
    let _broken = server
        .mock("GET", "/api/v1/courses/5/modules/50/items")
        .with_status(500)
        .create_async()
        .await;
    let _fine = server
        .mock("GET", "/api/v1/courses/5/modules/51/items")
        .with_status(200)
        .with_body(r#"[{"id": 1, "external_url": "https://example.com/notes"}]"#)
        .create_async()
        .await;

    let links = client(&config).course_links("5").await.unwrap();
    assert_eq!(links, vec!["https://example.com/notes"]);
}

#[tokio::test]
async fn test_invalid_token_is_reported() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());

    let _courses = server
        .mock("GET", "/api/v1/courses")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"errors": [{"message": "Invalid access token."}]}"#)
        .create_async()
        .await;

    let err = client(&config).list_courses().await.unwrap_err();
    assert!(matches!(err, AppError::TokenInvalid));
}

#[tokio::test]
async fn test_unexpected_body_is_parse_error() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());

    let _courses = server
        .mock("GET", "/api/v1/courses")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create_async()
        .await;

    let err = client(&config).list_courses().await.unwrap_err();
    assert!(matches!(err, AppError::ApiParseFailed { .. }));
}

#[tokio::test]
async fn test_pull_course_writes_both_caches() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());
    let _mocks = mock_course_modules(&mut server, 1).await;

    let sorted = workflows::pull_course(&client(&config), &config, "1").await.unwrap();
    assert_eq!(sorted.youtube, vec!["https://youtu.be/abc"]);
    assert_eq!(sorted.canvas, vec!["https://canvas.test/api/v1/courses/1/files/9"]);
    assert_eq!(sorted.panopto, vec!["https://uccs1.hosted.panopto.com/Panopto/Pages/Viewer.aspx?id=1"]);
    assert_eq!(sorted.other, vec!["https://canvas.test/api/v1/courses/1/external_tools/5"]);

    let raw: Value = serde_json::from_str(&fs::read_to_string(config.course_modules_path("1")).unwrap()).unwrap();
    assert_eq!(raw.as_array().map(Vec::len), Some(4));

    let cached = workflows::load_course_links(&config, "1").unwrap().unwrap();
    assert_eq!(cached, sorted);
}

#[tokio::test]
async fn test_run_pull_all_writes_course_list_and_skips_failures() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = Arc::new(test_config(&server, dir.path()));

    let _courses = server
        .mock("GET", "/api/v1/courses")
        .match_query(Matcher::Exact("per_page=100".into()))
        .with_status(200)
        .with_body(r#"[{"id": 1, "name": "Biology"}, {"id": 2, "name": "Broken"}]"#)
        .create_async()
        .await;
    let _mocks = mock_course_modules(&mut server, 1).await;
    let _broken = server
        .mock("GET", "/api/v1/courses/2/modules")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let context = AuditJobContext {
        config: config.clone(),
        args: Arc::new(Cli::parse_from(["caption-audit", "--all", "--pull"])),
        cancellation_token: Arc::new(AtomicBool::new(false)),
    };
    let pulled = workflows::run_pull(&context, &[]).await.unwrap();
    assert_eq!(pulled, vec!["1"]);

    let ids: Value = serde_json::from_str(&fs::read_to_string(config.course_ids_path()).unwrap()).unwrap();
    assert_eq!(ids, serde_json::json!([1, 2]));
    assert!(config.courses_path().exists());
    assert!(config.sorted_modules_path("1").exists());
    assert!(!config.sorted_modules_path("2").exists());

    // 缓存中的 ID 可以直接用于 --all 审核
    assert_eq!(workflows::load_course_ids(&config.course_ids_path()).unwrap(), vec!["1", "2"]);
}

#[tokio::test]
async fn test_run_pull_only_refreshes_given_courses() {
    let mut server = Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = Arc::new(test_config(&server, dir.path()));

    let listing = server
        .mock("GET", "/api/v1/courses")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let _mocks = mock_course_modules(&mut server, 1).await;

    let context = AuditJobContext {
        config: config.clone(),
        args: Arc::new(Cli::parse_from(["caption-audit", "--course", "1", "--pull"])),
        cancellation_token: Arc::new(AtomicBool::new(false)),
    };
    let pulled = workflows::run_pull(&context, &["1".to_string()]).await.unwrap();
    assert_eq!(pulled, vec!["1"]);
    assert!(!config.course_ids_path().exists());
    listing.assert_async().await;
}
