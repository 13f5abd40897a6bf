// tests/workflow_test.rs

use caption_audit::{
    browser::{AuditSession, AutoConfirm, SnapshotDriver, SnapshotLauncher},
    config::{AppConfig, BrowserSettings},
    engine::CaptionEngine,
    error::AppError,
    models::{MediaKind, MediaReference},
    report::ResultSink,
    workflows::{self, AuditStats},
};
use serde_json::{Value, json};
use std::{
    fs,
    sync::{Arc, atomic::AtomicBool},
    time::Duration,
};
use tempfile::TempDir;

const ALL: [MediaKind; 3] = [MediaKind::YouTube, MediaKind::Panopto, MediaKind::EmbeddedPlayer];

struct Fixture {
    _dir: TempDir,
    config: Arc<AppConfig>,
    launcher: SnapshotLauncher,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = Arc::new(AppConfig {
            data_dir: dir.path().to_path_buf(),
            browser: BrowserSettings {
                page_timeout: Duration::from_millis(200),
                element_timeout: Duration::from_millis(60),
                poll_interval: Duration::from_millis(20),
                ..Default::default()
            },
            ..Default::default()
        });
        let launcher = SnapshotLauncher::new(
            SnapshotDriver::new()
                .with_page(
                    "https://canvas.test/courses/1/files/9",
                    r#"<div id="media_preview"><button aria-label="Disable Captions"></button></div>"#,
                )
                .with_page(
                    "https://canvas.test/courses/1/files/10",
                    r#"<div id="media_preview"><button aria-label="Play"></button></div>"#,
                )
                .with_page("https://canvas.test/courses/1/files/11", "<p>handout.pdf</p>"),
        );
        Self {
            _dir: dir,
            config,
            launcher,
        }
    }

    fn engine(&self) -> CaptionEngine {
        let session = AuditSession::new(
            Box::new(self.launcher.clone()),
            Box::new(AutoConfirm),
            self.config.browser.page_timeout,
        );
        CaptionEngine::with_session(self.config.clone(), session).unwrap()
    }

    fn write_cache(&self, course_id: &str, content: &str) {
        let path = self.config.sorted_modules_path(course_id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn sink(&self) -> ResultSink {
        ResultSink::new(self.config.report_path())
    }

    fn report(&self) -> Value {
        serde_json::from_str(&fs::read_to_string(self.config.report_path()).unwrap()).unwrap()
    }
}

fn course_one_cache() -> String {
    json!({
        "youtube": [],
        "panopto": [],
        "canvas": [
            "https://canvas.test/api/v1/courses/1/files/9",
            "https://canvas.test/courses/1/files/9",
            "https://canvas.test/courses/1/files/10",
            "https://canvas.test/courses/1/files/11",
            "https://canvas.test/courses/1/pages/intro"
        ],
        "other": ["https://example.com/slides"]
    })
    .to_string()
}

#[tokio::test]
async fn test_audit_appends_one_record_per_link() {
    let fx = Fixture::new();
    fx.write_cache("1", &course_one_cache());
    // 已有报告中的记录原样保留
    fs::write(
        fx.config.report_path(),
        r#"[{"type": "youtube", "url": "https://youtu.be/old", "has_captions": true, "note": "kept"}]"#,
    )
    .unwrap();

    let mut engine = fx.engine();
    let cancel = AtomicBool::new(false);
    let stats = workflows::audit_courses(&mut engine, &fx.sink(), &fx.config, &["1".to_string()], &ALL, &cancel)
        .await
        .unwrap();

    assert_eq!(
        stats,
        AuditStats {
            total: 2,
            with_captions: 1,
            without_captions: 1,
            not_media: 1,
            skipped_courses: 0,
        }
    );
    assert_eq!(
        fx.report(),
        json!([
            {"type": "youtube", "url": "https://youtu.be/old", "has_captions": true, "note": "kept"},
            {"type": "canvas", "url": "https://canvas.test/courses/1/files/9", "has_captions": true, "course_id": "1"},
            {"type": "canvas", "url": "https://canvas.test/courses/1/files/10", "has_captions": false, "course_id": "1"}
        ])
    );
    // 审核结束后浏览器已关闭
    assert!(!engine.session().is_active());
    assert_eq!(fx.launcher.launch_count(), 1);
}

#[tokio::test]
async fn test_browser_relaunches_once_per_domain_across_courses() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(AppConfig {
        data_dir: dir.path().to_path_buf(),
        browser: BrowserSettings {
            page_timeout: Duration::from_millis(200),
            element_timeout: Duration::from_millis(60),
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        },
        ..Default::default()
    });

    let mut driver = SnapshotDriver::new();
    let mut ids = Vec::new();
    for course in 1..=3 {
        let panopto = format!("https://uni.hosted.panopto.com/Panopto/Pages/Viewer.aspx?id={}", course);
        let canvas = format!("https://canvas.test/courses/{}/files/{}", course, course);
        driver = driver
            .with_page(&panopto, r#"<button aria-label="Disable Captions"></button>"#)
            .with_page(&canvas, r#"<div id="media_preview"><button aria-label="Enable Captions"></button></div>"#);

        let path = config.sorted_modules_path(&course.to_string());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, json!({"panopto": [panopto], "canvas": [canvas]}).to_string()).unwrap();
        ids.push(course.to_string());
    }
    let launcher = SnapshotLauncher::new(driver);
    let session = AuditSession::new(
        Box::new(launcher.clone()),
        Box::new(AutoConfirm),
        config.browser.page_timeout,
    );
    let mut engine = CaptionEngine::with_session(config.clone(), session).unwrap();

    let cancel = AtomicBool::new(false);
    let sink = ResultSink::new(config.report_path());
    let stats = workflows::audit_courses(&mut engine, &sink, &config, &ids, &ALL, &cancel)
        .await
        .unwrap();

    assert_eq!(stats.total, 6);
    assert_eq!(stats.with_captions, 6);
    assert_eq!(launcher.launch_count(), 2);

    let report: Value = serde_json::from_str(&fs::read_to_string(config.report_path()).unwrap()).unwrap();
    let order: Vec<(&str, &str)> = report
        .as_array()
        .unwrap()
        .iter()
        .map(|r| (r["type"].as_str().unwrap(), r["course_id"].as_str().unwrap()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("panopto", "1"),
            ("panopto", "2"),
            ("panopto", "3"),
            ("canvas", "1"),
            ("canvas", "2"),
            ("canvas", "3"),
        ]
    );
}

#[tokio::test]
async fn test_missing_and_malformed_caches_are_skipped() {
    let fx = Fixture::new();
    fx.write_cache("1", &course_one_cache());
    fx.write_cache("3", "{ not json");

    let mut engine = fx.engine();
    let cancel = AtomicBool::new(false);
    let ids = ["2".to_string(), "1".to_string(), "3".to_string()];
    let stats = workflows::audit_courses(&mut engine, &fx.sink(), &fx.config, &ids, &ALL, &cancel)
        .await
        .unwrap();

    assert_eq!(stats.skipped_courses, 2);
    assert_eq!(stats.total, 2);
    assert_eq!(fx.report().as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_source_filter_limits_audit() {
    let fx = Fixture::new();
    fx.write_cache("1", &course_one_cache());

    let mut engine = fx.engine();
    let cancel = AtomicBool::new(false);
    let stats = workflows::audit_courses(
        &mut engine,
        &fx.sink(),
        &fx.config,
        &["1".to_string()],
        &[MediaKind::YouTube],
        &cancel,
    )
    .await
    .unwrap();

    assert_eq!(stats.total, 0);
    assert!(!fx.config.report_path().exists());
    assert_eq!(fx.launcher.launch_count(), 0);
}

#[tokio::test]
async fn test_cancellation_stops_before_next_link() {
    let fx = Fixture::new();
    fx.write_cache("1", &course_one_cache());

    let mut engine = fx.engine();
    let cancel = AtomicBool::new(true);
    let result = workflows::audit_courses(&mut engine, &fx.sink(), &fx.config, &["1".to_string()], &ALL, &cancel).await;

    assert!(matches!(result, Err(AppError::UserInterrupt)));
    assert!(!fx.config.report_path().exists());
}

#[tokio::test]
async fn test_malformed_report_is_restarted() {
    let fx = Fixture::new();
    fs::write(fx.config.report_path(), r#"{"oops": true}"#).unwrap();

    let mut engine = fx.engine();
    let verdict = engine
        .audit(&MediaReference::new("https://canvas.test/courses/1/files/9", Some("1".into())))
        .await
        .unwrap();
    assert_eq!(fx.sink().append(&[verdict]).unwrap(), 1);
    assert_eq!(fx.report()[0]["has_captions"], json!(true));
}
