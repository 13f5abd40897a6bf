// tests/cli_test.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::{TempDir, tempdir};

fn main_command() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

// 空配置文件 + 空数据目录，避免读写用户主目录下的配置
fn isolated_env() -> (TempDir, Command) {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    fs::write(&config_path, "{}").unwrap();

    let mut cmd = main_command();
    cmd.arg("--config")
        .arg(&config_path)
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .env_remove("CANVAS_API_TOKEN")
        .env_remove("PANOPTO_CLIENT_ID")
        .env_remove("PANOPTO_CLIENT_SECRET");
    (dir, cmd)
}

#[test]
fn test_help_flag() {
    main_command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("显示此帮助信息并退出"))
        .stdout(predicate::str::contains("--classify"));
}

#[test]
fn test_missing_mode_shows_usage() {
    main_command()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: caption-audit"));
}

#[test]
fn test_pull_alone_is_not_a_mode() {
    main_command().arg("--pull").assert().failure().code(2);
}

#[test]
fn test_invalid_course_id_is_rejected() {
    main_command()
        .args(["--course", "abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("不是有效的课程 ID"));
}

#[test]
fn test_classify_prints_kind() {
    main_command()
        .args(["--classify", "https://www.youtube.com/watch?v=dQw4w9WgXcQ"])
        .assert()
        .success()
        .stdout(predicate::str::contains("youtube"));

    main_command()
        .args(["--classify", "https://canvas.uccs.edu/courses/1/pages/intro"])
        .assert()
        .success()
        .stdout(predicate::str::contains("other"));
}

#[test]
fn test_all_without_course_list_fails() {
    let (_dir, mut cmd) = isolated_env();
    cmd.arg("--all")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("未找到课程列表"));
}

#[test]
fn test_pull_without_canvas_token_fails() {
    let (_dir, mut cmd) = isolated_env();
    cmd.args(["--all", "--pull"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("未配置 Canvas API Token"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let dir = tempdir().unwrap();
    main_command()
        .arg("--config")
        .arg(dir.path().join("nope.json"))
        .args(["--course", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("配置文件"));
}

#[test]
fn test_course_without_cache_reports_nothing_to_audit() {
    let (_dir, mut cmd) = isolated_env();
    cmd.args(["--course", "165356", "--no-login-prompt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("没有需要审核的视频"));
}
