// tests/cli_dispatch_test.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::{TempDir, tempdir};

// 辅助函数：隔离用户主目录 (配置文件与日志)，清除凭据环境变量
fn main_command(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("HOME", home.path())
        .env("USERPROFILE", home.path())
        .env_remove("MOODLE_USERNAME")
        .env_remove("MOODLE_PASSWORD");
    cmd
}

// --- 测试基本 CLI 行为 ---

#[test]
fn test_help_flag() {
    let home = tempdir().unwrap();
    main_command(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("显示此帮助信息并退出"))
        .stdout(predicate::str::contains("--all-courses"));
}

#[test]
fn test_no_arguments_shows_usage() {
    let home = tempdir().unwrap();
    main_command(&home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_url_is_required() {
    let home = tempdir().unwrap();
    main_command(&home)
        .arg("-n")
        .arg("alice")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--url <URL>"));
}

#[test]
fn test_missing_credentials_without_terminal() {
    let home = tempdir().unwrap();
    main_command(&home)
        .arg("--url")
        .arg("http://127.0.0.1:9")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("未提供用户名"));
}

#[test]
fn test_password_from_environment_is_used() {
    let home = tempdir().unwrap();
    main_command(&home)
        .arg("--url")
        .arg("http://127.0.0.1:9")
        .env("MOODLE_USERNAME", "alice")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("未提供密码"));
}

#[test]
fn test_unreachable_site_is_login_failure() {
    let home = tempdir().unwrap();
    main_command(&home)
        .args(["--url", "http://127.0.0.1:9", "-n", "alice", "-p", "pw"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("登录失败"));
}

// --- 测试完整运行 ---

fn mock_site(server: &mut mockito::ServerGuard) -> Vec<mockito::Mock> {
    vec![
        server
            .mock("GET", "/login/index.php")
            .with_body(r#"<form><input name="logintoken" value="tok"></form>"#)
            .create(),
        server
            .mock("POST", "/login/index.php")
            .with_status(303)
            .with_header("location", "/my/")
            .create(),
        server.mock("GET", "/my/").with_body("<h1>Dashboard</h1>").create(),
        server
            .mock("GET", "/my/courses.php")
            .with_body(
                r#"<div class="dashboard-card" data-favourite="true">
                     <a href="/course/view.php?id=2"><span class="multiline">Algorithms101</span></a>
                   </div>"#,
            )
            .create(),
        server
            .mock("GET", "/my/index.php")
            .with_body("<div id='region-main'></div>")
            .create(),
        server
            .mock("GET", "/course/view.php")
            .match_query(mockito::Matcher::UrlEncoded("id".into(), "2".into()))
            .with_body(
                r#"<div class="course-content"><ul><li class="section" id="section-1">
                     <h3 class="sectionname">Week 1</h3>
                     <ul class="section"><li class="activity modtype_resource" id="module-10">
                       <a href="/pluginfile.php/30/mod_resource/content/1/slides.pdf"><span class="instancename">Lecture slides</span></a>
                     </li></ul>
                   </li></ul></div>"#,
            )
            .create(),
        server
            .mock("GET", "/pluginfile.php/30/mod_resource/content/1/slides.pdf")
            .with_header("content-type", "application/pdf")
            .with_body("%PDF-slides")
            .create(),
    ]
}

#[test]
fn test_list_mode_prints_courses() {
    let home = tempdir().unwrap();
    let mut server = mockito::Server::new();
    let _mocks = mock_site(&mut server);
    let url = server.url();

    main_command(&home)
        .args(["--url", url.as_str(), "-n", "alice", "-p", "pw", "--list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Algorithms101"));
}

#[test]
fn test_download_run_exits_zero_and_writes_file() {
    let home = tempdir().unwrap();
    let out = tempdir().unwrap();
    let mut server = mockito::Server::new();
    let _mocks = mock_site(&mut server);
    let url = server.url();

    main_command(&home)
        .args(["--url", url.as_str(), "-n", "alice", "-p", "pw", "-o"])
        .arg(out.path())
        .assert()
        .code(0);

    let file = out.path().join("Algorithms101").join("Week 1").join("slides.pdf");
    assert_eq!(fs::read_to_string(file).unwrap(), "%PDF-slides");
    assert!(home.path().join(".moodle-dl").join("config.json").exists());
}
