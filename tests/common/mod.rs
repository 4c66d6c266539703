// tests/common/mod.rs

#![allow(dead_code)]

use clap::Parser;
use mockito::{Matcher, Mock, ServerGuard};
use moodle_dl::{
    DownloadJobContext,
    cli::Cli,
    client::RobustClient,
    config::{AppConfig, credentials::Credentials},
    downloader::DownloadManager,
    session::Session,
};
use std::{
    path::Path,
    sync::{Arc, atomic::AtomicBool},
};

pub const LOGIN_PAGE: &str = r#"<html><body><form action="/login/index.php" method="post">
<input type="hidden" name="logintoken" value="tok123">
<input name="username"><input name="password" type="password">
</form></body></html>"#;

/// 登录页、登录提交 (303 到 /my/) 以及登录后的首页。
pub async fn mock_login(server: &mut ServerGuard) -> Vec<Mock> {
    vec![
        server
            .mock("GET", "/login/index.php")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(LOGIN_PAGE)
            .create_async()
            .await,
        server
            .mock("POST", "/login/index.php")
            .with_status(303)
            .with_header("location", "/my/")
            .with_header("set-cookie", "MoodleSession=abc123; path=/")
            .create_async()
            .await,
        server
            .mock("GET", "/my/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body><h1>Dashboard</h1></body></html>")
            .create_async()
            .await,
    ]
}

/// 带查询参数的页面，例如 `/course/view.php?id=2`。
pub async fn mock_page(server: &mut ServerGuard, path: &str, query: &[(&str, &str)], body: &str) -> Mock {
    server
        .mock("GET", path)
        .match_query(query_matcher(query))
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(body)
        .create_async()
        .await
}

pub fn query_matcher(query: &[(&str, &str)]) -> Matcher {
    Matcher::AllOf(
        query
            .iter()
            .map(|(k, v)| Matcher::UrlEncoded(k.to_string(), v.to_string()))
            .collect(),
    )
}

/// 资源模块带 `redirect=1` 的探测请求直接 303 到文件地址。
pub async fn mock_resource_redirect(server: &mut ServerGuard, id: &str, location: &str) -> Mock {
    server
        .mock("GET", "/mod/resource/view.php")
        .match_query(query_matcher(&[("id", id), ("redirect", "1")]))
        .with_status(303)
        .with_header("location", location)
        .create_async()
        .await
}

pub async fn mock_file(server: &mut ServerGuard, path: &str, body: &str) -> Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "application/octet-stream")
        .with_body(body)
        .create_async()
        .await
}

pub fn dashboard(cards: &[(&str, &str, bool)]) -> String {
    let cards: String = cards
        .iter()
        .map(|(id, name, favorite)| {
            let marker = if *favorite {
                r#"<span data-region="is-favourite" aria-hidden="false"><i class="icon fa fa-star"></i></span>"#
            } else {
                r#"<span data-region="is-favourite" class="hidden" aria-hidden="true"><i class="icon fa fa-star"></i></span>"#
            };
            format!(
                r#"<div class="card dashboard-card" data-course-id="{id}">
                     <a href="/course/view.php?id={id}"><span class="sr-only">Course name</span><span class="multiline">{name}</span></a>
                     {marker}
                   </div>"#
            )
        })
        .collect();
    format!(r#"<html><body><div id="region-main">{}</div></body></html>"#, cards)
}

pub fn test_config(output: &Path) -> AppConfig {
    AppConfig {
        output_dir: output.to_path_buf(),
        dashboard_pages: vec!["/my/courses.php".to_string()],
        enrolled_pages: vec![],
        ..AppConfig::default()
    }
}

pub async fn login(server_url: &str, config: Arc<AppConfig>) -> Session {
    let client = Arc::new(RobustClient::new(config).unwrap());
    Session::authenticate(
        client,
        server_url,
        Credentials {
            username: "alice".to_string(),
            password: "pw".to_string(),
        },
    )
    .await
    .unwrap()
}

pub async fn job_context(server_url: &str, config: AppConfig, extra_args: &[&str]) -> DownloadJobContext {
    let config = Arc::new(config);
    let session = login(server_url, config.clone()).await;
    let mut argv = vec!["moodle-dl", "--url", server_url];
    argv.extend_from_slice(extra_args);
    DownloadJobContext {
        manager: DownloadManager::new(),
        session: Arc::new(session),
        config,
        args: Arc::new(Cli::parse_from(argv)),
        cancellation_token: Arc::new(AtomicBool::new(false)),
    }
}
