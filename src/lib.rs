// src/lib.rs

pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod downloader;
pub mod error;
pub mod extractor;
pub mod logger;
pub mod models;
pub mod session;
pub mod symbols;
pub mod ui;
pub mod utils;

use crate::{
    cli::Cli,
    client::RobustClient,
    config::{AppConfig, credentials},
    downloader::{CourseDownloader, DownloadManager, RunSummary},
    error::{AppError, AppResult},
    session::Session,
};
use log::{debug, info};
use std::{
    io::IsTerminal,
    sync::{Arc, atomic::AtomicBool},
};

/// 核心的执行上下文，包含所有任务所需的状态和工具
#[derive(Clone)]
pub struct DownloadJobContext {
    pub manager: DownloadManager,
    pub session: Arc<Session>,
    pub config: Arc<AppConfig>,
    pub args: Arc<Cli>,
    pub cancellation_token: Arc<AtomicBool>,
}

/// 库的公共入口点，由 `main.rs` 调用
pub async fn run_from_cli(args: Arc<Cli>, cancellation_token: Arc<AtomicBool>) -> AppResult<RunSummary> {
    let config = Arc::new(AppConfig::new(&args)?);
    debug!("加载的应用配置: {:?}", config);

    let credentials = credentials::resolve_credentials(
        args.username.as_deref(),
        args.password.as_deref(),
        std::io::stdin().is_terminal(),
    )?;

    let http_client = Arc::new(RobustClient::new(config.clone())?);
    ui::print_header(&format!("登录 {}", args.url));
    let session = Session::authenticate(http_client, &args.url, credentials).await?;
    println!("{} 登录成功。", *symbols::OK);
    info!("已登录站点 {}", session.base_url());

    let context = DownloadJobContext {
        manager: DownloadManager::new(),
        session: Arc::new(session),
        config,
        args,
        cancellation_token,
    };
    run_with_context(context).await
}

/// 在已认证的上下文中完成一次运行并打印报告。用户中断时返回中断前的结果。
pub async fn run_with_context(context: DownloadJobContext) -> AppResult<RunSummary> {
    match CourseDownloader::new(context.clone()).run().await {
        Ok(()) => {}
        Err(AppError::UserInterrupt) => context.manager.mark_interrupted(),
        Err(e) => return Err(e),
    }
    if !context.args.list {
        context.manager.print_report();
    }
    Ok(context.manager.summary())
}
