// src/main.rs

use clap::{CommandFactory, FromArgMatches};
use colored::*;
use moodle_dl::{cli::Cli, error::AppError, logger, run_from_cli, symbols};
use std::{
    env,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

#[tokio::main]
async fn main() {
    // 为 Windows 终端启用 ANSI 颜色支持。
    #[cfg(windows)]
    {
        colored::control::set_virtual_terminal(true).ok();
    }

    let cancellation_token = Arc::new(AtomicBool::new(false));
    let signal_token = cancellation_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        signal_token.store(true, Ordering::SeqCst);
        println!(
            "\n{} 用户中断，正在停止下载... (再按一次 {} 立即退出)",
            *symbols::WARN,
            *symbols::CTRL_C
        );
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let bin_name = env::var("CARGO_BIN_NAME").unwrap_or_else(|_| "moodle-dl".to_string());

    let after_help = format!(
        "示例:\n  # 下载所有收藏课程\n  {bin} --url https://moodle.example.edu -n alice\n\n  # 交互式选择课程，包含全部已选课程\n  {bin} --url https://moodle.example.edu -i --all-courses\n\n  # 只列出课程\n  {bin} --url https://moodle.example.edu --list",
        bin = bin_name
    );

    let cmd = Cli::command().after_help(after_help);
    let args = match Cli::from_arg_matches(&cmd.get_matches()) {
        Ok(args) => Arc::new(args),
        Err(e) => e.exit(),
    };
    logger::init_logger(args.log_level);

    match run_from_cli(args, cancellation_token).await {
        Ok(summary) => std::process::exit(summary.exit_code()),
        Err(AppError::UserInterrupt) => {
            eprintln!("\n{} 操作已取消。", "[!]".yellow());
            std::process::exit(130);
        }
        Err(e) => {
            eprintln!("\n{} {}", "[X]".red(), format!("程序执行出错: {}", e).red());
            std::process::exit(1);
        }
    }
}
