// src/cli.rs

use crate::constants;
use clap::{Parser, ValueEnum, command, crate_version};
use std::path::PathBuf;

/// 定义日志输出级别
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// command 属性
#[derive(Parser, Clone)]
#[command(
    version = crate_version!(),
    about,
    long_about = None,
    arg_required_else_help = true,
    disable_help_flag = true,
    disable_version_flag = true,
)]
pub struct Cli {
    // --- 站点 (Site) ---
    /// Moodle 站点地址，例如 https://moodle.example.edu
    #[arg(long, value_name = "URL", help_heading = "Site")]
    pub url: String,
    /// 登录用户名 (也可通过环境变量 MOODLE_USERNAME 提供)
    #[arg(short = 'n', long, help_heading = "Site")]
    pub username: Option<String>,
    /// 登录密码 (也可通过环境变量 MOODLE_PASSWORD 提供)
    #[arg(short = 'p', long, help_heading = "Site")]
    pub password: Option<String>,

    // --- 运行模式 (Mode) ---
    /// 交互式选择要下载的课程
    #[arg(short, long, action = clap::ArgAction::SetTrue, help_heading = "Mode")]
    pub interactive: bool,
    /// 只列出可见的课程，不下载
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Mode")]
    pub list: bool,

    // --- 下载选项 (Options) ---
    /// 指定下载的课程 (例如 '1-3,5', 'all')
    #[arg(long, default_value_t = constants::DEFAULT_SELECTION.to_string(), value_name = "SELECTION", help_heading = "Options")]
    pub select: String,
    /// 包含全部已选课程 (收藏课程排在前面)，而不只是收藏课程
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub all_courses: bool,
    /// 强制重新下载已存在的文件
    #[arg(short, long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub force: bool,
    /// 章节目录名前加上序号 (例如 '01 - Week 1')
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub numbered_sections: bool,
    /// 设置最大并发下载数
    #[arg(short, long, value_parser = clap::value_parser!(usize), help_heading = "Options")]
    pub workers: Option<usize>,
    /// 设置文件保存目录
    #[arg(short, long, value_name = "DIR", default_value_os_t = PathBuf::from(constants::DEFAULT_SAVE_DIR), help_heading = "Options")]
    pub output: PathBuf,

    // --- 通用选项 (General) ---
    /// 显示此帮助信息并退出
    #[arg(short = 'h', long, action = clap::ArgAction::Help, global = true, help_heading = "General")]
    _help: Option<bool>,
    /// 显示版本信息并退出
    #[arg(short = 'V', long, action = clap::ArgAction::Version, global = true, help_heading = "General")]
    _version: Option<bool>,
    /// (隐藏参数) 设置日志文件的输出级别，用于调试
    #[arg(long, value_enum, default_value_t = LogLevel::Off, global = true, hide = true)]
    pub log_level: LogLevel,
}
