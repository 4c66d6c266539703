// src/config.rs

pub mod credentials;
pub mod file;

use self::file::load_or_create_external_config;
use crate::{cli::Cli, constants, error::AppResult};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub download_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumerationConfig {
    /// 展示（收藏）课程卡片的页面，按顺序扫描
    pub dashboard_pages: Vec<String>,
    /// 收藏列表为空时额外扫描的已选课程页面
    pub enrolled_pages: Vec<String>,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            dashboard_pages: constants::moodle::DASHBOARD_PAGES.iter().map(|p| p.to_string()).collect(),
            enrolled_pages: constants::moodle::ENROLLED_PAGES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub debug_dir_name: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            debug_dir_name: constants::DEFAULT_DEBUG_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub enumeration: EnumerationConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
}

impl ExternalConfig {
    pub(crate) fn default_app_config() -> Self {
        // 为 NetworkConfig 提供一组稳健的默认值
        let network_config = NetworkConfig {
            connect_timeout_secs: Some(10),
            timeout_secs: Some(60),
            download_timeout_secs: Some(1800),
            max_retries: Some(2),
        };

        Self {
            network: network_config,
            enumeration: EnumerationConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub max_workers: usize,
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// 页面请求的总超时，也用作下载时两个数据块之间的最长等待
    pub timeout: Duration,
    pub download_timeout: Duration,
    pub max_retries: u32,
    pub dashboard_pages: Vec<String>,
    pub enrolled_pages: Vec<String>,
    pub debug_dir_name: String,
    pub output_dir: PathBuf,
    pub force: bool,
    pub all_courses: bool,
    pub numbered_sections: bool,
}

impl AppConfig {
    pub fn new(args: &Cli) -> AppResult<Self> {
        let external_config = load_or_create_external_config()?;
        let network = external_config.network;

        Ok(Self {
            max_workers: args.workers.unwrap_or(constants::DEFAULT_WORKERS).max(1),
            user_agent: constants::USER_AGENT.into(),
            connect_timeout: Duration::from_secs(network.connect_timeout_secs.unwrap_or(10)),
            timeout: Duration::from_secs(network.timeout_secs.unwrap_or(60)),
            download_timeout: Duration::from_secs(network.download_timeout_secs.unwrap_or(1800)),
            max_retries: network.max_retries.unwrap_or(2),
            dashboard_pages: external_config.enumeration.dashboard_pages,
            enrolled_pages: external_config.enumeration.enrolled_pages,
            debug_dir_name: external_config.layout.debug_dir_name,
            output_dir: args.output.clone(),
            force: args.force,
            all_courses: args.all_courses,
            numbered_sections: args.numbered_sections,
        })
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.output_dir.join(&self.debug_dir_name)
    }
}

#[cfg(any(test, feature = "testing"))]
impl Default for AppConfig {
    fn default() -> Self {
        let enumeration = EnumerationConfig::default();
        Self {
            max_workers: 4,
            user_agent: "test-agent/1.0".to_string(),
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
            download_timeout: Duration::from_secs(30),
            max_retries: 0,
            dashboard_pages: enumeration.dashboard_pages,
            enrolled_pages: enumeration.enrolled_pages,
            debug_dir_name: constants::DEFAULT_DEBUG_DIR.to_string(),
            output_dir: PathBuf::from(constants::DEFAULT_SAVE_DIR),
            force: false,
            all_courses: false,
            numbered_sections: false,
        }
    }
}
