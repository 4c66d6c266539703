// src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("登录失败: {0}")]
    Auth(String),
    #[error("会话已过期 (被重定向到登录页)")]
    SessionExpired,
    #[error("内容提取失败 [{unit}]: {reason}")]
    Extraction {
        unit: String,
        reason: String,
        /// 失败时的原始页面，用于写入调试目录
        page: Option<String>,
    },
    #[error("服务器返回错误状态码 {status}: {url}")]
    HttpStatus { status: u16, url: String },
    #[error("服务器返回了空响应 (0 字节)")]
    EmptyResponse,
    #[error("网络请求超时")]
    Timeout,
    #[error("网络请求失败: {0}")]
    Network(#[from] reqwest::Error),
    #[error("网络中间件错误: {0}")]
    NetworkMiddleware(#[from] reqwest_middleware::Error),
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("临时文件持久化失败: {0}")]
    TempFilePersist(#[from] tempfile::PersistError),
    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("URL 解析错误: {0}")]
    Url(#[from] url::ParseError),
    #[error("安全错误: {0}")]
    Security(String),
    #[error("用户中断")]
    UserInterrupt,
    #[error("{0}")] // 只打印内部信息，不加任何前缀
    UserInputError(String),
    #[error("未知错误: {0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn extraction(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Extraction {
            unit: unit.into(),
            reason: reason.into(),
            page: None,
        }
    }

    pub fn extraction_with_page(
        unit: impl Into<String>,
        reason: impl Into<String>,
        page: String,
    ) -> Self {
        AppError::Extraction {
            unit: unit.into(),
            reason: reason.into(),
            page: Some(page),
        }
    }

    /// 会话级错误会中止整个运行，其余错误只影响单个课程/模块/文件。
    pub fn is_session_level(&self) -> bool {
        matches!(
            self,
            AppError::Auth(_) | AppError::SessionExpired | AppError::UserInterrupt
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
