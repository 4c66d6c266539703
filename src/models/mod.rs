// src/models/mod.rs

pub mod course;

pub use course::{Course, CourseListing, EnumerationWarning, Module, ModuleKind, Section};

use crate::error::AppError;
use crate::symbols;
use crate::utils;
use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DownloadStatus {
    Written,
    HttpError,
    EmptyResponse,
    NetworkError,
    ConnectionError,
    TimeoutError,
    SessionError,
    IoError,
    Cancelled,
    UnexpectedError,
}

impl DownloadStatus {
    pub fn get_display_info(
        &self,
    ) -> (
        &'static ColoredString,
        fn(ColoredString) -> ColoredString,
        &'static str,
    ) {
        match self {
            DownloadStatus::Written => (&symbols::OK, |s| s.green(), "下载完成"),
            DownloadStatus::HttpError => (&symbols::ERROR, |s| s.red(), "服务器返回错误"),
            DownloadStatus::EmptyResponse => (&symbols::ERROR, |s| s.red(), "服务器返回空文件"),
            DownloadStatus::NetworkError => (&symbols::ERROR, |s| s.red(), "网络请求失败"),
            DownloadStatus::ConnectionError => (&symbols::ERROR, |s| s.red(), "无法建立连接"),
            DownloadStatus::TimeoutError => (&symbols::WARN, |s| s.yellow(), "网络连接超时"),
            DownloadStatus::SessionError => (&symbols::ERROR, |s| s.red(), "会话已过期"),
            DownloadStatus::IoError => (&symbols::ERROR, |s| s.red(), "本地文件读写错误"),
            DownloadStatus::Cancelled => (&symbols::WARN, |s| s.yellow(), "用户中断，已放弃"),
            DownloadStatus::UnexpectedError => {
                (&symbols::ERROR, |s| s.red(), "发生未预期的程序错误")
            }
        }
    }
}

impl From<&AppError> for DownloadStatus {
    fn from(error: &AppError) -> Self {
        match error {
            AppError::SessionExpired | AppError::Auth(_) => DownloadStatus::SessionError,
            AppError::Network(err)
            | AppError::NetworkMiddleware(reqwest_middleware::Error::Reqwest(err)) => {
                if err.is_timeout() {
                    DownloadStatus::TimeoutError
                } else if err.is_connect() {
                    DownloadStatus::ConnectionError
                } else if err.is_status() {
                    DownloadStatus::HttpError
                } else {
                    DownloadStatus::NetworkError
                }
            }
            AppError::NetworkMiddleware(_) => DownloadStatus::NetworkError,
            AppError::HttpStatus { .. } => DownloadStatus::HttpError,
            AppError::EmptyResponse => DownloadStatus::EmptyResponse,
            AppError::Timeout => DownloadStatus::TimeoutError,
            AppError::Io(_) | AppError::TempFilePersist(_) | AppError::Security(_) => {
                DownloadStatus::IoError
            }
            AppError::UserInterrupt => DownloadStatus::Cancelled,
            _ => DownloadStatus::UnexpectedError,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub filename: String,
    pub status: DownloadStatus,
    pub message: Option<String>,
}

/// 对单个产物的协调结论。
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DownloadAction {
    Skip,
    DownloadNew,
    Overwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ContentKind {
    Document,
    Archive,
    Media,
    Image,
    Text,
    #[default]
    Other,
}

impl ContentKind {
    pub fn from_filename(name: &str) -> Self {
        let ext = utils::split_extension(name).1.trim_start_matches('.').to_lowercase();
        match ext.as_str() {
            "pdf" | "doc" | "docx" | "odt" | "rtf" | "ppt" | "pptx" | "odp" | "xls" | "xlsx"
            | "ods" | "csv" | "tex" | "epub" | "ipynb" => ContentKind::Document,
            "zip" | "rar" | "7z" | "tar" | "gz" | "tgz" => ContentKind::Archive,
            "mp3" | "wav" | "aac" | "flac" | "ogg" | "m4a" | "mp4" | "mov" | "avi" | "wmv"
            | "webm" | "mkv" | "m4v" => ContentKind::Media,
            "jpg" | "jpeg" | "png" | "gif" | "svg" | "bmp" | "tif" | "tiff" => ContentKind::Image,
            "txt" | "md" | "html" | "htm" => ContentKind::Text,
            _ => ContentKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactSource {
    Remote(Url),
    /// 无需下载、直接写入的文本，例如作业说明
    Inline(String),
}

impl ArtifactSource {
    pub fn describe(&self) -> String {
        match self {
            ArtifactSource::Remote(url) => url.to_string(),
            ArtifactSource::Inline(_) => "(inline)".to_string(),
        }
    }
}

/// 模块解析器的输出：一个可下载单元及其建议的位置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub source: ArtifactSource,
    /// 相对于所在章节目录的子目录，空表示直接放在章节目录下
    pub subpath: PathBuf,
    pub filename: String,
    pub size: Option<u64>,
    pub kind: ContentKind,
}

impl Artifact {
    pub fn remote(url: Url, subpath: PathBuf, filename: String, size: Option<u64>) -> Self {
        let kind = ContentKind::from_filename(&filename);
        Self {
            source: ArtifactSource::Remote(url),
            subpath,
            filename,
            size,
            kind,
        }
    }

    pub fn inline(text: String, subpath: PathBuf, filename: &str) -> Self {
        Self {
            size: Some(text.len() as u64),
            source: ArtifactSource::Inline(text),
            subpath,
            filename: filename.to_string(),
            kind: ContentKind::Text,
        }
    }
}

/// 已分配最终路径的下载任务。`filepath` 相对于输出根目录，运行内唯一。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub filepath: PathBuf,
    pub source: ArtifactSource,
    pub size: Option<u64>,
    #[serde(default)]
    pub kind: ContentKind,
}

impl FileInfo {
    pub fn display_name(&self) -> String {
        self.filepath
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.filepath.to_string_lossy().into_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedArtifact {
    pub source: String,
    pub destination: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFailureRecord {
    pub unit: String,
    pub reason: String,
    pub debug_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind_from_filename() {
        assert_eq!(ContentKind::from_filename("slides.PDF"), ContentKind::Document);
        assert_eq!(ContentKind::from_filename("code.zip"), ContentKind::Archive);
        assert_eq!(ContentKind::from_filename("lecture.mp4"), ContentKind::Media);
        assert_eq!(ContentKind::from_filename("description.txt"), ContentKind::Text);
        assert_eq!(ContentKind::from_filename("README"), ContentKind::Other);
    }

    #[test]
    fn test_status_from_error() {
        assert_eq!(DownloadStatus::from(&AppError::EmptyResponse), DownloadStatus::EmptyResponse);
        assert_eq!(DownloadStatus::from(&AppError::SessionExpired), DownloadStatus::SessionError);
        assert_eq!(
            DownloadStatus::from(&AppError::HttpStatus { status: 404, url: "x".into() }),
            DownloadStatus::HttpError
        );
        assert_eq!(DownloadStatus::from(&AppError::UserInterrupt), DownloadStatus::Cancelled);
    }
}
