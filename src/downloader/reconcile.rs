// src/downloader/reconcile.rs

use super::index::ExistingFileIndex;
use crate::models::{DownloadAction, FileInfo};

/// 根据已有文件快照决定如何处理一个产物。纯函数，不访问文件系统。
pub fn reconcile(item: &FileInfo, index: &ExistingFileIndex, force: bool) -> DownloadAction {
    let Some(existing_len) = index.get(&item.filepath) else {
        return DownloadAction::DownloadNew;
    };
    if force {
        return DownloadAction::Overwrite;
    }
    if existing_len == 0 {
        // 上次运行留下的空文件视为未完成
        return DownloadAction::DownloadNew;
    }
    match item.size {
        Some(expected) if expected != existing_len => DownloadAction::Overwrite,
        _ => DownloadAction::Skip,
    }
}

/// 协调结论的简短说明，用于日志和报告。
pub fn describe(action: DownloadAction, item: &FileInfo, index: &ExistingFileIndex) -> String {
    match (action, index.get(&item.filepath)) {
        (DownloadAction::Skip, _) => "文件已存在".to_string(),
        (DownloadAction::DownloadNew, None) => "新文件".to_string(),
        (DownloadAction::DownloadNew, Some(_)) => "已有文件为空，重新下载".to_string(),
        (DownloadAction::Overwrite, Some(len)) => match item.size {
            Some(expected) if expected != len => {
                format!("大小不一致 (本地 {} 字节, 远程 {} 字节)", len, expected)
            }
            _ => "强制重新下载".to_string(),
        },
        (DownloadAction::Overwrite, None) => "强制重新下载".to_string(),
    }
}
