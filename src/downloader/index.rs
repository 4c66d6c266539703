// src/downloader/index.rs

use crate::{constants, error::*};
use log::{debug, warn};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// 输出目录中已有文件的快照：相对路径 -> 字节数。
/// 在全部模块解析完成之后、开始下载之前拍摄一次，协调判断只读取这个快照。
#[derive(Debug, Clone, Default)]
pub struct ExistingFileIndex {
    files: HashMap<PathBuf, u64>,
}

impl ExistingFileIndex {
    /// 遍历 `root`，跳过调试目录。之前被中断的运行留下的临时文件在这里清理掉，
    /// 不计入快照。`root` 不存在时得到空快照。
    pub fn snapshot(root: &Path, debug_dir_name: &str) -> AppResult<Self> {
        let mut files = HashMap::new();
        if !root.exists() {
            return Ok(Self { files });
        }

        let walker = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.depth() == 1 && entry.file_type().is_dir() && name == debug_dir_name)
        });
        let mut swept = 0;
        for entry in walker {
            let entry = entry.map_err(|e| AppError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if is_temp_file(&entry.file_name().to_string_lossy()) {
                match fs::remove_file(entry.path()) {
                    Ok(()) => swept += 1,
                    Err(e) => warn!("无法删除残留的临时文件 {:?}: {}", entry.path(), e),
                }
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else { continue };
            let len = entry.metadata().map_err(|e| AppError::Io(e.into()))?.len();
            files.insert(relative.to_path_buf(), len);
        }
        if swept > 0 {
            debug!("已清理 {} 个残留的临时文件", swept);
        }
        debug!("输出目录 {:?} 中已有 {} 个文件", root, files.len());
        Ok(Self { files })
    }

    pub fn get(&self, relative: &Path) -> Option<u64> {
        self.files.get(relative).copied()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_temp_file(name: &str) -> bool {
    name.starts_with(constants::TEMP_FILE_PREFIX) && name.ends_with(constants::TEMP_FILE_SUFFIX)
}

impl FromIterator<(PathBuf, u64)> for ExistingFileIndex {
    fn from_iter<I: IntoIterator<Item = (PathBuf, u64)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}
