// src/extractor/debug.rs

use crate::utils;
use log::{debug, warn};
use std::{fs, path::PathBuf};

/// 把解析失败的原始页面写入调试目录，方便事后检查页面结构。
/// 写入失败只记录日志，不会影响正常流程。
#[derive(Debug, Clone)]
pub struct DebugDumper {
    dir: PathBuf,
}

impl DebugDumper {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// 文件名由定位信息和单元标识拼接而成：`<课程>__<章节>__<模块>__<标识>.html`。
    /// 标题相同的不同模块各有一个文件；同一单元再次失败时覆盖旧文件。
    pub fn dump(&self, parts: &[&str], identity: &str, page: &str) -> Option<PathBuf> {
        let stem = parts
            .iter()
            .chain(std::iter::once(&identity))
            .map(|p| utils::sanitize_filename(p))
            .collect::<Vec<_>>()
            .join("__");
        let path = self.dir.join(utils::sanitize_filename(&format!("{}.html", stem)));

        let result = fs::create_dir_all(&self.dir).and_then(|_| fs::write(&path, page));
        match result {
            Ok(()) => {
                debug!("已保存调试页面: {:?}", path);
                Some(path)
            }
            Err(e) => {
                warn!("无法写入调试页面 {:?}: {}", path, e);
                None
            }
        }
    }
}
