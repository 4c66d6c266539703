// src/downloader/task_processor.rs

use crate::{DownloadJobContext, constants, error::*, models::*, utils};
use log::{debug, error};
use std::{fs, io::Write as IoWrite};
use tempfile::Builder;

/// `TaskProcessor` 封装了处理单个下载任务的所有逻辑。
pub struct TaskProcessor {
    context: DownloadJobContext,
}

impl TaskProcessor {
    pub fn new(context: DownloadJobContext) -> Self {
        Self { context }
    }

    /// 处理单个文件任务。会话过期作为 `Err` 返回，由调用方中止整个批次；
    /// 其余错误都转换为该文件的失败结果。
    pub async fn process(&self, item: &FileInfo, action: DownloadAction) -> AppResult<DownloadResult> {
        debug!("处理任务 '{}' ({:?})", item.filepath.display(), action);
        match self.write_atomically(item).await {
            Ok(bytes) => {
                debug!("文件 '{}' 写入 {} 字节", item.filepath.display(), bytes);
                Ok(DownloadResult {
                    filename: item.display_name(),
                    status: DownloadStatus::Written,
                    message: None,
                })
            }
            Err(e @ AppError::SessionExpired) => Err(e),
            Err(e) => {
                error!("处理任务 '{}' 时发生错误: {}", item.filepath.display(), e);
                Ok(DownloadResult {
                    filename: item.display_name(),
                    status: DownloadStatus::from(&e),
                    message: Some(e.to_string()),
                })
            }
        }
    }

    /// 先写入目标目录中的临时文件，完整收到内容后再重命名到最终位置。
    /// 任何失败都会随临时文件的析构一起清理，不会留下半截文件。
    async fn write_atomically(&self, item: &FileInfo) -> AppResult<u64> {
        let destination = utils::secure_join_path(&self.context.config.output_dir, &item.filepath)?;
        let parent = destination
            .parent()
            .ok_or_else(|| AppError::Security(format!("无效的目标路径: {:?}", item.filepath)))?;
        fs::create_dir_all(parent)?;

        let mut temp = Builder::new()
            .prefix(constants::TEMP_FILE_PREFIX)
            .suffix(constants::TEMP_FILE_SUFFIX)
            .tempfile_in(parent)?;

        let written = match &item.source {
            ArtifactSource::Remote(url) => {
                self.context
                    .session
                    .client()
                    .download(url, temp.as_file_mut(), &self.context.cancellation_token)
                    .await?
            }
            ArtifactSource::Inline(text) => {
                let file = temp.as_file_mut();
                file.write_all(text.as_bytes())?;
                file.flush()?;
                text.len() as u64
            }
        };

        temp.persist(&destination)?;
        Ok(written)
    }
}
