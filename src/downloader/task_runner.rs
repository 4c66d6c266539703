// src/downloader/task_runner.rs

use super::task_processor::TaskProcessor;
use crate::{DownloadJobContext, error::*, models::*, symbols, ui};
use futures::{StreamExt, stream};
use indicatif::ProgressBar;
use log::error;
use std::{
    cmp::min,
    sync::{Arc, atomic::Ordering},
};

/// 负责执行一批下载任务，管理并发和进度报告。
pub async fn execute_tasks(
    context: &DownloadJobContext,
    tasks: &[(FileInfo, DownloadAction)],
) -> AppResult<()> {
    let max_workers = min(context.config.max_workers, tasks.len());
    if max_workers == 0 {
        return Ok(());
    }

    println!(
        "\n{} 开始下载 {} 个文件 (并发数: {})...",
        *symbols::INFO,
        tasks.len(),
        max_workers
    );
    let main_pbar = ui::new_tasks_progress_bar(tasks.len() as u64, "下载");

    let error_sender = Arc::new(tokio::sync::Mutex::new(None::<AppError>));

    stream::iter(tasks.to_owned())
        .for_each_concurrent(max_workers, |(task, action)| {
            run_single_concurrent_task(
                task,
                action,
                context.clone(),
                main_pbar.clone(),
                error_sender.clone(),
            )
        })
        .await;

    main_pbar.finish_and_clear();
    if context.cancellation_token.load(Ordering::Relaxed) {
        return Err(AppError::UserInterrupt);
    }
    if let Some(err) = error_sender.lock().await.take() {
        return Err(err);
    }
    Ok(())
}

/// 在并发池中运行的单个任务单元。
async fn run_single_concurrent_task(
    task: FileInfo,
    action: DownloadAction,
    context: DownloadJobContext,
    main_pbar: ProgressBar,
    error_sender: Arc<tokio::sync::Mutex<Option<AppError>>>,
) {
    if context.cancellation_token.load(Ordering::Relaxed) || error_sender.lock().await.is_some() {
        return;
    }

    let processor = TaskProcessor::new(context.clone());
    match processor.process(&task, action).await {
        Ok(result) => {
            match result.status {
                DownloadStatus::Written => context.manager.record_written(&task),
                // 中断的任务不算失败，下次运行会重新下载
                DownloadStatus::Cancelled => {}
                status => context
                    .manager
                    .record_failure(&task, status, result.message.as_deref()),
            }
            main_pbar.inc(1);

            let (symbol, color_fn, default_msg) = result.status.get_display_info();
            let line = match (&result.status, result.message) {
                (DownloadStatus::Written, _) => format!("{} {}", symbol, task.filepath.display()),
                (_, Some(detail)) => format!(
                    "{} {} {}",
                    symbol,
                    result.filename,
                    color_fn(format!("失败: {} (详情: {})", default_msg, detail).into())
                ),
                (_, None) => format!("{} {} {}", symbol, result.filename, color_fn(default_msg.into())),
            };
            main_pbar.println(line);
        }
        Err(e @ AppError::SessionExpired) => {
            // 会话过期会中止整个批次，由上层重新登录后继续
            let mut error_lock = error_sender.lock().await;
            if error_lock.is_none() {
                error!("任务 '{}' 因会话过期失败，将中止整个批次。", task.filepath.display());
                context
                    .manager
                    .record_failure(&task, DownloadStatus::SessionError, None);
                *error_lock = Some(e);
            }
        }
        Err(e) => {
            error!("未捕获的错误在并发循环中: {}", e);
            context
                .manager
                .record_failure(&task, DownloadStatus::from(&e), Some(&e.to_string()));
            main_pbar.inc(1);
        }
    }
}
