// src/downloader/mod.rs

pub mod index;
mod job;
pub mod planner;
pub mod reconcile;
mod task_processor;
mod task_runner;

pub use index::ExistingFileIndex;
pub use job::CourseDownloader;
pub use reconcile::reconcile;

use crate::{
    models::{DownloadStatus, ExtractionFailureRecord, FailedArtifact, FileInfo},
    symbols, ui,
};
use colored::*;
use log::{error, info, warn};
use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::{Arc, Mutex},
};

#[derive(Clone, Default, Debug)]
pub struct DownloadStats {
    pub courses: usize,
    pub total: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// 一次运行的最终结果。
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub stats: DownloadStats,
    pub failed: Vec<FailedArtifact>,
    pub extraction_failures: Vec<ExtractionFailureRecord>,
    pub interrupted: bool,
}

impl RunSummary {
    /// 0 = 没有文件失败，1 = 有文件失败，130 = 用户中断。
    /// 解析失败已单独报告，不影响退出码。
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            130
        } else if !self.failed.is_empty() {
            1
        } else {
            0
        }
    }
}

#[derive(Default)]
struct Ledger {
    stats: DownloadStats,
    failed: Vec<FailedArtifact>,
    skipped: Vec<(String, String)>,
    extraction_failures: Vec<ExtractionFailureRecord>,
    /// 已有最终结果（写入、跳过或非会话类失败）的文件，会话过期重试时不再处理
    settled: HashSet<PathBuf>,
    interrupted: bool,
}

/// 在并发任务之间共享的运行统计。
#[derive(Clone, Default)]
pub struct DownloadManager {
    ledger: Arc<Mutex<Ledger>>,
}

impl DownloadManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_ledger<T>(&self, f: impl FnOnce(&mut Ledger) -> T) -> T {
        let mut ledger = self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut ledger)
    }

    pub fn record_course(&self) {
        self.with_ledger(|l| l.stats.courses += 1);
    }

    pub fn add_planned(&self, count: usize) {
        info!("本次运行共规划 {} 个文件", count);
        self.with_ledger(|l| l.stats.total += count);
    }

    pub fn record_written(&self, item: &FileInfo) {
        self.with_ledger(|l| {
            l.stats.written += 1;
            l.settled.insert(item.filepath.clone());
        });
    }

    pub fn record_skip(&self, item: &FileInfo, reason: &str) {
        info!("跳过文件 '{}'，原因: {}", item.filepath.display(), reason);
        self.with_ledger(|l| {
            l.stats.skipped += 1;
            l.skipped.push((item.filepath.to_string_lossy().into_owned(), reason.to_string()));
            l.settled.insert(item.filepath.clone());
        });
    }

    pub fn record_failure(&self, item: &FileInfo, status: DownloadStatus, detail: Option<&str>) {
        error!("文件 '{}' 下载失败，状态: {:?}", item.filepath.display(), status);
        let (_, _, msg) = status.get_display_info();
        let reason = match detail {
            Some(detail) => format!("{} ({})", msg, detail),
            None => msg.to_string(),
        };
        self.with_ledger(|l| {
            l.stats.failed += 1;
            l.failed.push(FailedArtifact {
                source: item.source.describe(),
                destination: item.filepath.clone(),
                reason,
            });
            if status != DownloadStatus::SessionError {
                l.settled.insert(item.filepath.clone());
            }
        });
    }

    /// 会话过期中止的任务在重新登录后会再次尝试，先撤销它们的失败记录。
    pub fn reset_session_failures(&self) {
        self.with_ledger(|l| {
            let session_reason = DownloadStatus::SessionError.get_display_info().2;
            let before = l.failed.len();
            l.failed.retain(|f| !f.reason.starts_with(session_reason));
            let removed = before - l.failed.len();
            if removed > 0 {
                info!("重置了 {} 个因会话过期失败的任务", removed);
                l.stats.failed -= removed;
            }
        });
    }

    pub fn is_settled(&self, item: &FileInfo) -> bool {
        self.with_ledger(|l| l.settled.contains(&item.filepath))
    }

    pub fn record_extraction_failure(&self, record: ExtractionFailureRecord) {
        warn!("解析失败 [{}]: {}", record.unit, record.reason);
        self.with_ledger(|l| l.extraction_failures.push(record));
    }

    pub fn mark_interrupted(&self) {
        self.with_ledger(|l| l.interrupted = true);
    }

    pub fn summary(&self) -> RunSummary {
        self.with_ledger(|l| RunSummary {
            stats: l.stats.clone(),
            failed: l.failed.clone(),
            extraction_failures: l.extraction_failures.clone(),
            interrupted: l.interrupted,
        })
    }

    pub fn print_report(&self) {
        let summary = self.summary();
        let skipped = self.with_ledger(|l| l.skipped.clone());
        let stats = &summary.stats;
        info!(
            "运行报告: Courses={}, Total={}, Written={}, Skipped={}, Failed={}, ExtractionFailures={}",
            stats.courses,
            stats.total,
            stats.written,
            stats.skipped,
            stats.failed,
            summary.extraction_failures.len()
        );

        if !skipped.is_empty() || !summary.failed.is_empty() || !summary.extraction_failures.is_empty() {
            ui::print_sub_header("下载详情报告");
            if !skipped.is_empty() {
                println!("\n{} 跳过的文件 ({}个):", *symbols::SKIP, stats.skipped);
                print_grouped_report(&skipped, |s| s.cyan());
            }
            if !summary.failed.is_empty() {
                println!("\n{} 失败的文件 ({}个):", *symbols::ERROR, stats.failed);
                for failure in &summary.failed {
                    println!("  - {}", failure.destination.display());
                    println!("    {}", format!("原因: {}", failure.reason).red());
                    println!("    来源: {}", failure.source);
                }
            }
            if !summary.extraction_failures.is_empty() {
                println!(
                    "\n{} 无法解析的内容 ({}个):",
                    *symbols::WARN,
                    summary.extraction_failures.len()
                );
                for record in &summary.extraction_failures {
                    println!("  - {}", record.unit);
                    println!("    {}", format!("原因: {}", record.reason).yellow());
                    if let Some(path) = &record.debug_file {
                        println!("    页面已保存: {}", path.display());
                    }
                }
            }
        }

        ui::print_sub_header("任务总结");
        println!("{} 已处理课程: {}", *symbols::INFO, stats.courses);
        if summary.interrupted {
            println!("{} 运行被用户中断，以下为中断前的结果。", *symbols::WARN);
        }
        if stats.failed == 0 && stats.written + stats.skipped == stats.total {
            println!(
                "{} 所有 {} 个文件均已就绪 ({} 个新写入, {} 个已跳过)。",
                *symbols::OK,
                stats.total,
                stats.written,
                stats.skipped
            );
        } else {
            println!(
                "{} | {} | {}",
                format!("写入: {}", stats.written).green(),
                format!("失败: {}", stats.failed).red(),
                format!("跳过: {}", stats.skipped).yellow()
            );
        }
    }
}

fn print_grouped_report(items: &[(String, String)], color_fn: fn(ColoredString) -> ColoredString) {
    let mut grouped: HashMap<&String, Vec<&String>> = HashMap::new();
    for (filename, reason) in items {
        grouped.entry(reason).or_default().push(filename);
    }
    let mut sorted_reasons: Vec<_> = grouped.keys().collect();
    sorted_reasons.sort();
    for reason in sorted_reasons {
        println!("  - {}", color_fn(format!("原因: {}", reason).into()));
        let mut filenames = grouped.get(reason).cloned().unwrap_or_default();
        filenames.sort();
        for filename in filenames {
            println!("    - {}", filename);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtifactSource, ContentKind};

    fn item(path: &str) -> FileInfo {
        FileInfo {
            filepath: PathBuf::from(path),
            source: ArtifactSource::Inline("x".into()),
            size: None,
            kind: ContentKind::Text,
        }
    }

    #[test]
    fn test_exit_code_follows_failures() {
        let manager = DownloadManager::new();
        manager.add_planned(2);
        manager.record_written(&item("a"));
        manager.record_extraction_failure(ExtractionFailureRecord {
            unit: "C / S / M".into(),
            reason: "bad page".into(),
            debug_file: None,
        });
        assert_eq!(manager.summary().exit_code(), 0);

        manager.record_failure(&item("b"), DownloadStatus::HttpError, Some("404"));
        let summary = manager.summary();
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(summary.failed[0].destination, PathBuf::from("b"));

        manager.mark_interrupted();
        assert_eq!(manager.summary().exit_code(), 130);
    }

    #[test]
    fn test_session_failures_are_reset_and_not_settled() {
        let manager = DownloadManager::new();
        let a = item("a");
        manager.record_failure(&a, DownloadStatus::SessionError, None);
        assert!(!manager.is_settled(&a));
        manager.reset_session_failures();
        assert_eq!(manager.summary().stats.failed, 0);
        assert!(manager.summary().failed.is_empty());
    }
}
