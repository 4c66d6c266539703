// src/downloader/job.rs

use super::{
    index::ExistingFileIndex,
    planner::PathPlanner,
    reconcile::{self, reconcile},
    task_runner,
};
use crate::{
    DownloadJobContext, constants,
    error::*,
    extractor::{
        ResolveContext, ResolverRegistry, courses::CourseEnumerator, debug::DebugDumper,
        structure::StructureWalker,
    },
    models::{Artifact, Course, DownloadAction, ExtractionFailureRecord, FileInfo},
    session::Session,
    symbols, ui, utils,
};
use colored::*;
use log::{debug, error, info, warn};
use std::{fs, future::Future, sync::atomic::Ordering};

/// 一门课程解析出的全部产物，以及解析失败的模块。
struct CourseExtraction {
    section_count: usize,
    artifacts: Vec<(usize, String, Artifact)>,
    failures: Vec<ExtractionFailureRecord>,
}

/// 串联一次完整运行：枚举课程、逐门解析、规划路径、协调并下载。
pub struct CourseDownloader {
    context: DownloadJobContext,
    registry: ResolverRegistry,
    dumper: DebugDumper,
}

impl CourseDownloader {
    pub fn new(context: DownloadJobContext) -> Self {
        let dumper = DebugDumper::new(context.config.debug_dir());
        Self {
            context,
            registry: ResolverRegistry::default(),
            dumper,
        }
    }

    /// 替换默认的模块解析器注册表。
    pub fn with_registry(mut self, registry: ResolverRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub async fn run(&self) -> AppResult<()> {
        let config = &self.context.config;
        let enumerator = CourseEnumerator::new(
            &self.context.session,
            &config.dashboard_pages,
            &config.enrolled_pages,
        );
        let enumerator = &enumerator;
        let listing = self
            .with_reauth("课程列表", move || enumerator.enumerate(config.all_courses))
            .await?;

        if listing.fell_back() {
            ui::box_message(
                "未找到收藏课程",
                &[
                    "仪表盘上没有标记为收藏 (星标) 的课程。",
                    "已回退为全部已选课程。在 Moodle 中收藏课程可以缩小下载范围。",
                ],
                |s| s.yellow(),
            );
        }
        if listing.courses.is_empty() {
            println!("\n{} 没有找到任何课程。", *symbols::INFO);
            return Ok(());
        }

        let selected = self.select_courses(&listing.courses);
        if self.context.args.list {
            return Ok(());
        }
        if selected.is_empty() {
            println!("\n{} 未选择任何课程，任务结束。", *symbols::INFO);
            return Ok(());
        }

        fs::create_dir_all(&config.output_dir)?;
        let absolute_path = dunce::canonicalize(&config.output_dir)?;
        info!("文件将保存到目录: \"{}\"", absolute_path.display());
        println!(
            "\n{} 文件将保存到目录: \"{}\"",
            *symbols::INFO,
            absolute_path.display()
        );

        let mut planner = PathPlanner::new(config.numbered_sections, &config.debug_dir_name);
        let mut planned = Vec::new();
        for course in &selected {
            self.check_cancelled()?;
            ui::print_sub_header(&course.name);
            match self
                .with_reauth(&course.name, move || self.collect_course(course))
                .await
            {
                Ok(extraction) => planned.extend(self.plan_course(course, extraction, &mut planner)),
                Err(e) if e.is_session_level() => return Err(e),
                Err(e) => {
                    let record = self.extraction_failure(
                        &[course.name.as_str()],
                        &format!("c{}", course.id),
                        e,
                    );
                    self.context.manager.record_extraction_failure(record);
                }
            }
            self.context.manager.record_course();
        }

        self.context.manager.add_planned(planned.len());
        self.fetch_all(&planned).await
    }

    fn check_cancelled(&self) -> AppResult<()> {
        if self.context.cancellation_token.load(Ordering::Relaxed) {
            return Err(AppError::UserInterrupt);
        }
        Ok(())
    }

    /// 会话过期时重新登录一次并重试同一个单元；再次过期即放弃整个运行。
    async fn with_reauth<T, F, Fut>(&self, unit: &str, mut op: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        match op().await {
            Err(AppError::SessionExpired) => {
                warn!("处理 '{}' 时会话过期，重新登录后重试", unit);
                println!("{} 会话已过期，正在重新登录...", *symbols::WARN);
                self.context.session.reauthenticate().await?;
                op().await.inspect_err(|e| {
                    if matches!(e, AppError::SessionExpired) {
                        error!("重新登录后处理 '{}' 仍然会话过期，放弃本次运行", unit);
                    }
                })
            }
            other => other,
        }
    }

    fn select_courses(&self, courses: &[Course]) -> Vec<Course> {
        let options: Vec<String> = courses
            .iter()
            .map(|c| {
                let star = if c.favorite { "★".yellow().to_string() } else { " ".to_string() };
                format!(
                    "{} {}",
                    star,
                    utils::truncate_text(&c.name, constants::FILENAME_TRUNCATE_LENGTH)
                )
            })
            .collect();

        let args = &self.context.args;
        let indices = if args.list {
            ui::print_header("课程列表");
            for (i, option) in options.iter().enumerate() {
                println!("  [{}] {}", format!("{:>2}", i + 1).yellow(), option);
            }
            return Vec::new();
        } else if args.interactive {
            ui::select_indices_from_menu(&options, "课程列表 (★ = 收藏)", &args.select)
        } else {
            utils::parse_selection_indices(&args.select, options.len())
        };
        debug!("根据选择 '{}' 解析出的课程索引: {:?}", args.select, indices);
        indices.into_iter().map(|i| courses[i].clone()).collect()
    }

    async fn collect_course(&self, course: &Course) -> AppResult<CourseExtraction> {
        let session: &Session = &self.context.session;
        let sections = StructureWalker::new(session).walk(course).await?;
        let mut extraction = CourseExtraction {
            section_count: sections.len(),
            artifacts: Vec::new(),
            failures: Vec::new(),
        };

        for section in &sections {
            for module in &section.modules {
                self.check_cancelled()?;
                let ctx = ResolveContext {
                    session,
                    course,
                    section,
                };
                match self.registry.resolve(module, &ctx).await {
                    Ok(artifacts) => extraction.artifacts.extend(
                        artifacts
                            .into_iter()
                            .map(|a| (section.ordinal, section.title.clone(), a)),
                    ),
                    Err(e) if e.is_session_level() => return Err(e),
                    Err(e) => extraction.failures.push(self.extraction_failure(
                        &[course.name.as_str(), section.title.as_str(), module.title.as_str()],
                        &format!("c{}-m{}", course.id, module.id),
                        e,
                    )),
                }
            }
        }
        Ok(extraction)
    }

    fn plan_course(
        &self,
        course: &Course,
        extraction: CourseExtraction,
        planner: &mut PathPlanner,
    ) -> Vec<FileInfo> {
        for record in extraction.failures {
            self.context.manager.record_extraction_failure(record);
        }
        let course_dir = planner.course_dir(course);
        let files: Vec<FileInfo> = extraction
            .artifacts
            .into_iter()
            .map(|(ordinal, title, artifact)| {
                let section_dir = planner.section_dir(ordinal, &title, extraction.section_count);
                planner.place(&course_dir, &section_dir, artifact)
            })
            .collect();
        println!("{} 发现 {} 个文件", *symbols::INFO, files.len());
        files
    }

    /// 记录解析失败，失败页面（如果有）写入调试目录。
    /// `identity` 由课程和模块 id 组成，区分标题相同的单元。
    fn extraction_failure(&self, parts: &[&str], identity: &str, error: AppError) -> ExtractionFailureRecord {
        let (reason, page) = match error {
            AppError::Extraction { reason, page, .. } => (reason, page),
            other => (other.to_string(), None),
        };
        let debug_file = page.and_then(|page| self.dumper.dump(parts, identity, &page));
        let unit = parts.join(" / ");
        println!("{} 无法解析 '{}': {}", *symbols::WARN, unit, reason.yellow());
        ExtractionFailureRecord {
            unit,
            reason,
            debug_file,
        }
    }

    /// 拍摄已有文件快照，协调后下载。批次因会话过期中止时重新登录一次，
    /// 只重试尚未得出结果的文件。
    async fn fetch_all(&self, planned: &[FileInfo]) -> AppResult<()> {
        let config = &self.context.config;
        let manager = &self.context.manager;
        let mut reauthenticated = false;
        loop {
            let index = ExistingFileIndex::snapshot(&config.output_dir, &config.debug_dir_name)?;
            let mut to_fetch: Vec<(FileInfo, DownloadAction)> = Vec::new();
            for item in planned.iter().filter(|f| !manager.is_settled(f)) {
                let action = reconcile(item, &index, config.force);
                let reason = reconcile::describe(action, item, &index);
                if action == DownloadAction::Skip {
                    manager.record_skip(item, &reason);
                } else {
                    debug!("文件 '{}': {}", item.filepath.display(), reason);
                    to_fetch.push((item.clone(), action));
                }
            }

            match task_runner::execute_tasks(&self.context, &to_fetch).await {
                Err(AppError::SessionExpired) if !reauthenticated => {
                    reauthenticated = true;
                    warn!("下载过程中会话过期，重新登录后继续剩余任务");
                    println!("\n{} 会话已过期，重新登录后继续...", *symbols::WARN);
                    self.context.session.reauthenticate().await?;
                    manager.reset_session_failures();
                }
                other => return other,
            }
        }
    }
}
