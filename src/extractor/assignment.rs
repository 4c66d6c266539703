// src/extractor/assignment.rs

use super::{ModuleResolver, ResolveContext, html, remote_filename, require_url};
use crate::{
    constants::layout,
    error::*,
    models::{Artifact, Module},
    utils,
};
use async_trait::async_trait;
use log::debug;
use scraper::{Html, Selector};
use std::{path::PathBuf, sync::LazyLock};
use url::Url;

static DESCRIPTION_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".assignmentinfo, .descriptionbox, .assign-intro, .activity-description, #intro")
        .unwrap()
});

struct AssignmentPage {
    description: String,
    attachments: Vec<(Url, String)>,
}

/// 作业模块：说明文字写入 `description.txt`，页面上的附件一并下载，
/// 全部放在以作业标题命名的子目录中。
pub struct AssignmentResolver;

#[async_trait]
impl ModuleResolver for AssignmentResolver {
    async fn resolve(&self, module: &Module, ctx: &ResolveContext<'_>) -> AppResult<Vec<Artifact>> {
        let url = require_url(module, ctx)?;
        let page = ctx.session.client().get_page(url).await?;
        let parsed = parse_assignment_page(&page.text, &page.url);
        debug!(
            "作业 '{}': 说明 {} 字, {} 个附件",
            module.title,
            parsed.description.chars().count(),
            parsed.attachments.len()
        );

        let subpath = PathBuf::from(utils::sanitize_filename(&module.title));
        let mut artifacts = vec![Artifact::inline(
            description_text(&module.title, &parsed.description),
            subpath.clone(),
            layout::ASSIGNMENT_DESCRIPTION_FILE,
        )];
        artifacts.extend(parsed.attachments.into_iter().map(|(file_url, label)| {
            let filename = remote_filename(&file_url, None, &label, None);
            Artifact::remote(file_url, subpath.clone(), filename, None)
        }));
        Ok(artifacts)
    }
}

fn parse_assignment_page(page: &str, page_url: &Url) -> AssignmentPage {
    let document = Html::parse_document(page);
    let description = html::outermost(document.select(&DESCRIPTION_SELECTOR).collect())
        .into_iter()
        .map(html::visible_text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    AssignmentPage {
        description,
        attachments: html::file_links(&document, page_url),
    }
}

/// 说明文件总以标题开头，页面上没有说明时也不会写出空文件。
fn description_text(title: &str, description: &str) -> String {
    if description.is_empty() {
        format!("{}\n", title)
    } else {
        format!("{}\n\n{}\n", title, description)
    }
}
