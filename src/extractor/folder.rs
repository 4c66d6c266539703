// src/extractor/folder.rs

use super::{ModuleResolver, ResolveContext, html, remote_filename, require_url};
use crate::{
    error::*,
    models::{Artifact, Module},
    utils,
};
use async_trait::async_trait;
use log::{debug, info};
use percent_encoding::percent_decode_str;
use scraper::Html;
use std::path::PathBuf;
use url::Url;

/// 文件夹模块：列出页面上的全部文件，保存在以文件夹标题命名的子目录中，
/// 文件夹内部的子目录结构按文件地址保留。
pub struct FolderResolver;

#[async_trait]
impl ModuleResolver for FolderResolver {
    async fn resolve(&self, module: &Module, ctx: &ResolveContext<'_>) -> AppResult<Vec<Artifact>> {
        let url = require_url(module, ctx)?;
        let page = ctx.session.client().get_page(url).await?;
        let entries = folder_entries(&page.text, &page.url);
        if entries.is_empty() {
            info!("文件夹 '{}' 为空", ctx.unit(module));
            return Ok(Vec::new());
        }

        let folder_dir = PathBuf::from(utils::sanitize_filename(&module.title));
        let artifacts = entries
            .into_iter()
            .map(|(file_url, label)| {
                let subpath = nested_dirs(&file_url)
                    .into_iter()
                    .fold(folder_dir.clone(), |path, dir| path.join(dir));
                let filename = remote_filename(&file_url, None, &label, None);
                debug!("文件夹条目: {:?}/{}", subpath, filename);
                Artifact::remote(file_url, subpath, filename, None)
            })
            .collect();
        Ok(artifacts)
    }
}

fn folder_entries(page: &str, page_url: &Url) -> Vec<(Url, String)> {
    let document = Html::parse_document(page);
    html::file_links(&document, page_url)
}

/// `.../pluginfile.php/<ctx>/mod_folder/content/<rev>/Labs/week1/a.pdf` -> `["Labs", "week1"]`
fn nested_dirs(url: &Url) -> Vec<String> {
    let Some(segments) = url.path_segments() else { return Vec::new() };
    let segments: Vec<&str> = segments.collect();
    let Some(content_idx) = segments.iter().position(|s| *s == "content") else { return Vec::new() };
    let start = content_idx + 2;
    if segments.len() <= start + 1 {
        return Vec::new();
    }
    segments[start..segments.len() - 1]
        .iter()
        .map(|s| percent_decode_str(s).decode_utf8_lossy().trim().to_string())
        .filter(|s| !s.is_empty() && s != "." && s != "..")
        .map(|s| utils::sanitize_filename(&s))
        .collect()
}
