// src/extractor/resource.rs

use super::{
    ModuleResolver, ResolveContext,
    html::{self, LINK_SELECTOR},
    remote_filename, require_url,
};
use crate::{
    client::{Page, Probe},
    constants::moodle,
    error::*,
    models::{Artifact, Module},
    utils,
};
use async_trait::async_trait;
use log::debug;
use regex::Regex;
use scraper::{Html, Selector};
use std::{path::PathBuf, sync::LazyLock};
use url::Url;

static DOWNLOAD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a.downloadbutton, .resourceworkaround a, .resourcecontent a").unwrap()
});
static EMBED_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("iframe[src], embed[src], object[data], source[src], video[src], audio[src]")
        .unwrap()
});
static SCRIPT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());
static DETAILS_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".resourcelinkdetails a, .urlworkaround a").unwrap()
});
static SCRIPT_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"((?:https?://|/)[^"'\s<>]*(?:pluginfile|/file)\.php[^"'\s<>]*)"#).unwrap()
});

const DOCUMENT_EXTENSIONS: [&str; 12] = [
    ".pdf", ".doc", ".docx", ".ppt", ".pptx", ".xls", ".xlsx", ".zip", ".rar", ".txt", ".odt", ".ipynb",
];

/// 单个文件资源。先不跟随重定向地探测带 `redirect=1` 的地址，
/// 拿不到文件时再从查看页面中按优先级寻找文件链接。
pub struct ResourceResolver;

#[async_trait]
impl ModuleResolver for ResourceResolver {
    async fn resolve(&self, module: &Module, ctx: &ResolveContext<'_>) -> AppResult<Vec<Artifact>> {
        let url = require_url(module, ctx)?;
        let client = ctx.session.client();

        if utils::is_file_url(url.as_str()) {
            let filename = remote_filename(url, None, &module.title, None);
            return Ok(vec![Artifact::remote(url.clone(), PathBuf::new(), filename, None)]);
        }

        let page = match client.probe(&redirect_url(url)).await? {
            Probe::File {
                url,
                filename,
                content_type,
                size,
            } => {
                debug!("资源 '{}' 直接返回了文件", module.title);
                let name = remote_filename(&url, filename.as_deref(), &module.title, content_type.as_deref());
                return Ok(vec![Artifact::remote(url, PathBuf::new(), name, size)]);
            }
            Probe::Redirect(target) if utils::is_file_url(target.as_str()) => {
                debug!("资源 '{}' 重定向到文件 {}", module.title, target);
                let name = remote_filename(&target, None, &module.title, None);
                return Ok(vec![Artifact::remote(target, PathBuf::new(), name, None)]);
            }
            Probe::Redirect(target) => client.get_page(&target).await?,
            Probe::Html(page) => page,
        };

        artifact_from_viewer(&page, module, ctx).map(|a| vec![a])
    }
}

fn artifact_from_viewer(page: &Page, module: &Module, ctx: &ResolveContext<'_>) -> AppResult<Artifact> {
    let file_url = find_file_url(&page.text, &page.url).ok_or_else(|| {
        AppError::extraction_with_page(ctx.unit(module), "资源页面中没有找到文件链接", page.text.clone())
    })?;
    debug!("资源 '{}' 的文件地址: {}", module.title, file_url);
    let name = remote_filename(&file_url, None, &module.title, None);
    Ok(Artifact::remote(file_url, PathBuf::new(), name, None))
}

/// `view.php?id=N` -> `view.php?id=N&redirect=1`，让服务器直接给出文件。
fn redirect_url(url: &Url) -> Url {
    if !url.path().ends_with(moodle::RESOURCE_VIEW) || utils::query_param(url, "redirect").is_some() {
        return url.clone();
    }
    let mut url = url.clone();
    url.query_pairs_mut().append_pair("redirect", "1");
    url
}

/// 在资源查看页面中寻找文件地址，各种主题和嵌入方式按可靠程度依次尝试。
pub(crate) fn find_file_url(page: &str, page_url: &Url) -> Option<Url> {
    let document = Html::parse_document(page);
    let resolve = |href: &str| {
        html::absolute_url(page_url, href).filter(|u| !utils::is_login_url(u) && u != page_url)
    };
    let attr_urls = |selector: &Selector, attrs: &[&str]| -> Vec<Url> {
        document
            .select(selector)
            .filter_map(|e| attrs.iter().find_map(|a| e.value().attr(a)))
            .filter_map(resolve)
            .collect()
    };

    // 主题自带的下载按钮
    if let Some(url) = attr_urls(&DOWNLOAD_SELECTOR, &["href"]).into_iter().next() {
        return Some(url);
    }

    // 页面上任意文件链接
    if let Some(url) = attr_urls(&LINK_SELECTOR, &["href"])
        .into_iter()
        .find(|u| utils::is_file_url(u.as_str()) || u.as_str().contains("forcedownload"))
    {
        return Some(url);
    }

    // 内嵌播放器和 PDF 查看器
    if let Some(url) = attr_urls(&EMBED_SELECTOR, &["src", "data"])
        .into_iter()
        .find(|u| utils::is_file_url(u.as_str()))
    {
        return Some(url);
    }

    // 写在脚本里的地址，JSON 中的斜杠可能被转义
    let script_url = document.select(&SCRIPT_SELECTOR).find_map(|script| {
        let text = script.text().collect::<String>().replace("\\/", "/");
        SCRIPT_FILE_RE
            .captures_iter(&text)
            .find_map(|caps| resolve(&caps[1]))
    });
    if script_url.is_some() {
        return script_url;
    }

    // 链接地址本身带有文档扩展名
    if let Some(url) = attr_urls(&LINK_SELECTOR, &["href"]).into_iter().find(|u| {
        let path = u.path().to_lowercase();
        DOCUMENT_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    }) {
        return Some(url);
    }

    attr_urls(&DETAILS_SELECTOR, &["href"]).into_iter().next()
}
