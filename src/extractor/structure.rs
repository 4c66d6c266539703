// src/extractor/structure.rs

use super::html::{self, LINK_SELECTOR};
use crate::{
    constants::layout,
    error::*,
    models::{Course, Module, ModuleKind, Section},
    session::Session,
    utils,
};
use log::{debug, info};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

static CONTENT_REGION_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".course-content, #region-main, [role=\"main\"]").unwrap()
});
static SECTION_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("li.section, div.section, .topics .topic").unwrap()
});
static SECTION_TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h3.sectionname, .sectionname, .content h3, .section-title").unwrap()
});
static ACTIVITY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.activity, div.activity").unwrap());
static ACTIVITY_TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".instancename, .activityname, .aalink").unwrap());
static MOD_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/mod/([a-z0-9_]+)/view\.php").unwrap());

/// 读取课程主页，得到有序的章节与模块列表。
pub struct StructureWalker<'a> {
    session: &'a Session,
}

impl<'a> StructureWalker<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    pub async fn walk(&self, course: &Course) -> AppResult<Vec<Section>> {
        info!("读取课程结构: {} ({})", course.name, course.url);
        let page = match self.session.client().get_page(&course.url).await {
            Ok(page) => page,
            Err(e) if e.is_session_level() => return Err(e),
            Err(e) => return Err(AppError::extraction(&course.name, format!("无法打开课程页面: {}", e))),
        };

        let sections = parse_course_page(&page.text, &page.url)
            .map_err(|reason| AppError::extraction_with_page(&course.name, reason, page.text.clone()))?;
        debug!(
            "课程 '{}' 共 {} 个章节, {} 个模块",
            course.name,
            sections.len(),
            sections.iter().map(|s| s.modules.len()).sum::<usize>()
        );
        Ok(sections)
    }
}

/// 解析课程页面。页面缺少课程内容区域时视为结构无法识别。
pub(crate) fn parse_course_page(page: &str, page_url: &Url) -> Result<Vec<Section>, String> {
    let document = Html::parse_document(page);
    let region = document
        .select(&CONTENT_REGION_SELECTOR)
        .next()
        .ok_or_else(|| "页面中没有课程内容区域".to_string())?;

    let section_elements = html::outermost(region.select(&SECTION_SELECTOR).collect());
    if section_elements.is_empty() {
        debug!("未找到章节标记，整个页面作为单一章节处理");
        return Ok(vec![Section {
            ordinal: 1,
            title: layout::MAIN_CONTENT_SECTION.to_string(),
            modules: parse_modules(region, page_url, 1),
        }]);
    }

    Ok(section_elements
        .into_iter()
        .enumerate()
        .map(|(i, element)| {
            let ordinal = i + 1;
            Section {
                ordinal,
                title: section_title(element, ordinal),
                modules: parse_modules(element, page_url, ordinal),
            }
        })
        .collect())
}

fn section_title(element: ElementRef, ordinal: usize) -> String {
    element
        .select(&SECTION_TITLE_SELECTOR)
        .map(html::visible_text)
        .find(|t| !t.is_empty())
        .or_else(|| {
            element
                .value()
                .attr("aria-label")
                .map(utils::collapse_whitespace)
                .filter(|t| !t.is_empty())
        })
        .unwrap_or_else(|| format!("{} {}", layout::SECTION_PLACEHOLDER_PREFIX, ordinal))
}

fn modname_from_url(url: &Url) -> Option<String> {
    MOD_PATH_RE
        .captures(url.path())
        .map(|caps| caps[1].to_string())
}

fn parse_activity(activity: ElementRef, page_url: &Url, fallback_id: String) -> Module {
    let modname_class = activity
        .value()
        .classes()
        .find_map(|c| c.strip_prefix("modtype_"))
        .map(str::to_string);

    let anchors: Vec<(ElementRef, Url)> = activity
        .select(&LINK_SELECTOR)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            html::absolute_url(page_url, href).map(|url| (a, url))
        })
        .collect();
    let mod_link = anchors.iter().find(|(_, url)| modname_from_url(url).is_some()).cloned();

    let kind = modname_class
        .or_else(|| mod_link.as_ref().and_then(|(_, url)| modname_from_url(url)))
        .map(|m| ModuleKind::from_modname(&m))
        .unwrap_or_else(|| ModuleKind::Unknown(String::new()));

    // 资源模块没有 /mod/ 链接时，直接指向文件的链接就是模块链接
    let link = mod_link.clone().or_else(|| {
        if kind != ModuleKind::Resource {
            return None;
        }
        anchors
            .iter()
            .find(|(_, url)| utils::is_file_url(url.as_str()))
            .cloned()
    });

    let id = activity
        .value()
        .attr("id")
        .and_then(|id| id.strip_prefix("module-"))
        .map(str::to_string)
        .or_else(|| mod_link.as_ref().and_then(|(_, url)| utils::query_param(url, "id")))
        .unwrap_or(fallback_id);

    let title = activity
        .select(&ACTIVITY_TITLE_SELECTOR)
        .map(html::visible_text)
        .find(|t| !t.is_empty())
        .or_else(|| {
            link.as_ref()
                .map(|(a, _)| html::visible_text(*a))
                .filter(|t| !t.is_empty())
        })
        .unwrap_or_else(|| format!("Module {}", id));

    Module {
        id,
        kind,
        title,
        url: link.map(|(_, url)| url),
    }
}

/// 章节内的模块按页面顺序排列。没有被可解析模块包含的文件链接
/// （例如写在标签或章节简介里的附件）作为独立的资源模块补充在最后。
fn parse_modules(container: ElementRef, page_url: &Url, ordinal: usize) -> Vec<Module> {
    let activities = html::outermost(container.select(&ACTIVITY_SELECTOR).collect());
    let mut modules = Vec::new();
    let mut claimed = Vec::new();

    for (i, activity) in activities.iter().enumerate() {
        let module = parse_activity(*activity, page_url, format!("{}-{}", ordinal, i + 1));
        if !matches!(module.kind, ModuleKind::Unknown(_)) && module.url.is_some() {
            claimed.push(activity.id());
        }
        modules.push(module);
    }

    let mut inline_count = 0;
    for link in container.select(&LINK_SELECTOR) {
        let Some(href) = link.value().attr("href") else { continue };
        if !utils::is_file_url(href) || link.ancestors().any(|a| claimed.contains(&a.id())) {
            continue;
        }
        let Some(url) = html::absolute_url(page_url, href) else { continue };
        if modules.iter().any(|m| m.url.as_ref() == Some(&url)) {
            continue;
        }
        inline_count += 1;
        let title = Some(html::visible_text(link))
            .filter(|t| !t.is_empty())
            .or_else(|| utils::filename_from_url(&url))
            .unwrap_or_else(|| format!("File {}", inline_count));
        modules.push(Module {
            id: format!("inline-{}-{}", ordinal, inline_count),
            kind: ModuleKind::Resource,
            title,
            url: Some(url),
        });
    }
    modules
}
