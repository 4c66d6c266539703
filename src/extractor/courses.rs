// src/extractor/courses.rs

use super::html::{self, LINK_SELECTOR};
use crate::{
    constants::moodle,
    error::*,
    models::{Course, CourseListing, EnumerationWarning},
    session::Session,
    utils,
};
use itertools::Itertools;
use log::{debug, info, warn};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

static CARD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        ".dashboard-card, .coursebox, .course-info-container, .course-listitem, [data-region=\"course-content\"]",
    )
    .unwrap()
});
static CARD_NAME_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".coursename, .card-title, .course-title, .multiline, h3, h4").unwrap()
});
static FAVORITE_MARKER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("[data-region=\"is-favourite\"], .fa-star, .icon-favourite").unwrap()
});

/// 发现当前用户可见的课程。
pub struct CourseEnumerator<'a> {
    session: &'a Session,
    dashboard_pages: &'a [String],
    enrolled_pages: &'a [String],
}

impl<'a> CourseEnumerator<'a> {
    pub fn new(session: &'a Session, dashboard_pages: &'a [String], enrolled_pages: &'a [String]) -> Self {
        Self {
            session,
            dashboard_pages,
            enrolled_pages,
        }
    }

    /// 默认只返回收藏课程；`include_all` 时收藏课程在前，其余课程随后。
    /// 没有任何收藏时回退为全部课程，并附带 `NoFavorites` 警告。
    pub async fn enumerate(&self, include_all: bool) -> AppResult<CourseListing> {
        let mut found = self.scan_pages(self.dashboard_pages).await?;
        let has_favorites = found.iter().any(|c| c.favorite);

        if has_favorites && !include_all {
            let courses: Vec<Course> = found.into_iter().filter(|c| c.favorite).collect();
            info!("发现 {} 门收藏课程", courses.len());
            return Ok(CourseListing {
                courses,
                warning: None,
            });
        }

        merge_courses(&mut found, self.scan_pages(self.enrolled_pages).await?);
        let courses = order_favorites_first(found);
        let warning = (!has_favorites).then_some(EnumerationWarning::NoFavorites);
        if warning.is_some() {
            warn!("未发现收藏课程，回退为全部 {} 门已选课程", courses.len());
        } else {
            info!("发现 {} 门课程 (含全部已选课程)", courses.len());
        }
        Ok(CourseListing { courses, warning })
    }

    async fn scan_pages(&self, pages: &[String]) -> AppResult<Vec<Course>> {
        let mut found = Vec::new();
        for path in pages {
            let url = self.session.url(path)?;
            let page = match self.session.client().get_page(&url).await {
                Ok(page) => page,
                Err(e) if e.is_session_level() => return Err(e),
                Err(e) => {
                    warn!("无法读取课程列表页面 '{}': {}", url, e);
                    continue;
                }
            };
            let courses = parse_course_listing(&page.text, &page.url);
            debug!("页面 '{}' 中解析出 {} 门课程", page.url, courses.len());
            merge_courses(&mut found, courses);
        }
        Ok(found)
    }
}

/// 合并时按课程 ID 去重，只要任一来源标记为收藏就视为收藏。
fn merge_courses(into: &mut Vec<Course>, incoming: Vec<Course>) {
    for course in incoming {
        match into.iter_mut().find(|c| c.id == course.id) {
            Some(existing) => existing.favorite |= course.favorite,
            None => into.push(course),
        }
    }
}

fn order_favorites_first(courses: Vec<Course>) -> Vec<Course> {
    let (favorites, others): (Vec<_>, Vec<_>) = courses.into_iter().partition(|c| c.favorite);
    favorites
        .into_iter()
        .chain(others)
        .unique_by(|c| c.id.clone())
        .collect()
}

/// 从课程列表页面提取课程。优先识别课程卡片；页面上没有卡片时退而扫描所有课程链接。
pub(crate) fn parse_course_listing(page: &str, page_url: &Url) -> Vec<Course> {
    let document = Html::parse_document(page);
    let cards = html::outermost(document.select(&CARD_SELECTOR).collect());

    let mut courses = Vec::new();
    for card in &cards {
        if let Some(course) = course_from_card(*card, page_url) {
            merge_courses(&mut courses, vec![course]);
        }
    }
    if !courses.is_empty() {
        return courses;
    }

    for link in document.select(&LINK_SELECTOR) {
        let Some((id, url)) = course_link(link, page_url) else { continue };
        let name = html::visible_text(link);
        if name.is_empty() {
            continue;
        }
        merge_courses(
            &mut courses,
            vec![Course {
                id,
                name,
                favorite: false,
                url,
            }],
        );
    }
    courses
}

fn course_link(link: ElementRef, page_url: &Url) -> Option<(String, Url)> {
    let href = link.value().attr("href")?;
    if !href.contains(moodle::COURSE_VIEW) {
        return None;
    }
    let url = html::absolute_url(page_url, href)?;
    let id = utils::query_param(&url, "id").filter(|id| !id.is_empty())?;
    Some((id, url))
}

fn course_from_card(card: ElementRef, page_url: &Url) -> Option<Course> {
    let (link, id, url) = card
        .select(&LINK_SELECTOR)
        .find_map(|a| course_link(a, page_url).map(|(id, url)| (a, id, url)))?;

    let name = card
        .select(&CARD_NAME_SELECTOR)
        .map(html::visible_text)
        .find(|t| !t.is_empty())
        .or_else(|| Some(html::visible_text(link)).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| format!("Course {}", id));

    Some(Course {
        id,
        name,
        favorite: is_favorite_card(card),
        url,
    })
}

fn is_favorite_card(card: ElementRef) -> bool {
    let flag = |name: &str| {
        card.value()
            .attr(name)
            .is_some_and(|v| v == "true" || v == "1")
    };
    if flag("data-favourite") || flag("data-favorite") {
        return true;
    }
    if ["favourite", "favorite", "starred"]
        .iter()
        .any(|class| html::has_class(card, class))
    {
        return true;
    }
    card.select(&FAVORITE_MARKER_SELECTOR).any(|marker| {
        html::is_visible(marker)
            && !marker
                .ancestors()
                .take_while(|a| a.id() != card.id())
                .filter_map(ElementRef::wrap)
                .any(|a| !html::is_visible(a))
    })
}
