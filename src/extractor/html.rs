// src/extractor/html.rs

//! 页面解析的公共工具。`scraper::Html` 不是 `Send`，所以这里的函数都是同步的，
//! 只接收文本并返回拥有所有权的结果，不能跨越 `.await` 持有文档。

use crate::utils;
use scraper::{ElementRef, Html, Selector, node::Element};
use std::{collections::HashSet, sync::LazyLock};
use url::Url;

pub(crate) static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").unwrap());

const HIDDEN_CLASSES: [&str; 5] = ["sr-only", "accesshide", "visually-hidden", "hidden", "d-none"];

fn is_hidden_element(element: &Element) -> bool {
    matches!(element.name(), "script" | "style" | "noscript")
        || element.classes().any(|c| HIDDEN_CLASSES.contains(&c))
        || element.attr("aria-hidden") == Some("true")
}

/// 元素中用户可见的文字，跳过读屏专用和隐藏的子元素，空白折叠为单个空格。
pub(crate) fn visible_text(element: ElementRef) -> String {
    let root_id = element.id();
    let mut out = String::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else { continue };
        let hidden = node
            .ancestors()
            .take_while(|a| a.id() != root_id)
            .chain(std::iter::once(*element))
            .any(|a| a.value().as_element().is_some_and(is_hidden_element));
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    utils::collapse_whitespace(&out)
}

pub(crate) fn is_visible(element: ElementRef) -> bool {
    !is_hidden_element(element.value())
}

pub(crate) fn has_class(element: ElementRef, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// 将页面中的链接转换为绝对地址，忽略锚点、脚本和邮件链接。
pub(crate) fn absolute_url(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
    {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// 页面中所有指向文件的链接（`pluginfile.php` 等），按出现顺序去重，附带链接文字。
pub(crate) fn file_links(document: &Html, base: &Url) -> Vec<(Url, String)> {
    let mut seen = HashSet::new();
    document
        .select(&LINK_SELECTOR)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            if !utils::is_file_url(href) {
                return None;
            }
            let url = absolute_url(base, href)?;
            Some((url, visible_text(a)))
        })
        .filter(|(url, _)| seen.insert(url.as_str().to_string()))
        .collect()
}

/// 只保留最外层的匹配元素。主题之间的选择器经常互相嵌套，
/// 例如 `li.section` 里面还有一个 `div.section`。
pub(crate) fn outermost<'a>(elements: Vec<ElementRef<'a>>) -> Vec<ElementRef<'a>> {
    let ids: HashSet<_> = elements.iter().map(|e| e.id()).collect();
    elements
        .into_iter()
        .filter(|e| !e.ancestors().any(|a| ids.contains(&a.id())))
        .collect()
}
