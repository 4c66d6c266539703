// src/utils.rs

use crate::{constants, error::*};
use anyhow::Context;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::{
    collections::BTreeSet,
    ffi::OsStr,
    path::{Component, Path, PathBuf},
    sync::LazyLock,
};
use url::Url;

static ILLEGAL_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|\x00-\x1f]"#).unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

pub fn sanitize_filename(name: &str) -> String {
    let original_name = name.trim();
    if original_name.is_empty() { return "unknown".to_string(); }

    let stem = Path::new(original_name)
        .file_stem()
        .unwrap_or_else(|| OsStr::new(original_name))
        .to_string_lossy()
        .to_uppercase();
    let windows_reserved = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];

    let mut name = if windows_reserved.contains(&stem.as_ref()) {
        format!("_{}", original_name)
    } else {
        original_name.to_string()
    };

    name = ILLEGAL_CHARS_RE.replace_all(&name, "_").into_owned();
    name = WHITESPACE_RE.replace_all(&name, " ").trim().to_string();
    name = name.trim_matches(|c: char| c == '.' || c.is_whitespace()).to_string();
    if name.is_empty() || name.chars().all(|c| c == '_') { return "unnamed".to_string(); }

    if name.len() > constants::MAX_FILENAME_BYTES {
        let (stem_part, ext) = split_extension(&name);
        name = if !ext.is_empty() && ext.len() < constants::MAX_FILENAME_BYTES / 2 {
            let max_stem_bytes = constants::MAX_FILENAME_BYTES.saturating_sub(ext.len());
            format!("{}{}", safe_truncate_utf8(stem_part, max_stem_bytes).trim_end(), ext)
        } else {
            safe_truncate_utf8(&name, constants::MAX_FILENAME_BYTES).trim_end().to_string()
        };
    }
    name
}

fn safe_truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes { return s; }
    let mut i = max_bytes;
    while i > 0 && !s.is_char_boundary(i) { i -= 1; }
    &s[..i]
}

/// 拆分为 (主干, 扩展名)，扩展名带点，例如 `("slides", ".pdf")`。
/// 以点开头的隐藏文件名、过长或纯数字的"扩展名"（如 `Lecture 1.2`）都视为没有扩展名。
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && name.len() - idx > 1 && name.len() - idx <= 11 => {
            let ext = &name[idx..];
            let tail = &ext[1..];
            if tail.chars().all(|c| c.is_ascii_alphanumeric())
                && tail.chars().any(|c| c.is_ascii_alphabetic())
            {
                (&name[..idx], ext)
            } else {
                (name, "")
            }
        }
        _ => (name, ""),
    }
}

pub fn has_extension(name: &str) -> bool {
    !split_extension(name).1.is_empty()
}

/// `slides.pdf` + 2 -> `slides (2).pdf`
pub fn with_numeric_suffix(name: &str, n: usize) -> String {
    let (stem, ext) = split_extension(name);
    format!("{} ({}){}", stem, n, ext)
}

pub fn truncate_text(text: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut end_pos = 0;
    for (i, c) in text.char_indices() {
        width += if c.is_ascii() { 1 } else { 2 };
        if width > max_width.saturating_sub(3) {
            end_pos = i;
            break;
        }
    }
    if end_pos == 0 { text.to_string() } else { format!("{}...", &text[..end_pos]) }
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

pub fn parse_selection_indices(selection_str: &str, total_items: usize) -> Vec<usize> {
    if selection_str.trim().eq_ignore_ascii_case("all") { return (0..total_items).collect(); }
    let mut indices = BTreeSet::new();
    for part in selection_str.split(',').map(|s| s.trim()) {
        if part.is_empty() { continue; }
        if let Some(range_part) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (range_part.0.trim().parse::<usize>(), range_part.1.trim().parse::<usize>()) {
                if start == 0 || end == 0 { continue; }
                let (min, max) = (start.min(end), start.max(end));
                for i in min..=max {
                    if i > 0 && i <= total_items { indices.insert(i - 1); }
                }
            }
        } else if let Ok(num) = part.parse::<usize>() {
            if num > 0 && num <= total_items { indices.insert(num - 1); }
        }
    }
    indices.into_iter().collect()
}

/// 将相对路径拼接到基础目录，拒绝任何 `..` 或绝对路径成分。
pub fn secure_join_path(base_dir: &Path, relative_path: &Path) -> AppResult<PathBuf> {
    let resolved_base = dunce::canonicalize(base_dir).with_context(|| format!("基础目录 '{:?}' 不存在或无法访问", base_dir))?;
    let mut final_path = resolved_base.clone();
    for component in relative_path.components() {
        match component {
            Component::Normal(part) => final_path.push(part),
            Component::ParentDir => return Err(AppError::Security("检测到路径遍历 '..' ".to_string())),
            _ => continue,
        }
    }
    if !final_path.starts_with(&resolved_base) {
        return Err(AppError::Security(format!("路径遍历攻击检测: '{:?}'", relative_path)));
    }
    Ok(final_path)
}

/// URL 路径最后一段（已解码），去掉查询参数。
pub fn filename_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    let decoded = percent_decode_str(last).decode_utf8_lossy().trim().to_string();
    if decoded.is_empty() { None } else { Some(decoded) }
}

/// 解析 Content-Disposition 中的文件名，支持 `filename*=UTF-8''...` 形式。
pub fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            let decoded = percent_decode_str(encoded[..end].trim().trim_matches('"'))
                .decode_utf8_lossy()
                .to_string();
            if !decoded.is_empty() {
                return Some(decoded);
            }
        }
    }
    let pos = header.find("filename=")?;
    let value = header[pos + 9..].trim();
    let name = if let Some(stripped) = value.strip_prefix('"') {
        &stripped[..stripped.find('"')?]
    } else {
        value[..value.find(';').unwrap_or(value.len())].trim()
    };
    if name.is_empty() { None } else { Some(name.to_string()) }
}

pub fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or("").trim().to_lowercase();
    let ext = match mime.as_str() {
        "application/pdf" => ".pdf",
        "application/msword" => ".doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => ".docx",
        "application/vnd.ms-powerpoint" => ".ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => ".pptx",
        "application/vnd.ms-excel" => ".xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => ".xlsx",
        "application/vnd.oasis.opendocument.text" => ".odt",
        "application/zip" | "application/x-zip-compressed" => ".zip",
        "application/x-7z-compressed" => ".7z",
        "application/vnd.rar" | "application/x-rar-compressed" => ".rar",
        "application/gzip" => ".gz",
        "application/json" => ".json",
        "application/xml" | "text/xml" => ".xml",
        "text/plain" => ".txt",
        "text/csv" => ".csv",
        "text/html" => ".html",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/svg+xml" => ".svg",
        "audio/mpeg" => ".mp3",
        "audio/wav" | "audio/x-wav" => ".wav",
        "video/mp4" => ".mp4",
        "video/webm" => ".webm",
        "video/quicktime" => ".mov",
        _ => return None,
    };
    Some(ext)
}

/// 从 URL 文本中猜测格式，长的格式名在前以免 `doc` 抢先匹配 `docx`。
pub fn extension_from_url_hint(url: &str) -> Option<&'static str> {
    const HINTS: [(&str, &str); 24] = [
        ("pdf", ".pdf"), ("docx", ".docx"), ("doc", ".doc"), ("pptx", ".pptx"),
        ("ppt", ".ppt"), ("xlsx", ".xlsx"), ("xls", ".xls"), ("odt", ".odt"),
        ("ods", ".ods"), ("odp", ".odp"), ("txt", ".txt"), ("csv", ".csv"),
        ("zip", ".zip"), ("rar", ".rar"), ("7z", ".7z"), ("mp4", ".mp4"),
        ("mp3", ".mp3"), ("m4a", ".m4a"), ("webm", ".webm"), ("jpeg", ".jpeg"),
        ("jpg", ".jpg"), ("png", ".png"), ("ipynb", ".ipynb"), ("h5p", ".h5p"),
    ];
    let lower = url.to_lowercase();
    HINTS
        .iter()
        .find(|(hint, _)| lower.contains(&format!(".{}", hint)) || lower.contains(&format!("{}=", hint)))
        .map(|(_, ext)| *ext)
}

/// 在没有扩展名时为文件名补全扩展名。
pub fn ensure_extension(name: &str, url: &Url, content_type: Option<&str>) -> String {
    if has_extension(name) {
        return name.to_string();
    }
    let ext = content_type
        .and_then(extension_from_content_type)
        .or_else(|| extension_from_url_hint(url.as_str()))
        .unwrap_or(constants::layout::FALLBACK_EXTENSION);
    format!("{}{}", name, ext)
}

pub fn is_login_url(url: &Url) -> bool {
    url.path().ends_with(constants::moodle::LOGIN_PATH)
}

pub fn is_file_url(url: &str) -> bool {
    url.contains(constants::moodle::PLUGINFILE) || url.contains(&format!("/{}", constants::moodle::LEGACY_FILE))
}

pub fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection_indices() {
        // 测试基本情况
        assert_eq!(parse_selection_indices("1,3,5", 5), vec![0, 2, 4]);

        // 测试范围
        assert_eq!(parse_selection_indices("2-4", 5), vec![1, 2, 3]);

        // 测试 "all" 关键字 (大小写不敏感)
        assert_eq!(parse_selection_indices("all", 3), vec![0, 1, 2]);
        assert_eq!(parse_selection_indices("All", 3), vec![0, 1, 2]);

        // 测试混合、乱序和重复
        assert_eq!(parse_selection_indices("5, 1-2, 1", 5), vec![0, 1, 4]);

        // 测试无效和越界输入
        assert_eq!(parse_selection_indices("1,10,foo,-2", 5), vec![0]);

        // 测试空输入
        assert_eq!(parse_selection_indices("", 5), Vec::<usize>::new());
    }

    #[test]
    fn test_sanitize_filename() {
        // 测试非法字符
        assert_eq!(sanitize_filename("a\\b/c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j".to_string());

        // 测试首尾空格和点
        assert_eq!(sanitize_filename(" . my file. "), "my file".to_string());

        // 测试多个连续空格
        assert_eq!(sanitize_filename("Week   1"), "Week 1".to_string());

        // 测试 Windows 保留字 (大小写不敏感)
        assert_eq!(sanitize_filename("CON.txt"), "_CON.txt".to_string());
        assert_eq!(sanitize_filename("aux"), "_aux".to_string());

        // 测试空或只有非法字符的输入
        assert_eq!(sanitize_filename(""), "unknown".to_string());
        assert_eq!(sanitize_filename("<>|"), "unnamed".to_string());

        // 测试文件名截断 (确保不破坏UTF-8和扩展名)
        let very_long_name = format!("{}.pdf", "讲义".repeat(80));
        let truncated = sanitize_filename(&very_long_name);
        assert!(truncated.len() <= constants::MAX_FILENAME_BYTES);
        assert!(truncated.ends_with(".pdf"));
    }

    #[test]
    fn test_numeric_suffix_goes_before_extension() {
        assert_eq!(with_numeric_suffix("slides.pdf", 2), "slides (2).pdf");
        assert_eq!(with_numeric_suffix("README", 3), "README (3)");
        assert_eq!(with_numeric_suffix("archive.tar.gz", 2), "archive.tar (2).gz");
    }

    #[test]
    fn test_split_extension_ignores_odd_suffixes() {
        assert_eq!(split_extension("slides.pdf"), ("slides", ".pdf"));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
        assert_eq!(split_extension("Week 1. Intro"), ("Week 1. Intro", ""));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension("Lecture 1.2"), ("Lecture 1.2", ""));
    }

    #[test]
    fn test_filename_from_url_decodes_last_segment() {
        let url = Url::parse("https://m.example.edu/pluginfile.php/12/mod_resource/content/1/Lecture%201.pdf?forcedownload=1").unwrap();
        assert_eq!(filename_from_url(&url).as_deref(), Some("Lecture 1.pdf"));
    }

    #[test]
    fn test_parse_content_disposition() {
        assert_eq!(parse_content_disposition(r#"attachment; filename="notes.pdf""#).as_deref(), Some("notes.pdf"));
        assert_eq!(parse_content_disposition("inline; filename=plain.txt; size=3").as_deref(), Some("plain.txt"));
        assert_eq!(
            parse_content_disposition("attachment; filename*=UTF-8''%E8%AE%B2%E4%B9%89.pdf").as_deref(),
            Some("讲义.pdf")
        );
        assert_eq!(parse_content_disposition("inline"), None);
    }

    #[test]
    fn test_ensure_extension_fallbacks() {
        let url = Url::parse("https://m.example.edu/mod/resource/view.php?id=4").unwrap();
        assert_eq!(ensure_extension("slides.pdf", &url, None), "slides.pdf");
        assert_eq!(ensure_extension("slides", &url, Some("application/pdf; charset=binary")), "slides.pdf");
        assert_eq!(ensure_extension("slides", &url, None), "slides.bin");

        let hinted = Url::parse("https://m.example.edu/mod/resource/view.php?id=4&pdf=1").unwrap();
        assert_eq!(ensure_extension("slides", &hinted, None), "slides.pdf");
    }
}
