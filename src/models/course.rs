// src/models/course.rs

use crate::constants::moodle::modtypes;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub favorite: bool,
    pub url: Url,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationWarning {
    /// 仪表盘上没有收藏课程，结果回退为全部已选课程
    NoFavorites,
}

/// 课程枚举结果。`warning` 非空时调用方需要向用户提示。
#[derive(Debug, Clone, Default)]
pub struct CourseListing {
    pub courses: Vec<Course>,
    pub warning: Option<EnumerationWarning>,
}

impl CourseListing {
    pub fn fell_back(&self) -> bool {
        self.warning == Some(EnumerationWarning::NoFavorites)
    }
}

#[derive(Debug, Clone)]
pub struct Section {
    /// 从 1 开始
    pub ordinal: usize,
    pub title: String,
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Resource,
    Folder,
    Assignment,
    /// 保留 Moodle 的原始类型名，便于日志排查
    Unknown(String),
}

impl ModuleKind {
    pub fn from_modname(modname: &str) -> Self {
        match modname.trim().to_lowercase().as_str() {
            modtypes::RESOURCE => ModuleKind::Resource,
            modtypes::FOLDER => ModuleKind::Folder,
            modtypes::ASSIGN => ModuleKind::Assignment,
            other => ModuleKind::Unknown(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            ModuleKind::Resource => modtypes::RESOURCE,
            ModuleKind::Folder => modtypes::FOLDER,
            ModuleKind::Assignment => modtypes::ASSIGN,
            ModuleKind::Unknown(tag) => tag,
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::Unknown(tag) if tag.is_empty() => f.write_str("unknown"),
            kind => f.write_str(kind.tag()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Module {
    pub id: String,
    pub kind: ModuleKind,
    pub title: String,
    pub url: Option<Url>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_kind_from_modname() {
        assert_eq!(ModuleKind::from_modname("resource"), ModuleKind::Resource);
        assert_eq!(ModuleKind::from_modname(" Folder "), ModuleKind::Folder);
        assert_eq!(ModuleKind::from_modname("assign"), ModuleKind::Assignment);
        assert_eq!(ModuleKind::from_modname("forum"), ModuleKind::Unknown("forum".into()));
        assert_eq!(ModuleKind::Unknown(String::new()).to_string(), "unknown");
    }
}
