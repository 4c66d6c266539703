// src/extractor/mod.rs

pub mod assignment;
pub mod courses;
pub mod debug;
pub mod folder;
mod html;
pub mod resource;
pub mod structure;

use crate::{
    error::*,
    models::{Artifact, Course, Module, ModuleKind, Section},
    session::Session,
    utils,
};
use async_trait::async_trait;
use log::{debug, info};
use std::collections::HashMap;
use url::Url;

/// 解析单个模块时可用的上下文。
pub struct ResolveContext<'a> {
    pub session: &'a Session,
    pub course: &'a Course,
    pub section: &'a Section,
}

impl ResolveContext<'_> {
    /// 用于日志和调试文件名的定位描述，例如 `Algorithms101 / Week 1 / Lecture slides`。
    pub fn unit(&self, module: &Module) -> String {
        format!("{} / {} / {}", self.course.name, self.section.title, module.title)
    }
}

#[async_trait]
pub trait ModuleResolver: Send + Sync {
    async fn resolve(&self, module: &Module, ctx: &ResolveContext<'_>) -> AppResult<Vec<Artifact>>;
}

/// 不支持的模块类型（论坛、测验、标签等）不产生任何产物。
pub struct UnsupportedResolver;

#[async_trait]
impl ModuleResolver for UnsupportedResolver {
    async fn resolve(&self, module: &Module, ctx: &ResolveContext<'_>) -> AppResult<Vec<Artifact>> {
        info!("跳过不支持的模块类型 '{}': {}", module.kind, ctx.unit(module));
        Ok(Vec::new())
    }
}

/// 按模块类型分派到具体的解析器。新增类型只需注册一个新的实现。
pub struct ResolverRegistry {
    resolvers: HashMap<ModuleKind, Box<dyn ModuleResolver>>,
    fallback: Box<dyn ModuleResolver>,
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::new()
            .register(ModuleKind::Resource, resource::ResourceResolver)
            .register(ModuleKind::Folder, folder::FolderResolver)
            .register(ModuleKind::Assignment, assignment::AssignmentResolver)
    }
}

impl ResolverRegistry {
    /// 空注册表，所有类型都交给 `UnsupportedResolver`。
    pub fn new() -> Self {
        Self {
            resolvers: HashMap::new(),
            fallback: Box::new(UnsupportedResolver),
        }
    }

    pub fn register(mut self, kind: ModuleKind, resolver: impl ModuleResolver + 'static) -> Self {
        self.resolvers.insert(kind, Box::new(resolver));
        self
    }

    pub async fn resolve(&self, module: &Module, ctx: &ResolveContext<'_>) -> AppResult<Vec<Artifact>> {
        let resolver = self.resolvers.get(&module.kind).unwrap_or(&self.fallback);
        let artifacts = resolver.resolve(module, ctx).await?;
        debug!("模块 '{}' 解析出 {} 个产物", ctx.unit(module), artifacts.len());
        Ok(artifacts)
    }
}

/// 解析器共用：模块必须带有链接。
pub(crate) fn require_url<'m>(module: &'m Module, ctx: &ResolveContext<'_>) -> AppResult<&'m Url> {
    module
        .url
        .as_ref()
        .ok_or_else(|| AppError::extraction(ctx.unit(module), "模块没有可访问的链接"))
}

/// 为远程文件确定文件名：文件链接自带的名字优先，否则使用模块标题并推断扩展名。
pub(crate) fn remote_filename(
    url: &Url,
    server_name: Option<&str>,
    title: &str,
    content_type: Option<&str>,
) -> String {
    if let Some(name) = server_name.filter(|n| utils::has_extension(n)) {
        return utils::sanitize_filename(name);
    }
    if utils::is_file_url(url.as_str())
        && let Some(name) = utils::filename_from_url(url).filter(|n| utils::has_extension(n))
    {
        return utils::sanitize_filename(&name);
    }
    let base = if title.trim().is_empty() {
        server_name
            .map(str::to_string)
            .or_else(|| utils::filename_from_url(url))
            .unwrap_or_default()
    } else {
        title.to_string()
    };
    utils::sanitize_filename(&utils::ensure_extension(&base, url, content_type))
}
