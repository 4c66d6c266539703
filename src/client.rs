// src/client.rs

use crate::{config::AppConfig, error::*, utils};
use futures::StreamExt;
use log::{debug, trace};
use reqwest::{StatusCode, cookie::Jar, header, redirect};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::{
    io::Write,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use url::Url;

/// 一次页面请求的结果。`url` 是跟随重定向之后的最终地址。
#[derive(Debug, Clone)]
pub struct Page {
    pub status: StatusCode,
    pub url: Url,
    pub content_type: Option<String>,
    pub text: String,
}

/// 不跟随重定向地探测一个链接。
#[derive(Debug, Clone)]
pub enum Probe {
    Redirect(Url),
    File {
        url: Url,
        filename: Option<String>,
        content_type: Option<String>,
        size: Option<u64>,
    },
    Html(Page),
}

/// 所有请求共享同一个 Cookie 容器，因此登录一次之后三个客户端都带着会话。
#[derive(Clone)]
pub struct RobustClient {
    /// 页面请求，带瞬时错误重试
    pub client: ClientWithMiddleware,
    /// 文件下载，不重试：重新运行整个工具即是重试
    files: reqwest::Client,
    /// 不跟随重定向，用于找出资源的真实文件地址
    probe: reqwest::Client,
    config: Arc<AppConfig>,
}

impl RobustClient {
    pub fn new(config: Arc<AppConfig>) -> AppResult<Self> {
        let jar = Arc::new(Jar::default());
        let base_builder = || {
            reqwest::Client::builder()
                .user_agent(config.user_agent.clone())
                .cookie_provider(jar.clone())
                .connect_timeout(config.connect_timeout)
                .pool_max_idle_per_host(config.max_workers * 3)
        };

        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(base_builder().timeout(config.timeout).build()?)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        let files = base_builder().build()?;
        let probe = base_builder()
            .timeout(config.timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            files,
            probe,
            config,
        })
    }

    fn check_session(requested: &Url, landed: &Url) -> AppResult<()> {
        if utils::is_login_url(landed) && !utils::is_login_url(requested) {
            debug!("请求 '{}' 被重定向到登录页 '{}'", requested, landed);
            return Err(AppError::SessionExpired);
        }
        Ok(())
    }

    fn content_type(headers: &header::HeaderMap) -> Option<String> {
        headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    async fn into_page(requested: &Url, res: reqwest::Response) -> AppResult<Page> {
        let status = res.status();
        let url = res.url().clone();
        Self::check_session(requested, &url)?;
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let content_type = Self::content_type(res.headers());
        let text = res.text().await?;
        trace!("页面 '{}' 返回 {} 字节", url, text.len());
        Ok(Page {
            status,
            url,
            content_type,
            text,
        })
    }

    pub async fn get_page(&self, url: &Url) -> AppResult<Page> {
        debug!("获取页面: {}", url);
        let res = self.client.get(url.clone()).send().await?;
        Self::into_page(url, res).await
    }

    pub async fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> AppResult<Page> {
        debug!("提交表单: {}", url);
        let res = self.files.post(url.clone()).form(form).timeout(self.config.timeout).send().await?;
        let status = res.status();
        let landed = res.url().clone();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url: landed.to_string(),
            });
        }
        let content_type = Self::content_type(res.headers());
        Ok(Page {
            status,
            url: landed,
            content_type,
            text: res.text().await?,
        })
    }

    pub async fn probe(&self, url: &Url) -> AppResult<Probe> {
        debug!("探测链接: {}", url);
        let res = self.probe.get(url.clone()).send().await?;
        let status = res.status();

        if status.is_redirection() {
            let location = res
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| AppError::HttpStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                })?;
            let target = url.join(location)?;
            Self::check_session(url, &target)?;
            debug!("链接 '{}' 重定向到 '{}'", url, target);
            return Ok(Probe::Redirect(target));
        }
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = Self::content_type(res.headers());
        let is_html = content_type.as_deref().is_none_or(|ct| ct.contains("html"));
        if is_html {
            return Ok(Probe::Html(Self::into_page(url, res).await?));
        }

        // 服务器直接返回了文件本身，只读取响应头，正文留给下载阶段
        let filename = res
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(utils::parse_content_disposition);
        Ok(Probe::File {
            url: url.clone(),
            filename,
            content_type,
            size: res.content_length(),
        })
    }

    /// 将链接内容流式写入 `writer`，返回写入的字节数。
    /// 每个数据块之间的等待不超过页面超时，整个下载不超过下载超时。
    pub async fn download<W: Write>(
        &self,
        url: &Url,
        writer: &mut W,
        cancellation_token: &AtomicBool,
    ) -> AppResult<u64> {
        let res = self
            .files
            .get(url.clone())
            .timeout(self.config.download_timeout)
            .send()
            .await?;
        Self::check_session(url, res.url())?;
        let status = res.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mut written = 0u64;
        let mut stream = res.bytes_stream();
        loop {
            if cancellation_token.load(Ordering::Relaxed) {
                return Err(AppError::UserInterrupt);
            }
            let next = tokio::time::timeout(self.config.timeout, stream.next())
                .await
                .map_err(|_| AppError::Timeout)?;
            let Some(chunk_result) = next else { break };
            let chunk = chunk_result?;
            writer.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        writer.flush()?;

        if written == 0 {
            return Err(AppError::EmptyResponse);
        }
        Ok(written)
    }
}
