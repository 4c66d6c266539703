// src/session.rs

use crate::{
    client::RobustClient,
    config::credentials::Credentials,
    constants::moodle,
    error::*,
    utils,
};
use log::{debug, info, warn};
use scraper::{Html, Selector};
use std::sync::{Arc, LazyLock};
use url::Url;

static INPUT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input[name]").unwrap());

/// 已认证的会话。Cookie 保存在 `RobustClient` 的共享容器中，
/// 这里只保留重新登录所需的信息。
#[derive(Clone)]
pub struct Session {
    client: Arc<RobustClient>,
    base_url: Url,
    credentials: Credentials,
}

impl Session {
    pub async fn authenticate(
        client: Arc<RobustClient>,
        base_url: &str,
        credentials: Credentials,
    ) -> AppResult<Self> {
        let session = Self {
            client,
            base_url: normalize_base_url(base_url)?,
            credentials,
        };
        session.login().await?;
        Ok(session)
    }

    pub async fn reauthenticate(&self) -> AppResult<()> {
        warn!("会话已过期，正在重新登录...");
        self.login().await
    }

    async fn login(&self) -> AppResult<()> {
        let login_url = self.url(moodle::LOGIN_PATH)?;
        let login_page = self
            .client
            .get_page(&login_url)
            .await
            .map_err(|e| AppError::Auth(format!("无法打开登录页: {}", e)))?;

        let (token_name, token) = find_login_token(&login_page.text)
            .unwrap_or_else(|| (moodle::LOGIN_TOKEN_FIELDS[0].to_string(), String::new()));
        debug!("登录表单令牌字段: '{}' (为空: {})", token_name, token.is_empty());

        let form = [
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.as_str()),
            (token_name.as_str(), token.as_str()),
            ("anchor", ""),
        ];
        let response = self
            .client
            .post_form(&login_url, &form)
            .await
            .map_err(|e| AppError::Auth(format!("提交登录表单失败: {}", e)))?;

        if login_rejected(&response.url, &response.text) {
            return Err(AppError::Auth("用户名或密码错误".to_string()));
        }
        info!("用户 '{}' 登录成功", self.credentials.username);
        Ok(())
    }

    /// 将站内路径拼接到站点地址上，保留站点自身的子路径（如 `/moodle/`）。
    pub fn url(&self, path: &str) -> AppResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn client(&self) -> &RobustClient {
        &self.client
    }
}

fn normalize_base_url(base_url: &str) -> AppResult<Url> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let mut url = Url::parse(&format!("{}/", trimmed))?;
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// 不同版本的 Moodle 使用不同的防伪字段名，按优先级查找。
fn find_login_token(html: &str) -> Option<(String, String)> {
    let document = Html::parse_document(html);
    moodle::LOGIN_TOKEN_FIELDS.iter().find_map(|field| {
        document
            .select(&INPUT_SELECTOR)
            .find(|input| input.value().attr("name") == Some(field))
            .map(|input| {
                (
                    field.to_string(),
                    input.value().attr("value").unwrap_or_default().to_string(),
                )
            })
    })
}

fn login_rejected(landed: &Url, body: &str) -> bool {
    utils::is_login_url(landed)
        || moodle::LOGIN_FAILURE_MARKERS
            .iter()
            .any(|marker| body.contains(marker))
}
