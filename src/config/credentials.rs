// src/config/credentials.rs

use crate::{
    constants,
    error::{AppError, AppResult},
    ui,
};
use log::debug;
use std::fmt;

/// 只在内存中保存，从不写入磁盘。
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

fn resolve_field(cli_value: Option<&str>, env_key: &str) -> Option<(String, String)> {
    if let Some(value) = cli_value && !value.is_empty() {
        return Some((value.to_string(), "命令行参数".to_string()));
    }
    if let Ok(value) = std::env::var(env_key) && !value.is_empty() {
        return Some((value, format!("环境变量 ({})", env_key)));
    }
    None
}

/// 依次从命令行、环境变量获取用户名和密码，都没有时交互式询问。
pub fn resolve_credentials(
    cli_username: Option<&str>,
    cli_password: Option<&str>,
    interactive: bool,
) -> AppResult<Credentials> {
    let username = match resolve_field(cli_username, constants::ENV_USERNAME) {
        Some((value, source)) => {
            debug!("使用来自{}的用户名", source);
            value
        }
        None if interactive => ui::prompt("Moodle 用户名", None)?,
        None => String::new(),
    };
    if username.is_empty() {
        return Err(AppError::UserInputError(format!(
            "未提供用户名 (使用 --username 或环境变量 {})",
            constants::ENV_USERNAME
        )));
    }

    let password = match resolve_field(cli_password, constants::ENV_PASSWORD) {
        Some((value, source)) => {
            debug!("使用来自{}的密码", source);
            value
        }
        None if interactive => ui::prompt_hidden("Moodle 密码 (输入不可见)")?,
        None => String::new(),
    };
    if password.is_empty() {
        return Err(AppError::UserInputError(format!(
            "未提供密码 (使用 --password 或环境变量 {})",
            constants::ENV_PASSWORD
        )));
    }

    Ok(Credentials { username, password })
}
