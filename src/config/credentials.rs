// src/config/credentials.rs

use crate::{
    config::ExternalConfig,
    constants,
    error::{AppError, AppResult},
};
use anyhow::{Context, anyhow};
use log::{debug, info};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub(super) fn get_config_path() -> AppResult<PathBuf> {
    let path = dirs::home_dir()
        .ok_or_else(|| AppError::Other(anyhow!("无法获取用户主目录")))?
        .join(constants::CONFIG_DIR_NAME)
        .join(constants::CONFIG_FILE_NAME);
    Ok(path)
}

/// 读取配置文件；使用默认路径且文件不存在时，写出一份默认配置。
/// 通过 `--config` 显式指定的文件必须存在。
pub(crate) fn load_or_create_external_config(explicit: Option<&Path>) -> AppResult<ExternalConfig> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(AppError::Config(format!("配置文件 '{}' 不存在", path.display())));
        }
        return read_config(path);
    }

    let config_path = get_config_path()?;
    if config_path.is_file() {
        read_config(&config_path)
    } else {
        info!("配置文件 {:?} 不存在，将创建默认配置。", config_path);
        let config = ExternalConfig::default_app_config();

        if let Some(dir) = config_path.parent() {
            fs::create_dir_all(dir)?;
        }

        let json_content = serde_json::to_string_pretty(&config)?;
        fs::write(&config_path, json_content)?;

        Ok(config)
    }
}

fn read_config(path: &Path) -> AppResult<ExternalConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("读取配置文件 '{}' 失败", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("解析配置文件 '{}' 失败", path.display()))
        .map_err(AppError::from)
}

/// 按 命令行参数 → 环境变量 → 配置文件 的顺序解析一个凭据。
/// 返回值的第二项是来源描述，仅用于日志。
pub fn resolve_secret(
    cli_value: Option<&str>,
    env_key: &str,
    file_value: Option<&str>,
) -> (Option<String>, String) {
    if let Some(value) = cli_value && !value.is_empty() {
        debug!("使用来自命令行参数的 {}", env_key);
        return (Some(value.to_string()), "命令行参数".to_string());
    }
    if let Ok(value) = std::env::var(env_key) && !value.is_empty() {
        debug!("使用来自环境变量 {} 的凭据", env_key);
        return (Some(value), format!("环境变量 ({})", env_key));
    }
    if let Some(value) = file_value && !value.is_empty() {
        debug!("使用来自本地配置文件的 {}", env_key);
        return (Some(value.to_string()), "本地配置文件".to_string());
    }
    debug!("未在任何位置找到 {}", env_key);
    (None, "未找到".to_string())
}
