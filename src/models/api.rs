// src/models/api.rs

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// --- Canvas API 响应结构体 ---

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CanvasCourse {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

impl CanvasCourse {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| format!("Course {}", self.id))
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct CanvasModule {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub items_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CanvasModuleItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub item_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
}

impl CanvasModuleItem {
    /// 一个条目可能同时带有 `url` 与 `external_url`，两者都收集
    pub fn links(&self) -> impl Iterator<Item = &str> {
        self.url.as_deref().into_iter().chain(self.external_url.as_deref())
    }
}

// --- Panopto OAuth 响应结构体 ---

#[derive(Deserialize, Debug, Clone)]
pub struct PanoptoTokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub expires_in: Option<u64>,
}

/// 有的服务端把 `expires_in` 写成浮点数或字符串；负数按 0 处理，无法识别时视为缺失
fn lenient_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let seconds = match value {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().map(saturating_secs)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(saturating_secs),
        _ => None,
    };
    Ok(seconds)
}

// `as` 转换本身是饱和的：负数与 NaN 得到 0
fn saturating_secs(value: f64) -> u64 {
    value as u64
}
