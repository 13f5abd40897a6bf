// src/checker/panopto.rs

use super::{CaptionChecker, token::TokenCache};
use crate::{
    browser::{AuditSession, ElementQuery, ElementSnapshot, find_in_frames, wait_for_element},
    client::RobustClient,
    config::{AppConfig, BrowserSettings, ClientCredentials},
    constants::{self, captions, panopto, selectors},
    error::AppResult,
    models::{CaptionSignal, MediaKind, api::PanoptoTokenResponse},
    utils,
};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde_json::Value;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use url::Url;

/// `Embed.aspx` 改写为 `Viewer.aspx`，便于在完整播放器中检测。
/// 带 `access_token` 的嵌入链接保持原样，改写会丢失授权。
pub fn normalize_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if !parsed.path().contains(panopto::EMBED_PAGE) {
        return url.to_string();
    }
    let has_token = [parsed.fragment(), parsed.query()]
        .into_iter()
        .flatten()
        .any(|part| part.contains(panopto::ACCESS_TOKEN_MARKER));
    if has_token {
        return url.to_string();
    }
    let path = parsed.path().replace(panopto::EMBED_PAGE, panopto::VIEWER_PAGE);
    parsed.set_path(&path);
    parsed.to_string()
}

/// 会话 ID：优先取 `id` 查询参数，否则从后往前找形如 GUID 的路径段
pub fn extract_session_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if let Some((_, id)) = parsed.query_pairs().find(|(k, v)| k == "id" && !v.is_empty()) {
        return Some(id.into_owned());
    }
    parsed
        .path_segments()?
        .rev()
        .find(|segment| utils::looks_like_session_id(segment))
        .map(str::to_string)
}

/// 递归判断 JSON 中是否存在任何非空白字符串
pub fn has_caption_text(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => items.iter().any(has_caption_text),
        Value::Object(map) => map.values().any(has_caption_text),
        _ => false,
    }
}

fn is_caption_track(el: &ElementSnapshot) -> bool {
    let kind = el.attr("kind").unwrap_or_default().to_lowercase();
    let has_src = el.attr("src").is_some_and(|src| !src.trim().is_empty());
    captions::TRACK_KINDS.contains(&kind.as_str()) && has_src
}

fn is_caption_control(el: &ElementSnapshot) -> bool {
    ["aria-label", "title", "class", "id"]
        .into_iter()
        .filter_map(|name| el.attr(name))
        .chain(std::iter::once(el.text.as_str()))
        .any(mentions_captions)
}

fn mentions_captions(text: &str) -> bool {
    let lower = text.to_lowercase();
    captions::KEYWORDS.iter().any(|k| lower.contains(k))
        || utils::lowercase_tokens(&lower).any(|token| token == captions::STANDALONE_TOKEN)
}

/// 每个 frame 中依次尝试：字幕轨道，然后是提到字幕的可交互控件
pub const CAPTION_QUERIES: [ElementQuery; 2] = [
    ElementQuery {
        selector: selectors::TRACK,
        matches: is_caption_track,
    },
    ElementQuery {
        selector: selectors::INTERACTIVE,
        matches: is_caption_control,
    },
];

pub struct PanoptoChecker {
    http: RobustClient,
    credentials: Option<ClientCredentials>,
    api_prefix: String,
    browser: BrowserSettings,
    tokens: TokenCache,
}

impl PanoptoChecker {
    pub fn new(config: Arc<AppConfig>) -> AppResult<Self> {
        Ok(Self {
            credentials: config.panopto_credentials.clone(),
            api_prefix: config.panopto_api_prefix.trim_end_matches('/').to_string(),
            browser: config.browser.clone(),
            tokens: TokenCache::new(Duration::from_secs(constants::TOKEN_EXPIRY_MARGIN_SECS)),
            http: RobustClient::single_shot(config)?,
        })
    }

    /// 页面检测优先；页面给出肯定结论时不再调用 API
    pub async fn audit(&mut self, url: &str, session: &mut AuditSession) -> CaptionSignal {
        let normalized = normalize_url(url);
        let base = utils::base_url(&normalized);
        let session_id = extract_session_id(&normalized);
        debug!("Panopto 审核 {} (base={:?}, session={:?})", normalized, base, session_id);

        let ui = match base.as_deref() {
            Some(base) => self.inspect_ui(base, &normalized, session).await,
            None => CaptionSignal::Unknown,
        };

        match ui {
            CaptionSignal::Present => CaptionSignal::Present,
            CaptionSignal::Absent => {
                let api = self.check_via_api(base.as_deref(), session_id.as_deref()).await;
                CaptionSignal::from_bool(api == CaptionSignal::Present)
            }
            CaptionSignal::Unknown => self.check_via_api(base.as_deref(), session_id.as_deref()).await,
        }
    }

    /// 通过 REST API 查询会话字幕。缺少会话 ID 或凭据时不发出任何请求。
    pub async fn check_via_api(&mut self, base: Option<&str>, session_id: Option<&str>) -> CaptionSignal {
        let (Some(base), Some(session_id)) = (base, session_id) else {
            debug!("缺少认证域或会话 ID，跳过 Panopto API");
            return CaptionSignal::Unknown;
        };
        if self.credentials.is_none() {
            debug!("未配置 Panopto 凭据，跳过 API 检查");
            return CaptionSignal::Unknown;
        }
        let Some(token) = self.access_token(base).await else {
            return CaptionSignal::Unknown;
        };

        let url = format!("{}{}/api/v1/sessions/{}/captions", base, self.api_prefix, session_id);
        let res = match self.http.client.get(&url).bearer_auth(&token).send().await {
            Ok(res) => res,
            Err(e) => {
                warn!("请求 Panopto API 失败 ({}): {}", session_id, e);
                return CaptionSignal::Unknown;
            }
        };

        match res.status() {
            StatusCode::OK => match res.text().await {
                Ok(body) => {
                    let payload = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
                    CaptionSignal::from_bool(has_caption_text(&payload))
                }
                Err(e) => {
                    warn!("读取 Panopto API 响应失败 ({}): {}", session_id, e);
                    CaptionSignal::Unknown
                }
            },
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => CaptionSignal::Absent,
            StatusCode::UNAUTHORIZED => {
                warn!("Panopto API 拒绝了 {} 的 Token，已清除缓存", base);
                self.tokens.invalidate(base);
                CaptionSignal::Unknown
            }
            status => {
                warn!("Panopto API 对会话 {} 返回 {}", session_id, status);
                CaptionSignal::Unknown
            }
        }
    }

    /// 取得 `base` 的 Bearer Token，必要时走 client credentials 换取
    async fn access_token(&mut self, base: &str) -> Option<String> {
        if let Some(token) = self.tokens.get(base, Instant::now()) {
            return Some(token.to_string());
        }
        let creds = self.credentials.as_ref()?;

        let token_url = format!("{}{}/oauth2/connect/token", base, self.api_prefix);
        info!("向 {} 申请 Panopto Token", token_url);
        let res = self
            .http
            .client
            .post(&token_url)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[("grant_type", "client_credentials"), ("scope", "api")])
            .send()
            .await;
        let res = match res {
            Ok(res) => res,
            Err(e) => {
                warn!("申请 Panopto Token 失败: {}", e);
                return None;
            }
        };
        if res.status() != StatusCode::OK {
            warn!("Panopto Token 请求返回 {}", res.status());
            return None;
        }
        let body = res.text().await.ok()?;
        let payload: PanoptoTokenResponse = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Panopto Token 响应不是有效的 JSON: {}", e);
                return None;
            }
        };
        let value = payload.access_token.filter(|t| !t.is_empty())?;

        let expires_in = Duration::from_secs(payload.expires_in.unwrap_or(0));
        self.tokens.insert(base, value.clone(), expires_in, Instant::now());
        Some(value)
    }

    /// 在浏览器中打开播放器，搜索顶层文档与同源 frame 中的字幕痕迹
    async fn inspect_ui(&self, base: &str, url: &str, session: &mut AuditSession) -> CaptionSignal {
        let Some(driver) = session.driver_for(base).await else {
            return CaptionSignal::Unknown;
        };
        let driver = &mut **driver;

        if let Err(e) = driver.load(url, self.browser.page_timeout).await {
            warn!("加载 Panopto 页面 {} 失败: {}", url, e);
            return CaptionSignal::Unknown;
        }
        match wait_for_element(driver, selectors::BODY, self.browser.page_timeout, self.browser.poll_interval).await {
            Ok(true) => {}
            Ok(false) => return CaptionSignal::Unknown,
            Err(e) => {
                debug!("等待页面主体失败: {}", e);
                return CaptionSignal::Unknown;
            }
        }

        match find_in_frames(driver, &CAPTION_QUERIES, self.browser.max_frame_depth).await {
            Ok(Some(found)) => {
                debug!("页面中发现字幕痕迹 <{}> {:?}", found.tag, found.attributes);
                CaptionSignal::Present
            }
            Ok(None) => CaptionSignal::Absent,
            Err(e) => {
                warn!("检测 Panopto 页面失败: {}", e);
                CaptionSignal::Unknown
            }
        }
    }
}

#[async_trait]
impl CaptionChecker for PanoptoChecker {
    fn kind(&self) -> MediaKind {
        MediaKind::Panopto
    }

    fn report_url(&self, url: &str) -> String {
        normalize_url(url)
    }

    async fn check(&mut self, url: &str, session: &mut AuditSession) -> Option<CaptionSignal> {
        Some(self.audit(url, session).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn element(tag: &str, attrs: &[(&str, &str)], text: &str) -> ElementSnapshot {
        ElementSnapshot {
            tag: tag.to_string(),
            attributes: attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<HashMap<_, _>>(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_embed_is_rewritten_to_viewer() {
        assert_eq!(
            normalize_url("https://u.hosted.panopto.com/Panopto/Pages/Embed.aspx?id=abc&autoplay=false"),
            "https://u.hosted.panopto.com/Panopto/Pages/Viewer.aspx?id=abc&autoplay=false"
        );
    }

    #[test]
    fn test_embed_with_access_token_is_unchanged() {
        let with_fragment = "https://u.hosted.panopto.com/Panopto/Pages/Embed.aspx?id=abc#access_token=xyz";
        assert_eq!(normalize_url(with_fragment), with_fragment);
        let with_query = "https://u.hosted.panopto.com/Panopto/Pages/Embed.aspx?id=abc&access_token=xyz";
        assert_eq!(normalize_url(with_query), with_query);
    }

    #[test]
    fn test_other_urls_are_unchanged() {
        let viewer = "https://u.hosted.panopto.com/Panopto/Pages/Viewer.aspx?id=abc";
        assert_eq!(normalize_url(viewer), viewer);
        assert_eq!(normalize_url("not a url Embed.aspx"), "not a url Embed.aspx");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_url("https://u.hosted.panopto.com/Panopto/Pages/Embed.aspx?id=abc");
        assert_eq!(normalize_url(&once), once);
    }

    #[test]
    fn test_session_id_from_query() {
        assert_eq!(
            extract_session_id("https://u.hosted.panopto.com/Panopto/Pages/Viewer.aspx?id=1234"),
            Some("1234".to_string())
        );
    }

    #[test]
    fn test_session_id_from_path_segment() {
        let guid = "0a1b2c3d-4e5f-6a7b-8c9d-0e1f2a3b4c5d";
        assert_eq!(
            extract_session_id(&format!("https://u.hosted.panopto.com/Panopto/Podcast/Social/{}/video.mp4", guid)),
            Some(guid.to_string())
        );
        // 空的 id 参数会回退到路径
        assert_eq!(
            extract_session_id(&format!("https://u.hosted.panopto.com/s/{}?id=", guid)),
            Some(guid.to_string())
        );
    }

    #[test]
    fn test_session_id_absent() {
        assert_eq!(extract_session_id("https://u.hosted.panopto.com/Panopto/Pages/Viewer.aspx"), None);
        assert_eq!(extract_session_id("garbage"), None);
    }

    #[test]
    fn test_has_caption_text() {
        assert!(has_caption_text(&json!({"captions": ["en"]})));
        assert!(has_caption_text(&json!([{"Results": [{"Caption": " hello "}]}])));
        assert!(has_caption_text(&json!("WEBVTT\n\n00:00.000 --> 00:01.000\nhi")));
        assert!(!has_caption_text(&json!({"captions": []})));
        assert!(!has_caption_text(&json!({"captions": ["  "], "count": 0, "ok": true, "n": null})));
        assert!(!has_caption_text(&json!("   ")));
    }

    #[test]
    fn test_caption_track_requires_kind_and_src() {
        assert!(is_caption_track(&element("track", &[("kind", "Captions"), ("src", "/c.vtt")], "")));
        assert!(is_caption_track(&element("track", &[("kind", "subtitles"), ("src", "/s.vtt")], "")));
        assert!(!is_caption_track(&element("track", &[("kind", "captions"), ("src", " ")], "")));
        assert!(!is_caption_track(&element("track", &[("kind", "chapters"), ("src", "/c.vtt")], "")));
    }

    #[test]
    fn test_caption_control_matching() {
        assert!(is_caption_control(&element("button", &[("aria-label", "Show Captions")], "")));
        assert!(is_caption_control(&element("div", &[("role", "button"), ("class", "subtitle-toggle")], "")));
        assert!(is_caption_control(&element("button", &[("title", "CC")], "")));
        assert!(is_caption_control(&element("span", &[("tabindex", "0")], "Toggle cc")));
        // "cc" 必须是独立的词
        assert!(!is_caption_control(&element("a", &[("class", "accent success")], "Accessibility")));
        assert!(!is_caption_control(&element("button", &[("aria-label", "Play")], "Play")));
    }
}
