// src/checker/youtube.rs

use super::CaptionChecker;
use crate::{
    browser::AuditSession,
    client::RobustClient,
    config::AppConfig,
    constants,
    error::{AppError, AppResult},
    models::{CaptionSignal, MediaKind},
};
use async_trait::async_trait;
use log::{debug, trace};
use regex::Regex;
use reqwest::header::ACCEPT_LANGUAGE;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use url::Url;

static TEXT_NODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<text[^>]*>(.*?)</text>").unwrap());

/// 只处理两种已知前缀：`watch?v=` 与 `youtu.be/`。视频 ID 之后的参数（`&t=`、`?si=`）被截掉。
pub fn video_id(url: &str) -> String {
    let trimmed = url.trim();
    let rest = trimmed
        .strip_prefix(constants::youtube::WATCH_PREFIX)
        .or_else(|| trimmed.strip_prefix(constants::youtube::SHORT_PREFIX))
        .unwrap_or(trimmed);
    rest.split(['&', '?', '#']).next().unwrap_or_default().to_string()
}

/// 课程中的 YouTube 链接只有指向单个视频时才审核（频道、播放列表跳过）
pub fn is_video_url(url: &str) -> bool {
    url.contains("youtube.com/watch?v=") || url.contains("youtu.be/")
}

/// 获取视频字幕文本的外部能力
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch_transcript(&self, video_id: &str) -> AppResult<Vec<String>>;
}

#[derive(Deserialize, Debug, Clone)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode", default)]
    language_code: Option<String>,
}

/// 从观看页内嵌的播放器数据中读取 `captionTracks`，再下载第一条字幕轨道
pub struct WatchPageTranscripts {
    http: RobustClient,
    watch_base: String,
}

impl WatchPageTranscripts {
    pub fn new(config: Arc<AppConfig>) -> AppResult<Self> {
        let watch_base = config.youtube_watch_base.trim_end_matches('/').to_string();
        Ok(Self {
            http: RobustClient::single_shot(config)?,
            watch_base,
        })
    }

    async fn get_text(&self, url: &str) -> AppResult<String> {
        let res = self
            .http
            .client
            .get(url)
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.8")
            .send()
            .await?;
        Ok(res.error_for_status()?.text().await?)
    }
}

#[async_trait]
impl TranscriptSource for WatchPageTranscripts {
    async fn fetch_transcript(&self, video_id: &str) -> AppResult<Vec<String>> {
        let watch_url = format!("{}/watch?v={}", self.watch_base, video_id);
        let page = self.get_text(&watch_url).await?;

        let tracks = caption_tracks(&page)
            .ok_or_else(|| AppError::TranscriptUnavailable(format!("视频 {} 没有字幕轨道", video_id)))?;
        let track = tracks
            .first()
            .ok_or_else(|| AppError::TranscriptUnavailable(format!("视频 {} 的字幕轨道列表为空", video_id)))?;
        trace!("视频 {} 使用字幕轨道 {:?}", video_id, track.language_code);

        let track_url = Url::parse(&self.watch_base)?.join(&track.base_url)?;
        let body = self.get_text(track_url.as_str()).await?;
        Ok(transcript_lines(&body))
    }
}

/// 从页面源码中截取 `"captionTracks": [...]` 数组
fn caption_tracks(page: &str) -> Option<Vec<CaptionTrack>> {
    const KEY: &str = "\"captionTracks\":";
    let start = page.find(KEY)? + KEY.len();
    let array = balanced_json_array(&page[start..])?;
    serde_json::from_str(array).ok()
}

/// 返回以 `[` 开头、括号配平的最短前缀，忽略字符串里的括号
fn balanced_json_array(text: &str) -> Option<&str> {
    let text = text.trim_start();
    if !text.starts_with('[') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// 解析字幕文档（timedtext XML 或 json3），返回非空的文本行
fn transcript_lines(body: &str) -> Vec<String> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') {
        return json3_lines(trimmed);
    }
    TEXT_NODE_RE
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str()).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn json3_lines(body: &str) -> Vec<String> {
    #[derive(Deserialize)]
    struct Segment {
        #[serde(default)]
        utf8: String,
    }
    #[derive(Deserialize)]
    struct Event {
        #[serde(default)]
        segs: Vec<Segment>,
    }
    #[derive(Deserialize)]
    struct Json3 {
        #[serde(default)]
        events: Vec<Event>,
    }

    serde_json::from_str::<Json3>(body)
        .map(|doc| {
            doc.events
                .into_iter()
                .map(|e| e.segs.into_iter().map(|s| s.utf8).collect::<String>().trim().to_string())
                .filter(|line| !line.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

pub struct YoutubeChecker<T: TranscriptSource> {
    source: T,
}

impl<T: TranscriptSource> YoutubeChecker<T> {
    pub fn new(source: T) -> Self {
        Self { source }
    }

    /// 单次尝试，不重试；任何失败都视为没有字幕
    pub async fn audit(&self, url: &str) -> CaptionSignal {
        let id = video_id(url);
        if id.is_empty() {
            debug!("无法从 {} 中提取视频 ID", url);
            return CaptionSignal::Absent;
        }
        match self.source.fetch_transcript(&id).await {
            Ok(lines) => CaptionSignal::from_bool(lines.iter().any(|l| !l.trim().is_empty())),
            Err(e) => {
                debug!("视频 {} 获取字幕失败: {}", id, e);
                CaptionSignal::Absent
            }
        }
    }
}

#[async_trait]
impl<T: TranscriptSource> CaptionChecker for YoutubeChecker<T> {
    fn kind(&self) -> MediaKind {
        MediaKind::YouTube
    }

    async fn check(&mut self, url: &str, _session: &mut AuditSession) -> Option<CaptionSignal> {
        Some(self.audit(url).await)
    }
}
