// src/models/mod.rs

pub mod api;

use crate::classifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 视频来源类型，由 URL 文本一次性决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    #[serde(rename = "youtube")]
    YouTube,
    #[serde(rename = "panopto")]
    Panopto,
    #[serde(rename = "canvas")]
    EmbeddedPlayer,
    #[serde(rename = "other")]
    Other,
}

impl MediaKind {
    /// 报告与缓存文件中使用的名称
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::YouTube => "youtube",
            MediaKind::Panopto => "panopto",
            MediaKind::EmbeddedPlayer => "canvas",
            MediaKind::Other => "other",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一个已分类的候选视频链接。构造后不可变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    kind: MediaKind,
    raw_url: String,
    course_id: Option<String>,
}

impl MediaReference {
    pub fn new(raw_url: impl Into<String>, course_id: Option<String>) -> Self {
        let raw_url = raw_url.into();
        Self {
            kind: classifier::classify(&raw_url),
            raw_url,
            course_id,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn raw_url(&self) -> &str {
        &self.raw_url
    }

    pub fn course_id(&self) -> Option<&str> {
        self.course_id.as_deref()
    }
}

/// 单个检查器的三值结论。只有引擎负责把 `Unknown` 折叠为 `false`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionSignal {
    Present,
    Absent,
    Unknown,
}

impl CaptionSignal {
    pub fn from_bool(found: bool) -> Self {
        if found { CaptionSignal::Present } else { CaptionSignal::Absent }
    }

    /// 保守默认：无法确定时视为没有字幕
    pub fn resolve(self) -> bool {
        matches!(self, CaptionSignal::Present)
    }
}

/// 一条审核记录，对应报告文件中的一个 JSON 对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionVerdict {
    #[serde(rename = "type")]
    pub source: MediaKind,
    pub url: String,
    pub has_captions: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
}

impl CaptionVerdict {
    pub fn new(reference: &MediaReference, url: impl Into<String>, has_captions: bool) -> Self {
        Self {
            source: reference.kind(),
            url: url.into(),
            has_captions,
            course_id: reference.course_id().map(str::to_string),
        }
    }
}

/// 单门课程的链接缓存：`sorted_modules_{course}.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseLinks {
    #[serde(default)]
    pub youtube: Vec<String>,
    #[serde(default)]
    pub canvas: Vec<String>,
    #[serde(default)]
    pub panopto: Vec<String>,
    #[serde(default)]
    pub other: Vec<String>,
}

impl CourseLinks {
    /// 按分类器的结果把链接分桶
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut links = CourseLinks::default();
        for url in urls {
            let url = url.into();
            links.bucket_mut(classifier::classify(&url)).push(url);
        }
        links
    }

    pub fn bucket(&self, kind: MediaKind) -> &[String] {
        match kind {
            MediaKind::YouTube => &self.youtube,
            MediaKind::Panopto => &self.panopto,
            MediaKind::EmbeddedPlayer => &self.canvas,
            MediaKind::Other => &self.other,
        }
    }

    fn bucket_mut(&mut self, kind: MediaKind) -> &mut Vec<String> {
        match kind {
            MediaKind::YouTube => &mut self.youtube,
            MediaKind::Panopto => &mut self.panopto,
            MediaKind::EmbeddedPlayer => &mut self.canvas,
            MediaKind::Other => &mut self.other,
        }
    }
}
