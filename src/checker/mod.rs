// src/checker/mod.rs

pub mod embedded;
pub mod panopto;
pub mod token;
pub mod youtube;

pub use embedded::EmbeddedPlayerChecker;
pub use panopto::PanoptoChecker;
pub use youtube::{TranscriptSource, WatchPageTranscripts, YoutubeChecker};

use crate::{
    browser::AuditSession,
    models::{CaptionSignal, MediaKind},
};
use async_trait::async_trait;

/// 某一类视频来源的字幕判定策略。每个实现自带回退顺序，只返回三值结论。
///
/// 返回 `None` 表示链接指向的不是视频，不产生任何记录。
#[async_trait]
pub trait CaptionChecker: Send {
    fn kind(&self) -> MediaKind;

    /// 写入报告的 URL。默认原样返回，需要归一化的来源会改写。
    fn report_url(&self, url: &str) -> String {
        url.to_string()
    }

    async fn check(&mut self, url: &str, session: &mut AuditSession) -> Option<CaptionSignal>;
}
