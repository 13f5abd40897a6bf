// src/checker/embedded.rs

use super::CaptionChecker;
use crate::{
    browser::{AuditSession, BrowserDriver, ElementQuery, ElementSnapshot, find_in_frames, wait_for_element},
    config::{AppConfig, BrowserSettings},
    constants::{captions, selectors},
    models::{CaptionSignal, MediaKind},
    utils,
};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::time::Instant;

/// 模块条目指向的是 API 形式的文件页，去掉 `/api/v1` 得到可浏览的页面
pub fn normalize_canvas_url(url: &str) -> String {
    url.replace("/api/v1", "")
}

fn is_caption_toggle(el: &ElementSnapshot) -> bool {
    el.attr("aria-label")
        .map(|label| label.trim().to_lowercase())
        .is_some_and(|label| captions::TOGGLE_LABELS.contains(&label.as_str()))
}

const TOGGLE_QUERY: [ElementQuery; 1] = [ElementQuery {
    selector: selectors::CAPTION_TOGGLE,
    matches: is_caption_toggle,
}];

/// Canvas 内置播放器：只看播放器上的字幕开关按钮，没有 API 可查
pub struct EmbeddedPlayerChecker {
    browser: BrowserSettings,
}

impl EmbeddedPlayerChecker {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            browser: config.browser.clone(),
        }
    }

    /// 文件页上没有媒体预览区时返回 `None`：这是 PDF、文档等非视频文件。
    pub async fn audit(&self, url: &str, session: &mut AuditSession) -> Option<CaptionSignal> {
        let page = normalize_canvas_url(url);
        let Some(base) = utils::base_url(&page) else {
            debug!("无法解析 Canvas 链接: {}", page);
            return Some(CaptionSignal::Unknown);
        };
        let Some(driver) = session.driver_for(&base).await else {
            return Some(CaptionSignal::Unknown);
        };
        let driver = &mut **driver;

        if let Err(e) = driver.load(&page, self.browser.page_timeout).await {
            warn!("加载 Canvas 页面 {} 失败: {}", page, e);
            return Some(CaptionSignal::Unknown);
        }

        match wait_for_element(
            driver,
            selectors::MEDIA_PREVIEW,
            self.browser.element_timeout,
            self.browser.poll_interval,
        )
        .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!("{} 不是视频文件，跳过", page);
                return None;
            }
            Err(e) => {
                warn!("检测 Canvas 页面失败: {}", e);
                return Some(CaptionSignal::Unknown);
            }
        }
        Some(self.wait_for_toggle(driver, &page).await)
    }

    async fn wait_for_toggle(&self, driver: &mut dyn BrowserDriver, page: &str) -> CaptionSignal {
        // 播放器是异步挂载的，按间隔轮询直到超时
        let deadline = Instant::now() + self.browser.element_timeout;
        loop {
            match find_in_frames(driver, &TOGGLE_QUERY, self.browser.max_frame_depth).await {
                Ok(Some(_)) => return CaptionSignal::Present,
                Ok(None) => {}
                Err(e) => {
                    warn!("检测 Canvas 页面失败: {}", e);
                    return CaptionSignal::Unknown;
                }
            }
            if Instant::now() + self.browser.poll_interval > deadline {
                debug!("{} 中未出现字幕开关", page);
                return CaptionSignal::Absent;
            }
            tokio::time::sleep(self.browser.poll_interval).await;
        }
    }
}

#[async_trait]
impl CaptionChecker for EmbeddedPlayerChecker {
    fn kind(&self) -> MediaKind {
        MediaKind::EmbeddedPlayer
    }

    fn report_url(&self, url: &str) -> String {
        normalize_canvas_url(url)
    }

    async fn check(&mut self, url: &str, session: &mut AuditSession) -> Option<CaptionSignal> {
        self.audit(url, session).await
    }
}
