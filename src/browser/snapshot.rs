// src/browser/snapshot.rs

//! 基于已渲染 DOM 快照的浏览器替身。
//!
//! 页面以 `URL → HTML` 的形式预先登记；`iframe`/`frame` 的 `src` 相对于所在页面解析，
//! 只有同源且已登记的页面才会被当作可进入的子 frame。

use super::{BrowserDriver, BrowserLauncher, ElementSnapshot, FramePath};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use log::debug;
use scraper::{ElementRef, Html, Selector};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use url::Url;

const FRAME_SELECTOR: &str = "iframe, frame";

#[derive(Debug, Clone, Default)]
pub struct SnapshotDriver {
    pages: Arc<HashMap<String, String>>,
    current: Option<String>,
    loads: Arc<AtomicUsize>,
}

impl SnapshotDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        Arc::make_mut(&mut self.pages).insert(url.to_string(), html.to_string());
        self
    }

    /// 成功加载的页面次数
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// 沿 frame 路径找到目标文档的 URL；任一层不可达时返回 `None`
    fn resolve_frame(&self, frame: &[usize]) -> AppResult<Option<String>> {
        let top = self
            .current
            .clone()
            .ok_or_else(|| AppError::Browser("尚未加载任何页面".to_string()))?;
        let mut url = top.clone();
        for &index in frame {
            let frames = self.accessible_frames(&top, &url)?;
            match frames.into_iter().find(|(i, _)| *i == index) {
                Some((_, child)) => url = child,
                None => return Ok(None),
            }
        }
        Ok(Some(url))
    }

    /// 返回 `(下标, URL)`：下标是该 frame 元素在文档中的序号
    fn accessible_frames(&self, top: &str, url: &str) -> AppResult<Vec<(usize, String)>> {
        let Some(html) = self.pages.get(url) else {
            return Ok(Vec::new());
        };
        let base = Url::parse(url)?;
        let top_origin = Url::parse(top)?.origin();
        let selector = parse_selector(FRAME_SELECTOR)?;
        let document = Html::parse_document(html);

        let frames = document
            .select(&selector)
            .enumerate()
            .filter_map(|(i, el)| {
                let src = el.value().attr("src")?;
                let resolved = base.join(src).ok()?;
                if resolved.origin() != top_origin {
                    debug!("跳过跨域 frame: {}", resolved);
                    return None;
                }
                let key = resolved.to_string();
                self.pages.contains_key(&key).then_some((i, key))
            })
            .collect();
        Ok(frames)
    }
}

#[async_trait]
impl BrowserDriver for SnapshotDriver {
    async fn load(&mut self, url: &str, _timeout: Duration) -> AppResult<()> {
        if !self.pages.contains_key(url) {
            return Err(AppError::Browser(format!("页面加载失败: {}", url)));
        }
        self.current = Some(url.to_string());
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_elements(&mut self, frame: &[usize], selector: &str) -> AppResult<Vec<ElementSnapshot>> {
        let Some(url) = self.resolve_frame(frame)? else {
            return Ok(Vec::new());
        };
        let Some(html) = self.pages.get(&url) else {
            return Ok(Vec::new());
        };
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(html);
        Ok(document.select(&selector).map(snapshot_of).collect())
    }

    async fn child_frames(&mut self, frame: &[usize]) -> AppResult<Vec<FramePath>> {
        let Some(url) = self.resolve_frame(frame)? else {
            return Ok(Vec::new());
        };
        let top = self.current.clone().unwrap_or_default();
        Ok(self
            .accessible_frames(&top, &url)?
            .into_iter()
            .map(|(i, _)| {
                let mut path = frame.to_vec();
                path.push(i);
                path
            })
            .collect())
    }

    async fn quit(&mut self) {
        self.current = None;
    }
}

fn parse_selector(selector: &str) -> AppResult<Selector> {
    Selector::parse(selector).map_err(|e| AppError::Browser(format!("无效的选择器 '{}': {:?}", selector, e)))
}

fn snapshot_of(el: ElementRef<'_>) -> ElementSnapshot {
    let text = el.text().collect::<Vec<_>>().join(" ");
    ElementSnapshot {
        tag: el.value().name().to_lowercase(),
        attributes: el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        text: text.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

/// 每次启动都交出同一组页面的新驱动，并记录启动次数
#[derive(Debug, Clone, Default)]
pub struct SnapshotLauncher {
    template: SnapshotDriver,
    launches: Arc<AtomicUsize>,
}

impl SnapshotLauncher {
    pub fn new(template: SnapshotDriver) -> Self {
        Self {
            template,
            launches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// 所有驱动共享的页面加载计数
    pub fn load_count(&self) -> usize {
        self.template.load_count()
    }
}

#[async_trait]
impl BrowserLauncher for SnapshotLauncher {
    async fn launch(&self) -> AppResult<Box<dyn BrowserDriver>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let mut driver = self.template.clone();
        driver.current = None;
        Ok(Box::new(driver))
    }
}
