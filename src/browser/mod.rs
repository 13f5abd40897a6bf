// src/browser/mod.rs

//! 浏览器自动化能力。
//!
//! 检查器只通过 [`BrowserDriver`] 操作页面：加载 URL、在某个 frame 中按 CSS
//! 选择器取元素快照、列出可访问（同源）的子 frame。生产环境由 Chrome
//! DevTools 协议实现，测试中由基于 HTML 快照的实现替代。

pub mod chrome;
pub mod login;
pub mod session;
pub mod snapshot;

pub use chrome::ChromeLauncher;
pub use login::{AutoConfirm, ConsoleLoginGate, LoginGate, LoginOutcome};
pub use session::AuditSession;
pub use snapshot::{SnapshotDriver, SnapshotLauncher};

use crate::error::AppResult;
use async_trait::async_trait;
use log::{debug, trace};
use serde::Deserialize;
use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};
use tokio::time::Instant;

/// frame 的定位路径：从顶层文档开始，逐层记录 `iframe`/`frame` 元素的下标。
/// 空路径表示顶层文档。
pub type FramePath = Vec<usize>;

/// 页面元素的只读快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ElementSnapshot {
    pub tag: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub text: String,
}

impl ElementSnapshot {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// 加载页面并等待导航完成
    async fn load(&mut self, url: &str, timeout: Duration) -> AppResult<()>;

    /// 在指定 frame 中查询元素；frame 已不存在时返回空列表
    async fn find_elements(&mut self, frame: &[usize], selector: &str) -> AppResult<Vec<ElementSnapshot>>;

    /// 列出指定 frame 下可访问的子 frame，按文档顺序
    async fn child_frames(&mut self, frame: &[usize]) -> AppResult<Vec<FramePath>>;

    async fn quit(&mut self) {}
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> AppResult<Box<dyn BrowserDriver>>;
}

/// 一条元素查询：选择器负责粗筛，`matches` 负责精确判断
#[derive(Clone, Copy)]
pub struct ElementQuery {
    pub selector: &'static str,
    pub matches: fn(&ElementSnapshot) -> bool,
}

/// 在顶层文档中轮询等待选择器出现，超时返回 `false`
pub async fn wait_for_element(
    driver: &mut dyn BrowserDriver,
    selector: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> AppResult<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        if !driver.find_elements(&[], selector).await?.is_empty() {
            return Ok(true);
        }
        if Instant::now() + poll_interval > deadline {
            debug!("等待元素 '{}' 超时 ({:?})", selector, timeout);
            return Ok(false);
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// 按 frame 的发现顺序广度优先搜索，返回第一个满足任一查询的元素。
/// 深度超过 `max_depth` 的 frame 不再展开。子 frame 的查询失败只记录日志。
pub async fn find_in_frames(
    driver: &mut dyn BrowserDriver,
    queries: &[ElementQuery],
    max_depth: usize,
) -> AppResult<Option<ElementSnapshot>> {
    let mut queue: VecDeque<(FramePath, usize)> = VecDeque::from([(FramePath::new(), 0)]);

    while let Some((frame, depth)) = queue.pop_front() {
        match search_frame(driver, &frame, queries).await {
            Ok(Some(found)) => {
                debug!("在 frame {:?} 中找到匹配元素 <{}>", frame, found.tag);
                return Ok(Some(found));
            }
            Ok(None) => {}
            Err(e) if frame.is_empty() => return Err(e),
            Err(e) => {
                debug!("跳过无法访问的 frame {:?}: {}", frame, e);
                continue;
            }
        }

        if depth >= max_depth {
            trace!("frame {:?} 已达到最大深度 {}，不再展开", frame, max_depth);
            continue;
        }
        match driver.child_frames(&frame).await {
            Ok(children) => queue.extend(children.into_iter().map(|child| (child, depth + 1))),
            Err(e) => debug!("列出 frame {:?} 的子 frame 失败: {}", frame, e),
        }
    }
    Ok(None)
}

async fn search_frame(
    driver: &mut dyn BrowserDriver,
    frame: &[usize],
    queries: &[ElementQuery],
) -> AppResult<Option<ElementSnapshot>> {
    for query in queries {
        let elements = driver.find_elements(frame, query.selector).await?;
        if let Some(found) = elements.into_iter().find(|el| (query.matches)(el)) {
            return Ok(Some(found));
        }
    }
    Ok(None)
}
