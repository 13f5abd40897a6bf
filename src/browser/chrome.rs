// src/browser/chrome.rs

use super::{BrowserDriver, BrowserLauncher, ElementSnapshot, FramePath};
use crate::{
    config::BrowserSettings,
    error::{AppError, AppResult},
};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use log::{debug, info};
use std::{sync::Arc, time::Duration};

/// 进入 frame 路径所指文档的前置脚本；跨域 frame 的 `contentDocument` 为 null
const RESOLVE_FRAME_JS: &str = r#"
  let doc = document;
  for (const i of __PATH__) {
    const frame = doc.querySelectorAll('iframe, frame')[i];
    let inner = null;
    try { inner = frame ? frame.contentDocument : null; } catch (e) { inner = null; }
    if (!inner) return JSON.stringify(null);
    doc = inner;
  }
"#;

const FIND_ELEMENTS_JS: &str = r#"(() => {
  __RESOLVE__
  const found = Array.from(doc.querySelectorAll(__SELECTOR__));
  return JSON.stringify(found.map(el => ({
    tag: el.tagName.toLowerCase(),
    attributes: Object.fromEntries(Array.from(el.attributes).map(a => [a.name, a.value])),
    text: (el.innerText || el.textContent || '').replace(/\s+/g, ' ').trim().slice(0, 200)
  })));
})()"#;

const CHILD_FRAMES_JS: &str = r#"(() => {
  __RESOLVE__
  const out = [];
  doc.querySelectorAll('iframe, frame').forEach((frame, i) => {
    try { if (frame.contentDocument) out.push(i); } catch (e) {}
  });
  return JSON.stringify(out);
})()"#;

pub struct ChromeLauncher {
    settings: BrowserSettings,
}

impl ChromeLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn launch_options(&self) -> AppResult<LaunchOptions<'static>> {
        // 等待登录期间浏览器是空闲的，空闲超时必须覆盖登录等待时间
        let idle_timeout = self.settings.login_timeout + self.settings.page_timeout * 4;
        LaunchOptions::default_builder()
            .headless(self.settings.headless)
            .sandbox(false)
            .window_size(Some((1280, 900)))
            .idle_browser_timeout(idle_timeout)
            .path(self.settings.chrome_path.clone())
            .user_data_dir(self.settings.user_data_dir.clone())
            .build()
            .map_err(|e| AppError::Browser(format!("构建浏览器启动参数失败: {}", e)))
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> AppResult<Box<dyn BrowserDriver>> {
        let options = self.launch_options()?;
        info!("启动 Chrome (headless = {})", self.settings.headless);
        let driver = tokio::task::spawn_blocking(move || -> AppResult<ChromeDriver> {
            let browser = Browser::new(options).map_err(|e| AppError::Browser(format!("无法启动浏览器: {}", e)))?;
            let tab = browser
                .new_tab()
                .map_err(|e| AppError::Browser(format!("无法创建标签页: {}", e)))?;
            Ok(ChromeDriver { browser: Some(browser), tab })
        })
        .await
        .map_err(|e| AppError::Browser(format!("浏览器启动任务异常退出: {}", e)))??;
        Ok(Box::new(driver))
    }
}

pub struct ChromeDriver {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl ChromeDriver {
    /// 在阻塞线程池中执行一段脚本，返回其 JSON 字符串结果
    async fn evaluate_json(&self, script: String) -> AppResult<serde_json::Value> {
        let tab = self.tab.clone();
        let remote = tokio::task::spawn_blocking(move || tab.evaluate(&script, false))
            .await
            .map_err(|e| AppError::Browser(format!("脚本执行任务异常退出: {}", e)))?
            .map_err(|e| AppError::Browser(format!("脚本执行失败: {}", e)))?;
        match remote.value {
            Some(serde_json::Value::String(raw)) => Ok(serde_json::from_str(&raw)?),
            other => Err(AppError::Browser(format!("脚本返回了意外的结果: {:?}", other))),
        }
    }
}

fn frame_script(template: &str, frame: &[usize], selector: Option<&str>) -> AppResult<String> {
    let resolve = RESOLVE_FRAME_JS.replace("__PATH__", &serde_json::to_string(frame)?);
    let mut script = template.replace("__RESOLVE__", &resolve);
    if let Some(selector) = selector {
        script = script.replace("__SELECTOR__", &serde_json::to_string(selector)?);
    }
    Ok(script)
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    async fn load(&mut self, url: &str, timeout: Duration) -> AppResult<()> {
        let tab = self.tab.clone();
        let url = url.to_string();
        debug!("浏览器加载: {}", url);
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            tab.set_default_timeout(timeout);
            tab.navigate_to(&url)?;
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await
        .map_err(|e| AppError::Browser(format!("页面加载任务异常退出: {}", e)))?
        .map_err(|e| AppError::Browser(format!("页面加载失败: {}", e)))
    }

    async fn find_elements(&mut self, frame: &[usize], selector: &str) -> AppResult<Vec<ElementSnapshot>> {
        let script = frame_script(FIND_ELEMENTS_JS, frame, Some(selector))?;
        let value = self.evaluate_json(script).await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn child_frames(&mut self, frame: &[usize]) -> AppResult<Vec<FramePath>> {
        let script = frame_script(CHILD_FRAMES_JS, frame, None)?;
        let value = self.evaluate_json(script).await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        let indices: Vec<usize> = serde_json::from_value(value)?;
        Ok(indices
            .into_iter()
            .map(|i| {
                let mut path = frame.to_vec();
                path.push(i);
                path
            })
            .collect())
    }

    async fn quit(&mut self) {
        // Browser 在 drop 时结束 Chrome 进程
        if let Some(browser) = self.browser.take() {
            let _ = tokio::task::spawn_blocking(move || drop(browser)).await;
            debug!("浏览器已关闭");
        }
    }
}
