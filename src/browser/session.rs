// src/browser/session.rs

use super::{BrowserDriver, BrowserLauncher, LoginGate, LoginOutcome};
use crate::ui;
use log::{debug, info, warn};
use indicatif::{ProgressBar, ProgressDrawTarget};
use std::{collections::HashSet, time::Duration};

/// 独占一个自动化浏览器实例。
///
/// 浏览器在第一次需要时才启动，并绑定到一个认证域（`scheme://host[:port]`）；
/// 请求不同的认证域时，旧浏览器会先被关闭再重新启动。同一时刻最多只有一个浏览器存活。
pub struct AuditSession {
    launcher: Box<dyn BrowserLauncher>,
    login_gate: Box<dyn LoginGate>,
    page_timeout: Duration,
    driver: Option<Box<dyn BrowserDriver>>,
    bound_base: Option<String>,
    launch_failed: bool,
    declined: HashSet<String>,
    progress: Option<ProgressBar>,
}

impl AuditSession {
    pub fn new(launcher: Box<dyn BrowserLauncher>, login_gate: Box<dyn LoginGate>, page_timeout: Duration) -> Self {
        Self {
            launcher,
            login_gate,
            page_timeout,
            driver: None,
            bound_base: None,
            launch_failed: false,
            declined: HashSet::new(),
            progress: None,
        }
    }

    pub fn set_progress(&mut self, progress: Option<ProgressBar>) {
        self.progress = progress;
    }

    pub fn bound_base(&self) -> Option<&str> {
        self.bound_base.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.driver.is_some()
    }

    /// 取得绑定到 `base_url` 的浏览器。浏览器无法启动，或操作员放弃了该认证域时返回 `None`。
    pub async fn driver_for(&mut self, base_url: &str) -> Option<&mut Box<dyn BrowserDriver>> {
        if self.launch_failed {
            return None;
        }
        if self.declined.contains(base_url) {
            debug!("认证域 {} 已被跳过，不做页面检测", base_url);
            return None;
        }

        if self.driver.is_some() && self.bound_base.as_deref() != Some(base_url) {
            info!("认证域由 {:?} 切换到 {}，重建浏览器会话", self.bound_base, base_url);
            self.close().await;
        }

        if self.driver.is_none() {
            let mut driver = match self.launcher.launch().await {
                Ok(driver) => driver,
                Err(e) => {
                    // 本次运行不再尝试启动，后续只依赖 API
                    warn!("浏览器启动失败: {}", e);
                    ui::warn(&format!("浏览器无法启动，页面检测已禁用: {}", e));
                    self.launch_failed = true;
                    return None;
                }
            };

            // 先打开站点首页，让操作员在正确的域名下登录
            if let Err(e) = driver.load(base_url, self.page_timeout).await {
                debug!("打开登录页 {} 失败: {}", base_url, e);
            }

            match self.confirm_login(base_url).await {
                LoginOutcome::Confirmed => debug!("{} 登录已确认", base_url),
                LoginOutcome::TimedOut => warn!("{} 登录未确认，继续检测", base_url),
                LoginOutcome::Cancelled => {
                    info!("操作员跳过了 {} 的页面检测", base_url);
                    driver.quit().await;
                    self.declined.insert(base_url.to_string());
                    return None;
                }
            }

            self.driver = Some(driver);
            self.bound_base = Some(base_url.to_string());
        }

        self.driver.as_mut()
    }

    /// 等待登录确认。提示框和输入行会被进度条的重绘覆盖，所以期间隐藏进度条。
    async fn confirm_login(&self, base_url: &str) -> LoginOutcome {
        let Some(bar) = &self.progress else {
            return self.login_gate.await_login(base_url).await;
        };
        bar.set_draw_target(ProgressDrawTarget::hidden());
        let outcome = self.login_gate.await_login(base_url).await;
        bar.set_draw_target(ProgressDrawTarget::stderr());
        bar.tick();
        outcome
    }

    /// 关闭当前浏览器（若有）
    pub async fn close(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            driver.quit().await;
        }
        self.bound_base = None;
    }
}
