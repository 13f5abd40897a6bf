// src/engine.rs

use crate::{
    browser::{AuditSession, AutoConfirm, ChromeLauncher, ConsoleLoginGate, LoginGate},
    checker::{CaptionChecker, EmbeddedPlayerChecker, PanoptoChecker, WatchPageTranscripts, YoutubeChecker},
    config::AppConfig,
    error::AppResult,
    models::{CaptionSignal, CaptionVerdict, MediaKind, MediaReference},
};
use indicatif::ProgressBar;
use log::{debug, info};
use std::{collections::HashMap, sync::Arc};

/// 按来源类型分派到检查器，并在此处把三值结论折叠为布尔值。
///
/// Panopto 与 Canvas 检查器共用同一个 [`AuditSession`]，一次审核只处理一个链接。
pub struct CaptionEngine {
    checkers: HashMap<MediaKind, Box<dyn CaptionChecker>>,
    session: AuditSession,
}

impl CaptionEngine {
    /// 不带任何检查器的引擎
    pub fn new(session: AuditSession) -> Self {
        Self {
            checkers: HashMap::new(),
            session,
        }
    }

    /// 注册检查器；同一来源重复注册时后者覆盖前者
    pub fn with_checker(mut self, checker: Box<dyn CaptionChecker>) -> Self {
        self.checkers.insert(checker.kind(), checker);
        self
    }

    /// 生产配置：Chrome 浏览器 + 终端登录确认
    pub fn from_config(config: Arc<AppConfig>) -> AppResult<Self> {
        let settings = &config.browser;
        let login_gate: Box<dyn LoginGate> = if settings.login_prompt {
            Box::new(ConsoleLoginGate::new(settings.login_timeout))
        } else {
            Box::new(AutoConfirm)
        };
        let session = AuditSession::new(
            Box::new(ChromeLauncher::new(settings.clone())),
            login_gate,
            settings.page_timeout,
        );
        Self::with_session(config, session)
    }

    /// 注册全部内置检查器，浏览器会话由调用方提供
    pub fn with_session(config: Arc<AppConfig>, session: AuditSession) -> AppResult<Self> {
        let youtube = YoutubeChecker::new(WatchPageTranscripts::new(config.clone())?);
        let panopto = PanoptoChecker::new(config.clone())?;
        let embedded = EmbeddedPlayerChecker::new(config);
        Ok(Self::new(session)
            .with_checker(Box::new(youtube))
            .with_checker(Box::new(panopto))
            .with_checker(Box::new(embedded)))
    }

    pub fn session(&self) -> &AuditSession {
        &self.session
    }

    /// 登录提示期间需要暂时隐藏的进度条
    pub fn attach_progress(&mut self, progress: Option<ProgressBar>) {
        self.session.set_progress(progress);
    }

    /// 审核单个链接，最多产生一条记录。链接不是视频时返回 `None`。
    pub async fn audit(&mut self, reference: &MediaReference) -> Option<CaptionVerdict> {
        let (url, signal) = match self.checkers.get_mut(&reference.kind()) {
            Some(checker) => {
                let url = checker.report_url(reference.raw_url());
                let signal = checker.check(reference.raw_url(), &mut self.session).await?;
                (url, signal)
            }
            None => {
                debug!("{} 类型没有检查器: {}", reference.kind(), reference.raw_url());
                (reference.raw_url().to_string(), CaptionSignal::Unknown)
            }
        };
        debug!("{} -> {:?}", url, signal);
        Some(CaptionVerdict::new(reference, url, signal.resolve()))
    }

    /// 关闭浏览器。运行结束时调用。
    pub async fn close(&mut self) {
        if self.session.is_active() {
            info!("关闭浏览器会话");
        }
        self.session.close().await;
    }
}
