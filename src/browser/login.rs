// src/browser/login.rs

use crate::{constants, symbols, ui};
use async_trait::async_trait;
use colored::Colorize;
use log::{debug, info, warn};
use std::{io, time::Duration};
use tokio::sync::{Mutex, mpsc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// 操作员确认已登录
    Confirmed,
    /// 等待超时，按未确认继续
    TimedOut,
    /// 操作员放弃该认证域的页面检测
    Cancelled,
}

/// 浏览器首次打开某个认证域时，等待操作员在窗口中手动完成登录
#[async_trait]
pub trait LoginGate: Send + Sync {
    async fn await_login(&self, base_url: &str) -> LoginOutcome;
}

/// 不等待，直接视为已登录。用于 `--no-login-prompt` 与测试。
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl LoginGate for AutoConfirm {
    async fn await_login(&self, _base_url: &str) -> LoginOutcome {
        LoginOutcome::Confirmed
    }
}

type LineReceiver = mpsc::UnboundedReceiver<io::Result<String>>;

/// 在终端中提示并读取一行确认，带超时。
///
/// 标准输入由一个常驻的后台线程逐行读取并送入通道，各次提示共用这个通道。
/// 超时不会留下阻塞中的读取任务，运行时关闭时无需等待。
#[derive(Debug)]
pub struct ConsoleLoginGate {
    timeout: Duration,
    lines: Mutex<Option<LineReceiver>>,
}

impl ConsoleLoginGate {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            lines: Mutex::new(None),
        }
    }

    /// 使用给定的行来源代替标准输入
    pub fn with_lines(timeout: Duration, lines: LineReceiver) -> Self {
        Self {
            timeout,
            lines: Mutex::new(Some(lines)),
        }
    }
}

/// 启动读取标准输入的线程。线程不归 tokio 管理，进程退出时直接结束。
fn spawn_stdin_reader() -> LineReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in io::stdin().lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!("无法启动标准输入读取线程: {}", e);
    }
    rx
}

#[async_trait]
impl LoginGate for ConsoleLoginGate {
    async fn await_login(&self, base_url: &str) -> LoginOutcome {
        let mut guard = self.lines.lock().await;
        let lines = guard.get_or_insert_with(spawn_stdin_reader);

        // 上一次提示超时后才输入的内容不算作本次的回答
        while lines.try_recv().is_ok() {}

        let title = format!("需要登录: {}", base_url);
        ui::box_message(&title, &constants::LOGIN_GUIDE.lines().collect::<Vec<_>>(), |s| s.cyan());
        info!("等待操作员登录 {} (超时 {:?})", base_url, self.timeout);
        if let Err(e) = ui::print_prompt(&format!("登录完成后按 {} 继续，输入 'q' 跳过此站点", *symbols::ENTER)) {
            debug!("输出提示失败: {}", e);
        }

        match tokio::time::timeout(self.timeout, lines.recv()).await {
            Ok(Some(Ok(answer))) => parse_answer(answer.trim()),
            Ok(Some(Err(e))) => {
                warn!("读取登录确认失败: {}，继续执行", e);
                LoginOutcome::Confirmed
            }
            Ok(None) => {
                // 标准输入已关闭（例如被重定向），没有人能确认，按已登录继续
                debug!("标准输入已关闭，按已登录继续");
                LoginOutcome::Confirmed
            }
            Err(_) => {
                warn!("等待 {} 登录确认超时", base_url);
                ui::warn("等待登录确认超时，直接开始检测。");
                LoginOutcome::TimedOut
            }
        }
    }
}

fn parse_answer(answer: &str) -> LoginOutcome {
    if answer.eq_ignore_ascii_case("q") {
        LoginOutcome::Cancelled
    } else {
        LoginOutcome::Confirmed
    }
}
