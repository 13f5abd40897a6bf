// src/main.rs

use caption_audit::{cli::Cli, error::AppError, logging, run_from_cli};
use clap::{CommandFactory, FromArgMatches};
use colored::*;
use std::{
    env,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

#[tokio::main]
async fn main() {
    // 为 Windows 终端启用 ANSI 颜色支持。
    #[cfg(windows)]
    {
        colored::control::set_virtual_terminal(true).ok();
    }

    let cancellation_token = Arc::new(AtomicBool::new(false));
    let token = cancellation_token.clone();
    tokio::spawn(async move {
        // 第一次 Ctrl+C 等当前视频审核完再退出，第二次立即退出
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        println!("\n{} 收到中断信号，当前视频完成后退出 (再按一次强制退出)。", "[!]".yellow());
        token.store(true, Ordering::Relaxed);
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n{} 用户强制中断程序。", "[!]".yellow());
            std::process::exit(130);
        }
    });

    let bin_name = env::var("CARGO_BIN_NAME").unwrap_or_else(|_| "caption-audit".to_string());

    let after_help = format!(
        "示例:\n  # 从 Canvas 拉取全部课程并审核\n  {bin} --all --pull\n\n  # 使用本地缓存审核指定课程的 Panopto 视频\n  {bin} -c 165356 -s panopto\n\n  # 查看链接会被归为哪一类\n  {bin} --classify \"https://youtu.be/...\"",
        bin = bin_name
    );

    let cmd = Cli::command().after_help(after_help);
    let args = match Cli::from_arg_matches(&cmd.get_matches()) {
        Ok(args) => Arc::new(args),
        Err(e) => e.exit(),
    };

    logging::init_logger(args.log_level);

    match run_from_cli(args, cancellation_token).await {
        Ok(()) => {}
        Err(AppError::UserInterrupt) => {
            eprintln!("\n{} {}", "[!]".yellow(), "审核已中断，已完成的结果已写入报告。".yellow());
            std::process::exit(130);
        }
        Err(e) => {
            log::error!("程序执行出错: {}", e);
            eprintln!("\n{} {}", "[X]".red(), format!("程序执行出错: {}", e).red());
            std::process::exit(1);
        }
    }
}
