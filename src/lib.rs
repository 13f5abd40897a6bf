// src/lib.rs

pub mod browser;
pub mod canvas;
pub mod checker;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod report;
pub mod symbols;
pub mod ui;
pub mod utils;
pub mod workflows;

use crate::{
    cli::Cli,
    config::AppConfig,
    engine::CaptionEngine,
    error::{AppError, AppResult},
    report::ResultSink,
};
use colored::*;
use log::{debug, info};
use std::sync::{Arc, atomic::AtomicBool};

/// 核心的执行上下文，包含所有任务所需的状态和工具
#[derive(Clone)]
pub struct AuditJobContext {
    pub config: Arc<AppConfig>,
    pub args: Arc<Cli>,
    pub cancellation_token: Arc<AtomicBool>,
}

/// 库的公共入口点，由 `main.rs` 调用
pub async fn run_from_cli(args: Arc<Cli>, cancellation_token: Arc<AtomicBool>) -> AppResult<()> {
    debug!("CLI 参数: {:?}", args);

    // 分类模式不需要配置与网络
    if let Some(url) = &args.classify {
        workflows::run_classify(url);
        return Ok(());
    }

    let config = Arc::new(AppConfig::new(&args)?);
    debug!("加载的应用配置: {:?}", config);

    let context = AuditJobContext {
        config: config.clone(),
        args: args.clone(),
        cancellation_token,
    };

    let course_ids = if args.pull {
        let pulled = workflows::run_pull(&context, &args.course).await?;
        if pulled.is_empty() {
            return Err(AppError::UserInputError("没有成功拉取任何课程，无法继续审核。".to_string()));
        }
        pulled
    } else if args.all {
        workflows::load_course_ids(&config.course_ids_path())?
    } else {
        args.course.clone()
    };
    info!("待审核课程: {:?}", course_ids);

    let sources = args.sources();
    let names: Vec<_> = sources.iter().map(|k| k.as_str()).collect();
    println!("\n{} 审核来源: {}", *symbols::INFO, names.join(", ").cyan());

    let mut engine = CaptionEngine::from_config(config.clone())?;
    let sink = ResultSink::new(config.report_path());
    let stats = workflows::audit_courses(
        &mut engine,
        &sink,
        &config,
        &course_ids,
        &sources,
        &context.cancellation_token,
    )
    .await?;
    stats.print_report(sink.path());
    Ok(())
}
