// src/cli.rs

use crate::models::MediaKind;
use clap::{Parser, ValueEnum, command, crate_version};
use std::path::PathBuf;

/// 定义日志输出级别
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// 可审核的视频来源
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum SourceFilter {
    Youtube,
    Panopto,
    Canvas,
}

impl SourceFilter {
    pub fn kind(self) -> MediaKind {
        match self {
            SourceFilter::Youtube => MediaKind::YouTube,
            SourceFilter::Panopto => MediaKind::Panopto,
            SourceFilter::Canvas => MediaKind::EmbeddedPlayer,
        }
    }
}

fn parse_course_id(s: &str) -> Result<String, String> {
    let s = s.trim();
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        Ok(s.to_string())
    } else {
        Err(format!("'{}' 不是有效的课程 ID (应为数字)", s))
    }
}

// command 属性
#[derive(Parser, Debug, Clone)]
#[command(
    version = crate_version!(),
    about,
    long_about = None,
    arg_required_else_help = true,
    disable_help_flag = true,
    disable_version_flag = true,
)]
#[command(group(
    clap::ArgGroup::new("mode")
        .required(true)
        .args(&["all", "course", "classify"]),
))]
pub struct Cli {
    // --- 运行模式 (Mode) ---
    /// 审核课程列表 (courses_ids.json) 中的全部课程
    #[arg(short, long, action = clap::ArgAction::SetTrue, help_heading = "Mode")]
    pub all: bool,
    /// 审核指定课程，可重复使用
    #[arg(short, long, value_name = "ID", value_parser = parse_course_id, help_heading = "Mode")]
    pub course: Vec<String>,
    /// 只显示链接的分类结果并退出
    #[arg(long, value_name = "URL", help_heading = "Mode")]
    pub classify: Option<String>,

    // --- 审核选项 (Options) ---
    /// 审核前先从 Canvas 拉取课程与模块链接 (需要 Canvas Token)
    #[arg(short, long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub pull: bool,
    /// 只审核指定来源，可重复使用 (默认全部)
    #[arg(short, long, value_enum, help_heading = "Options")]
    pub source: Vec<SourceFilter>,
    /// 数据目录 (课程缓存与审核报告)
    #[arg(short, long, value_name = "DIR", help_heading = "Options")]
    pub data_dir: Option<PathBuf>,
    /// 使用指定的配置文件
    #[arg(long, value_name = "FILE", help_heading = "Options")]
    pub config: Option<PathBuf>,
    /// 以无界面模式运行浏览器 (无法手动登录)
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub headless: bool,
    /// 打开浏览器后不等待手动登录确认
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub no_login_prompt: bool,
    /// 提供 Canvas API Token，优先级最高
    #[arg(long, value_name = "TOKEN", help_heading = "Options")]
    pub canvas_token: Option<String>,

    // --- 通用选项 (General) ---
    /// 显示此帮助信息并退出
    #[arg(short = 'h', long, action = clap::ArgAction::Help, global = true, help_heading = "General")]
    _help: Option<bool>,
    /// 显示版本信息并退出
    #[arg(short = 'V', long, action = clap::ArgAction::Version, global = true, help_heading = "General")]
    _version: Option<bool>,
    /// (隐藏参数) 设置日志文件的输出级别，用于调试
    #[arg(long, value_enum, default_value_t = LogLevel::Off, global = true, hide = true)]
    pub log_level: LogLevel,
}

impl Cli {
    /// 要审核的来源，按 YouTube、Panopto、Canvas 的固定顺序，去重
    pub fn sources(&self) -> Vec<MediaKind> {
        [SourceFilter::Youtube, SourceFilter::Panopto, SourceFilter::Canvas]
            .into_iter()
            .filter(|s| self.source.is_empty() || self.source.contains(s))
            .map(SourceFilter::kind)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_is_repeatable() {
        let cli = Cli::parse_from(["caption-audit", "-c", "165356", "--course", "170001"]);
        assert_eq!(cli.course, vec!["165356", "170001"]);
        assert!(!cli.all);
    }

    #[test]
    fn test_course_id_must_be_numeric() {
        assert!(Cli::try_parse_from(["caption-audit", "--course", "abc"]).is_err());
    }

    #[test]
    fn test_modes_are_exclusive() {
        assert!(Cli::try_parse_from(["caption-audit", "--all", "--course", "1"]).is_err());
        assert!(Cli::try_parse_from(["caption-audit", "--pull"]).is_err());
    }

    #[test]
    fn test_sources_default_to_all_in_fixed_order() {
        let cli = Cli::parse_from(["caption-audit", "--all"]);
        assert_eq!(cli.sources(), vec![MediaKind::YouTube, MediaKind::Panopto, MediaKind::EmbeddedPlayer]);

        let cli = Cli::parse_from(["caption-audit", "--all", "-s", "canvas", "-s", "youtube", "-s", "canvas"]);
        assert_eq!(cli.sources(), vec![MediaKind::YouTube, MediaKind::EmbeddedPlayer]);
    }
}
