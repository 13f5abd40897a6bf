// src/workflows.rs

use crate::{
    AuditJobContext,
    canvas::CanvasClient,
    checker::{embedded, panopto, youtube},
    classifier,
    config::AppConfig,
    engine::CaptionEngine,
    error::{AppError, AppResult},
    models::{CourseLinks, MediaKind, MediaReference},
    report::{self, ResultSink},
    symbols, ui, utils,
};
use anyhow::Context;
use colored::*;
use itertools::Itertools;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::{
    fs,
    io::ErrorKind,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

/// 一次审核运行的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditStats {
    pub total: usize,
    pub with_captions: usize,
    pub without_captions: usize,
    /// 文件页不是视频，没有写入记录
    pub not_media: usize,
    pub skipped_courses: usize,
}

impl AuditStats {
    fn record(&mut self, has_captions: bool) {
        self.total += 1;
        if has_captions {
            self.with_captions += 1;
        } else {
            self.without_captions += 1;
        }
    }

    pub fn print_report(&self, report_path: &Path) {
        info!(
            "审核报告: Total={}, Captioned={}, Missing={}, NotMedia={}, SkippedCourses={}",
            self.total, self.with_captions, self.without_captions, self.not_media, self.skipped_courses
        );
        ui::print_sub_header("审核总结");
        if self.total == 0 {
            ui::info("没有需要审核的视频。");
        } else {
            println!(
                "{} | {} | 总计: {}",
                format!("有字幕: {}", self.with_captions).green(),
                format!("无字幕: {}", self.without_captions).red(),
                self.total
            );
        }
        if self.not_media > 0 {
            ui::info(&format!("{} 个 Canvas 文件不是视频，未写入报告。", self.not_media));
        }
        if self.skipped_courses > 0 {
            ui::warn(&format!("{} 门课程的缓存缺失或损坏，已跳过。", self.skipped_courses));
        }
        ui::info(&format!("结果已追加到 {}", report_path.display()));
    }
}

/// 读取 `courses_ids.json`。数组元素可以是字符串或整数。
pub fn load_course_ids(path: &Path) -> AppResult<Vec<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AppError::UserInputError(format!(
                "未找到课程列表 {}，请先使用 --pull 从 Canvas 拉取。",
                path.display()
            )));
        }
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("读取课程列表 {} 失败", path.display()))
                .into());
        }
    };
    let parsed: Value =
        serde_json::from_str(&content).with_context(|| format!("课程列表 {} 不是有效的 JSON", path.display()))?;
    let Value::Array(items) = parsed else {
        return Err(AppError::MalformedCache {
            path: path.display().to_string(),
            reason: "应为 JSON 数组".to_string(),
        });
    };

    let ids: Vec<String> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            other => {
                warn!("忽略课程列表中的无效条目: {}", other);
                None
            }
        })
        .collect();
    if ids.is_empty() {
        return Err(AppError::UserInputError(format!("课程列表 {} 为空。", path.display())));
    }
    Ok(ids)
}

/// 读取单门课程的链接缓存。文件不存在返回 `None`，内容损坏返回错误。
pub fn load_course_links(config: &AppConfig, course_id: &str) -> AppResult<Option<CourseLinks>> {
    let path = config.sorted_modules_path(course_id);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| AppError::MalformedCache {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

/// 按来源顺序生成待审核的链接。
///
/// 只审核分类结果与所在分组一致的链接；YouTube 只保留单个视频，Panopto 与 Canvas 按归一化后的地址去重。
pub fn collect_references(course_id: &str, links: &CourseLinks, sources: &[MediaKind]) -> Vec<MediaReference> {
    let mut references = Vec::new();
    for &kind in sources {
        let bucket = links.bucket(kind).iter().map(|u| u.trim()).filter(|u| !u.is_empty());
        let urls: Vec<&str> = match kind {
            MediaKind::YouTube => bucket.filter(|u| youtube::is_video_url(u)).unique().collect(),
            MediaKind::Panopto => bucket.unique_by(|u| panopto::normalize_url(u)).collect(),
            MediaKind::EmbeddedPlayer => bucket.unique_by(|u| embedded::normalize_canvas_url(u)).collect(),
            MediaKind::Other => continue,
        };
        for url in urls {
            let reference = MediaReference::new(url, Some(course_id.to_string()));
            if reference.kind() == kind {
                references.push(reference);
            } else {
                debug!("链接 {} 被分类为 {}，不在 {} 分组中审核", url, reference.kind(), kind);
            }
        }
    }
    references
}

/// 把链接按来源、再按认证域排成连续的段，使浏览器只在真正换域时重建。
/// 排序是稳定的，同一段内保持课程与缓存中的原有顺序。
pub fn order_for_session(references: &mut [MediaReference], sources: &[MediaKind]) {
    references.sort_by_key(|reference| {
        let rank = sources
            .iter()
            .position(|&kind| kind == reference.kind())
            .unwrap_or(sources.len());
        (rank, utils::base_url(reference.raw_url()))
    });
}

/// 审核所有课程，每得到一条结论就立即写入报告
pub async fn audit_courses(
    engine: &mut CaptionEngine,
    sink: &ResultSink,
    config: &AppConfig,
    course_ids: &[String],
    sources: &[MediaKind],
    cancellation_token: &AtomicBool,
) -> AppResult<AuditStats> {
    let mut stats = AuditStats::default();

    ui::print_header(&format!("阶段 1/2: 读取课程缓存 (共 {} 门课程)", course_ids.len()));
    let mut references = Vec::new();
    for course_id in course_ids {
        match load_course_links(config, course_id) {
            Ok(Some(links)) => {
                let found = collect_references(course_id, &links, sources);
                println!("{} 课程 {}: {} 个视频链接", *symbols::OK, course_id, found.len());
                references.extend(found);
            }
            Ok(None) => {
                stats.skipped_courses += 1;
                warn!("课程 {} 没有链接缓存", course_id);
                ui::warn(&format!("课程 {} 没有链接缓存，已跳过。", course_id));
            }
            Err(e) => {
                stats.skipped_courses += 1;
                warn!("跳过课程 {}: {}", course_id, e);
                ui::warn(&format!("跳过课程 {}: {}", course_id, e));
            }
        }
    }

    order_for_session(&mut references, sources);

    ui::print_header(&format!("阶段 2/2: 检查字幕 (共 {} 个视频)", references.len()));
    let pbar = ui::new_tasks_progress_bar(references.len() as u64, "审核");
    engine.attach_progress(Some(pbar.clone()));
    let result = audit_references(engine, sink, &references, cancellation_token, &pbar, &mut stats).await;
    engine.attach_progress(None);
    pbar.finish_and_clear();
    engine.close().await;
    result?;

    Ok(stats)
}

async fn audit_references(
    engine: &mut CaptionEngine,
    sink: &ResultSink,
    references: &[MediaReference],
    cancellation_token: &AtomicBool,
    pbar: &indicatif::ProgressBar,
    stats: &mut AuditStats,
) -> AppResult<()> {
    for reference in references {
        if cancellation_token.load(Ordering::Relaxed) {
            return Err(AppError::UserInterrupt);
        }
        let Some(verdict) = engine.audit(reference).await else {
            stats.not_media += 1;
            pbar.inc(1);
            continue;
        };
        sink.append(std::slice::from_ref(&verdict)).map_err(|e| {
            error!("写入报告 {:?} 失败: {}", sink.path(), e);
            e
        })?;

        stats.record(verdict.has_captions);
        pbar.println(ui::verdict_line(verdict.source.as_str(), &verdict.url, verdict.has_captions));
        pbar.inc(1);
    }
    Ok(())
}

/// 从 Canvas 拉取课程及其模块链接，写入本地缓存。
///
/// `only` 为空时拉取当前用户的全部课程并更新课程列表；否则只刷新给定课程的缓存。
/// 返回成功拉取的课程 ID。
pub async fn run_pull(context: &AuditJobContext, only: &[String]) -> AppResult<Vec<String>> {
    let config = &context.config;
    let client = CanvasClient::new(config.clone())?;

    let course_ids: Vec<String> = if only.is_empty() {
        ui::print_header("从 Canvas 拉取课程列表");
        let courses = client.list_courses().await?;
        report::write_json_file(&config.courses_path(), &courses)?;
        let ids: Vec<u64> = courses.iter().map(|c| c.id).collect();
        report::write_json_file(&config.course_ids_path(), &ids)?;
        for course in &courses {
            println!("{} {} ({})", *symbols::INFO, course.display_name(), course.id);
        }
        ids.iter().map(u64::to_string).collect()
    } else {
        only.to_vec()
    };

    ui::print_header(&format!("拉取课程模块 (共 {} 门课程)", course_ids.len()));
    let mut pulled = Vec::new();
    for course_id in &course_ids {
        if context.cancellation_token.load(Ordering::Relaxed) {
            return Err(AppError::UserInterrupt);
        }
        match pull_course(&client, config, course_id).await {
            Ok(links) => {
                println!(
                    "{} 课程 {}: YouTube {} / Panopto {} / Canvas {} / 其他 {}",
                    *symbols::OK,
                    course_id,
                    links.youtube.len(),
                    links.panopto.len(),
                    links.canvas.len(),
                    links.other.len()
                );
                pulled.push(course_id.clone());
            }
            Err(e @ AppError::TokenInvalid) => return Err(e),
            Err(e) => {
                error!("拉取课程 {} 失败: {}", course_id, e);
                eprintln!("{} 拉取课程 {} 失败: {}", *symbols::ERROR, course_id, e);
            }
        }
    }
    Ok(pulled)
}

/// 拉取单门课程的链接，写入原始列表与分组缓存
pub async fn pull_course(client: &CanvasClient, config: &AppConfig, course_id: &str) -> AppResult<CourseLinks> {
    let links = client.course_links(course_id).await?;
    report::write_json_file(&config.course_modules_path(course_id), &links)?;
    let sorted = CourseLinks::from_urls(links);
    report::write_json_file(&config.sorted_modules_path(course_id), &sorted)?;
    Ok(sorted)
}

/// 打印链接的分类结果
pub fn run_classify(url: &str) -> MediaKind {
    let kind = classifier::classify(url);
    println!("{} {} -> {}", *symbols::INFO, url, kind.as_str().bold());
    kind
}
