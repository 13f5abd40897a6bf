// src/classifier.rs

use crate::models::MediaKind;

/// 根据 URL 文本判断视频来源。纯函数，大小写不敏感。
///
/// 优先级：`youtu` → `panopto` → 同时包含 `canvas` 与 `files` → 其他。
/// 只含 `canvas` 的链接（页面、作业等）不算作文件播放器。
pub fn classify(url: &str) -> MediaKind {
    let lower = url.to_lowercase();
    if lower.contains("youtu") {
        MediaKind::YouTube
    } else if lower.contains("panopto") {
        MediaKind::Panopto
    } else if lower.contains("canvas") && lower.contains("files") {
        MediaKind::EmbeddedPlayer
    } else {
        MediaKind::Other
    }
}
