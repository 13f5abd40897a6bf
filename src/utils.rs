// src/utils.rs

use crate::constants;
use url::Url;

pub fn truncate_text(text: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut end_pos = 0;
    for (i, c) in text.char_indices() {
        width += if c.is_ascii() { 1 } else { 2 };
        if width > max_width.saturating_sub(3) {
            end_pos = i;
            break;
        }
    }
    if end_pos == 0 { text.to_string() } else { format!("{}...", &text[..end_pos]) }
}

/// 取 URL 的认证域 (`scheme://host[:port]`)，无法解析或缺少主机时返回 `None`
pub fn base_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str()?;
    Some(parsed.origin().ascii_serialization())
}

/// Panopto 会话 ID 的形状：足够长且包含至少 4 个连字符
pub fn looks_like_session_id(segment: &str) -> bool {
    segment.len() >= constants::panopto::SESSION_ID_MIN_LEN
        && segment.matches('-').count() >= constants::panopto::SESSION_ID_MIN_HYPHENS
}

/// 把文本按非字母数字字符切分为小写词
pub fn lowercase_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}
