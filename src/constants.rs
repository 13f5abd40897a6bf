// src/constants.rs

pub const UI_WIDTH: usize = 88;
pub const URL_TRUNCATE_LENGTH: usize = 70;
pub const CONFIG_DIR_NAME: &str = concat!(".", clap::crate_name!());
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = "app.log";
pub const LOG_FALLBACK_FILE_NAME: &str = "fallback.log";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub const DEFAULT_CANVAS_BASE_URL: &str = "https://canvas.uccs.edu/api/v1";
pub const DEFAULT_PANOPTO_API_PREFIX: &str = "/Panopto";
pub const DEFAULT_YOUTUBE_WATCH_BASE: &str = "https://www.youtube.com";

/// Canvas 分页请求的每页条目数
pub const CANVAS_PAGE_SIZE: u32 = 100;

/// Token 过期前预留的安全余量（秒）
pub const TOKEN_EXPIRY_MARGIN_SECS: u64 = 30;

pub mod env {
    pub const CANVAS_API_TOKEN: &str = "CANVAS_API_TOKEN";
    pub const PANOPTO_CLIENT_ID: &str = "PANOPTO_CLIENT_ID";
    pub const PANOPTO_CLIENT_SECRET: &str = "PANOPTO_CLIENT_SECRET";
}

pub mod files {
    pub const COURSES: &str = "courses.json";
    pub const COURSE_IDS: &str = "courses_ids.json";
    pub const AUDIT_REPORT: &str = "audited_videos.json";
    pub const SORTED_MODULES_DIR: &str = "sortedModules";
    pub const COURSE_MODULES_DIR: &str = "courseModules";
}

pub mod youtube {
    pub const WATCH_PREFIX: &str = "https://www.youtube.com/watch?v=";
    pub const SHORT_PREFIX: &str = "https://youtu.be/";
}

pub mod panopto {
    pub const EMBED_PAGE: &str = "Embed.aspx";
    pub const VIEWER_PAGE: &str = "Viewer.aspx";
    pub const ACCESS_TOKEN_MARKER: &str = "access_token";
    pub const SESSION_ID_MIN_LEN: usize = 32;
    pub const SESSION_ID_MIN_HYPHENS: usize = 4;
}

pub mod selectors {
    pub const BODY: &str = "body";
    pub const TRACK: &str = "track";
    pub const INTERACTIVE: &str = "button, a, input, select, [role], [tabindex], [aria-label]";
    pub const CAPTION_TOGGLE: &str = "button[aria-label]";
    /// Canvas 文件页上视频播放器的容器；非视频文件没有它
    pub const MEDIA_PREVIEW: &str = "#media_preview";
}

pub mod captions {
    /// 这些关键字作为子串匹配
    pub const KEYWORDS: &[&str] = &["caption", "subtitle"];
    /// `cc` 只作为独立的词匹配，避免误中 "accent"、"success" 之类的类名
    pub const STANDALONE_TOKEN: &str = "cc";
    pub const TRACK_KINDS: &[&str] = &["captions", "subtitles"];
    pub const TOGGLE_LABELS: &[&str] = &["enable captions", "disable captions"];
}

pub const LOGIN_GUIDE: &str = r#"
1. 浏览器窗口已经打开，并跳转到了需要登录的站点。
2. 在该窗口中完成登录 (包括单点登录与多因素认证)。
3. 登录成功后回到此终端:
   - 直接按 Enter 继续审核
   - 输入 'q' 并按 Enter 放弃此站点的页面检测 (仅使用 API 结果)
4. 超时未确认时，将直接尝试检测页面。"#;
