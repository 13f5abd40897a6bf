// src/config.rs

pub mod credentials;

use self::credentials::{load_or_create_external_config, resolve_secret};
use crate::{cli::Cli, constants, error::AppResult};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CanvasSection {
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PanoptoSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub api_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct YoutubeSection {
    pub watch_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkSection {
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub page_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BrowserSection {
    pub headless: Option<bool>,
    pub page_timeout_secs: Option<u64>,
    pub element_timeout_secs: Option<u64>,
    pub max_frame_depth: Option<usize>,
    pub login_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,
}

/// 磁盘上的配置文件结构，所有字段均可缺省
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExternalConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub canvas: CanvasSection,
    #[serde(default)]
    pub panopto: PanoptoSection,
    #[serde(default)]
    pub youtube: YoutubeSection,
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub browser: BrowserSection,
}

impl ExternalConfig {
    pub(crate) fn default_app_config() -> Self {
        Self {
            data_dir: Some(PathBuf::from(constants::DEFAULT_DATA_DIR)),
            canvas: CanvasSection {
                base_url: Some(constants::DEFAULT_CANVAS_BASE_URL.into()),
                api_token: None,
            },
            panopto: PanoptoSection {
                client_id: None,
                client_secret: None,
                api_prefix: Some(constants::DEFAULT_PANOPTO_API_PREFIX.into()),
            },
            youtube: YoutubeSection {
                watch_base_url: Some(constants::DEFAULT_YOUTUBE_WATCH_BASE.into()),
            },
            network: NetworkSection {
                connect_timeout_secs: Some(10),
                timeout_secs: Some(15),
                max_retries: Some(3),
                page_delay_ms: Some(500),
            },
            browser: BrowserSection {
                headless: Some(false),
                page_timeout_secs: Some(15),
                element_timeout_secs: Some(5),
                max_frame_depth: Some(3),
                login_timeout_secs: Some(600),
                user_data_dir: None,
                chrome_path: None,
            },
        }
    }
}

/// Panopto OAuth 客户端凭据
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

// 手写 Debug，避免把 secret 打进日志
impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub page_timeout: Duration,
    pub element_timeout: Duration,
    pub poll_interval: Duration,
    pub max_frame_depth: usize,
    pub login_timeout: Duration,
    pub login_prompt: bool,
    pub user_data_dir: Option<PathBuf>,
    pub chrome_path: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: false,
            page_timeout: Duration::from_secs(15),
            element_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(250),
            max_frame_depth: 3,
            login_timeout: Duration::from_secs(600),
            login_prompt: true,
            user_data_dir: None,
            chrome_path: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub canvas_base_url: String,
    pub canvas_token: Option<String>,
    pub panopto_credentials: Option<ClientCredentials>,
    pub panopto_api_prefix: String,
    pub youtube_watch_base: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub page_delay: Duration,
    pub browser: BrowserSettings,
}

impl AppConfig {
    pub fn new(args: &Cli) -> AppResult<Self> {
        let external_config = load_or_create_external_config(args.config.as_deref())?;
        let defaults = ExternalConfig::default_app_config();

        let (canvas_token, canvas_source) = resolve_secret(
            args.canvas_token.as_deref(),
            constants::env::CANVAS_API_TOKEN,
            external_config.canvas.api_token.as_deref(),
        );
        debug!("Canvas Token 来源: {}", canvas_source);

        let (client_id, _) = resolve_secret(
            None,
            constants::env::PANOPTO_CLIENT_ID,
            external_config.panopto.client_id.as_deref(),
        );
        let (client_secret, secret_source) = resolve_secret(
            None,
            constants::env::PANOPTO_CLIENT_SECRET,
            external_config.panopto.client_secret.as_deref(),
        );
        let panopto_credentials = match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => {
                debug!("Panopto 客户端凭据来源: {}", secret_source);
                Some(ClientCredentials { client_id, client_secret })
            }
            _ => {
                info!("未配置 Panopto 客户端凭据，Panopto 仅使用页面检测");
                None
            }
        };

        let network = external_config.network;
        let browser = external_config.browser;
        let browser_defaults = BrowserSettings::default();

        Ok(Self {
            data_dir: args
                .data_dir
                .clone()
                .or(external_config.data_dir)
                .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_DATA_DIR)),
            canvas_base_url: external_config
                .canvas
                .base_url
                .or(defaults.canvas.base_url)
                .unwrap_or_default(),
            canvas_token,
            panopto_credentials,
            panopto_api_prefix: external_config
                .panopto
                .api_prefix
                .unwrap_or_else(|| constants::DEFAULT_PANOPTO_API_PREFIX.into()),
            youtube_watch_base: external_config
                .youtube
                .watch_base_url
                .unwrap_or_else(|| constants::DEFAULT_YOUTUBE_WATCH_BASE.into()),
            user_agent: constants::USER_AGENT.into(),
            connect_timeout: Duration::from_secs(network.connect_timeout_secs.unwrap_or(10)),
            timeout: Duration::from_secs(network.timeout_secs.unwrap_or(15)),
            max_retries: network.max_retries.unwrap_or(3),
            page_delay: Duration::from_millis(network.page_delay_ms.unwrap_or(500)),
            browser: BrowserSettings {
                headless: args.headless || browser.headless.unwrap_or(false),
                page_timeout: browser
                    .page_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(browser_defaults.page_timeout),
                element_timeout: browser
                    .element_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(browser_defaults.element_timeout),
                poll_interval: browser_defaults.poll_interval,
                max_frame_depth: browser.max_frame_depth.unwrap_or(browser_defaults.max_frame_depth),
                login_timeout: browser
                    .login_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(browser_defaults.login_timeout),
                login_prompt: !args.no_login_prompt,
                user_data_dir: browser.user_data_dir,
                chrome_path: browser.chrome_path,
            },
        })
    }

    pub fn courses_path(&self) -> PathBuf {
        self.data_dir.join(constants::files::COURSES)
    }

    pub fn course_ids_path(&self) -> PathBuf {
        self.data_dir.join(constants::files::COURSE_IDS)
    }

    pub fn report_path(&self) -> PathBuf {
        self.data_dir.join(constants::files::AUDIT_REPORT)
    }

    pub fn sorted_modules_path(&self, course_id: &str) -> PathBuf {
        self.data_dir
            .join(constants::files::SORTED_MODULES_DIR)
            .join(format!("sorted_modules_{}.json", course_id))
    }

    pub fn course_modules_path(&self, course_id: &str) -> PathBuf {
        self.data_dir
            .join(constants::files::COURSE_MODULES_DIR)
            .join(format!("modules_{}.json", course_id))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(constants::DEFAULT_DATA_DIR),
            canvas_base_url: constants::DEFAULT_CANVAS_BASE_URL.to_string(),
            canvas_token: None,
            panopto_credentials: None,
            panopto_api_prefix: constants::DEFAULT_PANOPTO_API_PREFIX.to_string(),
            youtube_watch_base: constants::DEFAULT_YOUTUBE_WATCH_BASE.to_string(),
            user_agent: "test-agent/1.0".to_string(),
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
            max_retries: 3,
            page_delay: Duration::from_millis(500),
            browser: BrowserSettings::default(),
        }
    }
}
