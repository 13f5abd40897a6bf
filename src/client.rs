// src/client.rs

use crate::{config::AppConfig, error::*};
use reqwest::{IntoUrl, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::sync::Arc;

#[derive(Clone)]
pub struct RobustClient {
    pub client: ClientWithMiddleware,
}

impl RobustClient {
    /// 带瞬时错误重试的客户端，用于 Canvas 分页拉取
    pub fn new(config: Arc<AppConfig>) -> AppResult<Self> {
        let max_retries = config.max_retries;
        Self::with_retries(config, max_retries)
    }

    /// 不重试的客户端。字幕检查器每个视频只请求一次，失败直接进入回退策略。
    pub fn single_shot(config: Arc<AppConfig>) -> AppResult<Self> {
        Self::with_retries(config, 0)
    }

    fn with_retries(config: Arc<AppConfig>, max_retries: u32) -> AppResult<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()?;
        let mut builder = ClientBuilder::new(inner);
        if max_retries > 0 {
            let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
            builder = builder.with(RetryTransientMiddleware::new_with_policy(retry_policy));
        }
        Ok(Self { client: builder.build() })
    }

    /// 带 Bearer Token 的 GET；401/403 视为 Token 失效，其余非 2xx 状态码转换为错误
    pub async fn get_authorized<T: IntoUrl>(&self, url: T, token: &str) -> AppResult<Response> {
        let res = self.client.get(url).bearer_auth(token).send().await?;
        if res.status() == StatusCode::UNAUTHORIZED || res.status() == StatusCode::FORBIDDEN {
            return Err(AppError::TokenInvalid);
        }
        Ok(res.error_for_status()?)
    }
}
