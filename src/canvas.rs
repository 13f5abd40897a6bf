// src/canvas.rs

use crate::{
    client::RobustClient,
    config::AppConfig,
    constants,
    error::{AppError, AppResult},
    models::api::{CanvasCourse, CanvasModule, CanvasModuleItem},
};
use log::{debug, info, warn};
use reqwest::header::LINK;
use serde::de::DeserializeOwned;
use std::{sync::Arc, time::Duration};

/// 从 `Link` 响应头中取出 `rel="next"` 的地址
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == r#"rel="next""# || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

/// Canvas REST API 的只读客户端，只用到课程、模块与模块条目三类接口
pub struct CanvasClient {
    http: RobustClient,
    base_url: String,
    token: String,
    page_delay: Duration,
}

impl CanvasClient {
    pub fn new(config: Arc<AppConfig>) -> AppResult<Self> {
        let token = config
            .canvas_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or(AppError::CredentialsMissing("Canvas API Token"))?;
        Ok(Self {
            base_url: config.canvas_base_url.trim_end_matches('/').to_string(),
            page_delay: config.page_delay,
            token,
            http: RobustClient::new(config)?,
        })
    }

    /// 当前用户可见的全部课程
    pub async fn list_courses(&self) -> AppResult<Vec<CanvasCourse>> {
        let url = format!("{}/courses?per_page={}", self.base_url, constants::CANVAS_PAGE_SIZE);
        let courses: Vec<CanvasCourse> = self.get_paged(url).await?;
        info!("共获取 {} 门课程", courses.len());
        Ok(courses)
    }

    /// 课程所有模块条目中的 `url` 与 `external_url`，按出现顺序
    pub async fn course_links(&self, course_id: &str) -> AppResult<Vec<String>> {
        let url = format!(
            "{}/courses/{}/modules?per_page={}",
            self.base_url,
            course_id,
            constants::CANVAS_PAGE_SIZE
        );
        let modules: Vec<CanvasModule> = self.get_paged(url).await?;
        debug!("课程 {} 共有 {} 个模块", course_id, modules.len());

        let mut links = Vec::new();
        for module in &modules {
            let items_url = module
                .items_url
                .clone()
                .unwrap_or_else(|| format!("{}/courses/{}/modules/{}/items", self.base_url, course_id, module.id));
            tokio::time::sleep(self.page_delay).await;

            match self.get_paged::<CanvasModuleItem>(items_url).await {
                Ok(items) => links.extend(items.iter().flat_map(|item| item.links().map(str::to_string))),
                // 单个模块失败不影响其余模块
                Err(e @ AppError::TokenInvalid) => return Err(e),
                Err(e) => warn!(
                    "获取课程 {} 模块 {} ({}) 的条目失败: {}",
                    course_id,
                    module.id,
                    module.name.as_deref().unwrap_or("-"),
                    e
                ),
            }
        }
        info!("课程 {} 共找到 {} 个链接", course_id, links.len());
        Ok(links)
    }

    /// 沿 `Link: rel="next"` 依次拉取所有分页，页与页之间固定等待
    async fn get_paged<T: DeserializeOwned>(&self, first_url: String) -> AppResult<Vec<T>> {
        let mut results = Vec::new();
        let mut next = Some(first_url);
        let mut first_page = true;

        while let Some(url) = next.take() {
            if !first_page {
                tokio::time::sleep(self.page_delay).await;
            }
            first_page = false;

            let res = self.http.get_authorized(&url, &self.token).await?;
            let next_url = res
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_next_link)
                .filter(|n| n != &url);
            let body = res.text().await?;
            let batch: Vec<T> =
                serde_json::from_str(&body).map_err(|source| AppError::ApiParseFailed { url: url.clone(), source })?;
            debug!("{} 返回 {} 条记录", url, batch.len());
            results.extend(batch);
            next = next_url;
        }
        Ok(results)
    }
}
