// src/checker/token.rs

use log::trace;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

#[derive(Debug, Clone)]
struct AuthToken {
    value: String,
    expires_at: Instant,
}

/// 按 API 根地址缓存的 Bearer Token，仅在进程内存活。
///
/// 记录的过期时间比服务端给出的提前 `margin`，只要 `now < expires_at` 即可使用。
#[derive(Debug, Clone)]
pub struct TokenCache {
    tokens: HashMap<String, AuthToken>,
    margin: Duration,
}

impl TokenCache {
    pub fn new(margin: Duration) -> Self {
        Self {
            tokens: HashMap::new(),
            margin,
        }
    }

    pub fn get(&self, base_url: &str, now: Instant) -> Option<&str> {
        let token = self.tokens.get(base_url)?;
        if now < token.expires_at {
            Some(&token.value)
        } else {
            trace!("{} 的 Token 已临近过期", base_url);
            None
        }
    }

    pub fn insert(&mut self, base_url: &str, value: String, expires_in: Duration, now: Instant) {
        let expires_at = now + expires_in.saturating_sub(self.margin);
        self.tokens.insert(base_url.to_string(), AuthToken { value, expires_at });
    }

    pub fn invalidate(&mut self, base_url: &str) {
        self.tokens.remove(base_url);
    }
}
