//! 按调用方固定窗口限流（注册/链接/换发），抵御配对码枚举与注册洪泛。

use std::{collections::HashMap, convert::Infallible, net::SocketAddr, sync::Arc};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, StatusCode, request::Parts},
};
use st_shared_protocol::CODE_RATE_LIMITED;
use tokio::sync::RwLock;
use tracing::warn;

use crate::{api::error::ApiError, auth::store::unix_now, state::AppState};

/// 限流窗口长度（秒）。
pub(crate) const RATE_WINDOW_SEC: u64 = 60;
/// 同时跟踪的窗口上限；写满且无可回收窗口时新调用方直接限流。
pub(crate) const MAX_TRACKED_WINDOWS: usize = 65_536;

/// 单个窗口计数。
#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: u64,
    count: u32,
}

impl Window {
    fn is_live(&self, now: u64) -> bool {
        self.started_at.saturating_add(RATE_WINDOW_SEC) > now
    }
}

/// 固定窗口限流器。
#[derive(Clone)]
pub(crate) struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, Window>>>,
    capacity: usize,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::with_capacity(MAX_TRACKED_WINDOWS)
    }
}

fn rate_limited() -> ApiError {
    ApiError::new(
        StatusCode::TOO_MANY_REQUESTS,
        CODE_RATE_LIMITED,
        "请求过于频繁",
        "请稍后重试",
    )
}

impl RateLimiter {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// 消耗一次配额；`limit == 0` 表示不限流。
    pub(crate) async fn check(&self, scope: &str, caller: &str, limit: u32) -> Result<(), ApiError> {
        self.check_at(scope, caller, limit, unix_now()).await
    }

    pub(crate) async fn check_at(
        &self,
        scope: &str,
        caller: &str,
        limit: u32,
        now: u64,
    ) -> Result<(), ApiError> {
        if limit == 0 {
            return Ok(());
        }

        let key = format!("{scope}:{caller}");
        let mut guard = self.windows.write().await;
        // 仅在容量写满时整体回收过期窗口。
        if !guard.contains_key(&key) && guard.len() >= self.capacity {
            guard.retain(|_, window| window.is_live(now));
            if guard.len() >= self.capacity {
                warn!("rate limiter full, rejecting new caller scope={scope}");
                return Err(rate_limited());
            }
        }

        let window = guard.entry(key).or_insert(Window {
            started_at: now,
            count: 0,
        });
        if !window.is_live(now) {
            *window = Window {
                started_at: now,
                count: 0,
            };
        }
        if window.count >= limit {
            warn!("rate limited scope={scope} caller={caller}");
            return Err(rate_limited());
        }
        window.count += 1;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn tracked(&self) -> usize {
        self.windows.read().await.len()
    }
}

/// 代理追加的 `x-forwarded-for` 末项；首项由客户端任意填写，不可用于限流。
fn last_forwarded_hop(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .last()
        .and_then(|raw| raw.rsplit(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

/// 限流用调用方标识：默认取 socket 对端地址；开启 `PAIRING_TRUST_FORWARDED` 时取代理追加的末项。
#[derive(Debug, Clone)]
pub(crate) struct CallerAddr(pub(crate) String);

impl FromRequestParts<AppState> for CallerAddr {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let forwarded = if state.config.trust_forwarded {
            last_forwarded_hop(&parts.headers)
        } else {
            None
        };
        let caller = forwarded
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());
        Ok(Self(caller))
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        extract::{ConnectInfo, FromRequestParts},
        http::{Request, StatusCode},
    };

    use super::{CallerAddr, RATE_WINDOW_SEC, RateLimiter};
    use crate::state::{AppState, test_support::test_state};

    async fn caller_of(state: &AppState, request: Request<()>) -> String {
        let (mut parts, _) = request.into_parts();
        let CallerAddr(caller) = CallerAddr::from_request_parts(&mut parts, state)
            .await
            .unwrap();
        caller
    }

    fn forwarded(value: &str) -> Request<()> {
        let mut request = Request::builder()
            .header("x-forwarded-for", value)
            .body(())
            .unwrap();
        let peer: SocketAddr = "172.16.0.5:40000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    #[tokio::test]
    async fn forwarded_header_ignored_by_default() {
        let state = test_state(&[]);
        assert_eq!(caller_of(&state, forwarded("9.9.9.9")).await, "172.16.0.5");

        let bare = Request::builder().body(()).unwrap();
        assert_eq!(caller_of(&state, bare).await, "unknown");
    }

    #[tokio::test]
    async fn trusted_proxy_uses_last_hop() {
        let state = test_state(&[("PAIRING_TRUST_FORWARDED", "1")]);
        assert_eq!(
            caller_of(&state, forwarded("spoofed, 10.0.0.1 , 203.0.113.7")).await,
            "203.0.113.7"
        );
        assert_eq!(caller_of(&state, forwarded(" ")).await, "172.16.0.5");
    }

    #[tokio::test]
    async fn limit_applies_per_scope_and_caller() {
        let limiter = RateLimiter::default();
        for _ in 0..3 {
            limiter.check_at("register", "1.2.3.4", 3, 100).await.unwrap();
        }
        let err = limiter
            .check_at("register", "1.2.3.4", 3, 101)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);

        limiter.check_at("register", "5.6.7.8", 3, 101).await.unwrap();
        limiter.check_at("exchange", "1.2.3.4", 3, 101).await.unwrap();
    }

    #[tokio::test]
    async fn window_resets_after_expiry() {
        let limiter = RateLimiter::default();
        limiter.check_at("link", "ip", 1, 100).await.unwrap();
        assert!(limiter.check_at("link", "ip", 1, 100).await.is_err());
        limiter
            .check_at("link", "ip", 1, 100 + RATE_WINDOW_SEC)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn window_map_is_bounded() {
        let limiter = RateLimiter::with_capacity(4);
        for idx in 0..4 {
            limiter
                .check_at("register", &format!("10.0.0.{idx}"), 5, 100)
                .await
                .unwrap();
        }
        let err = limiter
            .check_at("register", "10.0.0.99", 5, 101)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        // 已跟踪的调用方不受容量影响。
        limiter.check_at("register", "10.0.0.1", 5, 101).await.unwrap();
        assert_eq!(limiter.tracked().await, 4);

        // 过期窗口被回收后可接纳新调用方。
        limiter
            .check_at("register", "10.0.0.99", 5, 100 + RATE_WINDOW_SEC)
            .await
            .unwrap();
        assert_eq!(limiter.tracked().await, 1);
    }

    #[tokio::test]
    async fn zero_limit_disables_throttling() {
        let limiter = RateLimiter::default();
        for _ in 0..100 {
            limiter.check_at("exchange", "ip", 0, 1).await.unwrap();
        }
    }
}
