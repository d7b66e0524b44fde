//! 设备端配对流程：注册、展示配对码、按间隔轮询换发。

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail};
use st_shared_protocol::{RegisterData, TokenData};
use tracing::{debug, info, warn};

use crate::{
    banner::print_code_banner,
    client::{CallError, PairingClient},
};

/// 服务端 `425 Too Early`：继续轮询。
const STATUS_TOO_EARLY: u16 = 425;
/// 服务端限流：保留当前配对码，退避后重试。
const STATUS_TOO_MANY_REQUESTS: u16 = 429;
/// 单轮配对允许的最大重新注册次数。
const MAX_REREGISTER: u32 = 5;

/// 单次换发结果的后续动作。
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PollStep {
    /// 拿到 token。
    Done(TokenData),
    /// 用户尚未确认，按间隔继续。
    KeepPolling,
    /// 配对码失效，放弃并重新注册。
    Reregister,
    /// 服务端或网络故障，退避后重试同一调用。
    Retry,
}

/// 换发结果分类：425 继续，429 与 5xx、传输错误退避重试，其他 4xx 重新注册。
pub(crate) fn classify_exchange(result: Result<TokenData, CallError>) -> PollStep {
    let err = match result {
        Ok(token) => return PollStep::Done(token),
        Err(err) => err,
    };
    match err.status() {
        Some(STATUS_TOO_EARLY) => PollStep::KeepPolling,
        _ if is_retryable(&err) => PollStep::Retry,
        Some(status) if (400..500).contains(&status) => PollStep::Reregister,
        _ => PollStep::Retry,
    }
}

/// 指数退避（有上限、有次数限制）。
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    base: Duration,
    max_delay: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    pub(crate) fn new(base: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_delay,
            max_attempts,
            attempt: 0,
        }
    }

    /// 下一次等待时长；次数用尽返回 `None`。
    pub(crate) fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(self.attempt).unwrap_or(u32::MAX);
        self.attempt += 1;
        Some(self.base.saturating_mul(factor).min(self.max_delay))
    }

    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30), 6)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default()
}

/// 限流、5xx 与传输错误可退避重试。
fn is_retryable(err: &CallError) -> bool {
    match err.status() {
        Some(STATUS_TOO_MANY_REQUESTS) | None => true,
        Some(status) => status >= 500,
    }
}

/// 注册设备；429 与 5xx 退避重试，其余失败直接返回。
async fn register_with_retry(client: &PairingClient) -> anyhow::Result<RegisterData> {
    let mut backoff = Backoff::default();
    loop {
        match client.register().await {
            Ok(data) => return Ok(data),
            Err(err) if !is_retryable(&err) => {
                bail!("register failed: {err}");
            }
            Err(err) => {
                let Some(delay) = backoff.next_delay() else {
                    bail!("register failed after retries: {err}");
                };
                warn!("register failed, retry in {delay:?}: {err}");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// 完整配对流程，返回设备 ID 与签发的 token。
pub(crate) async fn pair_device(client: &PairingClient) -> anyhow::Result<(String, TokenData)> {
    for round in 0..=MAX_REREGISTER {
        if round > 0 {
            info!("re-registering device (round {round})");
        }
        let registration = register_with_retry(client).await?;
        print_code_banner(&registration);

        let interval = Duration::from_secs(registration.poll_interval_sec.max(1));
        let mut backoff = Backoff::default();
        loop {
            tokio::time::sleep(interval).await;
            if unix_now() >= registration.expires_at {
                info!("pairing code expired before confirmation");
                break;
            }

            let result = client
                .exchange(&registration.device_id, &registration.code)
                .await;
            match classify_exchange(result) {
                PollStep::Done(token) => return Ok((registration.device_id, token)),
                PollStep::KeepPolling => {
                    debug!("pairing not confirmed yet");
                    backoff.reset();
                }
                PollStep::Reregister => {
                    info!("pairing code no longer usable");
                    break;
                }
                PollStep::Retry => {
                    let Some(delay) = backoff.next_delay() else {
                        return Err(anyhow!("pairing service unavailable"));
                    };
                    warn!("exchange failed, retry in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    bail!("pairing not completed after {MAX_REREGISTER} re-registrations")
}
