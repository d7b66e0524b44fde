//! 内部领域类型：配对记录、token claims 与领域错误。

use serde::{Deserialize, Serialize};

/// 配对码默认有效期（秒）。
pub(crate) const DEFAULT_CODE_TTL_SEC: u64 = 300;
/// bearer token 默认有效期（秒）。
pub(crate) const DEFAULT_TOKEN_TTL_SEC: u64 = 3600;
/// 设备 exchange 默认轮询间隔（秒）。
pub(crate) const DEFAULT_POLL_INTERVAL_SEC: u64 = 3;
/// 过期记录清扫默认周期（秒）。
pub(crate) const DEFAULT_SWEEP_INTERVAL_SEC: u64 = 60;
/// 签名密钥最小长度（字节）。
pub(crate) const MIN_SECRET_LEN: usize = 32;

/// 配对记录状态。
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum RegistrationState {
    Pending,
    Linked,
    Consumed,
}

/// 设备配对记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeviceRegistration {
    pub(crate) device_id: String,
    pub(crate) code: String,
    pub(crate) code_expires_at: u64,
    pub(crate) state: RegistrationState,
    #[serde(default)]
    pub(crate) user_id: Option<String>,
    /// 创建时间（unix 秒）。
    pub(crate) created_at: u64,
}

impl DeviceRegistration {
    /// `now` 是否已到达过期时刻（含边界）。
    pub(crate) fn is_expired(&self, now: u64) -> bool {
        now >= self.code_expires_at
    }

    /// 是否仍占用配对码空间（未过期且未消费）。
    pub(crate) fn is_live(&self, now: u64) -> bool {
        !self.is_expired(now) && self.state != RegistrationState::Consumed
    }
}

/// bearer token claims。
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenClaims {
    pub(crate) device_id: String,
    pub(crate) user_id: String,
    pub(crate) iat: u64,
    pub(crate) exp: u64,
    pub(crate) jti: String,
}

/// token header。
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TokenHeader {
    pub(crate) alg: String,
    pub(crate) typ: String,
}

/// 配对存储状态机错误。
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub(crate) enum PairingError {
    #[error("code not found")]
    CodeNotFound,
    #[error("code expired")]
    CodeExpired,
    #[error("code already linked")]
    AlreadyLinked,
    #[error("code not linked yet")]
    NotReady,
    #[error("pairing store error: {0}")]
    Store(String),
}

/// token 编解码错误。
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub(crate) enum TokenError {
    #[error("token must have exactly three segments")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token payload invalid")]
    InvalidToken,
    #[error("token expired")]
    Expired,
    #[error("token encode failed: {0}")]
    Encode(String),
}

/// Link 调用方身份解析错误。
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub(crate) enum IdentityError {
    #[error("missing user identity header")]
    MissingUser,
    #[error("upstream secret mismatch")]
    UpstreamMismatch,
    #[error("upstream identity not configured")]
    Unconfigured,
}
