//! 配对服务 HTTP 客户端。

use anyhow::{Context, anyhow};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use st_shared_protocol::{
    ApiEnvelope, ExchangeRequest, RegisterData, RegisterRequest, SessionData, TokenData,
};
use thiserror::Error;
use url::Url;

/// 单次调用失败原因。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub(crate) enum CallError {
    /// 连接/超时等传输层错误。
    #[error("transport error: {0}")]
    Transport(String),
    /// 服务端返回失败包裹。
    #[error("{status} {code}: {message} ({suggestion})")]
    Api {
        status: u16,
        code: String,
        message: String,
        suggestion: String,
    },
    /// 响应体无法解析。
    #[error("unexpected response (status {status})")]
    Decode { status: u16 },
}

impl CallError {
    /// 响应状态码；传输错误无状态码。
    pub(crate) fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(_) => None,
            Self::Api { status, .. } | Self::Decode { status } => Some(*status),
        }
    }
}

/// 将服务地址映射为 API base（`/v1/`）。
pub(crate) fn pairing_api_base(raw: &str) -> anyhow::Result<Url> {
    let mut parsed =
        Url::parse(raw.trim()).with_context(|| format!("invalid pairing url: {raw}"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("unsupported pairing scheme: {other}")),
    }
    parsed.set_query(None);
    parsed.set_fragment(None);
    let prefix = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&format!("{prefix}/v1/"));
    Ok(parsed)
}

/// 配对服务客户端。
#[derive(Debug, Clone)]
pub(crate) struct PairingClient {
    http: reqwest::Client,
    base: Url,
}

impl PairingClient {
    pub(crate) fn new(pairing_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: pairing_api_base(pairing_url)?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, CallError> {
        self.base
            .join(path)
            .map_err(|err| CallError::Transport(format!("build endpoint {path} failed: {err}")))
    }

    /// 注册设备并领取配对码。
    pub(crate) async fn register(&self) -> Result<RegisterData, CallError> {
        let url = self.endpoint("device/register")?;
        send(self.http.post(url).json(&RegisterRequest::default())).await
    }

    /// 尝试以配对码换取 token。
    pub(crate) async fn exchange(
        &self,
        device_id: &str,
        code: &str,
    ) -> Result<TokenData, CallError> {
        let url = self.endpoint("device/exchange")?;
        let req = ExchangeRequest {
            device_id: device_id.to_string(),
            code: code.to_string(),
        };
        send(self.http.post(url).json(&req)).await
    }

    /// 以当前 token 续期。
    pub(crate) async fn refresh(&self, token: &str) -> Result<TokenData, CallError> {
        let url = self.endpoint("device/refresh")?;
        send(self.http.post(url).bearer_auth(token)).await
    }

    /// 查询 token 对应的会话身份。
    pub(crate) async fn session(&self, token: &str) -> Result<SessionData, CallError> {
        let url = self.endpoint("device/session")?;
        send(self.http.get(url).bearer_auth(token)).await
    }
}

/// 发送请求并拆开统一响应包裹。
async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, CallError> {
    let resp = request
        .send()
        .await
        .map_err(|err| CallError::Transport(err.to_string()))?;
    let status = resp.status();
    let body = resp
        .bytes()
        .await
        .map_err(|err| CallError::Transport(err.to_string()))?;
    unwrap_envelope(status, &body)
}

fn unwrap_envelope<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, CallError> {
    let Ok(envelope) = serde_json::from_slice::<ApiEnvelope<T>>(body) else {
        return Err(CallError::Decode {
            status: status.as_u16(),
        });
    };
    match envelope.data {
        Some(data) if status.is_success() && envelope.ok => Ok(data),
        _ => Err(CallError::Api {
            status: status.as_u16(),
            code: envelope.code,
            message: envelope.message,
            suggestion: envelope.suggestion,
        }),
    }
}
