//! API 错误定义、领域错误映射与响应转换。

use axum::{Json, extract::rejection::JsonRejection, http::StatusCode};
use st_shared_protocol::{
    ApiEnvelope, CODE_CODE_EXPIRED, CODE_CODE_NOT_FOUND, CODE_EXPIRED, CODE_INTERNAL_ERROR,
    CODE_INVALID_TOKEN, CODE_MISSING_FIELDS, CODE_NOT_LINKED, CODE_NOT_READY, CODE_STORE_ERROR,
    CODE_UNAUTHENTICATED,
};
use tracing::{debug, error, warn};

use super::types::{IdentityError, PairingError, TokenError};

/// 接口错误。
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) code: &'static str,
    pub(crate) message: String,
    pub(crate) suggestion: &'static str,
}

impl ApiError {
    /// 构造统一 API 错误。
    pub(crate) fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        suggestion: &'static str,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            suggestion,
        }
    }

    /// 转换为统一响应体。
    pub(crate) fn into_response<T>(self) -> (StatusCode, Json<ApiEnvelope<T>>) {
        (
            self.status,
            Json(ApiEnvelope {
                ok: false,
                code: self.code.to_string(),
                message: self.message,
                suggestion: self.suggestion.to_string(),
                data: None,
            }),
        )
    }

    /// 存储异常（5xx，调用方退避重试）。
    pub(crate) fn store(err: impl std::fmt::Display) -> Self {
        error!("pairing store failed: {err}");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            CODE_STORE_ERROR,
            "存储暂不可用",
            "请稍后重试",
        )
    }
}

/// Link 失败映射：已链接与不存在合并，避免泄露他人配对状态。
pub(crate) fn link_error_to_api(err: PairingError) -> ApiError {
    match err {
        PairingError::CodeNotFound | PairingError::AlreadyLinked | PairingError::NotReady => {
            ApiError::new(
                StatusCode::NOT_FOUND,
                CODE_CODE_NOT_FOUND,
                "配对码无效",
                "请核对扩展上显示的配对码",
            )
        }
        PairingError::CodeExpired => ApiError::new(
            StatusCode::GONE,
            CODE_CODE_EXPIRED,
            "配对码已过期",
            "请在扩展中重新生成配对码",
        ),
        PairingError::Store(err) => ApiError::store(err),
    }
}

/// Exchange 失败映射：`not_ready` 为轮询信号。
pub(crate) fn exchange_error_to_api(err: PairingError) -> ApiError {
    match err {
        PairingError::NotReady => ApiError::new(
            too_early(),
            CODE_NOT_READY,
            "等待用户在网页端确认配对",
            "请按轮询间隔重试",
        ),
        PairingError::CodeNotFound | PairingError::AlreadyLinked => ApiError::new(
            StatusCode::NOT_FOUND,
            CODE_NOT_LINKED,
            "配对记录不可用",
            "请重新注册设备",
        ),
        PairingError::CodeExpired => ApiError::new(
            StatusCode::GONE,
            CODE_CODE_EXPIRED,
            "配对码已过期",
            "请重新注册设备",
        ),
        PairingError::Store(err) => ApiError::store(err),
    }
}

/// token 校验失败映射：完整性错误统一为 `invalid_token`。
pub(crate) fn token_error_to_api(err: TokenError) -> ApiError {
    match err {
        TokenError::Expired => ApiError::new(
            StatusCode::UNAUTHORIZED,
            CODE_EXPIRED,
            "凭证已过期",
            "请重新配对设备",
        ),
        TokenError::Malformed | TokenError::BadSignature | TokenError::InvalidToken => {
            debug!("bearer rejected: {err}");
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                CODE_INVALID_TOKEN,
                "凭证无效",
                "请重新配对设备",
            )
        }
        TokenError::Encode(err) => {
            error!("token encode failed: {err}");
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                CODE_INTERNAL_ERROR,
                "凭证签发失败",
                "请稍后重试",
            )
        }
    }
}

/// 身份校验失败映射。
pub(crate) fn identity_error_to_api(err: IdentityError) -> ApiError {
    if err == IdentityError::Unconfigured {
        warn!("link rejected: set PAIRING_UPSTREAM_SECRET or PAIRING_DEV_TRUST_USER_HEADER");
    } else {
        debug!("link caller rejected: {err}");
    }
    ApiError::new(
        StatusCode::UNAUTHORIZED,
        CODE_UNAUTHENTICATED,
        "未登录",
        "请先在网页端登录",
    )
}

/// 请求体无法解析（非 JSON、字段类型错误、缺少 content-type）统一按字段缺失处理。
pub(crate) fn json_rejection_to_api(rejection: JsonRejection) -> ApiError {
    debug!("request body rejected: {rejection}");
    ApiError::new(
        StatusCode::BAD_REQUEST,
        CODE_MISSING_FIELDS,
        "请求参数不完整或格式错误",
        "请以 JSON 提交必填字段",
    )
}

/// `425 Too Early`：轮询信号。
pub(crate) fn too_early() -> StatusCode {
    StatusCode::from_u16(425).unwrap_or(StatusCode::CONFLICT)
}
