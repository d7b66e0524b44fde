//! API 响应包裹。

use axum::{Json, http::StatusCode};
use serde::Serialize;
use st_shared_protocol::{ApiEnvelope, CODE_OK};

use super::error::ApiError;

/// 构造成功响应。
pub(crate) fn ok_response<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
    suggestion: impl Into<String>,
    data: Option<T>,
) -> (StatusCode, Json<ApiEnvelope<T>>) {
    (
        status,
        Json(ApiEnvelope {
            ok: true,
            code: CODE_OK.to_string(),
            message: message.into(),
            suggestion: suggestion.into(),
            data,
        }),
    )
}

/// 将服务结果折叠为统一响应。
pub(crate) fn envelope_response<T: Serialize>(
    result: Result<T, ApiError>,
    message: &'static str,
    suggestion: &'static str,
) -> (StatusCode, Json<ApiEnvelope<T>>) {
    match result {
        Ok(data) => ok_response(StatusCode::OK, message, suggestion, Some(data)),
        Err(err) => err.into_response(),
    }
}
