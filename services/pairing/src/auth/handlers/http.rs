//! 鉴权 HTTP 路由处理函数。

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use st_shared_protocol::{ApiEnvelope, SessionData, TokenData};

use crate::{api::response::envelope_response, state::AppState};

/// 刷新接口：bearer 自证续期。
pub(crate) async fn device_refresh_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Json<ApiEnvelope<TokenData>>) {
    envelope_response(
        state.refresh_device_token(&headers).await,
        "凭证刷新成功",
        "请替换本地保存的凭证",
    )
}

/// 会话接口：受保护接口示例，返回 bearer 对应身份。
pub(crate) async fn device_session_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Json<ApiEnvelope<SessionData>>) {
    let result = state.validate_bearer(&headers).map(|claims| SessionData {
        device_id: claims.device_id,
        user_id: claims.user_id,
        issued_at: claims.iat,
        expires_at: claims.exp,
    });
    envelope_response(result, "凭证有效", "可以继续调用受保护接口")
}
