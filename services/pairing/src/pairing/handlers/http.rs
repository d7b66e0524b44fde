//! 配对 HTTP 路由处理函数。

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use st_shared_protocol::{
    ApiEnvelope, ExchangeRequest, LinkData, LinkRequest, RegisterData, TokenData,
};

use crate::{
    api::{error::json_rejection_to_api, response::envelope_response},
    ratelimit::CallerAddr,
    state::AppState,
};

/// 注册接口：扩展首次启动或配对失效后调用。
pub(crate) async fn device_register_handler(
    State(state): State<AppState>,
    CallerAddr(caller): CallerAddr,
) -> (StatusCode, Json<ApiEnvelope<RegisterData>>) {
    envelope_response(
        state.register_device(&caller).await,
        "配对码已生成",
        "请在网页端输入配对码",
    )
}

/// 链接接口：网页端登录用户确认配对码。
pub(crate) async fn device_link_handler(
    State(state): State<AppState>,
    CallerAddr(caller): CallerAddr,
    headers: HeaderMap,
    payload: Result<Json<LinkRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiEnvelope<LinkData>>) {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => return json_rejection_to_api(rejection).into_response(),
    };
    envelope_response(
        state.link_device(&headers, &caller, &req).await,
        "设备已链接",
        "扩展将自动完成登录",
    )
}

/// 换发接口：扩展轮询直至拿到 token。
pub(crate) async fn device_exchange_handler(
    State(state): State<AppState>,
    CallerAddr(caller): CallerAddr,
    payload: Result<Json<ExchangeRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiEnvelope<TokenData>>) {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => return json_rejection_to_api(rejection).into_response(),
    };
    envelope_response(
        state.exchange_device_token(&caller, &req).await,
        "设备凭证已签发",
        "后续请求携带 Authorization: Bearer",
    )
}
