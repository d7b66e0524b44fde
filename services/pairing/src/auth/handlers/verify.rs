//! Bearer 校验：签名 + 过期是唯一判定依据，不查询配对存储。

use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use st_shared_protocol::CODE_MISSING_TOKEN;

use crate::{
    api::{
        error::{ApiError, token_error_to_api},
        types::TokenClaims,
    },
    state::AppState,
};

/// 提取 `Authorization: Bearer <token>`。
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

impl AppState {
    /// 校验请求携带的 bearer 并解析设备/用户身份。
    pub(crate) fn validate_bearer(&self, headers: &HeaderMap) -> Result<TokenClaims, ApiError> {
        let Some(token) = bearer_token(headers) else {
            return Err(ApiError::new(
                StatusCode::UNAUTHORIZED,
                CODE_MISSING_TOKEN,
                "缺少设备凭证",
                "请先完成设备配对",
            ));
        };
        self.codec.verify(token).map_err(token_error_to_api)
    }
}
