//! 凭证刷新：仅凭当前有效 bearer 续期，不需要其他会话凭证。

use axum::http::HeaderMap;
use st_shared_protocol::TokenData;
use tracing::info;

use crate::{
    api::error::{ApiError, token_error_to_api},
    state::AppState,
};

impl AppState {
    /// 以相同设备/用户 claims 签发新 token；旧 token 保持有效直至自身过期。
    pub(crate) async fn refresh_device_token(
        &self,
        headers: &HeaderMap,
    ) -> Result<TokenData, ApiError> {
        let current = self.validate_bearer(headers)?;
        let (token, claims) = self
            .codec
            .mint(
                &current.device_id,
                &current.user_id,
                self.config.token_ttl_sec,
            )
            .map_err(token_error_to_api)?;
        info!(
            "device token refreshed device_id={} previous_jti={}",
            claims.device_id, current.jti
        );
        Ok(TokenData {
            token,
            expires_at: claims.exp,
        })
    }
}
