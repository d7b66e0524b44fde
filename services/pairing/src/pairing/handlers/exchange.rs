//! 设备换发：已链接配对码一次性换取 bearer token（无需鉴权）。

use axum::http::StatusCode;
use st_shared_protocol::{CODE_MISSING_FIELDS, ExchangeRequest, TokenData};
use tracing::info;

use crate::{
    api::error::{ApiError, exchange_error_to_api, token_error_to_api},
    auth::store::unix_now,
    pairing::code::normalize_code,
    state::AppState,
};

impl AppState {
    /// 消费配对码并签发 token；`not_ready` 时设备继续轮询。
    pub(crate) async fn exchange_device_token(
        &self,
        caller: &str,
        req: &ExchangeRequest,
    ) -> Result<TokenData, ApiError> {
        self.limiter
            .check("exchange", caller, self.config.rate_limit_per_min)
            .await?;

        let device_id = req.device_id.trim();
        let code = normalize_code(&req.code);
        if device_id.is_empty() || code.is_empty() {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                CODE_MISSING_FIELDS,
                "换发参数不完整",
                "请重新注册设备",
            ));
        }

        let owned_device = device_id.to_string();
        let user_id = self
            .run_store(move |store| store.exchange(&owned_device, &code, unix_now()))
            .await
            .map_err(exchange_error_to_api)?;
        let (token, claims) = self
            .codec
            .mint(device_id, &user_id, self.config.token_ttl_sec)
            .map_err(token_error_to_api)?;
        info!("device token issued device_id={device_id} user_id={user_id}");

        Ok(TokenData {
            token,
            expires_at: claims.exp,
        })
    }
}
