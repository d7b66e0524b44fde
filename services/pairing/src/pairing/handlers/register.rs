//! 设备注册：生成设备身份与配对码（无需鉴权）。

use st_shared_protocol::RegisterData;
use tracing::info;

use crate::{api::error::ApiError, auth::store::unix_now, state::AppState};

impl AppState {
    /// 注册设备，返回 `pending` 配对码。
    pub(crate) async fn register_device(&self, caller: &str) -> Result<RegisterData, ApiError> {
        self.limiter
            .check("register", caller, self.config.register_limit_per_min)
            .await?;

        let ttl_sec = self.config.code_ttl_sec;
        let registration = self
            .run_store(move |store| store.register(unix_now(), ttl_sec))
            .await
            .map_err(ApiError::store)?;
        info!(
            "device registered device_id={} expires_at={}",
            registration.device_id, registration.code_expires_at
        );

        Ok(RegisterData {
            device_id: registration.device_id,
            code: registration.code,
            expires_at: registration.code_expires_at,
            poll_interval_sec: self.config.poll_interval_sec,
        })
    }
}
