//! 网页端链接：已登录用户认领扩展上显示的配对码。

use axum::http::{HeaderMap, StatusCode};
use st_shared_protocol::{CODE_MISSING_FIELDS, LinkData, LinkRequest};
use tracing::info;

use crate::{
    api::error::{ApiError, identity_error_to_api, link_error_to_api},
    auth::store::unix_now,
    pairing::code::normalize_code,
    state::AppState,
};

impl AppState {
    /// 将 `pending` 配对码链接到当前登录用户。
    pub(crate) async fn link_device(
        &self,
        headers: &HeaderMap,
        caller: &str,
        req: &LinkRequest,
    ) -> Result<LinkData, ApiError> {
        let user_id = self
            .identity
            .resolve(headers)
            .map_err(identity_error_to_api)?;
        self.limiter
            .check("link", caller, self.config.rate_limit_per_min)
            .await?;

        let code = normalize_code(&req.code);
        if code.is_empty() {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                CODE_MISSING_FIELDS,
                "缺少配对码",
                "请输入扩展上显示的配对码",
            ));
        }

        let linked_user = user_id.clone();
        self.run_store(move |store| store.link(&code, &linked_user, unix_now()))
            .await
            .map_err(link_error_to_api)?;
        info!("device code linked user_id={user_id}");
        Ok(LinkData { ok: true })
    }
}
