//! 配对服务应用装配：路由、CORS、后台清扫与监听。

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::{
    auth::{
        handlers::{device_refresh_handler, device_session_handler},
        store::resolve_signing_secret,
    },
    config::Config,
    pairing::{
        handlers::{device_exchange_handler, device_link_handler, device_register_handler},
        sweep::spawn_sweep_task,
    },
    state::AppState,
};

/// 装配全部 HTTP 路由。
pub(crate) fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/device/register", post(device_register_handler))
        .route("/v1/device/link", post(device_link_handler))
        .route("/v1/device/exchange", post(device_exchange_handler))
        .route("/v1/device/refresh", post(device_refresh_handler))
        .route("/v1/device/session", get(device_session_handler))
        .layer(cors)
        .with_state(state)
}

/// 服务入口：加载密钥与存储，启动清扫任务并监听。
pub(crate) async fn run(config: Config) -> anyhow::Result<()> {
    let secret = resolve_signing_secret(config.token_secret.as_deref(), &config.secret_path)?;
    let store = AppState::open_store(&config)?;
    let addr = config.addr.clone();
    let sweep_interval = config.sweep_interval;
    let state = AppState::new(config, store, secret);

    if state.identity.trusts_bare_header() {
        warn!(
            "dev mode: trusting `{}` header from any caller",
            state.identity.user_header()
        );
    } else if state.identity.is_unconfigured() {
        warn!(
            "PAIRING_UPSTREAM_SECRET not set; link requests will be rejected \
             (set PAIRING_DEV_TRUST_USER_HEADER=1 for local development)"
        );
    }
    let _sweeper = spawn_sweep_task(Arc::clone(&state.store), sweep_interval);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("pairing service listening on {addr}");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// 健康检查接口。
async fn healthz() -> &'static str {
    "ok"
}
