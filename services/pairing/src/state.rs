//! 服务共享状态：配对存储、token 编解码器、身份解析与限流。

use std::sync::Arc;

use crate::{
    api::types::PairingError,
    auth::{identity::UpstreamIdentity, token::TokenCodec},
    config::Config,
    pairing::store::{MemoryPairingStore, PairingStore},
    ratelimit::RateLimiter,
};

/// 配对服务共享状态。
#[derive(Clone)]
pub(crate) struct AppState {
    /// 配对记录存储（唯一共享可变资源）。
    pub(crate) store: Arc<dyn PairingStore>,
    /// bearer token 编解码器。
    pub(crate) codec: TokenCodec,
    /// Link 调用方身份解析。
    pub(crate) identity: UpstreamIdentity,
    /// 调用方限流。
    pub(crate) limiter: RateLimiter,
    /// 运行配置。
    pub(crate) config: Arc<Config>,
}

impl AppState {
    pub(crate) fn new(config: Config, store: Arc<dyn PairingStore>, secret: String) -> Self {
        Self {
            store,
            codec: TokenCodec::new(secret),
            identity: UpstreamIdentity::new(
                config.user_header.clone(),
                config.upstream_secret.clone(),
                config.dev_trust_user_header,
            ),
            limiter: RateLimiter::default(),
            config: Arc::new(config),
        }
    }

    /// 执行一次存储操作；开启快照时整文件重写为阻塞 IO，移交 blocking 线程池。
    pub(crate) async fn run_store<T, F>(&self, op: F) -> Result<T, PairingError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn PairingStore) -> Result<T, PairingError> + Send + 'static,
    {
        if self.config.store_path.is_none() {
            return op(self.store.as_ref());
        }
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|err| PairingError::Store(format!("store task failed: {err}")))?
    }

    /// 按配置打开存储：设置快照路径时从文件恢复。
    pub(crate) fn open_store(config: &Config) -> anyhow::Result<Arc<dyn PairingStore>> {
        let store = match config.store_path.as_ref() {
            Some(path) => MemoryPairingStore::with_snapshot(path)
                .map_err(|err| anyhow::anyhow!("open pairing store failed: {err}"))?,
            None => MemoryPairingStore::new(),
        };
        Ok(Arc::new(store))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::snapshot_test_state;
    use crate::auth::store::unix_now;

    #[tokio::test]
    async fn snapshot_backed_state_round_trips_through_blocking_pool() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairing.json");
        let state = snapshot_test_state(&path);

        let registration = state.register_device("tester").await.unwrap();
        assert!(path.exists());
        let code = registration.code.clone();
        state
            .run_store(move |store| store.link(&code, "user-3", unix_now()))
            .await
            .unwrap();

        let reopened = snapshot_test_state(&path);
        assert_eq!(reopened.store.len(), 1);
        let user = reopened
            .run_store(move |store| {
                store.exchange(&registration.device_id, &registration.code, unix_now())
            })
            .await
            .unwrap();
        assert_eq!(user, "user-3");
    }
}
