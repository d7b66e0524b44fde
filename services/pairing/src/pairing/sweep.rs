//! 过期配对记录后台清扫。

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, warn};

use crate::{auth::store::unix_now, pairing::store::PairingStore};

/// 启动周期清扫任务；token 校验不依赖被清扫的记录。
pub(crate) fn spawn_sweep_task(store: Arc<dyn PairingStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let target = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || target.sweep(unix_now())).await {
                Ok(Ok(0)) => {}
                Ok(Ok(removed)) => debug!("pairing sweep removed {removed} registrations"),
                Ok(Err(err)) => warn!("pairing sweep failed: {err}"),
                Err(err) => warn!("pairing sweep task failed: {err}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::spawn_sweep_task;
    use crate::{
        auth::store::unix_now,
        pairing::store::{MemoryPairingStore, PairingStore},
    };

    #[tokio::test]
    async fn background_sweep_evicts_expired_entries() {
        let store: Arc<dyn PairingStore> = Arc::new(MemoryPairingStore::new());
        store.register(unix_now() - 600, 300).unwrap();
        assert_eq!(store.len(), 1);

        let task = spawn_sweep_task(Arc::clone(&store), Duration::from_millis(10));
        for _ in 0..100 {
            if store.len() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();
        assert_eq!(store.len(), 0);
    }
}
