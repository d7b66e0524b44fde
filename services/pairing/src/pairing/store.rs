//! 配对存储与状态机：`pending → linked → consumed`，过期后不可再用。
//!
//! 所有状态迁移都在同一把锁内完成“查找 + 校验 + 写入”，保证同一配对码上的
//! `link` 与 `exchange` 线性化，且每个已链接配对码最多成功换发一次。

use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    api::types::{DeviceRegistration, PairingError, RegistrationState},
    pairing::code::{new_device_id, new_linking_code, normalize_code},
};

/// 生成配对码的最大碰撞重试次数。
const MAX_CODE_ATTEMPTS: usize = 16;
/// 快照文件结构版本。
const SNAPSHOT_VERSION: u32 = 1;

/// 配对存储契约：仅允许通过状态机迁移函数修改记录。
pub(crate) trait PairingStore: Send + Sync {
    /// 新建 `pending` 记录，配对码与任一有效记录不重复。
    fn register(&self, now: u64, ttl_sec: u64) -> Result<DeviceRegistration, PairingError>;

    /// `pending → linked`，写入用户 ID。
    fn link(&self, code: &str, user_id: &str, now: u64) -> Result<(), PairingError>;

    /// `linked → consumed`，返回链接时写入的用户 ID。
    fn exchange(&self, device_id: &str, code: &str, now: u64) -> Result<String, PairingError>;

    /// 清理已过期或已消费的记录，返回清理数量。
    fn sweep(&self, now: u64) -> Result<usize, PairingError>;

    /// 当前记录数。
    fn len(&self) -> usize;
}

/// 快照文件结构。
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreSnapshot {
    version: u32,
    registrations: Vec<DeviceRegistration>,
}

/// 内存配对存储，可选 JSON 快照持久化。
pub(crate) struct MemoryPairingStore {
    /// 按归一化配对码索引。
    entries: Mutex<HashMap<String, DeviceRegistration>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryPairingStore {
    /// 纯内存存储。
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            snapshot_path: None,
        }
    }

    /// 带快照的存储：启动时加载，之后每次迁移落盘。
    pub(crate) fn with_snapshot(path: impl Into<PathBuf>) -> Result<Self, PairingError> {
        let path = path.into();
        let entries = load_snapshot(&path)?;
        info!(
            "pairing store loaded {} registrations from {}",
            entries.len(),
            path.display()
        );
        Ok(Self {
            entries: Mutex::new(entries),
            snapshot_path: Some(path),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DeviceRegistration>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, entries: &HashMap<String, DeviceRegistration>) -> Result<(), PairingError> {
        let Some(path) = self.snapshot_path.as_deref() else {
            return Ok(());
        };
        persist_snapshot(path, entries)
    }

    /// 单条记录迁移：落盘失败时回滚内存状态，避免调用方重试时状态已前移。
    fn commit_update(
        &self,
        entries: &mut HashMap<String, DeviceRegistration>,
        key: &str,
        previous: DeviceRegistration,
    ) -> Result<(), PairingError> {
        if let Err(err) = self.persist(entries) {
            entries.insert(key.to_string(), previous);
            return Err(err);
        }
        Ok(())
    }
}

impl Default for MemoryPairingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PairingStore for MemoryPairingStore {
    fn register(&self, now: u64, ttl_sec: u64) -> Result<DeviceRegistration, PairingError> {
        let mut entries = self.lock();

        let mut code = None;
        for _ in 0..MAX_CODE_ATTEMPTS {
            let candidate = new_linking_code();
            let taken = entries
                .get(&candidate)
                .is_some_and(|existing| existing.is_live(now));
            if !taken {
                code = Some(candidate);
                break;
            }
            debug!("linking code collision, regenerating");
        }
        let Some(code) = code else {
            return Err(PairingError::Store("linking code space exhausted".to_string()));
        };

        let registration = DeviceRegistration {
            device_id: new_device_id(),
            code: code.clone(),
            code_expires_at: now.saturating_add(ttl_sec),
            state: RegistrationState::Pending,
            user_id: None,
            created_at: now,
        };
        let replaced = entries.insert(code.clone(), registration.clone());
        if let Err(err) = self.persist(&entries) {
            match replaced {
                Some(previous) => entries.insert(code, previous),
                None => entries.remove(&code),
            };
            return Err(err);
        }
        Ok(registration)
    }

    fn link(&self, code: &str, user_id: &str, now: u64) -> Result<(), PairingError> {
        let key = normalize_code(code);
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(&key) else {
            return Err(PairingError::CodeNotFound);
        };
        if entry.state == RegistrationState::Consumed {
            return Err(PairingError::CodeNotFound);
        }
        if entry.is_expired(now) {
            return Err(PairingError::CodeExpired);
        }
        if entry.state != RegistrationState::Pending {
            return Err(PairingError::AlreadyLinked);
        }

        let previous = entry.clone();
        entry.state = RegistrationState::Linked;
        entry.user_id = Some(user_id.to_string());
        self.commit_update(&mut entries, &key, previous)
    }

    fn exchange(&self, device_id: &str, code: &str, now: u64) -> Result<String, PairingError> {
        let key = normalize_code(code);
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(&key) else {
            return Err(PairingError::CodeNotFound);
        };
        // 设备不匹配与不存在对外不可区分。
        if entry.device_id != device_id || entry.state == RegistrationState::Consumed {
            return Err(PairingError::CodeNotFound);
        }
        if entry.is_expired(now) {
            return Err(PairingError::CodeExpired);
        }
        if entry.state == RegistrationState::Pending {
            return Err(PairingError::NotReady);
        }
        let Some(user_id) = entry.user_id.clone() else {
            return Err(PairingError::Store("linked registration without user".to_string()));
        };

        let previous = entry.clone();
        entry.state = RegistrationState::Consumed;
        self.commit_update(&mut entries, &key, previous)?;
        Ok(user_id)
    }

    fn sweep(&self, now: u64) -> Result<usize, PairingError> {
        let mut entries = self.lock();
        let before = entries.len();
        let snapshot = entries.clone();
        entries.retain(|_, entry| entry.is_live(now));
        let removed = before - entries.len();
        if removed > 0
            && let Err(err) = self.persist(&entries)
        {
            *entries = snapshot;
            return Err(err);
        }
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// 加载快照；文件不存在视为空存储。
fn load_snapshot(path: &Path) -> Result<HashMap<String, DeviceRegistration>, PairingError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let raw = fs::read(path)
        .map_err(|err| PairingError::Store(format!("read pairing snapshot failed: {err}")))?;
    let snapshot: StoreSnapshot = serde_json::from_slice(&raw)
        .map_err(|err| PairingError::Store(format!("decode pairing snapshot failed: {err}")))?;
    Ok(snapshot
        .registrations
        .into_iter()
        .map(|entry| (normalize_code(&entry.code), entry))
        .collect())
}

/// 原子落盘：写临时文件并 fsync 后 rename。每次迁移整文件重写，适合低频配对场景。
fn persist_snapshot(
    path: &Path,
    entries: &HashMap<String, DeviceRegistration>,
) -> Result<(), PairingError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| PairingError::Store(format!("create snapshot dir failed: {err}")))?;
    }
    let snapshot = StoreSnapshot {
        version: SNAPSHOT_VERSION,
        registrations: entries.values().cloned().collect(),
    };
    let encoded = serde_json::to_vec_pretty(&snapshot)
        .map_err(|err| PairingError::Store(format!("encode pairing snapshot failed: {err}")))?;
    let tmp = path.with_extension("json.tmp");
    let write =
        |err: std::io::Error| PairingError::Store(format!("write pairing snapshot failed: {err}"));
    let mut file = fs::File::create(&tmp).map_err(write)?;
    file.write_all(&encoded).map_err(write)?;
    file.sync_all().map_err(write)?;
    drop(file);
    fs::rename(&tmp, path)
        .map_err(|err| PairingError::Store(format!("finalize pairing snapshot failed: {err}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{MemoryPairingStore, PairingStore};
    use crate::api::types::PairingError;

    const T0: u64 = 1_000;
    const TTL: u64 = 300;

    #[test]
    fn full_lifecycle_consumes_once() {
        let store = MemoryPairingStore::new();
        let reg = store.register(T0, TTL).unwrap();
        assert_eq!(reg.code_expires_at, T0 + TTL);
        assert_eq!(reg.created_at, T0);

        assert_eq!(
            store.exchange(&reg.device_id, &reg.code, T0 + 1),
            Err(PairingError::NotReady)
        );
        store.link(&reg.code, "u1", T0 + 2).unwrap();
        assert_eq!(store.link(&reg.code, "u2", T0 + 3), Err(PairingError::AlreadyLinked));

        let user = store.exchange(&reg.device_id, &reg.code, T0 + 4).unwrap();
        assert_eq!(user, "u1");
        assert_eq!(
            store.exchange(&reg.device_id, &reg.code, T0 + 5),
            Err(PairingError::CodeNotFound)
        );
        assert_eq!(store.link(&reg.code, "u1", T0 + 6), Err(PairingError::CodeNotFound));
    }

    #[test]
    fn device_mismatch_looks_like_missing_code() {
        let store = MemoryPairingStore::new();
        let reg = store.register(T0, TTL).unwrap();
        store.link(&reg.code, "u1", T0).unwrap();
        assert_eq!(
            store.exchange("dev_other", &reg.code, T0),
            Err(PairingError::CodeNotFound)
        );
        assert_eq!(
            store.exchange(&reg.device_id, "ZZZZZZ", T0),
            Err(PairingError::CodeNotFound)
        );
        // 失败尝试不影响合法设备。
        assert_eq!(store.exchange(&reg.device_id, &reg.code, T0).unwrap(), "u1");
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let store = MemoryPairingStore::new();
        let expires = T0 + TTL;

        let early = store.register(T0, TTL).unwrap();
        store.link(&early.code, "u1", expires - 1).unwrap();
        assert_eq!(store.exchange(&early.device_id, &early.code, expires - 1).unwrap(), "u1");

        let at = store.register(T0, TTL).unwrap();
        assert_eq!(store.link(&at.code, "u1", expires), Err(PairingError::CodeExpired));
        assert_eq!(store.link(&at.code, "u1", expires + 60), Err(PairingError::CodeExpired));

        let linked = store.register(T0, TTL).unwrap();
        store.link(&linked.code, "u1", T0).unwrap();
        assert_eq!(
            store.exchange(&linked.device_id, &linked.code, expires),
            Err(PairingError::CodeExpired)
        );
    }

    #[test]
    fn link_normalizes_case_and_whitespace() {
        let store = MemoryPairingStore::new();
        let reg = store.register(T0, TTL).unwrap();
        let messy = format!("  {}\n", reg.code.to_ascii_lowercase());
        store.link(&messy, "u1", T0).unwrap();
        let lower = reg.code.to_ascii_lowercase();
        assert_eq!(store.exchange(&reg.device_id, &lower, T0).unwrap(), "u1");
    }

    #[test]
    fn sweep_evicts_expired_and_consumed() {
        let store = MemoryPairingStore::new();
        let consumed = store.register(T0, TTL).unwrap();
        store.link(&consumed.code, "u1", T0).unwrap();
        store.exchange(&consumed.device_id, &consumed.code, T0).unwrap();
        let _stale = store.register(T0 - TTL, TTL).unwrap();
        let live = store.register(T0, TTL).unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.sweep(T0).unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.exchange(&live.device_id, &live.code, T0), Err(PairingError::NotReady));
        assert_eq!(
            store.link(&consumed.code, "u1", T0),
            Err(PairingError::CodeNotFound)
        );
    }

    #[test]
    fn snapshot_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairing.json");

        let reg = {
            let store = MemoryPairingStore::with_snapshot(&path).unwrap();
            let reg = store.register(T0, TTL).unwrap();
            store.link(&reg.code, "u1", T0).unwrap();
            reg
        };

        let reloaded = MemoryPairingStore::with_snapshot(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.exchange(&reg.device_id, &reg.code, T0).unwrap(), "u1");

        let again = MemoryPairingStore::with_snapshot(&path).unwrap();
        assert_eq!(
            again.exchange(&reg.device_id, &reg.code, T0),
            Err(PairingError::CodeNotFound)
        );
    }

    #[test]
    fn concurrent_exchanges_succeed_exactly_once() {
        let store = Arc::new(MemoryPairingStore::new());
        let reg = store.register(T0, TTL).unwrap();
        store.link(&reg.code, "u1", T0).unwrap();

        let handles = (0..50)
            .map(|_| {
                let store = Arc::clone(&store);
                let device_id = reg.device_id.clone();
                let code = reg.code.clone();
                std::thread::spawn(move || store.exchange(&device_id, &code, T0 + 1))
            })
            .collect::<Vec<_>>();

        let results = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>();
        let successes = results.iter().filter(|res| res.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(
            results
                .iter()
                .filter(|res| res.is_err())
                .all(|res| *res == Err(PairingError::CodeNotFound))
        );
    }

    #[test]
    fn link_racing_exchange_has_single_winner_order() {
        let store = Arc::new(MemoryPairingStore::new());
        let reg = store.register(T0, TTL).unwrap();

        let link_store = Arc::clone(&store);
        let code = reg.code.clone();
        let linker = std::thread::spawn(move || link_store.link(&code, "u1", T0));
        let exchange_store = Arc::clone(&store);
        let (device_id, code) = (reg.device_id.clone(), reg.code.clone());
        let exchanger = std::thread::spawn(move || exchange_store.exchange(&device_id, &code, T0));

        assert!(linker.join().unwrap().is_ok());
        match exchanger.join().unwrap() {
            // exchange 先于 link：仍需轮询，随后可成功一次。
            Err(PairingError::NotReady) => {
                assert_eq!(store.exchange(&reg.device_id, &reg.code, T0).unwrap(), "u1");
            }
            Ok(user) => assert_eq!(user, "u1"),
            other => panic!("unexpected exchange outcome: {other:?}"),
        }
        assert_eq!(
            store.exchange(&reg.device_id, &reg.code, T0),
            Err(PairingError::CodeNotFound)
        );
    }
}
