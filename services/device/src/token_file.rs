//! 设备凭证本地持久化（JSON，原子替换写入）。

use std::{fs, io::ErrorKind, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 本地保存的设备凭证。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredToken {
    pub(crate) device_id: String,
    pub(crate) token: String,
    /// token 过期时间（unix 秒）。
    pub(crate) expires_at: u64,
    /// 最近一次写入时间（RFC3339）。
    pub(crate) saved_at: String,
}

impl StoredToken {
    pub(crate) fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// 读取凭证；文件不存在返回 `None`。
pub(crate) fn load(path: &Path) -> Result<Option<StoredToken>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("read token file: {}", path.display()));
        }
    };
    let stored = serde_json::from_str(&raw)
        .with_context(|| format!("decode token file: {}", path.display()))?;
    Ok(Some(stored))
}

/// 写入凭证：先写临时文件再 rename。
pub(crate) fn save(path: &Path, stored: &StoredToken) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create token dir: {}", parent.display()))?;
    }
    let body = serde_json::to_vec_pretty(stored).context("encode token file")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body).with_context(|| format!("write token file: {}", tmp.display()))?;
    restrict_permissions(&tmp)?;
    fs::rename(&tmp, path)
        .with_context(|| format!("finalize token file: {}", path.display()))?;
    Ok(())
}

/// 删除本地凭证；不存在视为成功。
pub(crate) fn remove(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("remove token file: {}", path.display())),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("chmod token file: {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{StoredToken, load, remove, save};

    fn sample() -> StoredToken {
        StoredToken {
            device_id: "dev_1".to_string(),
            token: "a.b.c".to_string(),
            expires_at: 1_000,
            saved_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("token.json")).unwrap().is_none());
        assert!(!remove(&dir.path().join("token.json")).unwrap());
    }

    #[test]
    fn saved_token_is_replaced_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");
        save(&path, &sample()).unwrap();

        let mut next = sample();
        next.token = "d.e.f".to_string();
        save(&path, &next).unwrap();

        assert_eq!(load(&path).unwrap(), Some(next));
        assert!(!path.with_extension("json.tmp").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
        assert!(remove(&path).unwrap());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn expiry_is_exclusive() {
        let token = sample();
        assert!(!token.is_expired(999));
        assert!(token.is_expired(1_000));
    }
}
