//! 签名密钥读写与时间辅助。

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};

use crate::api::types::MIN_SECRET_LEN;

/// 当前 unix 秒。
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// 签名密钥文件默认路径。
pub(crate) fn default_secret_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".config")
        .join("slidetable")
        .join("pairing")
        .join("signing-key")
}

/// 解析签名密钥：优先显式配置，否则读取或生成持久化密钥。
pub(crate) fn resolve_signing_secret(explicit: Option<&str>, path: &Path) -> anyhow::Result<String> {
    if let Some(secret) = explicit {
        let secret = secret.trim();
        if secret.len() < MIN_SECRET_LEN {
            bail!("token secret must be at least {MIN_SECRET_LEN} bytes");
        }
        return Ok(secret.to_string());
    }
    load_or_create_secret(path)
}

/// 读取密钥文件；不存在时生成并以 0600 新建。已存在但过短视为配置错误，不覆盖。
fn load_or_create_secret(path: &Path) -> anyhow::Result<String> {
    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read signing key: {}", path.display()))?;
        let trimmed = raw.trim();
        if trimmed.len() < MIN_SECRET_LEN {
            bail!(
                "signing key {} is shorter than {MIN_SECRET_LEN} bytes; fix or remove it",
                path.display()
            );
        }
        return Ok(trimmed.to_string());
    }

    let secret = generate_signing_secret();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create signing key dir: {}", parent.display()))?;
    }
    let mut file = create_private_file(path)
        .with_context(|| format!("create signing key: {}", path.display()))?;
    file.write_all(secret.as_bytes())
        .and_then(|()| file.sync_all())
        .with_context(|| format!("write signing key: {}", path.display()))?;
    Ok(secret)
}

/// 生成 256 bit 随机签名密钥。
pub(crate) fn generate_signing_secret() -> String {
    format!(
        "st_sk_{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// 新建仅属主可读写的文件；已存在则失败。
#[cfg(unix)]
fn create_private_file(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private_file(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
}
