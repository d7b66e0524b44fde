//! 设备端配置：服务地址与凭证文件路径。

use std::path::{Path, PathBuf};

/// 默认配对服务地址。
pub(crate) const DEFAULT_PAIRING_URL: &str = "http://127.0.0.1:18090";

/// 设备端运行配置。
#[derive(Debug, Clone)]
pub(crate) struct DeviceConfig {
    /// 配对服务根地址。
    pub(crate) pairing_url: String,
    /// 凭证文件路径。
    pub(crate) token_path: PathBuf,
}

impl DeviceConfig {
    pub(crate) fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            pairing_url: text("ST_PAIRING_URL").unwrap_or_else(|| DEFAULT_PAIRING_URL.to_string()),
            token_path: text("ST_DEVICE_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| default_token_path(text("HOME").as_deref())),
        }
    }
}

/// `~/.config/slidetable/device/token.json`，无 HOME 时落在当前目录。
fn default_token_path(home: Option<&str>) -> PathBuf {
    let base = home.map(Path::new).unwrap_or_else(|| Path::new("."));
    base.join(".config")
        .join("slidetable")
        .join("device")
        .join("token.json")
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, path::PathBuf};

    use super::{DEFAULT_PAIRING_URL, DeviceConfig};

    fn config(pairs: &[(&str, &str)]) -> DeviceConfig {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        DeviceConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_resolve_under_home() {
        let cfg = config(&[("HOME", "/home/alice")]);
        assert_eq!(cfg.pairing_url, DEFAULT_PAIRING_URL);
        assert_eq!(
            cfg.token_path,
            PathBuf::from("/home/alice/.config/slidetable/device/token.json")
        );
    }

    #[test]
    fn explicit_values_win() {
        let cfg = config(&[
            ("HOME", "/home/alice"),
            ("ST_PAIRING_URL", " https://pair.example.com "),
            ("ST_DEVICE_TOKEN_PATH", "/tmp/token.json"),
        ]);
        assert_eq!(cfg.pairing_url, "https://pair.example.com");
        assert_eq!(cfg.token_path, PathBuf::from("/tmp/token.json"));
    }
}
