//! 配置模块职责：
//! 1. 读取配对服务运行所需的环境变量，并提供默认值。
//! 2. 解析 TTL、限流与存储路径等类型化配置。

use std::{path::PathBuf, time::Duration};

use crate::{
    api::types::{
        DEFAULT_CODE_TTL_SEC, DEFAULT_POLL_INTERVAL_SEC, DEFAULT_SWEEP_INTERVAL_SEC,
        DEFAULT_TOKEN_TTL_SEC,
    },
    auth::{identity::DEFAULT_USER_HEADER, store::default_secret_path},
};

/// 默认监听地址。
pub(crate) const DEFAULT_ADDR: &str = "0.0.0.0:18090";
/// 注册接口默认每分钟配额。
const DEFAULT_REGISTER_PER_MIN: u32 = 10;
/// 链接/换发接口默认每分钟配额（需覆盖 3 秒一次的轮询）。
const DEFAULT_RATE_PER_MIN: u32 = 60;

/// 配对服务运行时配置。
#[derive(Debug, Clone)]
pub(crate) struct Config {
    /// HTTP 监听地址。
    pub(crate) addr: String,
    /// 配对码有效期（秒）。
    pub(crate) code_ttl_sec: u64,
    /// bearer token 有效期（秒）。
    pub(crate) token_ttl_sec: u64,
    /// 建议的 exchange 轮询间隔（秒）。
    pub(crate) poll_interval_sec: u64,
    /// 过期记录清扫周期。
    pub(crate) sweep_interval: Duration,
    /// 注册接口每分钟配额（0 表示不限）。
    pub(crate) register_limit_per_min: u32,
    /// 链接/换发接口每分钟配额（0 表示不限）。
    pub(crate) rate_limit_per_min: u32,
    /// 配对记录快照路径；未设置时仅内存。
    pub(crate) store_path: Option<PathBuf>,
    /// 显式 token 签名密钥。
    pub(crate) token_secret: Option<String>,
    /// 自动生成密钥的落盘路径。
    pub(crate) secret_path: PathBuf,
    /// 上游注入用户 ID 的请求头。
    pub(crate) user_header: String,
    /// 上游共享密钥。
    pub(crate) upstream_secret: Option<String>,
    /// 本地开发：未配置共享密钥时仍信任用户请求头。
    pub(crate) dev_trust_user_header: bool,
    /// 部署在反向代理之后：限流按代理追加的 `x-forwarded-for` 末项识别调用方。
    pub(crate) trust_forwarded: bool,
}

impl Config {
    /// 从进程环境变量构建配置。
    pub(crate) fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源构建配置。
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let positive = |key: &str, fallback: u64| {
            text(key)
                .and_then(|raw| raw.parse::<u64>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(fallback)
        };
        let flag = |key: &str| {
            text(key).is_some_and(|raw| {
                matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
            })
        };
        let quota = |key: &str, fallback: u32| {
            text(key)
                .and_then(|raw| raw.parse::<u32>().ok())
                .unwrap_or(fallback)
        };

        Self {
            addr: text("PAIRING_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            code_ttl_sec: positive("PAIRING_CODE_TTL_SEC", DEFAULT_CODE_TTL_SEC),
            token_ttl_sec: positive("PAIRING_TOKEN_TTL_SEC", DEFAULT_TOKEN_TTL_SEC),
            poll_interval_sec: positive("PAIRING_POLL_INTERVAL_SEC", DEFAULT_POLL_INTERVAL_SEC),
            sweep_interval: Duration::from_secs(positive(
                "PAIRING_SWEEP_INTERVAL_SEC",
                DEFAULT_SWEEP_INTERVAL_SEC,
            )),
            register_limit_per_min: quota("PAIRING_RATE_REGISTER_PER_MIN", DEFAULT_REGISTER_PER_MIN),
            rate_limit_per_min: quota("PAIRING_RATE_PER_MIN", DEFAULT_RATE_PER_MIN),
            store_path: text("PAIRING_STORE_PATH").map(PathBuf::from),
            token_secret: text("PAIRING_TOKEN_SECRET"),
            secret_path: text("PAIRING_SECRET_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_secret_path),
            user_header: text("PAIRING_USER_HEADER")
                .unwrap_or_else(|| DEFAULT_USER_HEADER.to_string()),
            upstream_secret: text("PAIRING_UPSTREAM_SECRET"),
            dev_trust_user_header: flag("PAIRING_DEV_TRUST_USER_HEADER"),
            trust_forwarded: flag("PAIRING_TRUST_FORWARDED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use super::{Config, DEFAULT_ADDR};

    fn config(pairs: &[(&str, &str)]) -> Config {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_follow_protocol_constants() {
        let cfg = config(&[]);
        assert_eq!(cfg.addr, DEFAULT_ADDR);
        assert_eq!(cfg.code_ttl_sec, 300);
        assert_eq!(cfg.token_ttl_sec, 3600);
        assert_eq!(cfg.poll_interval_sec, 3);
        assert_eq!(cfg.sweep_interval, Duration::from_secs(60));
        assert!(cfg.store_path.is_none());
        assert!(cfg.token_secret.is_none());
        assert_eq!(cfg.user_header, "x-authenticated-user");
        assert!(!cfg.dev_trust_user_header);
        assert!(!cfg.trust_forwarded);
    }

    #[test]
    fn opt_in_flags_accept_common_truthy_values() {
        let cfg = config(&[
            ("PAIRING_DEV_TRUST_USER_HEADER", "TRUE"),
            ("PAIRING_TRUST_FORWARDED", "1"),
        ]);
        assert!(cfg.dev_trust_user_header);
        assert!(cfg.trust_forwarded);

        let cfg = config(&[
            ("PAIRING_DEV_TRUST_USER_HEADER", "no"),
            ("PAIRING_TRUST_FORWARDED", "maybe"),
        ]);
        assert!(!cfg.dev_trust_user_header);
        assert!(!cfg.trust_forwarded);
    }

    #[test]
    fn invalid_values_fall_back_and_zero_quota_disables() {
        let cfg = config(&[
            ("PAIRING_CODE_TTL_SEC", "0"),
            ("PAIRING_TOKEN_TTL_SEC", "abc"),
            ("PAIRING_RATE_PER_MIN", "0"),
            ("PAIRING_STORE_PATH", "  "),
            ("PAIRING_UPSTREAM_SECRET", " proxy "),
        ]);
        assert_eq!(cfg.code_ttl_sec, 300);
        assert_eq!(cfg.token_ttl_sec, 3600);
        assert_eq!(cfg.rate_limit_per_min, 0);
        assert!(cfg.store_path.is_none());
        assert_eq!(cfg.upstream_secret.as_deref(), Some("proxy"));
    }
}
