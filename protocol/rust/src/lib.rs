// 文件职责：
// 1) 定义配对服务与设备端（扩展）共用的 HTTP 协议数据结构。
// 2) 固定失败码字符串，保证服务端映射与设备端轮询判定一致。
// 3) 作为 Rust 侧协议唯一代码源，供 pairing 服务与 device 客户端复用。

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// 成功响应码。
pub const CODE_OK: &str = "OK";
/// 请求字段缺失。
pub const CODE_MISSING_FIELDS: &str = "missing_fields";
/// 调用方未通过身份校验（Link）。
pub const CODE_UNAUTHENTICATED: &str = "unauthenticated";
/// Link：配对码不存在或不可用。
pub const CODE_CODE_NOT_FOUND: &str = "code_not_found";
/// 配对码已过期。
pub const CODE_CODE_EXPIRED: &str = "code_expired";
/// Exchange：配对码未链接、已消费或设备不匹配。
pub const CODE_NOT_LINKED: &str = "not_linked";
/// Exchange：仍在等待用户链接，继续轮询。
pub const CODE_NOT_READY: &str = "not_ready";
/// 缺少 bearer token。
pub const CODE_MISSING_TOKEN: &str = "missing_token";
/// bearer token 无效（格式/签名/claims）。
pub const CODE_INVALID_TOKEN: &str = "invalid_token";
/// bearer token 已过期。
pub const CODE_EXPIRED: &str = "expired";
/// 触发限流。
pub const CODE_RATE_LIMITED: &str = "rate_limited";
/// 存储异常。
pub const CODE_STORE_ERROR: &str = "store_error";
/// 其他服务端内部错误。
pub const CODE_INTERNAL_ERROR: &str = "internal_error";

/// 通用 API 成功/失败包裹结构。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    pub ok: bool,
    pub code: String,
    pub message: String,
    pub suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// 注册请求（当前无字段，保留对象形态便于扩展）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {}

/// 注册返回：设备身份、配对码与轮询建议。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterData {
    pub device_id: String,
    pub code: String,
    /// 配对码过期时间（unix 秒）。
    pub expires_at: u64,
    /// 建议的 exchange 轮询间隔（秒）。
    pub poll_interval_sec: u64,
}

/// 链接请求（调用方身份由上游注入）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequest {
    #[serde(default)]
    pub code: String,
}

/// 链接返回。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkData {
    pub ok: bool,
}

/// 换发请求。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub code: String,
}

/// 换发/刷新返回的 bearer token。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub token: String,
    /// token 过期时间（unix 秒）。
    pub expires_at: u64,
}

/// 当前 bearer 对应的设备会话。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub device_id: String,
    pub user_id: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

/// 生成纳秒精度 UTC 时间戳（RFC3339）。
pub fn now_rfc3339_nanos() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

#[cfg(test)]
mod tests {
    use super::{ApiEnvelope, RegisterData, TokenData};

    #[test]
    fn envelope_uses_camel_case_and_skips_empty_data() {
        let envelope: ApiEnvelope<TokenData> = ApiEnvelope {
            ok: false,
            code: "not_ready".to_string(),
            message: "waiting".to_string(),
            suggestion: "poll".to_string(),
            data: None,
        };
        let raw = serde_json::to_value(&envelope).unwrap();
        assert_eq!(raw["ok"], false);
        assert!(raw.get("data").is_none());

        let decoded: ApiEnvelope<TokenData> =
            serde_json::from_str(r#"{"ok":false,"code":"x","message":"m","suggestion":"s"}"#)
                .unwrap();
        assert!(decoded.data.is_none());
    }

    #[test]
    fn register_data_serializes_wire_names() {
        let data = RegisterData {
            device_id: "dev_1".to_string(),
            code: "AB12CD".to_string(),
            expires_at: 10,
            poll_interval_sec: 3,
        };
        let raw = serde_json::to_value(&data).unwrap();
        assert_eq!(raw["deviceId"], "dev_1");
        assert_eq!(raw["expiresAt"], 10);
        assert_eq!(raw["pollIntervalSec"], 3);
    }
}
