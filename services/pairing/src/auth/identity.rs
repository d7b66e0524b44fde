//! Link 调用方身份：由上游身份提供方（鉴权代理）注入已验证的用户标识。

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::api::types::IdentityError;

/// 上游共享密钥请求头。
pub(crate) const UPSTREAM_SECRET_HEADER: &str = "x-upstream-secret";
/// 默认用户标识请求头。
pub(crate) const DEFAULT_USER_HEADER: &str = "x-authenticated-user";

/// 可信上游请求头身份解析器。
#[derive(Debug, Clone)]
pub(crate) struct UpstreamIdentity {
    user_header: String,
    upstream_secret: Option<String>,
    allow_bare_header: bool,
}

impl UpstreamIdentity {
    /// `allow_bare_header` 仅在未配置共享密钥时生效。
    pub(crate) fn new(
        user_header: impl Into<String>,
        upstream_secret: Option<String>,
        allow_bare_header: bool,
    ) -> Self {
        Self {
            user_header: user_header.into().to_ascii_lowercase(),
            upstream_secret: upstream_secret.filter(|secret| !secret.trim().is_empty()),
            allow_bare_header,
        }
    }

    /// 未配置共享密钥但显式开启开发模式：直接信任请求头。
    pub(crate) fn trusts_bare_header(&self) -> bool {
        self.upstream_secret.is_none() && self.allow_bare_header
    }

    /// 既无共享密钥也未开启开发模式：Link 一律拒绝。
    pub(crate) fn is_unconfigured(&self) -> bool {
        self.upstream_secret.is_none() && !self.allow_bare_header
    }

    pub(crate) fn user_header(&self) -> &str {
        &self.user_header
    }

    /// 解析已验证的用户 ID。
    pub(crate) fn resolve(&self, headers: &HeaderMap) -> Result<String, IdentityError> {
        match self.upstream_secret.as_deref() {
            Some(expected) => {
                let presented = header_text(headers, UPSTREAM_SECRET_HEADER).unwrap_or_default();
                if !constant_time_eq(expected, presented) {
                    return Err(IdentityError::UpstreamMismatch);
                }
            }
            None if !self.allow_bare_header => return Err(IdentityError::Unconfigured),
            None => {}
        }

        header_text(headers, &self.user_header)
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .map(ToString::to_string)
            .ok_or(IdentityError::MissingUser)
    }
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// 借助 HMAC 校验做常量时间字符串比较。
fn constant_time_eq(expected: &str, presented: &str) -> bool {
    type HmacSha256 = Hmac<Sha256>;
    let Ok(mut mac) = HmacSha256::new_from_slice(b"upstream-secret-compare") else {
        return false;
    };
    mac.update(expected.as_bytes());
    let expected_tag = mac.finalize().into_bytes();

    let Ok(mut mac) = HmacSha256::new_from_slice(b"upstream-secret-compare") else {
        return false;
    };
    mac.update(presented.as_bytes());
    mac.verify_slice(&expected_tag).is_ok()
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};

    use super::{UPSTREAM_SECRET_HEADER, UpstreamIdentity};
    use crate::api::types::IdentityError;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn default_identity_rejects_bare_header() {
        let identity = UpstreamIdentity::new("x-authenticated-user", None, false);
        assert!(identity.is_unconfigured());
        assert!(!identity.trusts_bare_header());
        assert_eq!(
            identity.resolve(&headers(&[("x-authenticated-user", "victim-admin")])),
            Err(IdentityError::Unconfigured)
        );
    }

    #[test]
    fn bare_header_is_trusted_in_dev_mode() {
        let identity = UpstreamIdentity::new("X-Authenticated-User", None, true);
        assert!(identity.trusts_bare_header());
        let user = identity
            .resolve(&headers(&[("x-authenticated-user", " u1 ")]))
            .unwrap();
        assert_eq!(user, "u1");
        assert_eq!(
            identity.resolve(&headers(&[("x-authenticated-user", "  ")])),
            Err(IdentityError::MissingUser)
        );
    }

    #[test]
    fn upstream_secret_is_enforced() {
        let identity =
            UpstreamIdentity::new("x-authenticated-user", Some("proxy-secret".to_string()), true);
        assert!(!identity.trusts_bare_header());
        assert_eq!(
            identity.resolve(&headers(&[("x-authenticated-user", "u1")])),
            Err(IdentityError::UpstreamMismatch)
        );
        assert_eq!(
            identity.resolve(&headers(&[
                ("x-authenticated-user", "u1"),
                (UPSTREAM_SECRET_HEADER, "wrong"),
            ])),
            Err(IdentityError::UpstreamMismatch)
        );
        assert_eq!(
            identity
                .resolve(&headers(&[
                    ("x-authenticated-user", "u1"),
                    (UPSTREAM_SECRET_HEADER, "proxy-secret"),
                ]))
                .unwrap(),
            "u1"
        );
    }
}
