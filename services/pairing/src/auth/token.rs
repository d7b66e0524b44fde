//! Bearer token 编解码：`base64url(header).base64url(payload).base64url(hmac)`。

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::{
    api::types::{TokenClaims, TokenError, TokenHeader},
    auth::store::unix_now,
};

type HmacSha256 = Hmac<Sha256>;

/// token 签名算法标识。
const TOKEN_ALG: &str = "HS256";
/// token 类型标识。
const TOKEN_TYP: &str = "JWT";

/// 对称密钥 token 编解码器。
#[derive(Clone)]
pub(crate) struct TokenCodec {
    secret: Arc<str>,
}

impl TokenCodec {
    pub(crate) fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Arc::from(secret.into()),
        }
    }

    /// 以当前时间签发 token。
    pub(crate) fn mint(
        &self,
        device_id: &str,
        user_id: &str,
        ttl_sec: u64,
    ) -> Result<(String, TokenClaims), TokenError> {
        self.mint_at(device_id, user_id, ttl_sec, unix_now())
    }

    /// 以指定时间签发 token（`exp = now + ttl`）。
    pub(crate) fn mint_at(
        &self,
        device_id: &str,
        user_id: &str,
        ttl_sec: u64,
        now: u64,
    ) -> Result<(String, TokenClaims), TokenError> {
        let header = TokenHeader {
            alg: TOKEN_ALG.to_string(),
            typ: TOKEN_TYP.to_string(),
        };
        let claims = TokenClaims {
            device_id: device_id.to_string(),
            user_id: user_id.to_string(),
            iat: now,
            exp: now.saturating_add(ttl_sec),
            jti: Uuid::new_v4().simple().to_string(),
        };

        let header_raw =
            serde_json::to_vec(&header).map_err(|err| TokenError::Encode(err.to_string()))?;
        let payload_raw =
            serde_json::to_vec(&claims).map_err(|err| TokenError::Encode(err.to_string()))?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_raw),
            URL_SAFE_NO_PAD.encode(payload_raw)
        );

        let mut mac = self.mac().map_err(|_| TokenError::Encode("invalid key".to_string()))?;
        mac.update(signing_input.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok((format!("{signing_input}.{sig_b64}"), claims))
    }

    /// 以当前时间校验 token。
    pub(crate) fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// 校验 token：段数 → 签名（常量时间比较）→ claims → 过期。
    pub(crate) fn verify_at(&self, token: &str, now: u64) -> Result<TokenClaims, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().unwrap_or_default();
        let payload_b64 = parts.next().unwrap_or_default();
        let sig_b64 = parts.next().unwrap_or_default();
        if header_b64.is_empty()
            || payload_b64.is_empty()
            || sig_b64.is_empty()
            || parts.next().is_some()
        {
            return Err(TokenError::Malformed);
        }

        let sig = URL_SAFE_NO_PAD
            .decode(sig_b64.as_bytes())
            .map_err(|_| TokenError::BadSignature)?;
        let mut mac = self.mac().map_err(|_| TokenError::BadSignature)?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        // verify_slice 内部为常量时间比较。
        mac.verify_slice(&sig).map_err(|_| TokenError::BadSignature)?;

        let header_raw = URL_SAFE_NO_PAD
            .decode(header_b64.as_bytes())
            .map_err(|_| TokenError::InvalidToken)?;
        let header: TokenHeader =
            serde_json::from_slice(&header_raw).map_err(|_| TokenError::InvalidToken)?;
        if header.alg != TOKEN_ALG {
            return Err(TokenError::InvalidToken);
        }

        let payload_raw = URL_SAFE_NO_PAD
            .decode(payload_b64.as_bytes())
            .map_err(|_| TokenError::InvalidToken)?;
        let claims: TokenClaims =
            serde_json::from_slice(&payload_raw).map_err(|_| TokenError::InvalidToken)?;

        if claims.exp <= now {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256, hmac::digest::InvalidLength> {
        HmacSha256::new_from_slice(self.secret.as_bytes())
    }
}
