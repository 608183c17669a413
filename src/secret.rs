//! 加密存储的敏感配置值（SMTP 密码、webhook token 等）
//!
//! `Secret` 只保存密文，明文只能通过 `reveal` 拿到；密钥由调用方显式传入。
//!
//! 格式：`enc:` + hex(nonce[12] || ciphertext || tag[16])，AES-256-GCM。
//! 密钥由 blake3 `derive_key` 从密钥材料派生。

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const PREFIX: &str = "enc:";
const KDF_CONTEXT: &str = "ups-monitor secret encryption v2";

#[derive(Debug, Error, PartialEq)]
pub enum SecretError {
    #[error("secret is not in enc:<hex> form")]
    Format,
    #[error("secret authentication failed (wrong key or corrupted value)")]
    Authentication,
    #[error("secret plaintext is not valid UTF-8")]
    Encoding,
    #[error("no secret key configured (set UPSM_SECRET_KEY)")]
    MissingKey,
    #[error("encryption failed: {0}")]
    Crypto(&'static str),
}

/// 由密钥材料派生出的 AES-256-GCM 密钥
#[derive(Clone)]
pub struct SecretKey {
    bytes: [u8; 32],
}

impl SecretKey {
    /// 使用 blake3 `derive_key` 派生
    pub fn derive(material: &str) -> Self {
        Self {
            bytes: blake3::derive_key(KDF_CONTEXT, material.as_bytes()),
        }
    }

    fn aead_key(&self) -> Result<LessSafeKey, SecretError> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.bytes).map_err(|_| SecretError::Crypto("invalid key"))?;
        Ok(LessSafeKey::new(unbound))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(***)")
    }
}

fn min_sealed_len() -> usize {
    NONCE_LEN + AES_256_GCM.tag_len()
}

/// 加密后的敏感值
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Secret {
    sealed: Vec<u8>,
}

impl Secret {
    /// 加密明文，每次使用新的随机 nonce
    pub fn conceal(plaintext: &str, key: &SecretKey) -> Result<Self, SecretError> {
        let aead_key = key.aead_key()?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce_bytes)
            .map_err(|_| SecretError::Crypto("failed to generate nonce"))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        aead_key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| SecretError::Crypto("seal failed"))?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend_from_slice(&in_out);
        Ok(Self { sealed })
    }

    /// 解密，密钥错误或数据被篡改时失败
    pub fn reveal(&self, key: &SecretKey) -> Result<String, SecretError> {
        if self.sealed.len() < min_sealed_len() {
            return Err(SecretError::Format);
        }
        let (nonce_bytes, ciphertext) = self.sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| SecretError::Format)?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = key
            .aead_key()?
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| SecretError::Authentication)?;
        String::from_utf8(plaintext.to_vec()).map_err(|_| SecretError::Encoding)
    }

    /// 可写入配置文件的形式
    pub fn encoded(&self) -> String {
        format!("{}{}", PREFIX, hex::encode(&self.sealed))
    }
}

impl TryFrom<String> for Secret {
    type Error = SecretError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let body = value.strip_prefix(PREFIX).ok_or(SecretError::Format)?;
        let sealed = hex::decode(body).map_err(|_| SecretError::Format)?;
        if sealed.len() < min_sealed_len() {
            return Err(SecretError::Format);
        }
        Ok(Self { sealed })
    }
}

impl From<Secret> for String {
    fn from(secret: Secret) -> Self {
        secret.encoded()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// 需要 key 时的便捷函数
pub fn reveal_optional(
    secret: Option<&Secret>,
    key: Option<&SecretKey>,
) -> Result<Option<String>, SecretError> {
    match secret {
        None => Ok(None),
        Some(secret) => {
            let key = key.ok_or(SecretError::MissingKey)?;
            secret.reveal(key).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conceal_reveal() {
        let key = SecretKey::derive("correct horse battery staple");
        let secret = Secret::conceal("smtp-password", &key).unwrap();
        assert_eq!(secret.reveal(&key).unwrap(), "smtp-password");
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let key = SecretKey::derive("one");
        let other = SecretKey::derive("two");
        let secret = Secret::conceal("token", &key).unwrap();
        assert_eq!(secret.reveal(&other), Err(SecretError::Authentication));
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected() {
        let key = SecretKey::derive("k");
        let mut secret = Secret::conceal("smtp-password", &key).unwrap();
        let last = secret.sealed.len() - 1;
        secret.sealed[last] ^= 0x01;
        assert_eq!(secret.reveal(&key), Err(SecretError::Authentication));
    }

    #[test]
    fn test_each_conceal_uses_fresh_nonce() {
        let key = SecretKey::derive("k");
        let a = Secret::conceal("same", &key).unwrap();
        let b = Secret::conceal("same", &key).unwrap();
        assert_ne!(a.encoded(), b.encoded());
        // 12 字节 nonce + 4 字节明文 + 16 字节 tag
        assert_eq!(a.sealed.len(), 12 + 4 + 16);
    }

    #[test]
    fn test_encoded_form_parses_back() {
        let key = SecretKey::derive("k");
        let secret = Secret::conceal("hello", &key).unwrap();
        let encoded = secret.encoded();
        assert!(encoded.starts_with("enc:"));

        let json = serde_json::to_string(&secret).unwrap();
        let parsed: Secret = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.reveal(&key).unwrap(), "hello");
    }

    #[test]
    fn test_plaintext_is_rejected_by_deserializer() {
        let result: Result<Secret, _> = serde_json::from_str("\"plain-password\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_does_not_leak() {
        let key = SecretKey::derive("k");
        let secret = Secret::conceal("hunter2", &key).unwrap();
        assert_eq!(format!("{:?}", secret), "Secret(***)");
        assert_eq!(format!("{:?}", key), "SecretKey(***)");
    }

    #[test]
    fn test_reveal_optional_requires_key() {
        let key = SecretKey::derive("k");
        let secret = Secret::conceal("x", &key).unwrap();
        assert_eq!(reveal_optional(None, None), Ok(None));
        assert_eq!(reveal_optional(Some(&secret), None), Err(SecretError::MissingKey));
        assert_eq!(
            reveal_optional(Some(&secret), Some(&key)),
            Ok(Some("x".to_string()))
        );
    }
}
