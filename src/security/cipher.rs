//! AEAD 봉인/개봉
//!
//! 봉인 포맷 (combined):
//! - nonce: 24 bytes (XChaCha20-Poly1305)
//! - ciphertext: 평문과 같은 길이
//! - tag: 16 bytes (Poly1305)
//!
//! 호출자는 이 바이트열을 하나의 불투명한 단위로 다룹니다.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::security::random::{RandomError, SecureRandom};

/// 대칭키 길이 (256-bit)
pub const KEY_LEN: usize = 32;

/// Nonce 길이 (XChaCha20-Poly1305용 24 bytes)
pub const NONCE_LEN: usize = 24;

/// 인증 태그 길이
pub const TAG_LEN: usize = 16;

/// 봉인 결과의 최소 길이 (빈 평문)
pub const MIN_SEALED_LEN: usize = NONCE_LEN + TAG_LEN;

/// 봉인 오류
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("Sealed payload too short: {len} bytes")]
    Malformed { len: usize },

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// 태그 불일치 (변조, 잘림, 다른 키)
    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Invalid base64 payload")]
    InvalidBase64,
}

/// Zeroize가 적용된 대칭키 래퍼
///
/// 바이트는 크레이트 밖으로 노출되지 않습니다.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_LEN],
}

impl SymmetricKey {
    /// 보안 난수원으로 새 키 생성 (일반 생성기로 대체하지 않음)
    pub(crate) fn generate(random: &dyn SecureRandom) -> Result<Self, RandomError> {
        let mut key = Self { bytes: [0u8; KEY_LEN] };
        random.try_fill(&mut key.bytes)?;
        Ok(key)
    }

    /// 저장소에서 읽은 바이트를 그대로 키로 채택 (재유도 없음)
    pub(crate) fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; KEY_LEN] = slice.try_into().ok()?;
        Some(Self { bytes })
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new((&self.bytes).into())
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// 호출마다 새 랜덤 nonce로 평문을 봉인
pub fn seal(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

    let ciphertext = key
        .cipher()
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// 봉인된 바이트열을 검증 후 개봉
///
/// 태그 검증에 실패하면 평문은 일부도 반환되지 않습니다.
pub fn open(key: &SymmetricKey, sealed: &[u8]) -> Result<Vec<u8>, CipherError> {
    if sealed.len() < MIN_SEALED_LEN {
        return Err(CipherError::Malformed { len: sealed.len() });
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    key.cipher()
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CipherError::DecryptionFailed)
}
