//! 보안 코드 생성용 난수원
//!
//! 보안 난수원(OS 엔트로피)이 실패하면 일반 난수 생성기로 대체합니다.
//! 어떤 경로가 쓰였는지는 `CodeEntropy`로 구분됩니다.

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::RngFallback;

/// 혼동되는 문자(0, O, 1, I)를 뺀 기본 코드 문자 집합
pub const DEFAULT_CODE_ALPHABET: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// 기본 코드 길이
pub const DEFAULT_CODE_LENGTH: usize = 8;

#[derive(Debug, thiserror::Error)]
#[error("secure random source failed: {0}")]
pub struct RandomError(pub String);

/// 주입 가능한 보안 난수원
pub trait SecureRandom: Send + Sync {
    fn try_fill(&self, buf: &mut [u8]) -> Result<(), RandomError>;
}

/// OS 엔트로피 기반 난수원
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSecureRandom;

impl SecureRandom for OsSecureRandom {
    fn try_fill(&self, buf: &mut [u8]) -> Result<(), RandomError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| RandomError(e.to_string()))
    }
}

/// 코드 생성에 사용된 난수 경로
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeEntropy {
    Secure,
    /// 보안 난수원 실패로 일반 생성기 사용 (이번 호출에 한해 보안 보장 저하)
    Fallback,
}

/// 생성된 코드와 그 난수 경로
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub value: String,
    pub entropy: CodeEntropy,
}

impl GeneratedCode {
    pub fn is_secure(&self) -> bool {
        self.entropy == CodeEntropy::Secure
    }
}

/// `length` 바이트의 난수를 얻음
///
/// 보안 난수원이 실패하면 `Degrade`에서는 시각으로 시드한 `StdRng`로 채우고,
/// `Refuse`에서는 `None`을 반환합니다.
pub(crate) fn draw_bytes(
    source: &dyn SecureRandom,
    length: usize,
    policy: RngFallback,
) -> Option<(Vec<u8>, CodeEntropy)> {
    let mut bytes = vec![0u8; length];
    match (source.try_fill(&mut bytes), policy) {
        (Ok(()), _) => Some((bytes, CodeEntropy::Secure)),
        (Err(e), RngFallback::Degrade) => {
            log::warn!("[PromoSecurity] Secure RNG unavailable, using fallback generator: {}", e);
            fallback_rng().fill_bytes(&mut bytes);
            Some((bytes, CodeEntropy::Fallback))
        }
        (Err(e), RngFallback::Refuse) => {
            log::error!("[PromoSecurity] Secure RNG unavailable, refusing to generate code: {}", e);
            None
        }
    }
}

fn fallback_rng() -> StdRng {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5eed);
    StdRng::seed_from_u64(seed ^ u64::from(std::process::id()))
}

/// 각 바이트를 `byte % alphabet.len()`으로 문자에 대응
///
/// 크기가 2의 거듭제곱이 아닌 문자 집합에서는 약간의 모듈로 편향이 있습니다.
pub(crate) fn map_to_alphabet(bytes: &[u8], alphabet: &[char]) -> String {
    bytes
        .iter()
        .map(|b| alphabet[usize::from(*b) % alphabet.len()])
        .collect()
}
