//! 권한 플래그 무결성 해시
//!
//! 저장된 플래그(`has_lifetime`, `has_premium`, 만료 시각)는 반드시 해시를 다시
//! 계산해 비교한 뒤에만 신뢰합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// 해시 입력의 정규 문자열
///
/// 필드 순서와 구분자가 고정되어 있습니다. 실수는 읽기 쉬운 `{:?}` 표현 뒤에
/// IEEE-754 비트를 hex로 덧붙여, NaN 페이로드까지 서로 다른 값은 서로 다른
/// 문자열이 됩니다. 예: `true|false|1735689600.0|41d9dd2160000000`
fn canonical_encoding(has_lifetime: bool, has_premium: bool, expiry_timestamp: f64) -> String {
    format!(
        "{}|{}|{:?}|{:016x}",
        has_lifetime,
        has_premium,
        expiry_timestamp,
        expiry_timestamp.to_bits()
    )
}

/// SHA-256 해시를 소문자 hex(64자)로 반환
pub fn create_integrity_hash(has_lifetime: bool, has_premium: bool, expiry_timestamp: f64) -> String {
    let digest = Sha256::digest(canonical_encoding(has_lifetime, has_premium, expiry_timestamp));
    hex::encode(digest)
}

/// 해시를 다시 계산해 상수 시간으로 비교
///
/// 대소문자나 공백도 정규화하지 않습니다. 1바이트라도 다르면 실패입니다.
pub fn verify_integrity(
    has_lifetime: bool,
    has_premium: bool,
    expiry_timestamp: f64,
    stored_hash: &str,
) -> bool {
    let expected = create_integrity_hash(has_lifetime, has_premium, expiry_timestamp);
    expected.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

/// 저장용 무결성 레코드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityRecord {
    pub has_lifetime: bool,
    pub has_premium: bool,
    /// epoch 초. 0 이하이면 만료 없음
    pub expiry_timestamp: f64,
    pub hash: String,
}

impl IntegrityRecord {
    pub fn seal(has_lifetime: bool, has_premium: bool, expiry_timestamp: f64) -> Self {
        Self {
            has_lifetime,
            has_premium,
            expiry_timestamp,
            hash: create_integrity_hash(has_lifetime, has_premium, expiry_timestamp),
        }
    }

    pub fn verify(&self) -> bool {
        verify_integrity(
            self.has_lifetime,
            self.has_premium,
            self.expiry_timestamp,
            &self.hash,
        )
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.expiry_timestamp <= 0.0 {
            return false;
        }
        let now_secs = now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) / 1e9;
        now_secs >= self.expiry_timestamp
    }
}
