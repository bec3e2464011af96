//! Promo Commands
//!
//! 엔진 연산을 문자열 입출력과 `CommandResult`로 감쌉니다.
//! 복호화/검증 실패는 원인과 관계없이 `DATA_INVALID`로 응답합니다.

use std::sync::Arc;
use zeroize::Zeroize;

use crate::error::{CommandError, CommandResult};
use crate::security::integrity::IntegrityRecord;
use crate::security::random::{DEFAULT_CODE_ALPHABET, DEFAULT_CODE_LENGTH};
use crate::security::PromoSecurityEngine;

/// 발급 가능한 코드의 최대 길이
pub const MAX_CODE_LENGTH: usize = 64;

#[derive(Debug, Clone)]
pub struct PromoCommands {
    engine: Arc<PromoSecurityEngine>,
}

fn validate_payload(payload: &str) -> Result<(), CommandError> {
    if payload.trim().is_empty() {
        return Err(CommandError::invalid_input("Payload must not be empty."));
    }
    Ok(())
}

impl PromoCommands {
    pub fn new(engine: Arc<PromoSecurityEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<PromoSecurityEngine> {
        &self.engine
    }

    /// 평문을 봉인하여 Base64로 반환
    pub fn seal_payload(&self, payload: &str) -> CommandResult<String> {
        validate_payload(payload)?;
        Ok(self.engine.encrypt_to_base64(payload.as_bytes())?)
    }

    /// Base64 봉인 데이터를 개봉
    pub fn open_payload(&self, sealed: &str) -> CommandResult<String> {
        validate_payload(sealed)?;
        let plaintext = self.engine.decrypt_from_base64(sealed)?;
        String::from_utf8(plaintext).map_err(|e| {
            e.into_bytes().zeroize();
            CommandError::data_invalid()
        })
    }

    /// 기본 문자 집합으로 프로모션 코드 발급
    pub fn issue_code(&self, length: Option<usize>) -> CommandResult<String> {
        let length = length.unwrap_or(DEFAULT_CODE_LENGTH);
        if length == 0 || length > MAX_CODE_LENGTH {
            return Err(CommandError::invalid_input(format!(
                "Code length must be between 1 and {}.",
                MAX_CODE_LENGTH
            )));
        }

        let code = self.engine.generate_code(length, DEFAULT_CODE_ALPHABET)?;
        if !code.is_secure() {
            log::warn!("[PromoCommands] Issued code without secure entropy");
        }
        Ok(code.value)
    }

    /// 권한 플래그를 해시와 함께 레코드로 봉인
    pub fn seal_entitlement(
        &self,
        has_lifetime: bool,
        has_premium: bool,
        expiry_timestamp: f64,
    ) -> CommandResult<IntegrityRecord> {
        if !expiry_timestamp.is_finite() {
            return Err(CommandError::invalid_input("Expiry timestamp must be finite."));
        }
        Ok(IntegrityRecord::seal(has_lifetime, has_premium, expiry_timestamp))
    }

    /// 저장소에서 읽은 레코드 검증. `false`면 플래그를 신뢰하지 말 것
    pub fn check_entitlement(&self, record: &IntegrityRecord) -> bool {
        let valid = self.engine.verify_integrity(
            record.has_lifetime,
            record.has_premium,
            record.expiry_timestamp,
            &record.hash,
        );
        if !valid {
            log::warn!("[PromoCommands] Entitlement record failed integrity check");
        }
        valid
    }
}
