//! Promo Seal Error Types
//!
//! 프로모션 보안 모듈 전역 에러 타입 정의

use serde::Serialize;
use thiserror::Error;

use crate::keystore::KeyStoreError;
use crate::security::cipher::CipherError;

/// 프로모션 보안 엔진 에러
#[derive(Error, Debug)]
pub enum PromoError {
    /// 새로 생성한 키를 저장하지 못함 (엔진 생성 실패)
    #[error("Failed to persist symmetric key: {0}")]
    KeyPersist(#[source] KeyStoreError),

    /// 키 저장소를 열 수 없음
    #[error("Key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Secure random source unavailable")]
    SecureRandomUnavailable,

    #[error("Code alphabet must not be empty")]
    InvalidAlphabet,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// 호출자 응답용 직렬화 가능한 에러
#[derive(Debug, Serialize)]
pub struct CommandError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl CommandError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CommandError {
            code: "INVALID_INPUT".to_string(),
            message: message.into(),
            details: None,
        }
    }

    /// 복호화/검증 실패 - 원인은 호출자에게 노출하지 않음
    pub fn data_invalid() -> Self {
        CommandError {
            code: "DATA_INVALID".to_string(),
            message: "Operation not permitted: data invalid.".to_string(),
            details: None,
        }
    }
}

impl From<PromoError> for CommandError {
    fn from(error: PromoError) -> Self {
        let code = match &error {
            PromoError::KeyPersist(_) | PromoError::KeyStore(_) => "KEY_STORE_ERROR",
            PromoError::Cipher(CipherError::EncryptionFailed(_)) => "ENCRYPTION_ERROR",
            PromoError::Cipher(_) => return CommandError::data_invalid(),
            PromoError::SecureRandomUnavailable => "RNG_UNAVAILABLE",
            PromoError::InvalidAlphabet => "INVALID_INPUT",
            PromoError::Config(_) => "CONFIG_ERROR",
        };

        CommandError {
            code: code.to_string(),
            message: error.to_string(),
            details: None,
        }
    }
}

/// 명령 결과 타입
pub type CommandResult<T> = Result<T, CommandError>;
