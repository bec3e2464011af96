//! Secure Key Store 어댑터
//!
//! 플랫폼 보안 저장소를 좁은 인터페이스(`store`/`retrieve`/`remove`) 뒤에 둡니다.
//! 엔진은 어떤 저장 기술이 쓰이는지 알지 못합니다.
//!
//! - `KeyringKeyStore`: OS Keychain/키링
//! - `FileKeyStore`: 파일 기반 (헤드리스/개발 환경)
//! - `MemoryKeyStore`: 프로세스 메모리 (테스트/임시 호스트)

pub mod file;
pub mod keyring;
pub mod memory;

pub use self::file::FileKeyStore;
pub use self::keyring::KeyringKeyStore;
pub use self::memory::MemoryKeyStore;

use std::sync::Arc;

use crate::config::PromoSecurityConfig;

/// 키 저장소 오류
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("key store unavailable: {0}")]
    Unavailable(String),

    #[error("key store access denied: {0}")]
    PermissionDenied(String),

    #[error("key store data corrupt: {0}")]
    Corrupt(String),

    #[error("key store failed: {0}")]
    Other(String),
}

/// 바이트 값을 식별자로 저장하는 보안 저장소
///
/// "없음"은 오류가 아니라 `Ok(None)`입니다. 오류는 저장소 자체의 실패
/// (권한, 손상 등)에만 사용됩니다.
pub trait KeyStore: Send + Sync {
    /// 기존 값을 덮어씀 (중복 저장 없음)
    fn store(&self, identifier: &str, bytes: &[u8]) -> Result<(), KeyStoreError>;

    fn retrieve(&self, identifier: &str) -> Result<Option<Vec<u8>>, KeyStoreError>;

    /// 값이 없으면 no-op
    fn remove(&self, identifier: &str) -> Result<(), KeyStoreError>;
}

/// 설정에 맞는 기본 키 저장소 생성
///
/// `key_store_dir`이 있으면 파일 저장소, 없으면 OS Keychain을 사용합니다.
pub fn from_config(config: &PromoSecurityConfig) -> Result<Arc<dyn KeyStore>, KeyStoreError> {
    match &config.key_store_dir {
        Some(dir) => {
            log::info!("[KeyStore] Using file key store at {}", dir.display());
            let store = FileKeyStore::new_in_dir(dir.clone())
                .map_err(|e| KeyStoreError::Unavailable(e.to_string()))?;
            Ok(Arc::new(store))
        }
        None => {
            log::info!("[KeyStore] Using system keychain ({})", config.keychain_service);
            Ok(Arc::new(KeyringKeyStore::new(&config.keychain_service)))
        }
    }
}
