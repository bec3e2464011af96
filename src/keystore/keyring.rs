//! OS Keychain/키링 기반 키 저장소
//!
//! keyring 2는 문자열 비밀번호만 다루므로 바이트는 Base64로 인코딩해 저장합니다.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ::keyring::{Entry, Error as KeyringError};

use super::{KeyStore, KeyStoreError};

#[derive(Debug, Clone)]
pub struct KeyringKeyStore {
    service: String,
}

impl KeyringKeyStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, identifier: &str) -> Result<Entry, KeyStoreError> {
        if identifier.trim().is_empty() {
            return Err(KeyStoreError::Other(
                "key store identifier must not be empty".to_string(),
            ));
        }
        Entry::new(&self.service, identifier).map_err(map_keyring_error)
    }
}

fn map_keyring_error(err: KeyringError) -> KeyStoreError {
    match err {
        KeyringError::PlatformFailure(e) => KeyStoreError::PermissionDenied(e.to_string()),
        KeyringError::NoStorageAccess(e) => KeyStoreError::Unavailable(e.to_string()),
        KeyringError::BadEncoding(_) => {
            KeyStoreError::Corrupt("stored value is not valid UTF-8".to_string())
        }
        other => KeyStoreError::Other(other.to_string()),
    }
}

impl KeyStore for KeyringKeyStore {
    fn store(&self, identifier: &str, bytes: &[u8]) -> Result<(), KeyStoreError> {
        let entry = self.entry(identifier)?;
        // 일부 플랫폼은 set이 기존 항목을 갱신하지 않으므로 먼저 삭제
        match entry.delete_password() {
            Ok(()) | Err(KeyringError::NoEntry) => {}
            Err(err) => return Err(map_keyring_error(err)),
        }
        entry
            .set_password(&BASE64.encode(bytes))
            .map_err(map_keyring_error)
    }

    fn retrieve(&self, identifier: &str) -> Result<Option<Vec<u8>>, KeyStoreError> {
        let entry = self.entry(identifier)?;
        let encoded = match entry.get_password() {
            Ok(value) => value,
            Err(KeyringError::NoEntry) => return Ok(None),
            Err(err) => return Err(map_keyring_error(err)),
        };

        BASE64
            .decode(encoded.trim())
            .map(Some)
            .map_err(|e| KeyStoreError::Corrupt(format!("invalid base64 in keychain: {}", e)))
    }

    fn remove(&self, identifier: &str) -> Result<(), KeyStoreError> {
        let entry = self.entry(identifier)?;
        match entry.delete_password() {
            Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
            Err(err) => Err(map_keyring_error(err)),
        }
    }
}
