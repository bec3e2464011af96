//! 메모리 키 저장소 (테스트/임시 호스트용)

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{KeyStore, KeyStoreError};

#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금까지 `store`가 성공한 횟수
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>, KeyStoreError> {
        self.entries
            .lock()
            .map_err(|_| KeyStoreError::Corrupt("memory key store lock poisoned".to_string()))
    }
}

impl KeyStore for MemoryKeyStore {
    fn store(&self, identifier: &str, bytes: &[u8]) -> Result<(), KeyStoreError> {
        self.lock()?.insert(identifier.to_string(), bytes.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn retrieve(&self, identifier: &str) -> Result<Option<Vec<u8>>, KeyStoreError> {
        Ok(self.lock()?.get(identifier).cloned())
    }

    fn remove(&self, identifier: &str) -> Result<(), KeyStoreError> {
        self.lock()?.remove(identifier);
        Ok(())
    }
}
