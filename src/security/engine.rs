//! Promo Security Engine - 대칭키 수명주기 및 암호 연산
//!
//! - 대칭키는 생성 시 1회 키 저장소에서 로드 (없으면 생성 후 저장)
//! - 이후 모든 연산은 메모리의 키만 사용, 저장소는 재시작 전까지 다시 접근하지 않음
//! - 키 회전 API 없음: 저장된 키 삭제 + 프로세스 재시작 필요

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use zeroize::Zeroize;

use crate::config::{PromoSecurityConfig, RngFallback};
use crate::error::PromoError;
use crate::keystore::{KeyStore, KeyStoreError};
use crate::security::cipher::{self, CipherError, SymmetricKey};
use crate::security::integrity;
use crate::security::random::{
    draw_bytes, map_to_alphabet, CodeEntropy, GeneratedCode, OsSecureRandom, SecureRandom,
};

/// generate-or-load 임계 구역 (프로세스 전역, 단일 writer)
static KEY_INIT_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// 대칭키 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// 키 저장소에 있던 키를 채택
    Loaded,
    /// 새로 생성하여 저장
    Generated,
}

/// 프로모션 보안 엔진
///
/// 생성이 곧 Uninitialized → Ready 전이입니다. 생성된 엔진은 항상 Ready이며
/// 키는 엔진 수명 동안 불변입니다. 여러 스레드에서 `Arc`로 공유해 사용합니다.
pub struct PromoSecurityEngine {
    key: SymmetricKey,
    key_source: KeySource,
    store: Arc<dyn KeyStore>,
    key_identifier: String,
    random: Arc<dyn SecureRandom>,
    rng_fallback: RngFallback,
    rng_failures: AtomicU64,
}

impl PromoSecurityEngine {
    /// 키 저장소에서 키를 로드하거나 생성하여 엔진 생성
    ///
    /// 새 키를 저장하지 못하면 `KeyPersist`로 실패합니다. 저장되지 않은 키로는
    /// 어떤 데이터도 봉인하지 않습니다. 보안 난수원이 실패하면
    /// `SecureRandomUnavailable`.
    pub fn new(store: Arc<dyn KeyStore>, config: &PromoSecurityConfig) -> Result<Self, PromoError> {
        Self::with_random(store, config, Arc::new(OsSecureRandom))
    }

    /// 난수원을 주입하여 생성
    pub fn with_random(
        store: Arc<dyn KeyStore>,
        config: &PromoSecurityConfig,
        random: Arc<dyn SecureRandom>,
    ) -> Result<Self, PromoError> {
        let (key, key_source) =
            establish_key(store.as_ref(), random.as_ref(), &config.key_identifier)?;

        log::info!("[PromoSecurity] Ready (key {:?})", key_source);

        Ok(Self {
            key,
            key_source,
            store,
            key_identifier: config.key_identifier.clone(),
            random,
            rng_fallback: config.rng_fallback,
            rng_failures: AtomicU64::new(0),
        })
    }

    pub fn key_source(&self) -> KeySource {
        self.key_source
    }

    // =====================================
    // AEAD
    // =====================================

    /// 봉인 (nonce + 암호문 + 태그)
    pub fn try_encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, PromoError> {
        Ok(cipher::seal(&self.key, plaintext)?)
    }

    /// 봉인, 실패 시 `None` ("진행 불가"로 취급할 것)
    pub fn encrypt(&self, plaintext: &[u8]) -> Option<Vec<u8>> {
        match self.try_encrypt(plaintext) {
            Ok(sealed) => Some(sealed),
            Err(e) => {
                log::error!("[PromoSecurity] Encryption failed: {}", e);
                None
            }
        }
    }

    pub fn try_decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, PromoError> {
        Ok(cipher::open(&self.key, sealed)?)
    }

    /// 개봉, 태그 검증 실패/형식 오류 시 `None` (부분 평문 없음)
    pub fn decrypt(&self, sealed: &[u8]) -> Option<Vec<u8>> {
        match self.try_decrypt(sealed) {
            Ok(plaintext) => Some(plaintext),
            Err(e) => {
                log::warn!("[PromoSecurity] Rejected sealed payload: {}", e);
                None
            }
        }
    }

    /// 텍스트 저장용: 봉인 결과를 Base64로
    pub fn encrypt_to_base64(&self, plaintext: &[u8]) -> Result<String, PromoError> {
        let sealed = self.try_encrypt(plaintext)?;
        Ok(BASE64.encode(sealed))
    }

    pub fn decrypt_from_base64(&self, encoded: &str) -> Result<Vec<u8>, PromoError> {
        let sealed = BASE64
            .decode(encoded.trim())
            .map_err(|_| PromoError::Cipher(CipherError::InvalidBase64))?;
        self.try_decrypt(&sealed)
    }

    // =====================================
    // 무결성 해시
    // =====================================

    pub fn create_integrity_hash(
        &self,
        has_lifetime: bool,
        has_premium: bool,
        expiry_timestamp: f64,
    ) -> String {
        integrity::create_integrity_hash(has_lifetime, has_premium, expiry_timestamp)
    }

    pub fn verify_integrity(
        &self,
        has_lifetime: bool,
        has_premium: bool,
        expiry_timestamp: f64,
        stored_hash: &str,
    ) -> bool {
        integrity::verify_integrity(has_lifetime, has_premium, expiry_timestamp, stored_hash)
    }

    // =====================================
    // 코드 생성
    // =====================================

    /// `length`자 코드 생성 (문자 중복 허용)
    ///
    /// 실패하지 않습니다. 보안 난수원이 없으면 설정과 무관하게 일반 생성기로
    /// 대체하며, 이는 `rng_fallback_count()`와 경고 로그로 관측됩니다.
    /// 빈 문자 집합이면 빈 문자열을 반환합니다.
    pub fn generate_secure_code(&self, length: usize, alphabet: &str) -> String {
        let alphabet: Vec<char> = alphabet.chars().collect();
        if alphabet.is_empty() {
            log::error!("[PromoSecurity] generate_secure_code called with empty alphabet");
            return String::new();
        }
        match self.draw(length, RngFallback::Degrade) {
            Some((bytes, entropy)) => finish_code(bytes, &alphabet, entropy).value,
            None => String::new(),
        }
    }

    /// 설정된 `RngFallback` 정책을 따르는 코드 생성
    ///
    /// `Refuse` 정책에서 보안 난수원이 실패하면 `SecureRandomUnavailable`.
    pub fn generate_code(&self, length: usize, alphabet: &str) -> Result<GeneratedCode, PromoError> {
        let alphabet: Vec<char> = alphabet.chars().collect();
        if alphabet.is_empty() {
            return Err(PromoError::InvalidAlphabet);
        }
        let (bytes, entropy) = self
            .draw(length, self.rng_fallback)
            .ok_or(PromoError::SecureRandomUnavailable)?;
        Ok(finish_code(bytes, &alphabet, entropy))
    }

    /// 지금까지 관측된 보안 난수원 실패 횟수
    pub fn rng_fallback_count(&self) -> u64 {
        self.rng_failures.load(Ordering::Relaxed)
    }

    fn draw(&self, length: usize, policy: RngFallback) -> Option<(Vec<u8>, CodeEntropy)> {
        let drawn = draw_bytes(self.random.as_ref(), length, policy);
        if !matches!(drawn, Some((_, CodeEntropy::Secure))) {
            self.rng_failures.fetch_add(1, Ordering::Relaxed);
        }
        drawn
    }

    // =====================================
    // 키 회전 지원
    // =====================================

    /// 저장된 키 삭제
    ///
    /// 현재 엔진의 메모리 키는 그대로 유지됩니다. 다음 프로세스 시작 시 새 키가
    /// 생성되며, 그 전에 봉인된 데이터는 복호화할 수 없게 됩니다.
    pub fn forget_persisted_key(&self) -> Result<(), KeyStoreError> {
        self.store.remove(&self.key_identifier)?;
        log::warn!("[PromoSecurity] Persisted key removed; a new key will be generated on restart");
        Ok(())
    }
}

impl std::fmt::Debug for PromoSecurityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromoSecurityEngine")
            .field("key_source", &self.key_source)
            .field("key_identifier", &self.key_identifier)
            .field("rng_fallback", &self.rng_fallback)
            .finish_non_exhaustive()
    }
}

fn finish_code(mut bytes: Vec<u8>, alphabet: &[char], entropy: CodeEntropy) -> GeneratedCode {
    let value = map_to_alphabet(&bytes, alphabet);
    bytes.zeroize();
    GeneratedCode { value, entropy }
}

/// generate-or-load
///
/// 1. 저장소에서 키 조회
/// 2. 있으면 그대로 채택
/// 3. 없으면 (읽기 오류/손상 포함) 생성 → 저장 → 채택
fn establish_key(
    store: &dyn KeyStore,
    random: &dyn SecureRandom,
    identifier: &str,
) -> Result<(SymmetricKey, KeySource), PromoError> {
    let _guard = KEY_INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    match store.retrieve(identifier) {
        Ok(Some(mut bytes)) => {
            let key = SymmetricKey::from_slice(&bytes);
            let len = bytes.len();
            bytes.zeroize();
            match key {
                Some(key) => {
                    log::info!("[PromoSecurity] Symmetric key loaded from key store");
                    return Ok((key, KeySource::Loaded));
                }
                None => log::warn!(
                    "[PromoSecurity] Stored key has invalid length ({} bytes), regenerating",
                    len
                ),
            }
        }
        Ok(None) => log::info!("[PromoSecurity] No symmetric key found, generating new one..."),
        Err(e) => log::warn!(
            "[PromoSecurity] Key store read failed, treating as absent: {}",
            e
        ),
    }

    let key = SymmetricKey::generate(random).map_err(|e| {
        log::error!("[PromoSecurity] Cannot generate symmetric key: {}", e);
        PromoError::SecureRandomUnavailable
    })?;
    store
        .store(identifier, key.as_bytes())
        .map_err(PromoError::KeyPersist)?;
    log::info!("[PromoSecurity] New symmetric key saved to key store");

    Ok((key, KeySource::Generated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_KEY_IDENTIFIER;
    use crate::keystore::MemoryKeyStore;
    use crate::security::random::tests::{FailingRandom, FixedRandom};
    use crate::security::random::DEFAULT_CODE_ALPHABET;

    /// 항상 실패하는 저장소
    struct BrokenStore {
        fail_reads: bool,
    }

    impl KeyStore for BrokenStore {
        fn store(&self, _identifier: &str, _bytes: &[u8]) -> Result<(), KeyStoreError> {
            Err(KeyStoreError::PermissionDenied("read-only keychain".to_string()))
        }

        fn retrieve(&self, _identifier: &str) -> Result<Option<Vec<u8>>, KeyStoreError> {
            if self.fail_reads {
                Err(KeyStoreError::Unavailable("locked".to_string()))
            } else {
                Ok(None)
            }
        }

        fn remove(&self, _identifier: &str) -> Result<(), KeyStoreError> {
            Ok(())
        }
    }

    fn engine_with(random: Arc<dyn SecureRandom>, policy: RngFallback) -> PromoSecurityEngine {
        let config = PromoSecurityConfig {
            rng_fallback: policy,
            ..PromoSecurityConfig::default()
        };
        // 주입된 난수원은 코드 생성에만 쓰이도록 키를 미리 저장
        let store = Arc::new(MemoryKeyStore::new());
        store.store(DEFAULT_KEY_IDENTIFIER, &[0x5a; cipher::KEY_LEN]).unwrap();
        PromoSecurityEngine::with_random(store, &config, random).unwrap()
    }

    fn engine() -> PromoSecurityEngine {
        PromoSecurityEngine::new(Arc::new(MemoryKeyStore::new()), &PromoSecurityConfig::default())
            .unwrap()
    }

    #[test]
    fn test_generates_and_persists_key_when_absent() {
        let store = Arc::new(MemoryKeyStore::new());
        let engine = PromoSecurityEngine::new(store.clone(), &PromoSecurityConfig::default()).unwrap();

        assert_eq!(engine.key_source(), KeySource::Generated);
        let persisted = store.retrieve(DEFAULT_KEY_IDENTIFIER).unwrap().unwrap();
        assert_eq!(persisted.len(), cipher::KEY_LEN);
        assert_eq!(&persisted[..], &engine.key.as_bytes()[..]);
    }

    #[test]
    fn test_adopts_stored_key_bytes() {
        let store = Arc::new(MemoryKeyStore::new());
        store.store(DEFAULT_KEY_IDENTIFIER, &[0x42; cipher::KEY_LEN]).unwrap();

        let engine = PromoSecurityEngine::new(store.clone(), &PromoSecurityConfig::default()).unwrap();
        assert_eq!(engine.key_source(), KeySource::Loaded);
        assert_eq!(engine.key.as_bytes(), &[0x42; cipher::KEY_LEN]);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_invalid_stored_key_is_replaced() {
        let store = Arc::new(MemoryKeyStore::new());
        store.store(DEFAULT_KEY_IDENTIFIER, b"short").unwrap();

        let engine = PromoSecurityEngine::new(store.clone(), &PromoSecurityConfig::default()).unwrap();
        assert_eq!(engine.key_source(), KeySource::Generated);
        assert_eq!(
            store.retrieve(DEFAULT_KEY_IDENTIFIER).unwrap().unwrap().len(),
            cipher::KEY_LEN
        );
    }

    #[test]
    fn test_unpersistable_key_fails_construction() {
        let result = PromoSecurityEngine::new(
            Arc::new(BrokenStore { fail_reads: false }),
            &PromoSecurityConfig::default(),
        );
        assert!(matches!(result, Err(PromoError::KeyPersist(_))));
    }

    #[test]
    fn test_key_generation_without_entropy_fails_construction() {
        let store = Arc::new(MemoryKeyStore::new());
        let result = PromoSecurityEngine::with_random(
            store.clone(),
            &PromoSecurityConfig::default(),
            Arc::new(FailingRandom),
        );

        assert!(matches!(result, Err(PromoError::SecureRandomUnavailable)));
        assert!(store.retrieve(DEFAULT_KEY_IDENTIFIER).unwrap().is_none());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_existing_key_loads_without_entropy() {
        let store = Arc::new(MemoryKeyStore::new());
        store.store(DEFAULT_KEY_IDENTIFIER, &[0x17; cipher::KEY_LEN]).unwrap();

        let engine = PromoSecurityEngine::with_random(
            store,
            &PromoSecurityConfig::default(),
            Arc::new(FailingRandom),
        )
        .unwrap();
        assert_eq!(engine.key_source(), KeySource::Loaded);
    }

    #[test]
    fn test_read_failure_treated_as_absent() {
        // 읽기 실패 → 생성 시도 → 저장 실패 → 생성 실패
        let result = PromoSecurityEngine::new(
            Arc::new(BrokenStore { fail_reads: true }),
            &PromoSecurityConfig::default(),
        );
        assert!(matches!(result, Err(PromoError::KeyPersist(_))));
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let engine = engine();
        let sealed = engine.encrypt(b"LIFETIME-2025").unwrap();
        assert_eq!(engine.decrypt(&sealed).unwrap(), b"LIFETIME-2025");
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let engine = engine();
        let a = engine.encrypt(b"same").unwrap();
        let b = engine.encrypt(b"same").unwrap();
        assert_ne!(a, b);
        assert_ne!(a[..cipher::NONCE_LEN], b[..cipher::NONCE_LEN]);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let engine = engine();
        let mut sealed = engine.encrypt(b"premium").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(engine.decrypt(&sealed).is_none());
        assert!(engine.decrypt(&[]).is_none());
    }

    #[test]
    fn test_other_engine_key_rejected() {
        let a = engine();
        let b = engine();
        let sealed = a.encrypt(b"cross").unwrap();
        assert!(b.decrypt(&sealed).is_none());
    }

    #[test]
    fn test_base64_helpers() {
        let engine = engine();
        let encoded = engine.encrypt_to_base64(b"VERSE-PROMO").unwrap();
        assert_eq!(engine.decrypt_from_base64(&encoded).unwrap(), b"VERSE-PROMO");
        assert!(matches!(
            engine.decrypt_from_base64("not base64!!"),
            Err(PromoError::Cipher(CipherError::InvalidBase64))
        ));
    }

    #[test]
    fn test_integrity_delegation() {
        let engine = engine();
        let hash = engine.create_integrity_hash(true, false, 1735689600.0);
        assert_eq!(hash.len(), 64);
        assert!(engine.verify_integrity(true, false, 1735689600.0, &hash));
        assert!(!engine.verify_integrity(true, true, 1735689600.0, &hash));
    }

    #[test]
    fn test_code_length_and_alphabet() {
        let engine = engine();
        for length in [0, 1, 8, 64, 300] {
            let code = engine.generate_secure_code(length, DEFAULT_CODE_ALPHABET);
            assert_eq!(code.chars().count(), length);
            assert!(code.chars().all(|c| DEFAULT_CODE_ALPHABET.contains(c)));
        }

        let code = engine.generate_secure_code(16, "가나다");
        assert_eq!(code.chars().count(), 16);
        assert!(code.chars().all(|c| "가나다".contains(c)));
        assert_eq!(engine.rng_fallback_count(), 0);
    }

    #[test]
    fn test_code_uses_injected_bytes() {
        let engine = engine_with(Arc::new(FixedRandom(4)), RngFallback::Degrade);
        // 4 % 3 == 1
        assert_eq!(engine.generate_secure_code(3, "XYZ"), "YYY");
    }

    #[test]
    fn test_fallback_degrades_without_failing() {
        let engine = engine_with(Arc::new(FailingRandom), RngFallback::Degrade);

        let code = engine.generate_secure_code(12, DEFAULT_CODE_ALPHABET);
        assert_eq!(code.chars().count(), 12);
        assert!(code.chars().all(|c| DEFAULT_CODE_ALPHABET.contains(c)));

        let generated = engine.generate_code(12, DEFAULT_CODE_ALPHABET).unwrap();
        assert_eq!(generated.entropy, CodeEntropy::Fallback);
        assert!(!generated.is_secure());
        assert_eq!(engine.rng_fallback_count(), 2);
    }

    #[test]
    fn test_refuse_policy() {
        let engine = engine_with(Arc::new(FailingRandom), RngFallback::Refuse);
        assert!(matches!(
            engine.generate_code(8, DEFAULT_CODE_ALPHABET),
            Err(PromoError::SecureRandomUnavailable)
        ));
        // 호환 API는 정책과 무관하게 실패하지 않음
        assert_eq!(engine.generate_secure_code(8, DEFAULT_CODE_ALPHABET).len(), 8);
        assert_eq!(engine.rng_fallback_count(), 2);
    }

    #[test]
    fn test_empty_alphabet() {
        let engine = engine();
        assert_eq!(engine.generate_secure_code(8, ""), "");
        assert!(matches!(
            engine.generate_code(8, ""),
            Err(PromoError::InvalidAlphabet)
        ));
    }

    #[test]
    fn test_forget_persisted_key() {
        let store = Arc::new(MemoryKeyStore::new());
        let engine = PromoSecurityEngine::new(store.clone(), &PromoSecurityConfig::default()).unwrap();
        let sealed = engine.encrypt(b"before").unwrap();

        engine.forget_persisted_key().unwrap();
        assert!(store.retrieve(DEFAULT_KEY_IDENTIFIER).unwrap().is_none());
        // 실행 중인 엔진은 기존 키 유지
        assert_eq!(engine.decrypt(&sealed).unwrap(), b"before");

        let restarted = PromoSecurityEngine::new(store, &PromoSecurityConfig::default()).unwrap();
        assert_eq!(restarted.key_source(), KeySource::Generated);
        assert!(restarted.decrypt(&sealed).is_none());
    }
}
