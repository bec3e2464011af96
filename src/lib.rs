//! Promo Seal - 프로모션 코드 보안 라이브러리
//!
//! 잠금 화면 성경 구절 위젯 앱의 프로모션 코드 잠금 해제를 위한 보안 기본 요소:
//! 대칭키 수명주기, AEAD 봉인/개봉, 권한 플래그 무결성 해시, 보안 코드 생성.

pub mod commands;
pub mod config;
pub mod error;
pub mod keystore;
pub mod security;

use std::sync::Arc;

pub use config::{PromoSecurityConfig, RngFallback};
pub use error::{CommandError, CommandResult, PromoError};
pub use keystore::{KeyStore, KeyStoreError};
pub use security::PromoSecurityEngine;

/// 설정에 맞는 키 저장소로 엔진 생성
///
/// 앱 시작 시 한 곳에서 1회 호출하고, 결과를 필요한 컴포넌트에 전달합니다.
pub fn bootstrap(config: &PromoSecurityConfig) -> Result<Arc<PromoSecurityEngine>, PromoError> {
    let store = keystore::from_config(config)?;
    let engine = PromoSecurityEngine::new(store, config)?;
    Ok(Arc::new(engine))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_bootstrap_with_file_store() {
        let dir = tempdir().unwrap();
        let config = PromoSecurityConfig {
            key_store_dir: Some(dir.path().to_path_buf()),
            ..PromoSecurityConfig::default()
        };

        let first = bootstrap(&config).unwrap();
        let sealed = first.encrypt(b"bootstrap").unwrap();

        let second = bootstrap(&config).unwrap();
        assert_eq!(second.key_source(), security::KeySource::Loaded);
        assert_eq!(second.decrypt(&sealed).unwrap(), b"bootstrap");
    }
}
