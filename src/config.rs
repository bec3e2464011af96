//! 프로모션 보안 설정
//!
//! 기본값 + 환경 변수(`.env` 포함) 오버라이드

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::PromoError;

/// Keychain 서비스 이름 기본값
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "com.versewidget.app";
/// 대칭키 Keychain 키 기본값
pub const DEFAULT_KEY_IDENTIFIER: &str = "promo:symmetric_key_v1";

/// 보안 난수원을 쓸 수 없을 때의 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RngFallback {
    /// 일반 난수 생성기로 대체 (호출은 실패하지 않음)
    #[default]
    Degrade,
    /// 코드 생성을 거부
    Refuse,
}

impl RngFallback {
    fn parse(value: &str) -> Result<Self, PromoError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "degrade" => Ok(RngFallback::Degrade),
            "refuse" => Ok(RngFallback::Refuse),
            other => Err(PromoError::Config(format!(
                "PROMO_RNG_FALLBACK must be 'degrade' or 'refuse', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromoSecurityConfig {
    pub keychain_service: String,
    pub key_identifier: String,
    pub rng_fallback: RngFallback,
    /// 설정 시 Keychain 대신 파일 기반 키 저장소 사용 (헤드리스/개발 환경)
    pub key_store_dir: Option<PathBuf>,
}

impl Default for PromoSecurityConfig {
    fn default() -> Self {
        Self {
            keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
            key_identifier: DEFAULT_KEY_IDENTIFIER.to_string(),
            rng_fallback: RngFallback::Degrade,
            key_store_dir: None,
        }
    }
}

impl PromoSecurityConfig {
    /// `.env`를 로드한 뒤 환경 변수로 기본값을 덮어씀
    ///
    /// `.env`가 없어도 실패하지 않습니다.
    pub fn from_env() -> Result<Self, PromoError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, PromoError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 빈 문자열로 주입된 값은 무시
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::default();
        if let Some(service) = get("PROMO_KEYCHAIN_SERVICE") {
            config.keychain_service = service.trim().to_string();
        }
        if let Some(id) = get("PROMO_KEY_ID") {
            config.key_identifier = id.trim().to_string();
        }
        if let Some(policy) = get("PROMO_RNG_FALLBACK") {
            config.rng_fallback = RngFallback::parse(&policy)?;
        }
        if let Some(dir) = get("PROMO_KEY_STORE_DIR") {
            config.key_store_dir = Some(PathBuf::from(dir.trim()));
        }
        Ok(config)
    }
}
