//! Promo Security 모듈
//!
//! 대칭키 1개(키 저장소에 영속)로 프로모션 코드 페이로드를 봉인하고,
//! 권한 플래그의 무결성 해시와 보안 코드 생성을 제공합니다.
//!
//! - 키는 엔진 생성 시 1회 로드/생성 (`promo:symmetric_key_v1`)
//! - 봉인: XChaCha20-Poly1305, `nonce || ciphertext || tag`
//! - 무결성: SHA-256 hex, 상수 시간 비교

pub mod cipher;
pub mod engine;
pub mod integrity;
pub mod random;

pub use engine::{KeySource, PromoSecurityEngine};
pub use integrity::IntegrityRecord;
pub use random::{CodeEntropy, GeneratedCode, OsSecureRandom, SecureRandom};
