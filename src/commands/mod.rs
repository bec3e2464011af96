//! Promo Commands Module
//!
//! 상위 계층(프로모션 사용 흐름, 권한 저장)에서 호출하는 텍스트 기반 명령

pub mod promo;

pub use promo::PromoCommands;
