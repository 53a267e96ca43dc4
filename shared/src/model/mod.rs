//! 도메인 모델 정의
//!
//! 서버가 다루는 영속 데이터의 메모리 표현을 정의합니다.
//! 실제 영속화 계층은 저장소 트레이트 뒤에 숨겨집니다.

/// 지휘관(플레이어) 모델과 저장소
pub mod commander_model;

/// 채팅 메시지 모델
pub mod chat_model;

pub use chat_model::*;
pub use commander_model::*;
