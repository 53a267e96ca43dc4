//! 게임 서버 공통 라이브러리
//!
//! TCP 게임 서버에서 공유하는 모델과 고성능 유틸리티를 제공합니다.
//!
//! # 모듈 구조
//!
//! - **model**: 지휘관(플레이어) 레코드와 저장소 인터페이스
//! - **tool**: 시간 유틸리티, 고성능 프리미티브 (버퍼 풀)

/// 도메인 모델
///
/// 지휘관 레코드와 조회 인터페이스를 정의합니다.
pub mod model;

/// 공통 유틸리티 도구들
///
/// 시간 변환, 버퍼 풀 등 서버 전반에서 재사용하는 도구들입니다.
pub mod tool;

pub use model::chat_model::{ChatMessage, MSG_TYPE_NORMAL};
pub use model::commander_model::{Commander, CommanderStore, MemoryCommanderStore, StoreError};
pub use tool::high_performance::buffer_pool::{BufferPool, BufferPoolStats};
