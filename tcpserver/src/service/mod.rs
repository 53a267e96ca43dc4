//! TCP 서버 서비스 레이어
//!
//! 연결 엔진의 핵심 구성요소를 정의합니다.
//!
//! # 서비스 구조
//!
//! ```text
//! Service Layer
//! ├── TcpServer (tcp_service)
//! │   ├── 수락 루프와 연결 검증
//! │   ├── 클라이언트 레지스트리
//! │   ├── 채팅방 / 브로드캐스트
//! │   └── 점검 모드 / 강제 종료
//! ├── Client (client)
//! │   ├── 프레임 프로세서 태스크
//! │   ├── 송신 누적 버퍼와 플러시
//! │   └── 멱등 종료 라이프사이클
//! ├── FrameQueue (frame_queue)
//! │   └── 논블로킹 push / 블로킹 pop FIFO
//! └── ClientMetrics (client_metrics)
//!     └── 연결별 원자적 카운터
//! ```

/// 클라이언트 연결과 프레임 프로세서
pub mod client;

/// 연결별 메트릭 카운터
pub mod client_metrics;

/// 고정 용량 프레임 큐
pub mod frame_queue;

/// 서버 수락 루프와 레지스트리
pub mod tcp_service;

pub use client::Client;
pub use client_metrics::{ClientMetrics, MetricsSnapshot};
pub use frame_queue::{EnqueueError, FrameQueue};
pub use tcp_service::{ServerDispatcher, TcpServer};
