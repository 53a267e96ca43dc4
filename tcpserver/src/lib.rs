//! TCP 게임 서버 라이브러리
//!
//! 게임 클라이언트의 TCP 연결을 받아 길이 접두사 바이너리 프로토콜을
//! 디코딩하고, 소켓과 게임 로직 핸들러 사이에서 프레임을 중계하는
//! 연결 엔진입니다. 백프레셔, 연결 라이프사이클, 강제 종료 의미론을
//! 동시 부하에서 보장합니다.
//!
//! # 아키텍처
//!
//! ```text
//! TCP Server
//! ├── Service Layer (연결 엔진)
//! │   ├── TcpServer (수락 루프, 레지스트리, 방, 점검 모드)
//! │   ├── Client (프레임 프로세서, 송신 버퍼, 멱등 종료)
//! │   ├── FrameQueue (논블로킹 push / 블로킹 pop)
//! │   └── ClientMetrics (연결별 원자적 카운터)
//! ├── Handler Layer (게임 로직 경계)
//! │   ├── PacketRouter (패킷 ID -> 핸들러 디스패치)
//! │   ├── AuthHandler (로그인, 중복 세션 정리)
//! │   └── ChatHandler (방 입장, 채팅)
//! ├── Protocol (와이어 코덱)
//! │   └── 7바이트 헤더 + 불투명 페이로드
//! └── Tool Layer (유틸리티)
//!     ├── Error (에러 분류)
//!     └── NetworkUtils (출처 대역 검사)
//! ```
//!
//! # 동시성 모델
//!
//! 수락 루프 태스크 하나, 연결마다 리더 태스크와 프로세서 태스크가
//! 하나씩 동작합니다. 리더는 소켓에서만, 프로세서는 빈 프레임 큐에서만
//! 대기합니다. enqueue는 절대 블로킹하지 않으므로 프로세서가 밀려도
//! 리더와 메모리 사용량은 한도를 벗어나지 않습니다.

/// 환경 설정 관리
pub mod config;

/// 와이어 프로토콜 코덱
pub mod protocol;

/// 연결 엔진 서비스 레이어
pub mod service;

/// 게임 로직 핸들러 레이어
pub mod handler;

/// 공통 유틸리티 도구들
pub mod tool;

pub use config::{validate_config, TcpServerConfig};
pub use handler::{PacketRouter, build_default_router};
pub use protocol::ProtocolMessage;
pub use service::{Client, ClientMetrics, FrameQueue, MetricsSnapshot, ServerDispatcher, TcpServer};
pub use tool::{TcpResult, TcpServerError};
