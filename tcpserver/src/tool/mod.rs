//! 공통 유틸리티 도구들
//!
//! 에러 분류와 네트워크 검사 유틸리티를 포함합니다.

/// 에러 처리
///
/// 서버에서 발생하는 에러를 체계적으로 분류합니다.
pub mod error;

/// 네트워크 유틸리티
pub mod network_utils;

pub use error::{TcpResult, TcpServerError};
pub use network_utils::is_trusted_source;
