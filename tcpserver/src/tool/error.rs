//! 공통 에러 처리 시스템
//!
//! 연결 엔진에서 발생하는 에러를 체계적으로 분류합니다.
//!
//! # 에러 분류와 처리 정책
//!
//! - **Transport / Protocol**: 연결 종료 (재시도 없음, 클라이언트가 재접속)
//! - **Backpressure**: 의도된 부하 차단, 연결 종료
//! - **Serialization / Write**: 송신 스트림을 신뢰할 수 없으므로 연결 종료
//! - **Handler**: 메트릭에 기록 후 연결 유지
//! - **ClientClosed**: 이미 종료된 클라이언트에 대한 작업 거부

use thiserror::Error;

/// TCP 서버 에러 타입
#[derive(Debug, Clone, Error)]
pub enum TcpServerError {
    /// 전송 계층 에러 (EOF, 리셋 등)
    #[error("전송 에러 [{addr}]: {message}")]
    Transport { addr: String, message: String },

    /// 프로토콜 에러 (잘못된 프레임 크기 등)
    #[error("프로토콜 에러 [{addr}]: {message}")]
    Protocol { addr: String, message: String },

    /// 백프레셔 에러 — 프레임 큐 포화
    #[error("큐 포화 [{addr}]: 수용 한도 {limit} 초과")]
    Backpressure { addr: String, limit: usize },

    /// 직렬화 에러 — 송신 메시지를 직렬화하지 못함
    #[error("직렬화 에러 [SC_{packet_id}]: {message}")]
    Serialization { packet_id: u16, message: String },

    /// 소켓 쓰기 에러
    #[error("쓰기 에러 [{addr}]: {message}")]
    Write { addr: String, message: String },

    /// 핸들러 에러 — 게임 로직이 보고한 실패
    #[error("핸들러 에러 [CS_{packet_id}]: {message}")]
    Handler { packet_id: u16, message: String },

    /// 이미 종료된 클라이언트
    #[error("클라이언트가 이미 종료되었습니다")]
    ClientClosed,
}

impl TcpServerError {
    /// 전송 에러 생성
    pub fn transport_error(addr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            addr: addr.into(),
            message: message.into(),
        }
    }

    /// 프로토콜 에러 생성
    pub fn protocol_error(addr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            addr: addr.into(),
            message: message.into(),
        }
    }

    /// 직렬화 에러 생성
    pub fn serialization_error(packet_id: u16, message: impl Into<String>) -> Self {
        Self::Serialization {
            packet_id,
            message: message.into(),
        }
    }

    /// 쓰기 에러 생성
    pub fn write_error(addr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            addr: addr.into(),
            message: message.into(),
        }
    }

    /// 연결을 종료해야 하는 에러인지 여부
    ///
    /// 핸들러 에러만 복구 가능하며, 나머지는 모두 연결 종료로 이어집니다.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Handler { .. })
    }
}

/// 결과 타입 별칭
pub type TcpResult<T> = Result<T, TcpServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    /// 에러 생성과 표시 테스트
    #[test]
    fn test_error_display() {
        let error = TcpServerError::transport_error("127.0.0.1:4000", "connection reset");
        let display = error.to_string();
        assert!(display.contains("전송 에러"));
        assert!(display.contains("127.0.0.1:4000"));
    }

    /// 핸들러 에러만 복구 가능해야 함
    #[test]
    fn test_fatality() {
        let handler = TcpServerError::Handler {
            packet_id: 10022,
            message: "bad payload".to_string(),
        };
        assert!(!handler.is_fatal());

        let backpressure = TcpServerError::Backpressure {
            addr: "10.0.0.1:5000".to_string(),
            limit: 512,
        };
        assert!(backpressure.is_fatal());
        assert!(TcpServerError::ClientClosed.is_fatal());
    }
}
