//! 게임 프로토콜 코덱
//!
//! 클라이언트와 서버 간 통신에 사용하는 길이 접두사 바이너리 프로토콜을 정의합니다.
//!
//! # 프레임 구조 (모든 정수는 빅엔디언)
//!
//! ```text
//! [ total_size:2 ][ reserved:1=0x00 ][ packet_id:2 ][ packet_index:2 ][ payload:N ]
//! ```
//!
//! `total_size = N + 5` 이며, 와이어 위의 완전한 프레임은 `2 + total_size` 바이트입니다.
//! 페이로드가 없는 프레임의 최소 `total_size`는 5이고, 그보다 작은 값은 프로토콜
//! 에러로 처리합니다. 헤더 뒤의 본문 해석(페이로드 역직렬화)은 디스패처의 책임이며
//! 코덱은 게임 메시지 카탈로그를 알지 못합니다.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 프레임 헤더 크기 (size:2 + reserved:1 + packet_id:2 + packet_index:2)
pub const HEADER_SIZE: usize = 7;

/// 유효한 total_size의 최솟값 (reserved + packet_id + packet_index)
pub const MIN_PACKET_SIZE: usize = 5;

// 패킷 ID
pub const HEARTBEAT_PACKET_ID: u16 = 10020;
pub const HEARTBEAT_ACK_PACKET_ID: u16 = 10021;
pub const JOIN_SERVER_PACKET_ID: u16 = 10022;
pub const JOIN_SERVER_ACK_PACKET_ID: u16 = 10023;
pub const DISCONNECT_PACKET_ID: u16 = 10999;
pub const ROOM_CHAT_PACKET_ID: u16 = 50101;
pub const JOIN_ROOM_PACKET_ID: u16 = 50102;
pub const GUILD_CHAT_PACKET_ID: u16 = 60008;

// 연결 종료 사유 코드 (SC_10999)
pub const DR_LOGGED_IN_ON_ANOTHER_DEVICE: u8 = 1;
pub const DR_SERVER_MAINTENANCE: u8 = 2;
pub const DR_GAME_UPDATE: u8 = 3;
pub const DR_OFFLINE_TOO_LONG: u8 = 4;
pub const DR_CONNECTION_LOST: u8 = 5;
pub const DR_CONNECTION_TO_SERVER_LOST: u8 = 6;
pub const DR_DATA_VALIDATION_FAILED: u8 = 7;
pub const DR_LOGIN_DATA_EXPIRED: u8 = 199;

/// 종료 사유 코드를 로그용 문자열로 변환합니다.
///
/// 알 수 없는 코드는 그대로 전송하지 않고 "unknown reason N"으로 표기합니다.
pub fn resolve_reason(reason: u8) -> String {
    match reason {
        DR_LOGGED_IN_ON_ANOTHER_DEVICE => "logged in on another device".to_string(),
        DR_SERVER_MAINTENANCE => "server maintenance".to_string(),
        DR_GAME_UPDATE => "game update".to_string(),
        DR_OFFLINE_TOO_LONG => "offline for too long".to_string(),
        DR_CONNECTION_LOST => "connection lost".to_string(),
        DR_CONNECTION_TO_SERVER_LOST => "lost connection to server".to_string(),
        DR_DATA_VALIDATION_FAILED => "data validation failed".to_string(),
        DR_LOGIN_DATA_EXPIRED => "login data expired".to_string(),
        other => format!("unknown reason {}", other),
    }
}

/// 프로토콜 코덱 에러
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// total_size가 최솟값보다 작음
    #[error("잘못된 패킷 크기 {0} (최소 5바이트)")]
    InvalidSize(usize),
}

/// 패킷 헤더를 생성합니다.
///
/// `total_size`는 페이로드 길이에 고정 트레일러 5바이트를 더한 값입니다.
pub fn generate_packet_header(packet_id: u16, payload: &[u8], packet_index: u16) -> [u8; HEADER_SIZE] {
    let total_size = (payload.len() + MIN_PACKET_SIZE) as u16;
    let mut header = [0u8; HEADER_SIZE];
    header[0..2].copy_from_slice(&total_size.to_be_bytes());
    header[2] = 0x00;
    header[3..5].copy_from_slice(&packet_id.to_be_bytes());
    header[5..7].copy_from_slice(&packet_index.to_be_bytes());
    header
}

/// 페이로드 앞에 패킷 헤더를 붙입니다.
pub fn inject_packet_header(packet_id: u16, payload: &mut Vec<u8>, packet_index: u16) {
    let header = generate_packet_header(packet_id, payload, packet_index);
    payload.splice(0..0, header.iter().copied());
}

/// 수신한 2바이트 크기 필드를 검증하고 본문 길이를 반환합니다.
pub fn read_packet_size(header: [u8; 2]) -> Result<usize, ProtocolError> {
    let size = u16::from_be_bytes(header) as usize;
    if size < MIN_PACKET_SIZE {
        return Err(ProtocolError::InvalidSize(size));
    }
    Ok(size)
}

/// 완전한 프레임(크기 필드 포함)에서 패킷 ID를 읽습니다.
pub fn frame_packet_id(frame: &[u8]) -> u16 {
    u16::from_be_bytes([frame[3], frame[4]])
}

/// 완전한 프레임(크기 필드 포함)에서 패킷 인덱스를 읽습니다.
pub fn frame_packet_index(frame: &[u8]) -> u16 {
    u16::from_be_bytes([frame[5], frame[6]])
}

/// 완전한 프레임에서 페이로드 구간을 반환합니다.
pub fn frame_payload(frame: &[u8]) -> &[u8] {
    &frame[HEADER_SIZE..]
}

/// 송신 가능한 프로토콜 메시지 마커 트레이트
///
/// 프로토콜 메시지 타입에만 구현되므로, 잘못된 타입을 내보내려는 시도는
/// 런타임 검사가 아니라 컴파일 에러가 됩니다.
pub trait ProtocolMessage: Serialize + Send + Sync {}

/// 채팅 페이로드에 실리는 플레이어 요약 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: u32,
    pub name: String,
    pub lv: u32,
}

/// SC_10999 — 서버 연결 종료 알림
///
/// 사유 코드 하나만 담는 고정 패킷입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sc10999 {
    pub reason: u32,
}

impl ProtocolMessage for Sc10999 {}

/// CS_10020 — 하트비트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cs10020 {}

/// SC_10021 — 하트비트 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sc10021 {
    pub timestamp: i64,
}

impl ProtocolMessage for Sc10021 {}

/// CS_10022 — 서버 입장(로그인) 요청
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cs10022 {
    pub account_id: u32,
}

/// SC_10023 — 서버 입장 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sc10023 {
    pub result: u32,
    pub user_id: u32,
    pub server_ticket: String,
}

impl ProtocolMessage for Sc10023 {}

/// CS_50101 — 채팅 전송
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cs50101 {
    pub content: String,
}

/// SC_50101 — 채팅방 메시지
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sc50101 {
    pub player: PlayerInfo,
    #[serde(rename = "type")]
    pub msg_type: u32,
    pub content: String,
}

impl ProtocolMessage for Sc50101 {}

/// CS_50102 — 채팅방 입장 요청
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cs50102 {
    pub room_id: u32,
}

/// SC_60008 — 길드 채팅 브로드캐스트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sc60008 {
    pub player: PlayerInfo,
    pub content: String,
}

impl ProtocolMessage for Sc60008 {}

#[cfg(test)]
mod tests {
    use super::*;

    /// 헤더 인코딩 결과가 정확한 바이트 배열이어야 함
    #[test]
    fn test_header_round_trip() {
        let payload = vec![0xAA, 0xBB];
        let header = generate_packet_header(0x1234, &payload, 0x0001);
        assert_eq!(header, [0x00, 0x07, 0x00, 0x12, 0x34, 0x00, 0x01]);

        let mut framed = payload.clone();
        inject_packet_header(0x1234, &mut framed, 0x0001);
        assert_eq!(&framed[..HEADER_SIZE], &header);
        assert_eq!(&framed[HEADER_SIZE..], &payload[..]);
    }

    /// total_size가 5보다 작으면 거부, 5이면 허용
    #[test]
    fn test_minimum_packet_size() {
        assert_eq!(
            read_packet_size([0x00, 0x04]),
            Err(ProtocolError::InvalidSize(4))
        );
        assert_eq!(read_packet_size([0x00, 0x05]), Ok(5));
    }

    /// 빈 페이로드 프레임의 헤더 필드를 다시 읽을 수 있어야 함
    #[test]
    fn test_frame_accessors() {
        let mut frame = Vec::new();
        inject_packet_header(10999, &mut frame, 3);

        assert_eq!(frame.len(), HEADER_SIZE);
        assert_eq!(frame_packet_id(&frame), 10999);
        assert_eq!(frame_packet_index(&frame), 3);
        assert!(frame_payload(&frame).is_empty());
    }

    /// 알 수 없는 종료 사유는 "unknown reason N"으로 표기
    #[test]
    fn test_resolve_reason() {
        assert_eq!(
            resolve_reason(DR_SERVER_MAINTENANCE),
            "server maintenance"
        );
        assert_eq!(resolve_reason(42), "unknown reason 42");
    }

    /// 채팅 페이로드 직렬화/역직렬화 왕복
    #[test]
    fn test_chat_payload_serialization() {
        let packet = Sc50101 {
            player: PlayerInfo {
                id: 1234,
                name: "Alice".to_string(),
                lv: 11,
            },
            msg_type: 0,
            content: "hello".to_string(),
        };

        let bytes = serde_json::to_vec(&packet).unwrap();
        let decoded: Sc50101 = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded.player.id, 1234);
        assert_eq!(decoded.player.name, "Alice");
        assert_eq!(decoded.player.lv, 11);
        assert_eq!(decoded.content, "hello");
    }
}
