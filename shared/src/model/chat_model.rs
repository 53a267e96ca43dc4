//! 채팅 메시지 모델

use serde::{Deserialize, Serialize};

/// 일반 채팅 메시지 타입
pub const MSG_TYPE_NORMAL: u32 = 0;

/// 채팅방으로 전달되는 메시지
///
/// 방 멤버십 자체는 서버 메모리에만 존재하며 영속화되지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub room_id: u32,
    pub content: String,
}

impl ChatMessage {
    pub fn new(room_id: u32, content: impl Into<String>) -> Self {
        Self {
            room_id,
            content: content.into(),
        }
    }
}
