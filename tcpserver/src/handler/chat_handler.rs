//! 채팅 핸들러
//!
//! 방 입장(CS_50102)과 방 채팅(CS_50101)을 처리합니다.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

use shared::ChatMessage;

use crate::handler::message_handler::PacketRouter;
use crate::protocol::{self, Cs50101, Cs50102};
use crate::service::client::Client;
use crate::service::tcp_service::TcpServer;

/// 채팅 핸들러
pub struct ChatHandler {
    server: Arc<TcpServer>,
}

impl ChatHandler {
    pub fn new(server: Arc<TcpServer>) -> Arc<Self> {
        Arc::new(Self { server })
    }

    /// 채팅 관련 핸들러를 라우터에 등록합니다.
    pub fn register(self: &Arc<Self>, router: &mut PacketRouter) {
        let handler = Arc::clone(self);
        router.register(protocol::JOIN_ROOM_PACKET_ID, move |payload, client| {
            handler.handle_join_room(payload, client)
        });

        let handler = Arc::clone(self);
        router.register(protocol::ROOM_CHAT_PACKET_ID, move |payload, client| {
            handler.handle_room_chat(payload, client)
        });
    }

    fn handle_join_room(&self, payload: &[u8], client: &Arc<Client>) -> Result<()> {
        let request: Cs50102 =
            serde_json::from_slice(payload).context("CS_50102 역직렬화 실패")?;

        let current = client.room();
        if current == 0 {
            self.server.join_room(request.room_id, client);
        } else if current != request.room_id {
            self.server.change_room(current, request.room_id, client);
        }
        debug!("{} 방 {} 입장", client.endpoint(), request.room_id);
        Ok(())
    }

    fn handle_room_chat(&self, payload: &[u8], client: &Arc<Client>) -> Result<()> {
        if client.commander().is_none() {
            anyhow::bail!("로그인 전에는 채팅할 수 없습니다");
        }
        let request: Cs50101 =
            serde_json::from_slice(payload).context("CS_50101 역직렬화 실패")?;
        let room_id = client.room();
        if room_id == 0 {
            anyhow::bail!("채팅방에 입장하지 않았습니다");
        }

        self.server
            .send_room_message(client, &ChatMessage::new(room_id, request.content));
        Ok(())
    }
}
