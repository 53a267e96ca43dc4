//! 요청 처리 핸들러 레이어
//!
//! 디스패처 콜백 뒤에서 동작하는 게임 로직 경계입니다. 연결 엔진은
//! 패킷 ID의 의미를 알지 못하며, 라우터에 등록된 핸들러만이 페이로드를
//! 해석합니다.
//!
//! 여기 포함된 핸들러는 엔진을 끝까지 관통하는 최소 구성(하트비트,
//! 로그인, 채팅방)이며, 게임 메시지 카탈로그의 나머지는 같은 방식으로
//! 라우터에 추가 등록됩니다.

use std::sync::Arc;

use shared::CommanderStore;

use crate::protocol::{self, Sc10021};
use crate::service::tcp_service::TcpServer;

/// 로그인 핸들러
pub mod auth_handler;

/// 채팅 핸들러
pub mod chat_handler;

/// 패킷 라우터
pub mod message_handler;

pub use auth_handler::AuthHandler;
pub use chat_handler::ChatHandler;
pub use message_handler::{PacketHandler, PacketRouter};

/// 기본 핸들러 구성으로 라우터를 만듭니다.
pub fn build_default_router(
    server: Arc<TcpServer>,
    store: Arc<dyn CommanderStore>,
) -> PacketRouter {
    let mut router = PacketRouter::new();

    // CS_10020 하트비트 — 빈 페이로드 왕복
    router.register(protocol::HEARTBEAT_PACKET_ID, |_payload, client| {
        client.send_message(
            protocol::HEARTBEAT_ACK_PACKET_ID,
            &Sc10021 {
                timestamp: shared::tool::current_timestamp(),
            },
        )?;
        Ok(())
    });

    AuthHandler::new(Arc::clone(&server), store).register(&mut router);
    ChatHandler::new(server).register(&mut router);

    router
}
