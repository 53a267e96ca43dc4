//! 로그인 핸들러
//!
//! CS_10022(서버 입장)를 처리합니다. 계정을 조회해 지휘관을 세션에
//! 연결하고, 같은 지휘관의 기존 세션이 있으면 중복 로그인 사유로 강제
//! 종료합니다. 지휘관당 살아있는 세션은 항상 하나입니다.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use shared::{CommanderStore, StoreError};

use crate::handler::message_handler::PacketRouter;
use crate::protocol::{self, Cs10022, Sc10023};
use crate::service::client::Client;
use crate::service::tcp_service::TcpServer;

/// 정상 로그인 결과 코드
pub const USER_STATUS_OK: u32 = 0;

const SERVER_TICKET: &str = "=*=*=*=HARBOR=*=*=*=";

/// 로그인 핸들러
pub struct AuthHandler {
    server: Arc<TcpServer>,
    store: Arc<dyn CommanderStore>,
}

impl AuthHandler {
    pub fn new(server: Arc<TcpServer>, store: Arc<dyn CommanderStore>) -> Arc<Self> {
        Arc::new(Self { server, store })
    }

    /// 로그인 핸들러를 라우터에 등록합니다.
    pub fn register(self: &Arc<Self>, router: &mut PacketRouter) {
        let handler = Arc::clone(self);
        router.register(protocol::JOIN_SERVER_PACKET_ID, move |payload, client| {
            handler.handle_join_server(payload, client)
        });
    }

    fn handle_join_server(&self, payload: &[u8], client: &Arc<Client>) -> Result<()> {
        let request: Cs10022 =
            serde_json::from_slice(payload).context("CS_10022 역직렬화 실패")?;
        let mut response = Sc10023 {
            result: USER_STATUS_OK,
            user_id: 0,
            server_ticket: SERVER_TICKET.to_string(),
        };

        match self.store.find_by_account(request.account_id) {
            Ok(commander) => {
                let commander_id = commander.commander_id;
                response.user_id = commander_id;
                client.set_commander(commander);
                info!("지휘관 {} 로그인: {}", commander_id, client.endpoint());

                // 중복 로그인 세션 정리 — 새로 인증한 이 연결은 제외
                let server = Arc::clone(&self.server);
                let survivor = Arc::clone(client);
                tokio::spawn(async move {
                    let kicked = server
                        .disconnect_commander(
                            commander_id,
                            protocol::DR_LOGGED_IN_ON_ANOTHER_DEVICE,
                            Some(&survivor),
                        )
                        .await;
                    if kicked {
                        info!("지휘관 {} 이전 세션을 종료했습니다", commander_id);
                    }
                });
            }
            Err(StoreError::NotFound(account_id)) => {
                // 계정 생성은 후속 패킷이 처리한다 — user_id 0으로 응답
                debug!(
                    "미등록 계정 {} 로그인 시도: {}",
                    account_id,
                    client.endpoint()
                );
            }
        }

        client.send_message(protocol::JOIN_SERVER_ACK_PACKET_ID, &response)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TcpServerConfig;
    use shared::MemoryCommanderStore;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};

    async fn test_client() -> (Arc<Client>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (accepted, connected) = tokio::join!(listener.accept(), TcpStream::connect(addr));
        let stream = accepted.unwrap().0;
        let peer = stream.peer_addr().unwrap();
        let (_read_half, write_half) = stream.into_split();
        (
            Arc::new(Client::new(peer.ip(), peer.port(), write_half, 8, 8)),
            connected.unwrap(),
        )
    }

    async fn read_frame(stream: &mut TcpStream) -> (u16, Vec<u8>) {
        let mut header = [0u8; protocol::HEADER_SIZE];
        stream.read_exact(&mut header).await.unwrap();
        let body_len =
            u16::from_be_bytes([header[0], header[1]]) as usize - protocol::MIN_PACKET_SIZE;
        let mut payload = vec![0u8; body_len];
        stream.read_exact(&mut payload).await.unwrap();
        (protocol::frame_packet_id(&header), payload)
    }

    /// 등록된 계정 로그인은 지휘관을 세션에 연결하고 user_id를 돌려줘야 함
    #[tokio::test]
    async fn test_known_account_login() {
        let server = TcpServer::new(TcpServerConfig::default());
        let store = Arc::new(MemoryCommanderStore::new());
        let commander = store.create_commander("Alice");

        let handler = AuthHandler::new(Arc::clone(&server), store.clone());
        let (client, mut peer) = test_client().await;

        let payload = serde_json::to_vec(&Cs10022 {
            account_id: commander.account_id,
        })
        .unwrap();
        handler.handle_join_server(&payload, &client).unwrap();

        assert_eq!(client.commander_id(), Some(commander.commander_id));

        client.flush().await.unwrap();
        let (packet_id, payload) = read_frame(&mut peer).await;
        assert_eq!(packet_id, protocol::JOIN_SERVER_ACK_PACKET_ID);
        let decoded: Sc10023 = serde_json::from_slice(&payload).unwrap();
        assert_eq!(decoded.result, USER_STATUS_OK);
        assert_eq!(decoded.user_id, commander.commander_id);
    }

    /// 미등록 계정은 user_id 0으로 응답하고 세션에 지휘관이 없어야 함
    #[tokio::test]
    async fn test_unknown_account_login() {
        let server = TcpServer::new(TcpServerConfig::default());
        let store = Arc::new(MemoryCommanderStore::new());
        let handler = AuthHandler::new(Arc::clone(&server), store);
        let (client, mut peer) = test_client().await;

        let payload = serde_json::to_vec(&Cs10022 { account_id: 4242 }).unwrap();
        handler.handle_join_server(&payload, &client).unwrap();

        assert_eq!(client.commander_id(), None);

        client.flush().await.unwrap();
        let (packet_id, payload) = read_frame(&mut peer).await;
        assert_eq!(packet_id, protocol::JOIN_SERVER_ACK_PACKET_ID);
        let decoded: Sc10023 = serde_json::from_slice(&payload).unwrap();
        assert_eq!(decoded.user_id, 0);
    }

    /// 잘못된 페이로드는 핸들러 에러가 되어야 함
    #[tokio::test]
    async fn test_malformed_payload() {
        let server = TcpServer::new(TcpServerConfig::default());
        let store = Arc::new(MemoryCommanderStore::new());
        let handler = AuthHandler::new(Arc::clone(&server), store);
        let (client, _peer) = test_client().await;

        assert!(handler.handle_join_server(b"not-json", &client).is_err());
        assert!(!client.is_closed());
    }
}
