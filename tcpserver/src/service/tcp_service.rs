//! TCP 서버 서비스
//!
//! 수락 루프, 클라이언트 레지스트리, 채팅방, 브로드캐스트, 점검 모드 등
//! 서버 수준 동작을 담당합니다.
//!
//! 연결마다 두 개의 태스크가 동작합니다. 리더는 소켓에서 길이 접두사
//! 프레임을 추출해 클라이언트의 프레임 큐에 넣고, 프로세서(클라이언트
//! 소유)는 큐를 비우며 디스패처를 호출합니다. 레지스트리와 방 목록은
//! 각각 독립된 동시성 맵으로 관리되어 연결 변동과 방 조작이 서로
//! 경합하지 않습니다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use shared::{ChatMessage, MSG_TYPE_NORMAL};

use crate::config::TcpServerConfig;
use crate::protocol::{self, PlayerInfo, Sc50101, Sc60008};
use crate::service::client::Client;
use crate::tool::error::TcpServerError;
use crate::tool::network_utils::is_trusted_source;

/// 디스패처 콜백
///
/// 디코딩된 프레임마다 한 번 호출되는 게임 로직 경계입니다.
/// 반환된 에러는 메트릭에 기록될 뿐 연결을 종료시키지 않습니다.
pub type ServerDispatcher = Arc<dyn Fn(&[u8], &Arc<Client>, usize) -> Result<()> + Send + Sync>;

/// TCP 게임 서버
pub struct TcpServer {
    config: TcpServerConfig,
    pub start_time: chrono::DateTime<chrono::Utc>,

    dispatcher: RwLock<Option<ServerDispatcher>>,
    accepting_connections: AtomicBool,
    maintenance_enabled: AtomicBool,

    /// 연결 ID -> 클라이언트
    clients: DashMap<u64, Arc<Client>>,
    /// 방 ID -> 순서 유지 멤버 목록
    rooms: DashMap<u32, Vec<Arc<Client>>>,
}

impl TcpServer {
    pub fn new(config: TcpServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            start_time: chrono::Utc::now(),
            dispatcher: RwLock::new(None),
            accepting_connections: AtomicBool::new(true),
            maintenance_enabled: AtomicBool::new(false),
            clients: DashMap::new(),
            rooms: DashMap::new(),
        })
    }

    pub fn region(&self) -> &str {
        &self.config.region
    }

    /// 프레임 디스패처를 설정합니다. 서버 기동 전에 호출해야 합니다.
    pub fn set_dispatcher(&self, dispatcher: ServerDispatcher) {
        *self.dispatcher.write() = Some(dispatcher);
    }

    /// 리스너를 바인드하고 수락 루프를 시작합니다.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .context("TCP 리스너 바인드 실패")?;
        info!(
            "{}:{}에서 수신 대기 중 (region={})",
            self.config.host, self.config.port, self.config.region
        );
        self.serve(listener).await
    }

    /// 이미 바인드된 리스너로 수락 루프를 돌립니다.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("새 연결 요청: {}", addr);
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        server.handle_connection(stream).await;
                    });
                }
                Err(err) => {
                    error!("연결 수락 실패: {}", err);
                }
            }
        }
    }

    /// 연결 하나의 전체 수명을 담당합니다.
    ///
    /// 검증(점검 상태, 수락 여부, 출처 대역, 수용량)에 실패한 연결은
    /// 등록 없이 즉시 닫힙니다.
    async fn handle_connection(self: Arc<Self>, stream: TcpStream) {
        let peer = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(err) => {
                error!("원격 주소 조회 실패: {}", err);
                return;
            }
        };

        if self.maintenance_enabled() {
            info!("점검 중이므로 {} 연결을 거부합니다", peer);
            return;
        }
        if !self.is_accepting_connections() {
            info!("수락 중지 상태이므로 {} 연결을 거부합니다", peer);
            return;
        }
        if !is_trusted_source(&peer.ip()) {
            warn!("허용 대역 밖의 연결 거부: {}", peer);
            return;
        }
        if self.client_count() >= self.config.max_connections {
            warn!(
                "최대 연결 수 초과: {}/{}, {} 거부",
                self.client_count(),
                self.config.max_connections,
                peer
            );
            return;
        }
        let dispatcher = match self.dispatcher.read().clone() {
            Some(dispatcher) => dispatcher,
            None => {
                error!("디스패처가 설정되지 않아 {}를 거부합니다", peer);
                return;
            }
        };

        let (read_half, write_half) = stream.into_split();
        let client = Arc::new(Client::new(
            peer.ip(),
            peer.port(),
            write_half,
            self.config.queue_limit,
            self.config.pool_size,
        ));
        self.add_client(Arc::clone(&client));
        client.start_dispatcher(dispatcher);

        self.read_loop(client, read_half).await;
    }

    /// 소켓에서 프레임을 추출해 클라이언트 큐에 적재합니다.
    ///
    /// EOF, 잘못된 크기 필드, 큐 적재 실패는 모두 연결 종료로 이어집니다.
    async fn read_loop(&self, client: Arc<Client>, read_half: OwnedReadHalf) {
        let mut reader = BufReader::new(read_half);
        let mut size_header = [0u8; 2];

        loop {
            if client.is_closed() {
                self.remove_client(&client);
                return;
            }

            tokio::select! {
                _ = client.closed() => {
                    self.remove_client(&client);
                    return;
                }
                result = reader.read_exact(&mut size_header) => {
                    if let Err(err) = result {
                        if err.kind() != std::io::ErrorKind::UnexpectedEof {
                            client.close_with_error(&TcpServerError::transport_error(
                                client.endpoint(),
                                err.to_string(),
                            ));
                        }
                        self.remove_client(&client);
                        return;
                    }
                }
            }

            let size = match protocol::read_packet_size(size_header) {
                Ok(size) => size,
                Err(err) => {
                    client.close_with_error(&TcpServerError::protocol_error(
                        client.endpoint(),
                        err.to_string(),
                    ));
                    self.remove_client(&client);
                    return;
                }
            };

            let mut frame = client.acquire_frame_buffer(size + 2);
            frame[..2].copy_from_slice(&size_header);
            if let Err(err) = reader.read_exact(&mut frame[2..]).await {
                client.release_frame_buffer(frame);
                if err.kind() != std::io::ErrorKind::UnexpectedEof {
                    client.close_with_error(&TcpServerError::transport_error(
                        client.endpoint(),
                        err.to_string(),
                    ));
                }
                self.remove_client(&client);
                return;
            }

            if let Err(err) = client.enqueue_frame(frame) {
                client.close_with_error(&err);
                self.remove_client(&client);
                return;
            }
        }
    }

    // ---- 레지스트리 ----

    pub fn add_client(&self, client: Arc<Client>) {
        debug!("새 연결 등록: {}", client.endpoint());
        self.clients.insert(client.conn_id, client);
    }

    /// 클라이언트를 레지스트리에서 제거하고 닫습니다.
    pub fn remove_client(&self, client: &Arc<Client>) {
        client.close();
        self.leave_all_rooms(client);
        if self.clients.remove(&client.conn_id).is_some() {
            debug!("연결 해제: {}", client.endpoint());
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// 레지스트리 스냅샷 (라이브 뷰 아님)
    pub fn list_clients(&self) -> Vec<Arc<Client>> {
        self.clients
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn find_client(&self, conn_id: u64) -> Option<Arc<Client>> {
        self.clients
            .get(&conn_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// 지휘관 ID로 세션을 찾습니다. 수백 연결 규모에서는 선형 탐색으로 충분합니다.
    pub fn find_client_by_commander(&self, commander_id: u32) -> Option<Arc<Client>> {
        self.clients
            .iter()
            .find(|entry| entry.value().commander_id() == Some(commander_id))
            .map(|entry| Arc::clone(entry.value()))
    }

    // ---- 상태 토글 ----

    /// 점검 모드를 켜면 모든 연결을 점검 사유로 종료하고,
    /// 켜져 있는 동안 새 연결을 거부합니다.
    pub async fn set_maintenance(&self, enabled: bool) {
        self.maintenance_enabled.store(enabled, Ordering::SeqCst);
        if enabled {
            info!("점검 모드 활성화, 전체 연결을 종료합니다");
            self.disconnect_all(protocol::DR_SERVER_MAINTENANCE).await;
        }
    }

    pub fn maintenance_enabled(&self) -> bool {
        self.maintenance_enabled.load(Ordering::SeqCst)
    }

    pub async fn set_accepting_connections(&self, enabled: bool) {
        self.accepting_connections.store(enabled, Ordering::SeqCst);
        if !enabled {
            info!("연결 수락 중지, 전체 연결을 종료합니다");
            self.disconnect_all(protocol::DR_CONNECTION_TO_SERVER_LOST)
                .await;
        }
    }

    pub fn is_accepting_connections(&self) -> bool {
        self.accepting_connections.load(Ordering::SeqCst)
    }

    // ---- 강제 종료 ----

    /// 모든 클라이언트에게 SC_10999를 보내고 연결을 종료합니다.
    ///
    /// 알림 전송은 최선 노력이며, 실패해도 종료는 계속 진행합니다.
    pub async fn disconnect_all(&self, reason: u8) {
        for client in self.list_clients() {
            debug!(
                "연결 종료 {} -> {}",
                client.endpoint(),
                protocol::resolve_reason(reason)
            );
            if let Err(err) = client.disconnect(reason) {
                warn!("종료 알림 버퍼링 실패 {} -> {}", client.endpoint(), err);
            }
            if let Err(err) = client.flush().await {
                warn!("종료 알림 플러시 실패 {} -> {}", client.endpoint(), err);
            }
            self.remove_client(&client);
        }
    }

    /// 지휘관 ID의 기존 세션을 강제 종료합니다.
    ///
    /// 로그인 시점에 "지휘관당 세션 하나" 정책을 적용하기 위해 쓰이며,
    /// 새로 인증한 연결을 `exclude`로 넘기면 그 연결은 살아남습니다.
    pub async fn disconnect_commander(
        &self,
        commander_id: u32,
        reason: u8,
        exclude: Option<&Arc<Client>>,
    ) -> bool {
        let existing = self.list_clients().into_iter().find(|candidate| {
            candidate.commander_id() == Some(commander_id)
                && exclude.map_or(true, |kept| !Arc::ptr_eq(candidate, kept))
        });
        let Some(existing) = existing else {
            return false;
        };

        info!(
            "지휘관 {} 중복 세션 강제 종료: {} ({})",
            commander_id,
            existing.endpoint(),
            protocol::resolve_reason(reason)
        );
        if let Err(err) = existing.disconnect(reason) {
            warn!("종료 알림 버퍼링 실패 {} -> {}", existing.endpoint(), err);
        }
        if let Err(err) = existing.flush().await {
            warn!("종료 알림 플러시 실패 {} -> {}", existing.endpoint(), err);
        }
        self.remove_client(&existing);
        true
    }

    // ---- 채팅방 ----

    pub fn join_room(&self, room_id: u32, client: &Arc<Client>) {
        self.rooms
            .entry(room_id)
            .or_default()
            .push(Arc::clone(client));
        client.set_room(room_id);
    }

    pub fn leave_room(&self, room_id: u32, client: &Arc<Client>) {
        if let Some(mut members) = self.rooms.get_mut(&room_id) {
            // 순서를 유지하며 제거한다
            if let Some(position) = members.iter().position(|member| Arc::ptr_eq(member, client)) {
                members.remove(position);
            }
        }
        client.set_room(0);
    }

    pub fn change_room(&self, old_room_id: u32, new_room_id: u32, client: &Arc<Client>) {
        if let Some(mut members) = self.rooms.get_mut(&old_room_id) {
            if let Some(position) = members.iter().position(|member| Arc::ptr_eq(member, client)) {
                members.remove(position);
            }
        }
        self.rooms
            .entry(new_room_id)
            .or_default()
            .push(Arc::clone(client));
        client.set_room(new_room_id);
    }

    pub fn room_len(&self, room_id: u32) -> usize {
        self.rooms
            .get(&room_id)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    /// 방 멤버 스냅샷 (진단/테스트 용도)
    pub fn room_members(&self, room_id: u32) -> Vec<Arc<Client>> {
        self.rooms
            .get(&room_id)
            .map(|members| members.clone())
            .unwrap_or_default()
    }

    fn leave_all_rooms(&self, client: &Arc<Client>) {
        let room_id = client.room();
        if room_id != 0 {
            self.leave_room(room_id, client);
        }
    }

    // ---- 메시징 ----

    /// 송신자의 지휘관 정보를 담아 방 전체에 SC_50101을 버퍼링합니다.
    ///
    /// 수신자 하나의 실패가 나머지 전달을 중단시키지 않습니다.
    pub fn send_room_message(&self, sender: &Arc<Client>, message: &ChatMessage) {
        let Some(commander) = sender.commander() else {
            warn!("지휘관 없는 송신자의 채팅 무시: {}", sender.endpoint());
            return;
        };
        let packet = Sc50101 {
            player: PlayerInfo {
                id: commander.commander_id,
                name: commander.name.clone(),
                lv: commander.level,
            },
            msg_type: MSG_TYPE_NORMAL,
            content: message.content.clone(),
        };
        let members = self.room_members(message.room_id);
        for member in members {
            if let Err(err) = member.send_message(protocol::ROOM_CHAT_PACKET_ID, &packet) {
                warn!("채팅 전달 실패 {} -> {}", member.endpoint(), err);
            }
        }
    }

    /// 등록된 모든 클라이언트에게 길드 채팅을 버퍼링합니다.
    pub fn broadcast_guild_chat(&self, message: &Sc60008) {
        for client in self.list_clients() {
            if let Err(err) = client.send_message(protocol::GUILD_CHAT_PACKET_ID, message) {
                warn!("길드 채팅 전달 실패 {} -> {}", client.endpoint(), err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Commander;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    async fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (accepted, connected) = tokio::join!(listener.accept(), TcpStream::connect(addr));
        (accepted.unwrap().0, connected.unwrap())
    }

    async fn test_client(server: &TcpServer) -> (Arc<Client>, TcpStream) {
        let (server_side, client_side) = tcp_pair().await;
        let peer = server_side.peer_addr().unwrap();
        let (_read_half, write_half) = server_side.into_split();
        let client = Arc::new(Client::new(peer.ip(), peer.port(), write_half, 64, 16));
        server.add_client(Arc::clone(&client));
        (client, client_side)
    }

    fn commander(id: u32, name: &str, level: u32) -> Commander {
        Commander {
            account_id: id,
            commander_id: id,
            name: name.to_string(),
            level,
        }
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

    /// 방 입장/퇴장/이동 시 멤버십과 순서가 유지되어야 함
    #[tokio::test]
    async fn test_room_membership() {
        let server = TcpServer::new(TcpServerConfig::default());
        let (client_a, _peer_a) = test_client(&server).await;
        let (client_b, _peer_b) = test_client(&server).await;

        server.join_room(5, &client_a);
        server.join_room(5, &client_b);
        assert_eq!(server.room_len(5), 2);

        server.leave_room(5, &client_a);
        assert_eq!(server.room_len(5), 1);
        assert!(Arc::ptr_eq(&server.room_members(5)[0], &client_b));

        server.change_room(5, 9, &client_b);
        assert_eq!(server.room_len(5), 0);
        assert_eq!(server.room_len(9), 1);
        assert!(Arc::ptr_eq(&server.room_members(9)[0], &client_b));
        assert_eq!(client_b.room(), 9);
    }

    /// 방 전체 채팅은 모든 멤버에게 50101 프레임을 남기고
    /// 페이로드는 송신자 정보를 그대로 복원해야 함
    #[tokio::test]
    async fn test_room_broadcast_payload() {
        let server = TcpServer::new(TcpServerConfig::default());
        let (sender, mut sender_peer) = test_client(&server).await;
        let (listener_client, mut listener_peer) = test_client(&server).await;

        sender.set_commander(commander(1234, "Alice", 11));
        server.join_room(7, &sender);
        server.join_room(7, &listener_client);

        server.send_room_message(&sender, &ChatMessage::new(7, "hello"));

        for (member, peer) in [
            (&sender, &mut sender_peer),
            (&listener_client, &mut listener_peer),
        ] {
            assert!(member.buffered_len() > 0);
            member.flush().await.unwrap();

            let (packet_id, payload) = read_frame(peer).await;
            assert_eq!(packet_id, 50101);
            let decoded: Sc50101 = serde_json::from_slice(&payload).unwrap();
            assert_eq!(decoded.player.id, 1234);
            assert_eq!(decoded.player.name, "Alice");
            assert_eq!(decoded.player.lv, 11);
            assert_eq!(decoded.content, "hello");
        }
    }

    /// 중복 로그인 강제 종료는 기존 세션만 끊고 새 세션은 남겨야 함
    #[tokio::test]
    async fn test_disconnect_commander_excludes_new_session() {
        let server = TcpServer::new(TcpServerConfig::default());
        let (old_session, mut old_peer) = test_client(&server).await;
        let (new_session, _new_peer) = test_client(&server).await;

        old_session.set_commander(commander(77, "Bob", 30));
        new_session.set_commander(commander(77, "Bob", 30));

        let kicked = server
            .disconnect_commander(
                77,
                protocol::DR_LOGGED_IN_ON_ANOTHER_DEVICE,
                Some(&new_session),
            )
            .await;

        assert!(kicked);
        assert!(old_session.is_closed());
        assert!(!new_session.is_closed());
        assert!(server.find_client(old_session.conn_id).is_none());
        assert!(server.find_client(new_session.conn_id).is_some());

        let (packet_id, payload) = read_frame(&mut old_peer).await;
        assert_eq!(packet_id, 10999);
        let decoded: protocol::Sc10999 = serde_json::from_slice(&payload).unwrap();
        assert_eq!(
            decoded.reason,
            protocol::DR_LOGGED_IN_ON_ANOTHER_DEVICE as u32
        );

        // 대상 세션이 없으면 false
        let again = server
            .disconnect_commander(77, protocol::DR_LOGGED_IN_ON_ANOTHER_DEVICE, Some(&new_session))
            .await;
        assert!(!again);
    }

    /// 점검 모드는 전체 연결을 점검 사유로 종료하고 레지스트리를 비워야 함
    #[tokio::test]
    async fn test_maintenance_disconnects_all() {
        let server = TcpServer::new(TcpServerConfig::default());
        let (client_a, mut peer_a) = test_client(&server).await;
        let (client_b, mut peer_b) = test_client(&server).await;
        server.join_room(3, &client_a);

        server.set_maintenance(true).await;

        assert!(server.maintenance_enabled());
        assert_eq!(server.client_count(), 0);
        assert_eq!(server.room_len(3), 0);
        assert!(client_a.is_closed());
        assert!(client_b.is_closed());

        for peer in [&mut peer_a, &mut peer_b] {
            let (packet_id, payload) = read_frame(peer).await;
            assert_eq!(packet_id, 10999);
            let decoded: protocol::Sc10999 = serde_json::from_slice(&payload).unwrap();
            assert_eq!(decoded.reason, protocol::DR_SERVER_MAINTENANCE as u32);
        }
    }

    /// 길드 채팅은 레지스트리의 모든 클라이언트에게 버퍼링되어야 하고
    /// 한 명의 실패가 나머지 전달을 막지 않아야 함
    #[tokio::test]
    async fn test_guild_chat_broadcast() {
        let server = TcpServer::new(TcpServerConfig::default());
        let (client_a, mut peer_a) = test_client(&server).await;
        let (client_b, mut peer_b) = test_client(&server).await;

        // 한 명은 이미 종료된 상태
        let (closed_client, _closed_peer) = test_client(&server).await;
        closed_client.close();

        server.broadcast_guild_chat(&Sc60008 {
            player: PlayerInfo {
                id: 9000,
                name: "Dana".to_string(),
                lv: 50,
            },
            content: "guild hello".to_string(),
        });

        for (member, peer) in [(&client_a, &mut peer_a), (&client_b, &mut peer_b)] {
            assert!(member.buffered_len() > 0);
            member.flush().await.unwrap();
            let (packet_id, payload) = read_frame(peer).await;
            assert_eq!(packet_id, 60008);
            let decoded: Sc60008 = serde_json::from_slice(&payload).unwrap();
            assert_eq!(decoded.player.id, 9000);
            assert_eq!(decoded.content, "guild hello");
        }
        assert_eq!(closed_client.buffered_len(), 0);
    }

    /// 지휘관 ID 선형 탐색
    #[tokio::test]
    async fn test_find_client_by_commander() {
        let server = TcpServer::new(TcpServerConfig::default());
        let (client, _peer) = test_client(&server).await;
        assert!(server.find_client_by_commander(55).is_none());

        client.set_commander(commander(55, "Carol", 9));
        let found = server.find_client_by_commander(55).unwrap();
        assert!(Arc::ptr_eq(&found, &client));
    }
}
