//! 패킷 라우터
//!
//! 패킷 ID별 핸들러를 등록하고, 전달받은 버퍼 안의 프레임들을 도착
//! 순서대로 디스패치합니다. TCP 특성상 세그먼트 하나에 여러 프레임이
//! 실려 올 수 있으므로 오프셋을 옮겨가며 전부 처리합니다.
//!
//! 핸들러가 돌려준 에러는 호출한 엔진이 메트릭에 기록할 뿐, 연결은
//! 유지됩니다. 프레임 하나가 잘못됐다고 세션을 끊지 않습니다.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::protocol;
use crate::service::client::Client;
use crate::service::tcp_service::ServerDispatcher;

/// 등록 가능한 패킷 핸들러
pub type PacketHandler = Box<dyn Fn(&[u8], &Arc<Client>) -> Result<()> + Send + Sync>;

/// 패킷 ID 기반 라우터
pub struct PacketRouter {
    handlers: HashMap<u16, Vec<PacketHandler>>,
}

impl PacketRouter {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// 패킷 핸들러를 등록합니다. 같은 ID에 여러 개를 등록할 수 있습니다.
    pub fn register<F>(&mut self, packet_id: u16, handler: F)
    where
        F: Fn(&[u8], &Arc<Client>) -> Result<()> + Send + Sync + 'static,
    {
        debug!("핸들러 등록: CS_{}", packet_id);
        self.handlers
            .entry(packet_id)
            .or_default()
            .push(Box::new(handler));
    }

    /// 버퍼 안의 모든 프레임을 순서대로 처리합니다.
    ///
    /// 등록되지 않은 패킷 ID는 기록만 하고 건너뜁니다.
    pub fn dispatch(&self, buffer: &[u8], client: &Arc<Client>, n: usize) -> Result<()> {
        let n = n.min(buffer.len());
        let mut offset = 0;

        while offset + protocol::HEADER_SIZE <= n {
            let frame = &buffer[offset..n];
            let total_size = u16::from_be_bytes([frame[0], frame[1]]) as usize;
            let frame_len = total_size + 2;
            if total_size < protocol::MIN_PACKET_SIZE || offset + frame_len > n {
                return Err(anyhow!(
                    "프레임 경계가 어긋났습니다 (offset={}, size={})",
                    offset,
                    total_size
                ));
            }

            let packet_id = protocol::frame_packet_id(frame);
            let payload = &frame[protocol::HEADER_SIZE..frame_len];

            match self.handlers.get(&packet_id) {
                None => {
                    debug!("등록되지 않은 패킷: CS_{}", packet_id);
                }
                Some(handlers) => {
                    for handler in handlers {
                        let start = std::time::Instant::now();
                        let result = handler(payload, client);
                        debug!("CS_{} 처리 시간: {:?}", packet_id, start.elapsed());
                        result?;
                    }
                }
            }

            offset += frame_len;
        }

        Ok(())
    }

    /// 서버에 넘길 디스패처 콜백으로 변환합니다.
    pub fn into_dispatcher(self) -> ServerDispatcher {
        let router = Arc::new(self);
        Arc::new(move |frame, client, size| router.dispatch(frame, client, size))
    }
}

impl Default for PacketRouter {
    fn default() -> Self {
        Self::new()
    }
}
