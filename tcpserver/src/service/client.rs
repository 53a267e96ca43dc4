//! 클라이언트 연결
//!
//! 소켓 쓰기 절반, 프레임 큐, 버퍼 풀, 송신 누적 버퍼, 종료 라이프사이클을
//! 소유합니다. 연결마다 프레임 프로세서 태스크 하나가 백그라운드에서 큐를
//! 비우며 디스패처를 호출합니다.
//!
//! 종료는 유일한 취소 수단이며, 리더 루프 / 레지스트리 제거 / 관리자 강제
//! 종료 / 점검 일괄 종료 어디에서 동시에 호출되어도 실제 정리는 정확히
//! 한 번만 수행됩니다 (CAS 가드).

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use parking_lot::{Mutex, RwLock};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use shared::{BufferPool, Commander};

use crate::protocol::{self, ProtocolMessage, Sc10999};
use crate::service::client_metrics::{ClientMetrics, MetricsSnapshot};
use crate::service::frame_queue::{EnqueueError, FrameQueue};
use crate::service::tcp_service::ServerDispatcher;
use crate::tool::error::TcpServerError;

/// 프로세스 전역 연결 ID 카운터
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// 클라이언트 연결 상태
pub struct Client {
    pub ip: IpAddr,
    pub port: u16,
    /// 레지스트리 키 — 프로세스 내에서 유일한 단조 증가 ID
    pub conn_id: u64,
    pub connected_at: chrono::DateTime<chrono::Utc>,

    commander: RwLock<Option<Arc<Commander>>>,
    packet_index: AtomicU32,
    room_id: AtomicU32,

    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    out_buffer: Mutex<BytesMut>,

    queue: FrameQueue,
    pool: BufferPool,
    metrics: Arc<ClientMetrics>,

    closed: AtomicBool,
    close_notify: Notify,
    dispatcher_started: AtomicBool,
}

impl Client {
    pub fn new(
        ip: IpAddr,
        port: u16,
        write_half: OwnedWriteHalf,
        queue_limit: usize,
        pool_size: usize,
    ) -> Self {
        let metrics = Arc::new(ClientMetrics::new());

        Self {
            ip,
            port,
            conn_id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            connected_at: chrono::Utc::now(),
            commander: RwLock::new(None),
            packet_index: AtomicU32::new(1),
            room_id: AtomicU32::new(0),
            writer: tokio::sync::Mutex::new(write_half),
            out_buffer: Mutex::new(BytesMut::new()),
            queue: FrameQueue::new(queue_limit, Arc::clone(&metrics)),
            pool: BufferPool::new(pool_size),
            metrics,
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
            dispatcher_started: AtomicBool::new(false),
        }
    }

    /// "ip:port" 형태의 원격 주소 문자열
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// 프레임 프로세서 태스크를 시작합니다. 중복 호출은 무시됩니다.
    pub fn start_dispatcher(self: &Arc<Self>, dispatcher: ServerDispatcher) {
        if self.dispatcher_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let client = Arc::clone(self);
        tokio::spawn(async move {
            client.dispatch_loop(dispatcher).await;
        });
    }

    async fn dispatch_loop(self: Arc<Self>, dispatcher: ServerDispatcher) {
        while let Some(frame) = self.queue.dequeue().await {
            if self.is_closed() {
                self.pool.release(frame);
                break;
            }
            self.metrics.record_frame_processed();
            let frame_size = frame.len();
            // 프레임 하나의 실패(에러든 패닉이든)가 연결을 죽여서는 안 된다
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                dispatcher(&frame, &self, frame_size)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    self.metrics.record_handler_error();
                    warn!("핸들러 에러 {} -> {:#}", self.endpoint(), err);
                }
                Err(_) => {
                    self.metrics.record_handler_error();
                    warn!("핸들러 패닉 {} (프레임 {}바이트)", self.endpoint(), frame_size);
                }
            }
            // 한 프레임 처리에서 버퍼링된 응답들을 한 번의 쓰기로 내보낸다
            let flush_failed = self.flush().await.is_err();
            self.pool.release(frame);
            if flush_failed {
                break;
            }
        }
        // 종료 시 남은 프레임은 풀로 되돌린다
        for frame in self.queue.drain() {
            self.pool.release(frame);
        }
    }

    /// 리더가 추출한 프레임을 큐에 넣습니다. 실패 시 버퍼를 풀로 되돌립니다.
    pub fn enqueue_frame(&self, frame: Vec<u8>) -> Result<(), TcpServerError> {
        match self.queue.enqueue(frame) {
            Ok(()) => Ok(()),
            Err((frame, reason)) => {
                self.pool.release(frame);
                match reason {
                    EnqueueError::Closed => Err(TcpServerError::ClientClosed),
                    EnqueueError::Full => Err(TcpServerError::Backpressure {
                        addr: self.endpoint(),
                        limit: self.queue.limit(),
                    }),
                }
            }
        }
    }

    /// 프레임 본문 수신용 버퍼를 풀에서 대여합니다.
    pub fn acquire_frame_buffer(&self, size: usize) -> Vec<u8> {
        self.pool.acquire(size)
    }

    /// 프레임 버퍼를 풀로 되돌립니다.
    pub fn release_frame_buffer(&self, buffer: Vec<u8>) {
        self.pool.release(buffer);
    }

    /// 프로토콜 메시지를 직렬화해 송신 누적 버퍼에 기록합니다.
    ///
    /// 직렬화 실패는 송신 스트림을 신뢰할 수 없게 만들므로 즉시 연결을
    /// 종료합니다. 실제 소켓 쓰기는 `flush`에서 일어납니다.
    pub fn send_message<M: ProtocolMessage>(
        &self,
        packet_id: u16,
        message: &M,
    ) -> Result<usize, TcpServerError> {
        if self.is_closed() {
            return Err(TcpServerError::ClientClosed);
        }
        let payload = match serde_json::to_vec(message) {
            Ok(payload) => payload,
            Err(err) => {
                self.metrics.record_handler_error();
                let err = TcpServerError::serialization_error(packet_id, err.to_string());
                self.close_with_error(&err);
                return Err(err);
            }
        };
        let index = self.next_packet_index();
        let header = protocol::generate_packet_header(packet_id, &payload, index);

        let mut buffer = self.out_buffer.lock();
        buffer.put_slice(&header);
        buffer.put_slice(&payload);
        let written = header.len() + payload.len();
        debug!("SC_{} - {}바이트 버퍼링 ({})", packet_id, written, self.endpoint());
        Ok(written)
    }

    /// 종료 사유를 담은 SC_10999 알림을 버퍼링합니다.
    pub fn disconnect(&self, reason: u8) -> Result<usize, TcpServerError> {
        self.send_message(
            protocol::DISCONNECT_PACKET_ID,
            &Sc10999 {
                reason: reason as u32,
            },
        )
    }

    /// 누적 버퍼를 소켓에 한 번의 쓰기로 내보내고 버퍼를 비웁니다.
    ///
    /// 쓰기 실패는 복구하지 않습니다 — 부분 전송된 스트림은 클라이언트의
    /// 프로토콜 상태를 어긋나게 하므로 연결을 종료합니다.
    pub async fn flush(&self) -> Result<(), TcpServerError> {
        let pending = {
            let mut buffer = self.out_buffer.lock();
            if buffer.is_empty() {
                return Ok(());
            }
            buffer.split().freeze()
        };

        let mut writer = self.writer.lock().await;
        if let Err(err) = writer.write_all(&pending).await {
            self.metrics.record_write_error();
            let err = TcpServerError::write_error(self.endpoint(), err.to_string());
            error!("플러시 실패 {} -> {}", self.endpoint(), err);
            self.close_with_error(&err);
            return Err(err);
        }
        Ok(())
    }

    /// 다음 송신 패킷 인덱스를 반환합니다. u16 범위에서 순환합니다.
    fn next_packet_index(&self) -> u16 {
        (self.packet_index.fetch_add(1, Ordering::Relaxed) & 0xFFFF) as u16
    }

    /// 연결을 종료합니다. 정리를 수행했으면 true를 반환합니다.
    pub fn close(&self) -> bool {
        self.shutdown(None)
    }

    /// 에러와 함께 연결을 종료합니다.
    pub fn close_with_error(&self, err: &TcpServerError) -> bool {
        self.shutdown(Some(err))
    }

    fn shutdown(&self, err: Option<&TcpServerError>) -> bool {
        // 동시 호출 중 정확히 하나만 정리를 수행한다
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        if let Some(err) = err {
            if !matches!(err, TcpServerError::ClientClosed) {
                error!("클라이언트 종료 {} -> {}", self.endpoint(), err);
            }
        }
        self.queue.close();
        self.close_notify.notify_one();
        self.log_metrics();
        true
    }

    /// 종료 신호를 기다립니다. 리더 루프가 select로 감시합니다.
    pub async fn closed(&self) {
        if self.is_closed() {
            return;
        }
        self.close_notify.notified().await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 인증 완료된 지휘관을 연결에 연결합니다.
    pub fn set_commander(&self, commander: Commander) {
        *self.commander.write() = Some(Arc::new(commander));
    }

    pub fn commander(&self) -> Option<Arc<Commander>> {
        self.commander.read().clone()
    }

    pub fn commander_id(&self) -> Option<u32> {
        self.commander.read().as_ref().map(|c| c.commander_id)
    }

    /// 현재 참여 중인 채팅방 (0 = 없음)
    pub fn room(&self) -> u32 {
        self.room_id.load(Ordering::SeqCst)
    }

    pub fn set_room(&self, room_id: u32) {
        self.room_id.store(room_id, Ordering::SeqCst);
    }

    /// 송신 누적 버퍼에 대기 중인 바이트 수 (진단/테스트 용도)
    pub fn buffered_len(&self) -> usize {
        self.out_buffer.lock().len()
    }

    /// 큐 길이 (진단/테스트 용도)
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn log_metrics(&self) {
        let snapshot = self.metrics.snapshot();
        info!(
            "{} 연결 통계: queueMax={} queueBlocks={} handlerErrors={} writeErrors={} frames={}",
            self.endpoint(),
            snapshot.queue_max,
            snapshot.queue_blocks,
            snapshot.handler_errors,
            snapshot.write_errors,
            snapshot.frames_processed,
        );
    }
}
