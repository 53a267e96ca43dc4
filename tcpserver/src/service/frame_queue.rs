//! 프레임 큐
//!
//! 소켓 리더와 프레임 프로세서 사이의 고정 용량 FIFO입니다.
//!
//! 핵심 계약: enqueue는 절대 블로킹하지 않고(포화 시 즉시 실패),
//! dequeue는 프레임이 도착하거나 큐가 닫힐 때까지만 대기합니다.
//! 포화 실패는 버그가 아니라 의도된 부하 차단이며, 호출자는 이를
//! 연결 종료 사유로 다룹니다.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;

use crate::service::client_metrics::ClientMetrics;

/// enqueue 실패 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    /// 클라이언트가 이미 종료를 시작함
    #[error("큐가 이미 닫혔습니다")]
    Closed,
    /// 큐가 용량 한도에 도달함
    #[error("큐가 가득 찼습니다")]
    Full,
}

struct QueueState {
    frames: VecDeque<Vec<u8>>,
    closed: bool,
}

/// 고정 용량 프레임 FIFO
///
/// 소비자는 연결당 프로세서 태스크 하나뿐입니다. 대기/신호에는
/// 단일 소비자 전제 하에 permit을 저장하는 `Notify::notify_one`을 사용합니다.
pub struct FrameQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    limit: usize,
    metrics: Arc<ClientMetrics>,
}

impl FrameQueue {
    pub fn new(limit: usize, metrics: Arc<ClientMetrics>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                frames: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
            limit,
            metrics,
        }
    }

    /// 프레임을 큐에 추가합니다. 어떤 경우에도 블로킹하지 않습니다.
    ///
    /// 닫힌 큐에는 `Closed`, 포화 상태에서는 `Full`로 즉시 실패하며
    /// `Full`은 blocked-enqueue 카운터를 1 증가시킵니다.
    pub fn enqueue(&self, frame: Vec<u8>) -> Result<(), (Vec<u8>, EnqueueError)> {
        let mut state = self.state.lock();
        if state.closed {
            return Err((frame, EnqueueError::Closed));
        }
        if state.frames.len() >= self.limit {
            self.metrics.record_queue_block();
            return Err((frame, EnqueueError::Full));
        }
        state.frames.push_back(frame);
        self.metrics.record_queue_depth(state.frames.len() as u64);
        drop(state);
        self.notify.notify_one();
        Ok(())
    }

    /// 프레임이 도착할 때까지 대기합니다. 큐가 닫히면 `None`을 반환합니다.
    ///
    /// 닫힌 뒤 남아 있는 프레임은 처리하지 않으며 `drain`으로 회수합니다.
    pub async fn dequeue(&self) -> Option<Vec<u8>> {
        loop {
            {
                let mut state = self.state.lock();
                if state.closed {
                    return None;
                }
                if let Some(frame) = state.frames.pop_front() {
                    return Some(frame);
                }
            }
            self.notify.notified().await;
        }
    }

    /// 큐를 닫고 대기 중인 소비자를 깨웁니다.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            state.closed = true;
        }
        self.notify.notify_one();
    }

    /// 닫힌 큐에 남아 있는 프레임을 한 번에 회수합니다.
    ///
    /// 호출자가 버퍼를 풀로 되돌려줄 책임을 가집니다.
    pub fn drain(&self) -> Vec<Vec<u8>> {
        let mut state = self.state.lock();
        state.frames.drain(..).collect()
    }

    /// 현재 큐 길이 (진단/테스트 용도)
    pub fn len(&self) -> usize {
        self.state.lock().frames.len()
    }

    /// 큐 용량 한도
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
