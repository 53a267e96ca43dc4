//! 연결별 메트릭
//!
//! 연결 하나가 유지하는 원자적 카운터 집합입니다.
//! 모든 필드는 AtomicU64로 구성되어 핫패스에서 락을 잡지 않습니다.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// 연결 하나의 메트릭 카운터
#[derive(Debug, Default)]
pub struct ClientMetrics {
    /// 큐 깊이 최고 수위
    queue_max: AtomicU64,
    /// 큐 포화로 거부된 enqueue 횟수
    queue_blocks: AtomicU64,
    /// 핸들러 에러 횟수
    handler_errors: AtomicU64,
    /// 소켓 쓰기 에러 횟수
    write_errors: AtomicU64,
    /// 처리 완료한 프레임 수
    frames_processed: AtomicU64,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 현재 큐 깊이를 기록하고 최고 수위를 갱신합니다.
    pub fn record_queue_depth(&self, depth: u64) {
        self.queue_max.fetch_max(depth, Ordering::Relaxed);
    }

    pub fn record_queue_block(&self) {
        self.queue_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_processed(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// 외부 보고용 스냅샷을 만듭니다.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_max: self.queue_max.load(Ordering::Relaxed),
            queue_blocks: self.queue_blocks.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
        }
    }
}

/// 메트릭 스냅샷 (조회용 불변 데이터)
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub queue_max: u64,
    pub queue_blocks: u64,
    pub handler_errors: u64,
    pub write_errors: u64,
    pub frames_processed: u64,
}
