//! 처리 통계 카운터
//!
//! 수신 태스크와 전달 태스크가 `Arc<ShipperStats>`를 공유하며 갱신합니다.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::Serialize;

/// 파이프라인 처리 통계
#[derive(Debug, Default)]
pub struct ShipperStats {
    messages_received: AtomicU64,
    messages_acked: AtomicU64,
    messages_left: AtomicU64,
    messages_discarded: AtomicU64,
    objects_processed: AtomicU64,
    objects_failed: AtomicU64,
    entries_handed_off: AtomicU64,
    entries_delivered: AtomicU64,
    entries_dropped: AtomicU64,
    entries_dead_lettered: AtomicU64,
    consecutive_receive_failures: AtomicU32,
}

/// 특정 시점의 통계 값
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// 수신한 메시지 수
    pub messages_received: u64,
    /// 확인(삭제)한 메시지 수
    pub messages_acked: u64,
    /// 재전달을 위해 남겨둔 메시지 수
    pub messages_left: u64,
    /// 해석 불가로 삭제한 메시지 수
    pub messages_discarded: u64,
    /// 처리 완료한 오브젝트 수
    pub objects_processed: u64,
    /// 조회/해제에 실패한 오브젝트 수
    pub objects_failed: u64,
    /// 전달 채널에 넣은 엔트리 수
    pub entries_handed_off: u64,
    /// 백엔드가 수락한 엔트리 수
    pub entries_delivered: u64,
    /// 전달 실패로 버린 엔트리 수
    pub entries_dropped: u64,
    /// dead letter 파일에 기록한 엔트리 수
    pub entries_dead_lettered: u64,
    /// 연속 수신 실패 횟수
    pub consecutive_receive_failures: u32,
}

fn bump(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

impl ShipperStats {
    /// 빈 통계를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self, n: u64) {
        bump(&self.messages_received, n);
    }

    pub(crate) fn record_acked(&self) {
        bump(&self.messages_acked, 1);
    }

    pub(crate) fn record_left(&self) {
        bump(&self.messages_left, 1);
    }

    pub(crate) fn record_discarded(&self) {
        bump(&self.messages_discarded, 1);
    }

    pub(crate) fn record_object_processed(&self) {
        bump(&self.objects_processed, 1);
    }

    pub(crate) fn record_object_failed(&self) {
        bump(&self.objects_failed, 1);
    }

    pub(crate) fn record_handed_off(&self) {
        bump(&self.entries_handed_off, 1);
    }

    pub(crate) fn record_delivered(&self) {
        bump(&self.entries_delivered, 1);
    }

    pub(crate) fn record_dropped(&self, n: u64) {
        bump(&self.entries_dropped, n);
    }

    pub(crate) fn record_dead_lettered(&self) {
        bump(&self.entries_dead_lettered, 1);
    }

    /// 수신 실패를 기록하고 연속 실패 횟수를 반환합니다.
    pub(crate) fn record_receive_failure(&self) -> u32 {
        self.consecutive_receive_failures
            .fetch_add(1, Ordering::Relaxed)
            .saturating_add(1)
    }

    pub(crate) fn reset_receive_failures(&self) {
        self.consecutive_receive_failures.store(0, Ordering::Relaxed);
    }

    /// 연속 수신 실패 횟수
    pub fn consecutive_receive_failures(&self) -> u32 {
        self.consecutive_receive_failures.load(Ordering::Relaxed)
    }

    /// 현재 값을 복사합니다.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_acked: self.messages_acked.load(Ordering::Relaxed),
            messages_left: self.messages_left.load(Ordering::Relaxed),
            messages_discarded: self.messages_discarded.load(Ordering::Relaxed),
            objects_processed: self.objects_processed.load(Ordering::Relaxed),
            objects_failed: self.objects_failed.load(Ordering::Relaxed),
            entries_handed_off: self.entries_handed_off.load(Ordering::Relaxed),
            entries_delivered: self.entries_delivered.load(Ordering::Relaxed),
            entries_dropped: self.entries_dropped.load(Ordering::Relaxed),
            entries_dead_lettered: self.entries_dead_lettered.load(Ordering::Relaxed),
            consecutive_receive_failures: self.consecutive_receive_failures(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = ShipperStats::new();
        stats.record_received(3);
        stats.record_acked();
        stats.record_left();
        stats.record_handed_off();
        stats.record_handed_off();
        stats.record_dropped(2);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages_received, 3);
        assert_eq!(snapshot.messages_acked, 1);
        assert_eq!(snapshot.messages_left, 1);
        assert_eq!(snapshot.entries_handed_off, 2);
        assert_eq!(snapshot.entries_dropped, 2);
        assert_eq!(snapshot.entries_delivered, 0);
    }

    #[test]
    fn receive_failures_reset() {
        let stats = ShipperStats::new();
        assert_eq!(stats.record_receive_failure(), 1);
        assert_eq!(stats.record_receive_failure(), 2);
        assert_eq!(stats.consecutive_receive_failures(), 2);
        stats.reset_receive_failures();
        assert_eq!(stats.consecutive_receive_failures(), 0);
    }

    #[test]
    fn snapshot_serializes() {
        let json = serde_json::to_value(ShipperStats::new().snapshot()).unwrap();
        assert_eq!(json["messages_received"], 0);
        assert_eq!(json["consecutive_receive_failures"], 0);
    }
}
