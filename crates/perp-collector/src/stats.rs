//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 패스 하나의 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 처리한 심볼 수
    pub total: usize,
    /// 행을 하나 이상 기록한 심볼 수
    pub success: usize,
    /// 에러로 끝난 심볼 수
    pub errors: usize,
    /// 건너뛴 심볼 수 (매핑 없음, 이미 최신)
    pub skipped: usize,
    /// 조회는 됐지만 데이터가 없던 심볼 수
    pub empty: usize,
    /// 큐에 넣은 총 행 수
    pub rows: usize,
    /// 중간에 정지 신호를 받았는지
    pub cancelled: bool,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            errors = self.errors,
            skipped = self.skipped,
            empty = self.empty,
            rows = self.rows,
            cancelled = self.cancelled,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "패스 완료"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let mut stats = CollectionStats::new();
        assert_eq!(stats.success_rate(), 0.0);

        stats.total = 4;
        stats.success = 3;
        assert!((stats.success_rate() - 75.0).abs() < f64::EPSILON);
    }
}
