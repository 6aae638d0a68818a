//! 메트릭 저장소.
//!
//! - [`MetricsStore`]: 수집기가 쓰는 저장소 인터페이스
//! - [`PgMetricsStore`]: 쓰기 큐 + 단일 writer 태스크를 쓰는 PostgreSQL 구현
//! - [`MemoryMetricsStore`]: 테스트 및 드라이런용 메모리 구현

pub mod memory;
pub mod metrics;
pub mod timescale;

use async_trait::async_trait;
use perp_core::MetricRow;

use crate::error::Result;

pub use memory::MemoryMetricsStore;
pub use metrics::PgMetricsStore;
pub use timescale::{Database, DatabaseConfig};

/// 분 단위 메트릭 행 저장소.
///
/// `append`는 행을 큐에 넣고 바로 돌아옵니다. 실제 기록 실패는 저장소가 로그로 남기며
/// 호출 측에 전파하지 않습니다. 여러 태스크에서 동시에 호출해도 안전해야 합니다.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// 행 하나를 쓰기 큐에 넣습니다.
    fn append(&self, row: MetricRow);

    /// `(exchange, symbol)`의 가장 최근 행 시각. 행이 없으면 `None`.
    async fn last_timestamp(&self, exchange: &str, symbol: &str) -> Result<Option<i64>>;

    /// 최신순으로 최대 `limit`개 행.
    async fn recent_rows(&self, limit: usize) -> Result<Vec<MetricRow>>;

    /// 지금까지 큐에 들어간 행의 기록 시도가 끝날 때까지 대기.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
