//! 메트릭 데이터 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - `MetricsStore` trait: 큐 기반 append와 마지막 시각 조회
//! - PostgreSQL 저장소 (UNNEST 일괄 삽입, 스키마 부트스트랩)
//! - 메모리 저장소

pub mod error;
pub mod storage;

pub use error::{DataError, Result};
pub use storage::metrics::WRITE_BATCH_SIZE;
pub use storage::timescale::METRICS_TABLE;
pub use storage::{
    Database, DatabaseConfig, MemoryMetricsStore, MetricsStore, PgMetricsStore,
};
