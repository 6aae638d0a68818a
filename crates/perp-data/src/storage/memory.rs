//! 메모리 메트릭 저장소.

use std::sync::Mutex;

use async_trait::async_trait;
use perp_core::MetricRow;

use super::MetricsStore;
use crate::error::Result;

/// 모든 행을 메모리에 보관하는 저장소. 쓰기는 즉시 반영됩니다.
#[derive(Debug, Default)]
pub struct MemoryMetricsStore {
    rows: Mutex<Vec<MetricRow>>,
}

impl MemoryMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 기존 행으로 채운 저장소.
    pub fn with_rows(rows: Vec<MetricRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    /// 기록 순서대로 모든 행의 사본.
    pub fn rows(&self) -> Vec<MetricRow> {
        self.lock().clone()
    }

    /// `(exchange, symbol)` 행만 기록 순서대로.
    pub fn rows_for(&self, exchange: &str, symbol: &str) -> Vec<MetricRow> {
        self.lock()
            .iter()
            .filter(|r| r.exchange == exchange && r.symbol == symbol)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<MetricRow>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl MetricsStore for MemoryMetricsStore {
    fn append(&self, row: MetricRow) {
        self.lock().push(row);
    }

    async fn last_timestamp(&self, exchange: &str, symbol: &str) -> Result<Option<i64>> {
        Ok(self
            .lock()
            .iter()
            .filter(|r| r.exchange == exchange && r.symbol == symbol)
            .map(|r| r.timestamp)
            .max())
    }

    async fn recent_rows(&self, limit: usize) -> Result<Vec<MetricRow>> {
        let rows = self.lock();
        // 같은 시각이면 나중에 기록된 행이 먼저
        let mut indexed: Vec<(usize, &MetricRow)> = rows.iter().enumerate().collect();
        indexed.sort_by(|(ia, a), (ib, b)| b.timestamp.cmp(&a.timestamp).then(ib.cmp(ia)));
        Ok(indexed
            .into_iter()
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect())
    }
}
