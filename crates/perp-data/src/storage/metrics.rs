//! PostgreSQL 메트릭 저장소.
//!
//! # 동작 방식
//!
//! 1. `append`는 행을 무제한 채널에 넣고 즉시 반환
//! 2. writer 태스크 하나가 큐에 쌓인 행을 최대 500개씩 모아 UNNEST로 일괄 삽입
//! 3. 실패한 배치는 크기와 함께 로그를 남기고 버림 (재시도 없음)
//! 4. `flush`는 같은 큐에 표식을 넣어 앞선 행이 모두 처리될 때까지 대기
//!
//! ```rust,ignore
//! let db = Database::connect(&DatabaseConfig::new(url)).await?;
//! db.ensure_schema().await?;
//! let store = PgMetricsStore::new(db.pool().clone());
//! store.append(row);
//! store.flush().await?;
//! ```

use async_trait::async_trait;
use perp_core::MetricRow;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, instrument};

use super::MetricsStore;
use crate::error::{DataError, Result};

/// 한 번의 INSERT에 담는 최대 행 수.
pub const WRITE_BATCH_SIZE: usize = 500;

enum WriteCommand {
    Insert(Box<MetricRow>),
    Flush(oneshot::Sender<()>),
}

/// 메트릭 테이블 레코드.
#[derive(Debug, Clone, FromRow)]
struct MetricRecord {
    exchange: String,
    symbol: String,
    ts: i64,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
    funding_rate: Option<f64>,
    open_interest: Option<f64>,
    ls_ratio: Option<f64>,
}

impl From<MetricRecord> for MetricRow {
    fn from(r: MetricRecord) -> Self {
        MetricRow {
            exchange: r.exchange,
            symbol: r.symbol,
            timestamp: r.ts,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume,
            funding_rate: r.funding_rate,
            open_interest: r.open_interest,
            long_short_ratio: r.ls_ratio,
        }
    }
}

/// UNNEST 바인딩용 열 배열.
#[derive(Debug, Default)]
struct ColumnBatch {
    exchanges: Vec<String>,
    symbols: Vec<String>,
    timestamps: Vec<i64>,
    opens: Vec<Option<f64>>,
    highs: Vec<Option<f64>>,
    lows: Vec<Option<f64>>,
    closes: Vec<Option<f64>>,
    volumes: Vec<Option<f64>>,
    funding_rates: Vec<Option<f64>>,
    open_interests: Vec<Option<f64>>,
    ls_ratios: Vec<Option<f64>>,
}

impl ColumnBatch {
    fn from_rows(rows: &[MetricRow]) -> Self {
        let mut batch = ColumnBatch::default();
        for row in rows {
            batch.exchanges.push(row.exchange.clone());
            batch.symbols.push(row.symbol.clone());
            batch.timestamps.push(row.timestamp);
            batch.opens.push(row.open);
            batch.highs.push(row.high);
            batch.lows.push(row.low);
            batch.closes.push(row.close);
            batch.volumes.push(row.volume);
            batch.funding_rates.push(row.funding_rate);
            batch.open_interests.push(row.open_interest);
            batch.ls_ratios.push(row.long_short_ratio);
        }
        batch
    }

    fn len(&self) -> usize {
        self.timestamps.len()
    }
}

/// 큐 기반 PostgreSQL 저장소.
#[derive(Clone)]
pub struct PgMetricsStore {
    pool: PgPool,
    queue: mpsc::UnboundedSender<WriteCommand>,
}

impl PgMetricsStore {
    /// 저장소를 만들고 writer 태스크를 띄웁니다. Tokio 런타임 안에서 호출해야 합니다.
    pub fn new(pool: PgPool) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(pool.clone(), rx));
        Self { pool, queue }
    }

    /// 내부 연결 풀.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MetricsStore for PgMetricsStore {
    fn append(&self, row: MetricRow) {
        if let Err(mpsc::error::SendError(WriteCommand::Insert(row))) =
            self.queue.send(WriteCommand::Insert(Box::new(row)))
        {
            error!(
                exchange = %row.exchange,
                symbol = %row.symbol,
                ts = row.timestamp,
                "쓰기 큐가 닫혀 행을 버립니다"
            );
        }
    }

    #[instrument(skip(self))]
    async fn last_timestamp(&self, exchange: &str, symbol: &str) -> Result<Option<i64>> {
        let result: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT ts FROM metrics_minute
            WHERE exchange = $1 AND symbol = $2
            ORDER BY ts DESC
            LIMIT 1
            "#,
        )
        .bind(exchange)
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        Ok(result.map(|(ts,)| ts))
    }

    async fn recent_rows(&self, limit: usize) -> Result<Vec<MetricRow>> {
        let records: Vec<MetricRecord> = sqlx::query_as(
            r#"
            SELECT exchange, symbol, ts, open, high, low, close, volume,
                   funding_rate, open_interest, ls_ratio
            FROM metrics_minute
            ORDER BY ts DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DataError::QueryError(e.to_string()))?;

        Ok(records.into_iter().map(MetricRow::from).collect())
    }

    async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.queue
            .send(WriteCommand::Flush(tx))
            .map_err(|_| DataError::QueueClosed)?;
        rx.await.map_err(|_| DataError::QueueClosed)
    }
}

/// 큐를 비우며 배치 단위로 기록합니다. 모든 송신자가 사라지면 종료합니다.
async fn run_writer(pool: PgPool, mut rx: mpsc::UnboundedReceiver<WriteCommand>) {
    let mut batch: Vec<MetricRow> = Vec::with_capacity(WRITE_BATCH_SIZE);

    while let Some(command) = rx.recv().await {
        let mut flush_ack = None;
        match command {
            WriteCommand::Insert(row) => batch.push(*row),
            WriteCommand::Flush(ack) => flush_ack = Some(ack),
        }

        // 이미 쌓여 있는 만큼만 모읍니다 (flush 표식에서 멈춤)
        while flush_ack.is_none() && batch.len() < WRITE_BATCH_SIZE {
            match rx.try_recv() {
                Ok(WriteCommand::Insert(row)) => batch.push(*row),
                Ok(WriteCommand::Flush(ack)) => flush_ack = Some(ack),
                Err(_) => break,
            }
        }

        if !batch.is_empty() {
            match insert_batch(&pool, &batch).await {
                Ok(inserted) => debug!(inserted, "메트릭 배치 저장"),
                Err(e) => error!(rows = batch.len(), error = %e, "메트릭 배치 저장 실패, 버림"),
            }
            batch.clear();
        }

        if let Some(ack) = flush_ack {
            let _ = ack.send(());
        }
    }

    debug!("메트릭 writer 종료");
}

/// UNNEST 패턴으로 일괄 삽입.
async fn insert_batch(pool: &PgPool, rows: &[MetricRow]) -> Result<u64> {
    let cols = ColumnBatch::from_rows(rows);
    debug!(rows = cols.len(), "UNNEST 삽입");

    let result = sqlx::query(
        r#"
        INSERT INTO metrics_minute
            (exchange, symbol, ts, open, high, low, close, volume,
             funding_rate, open_interest, ls_ratio)
        SELECT * FROM UNNEST(
            $1::text[], $2::text[], $3::bigint[],
            $4::float8[], $5::float8[], $6::float8[], $7::float8[], $8::float8[],
            $9::float8[], $10::float8[], $11::float8[]
        )
        "#,
    )
    .bind(&cols.exchanges)
    .bind(&cols.symbols)
    .bind(&cols.timestamps)
    .bind(&cols.opens)
    .bind(&cols.highs)
    .bind(&cols.lows)
    .bind(&cols.closes)
    .bind(&cols.volumes)
    .bind(&cols.funding_rates)
    .bind(&cols.open_interests)
    .bind(&cols.ls_ratios)
    .execute(pool)
    .await
    .map_err(|e| DataError::InsertError(e.to_string()))?;

    Ok(result.rows_affected())
}
