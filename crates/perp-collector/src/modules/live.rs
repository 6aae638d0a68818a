//! 틱마다 최신 스냅샷 수집.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use perp_core::{MetricRow, Timeframe};
use perp_exchange::ExchangeClient;
use tokio_util::sync::CancellationToken;

use crate::context::{pause, CollectionContext};
use crate::CollectionStats;

/// 심볼 하나의 수집 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOutcome {
    /// 기록한 행 수
    Written(usize),
    /// 기준 거래소 캔들이 비어 있음 (행 없음)
    EmptyCandle,
    /// 기준 거래소 캔들 조회 실패 (행 없음)
    CandleFailed,
    /// 매핑된 거래소가 없음
    NoMapping,
}

/// 실시간 수집 담당.
#[derive(Clone)]
pub struct LiveCollector {
    ctx: Arc<CollectionContext>,
}

impl LiveCollector {
    pub fn new(ctx: Arc<CollectionContext>) -> Self {
        Self { ctx }
    }

    /// 모든 심볼을 순서대로 한 번 수집. 모드는 패스 시작 시점 값으로 고정됩니다.
    pub async fn run_pass(&self, fast_mode: bool, cancel: &CancellationToken) -> CollectionStats {
        let start = Instant::now();
        let mut stats = CollectionStats::new();

        tracing::info!(
            fast_mode = fast_mode,
            symbols = self.ctx.registry.len(),
            exchanges = self.ctx.exchanges.len(),
            "실시간 수집 시작"
        );

        for (idx, base) in self.ctx.registry.bases().enumerate() {
            if idx > 0 && !pause(self.ctx.live.symbol_delay(), cancel).await {
                stats.cancelled = true;
                break;
            }
            if cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            stats.total += 1;

            match self.collect_symbol(base, fast_mode).await {
                LiveOutcome::Written(rows) => {
                    stats.success += 1;
                    stats.rows += rows;
                }
                LiveOutcome::EmptyCandle => stats.empty += 1,
                LiveOutcome::CandleFailed => stats.errors += 1,
                LiveOutcome::NoMapping => stats.skipped += 1,
            }
        }

        stats.elapsed = start.elapsed();
        stats
    }

    /// 심볼 하나 수집.
    ///
    /// fast 모드이고 기준 거래소 매핑이 있으면 기준 거래소 1분봉 하나를 모든 거래소 행에
    /// 공유합니다. 아니면 매핑된 거래소마다 OHLCV 없는 스냅샷 행을 씁니다.
    pub async fn collect_symbol(&self, base: &str, fast_mode: bool) -> LiveOutcome {
        let primary = &self.ctx.primary;

        match self.ctx.registry.resolve(base, primary.id()) {
            Some(native) if fast_mode => self.collect_with_candle(base, native).await,
            _ => self.collect_snapshot(base).await,
        }
    }

    async fn collect_with_candle(&self, base: &str, primary_native: &str) -> LiveOutcome {
        let primary = &self.ctx.primary;

        let candle = match primary.fetch_latest_candle(primary_native, Timeframe::M1).await {
            Ok(Some(candle)) => candle,
            Ok(None) => {
                tracing::warn!(exchange = primary.id(), symbol = base, "최신 캔들 없음, 이번 틱 건너뜀");
                return LiveOutcome::EmptyCandle;
            }
            Err(e) => {
                tracing::warn!(
                    exchange = primary.id(),
                    symbol = base,
                    error = %e,
                    "최신 캔들 조회 실패, 이번 틱 건너뜀"
                );
                return LiveOutcome::CandleFailed;
            }
        };

        let mut rows = 0;
        for exchange in &self.ctx.exchanges {
            let (funding_rate, open_interest) = match self.ctx.registry.resolve(base, exchange.id()) {
                Some(native) => fetch_derivatives(exchange, base, native).await,
                None => (None, None),
            };

            self.ctx.store.append(
                MetricRow::from_candle(exchange.id(), base, &candle)
                    .with_derivatives(funding_rate, open_interest),
            );
            rows += 1;
        }

        tracing::debug!(symbol = base, ts = candle.timestamp, rows = rows, "캔들 행 기록");
        LiveOutcome::Written(rows)
    }

    async fn collect_snapshot(&self, base: &str) -> LiveOutcome {
        let mut rows = 0;

        for exchange in &self.ctx.exchanges {
            let Some(native) = self.ctx.registry.resolve(base, exchange.id()) else {
                continue;
            };
            let (funding_rate, open_interest) = fetch_derivatives(exchange, base, native).await;

            // 조회가 끝난 시각을 분 단위로 내림
            let ts = Timeframe::M1.floor(Utc::now().timestamp_millis());
            self.ctx.store.append(MetricRow::snapshot(
                exchange.id(),
                base,
                ts,
                funding_rate,
                open_interest,
            ));
            rows += 1;
        }

        if rows == 0 {
            tracing::debug!(symbol = base, "매핑된 거래소 없음");
            return LiveOutcome::NoMapping;
        }
        LiveOutcome::Written(rows)
    }
}

/// 펀딩비와 미결제약정을 각각 조회. 한쪽 실패가 다른 쪽을 막지 않습니다.
async fn fetch_derivatives(
    exchange: &ExchangeClient,
    base: &str,
    native: &str,
) -> (Option<f64>, Option<f64>) {
    let funding_rate = exchange.fetch_funding_rate(native).await.unwrap_or_else(|e| {
        tracing::warn!(exchange = exchange.id(), symbol = base, error = %e, "펀딩비 조회 실패");
        None
    });
    let open_interest = exchange.fetch_open_interest(native).await.unwrap_or_else(|e| {
        tracing::warn!(exchange = exchange.id(), symbol = base, error = %e, "미결제약정 조회 실패");
        None
    });
    (funding_rate, open_interest)
}
