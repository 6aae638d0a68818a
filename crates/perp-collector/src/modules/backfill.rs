//! 갭 감지 및 과거 캔들 백필.
//!
//! 기준 거래소의 `(exchange, symbol)`마다 다음 순서로 진행합니다.
//!
//! 1. 마지막 행 시각 조회
//! 2. 없거나 기준 시간보다 오래됐으면 갭으로 판정
//! 3. `since`부터 페이지 단위로 캔들을 받아 저장, `since`를 마지막 캔들 + 1분으로 이동
//! 4. 빈 페이지를 받거나 현재 시각에 도달하면 종료
//!
//! 조회 실패는 같은 `since`로 재시도합니다. 재시도 한도를 넘기거나 정지되면 그 `since`를
//! 재개 지점으로 남기고, 다음 패스는 저장소의 마지막 행 대신 그 지점부터 이어갑니다.
//! 한 심볼이 막혀도 다른 심볼이나 스케줄러에는 영향이 없습니다. 펀딩비/미결제약정은 백필하지 않습니다.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use perp_core::{MetricRow, Timeframe, MINUTE_MS};
use tokio_util::sync::CancellationToken;

use crate::context::{pause, CollectionContext};
use crate::{CollectionStats, Result};

/// 갭 판정 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapCheck {
    /// 최근 데이터가 있어 할 일 없음
    UpToDate,
    /// `since`부터 백필 필요
    GapDetected { since: i64 },
}

/// 마지막 시각과 현재 시각으로 갭을 판정합니다.
///
/// 기준 시간과 정확히 같으면 아직 갭이 아닙니다.
pub fn detect_gap(last_timestamp: Option<i64>, now: i64, threshold_ms: i64, lookback_ms: i64) -> GapCheck {
    match last_timestamp {
        None => GapCheck::GapDetected {
            since: now - lookback_ms,
        },
        Some(last) if now - last > threshold_ms => GapCheck::GapDetected {
            since: last + MINUTE_MS,
        },
        Some(_) => GapCheck::UpToDate,
    }
}

/// 심볼 하나의 백필 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillOutcome {
    /// 기준 거래소 매핑 없음
    NoMapping,
    /// 갭 없음
    UpToDate,
    /// 백필 완료 (기록한 행 수, 0일 수 있음)
    Completed { rows: usize },
    /// 정지 신호로 중단 (그때까지 기록한 행 수)
    Cancelled { rows: usize },
    /// 재시도 한도 초과로 이번 패스에서 중단. 다음 패스는 중단 지점부터 이어서 받습니다
    Stalled { rows: usize },
}

/// 기준 거래소 백필 담당.
#[derive(Clone)]
pub struct BackfillReconciler {
    ctx: Arc<CollectionContext>,
}

impl BackfillReconciler {
    pub fn new(ctx: Arc<CollectionContext>) -> Self {
        Self { ctx }
    }

    /// 모든 심볼을 순서대로 한 번씩 점검/백필.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> CollectionStats {
        let start = Instant::now();
        let mut stats = CollectionStats::new();
        let exchange = self.ctx.primary.id();

        tracing::info!(
            exchange = exchange,
            symbols = self.ctx.registry.len(),
            "백필 점검 시작"
        );

        for base in self.ctx.registry.bases() {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            stats.total += 1;

            match self.check_and_backfill(base, cancel).await {
                Ok(BackfillOutcome::NoMapping) | Ok(BackfillOutcome::UpToDate) => stats.skipped += 1,
                Ok(BackfillOutcome::Completed { rows: 0 }) => stats.empty += 1,
                Ok(BackfillOutcome::Completed { rows }) => {
                    stats.success += 1;
                    stats.rows += rows;
                }
                Ok(BackfillOutcome::Stalled { rows }) => {
                    stats.errors += 1;
                    stats.rows += rows;
                }
                Ok(BackfillOutcome::Cancelled { rows }) => {
                    stats.rows += rows;
                    stats.cancelled = true;
                    break;
                }
                Err(e) => {
                    stats.errors += 1;
                    tracing::error!(exchange = exchange, symbol = base, error = %e, "백필 점검 실패");
                }
            }
        }

        stats.elapsed = start.elapsed();
        stats
    }

    /// 심볼 하나 점검 후 필요하면 백필.
    ///
    /// 마지막 시각 조회 실패만 에러로 돌려줍니다. 캔들 조회 실패는 `max_retries`번까지
    /// 같은 `since`로 재시도하고, 그래도 실패하면 `Stalled`로 이번 패스를 끝냅니다.
    pub async fn check_and_backfill(
        &self,
        base: &str,
        cancel: &CancellationToken,
    ) -> Result<BackfillOutcome> {
        let primary = &self.ctx.primary;
        let exchange = primary.id();

        let Some(native) = self.ctx.registry.resolve(base, exchange) else {
            tracing::debug!(exchange = exchange, symbol = base, "기준 거래소 매핑 없음, 건너뜀");
            return Ok(BackfillOutcome::NoMapping);
        };

        let settings = &self.ctx.backfill;
        let now = Utc::now().timestamp_millis();

        let since = match self.ctx.pending_backfill(base) {
            Some(since) => {
                tracing::info!(
                    exchange = exchange,
                    symbol = base,
                    since = since,
                    "중단된 백필 재개"
                );
                since
            }
            None => {
                let last = self.ctx.store.last_timestamp(exchange, base).await?;
                let GapCheck::GapDetected { since } =
                    detect_gap(last, now, settings.threshold_ms(), settings.lookback_ms())
                else {
                    return Ok(BackfillOutcome::UpToDate);
                };

                tracing::info!(
                    exchange = exchange,
                    symbol = base,
                    last = ?last,
                    since = since,
                    "갭 감지, 백필 시작"
                );
                since
            }
        };

        let mut since = since;
        let mut rows = 0usize;
        let mut failures = 0u32;

        while since < now {
            if cancel.is_cancelled() {
                self.ctx.set_pending_backfill(base, since);
                return Ok(BackfillOutcome::Cancelled { rows });
            }

            let page = match primary
                .fetch_historical_candles(native, Timeframe::M1, since, settings.page_limit)
                .await
            {
                Ok(page) => {
                    failures = 0;
                    page
                }
                Err(e) if failures >= settings.max_retries => {
                    tracing::error!(
                        exchange = exchange,
                        symbol = base,
                        since = since,
                        attempts = failures + 1,
                        rows = rows,
                        error = %e,
                        "재시도 한도 초과, 다음 패스에서 이어서 백필"
                    );
                    self.ctx.set_pending_backfill(base, since);
                    return Ok(BackfillOutcome::Stalled { rows });
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        exchange = exchange,
                        symbol = base,
                        since = since,
                        retryable = e.is_retryable(),
                        error = %e,
                        "캔들 페이지 조회 실패, 재시도"
                    );
                    if !pause(settings.retry_delay(), cancel).await {
                        self.ctx.set_pending_backfill(base, since);
                        return Ok(BackfillOutcome::Cancelled { rows });
                    }
                    continue;
                }
            };

            // since 이전 캔들은 버립니다. 남는 게 없으면 더 진행할 수 없습니다
            let fresh: Vec<_> = page.iter().filter(|c| c.timestamp >= since).collect();
            let Some(newest) = fresh.iter().map(|c| c.timestamp).max() else {
                tracing::debug!(exchange = exchange, symbol = base, since = since, "빈 페이지, 백필 종료");
                break;
            };

            for candle in &fresh {
                self.ctx
                    .store
                    .append(MetricRow::from_candle(exchange, base, candle));
            }
            rows += fresh.len();
            since = newest + MINUTE_MS;

            tracing::debug!(
                exchange = exchange,
                symbol = base,
                page = fresh.len(),
                rows = rows,
                next_since = since,
                "캔들 페이지 저장"
            );

            if !pause(settings.page_delay(), cancel).await {
                self.ctx.set_pending_backfill(base, since);
                return Ok(BackfillOutcome::Cancelled { rows });
            }
        }

        self.ctx.clear_pending_backfill(base);
        tracing::info!(exchange = exchange, symbol = base, rows = rows, "백필 완료");
        Ok(BackfillOutcome::Completed { rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 3_600_000;
    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_no_rows_starts_from_lookback() {
        assert_eq!(
            detect_gap(None, NOW, 4 * HOUR, 240 * HOUR),
            GapCheck::GapDetected {
                since: NOW - 240 * HOUR
            }
        );
    }

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(
            detect_gap(Some(NOW - 5 * HOUR), NOW, 4 * HOUR, 240 * HOUR),
            GapCheck::GapDetected {
                since: NOW - 5 * HOUR + MINUTE_MS
            }
        );
        assert_eq!(
            detect_gap(Some(NOW - HOUR), NOW, 4 * HOUR, 240 * HOUR),
            GapCheck::UpToDate
        );
        assert_eq!(
            detect_gap(Some(NOW - 4 * HOUR), NOW, 4 * HOUR, 240 * HOUR),
            GapCheck::UpToDate
        );
    }
}
