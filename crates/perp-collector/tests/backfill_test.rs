//! 백필 통합 테스트.
//!
//! 시뮬레이션 거래소와 메모리 저장소로 갭 감지, 재개 지점, 재시도, 정지 동작을 검증합니다.
//! 거래소 시각은 실제 시계를 따르므로 분 경계를 넘는 경우를 허용하도록 작성합니다.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::*;
use perp_collector::modules::BackfillOutcome;
use perp_core::MetricRow;
use perp_exchange::{Capability, SimulatedConfig};
use tokio_util::sync::CancellationToken;

fn btc_row(ts: i64) -> MetricRow {
    MetricRow::snapshot("binance", "BTC", ts, None, None)
}

#[tokio::test(start_paused = true)]
async fn test_empty_store_backfills_lookback_window() {
    let h = Harness::new(vec![SimulatedConfig::new("binance")], BTC_ALL);
    let before = now_ms();

    let outcome = h
        .reconciler()
        .check_and_backfill("BTC", &CancellationToken::new())
        .await
        .unwrap();

    let rows = h.store.rows_for("binance", "BTC");
    assert!(matches!(outcome, BackfillOutcome::Completed { rows: n } if n == rows.len()));

    // 첫 요청은 now - 10일에서 시작
    let requests = h.sim("binance").history_requests();
    let first_since = requests[0].1;
    assert!((first_since - (before - 10 * DAY)).abs() < 5_000);

    // 1분 간격으로 빈틈 없이 현재까지
    assert_minute_spaced(&rows);
    assert!(rows[0].timestamp >= first_since);
    assert!(rows[0].timestamp - first_since < MINUTE);
    assert!(rows.last().unwrap().timestamp >= floor_minute(before));
    assert!(rows.len() >= 10 * 24 * 60);

    // 백필 행은 OHLCV만 있고 파생 지표는 비어 있음
    assert!(rows.iter().all(|r| r.has_ohlcv()));
    assert!(rows.iter().all(|r| r.funding_rate.is_none() && r.open_interest.is_none()));

    // 요청 since는 엄격히 증가
    for pair in requests.windows(2) {
        assert!(pair[1].1 > pair[0].1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_resumes_one_minute_after_last_row() {
    let last = floor_minute(now_ms()) - 5 * HOUR;
    let h = Harness::with_rows(
        vec![SimulatedConfig::new("binance")],
        BTC_ALL,
        vec![btc_row(last)],
    );

    h.reconciler()
        .check_and_backfill("BTC", &CancellationToken::new())
        .await
        .unwrap();

    let requests = h.sim("binance").history_requests();
    assert_eq!(requests[0], ("BTCUSDT".to_string(), last + MINUTE));

    // 기존 행은 다시 받지 않음
    let rows = h.store.rows_for("binance", "BTC");
    let timestamps: Vec<i64> = rows.iter().map(|r| r.timestamp).collect();
    let unique: HashSet<i64> = timestamps.iter().copied().collect();
    assert_eq!(unique.len(), timestamps.len());
    assert_eq!(timestamps.iter().filter(|ts| **ts == last).count(), 1);

    let fetched: Vec<MetricRow> = rows.into_iter().filter(|r| r.timestamp > last).collect();
    assert_eq!(fetched[0].timestamp, last + MINUTE);
    assert_minute_spaced(&fetched);
    assert!(fetched.len() >= 5 * 60);
}

#[tokio::test(start_paused = true)]
async fn test_recent_data_within_threshold_is_up_to_date() {
    let h = Harness::with_rows(
        vec![SimulatedConfig::new("binance")],
        BTC_ALL,
        vec![btc_row(floor_minute(now_ms()) - HOUR)],
    );

    let outcome = h
        .reconciler()
        .check_and_backfill("BTC", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, BackfillOutcome::UpToDate);
    assert_eq!(h.sim("binance").calls().historical_candles, 0);
    assert_eq!(h.store.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_pass_writes_nothing() {
    let h = Harness::new(
        vec![SimulatedConfig::new("binance").with_history_start(now_ms() - 2 * HOUR)],
        BTC_ALL,
    );
    let cancel = CancellationToken::new();

    let first = h.reconciler().run_pass(&cancel).await;
    assert_eq!(first.success, 1);
    assert!(first.rows >= 2 * 60);
    let written = h.store.len();

    let second = h.reconciler().run_pass(&cancel).await;
    assert_eq!(second.rows, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(h.store.len(), written);
}

#[tokio::test(start_paused = true)]
async fn test_empty_page_ends_backfill() {
    // 거래소에 아직 데이터가 없는 신규 상장
    let h = Harness::new(
        vec![SimulatedConfig::new("binance").with_history_start(now_ms() + DAY)],
        BTC_ALL,
    );

    let outcome = h
        .reconciler()
        .check_and_backfill("BTC", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, BackfillOutcome::Completed { rows: 0 });
    assert_eq!(h.sim("binance").calls().historical_candles, 1);
    assert!(h.store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_page_failures_retry_same_window() {
    let h = Harness::new(
        vec![SimulatedConfig::new("binance").with_history_start(now_ms() - HOUR)],
        BTC_ALL,
    );
    h.sim("binance").fail_next(Capability::HistoricalCandles, 3);

    let outcome = h
        .reconciler()
        .check_and_backfill("BTC", &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(outcome, BackfillOutcome::Completed { rows } if rows >= 60));
    let sim = h.sim("binance");
    assert!(sim.calls().historical_candles >= 4);

    // 성공한 첫 요청의 since는 실패 전과 같음
    let requests = sim.history_requests();
    let now = now_ms();
    assert!((requests[0].1 - (now - 10 * DAY)).abs() < 60_000);
    assert_minute_spaced(&h.store.rows());
}

#[tokio::test(start_paused = true)]
async fn test_persistent_failure_stalls_only_that_symbol() {
    let mapping = r#"{
        "BTC": { "binance": "BTCUSDT" },
        "ETH": { "binance": "ETHUSDT" }
    }"#;
    let h = Harness::new(
        vec![SimulatedConfig::new("binance").with_history_start(now_ms() - HOUR)],
        mapping,
    );
    h.sim("binance").reject_symbol("BTCUSDT");

    let stats = h.reconciler().run_pass(&CancellationToken::new()).await;

    assert_eq!(stats.total, 2);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.success, 1);
    assert!(!stats.cancelled);
    assert!(h.store.rows_for("binance", "BTC").is_empty());
    assert!(h.store.rows_for("binance", "ETH").len() >= 60);

    // 첫 시도 + 기본 재시도 5번
    let btc_attempts = h.sim("binance").calls().historical_candles
        - h.sim("binance")
            .history_requests()
            .iter()
            .filter(|(symbol, _)| symbol == "ETHUSDT")
            .count();
    assert_eq!(btc_attempts, 6);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_symbol_resumes_next_pass() {
    let last = floor_minute(now_ms()) - 5 * HOUR;
    let h = Harness::with_rows(
        vec![SimulatedConfig::new("binance")],
        BTC_ALL,
        vec![btc_row(last)],
    );
    let cancel = CancellationToken::new();

    h.sim("binance")
        .set_always_fail(Capability::HistoricalCandles, true);
    let outcome = h.reconciler().check_and_backfill("BTC", &cancel).await.unwrap();
    assert_eq!(outcome, BackfillOutcome::Stalled { rows: 0 });

    h.sim("binance")
        .set_always_fail(Capability::HistoricalCandles, false);
    let outcome = h.reconciler().check_and_backfill("BTC", &cancel).await.unwrap();
    assert!(matches!(outcome, BackfillOutcome::Completed { rows } if rows >= 5 * 60));
    assert_eq!(h.sim("binance").history_requests()[0].1, last + MINUTE);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_retry_pause() {
    let h = Harness::new(vec![SimulatedConfig::new("binance")], BTC_ALL);
    h.sim("binance")
        .set_always_fail(Capability::HistoricalCandles, true);

    let cancel = CancellationToken::new();
    let reconciler = h.reconciler();
    let task_cancel = cancel.clone();
    let task = tokio::spawn(async move { reconciler.run_pass(&task_cancel).await });

    // 재시도 대기 중에 정지
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(h.sim("binance").calls().historical_candles, 3);

    cancel.cancel();
    let stats = task.await.unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.rows, 0);
    assert!(h.store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_symbols_without_primary_mapping_are_skipped() {
    let mapping = r#"{
        "BTC": { "binance": "BTCUSDT" },
        "HYPE": { "hyperliquid": "HYPE" }
    }"#;
    let h = Harness::new(
        vec![
            SimulatedConfig::new("binance").with_history_start(now_ms() - HOUR),
            SimulatedConfig::new("hyperliquid"),
        ],
        mapping,
    );

    let stats = h.reconciler().run_pass(&CancellationToken::new()).await;

    assert_eq!(stats.total, 2);
    assert_eq!(stats.success, 1);
    assert_eq!(stats.skipped, 1);
    assert!(h.store.rows_for("binance", "HYPE").is_empty());
    assert_eq!(h.sim("hyperliquid").calls().historical_candles, 0);
    assert_eq!(h.sim("binance").history_requests()[0].0, "BTCUSDT");
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_history_completes_without_rows() {
    let h = Harness::new(
        vec![SimulatedConfig::new("binance").with_capabilities(
            perp_exchange::Capabilities::all().with(Capability::HistoricalCandles, false),
        )],
        BTC_ALL,
    );

    let outcome = h
        .reconciler()
        .check_and_backfill("BTC", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, BackfillOutcome::Completed { rows: 0 });
    assert_eq!(h.sim("binance").calls().historical_candles, 0);
}
