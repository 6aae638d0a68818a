//! 스케줄러 통합 테스트.
//!
//! 일시정지된 tokio 시계로 틱 주기와 모드 전환, 정지 동작을 검증합니다.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use perp_collector::config::SchedulerConfig;
use perp_collector::{CollectionScheduler, CollectorError};
use perp_core::MetricRow;
use perp_exchange::{Capability, SimulatedConfig};
use tokio::time::{sleep, Instant};

fn harness() -> Harness {
    Harness::new(
        vec![
            SimulatedConfig::new("binance")
                .with_history_start(now_ms() - 30 * MINUTE)
                .with_funding_rate(0.0001)
                .with_open_interest(1000.0),
            SimulatedConfig::new("bybit")
                .with_funding_rate(0.0002)
                .with_open_interest(2000.0),
        ],
        r#"{ "BTC": { "binance": "BTCUSDT", "bybit": "BTCUSDT" } }"#,
    )
}

fn scheduler(h: &Harness, fast_mode: bool) -> Arc<CollectionScheduler> {
    let config = SchedulerConfig {
        fast_mode,
        ..SchedulerConfig::default()
    };
    Arc::new(CollectionScheduler::new(h.ctx.clone(), config))
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    let h = harness();
    let s = scheduler(&h, true);

    assert!(s.start());
    assert!(!s.start());
    assert!(s.is_running());

    sleep(Duration::from_secs(1)).await;
    s.stop();
    s.wait().await;

    // 두 번째 start가 루프를 하나 더 만들지 않았음
    assert_eq!(h.sim("binance").calls().latest_candle, 1);
}

#[tokio::test(start_paused = true)]
async fn test_fast_mode_ticks_every_minute() {
    let h = harness();
    let s = scheduler(&h, true);

    s.start();
    sleep(Duration::from_secs(125)).await;
    s.stop();
    s.wait().await;

    // 0초, 60초, 120초
    assert_eq!(h.sim("binance").calls().latest_candle, 3);
    assert_eq!(h.sim("bybit").calls().funding_rate, 3);

    // 첫 틱에서 백필, 이후 틱은 갭 없음
    assert_eq!(h.sim("binance").calls().historical_candles, 1);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_mode_ticks_every_five_minutes() {
    let h = harness();
    let s = scheduler(&h, false);

    s.start();
    sleep(Duration::from_secs(250)).await;
    assert_eq!(h.sim("bybit").calls().funding_rate, 1);

    sleep(Duration::from_secs(100)).await;
    s.stop();
    s.wait().await;

    assert_eq!(h.sim("bybit").calls().funding_rate, 2);
    assert_eq!(h.sim("binance").calls().latest_candle, 0);
    assert!(h.store.rows().iter().all(|r| !r.has_ohlcv() || r.exchange == "binance"));
}

#[tokio::test(start_paused = true)]
async fn test_mode_change_applies_to_next_tick() {
    let h = harness();
    let s = scheduler(&h, true);

    s.start();
    sleep(Duration::from_secs(10)).await;
    assert_eq!(h.sim("binance").calls().latest_candle, 1);

    s.set_fast_mode(false);
    assert!(!s.fast_mode());

    // 60초 틱은 이미 정해진 주기대로 오고 스냅샷 모드로 실행
    sleep(Duration::from_secs(90)).await;
    assert_eq!(h.sim("binance").calls().latest_candle, 1);
    assert_eq!(h.sim("bybit").calls().funding_rate, 2);

    // 그 다음 틱은 300초 뒤(360초)
    sleep(Duration::from_secs(250)).await;
    assert_eq!(h.sim("bybit").calls().funding_rate, 2);

    sleep(Duration::from_secs(20)).await;
    assert_eq!(h.sim("bybit").calls().funding_rate, 3);

    s.stop();
    s.wait().await;
}

#[tokio::test(start_paused = true)]
async fn test_mode_handle_is_shared() {
    let h = harness();
    let s = scheduler(&h, true);
    let handle = s.mode_handle();

    assert!(handle.set_fast_mode(false));
    assert!(!s.fast_mode());

    s.set_fast_mode(true);
    assert!(handle.fast_mode());
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_sleep() {
    let h = harness();
    let s = scheduler(&h, false);

    s.start();
    sleep(Duration::from_secs(5)).await;

    let stopped_at = Instant::now();
    s.stop();
    s.stop();
    s.wait().await;

    assert!(stopped_at.elapsed() < Duration::from_secs(1));
    assert!(!s.is_running());
    assert!(!s.start());
    assert!(matches!(
        s.trigger_backfill_now().await,
        Err(CollectorError::Stopped)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_manual_backfill_during_tick() {
    let h = Harness::new(
        vec![SimulatedConfig::new("binance")
            .with_history_start(now_ms() - 3 * HOUR)
            .with_latency(Duration::from_millis(50))
            .with_funding_rate(0.0001)],
        r#"{ "BTC": { "binance": "BTCUSDT" }, "ETH": { "binance": "ETHUSDT" } }"#,
    );
    let s = scheduler(&h, true);

    s.start();
    let manual = s.trigger_backfill_now().await.unwrap();
    assert_eq!(manual.total, 2);
    assert_eq!(manual.errors, 0);

    sleep(Duration::from_secs(5)).await;
    s.stop();
    s.wait().await;

    // 중복 행은 허용하지만 반쯤 쓰인 행은 없음
    let rows = h.store.rows();
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|r| r.has_ohlcv()));
    for base in ["BTC", "ETH"] {
        let latest = h
            .store
            .rows_for("binance", base)
            .iter()
            .map(|r| r.timestamp)
            .max()
            .unwrap();
        assert!(latest >= floor_minute(now_ms()) - MINUTE);
    }
}

#[tokio::test(start_paused = true)]
async fn test_run_once_reports_both_passes() {
    let h = harness();
    let s = scheduler(&h, true);

    let report = s.run_once().await;

    assert!(report.fast_mode);
    assert_eq!(report.backfill.success, 1);
    assert!(report.backfill.rows >= 30);
    assert_eq!(report.live.success, 1);
    assert_eq!(report.live.rows, 2);
    assert!(!s.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_stalled_gap_is_filled_after_live_row() {
    let last = floor_minute(now_ms()) - 5 * HOUR;
    let h = Harness::with_rows(
        vec![SimulatedConfig::new("binance")],
        r#"{ "BTC": { "binance": "BTCUSDT" } }"#,
        vec![MetricRow::snapshot("binance", "BTC", last, None, None)],
    );
    let s = scheduler(&h, true);

    h.sim("binance")
        .set_always_fail(Capability::HistoricalCandles, true);
    let first = s.run_once().await;
    assert_eq!(first.backfill.errors, 1);
    assert_eq!(first.live.rows, 1);
    assert_eq!(h.ctx.pending_backfill("BTC"), Some(last + MINUTE));

    // 실시간 행이 최신이어도 중단된 갭은 다음 틱에 채움
    h.sim("binance")
        .set_always_fail(Capability::HistoricalCandles, false);
    let second = s.run_once().await;
    assert_eq!(second.backfill.success, 1);
    assert!(second.backfill.rows >= 5 * 60 - 1);
    assert_eq!(h.ctx.pending_backfill("BTC"), None);

    let in_gap = h
        .store
        .rows_for("binance", "BTC")
        .iter()
        .filter(|r| r.timestamp > last && r.timestamp < last + 4 * HOUR)
        .count();
    assert_eq!(in_gap as i64, 4 * HOUR / MINUTE - 1);

    // 채운 뒤에는 다시 평소 갭 판정
    let third = s.run_once().await;
    assert_eq!(third.backfill.skipped, 1);
}
