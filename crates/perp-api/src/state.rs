//! 모든 핸들러에서 공유되는 애플리케이션 상태.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use perp_collector::CollectionScheduler;
use perp_data::MetricsStore;

/// 애플리케이션 공유 상태.
///
/// Axum의 State extractor를 통해 핸들러에 주입됩니다.
#[derive(Clone)]
pub struct AppState {
    /// 수집 스케줄러 - 모드 조회/변경, 수동 백필
    pub scheduler: Arc<CollectionScheduler>,

    /// 메트릭 저장소 - 뷰어 읽기 경로
    pub store: Arc<dyn MetricsStore>,

    /// 뷰어 기본 행 수
    pub viewer_row_limit: usize,

    /// 서버 시작 시각
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        scheduler: Arc<CollectionScheduler>,
        store: Arc<dyn MetricsStore>,
        viewer_row_limit: usize,
    ) -> Self {
        Self {
            scheduler,
            store,
            viewer_row_limit,
            started_at: Utc::now(),
        }
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// 테스트용 상태: binance 시뮬레이션 거래소 하나, 메모리 저장소, 시작하지 않은 스케줄러.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state(rows: Vec<perp_core::MetricRow>) -> AppState {
    use perp_collector::config::SchedulerConfig;
    use perp_collector::CollectionContext;
    use perp_core::SymbolRegistry;
    use perp_data::MemoryMetricsStore;
    use perp_exchange::{ExchangeClient, SimulatedConfig, SimulatedExchange};

    let registry = SymbolRegistry::from_json_str(r#"{ "BTC": { "binance": "BTCUSDT" } }"#)
        .expect("test mapping");
    let exchange = ExchangeClient::new(Arc::new(SimulatedExchange::new(
        SimulatedConfig::new("binance")
            .with_history_start(Utc::now().timestamp_millis() - 10 * 60_000),
    )));
    let store: Arc<dyn MetricsStore> = Arc::new(MemoryMetricsStore::with_rows(rows));

    let ctx = CollectionContext::new(Arc::new(registry), vec![exchange], "binance", store.clone())
        .expect("test context");
    let scheduler = Arc::new(CollectionScheduler::new(
        Arc::new(ctx),
        SchedulerConfig::default(),
    ));

    AppState::new(scheduler, store, 250)
}
