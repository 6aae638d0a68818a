//! 통합 테스트 공용 도구.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use perp_collector::{BackfillReconciler, CollectionContext, LiveCollector};
use perp_core::{MetricRow, SymbolRegistry};
use perp_data::MemoryMetricsStore;
use perp_exchange::{ExchangeClient, SimulatedConfig, SimulatedExchange};

/// 네 거래소 모두 BTC가 상장된 매핑.
pub const BTC_ALL: &str = r#"{
    "BTC": {
        "binance": "BTCUSDT",
        "bybit": "BTCUSDT",
        "okx": "BTC-USDT-SWAP",
        "hyperliquid": "BTC"
    }
}"#;

pub const MINUTE: i64 = 60_000;
pub const HOUR: i64 = 3_600_000;
pub const DAY: i64 = 86_400_000;

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn floor_minute(ts: i64) -> i64 {
    ts - ts.rem_euclid(MINUTE)
}

/// 시뮬레이션 거래소 + 메모리 저장소 조합. 기준 거래소는 binance.
pub struct Harness {
    pub ctx: Arc<CollectionContext>,
    pub store: Arc<MemoryMetricsStore>,
    sims: Vec<Arc<SimulatedExchange>>,
}

impl Harness {
    pub fn new(configs: Vec<SimulatedConfig>, mapping: &str) -> Self {
        Self::with_rows(configs, mapping, Vec::new())
    }

    pub fn with_rows(configs: Vec<SimulatedConfig>, mapping: &str, rows: Vec<MetricRow>) -> Self {
        let registry = Arc::new(SymbolRegistry::from_json_str(mapping).unwrap());
        let store = Arc::new(MemoryMetricsStore::with_rows(rows));

        let sims: Vec<Arc<SimulatedExchange>> = configs
            .into_iter()
            .map(|c| Arc::new(SimulatedExchange::new(c)))
            .collect();
        let clients = sims
            .iter()
            .map(|s| ExchangeClient::new(s.clone()))
            .collect();

        let ctx = CollectionContext::new(registry, clients, "binance", store.clone()).unwrap();
        Self {
            ctx: Arc::new(ctx),
            store,
            sims,
        }
    }

    pub fn sim(&self, id: &str) -> &Arc<SimulatedExchange> {
        self.sims
            .iter()
            .find(|s| perp_exchange::ExchangeConnector::id(s.as_ref()) == id)
            .unwrap()
    }

    pub fn reconciler(&self) -> BackfillReconciler {
        BackfillReconciler::new(self.ctx.clone())
    }

    pub fn live(&self) -> LiveCollector {
        LiveCollector::new(self.ctx.clone())
    }
}

/// 기본 네 거래소 설정.
pub fn four_exchanges() -> Vec<SimulatedConfig> {
    vec![
        SimulatedConfig::new("binance")
            .with_funding_rate(0.0001)
            .with_open_interest(1000.0),
        SimulatedConfig::new("bybit")
            .with_funding_rate(0.0002)
            .with_open_interest(2000.0),
        SimulatedConfig::new("okx")
            .with_funding_rate(0.0003)
            .with_open_interest(3000.0),
        SimulatedConfig::new("hyperliquid")
            .with_funding_rate(0.0004)
            .with_open_interest(4000.0),
    ]
}

/// 타임스탬프가 정확히 1분 간격으로 증가하는지.
pub fn assert_minute_spaced(rows: &[MetricRow]) {
    for pair in rows.windows(2) {
        assert_eq!(
            pair[1].timestamp - pair[0].timestamp,
            MINUTE,
            "gap between {} and {}",
            pair[0].timestamp,
            pair[1].timestamp
        );
    }
}
