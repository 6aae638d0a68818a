//! 수집 패스가 공유하는 실행 환경.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use perp_core::SymbolRegistry;
use perp_data::MetricsStore;
use perp_exchange::{build_connector, ExchangeClient, RestConfig};
use tokio_util::sync::CancellationToken;

use crate::config::{BackfillConfig, CollectorConfig, LiveConfig};
use crate::error::CollectorError;
use crate::Result;

/// 심볼 매핑, 거래소 클라이언트, 저장소와 패스별 설정 묶음.
pub struct CollectionContext {
    /// 기준 심볼 → 거래소 고유 심볼
    pub registry: Arc<SymbolRegistry>,
    /// 설정 순서대로의 거래소 목록 (기준 거래소 포함)
    pub exchanges: Vec<ExchangeClient>,
    /// OHLCV 기준 거래소
    pub primary: ExchangeClient,
    /// 메트릭 저장소
    pub store: Arc<dyn MetricsStore>,
    pub backfill: BackfillConfig,
    pub live: LiveConfig,
    /// 끝나지 않은 백필의 재개 지점 (기준 심볼 → since)
    pending_backfill: Mutex<HashMap<String, i64>>,
}

impl CollectionContext {
    /// 이미 만들어진 클라이언트로 구성.
    ///
    /// `primary`는 `exchanges` 안의 식별자여야 합니다.
    pub fn new(
        registry: Arc<SymbolRegistry>,
        exchanges: Vec<ExchangeClient>,
        primary: &str,
        store: Arc<dyn MetricsStore>,
    ) -> Result<Self> {
        let primary = exchanges
            .iter()
            .find(|c| c.id() == primary)
            .cloned()
            .ok_or_else(|| {
                CollectorError::Config(format!("기준 거래소 {}가 거래소 목록에 없습니다", primary))
            })?;

        Ok(Self {
            registry,
            exchanges,
            primary,
            store,
            backfill: BackfillConfig::default(),
            live: LiveConfig::default(),
            pending_backfill: Mutex::new(HashMap::new()),
        })
    }

    /// 설정에 따라 REST 커넥터를 만들어 구성.
    pub fn from_config(
        config: &CollectorConfig,
        registry: Arc<SymbolRegistry>,
        store: Arc<dyn MetricsStore>,
    ) -> Result<Self> {
        let rest = RestConfig::default().with_timeout_secs(config.exchanges.http_timeout_secs);

        let mut exchanges = Vec::with_capacity(config.exchanges.ids.len());
        for id in &config.exchanges.ids {
            let connector = build_connector(id, rest.clone())?.ok_or_else(|| {
                CollectorError::Config(format!("커넥터가 없는 거래소: {}", id))
            })?;
            let client = ExchangeClient::new(connector);
            tracing::debug!(exchange = %id, capabilities = ?client.capabilities(), "커넥터 생성");
            exchanges.push(client);
        }

        Ok(Self::new(registry, exchanges, &config.exchanges.primary, store)?
            .with_backfill(config.backfill.clone())
            .with_live(config.live.clone()))
    }

    pub fn with_backfill(mut self, backfill: BackfillConfig) -> Self {
        self.backfill = backfill;
        self
    }

    pub fn with_live(mut self, live: LiveConfig) -> Self {
        self.live = live;
        self
    }

    /// 중단된 백필의 재개 지점.
    ///
    /// 실시간 패스가 그 사이에 최신 행을 써도 갭이 남아 있으므로 마지막 행 시각보다 우선합니다.
    pub fn pending_backfill(&self, base: &str) -> Option<i64> {
        self.lock_pending().get(base).copied()
    }

    pub(crate) fn set_pending_backfill(&self, base: &str, since: i64) {
        self.lock_pending().insert(base.to_string(), since);
    }

    pub(crate) fn clear_pending_backfill(&self, base: &str) {
        self.lock_pending().remove(base);
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.pending_backfill
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// 정지 신호와 경쟁하는 대기. 대기를 마쳤으면 `true`, 정지됐으면 `false`.
pub(crate) async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
