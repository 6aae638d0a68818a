//! 기능 확인을 거치는 통합 거래소 접근자.
//!
//! 커넥터가 지원하지 않는 작업은 에러가 아니라 "데이터 없음"입니다.
//! `ExchangeClient`는 호출 전에 기능 서술자를 확인하고, 미지원이면
//! 네트워크 요청 없이 `Ok(None)`(또는 빈 목록)을 돌려줍니다.

use std::sync::Arc;

use perp_core::{Candle, Timeframe};
use tracing::debug;

use crate::traits::{Capabilities, Capability, ExchangeConnector, ExchangeResult, PerpMarket};

/// 기능 게이트가 적용된 거래소 클라이언트. 복제 비용이 싸고 태스크 간 공유 가능합니다.
#[derive(Clone)]
pub struct ExchangeClient {
    connector: Arc<dyn ExchangeConnector>,
    capabilities: Capabilities,
}

impl std::fmt::Debug for ExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeClient")
            .field("id", &self.id())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl ExchangeClient {
    /// 커넥터를 감싸며 기능 서술자를 고정합니다.
    pub fn new(connector: Arc<dyn ExchangeConnector>) -> Self {
        let capabilities = connector.capabilities();
        Self {
            connector,
            capabilities,
        }
    }

    /// 거래소 식별자.
    pub fn id(&self) -> &str {
        self.connector.id()
    }

    /// 기능 서술자.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// 특정 작업 지원 여부.
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.supports(capability)
    }

    fn unsupported(&self, capability: Capability) -> bool {
        if self.supports(capability) {
            return false;
        }
        debug!(exchange = self.id(), capability = %capability, "지원하지 않는 작업, 건너뜀");
        true
    }

    /// 최신 캔들. 미지원이면 `Ok(None)`.
    pub async fn fetch_latest_candle(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> ExchangeResult<Option<Candle>> {
        if self.unsupported(Capability::LatestCandle) {
            return Ok(None);
        }
        self.connector.fetch_latest_candle(symbol, timeframe).await
    }

    /// 과거 캔들 페이지. 미지원이면 빈 목록.
    pub async fn fetch_historical_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: i64,
        limit: usize,
    ) -> ExchangeResult<Vec<Candle>> {
        if self.unsupported(Capability::HistoricalCandles) {
            return Ok(Vec::new());
        }
        self.connector
            .fetch_candles(symbol, timeframe, since, limit)
            .await
    }

    /// 펀딩비. 미지원이면 `Ok(None)`.
    pub async fn fetch_funding_rate(&self, symbol: &str) -> ExchangeResult<Option<f64>> {
        if self.unsupported(Capability::FundingRate) {
            return Ok(None);
        }
        self.connector.fetch_funding_rate(symbol).await
    }

    /// 미결제약정. 미지원이면 `Ok(None)`.
    pub async fn fetch_open_interest(&self, symbol: &str) -> ExchangeResult<Option<f64>> {
        if self.unsupported(Capability::OpenInterest) {
            return Ok(None);
        }
        self.connector.fetch_open_interest(symbol).await
    }

    /// 무기한 선물 목록. 미지원이면 빈 목록.
    pub async fn list_perpetual_markets(&self) -> ExchangeResult<Vec<PerpMarket>> {
        if self.unsupported(Capability::Markets) {
            return Ok(Vec::new());
        }
        self.connector.list_perpetual_markets().await
    }
}
