//! 거래소 커넥터 trait 정의.

use async_trait::async_trait;
use perp_core::{Candle, Timeframe};
use serde::{Deserialize, Serialize};

use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 커넥터가 제공할 수 있는 개별 작업.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// 최신 캔들 조회
    LatestCandle,
    /// 과거 캔들 페이지 조회
    HistoricalCandles,
    /// 펀딩비 조회
    FundingRate,
    /// 미결제약정 조회
    OpenInterest,
    /// 무기한 선물 상품 목록 조회
    Markets,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::LatestCandle => write!(f, "latest_candle"),
            Capability::HistoricalCandles => write!(f, "historical_candles"),
            Capability::FundingRate => write!(f, "funding_rate"),
            Capability::OpenInterest => write!(f, "open_interest"),
            Capability::Markets => write!(f, "markets"),
        }
    }
}

/// 커넥터 생성 시 한 번 결정되는 기능 서술자.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub latest_candle: bool,
    pub historical_candles: bool,
    pub funding_rate: bool,
    pub open_interest: bool,
    pub markets: bool,
}

impl Capabilities {
    /// 모든 작업 지원.
    pub const fn all() -> Self {
        Self {
            latest_candle: true,
            historical_candles: true,
            funding_rate: true,
            open_interest: true,
            markets: true,
        }
    }

    /// 아무 작업도 지원하지 않음.
    pub const fn none() -> Self {
        Self {
            latest_candle: false,
            historical_candles: false,
            funding_rate: false,
            open_interest: false,
            markets: false,
        }
    }

    /// 특정 작업 지원 여부.
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::LatestCandle => self.latest_candle,
            Capability::HistoricalCandles => self.historical_candles,
            Capability::FundingRate => self.funding_rate,
            Capability::OpenInterest => self.open_interest,
            Capability::Markets => self.markets,
        }
    }

    /// 특정 작업을 켜거나 끈 사본.
    pub fn with(mut self, capability: Capability, enabled: bool) -> Self {
        match capability {
            Capability::LatestCandle => self.latest_candle = enabled,
            Capability::HistoricalCandles => self.historical_candles = enabled,
            Capability::FundingRate => self.funding_rate = enabled,
            Capability::OpenInterest => self.open_interest = enabled,
            Capability::Markets => self.markets = enabled,
        }
        self
    }
}

/// 거래소에 상장된 무기한 선물 상품.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerpMarket {
    /// 기준 자산 (예: "BTC")
    pub base: String,
    /// 호가 자산 (예: "USDT")
    pub quote: String,
    /// 거래소 고유 심볼 (예: "BTCUSDT", "BTC-USDT-SWAP")
    pub native: String,
}

/// 거래소 REST 커넥터.
///
/// 모든 심볼 인자는 거래소 고유 심볼입니다. 지원하지 않는 작업의 기본 구현은
/// `ExchangeError::NotSupported`를 반환하지만, 호출 측은 [`crate::ExchangeClient`]를
/// 통해 `capabilities()`를 먼저 확인하므로 정상 경로에서는 호출되지 않습니다.
#[async_trait]
pub trait ExchangeConnector: Send + Sync {
    /// 거래소 식별자 (예: "binance").
    fn id(&self) -> &str;

    /// 기능 서술자.
    fn capabilities(&self) -> Capabilities;

    /// 가장 최근 캔들 하나.
    async fn fetch_latest_candle(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> ExchangeResult<Option<Candle>> {
        let _ = (symbol, timeframe);
        Err(ExchangeError::NotSupported(format!("{}: latest candle", self.id())))
    }

    /// `since`(포함) 이후 첫 캔들부터 시간 오름차순으로 최대 `limit`개.
    ///
    /// 빈 목록은 `since` 이후 현재까지 캔들이 없다는 뜻입니다.
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: i64,
        limit: usize,
    ) -> ExchangeResult<Vec<Candle>> {
        let _ = (symbol, timeframe, since, limit);
        Err(ExchangeError::NotSupported(format!("{}: historical candles", self.id())))
    }

    /// 현재 펀딩비.
    async fn fetch_funding_rate(&self, symbol: &str) -> ExchangeResult<Option<f64>> {
        let _ = symbol;
        Err(ExchangeError::NotSupported(format!("{}: funding rate", self.id())))
    }

    /// 현재 미결제약정.
    async fn fetch_open_interest(&self, symbol: &str) -> ExchangeResult<Option<f64>> {
        let _ = symbol;
        Err(ExchangeError::NotSupported(format!("{}: open interest", self.id())))
    }

    /// 상장된 무기한 선물 목록.
    async fn list_perpetual_markets(&self) -> ExchangeResult<Vec<PerpMarket>> {
        Err(ExchangeError::NotSupported(format!("{}: markets", self.id())))
    }
}
