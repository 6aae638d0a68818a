//! 시뮬레이션 거래소 구현.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use perp_core::{Candle, Timeframe, MINUTE_MS};

use crate::traits::{Capabilities, Capability, ExchangeConnector, ExchangeResult, PerpMarket};
use crate::ExchangeError;

/// 시뮬레이션 거래소 설정.
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// 거래소 식별자
    pub id: String,
    /// 기능 서술자
    pub capabilities: Capabilities,
    /// 펀딩비 응답
    pub funding_rate: Option<f64>,
    /// 미결제약정 응답
    pub open_interest: Option<f64>,
    /// 캔들 가격 기준값
    pub base_price: f64,
    /// 가장 오래된 캔들 시각 (없으면 제한 없음)
    pub history_start: Option<i64>,
    /// 최신 캔들 조회 시 빈 응답을 줄지 여부
    pub empty_latest: bool,
    /// 모든 요청에 적용되는 응답 지연
    pub latency: Duration,
    /// 상장 목록
    pub markets: Vec<PerpMarket>,
}

impl SimulatedConfig {
    /// 모든 기능을 지원하는 기본 설정.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capabilities: Capabilities::all(),
            funding_rate: None,
            open_interest: None,
            base_price: 100.0,
            history_start: None,
            empty_latest: false,
            latency: Duration::ZERO,
            markets: Vec::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_funding_rate(mut self, rate: f64) -> Self {
        self.funding_rate = Some(rate);
        self
    }

    pub fn with_open_interest(mut self, oi: f64) -> Self {
        self.open_interest = Some(oi);
        self
    }

    pub fn with_base_price(mut self, price: f64) -> Self {
        self.base_price = price;
        self
    }

    pub fn with_history_start(mut self, start_ms: i64) -> Self {
        self.history_start = Some(start_ms);
        self
    }

    pub fn with_empty_latest(mut self, empty: bool) -> Self {
        self.empty_latest = empty;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_market(mut self, base: &str, quote: &str, native: &str) -> Self {
        self.markets.push(PerpMarket {
            base: base.to_string(),
            quote: quote.to_string(),
            native: native.to_string(),
        });
        self
    }
}

/// 작업별 호출 횟수.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub latest_candle: usize,
    pub historical_candles: usize,
    pub funding_rate: usize,
    pub open_interest: usize,
    pub markets: usize,
}

#[derive(Debug, Default)]
struct SimState {
    calls: CallCounts,
    pending_failures: HashMap<Capability, usize>,
    always_fail: HashSet<Capability>,
    unknown_symbols: HashSet<String>,
    history_requests: Vec<(String, i64)>,
}

/// 네트워크 없이 동작하는 거래소.
#[derive(Debug)]
pub struct SimulatedExchange {
    config: SimulatedConfig,
    state: Mutex<SimState>,
}

impl SimulatedExchange {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SimState::default()),
        }
    }

    /// 다음 `count`번의 해당 작업 호출을 네트워크 에러로 실패시킵니다.
    pub fn fail_next(&self, capability: Capability, count: usize) {
        let mut state = self.lock();
        *state.pending_failures.entry(capability).or_default() += count;
    }

    /// 해당 작업을 항상 실패시키거나 해제합니다.
    pub fn set_always_fail(&self, capability: Capability, fail: bool) {
        let mut state = self.lock();
        if fail {
            state.always_fail.insert(capability);
        } else {
            state.always_fail.remove(&capability);
        }
    }

    /// 해당 심볼 요청을 `SymbolNotFound`로 거절합니다.
    pub fn reject_symbol(&self, symbol: &str) {
        self.lock().unknown_symbols.insert(symbol.to_string());
    }

    /// 누적 호출 횟수.
    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// 과거 캔들 요청의 `(symbol, since)` 기록.
    pub fn history_requests(&self) -> Vec<(String, i64)> {
        self.lock().history_requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        // 테스트 중 패닉으로 오염되어도 기록은 계속 읽을 수 있어야 합니다
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 호출을 기록하고 주입된 실패가 있으면 에러를 돌려줍니다.
    async fn enter(&self, capability: Capability, symbol: &str) -> ExchangeResult<()> {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }

        let mut state = self.lock();
        match capability {
            Capability::LatestCandle => state.calls.latest_candle += 1,
            Capability::HistoricalCandles => state.calls.historical_candles += 1,
            Capability::FundingRate => state.calls.funding_rate += 1,
            Capability::OpenInterest => state.calls.open_interest += 1,
            Capability::Markets => state.calls.markets += 1,
        }

        if state.always_fail.contains(&capability) {
            return Err(ExchangeError::NetworkError(format!(
                "{}: simulated outage ({})",
                self.config.id, capability
            )));
        }
        if let Some(remaining) = state.pending_failures.get_mut(&capability) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ExchangeError::NetworkError(format!(
                    "{}: simulated failure ({})",
                    self.config.id, capability
                )));
            }
        }
        if state.unknown_symbols.contains(symbol) {
            return Err(ExchangeError::SymbolNotFound(symbol.to_string()));
        }
        Ok(())
    }

    /// 시각에 따라 결정되는 캔들.
    fn candle_at(&self, timestamp: i64) -> Candle {
        let step = (timestamp / MINUTE_MS).rem_euclid(100) as f64;
        let open = self.config.base_price + step;
        Candle::new(timestamp, open, open + 1.0, open - 1.0, open + 0.5, 10.0 + step)
    }

    /// 현재 진행 중인 분(마지막으로 조회 가능한 캔들 시각).
    fn current_minute(timeframe: Timeframe) -> i64 {
        timeframe.floor(Utc::now().timestamp_millis())
    }
}

#[async_trait]
impl ExchangeConnector for SimulatedExchange {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn capabilities(&self) -> Capabilities {
        self.config.capabilities
    }

    async fn fetch_latest_candle(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> ExchangeResult<Option<Candle>> {
        self.enter(Capability::LatestCandle, symbol).await?;
        if self.config.empty_latest {
            return Ok(None);
        }
        Ok(Some(self.candle_at(Self::current_minute(timeframe))))
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: i64,
        limit: usize,
    ) -> ExchangeResult<Vec<Candle>> {
        self.enter(Capability::HistoricalCandles, symbol).await?;
        self.lock().history_requests.push((symbol.to_string(), since));

        let step = timeframe.as_millis();
        let aligned = timeframe.floor(since + step - 1);
        let first = match self.config.history_start {
            Some(start) => aligned.max(timeframe.floor(start)),
            None => aligned,
        };
        let last = Self::current_minute(timeframe);

        let candles = (0..limit as i64)
            .map(|i| first + i * step)
            .take_while(|ts| *ts <= last)
            .map(|ts| self.candle_at(ts))
            .collect();
        Ok(candles)
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> ExchangeResult<Option<f64>> {
        self.enter(Capability::FundingRate, symbol).await?;
        Ok(self.config.funding_rate)
    }

    async fn fetch_open_interest(&self, symbol: &str) -> ExchangeResult<Option<f64>> {
        self.enter(Capability::OpenInterest, symbol).await?;
        Ok(self.config.open_interest)
    }

    async fn list_perpetual_markets(&self) -> ExchangeResult<Vec<PerpMarket>> {
        self.enter(Capability::Markets, "").await?;
        Ok(self.config.markets.clone())
    }
}
