//! Hyperliquid 커넥터.
//!
//! 모든 조회가 `POST /info` 하나로 이뤄지며 심볼은 코인 이름("BTC")입니다.
//! 펀딩비와 미결제약정은 `metaAndAssetCtxs` 응답에서 유니버스 순번으로 찾습니다.

use async_trait::async_trait;
use chrono::Utc;
use perp_core::{parse_millis, parse_num, Candle, Timeframe};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{post_json, scan_candle_windows, ResponseCache, RestConfig};
use crate::traits::{Capabilities, ExchangeConnector, ExchangeResult, PerpMarket};
use crate::ExchangeError;

const DEFAULT_BASE_URL: &str = "https://api.hyperliquid.xyz";

/// 모든 무기한 상품의 결제 통화.
const QUOTE: &str = "USDC";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UniverseAsset {
    name: String,
    #[serde(default)]
    is_delisted: bool,
}

#[derive(Debug, Deserialize)]
struct Meta {
    universe: Vec<UniverseAsset>,
}

/// Hyperliquid 클라이언트.
pub struct HyperliquidClient {
    client: Client,
    info_url: String,
    /// 전체 유니버스의 `metaAndAssetCtxs` 응답
    asset_ctxs: ResponseCache,
}

impl HyperliquidClient {
    pub fn new(config: RestConfig) -> ExchangeResult<Self> {
        let base_url = config.base_url_or(DEFAULT_BASE_URL);
        Ok(Self {
            client: config.http_client()?,
            info_url: format!("{}/info", base_url),
            asset_ctxs: ResponseCache::new(ResponseCache::DEFAULT_TTL),
        })
    }

    async fn info(&self, request: Value) -> ExchangeResult<Value> {
        post_json(&self.client, &self.info_url, &request).await
    }

    async fn candle_snapshot(
        &self,
        coin: &str,
        timeframe: Timeframe,
        start: i64,
        end: i64,
    ) -> ExchangeResult<Vec<Candle>> {
        let body = self
            .info(json!({
                "type": "candleSnapshot",
                "req": {
                    "coin": coin,
                    "interval": timeframe.to_binance_interval(),
                    "startTime": start,
                    "endTime": end,
                }
            }))
            .await?;

        let rows = body
            .as_array()
            .ok_or_else(|| ExchangeError::ParseError("candleSnapshot: expected array".to_string()))?;
        let mut candles: Vec<Candle> = rows.iter().filter_map(Self::parse_candle).collect();
        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }

    /// `{"t":..,"o":..,"h":..,"l":..,"c":..,"v":..}` 형식 캔들.
    fn parse_candle(row: &Value) -> Option<Candle> {
        let field = |key: &str| row.get(key).and_then(parse_num);
        Some(Candle {
            timestamp: parse_millis(row.get("t")?)?,
            open: field("o"),
            high: field("h"),
            low: field("l"),
            close: field("c"),
            volume: field("v"),
        })
    }

    /// 코인의 자산 컨텍스트 (`funding`, `openInterest` 등).
    async fn asset_context(&self, coin: &str) -> ExchangeResult<Option<Value>> {
        let body = self
            .asset_ctxs
            .get_or_fetch("metaAndAssetCtxs", || {
                self.info(json!({ "type": "metaAndAssetCtxs" }))
            })
            .await?;
        let parts = body
            .as_array()
            .filter(|p| p.len() >= 2)
            .ok_or_else(|| ExchangeError::ParseError("metaAndAssetCtxs: expected [meta, ctxs]".to_string()))?;

        let meta: Meta = serde_json::from_value(parts[0].clone())?;
        let Some(index) = meta.universe.iter().position(|a| a.name == coin) else {
            return Err(ExchangeError::SymbolNotFound(coin.to_string()));
        };
        Ok(parts[1].as_array().and_then(|ctxs| ctxs.get(index)).cloned())
    }
}

#[async_trait]
impl ExchangeConnector for HyperliquidClient {
    fn id(&self) -> &str {
        "hyperliquid"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    async fn fetch_latest_candle(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> ExchangeResult<Option<Candle>> {
        let now = Utc::now().timestamp_millis();
        let candles = self
            .candle_snapshot(symbol, timeframe, now - 2 * timeframe.as_millis(), now)
            .await?;
        Ok(candles.last().copied())
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: i64,
        limit: usize,
    ) -> ExchangeResult<Vec<Candle>> {
        let limit = limit.max(1);
        let mut candles = scan_candle_windows(since, limit, timeframe.as_millis(), |start, end| {
            self.candle_snapshot(symbol, timeframe, start, end)
        })
        .await?;
        candles.truncate(limit);
        Ok(candles)
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> ExchangeResult<Option<f64>> {
        Ok(self
            .asset_context(symbol)
            .await?
            .and_then(|ctx| ctx.get("funding").and_then(parse_num)))
    }

    async fn fetch_open_interest(&self, symbol: &str) -> ExchangeResult<Option<f64>> {
        Ok(self
            .asset_context(symbol)
            .await?
            .and_then(|ctx| ctx.get("openInterest").and_then(parse_num)))
    }

    async fn list_perpetual_markets(&self) -> ExchangeResult<Vec<PerpMarket>> {
        let body = self.info(json!({ "type": "meta" })).await?;
        let meta: Meta = serde_json::from_value(body)?;

        Ok(meta
            .universe
            .into_iter()
            .filter(|a| !a.is_delisted)
            .map(|a| PerpMarket {
                base: a.name.clone(),
                quote: QUOTE.to_string(),
                native: a.name,
            })
            .collect())
    }
}
