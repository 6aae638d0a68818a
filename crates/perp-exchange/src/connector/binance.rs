//! Binance USDⓈ-M 선물 커넥터.
//!
//! `fapi` 공개 엔드포인트로 1분봉, 펀딩비, 미결제약정, 상품 목록을 조회합니다.

use async_trait::async_trait;
use perp_core::{parse_num, Candle, Timeframe};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::{get_json, parse_array_candle, RestConfig};
use crate::traits::{Capabilities, ExchangeConnector, ExchangeResult, PerpMarket};
use crate::ExchangeError;

const DEFAULT_BASE_URL: &str = "https://fapi.binance.com";

/// 한 번에 조회할 수 있는 최대 캔들 수.
const MAX_KLINES: usize = 1500;

#[derive(Debug, Deserialize)]
struct BinanceError {
    code: i32,
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceExchangeInfo {
    symbols: Vec<BinanceSymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceSymbolInfo {
    symbol: String,
    base_asset: String,
    quote_asset: String,
    #[serde(default)]
    contract_type: String,
    #[serde(default)]
    status: String,
}

/// Binance 선물 클라이언트.
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    /// 새 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`.
    pub fn new(config: RestConfig) -> ExchangeResult<Self> {
        Ok(Self {
            client: config.http_client()?,
            base_url: config.base_url_or(DEFAULT_BASE_URL),
        })
    }

    async fn public_get(&self, endpoint: &str, params: &[(&str, String)]) -> ExchangeResult<Value> {
        let url = format!("{}{}", self.base_url, endpoint);
        get_json(&self.client, &url, params)
            .await
            .map_err(Self::map_error)
    }

    /// HTTP 에러 본문의 Binance 에러 코드를 해석합니다.
    fn map_error(err: ExchangeError) -> ExchangeError {
        let ExchangeError::ApiError { code, message } = &err else {
            return err;
        };
        match serde_json::from_str::<BinanceError>(message) {
            Ok(e) => match e.code {
                -1003 => ExchangeError::RateLimited,
                -1121 => ExchangeError::SymbolNotFound(e.msg),
                _ => ExchangeError::ApiError {
                    code: e.code,
                    message: e.msg,
                },
            },
            Err(_) => ExchangeError::ApiError {
                code: *code,
                message: message.clone(),
            },
        }
    }

    async fn klines(&self, params: &[(&str, String)]) -> ExchangeResult<Vec<Candle>> {
        let body = self.public_get("/fapi/v1/klines", params).await?;
        let rows = body
            .as_array()
            .ok_or_else(|| ExchangeError::ParseError("klines: expected array".to_string()))?;
        Ok(rows.iter().filter_map(parse_array_candle).collect())
    }
}

#[async_trait]
impl ExchangeConnector for BinanceClient {
    fn id(&self) -> &str {
        "binance"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    async fn fetch_latest_candle(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> ExchangeResult<Option<Candle>> {
        let candles = self
            .klines(&[
                ("symbol", symbol.to_string()),
                ("interval", timeframe.to_binance_interval().to_string()),
                ("limit", "1".to_string()),
            ])
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
        self.klines(&[
            ("symbol", symbol.to_string()),
            ("interval", timeframe.to_binance_interval().to_string()),
            ("startTime", since.to_string()),
            ("limit", limit.clamp(1, MAX_KLINES).to_string()),
        ])
        .await
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> ExchangeResult<Option<f64>> {
        let body = self
            .public_get("/fapi/v1/premiumIndex", &[("symbol", symbol.to_string())])
            .await?;
        Ok(body.get("lastFundingRate").and_then(parse_num))
    }

    async fn fetch_open_interest(&self, symbol: &str) -> ExchangeResult<Option<f64>> {
        let body = self
            .public_get("/fapi/v1/openInterest", &[("symbol", symbol.to_string())])
            .await?;
        Ok(body.get("openInterest").and_then(parse_num))
    }

    async fn list_perpetual_markets(&self) -> ExchangeResult<Vec<PerpMarket>> {
        let body = self.public_get("/fapi/v1/exchangeInfo", &[]).await?;
        let info: BinanceExchangeInfo = serde_json::from_value(body)?;

        Ok(info
            .symbols
            .into_iter()
            .filter(|s| s.contract_type == "PERPETUAL" && s.status == "TRADING")
            .map(|s| PerpMarket {
                base: s.base_asset,
                quote: s.quote_asset,
                native: s.symbol,
            })
            .collect())
    }
}
