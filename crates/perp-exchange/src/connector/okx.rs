//! OKX v5 무기한 스왑 커넥터.
//!
//! 공개 캔들 엔드포인트는 최근 구간만 주므로 과거 캔들 페이지 조회는 지원하지 않습니다.

use async_trait::async_trait;
use perp_core::{parse_num, Candle, Timeframe};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::{get_json, parse_array_candle, RestConfig};
use crate::traits::{Capabilities, Capability, ExchangeConnector, ExchangeResult, PerpMarket};
use crate::ExchangeError;

const DEFAULT_BASE_URL: &str = "https://www.okx.com";

#[derive(Debug, Deserialize)]
struct OkxResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxInstrument {
    inst_id: String,
    #[serde(default)]
    uly: String,
    #[serde(default)]
    settle_ccy: String,
    #[serde(default)]
    state: String,
}

/// OKX 클라이언트.
pub struct OkxClient {
    client: Client,
    base_url: String,
}

impl OkxClient {
    pub fn new(config: RestConfig) -> ExchangeResult<Self> {
        Ok(Self {
            client: config.http_client()?,
            base_url: config.base_url_or(DEFAULT_BASE_URL),
        })
    }

    /// `code`가 "0"이 아니면 에러로 변환하고 `data`를 돌려줍니다.
    async fn public_get(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<Vec<Value>> {
        let url = format!("{}{}", self.base_url, endpoint);
        let body = get_json(&self.client, &url, params).await?;
        let response: OkxResponse = serde_json::from_value(body)?;

        if response.code == "0" {
            return Ok(response.data);
        }
        let code = response.code.parse::<i32>().unwrap_or(-1);
        Err(match code {
            50011 => ExchangeError::RateLimited,
            51001 => ExchangeError::SymbolNotFound(response.msg),
            _ => ExchangeError::ApiError {
                code,
                message: response.msg,
            },
        })
    }

    async fn first_field(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        field: &str,
    ) -> ExchangeResult<Option<f64>> {
        let data = self.public_get(endpoint, params).await?;
        Ok(data.first().and_then(|d| d.get(field)).and_then(parse_num))
    }
}

#[async_trait]
impl ExchangeConnector for OkxClient {
    fn id(&self) -> &str {
        "okx"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all().with(Capability::HistoricalCandles, false)
    }

    async fn fetch_latest_candle(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> ExchangeResult<Option<Candle>> {
        let data = self
            .public_get(
                "/api/v5/market/candles",
                &[
                    ("instId", symbol.to_string()),
                    ("bar", timeframe.to_okx_bar().to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(data.first().and_then(parse_array_candle))
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> ExchangeResult<Option<f64>> {
        self.first_field(
            "/api/v5/public/funding-rate",
            &[("instId", symbol.to_string())],
            "fundingRate",
        )
        .await
    }

    async fn fetch_open_interest(&self, symbol: &str) -> ExchangeResult<Option<f64>> {
        self.first_field(
            "/api/v5/public/open-interest",
            &[
                ("instType", "SWAP".to_string()),
                ("instId", symbol.to_string()),
            ],
            "oi",
        )
        .await
    }

    async fn list_perpetual_markets(&self) -> ExchangeResult<Vec<PerpMarket>> {
        let data = self
            .public_get("/api/v5/public/instruments", &[("instType", "SWAP".to_string())])
            .await?;

        let mut markets = Vec::with_capacity(data.len());
        for raw in data {
            let inst: OkxInstrument = serde_json::from_value(raw)?;
            if inst.state != "live" {
                continue;
            }
            // uly: "BTC-USDT"
            let Some((base, quote)) = inst.uly.split_once('-') else {
                continue;
            };
            let quote = if quote.is_empty() { inst.settle_ccy.as_str() } else { quote };
            markets.push(PerpMarket {
                base: base.to_string(),
                quote: quote.to_string(),
                native: inst.inst_id,
            });
        }
        Ok(markets)
    }
}
