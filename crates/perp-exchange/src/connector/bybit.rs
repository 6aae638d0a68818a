//! Bybit v5 선형(USDT/USDC) 무기한 선물 커넥터.

use async_trait::async_trait;
use perp_core::{parse_num, Candle, Timeframe};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::{get_json, parse_array_candle, scan_candle_windows, ResponseCache, RestConfig};
use crate::traits::{Capabilities, ExchangeConnector, ExchangeResult, PerpMarket};
use crate::ExchangeError;

const DEFAULT_BASE_URL: &str = "https://api.bybit.com";
const CATEGORY: &str = "linear";
const MAX_KLINES: usize = 1000;

/// Bybit v5 공통 응답 래퍼.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitResponse {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitInstruments {
    #[serde(default)]
    list: Vec<BybitInstrument>,
    #[serde(default)]
    next_page_cursor: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitInstrument {
    symbol: String,
    base_coin: String,
    quote_coin: String,
    #[serde(default)]
    contract_type: String,
    #[serde(default)]
    status: String,
}

/// Bybit 클라이언트.
pub struct BybitClient {
    client: Client,
    base_url: String,
    /// 펀딩비/미결제약정이 함께 오는 `tickers` 응답
    tickers: ResponseCache,
}

impl BybitClient {
    pub fn new(config: RestConfig) -> ExchangeResult<Self> {
        Ok(Self {
            client: config.http_client()?,
            base_url: config.base_url_or(DEFAULT_BASE_URL),
            tickers: ResponseCache::new(ResponseCache::DEFAULT_TTL),
        })
    }

    /// GET 요청 후 `retCode`를 확인하고 `result`를 돌려줍니다.
    async fn public_get(&self, endpoint: &str, params: &[(&str, String)]) -> ExchangeResult<Value> {
        let url = format!("{}{}", self.base_url, endpoint);
        let body = get_json(&self.client, &url, params).await?;
        let response: BybitResponse = serde_json::from_value(body)?;

        match response.ret_code {
            0 => Ok(response.result),
            10006 => Err(ExchangeError::RateLimited),
            code => Err(ExchangeError::ApiError {
                code: code as i32,
                message: response.ret_msg,
            }),
        }
    }

    /// 캔들 목록 파싱. Bybit은 최신순으로 주므로 오름차순으로 정렬합니다.
    fn parse_kline_list(result: &Value) -> Vec<Candle> {
        let mut candles: Vec<Candle> = result
            .get("list")
            .and_then(Value::as_array)
            .map(|rows| rows.iter().filter_map(parse_array_candle).collect())
            .unwrap_or_default();
        candles.sort_by_key(|c| c.timestamp);
        candles
    }

    async fn ticker(&self, symbol: &str) -> ExchangeResult<Option<Value>> {
        let params = [
            ("category", CATEGORY.to_string()),
            ("symbol", symbol.to_string()),
        ];
        let result = self
            .tickers
            .get_or_fetch(symbol, || self.public_get("/v5/market/tickers", &params))
            .await?;
        Ok(result
            .get("list")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .cloned())
    }
}

#[async_trait]
impl ExchangeConnector for BybitClient {
    fn id(&self) -> &str {
        "bybit"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    async fn fetch_latest_candle(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> ExchangeResult<Option<Candle>> {
        let result = self
            .public_get(
                "/v5/market/kline",
                &[
                    ("category", CATEGORY.to_string()),
                    ("symbol", symbol.to_string()),
                    ("interval", timeframe.to_bybit_interval().to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(Self::parse_kline_list(&result).last().copied())
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: i64,
        limit: usize,
    ) -> ExchangeResult<Vec<Candle>> {
        let limit = limit.clamp(1, MAX_KLINES);
        let interval = timeframe.to_bybit_interval().to_string();
        // start만 주면 최신 구간이 돌아오므로 end로 페이지 범위를 고정합니다
        scan_candle_windows(since, limit, timeframe.as_millis(), |start, end| {
            let params = [
                ("category", CATEGORY.to_string()),
                ("symbol", symbol.to_string()),
                ("interval", interval.clone()),
                ("start", start.to_string()),
                ("end", end.to_string()),
                ("limit", limit.to_string()),
            ];
            async move {
                let result = self.public_get("/v5/market/kline", &params).await?;
                Ok(Self::parse_kline_list(&result))
            }
        })
        .await
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> ExchangeResult<Option<f64>> {
        Ok(self
            .ticker(symbol)
            .await?
            .and_then(|t| t.get("fundingRate").and_then(parse_num)))
    }

    async fn fetch_open_interest(&self, symbol: &str) -> ExchangeResult<Option<f64>> {
        Ok(self
            .ticker(symbol)
            .await?
            .and_then(|t| t.get("openInterest").and_then(parse_num)))
    }

    async fn list_perpetual_markets(&self) -> ExchangeResult<Vec<PerpMarket>> {
        let mut markets = Vec::new();
        let mut cursor = String::new();

        loop {
            let mut params = vec![
                ("category", CATEGORY.to_string()),
                ("limit", "1000".to_string()),
            ];
            if !cursor.is_empty() {
                params.push(("cursor", cursor.clone()));
            }

            let result = self
                .public_get("/v5/market/instruments-info", &params)
                .await?;
            let page: BybitInstruments = serde_json::from_value(result)?;

            markets.extend(
                page.list
                    .into_iter()
                    .filter(|i| i.contract_type == "LinearPerpetual" && i.status == "Trading")
                    .map(|i| PerpMarket {
                        base: i.base_coin,
                        quote: i.quote_coin,
                        native: i.symbol,
                    }),
            );

            if page.next_page_cursor.is_empty() || page.next_page_cursor == cursor {
                break;
            }
            cursor = page.next_page_cursor;
        }

        Ok(markets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> BybitClient {
        BybitClient::new(RestConfig::default().with_base_url(server.url())).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_candles_sorted_ascending_with_bounded_range() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v5/market/kline")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("category".into(), "linear".into()),
                Matcher::UrlEncoded("interval".into(), "1".into()),
                Matcher::UrlEncoded("start".into(), "1700000040000".into()),
                Matcher::UrlEncoded("end".into(), "1700000100000".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .with_body(
                r#"{"retCode":0,"retMsg":"OK","result":{"category":"linear","symbol":"BTCUSDT","list":[
                    ["1700000100000","37005.2","37020","37000","37015","8.1","0"],
                    ["1700000040000","37000.1","37010","36990.5","37005.2","12.5","0"]
                ]}}"#,
            )
            .create_async()
            .await;

        let candles = client_for(&server)
            .fetch_candles("BTCUSDT", Timeframe::M1, 1_700_000_040_000, 2)
            .await
            .unwrap();

        mock.assert_async().await;
        let stamps: Vec<i64> = candles.iter().map(|c| c.timestamp).collect();
        assert_eq!(stamps, vec![1_700_000_040_000, 1_700_000_100_000]);
    }

    #[tokio::test]
    async fn test_fetch_candles_skips_window_before_listing() {
        let mut server = mockito::Server::new_async().await;
        let empty = server
            .mock("GET", "/v5/market/kline")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("start".into(), "1700000040000".into()),
                Matcher::UrlEncoded("end".into(), "1700000100000".into()),
            ]))
            .with_body(r#"{"retCode":0,"retMsg":"OK","result":{"symbol":"NEWUSDT","list":[]}}"#)
            .create_async()
            .await;
        let listed = server
            .mock("GET", "/v5/market/kline")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("start".into(), "1700000160000".into()),
                Matcher::UrlEncoded("end".into(), "1700000220000".into()),
            ]))
            .with_body(
                r#"{"retCode":0,"retMsg":"OK","result":{"symbol":"NEWUSDT","list":[
                    ["1700000220000","1.02","1.05","1.01","1.04","900","0"],
                    ["1700000160000","1.0","1.03","0.99","1.02","1500","0"]
                ]}}"#,
            )
            .create_async()
            .await;

        let candles = client_for(&server)
            .fetch_candles("NEWUSDT", Timeframe::M1, 1_700_000_040_000, 2)
            .await
            .unwrap();

        empty.assert_async().await;
        listed.assert_async().await;
        let stamps: Vec<i64> = candles.iter().map(|c| c.timestamp).collect();
        assert_eq!(stamps, vec![1_700_000_160_000, 1_700_000_220_000]);
    }

    #[tokio::test]
    async fn test_ticker_fields() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v5/market/tickers")
            .match_query(Matcher::UrlEncoded("symbol".into(), "SOLUSDT".into()))
            .with_body(
                r#"{"retCode":0,"retMsg":"OK","result":{"list":[
                    {"symbol":"SOLUSDT","fundingRate":"-0.00005","openInterest":"1520034.2"}
                ]}}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        assert_eq!(client.fetch_funding_rate("SOLUSDT").await.unwrap(), Some(-0.00005));
        assert_eq!(client.fetch_open_interest("SOLUSDT").await.unwrap(), Some(1_520_034.2));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ret_code_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v5/market/tickers")
            .match_query(Matcher::Any)
            .with_body(r#"{"retCode":10001,"retMsg":"params error: symbol invalid","result":{}}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .fetch_funding_rate("NOPE")
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::ApiError { code: 10001, .. }));
    }

    #[tokio::test]
    async fn test_instruments_follow_cursor() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v5/market/instruments-info")
            .match_query(Matcher::Regex("^category=linear&limit=1000$".into()))
            .with_body(
                r#"{"retCode":0,"retMsg":"OK","result":{"list":[
                    {"symbol":"BTCUSDT","baseCoin":"BTC","quoteCoin":"USDT","contractType":"LinearPerpetual","status":"Trading"},
                    {"symbol":"BTC-28JUN24","baseCoin":"BTC","quoteCoin":"USDC","contractType":"LinearFutures","status":"Trading"}
                ],"nextPageCursor":"page2"}}"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/v5/market/instruments-info")
            .match_query(Matcher::UrlEncoded("cursor".into(), "page2".into()))
            .with_body(
                r#"{"retCode":0,"retMsg":"OK","result":{"list":[
                    {"symbol":"ETHPERP","baseCoin":"ETH","quoteCoin":"USDC","contractType":"LinearPerpetual","status":"Trading"}
                ],"nextPageCursor":""}}"#,
            )
            .create_async()
            .await;

        let markets = client_for(&server).list_perpetual_markets().await.unwrap();
        let natives: Vec<&str> = markets.iter().map(|m| m.native.as_str()).collect();
        assert_eq!(natives, vec!["BTCUSDT", "ETHPERP"]);
    }
}
