//! 거래소 REST 커넥터.
//!
//! 모든 커넥터는 공개(인증 불필요) 엔드포인트만 사용합니다.

pub mod binance;
pub mod bybit;
pub mod hyperliquid;
pub mod okx;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;

use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::traits::{ExchangeConnector, ExchangeResult};
use crate::ExchangeError;

pub use binance::BinanceClient;
pub use bybit::BybitClient;
pub use hyperliquid::HyperliquidClient;
pub use okx::OkxClient;

/// 기본 커넥터가 있는 거래소 식별자.
pub const SUPPORTED_EXCHANGES: [&str; 4] = ["binance", "bybit", "okx", "hyperliquid"];

/// REST 커넥터 공통 설정.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// 기본 URL 재정의 (테스트용 목 서버 등). 없으면 거래소 기본값.
    pub base_url: Option<String>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
        }
    }
}

impl RestConfig {
    /// 기본 URL 지정.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// 타임아웃 지정.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub(crate) fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| default.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub(crate) fn http_client(&self) -> ExchangeResult<Client> {
        Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e)))
    }
}

/// 거래소 식별자로 커넥터 생성.
///
/// 알 수 없는 식별자면 `Ok(None)`.
pub fn build_connector(
    id: &str,
    config: RestConfig,
) -> ExchangeResult<Option<Arc<dyn ExchangeConnector>>> {
    let connector: Arc<dyn ExchangeConnector> = match id {
        "binance" => Arc::new(BinanceClient::new(config)?),
        "bybit" => Arc::new(BybitClient::new(config)?),
        "okx" => Arc::new(OkxClient::new(config)?),
        "hyperliquid" => Arc::new(HyperliquidClient::new(config)?),
        _ => return Ok(None),
    };
    Ok(Some(connector))
}

/// GET 요청 후 JSON 본문 반환.
pub(crate) async fn get_json(
    client: &Client,
    url: &str,
    params: &[(&str, String)],
) -> ExchangeResult<Value> {
    debug!(url = url, ?params, "GET");
    let response = client.get(url).query(params).send().await?;
    read_json(response).await
}

/// JSON 본문으로 POST 요청 후 JSON 본문 반환.
pub(crate) async fn post_json(client: &Client, url: &str, body: &Value) -> ExchangeResult<Value> {
    debug!(url = url, body = %body, "POST");
    let response = client.post(url).json(body).send().await?;
    read_json(response).await
}

/// 상태 코드 확인 후 JSON 파싱.
///
/// 429/418은 `RateLimited`, 그 밖의 실패 상태는 `ApiError`로 변환하되
/// 본문은 호출 측이 거래소별 에러 코드를 해석할 수 있도록 메시지에 남깁니다.
async fn read_json(response: Response) -> ExchangeResult<Value> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ExchangeError::NetworkError(e.to_string()))?;

    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
        return Err(ExchangeError::RateLimited);
    }

    if !status.is_success() {
        return Err(ExchangeError::ApiError {
            code: status.as_u16() as i32,
            message: body,
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        debug!(error = %e, body = %body, "응답 파싱 실패");
        ExchangeError::ParseError(e.to_string())
    })
}

/// 펀딩비와 미결제약정이 같은 응답에 들어 있는 거래소용 단기 응답 캐시.
pub(crate) struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Value)>>,
}

impl ResponseCache {
    /// 한 틱 안의 연속 조회만 묶는 기본 유효 시간.
    pub(crate) const DEFAULT_TTL: Duration = Duration::from_secs(5);

    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// 유효 시간 안이면 캐시된 값, 아니면 `fetch` 결과를 저장 후 반환.
    pub(crate) async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> ExchangeResult<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ExchangeResult<Value>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = fetch().await?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), (Instant::now(), value.clone()));
        Ok(value)
    }

    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, (at, _)| at.elapsed() < self.ttl);
        entries.get(key).map(|(_, value)| value.clone())
    }
}

/// 시작/끝 구간으로만 조회되는 거래소에서 `since` 이후 첫 캔들 페이지 찾기.
///
/// 구간 하나에 캔들이 없으면(상장 전, 점검 구간) 다음 구간으로 넘어가며,
/// 현재 시각을 지나도록 비어 있으면 빈 목록을 돌려줍니다.
pub(crate) async fn scan_candle_windows<F, Fut>(
    since: i64,
    limit: usize,
    step_ms: i64,
    mut fetch_window: F,
) -> ExchangeResult<Vec<perp_core::Candle>>
where
    F: FnMut(i64, i64) -> Fut,
    Fut: Future<Output = ExchangeResult<Vec<perp_core::Candle>>>,
{
    let span = (limit.max(1) as i64 - 1) * step_ms;
    let now = Utc::now().timestamp_millis();
    let mut start = since;

    loop {
        let end = start + span;
        let candles = fetch_window(start, end).await?;
        if !candles.is_empty() || end >= now {
            return Ok(candles);
        }
        debug!(start = start, end = end, "빈 캔들 구간, 다음 구간 조회");
        start = end + step_ms;
    }
}

/// `[ts, open, high, low, close, volume, ...]` 배열 형식 캔들 파싱.
///
/// Binance / Bybit / OKX가 같은 열 순서를 씁니다. 시각이 없는 행은 버립니다.
pub(crate) fn parse_array_candle(row: &Value) -> Option<perp_core::Candle> {
    use perp_core::{parse_millis, parse_num};

    let cols = row.as_array()?;
    let timestamp = parse_millis(cols.first()?)?;
    let col = |i: usize| cols.get(i).and_then(parse_num);
    Some(perp_core::Candle {
        timestamp,
        open: col(1),
        high: col(2),
        low: col(3),
        close: col(4),
        volume: col(5),
    })
}
