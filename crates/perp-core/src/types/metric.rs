//! 캔들과 분 단위 메트릭 행.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 거래소에서 받은 OHLCV 캔들.
///
/// 거래소가 비정상 값을 주면 해당 필드만 `None`이 됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 시가 시각 (epoch 밀리초)
    pub timestamp: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl Candle {
    /// 모든 값이 있는 캔들 생성.
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
        }
    }
}

/// 하나의 관측 행: (거래소, 기준 심볼, 분) 단위.
///
/// 논리적 키는 `(exchange, symbol, timestamp)`이지만 물리적으로 강제하지 않습니다.
/// 한 번 기록된 행은 수정되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRow {
    /// 거래소 식별자 (예: "binance")
    pub exchange: String,
    /// 기준 심볼 (예: "BTC"). 거래소 고유 심볼은 저장하지 않습니다.
    pub symbol: String,
    /// 분 단위로 정렬된 epoch 밀리초
    pub timestamp: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub funding_rate: Option<f64>,
    pub open_interest: Option<f64>,
    /// 예약 필드 (현재 생산자 없음)
    pub long_short_ratio: Option<f64>,
}

impl MetricRow {
    /// 캔들만 담은 행 (백필용, 펀딩/미결제약정은 비어 있음).
    pub fn from_candle(exchange: impl Into<String>, symbol: impl Into<String>, candle: &Candle) -> Self {
        Self {
            exchange: exchange.into(),
            symbol: symbol.into(),
            timestamp: candle.timestamp,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            funding_rate: None,
            open_interest: None,
            long_short_ratio: None,
        }
    }

    /// OHLCV 없이 펀딩비/미결제약정만 담은 스냅샷 행.
    pub fn snapshot(
        exchange: impl Into<String>,
        symbol: impl Into<String>,
        timestamp: i64,
        funding_rate: Option<f64>,
        open_interest: Option<f64>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            symbol: symbol.into(),
            timestamp,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            funding_rate,
            open_interest,
            long_short_ratio: None,
        }
    }

    /// 펀딩비/미결제약정 설정.
    pub fn with_derivatives(mut self, funding_rate: Option<f64>, open_interest: Option<f64>) -> Self {
        self.funding_rate = funding_rate;
        self.open_interest = open_interest;
        self
    }

    /// OHLCV 필드가 하나라도 있는지.
    pub fn has_ohlcv(&self) -> bool {
        self.open.is_some()
            || self.high.is_some()
            || self.low.is_some()
            || self.close.is_some()
            || self.volume.is_some()
    }

    /// 타임스탬프를 UTC 시각으로 변환.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_candle_leaves_derivatives_empty() {
        let candle = Candle::new(1_700_000_040_000, 1.0, 2.0, 0.5, 1.5, 10.0);
        let row = MetricRow::from_candle("binance", "BTC", &candle);

        assert_eq!(row.timestamp, candle.timestamp);
        assert_eq!(row.close, Some(1.5));
        assert!(row.has_ohlcv());
        assert!(row.funding_rate.is_none());
        assert!(row.open_interest.is_none());
        assert!(row.long_short_ratio.is_none());
    }

    #[test]
    fn test_snapshot_has_no_ohlcv() {
        let row = MetricRow::snapshot("okx", "ETH", 1_700_000_040_000, Some(0.0001), None);
        assert!(!row.has_ohlcv());
        assert_eq!(row.funding_rate, Some(0.0001));
    }

    #[test]
    fn test_serializes_camel_case() {
        let row = MetricRow::snapshot("bybit", "SOL", 0, Some(0.01), Some(5.0));
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["fundingRate"], 0.01);
        assert_eq!(json["openInterest"], 5.0);
        assert!(json["longShortRatio"].is_null());
    }
}
