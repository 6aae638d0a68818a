//! 캔들 타임프레임 정의.
//!
//! 거래소마다 간격 표기가 달라서 각 커넥터가 쓰는 문자열을 여기서 제공합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 1분 (밀리초).
pub const MINUTE_MS: i64 = 60_000;

/// 캔들 타임프레임.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    /// 1분봉
    M1,
    /// 5분봉
    M5,
    /// 15분봉
    M15,
    /// 1시간봉
    H1,
    /// 4시간봉
    H4,
    /// 일봉
    D1,
}

impl Timeframe {
    /// 타임프레임 길이.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.as_millis() as u64)
    }

    /// 밀리초 단위 길이.
    pub fn as_millis(&self) -> i64 {
        match self {
            Timeframe::M1 => MINUTE_MS,
            Timeframe::M5 => 5 * MINUTE_MS,
            Timeframe::M15 => 15 * MINUTE_MS,
            Timeframe::H1 => 60 * MINUTE_MS,
            Timeframe::H4 => 4 * 60 * MINUTE_MS,
            Timeframe::D1 => 24 * 60 * MINUTE_MS,
        }
    }

    /// Binance / Hyperliquid 간격 문자열.
    pub fn to_binance_interval(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    /// Bybit v5 간격 문자열 (분 단위 숫자, 일봉은 "D").
    pub fn to_bybit_interval(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1",
            Timeframe::M5 => "5",
            Timeframe::M15 => "15",
            Timeframe::H1 => "60",
            Timeframe::H4 => "240",
            Timeframe::D1 => "D",
        }
    }

    /// OKX `bar` 파라미터.
    pub fn to_okx_bar(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1H",
            Timeframe::H4 => "4H",
            Timeframe::D1 => "1Dutc",
        }
    }

    /// Binance 간격 문자열에서 파싱.
    pub fn from_binance_interval(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Timeframe::M1),
            "5m" => Some(Timeframe::M5),
            "15m" => Some(Timeframe::M15),
            "1h" => Some(Timeframe::H1),
            "4h" => Some(Timeframe::H4),
            "1d" => Some(Timeframe::D1),
            _ => None,
        }
    }

    /// 타임스탬프를 타임프레임 경계로 내림.
    pub fn floor(&self, timestamp_ms: i64) -> i64 {
        timestamp_ms - timestamp_ms.rem_euclid(self.as_millis())
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_binance_interval())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_binance_interval(s).ok_or_else(|| format!("Invalid timeframe: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_duration() {
        assert_eq!(Timeframe::M1.as_millis(), 60_000);
        assert_eq!(Timeframe::H1.duration(), Duration::from_secs(3600));
    }

    #[test]
    fn test_exchange_intervals() {
        assert_eq!(Timeframe::M1.to_binance_interval(), "1m");
        assert_eq!(Timeframe::H4.to_bybit_interval(), "240");
        assert_eq!(Timeframe::H1.to_okx_bar(), "1H");
        assert_eq!("15m".parse::<Timeframe>(), Ok(Timeframe::M15));
        assert!("7m".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_floor_to_minute() {
        assert_eq!(Timeframe::M1.floor(1_700_000_059_999), 1_700_000_040_000);
        assert_eq!(Timeframe::M1.floor(1_700_000_040_000), 1_700_000_040_000);
    }
}
