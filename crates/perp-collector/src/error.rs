//! 에러 타입 정의.

use std::fmt;

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 데이터베이스 에러
    Database(sqlx::Error),
    /// 설정 에러
    Config(String),
    /// 심볼 매핑 로드 에러
    Mapping(perp_core::CoreError),
    /// 거래소 에러
    DataSource(perp_exchange::ExchangeError),
    /// 저장소 에러
    Store(perp_data::DataError),
    /// 스케줄러가 이미 정지됨
    Stopped,
    /// 일반 에러
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(e) => write!(f, "Database error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Mapping(e) => write!(f, "Symbol mapping error: {}", e),
            Self::DataSource(e) => write!(f, "Data source error: {}", e),
            Self::Store(e) => write!(f, "Store error: {}", e),
            Self::Stopped => write!(f, "Scheduler stopped"),
            Self::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database(e) => Some(e),
            Self::Mapping(e) => Some(e),
            Self::DataSource(e) => Some(e),
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for CollectorError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

impl From<perp_core::CoreError> for CollectorError {
    fn from(err: perp_core::CoreError) -> Self {
        Self::Mapping(err)
    }
}

impl From<perp_exchange::ExchangeError> for CollectorError {
    fn from(err: perp_exchange::ExchangeError) -> Self {
        Self::DataSource(err)
    }
}

impl From<perp_data::DataError> for CollectorError {
    fn from(err: perp_data::DataError) -> Self {
        Self::Store(err)
    }
}

impl From<std::io::Error> for CollectorError {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CollectorError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err)
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
