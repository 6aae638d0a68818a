//! 무기한 선물 거래소 연결.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - ExchangeConnector trait: 거래소별 REST 구현의 공통 인터페이스
//! - ExchangeClient: 기능 서술자를 먼저 확인하는 호출 게이트
//! - Binance / Bybit / OKX / Hyperliquid 공개 API 커넥터
//! - 시뮬레이션 거래소 (테스트용)

pub mod client;
pub mod connector;
pub mod error;
pub mod simulated;
pub mod traits;

pub use client::ExchangeClient;
pub use connector::{build_connector, RestConfig, SUPPORTED_EXCHANGES};
pub use error::*;
pub use simulated::{CallCounts, SimulatedConfig, SimulatedExchange};
pub use traits::*;
