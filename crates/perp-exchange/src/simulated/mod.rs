//! 테스트 및 드라이런을 위한 시뮬레이션 거래소.
//!
//! 네트워크 없이 결정적인 1분 캔들, 고정 펀딩비/미결제약정을 제공하고
//! 작업별 실패 주입과 호출 횟수 기록을 지원합니다.
//!
//! # 예제
//!
//! ```ignore
//! use perp_exchange::simulated::{SimulatedConfig, SimulatedExchange};
//!
//! let sim = SimulatedExchange::new(
//!     SimulatedConfig::new("binance")
//!         .with_funding_rate(0.0001)
//!         .with_open_interest(1_000.0),
//! );
//! sim.fail_next(Capability::HistoricalCandles, 2);
//! ```

mod exchange;

pub use exchange::{CallCounts, SimulatedConfig, SimulatedExchange};
