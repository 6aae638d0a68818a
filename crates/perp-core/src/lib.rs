//! # Perp Core
//!
//! 무기한 선물 메트릭 수집기의 핵심 도메인 타입을 제공합니다.
//!
//! - 분 단위 메트릭 행(`MetricRow`)과 캔들(`Candle`)
//! - 타임프레임 및 거래소별 간격 문자열
//! - 기준 심볼 → 거래소 고유 심볼 매핑(`SymbolRegistry`)
//! - 로깅 인프라

pub mod error;
pub mod logging;
pub mod symbol_registry;
pub mod types;

pub use error::*;
pub use logging::*;
pub use symbol_registry::{ExchangeSymbols, SymbolRegistry};
pub use types::*;
