//! 수집기 전반에서 사용되는 공통 타입.

mod metric;
mod number;
mod timeframe;

pub use metric::*;
pub use number::*;
pub use timeframe::*;
