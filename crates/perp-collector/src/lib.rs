//! Perpetual-futures metric collector.
//!
//! 이 crate는 수집 엔진과 이를 실행하는 바이너리를 제공합니다:
//! - 갭 감지 및 기준 거래소 1분봉 백필
//! - 틱마다 거래소별 펀딩비/미결제약정 수집 (fast 모드면 기준 캔들 포함)
//! - 주기 실행 스케줄러 (모드 전환, 수동 백필, 협조적 정지)
//! - 심볼 매핑 생성, 최근 행 출력

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use context::CollectionContext;
pub use error::{CollectorError, Result};
pub use modules::{BackfillReconciler, CollectionScheduler, LiveCollector, ModeHandle};
pub use stats::CollectionStats;
