//! 데이터 수집 모듈.

pub mod backfill;
pub mod live;
pub mod scheduler;
pub mod symbol_gen;
pub mod viewer;

pub use backfill::{detect_gap, BackfillOutcome, BackfillReconciler, GapCheck};
pub use live::{LiveCollector, LiveOutcome};
pub use scheduler::{CollectionScheduler, ModeHandle, TickReport};
pub use symbol_gen::{generate_registry, pick_market, write_registry};
pub use viewer::render_table;
