//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 스케줄러 상태 포함 헬스 체크
//! - `/status`, `/toggle-fast`, `/backfill` - 스케줄러 제어
//! - `/rows`, `/viewer` - 최근 행 조회

pub mod control;
pub mod health;
pub mod viewer;

pub use control::{control_router, BackfillResponse, StatusResponse, ToggleFastRequest, ToggleFastResponse};
pub use health::{health_router, HealthResponse};
pub use viewer::{viewer_router, RowsQuery, MAX_ROWS};

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .merge(control_router())
        .merge(viewer_router())
}
