//! 스케줄러 제어 endpoint.
//!
//! - `GET /status` - 현재 모드
//! - `POST /toggle-fast` - 모드 변경 (다음 틱부터 적용)
//! - `POST /backfill` - 수동 백필 (응답은 즉시, 백필은 백그라운드)

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiErrorResponse, ApiResult};
use crate::state::AppState;

/// 모드 조회 응답.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub fast_mode: bool,
}

/// 모드 변경 요청.
#[derive(Debug, Deserialize)]
pub struct ToggleFastRequest {
    pub enable: bool,
}

/// 모드 변경 응답.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleFastResponse {
    pub ok: bool,
    pub fast_mode: bool,
}

/// 수동 백필 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct BackfillResponse {
    pub ok: bool,
}

/// GET /status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        fast_mode: state.scheduler.fast_mode(),
    })
}

/// POST /toggle-fast
pub async fn toggle_fast(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ToggleFastRequest>, JsonRejection>,
) -> ApiResult<Json<ToggleFastResponse>> {
    let Json(request) = payload.map_err(|e| {
        ApiErrorResponse::new("INVALID_INPUT", e.body_text()).with_status(StatusCode::BAD_REQUEST)
    })?;

    state.scheduler.set_fast_mode(request.enable);
    Ok(Json(ToggleFastResponse {
        ok: true,
        fast_mode: state.scheduler.fast_mode(),
    }))
}

/// POST /backfill
///
/// 백필 완료를 기다리지 않습니다. 진행 중인 틱과 겹칠 수 있습니다.
pub async fn trigger_backfill(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<BackfillResponse>> {
    if state.scheduler.is_stopped() {
        return Err(ApiErrorResponse::new("SCHEDULER_STOPPED", "스케줄러가 정지되었습니다")
            .with_status(StatusCode::SERVICE_UNAVAILABLE));
    }

    let scheduler = state.scheduler.clone();
    tokio::spawn(async move {
        match scheduler.trigger_backfill_now().await {
            Ok(stats) => tracing::info!(rows = stats.rows, errors = stats.errors, "수동 백필 완료"),
            Err(e) => tracing::warn!(error = %e, "수동 백필 실행 안 됨"),
        }
    });

    Ok(Json(BackfillResponse { ok: true }))
}

/// 제어 라우터.
pub fn control_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(get_status))
        .route("/toggle-fast", post(toggle_fast))
        .route("/backfill", post(trigger_backfill))
}
