//! 최근 행 조회 endpoint.
//!
//! - `GET /rows?limit=N` - 최신순 JSON
//! - `GET /viewer` - 같은 내용을 HTML 표로

use std::fmt::Write;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Json, Router,
};
use perp_core::MetricRow;
use serde::Deserialize;

use crate::error::{ApiErrorResponse, ApiResult};
use crate::state::AppState;

/// 한 번에 돌려줄 수 있는 최대 행 수.
pub const MAX_ROWS: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct RowsQuery {
    pub limit: Option<usize>,
}

fn clamp_limit(requested: Option<usize>, default: usize) -> usize {
    requested.unwrap_or(default).clamp(1, MAX_ROWS)
}

async fn load_rows(state: &AppState, limit: usize) -> ApiResult<Vec<MetricRow>> {
    state.store.recent_rows(limit).await.map_err(|e| {
        tracing::error!(error = %e, limit = limit, "최근 행 조회 실패");
        ApiErrorResponse::new("DB_ERROR", e.to_string()).with_status(StatusCode::INTERNAL_SERVER_ERROR)
    })
}

/// GET /rows
pub async fn get_rows(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RowsQuery>,
) -> ApiResult<Json<Vec<MetricRow>>> {
    let limit = clamp_limit(query.limit, state.viewer_row_limit);
    Ok(Json(load_rows(&state, limit).await?))
}

/// GET /viewer
pub async fn get_viewer(State(state): State<Arc<AppState>>) -> ApiResult<Html<String>> {
    let limit = clamp_limit(None, state.viewer_row_limit);
    let rows = load_rows(&state, limit).await?;
    Ok(Html(render_html(&rows)))
}

/// 뷰어 라우터.
pub fn viewer_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rows", get(get_rows))
        .route("/viewer", get(get_viewer))
}

fn render_html(rows: &[MetricRow]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Perp Metrics</title></head><body>\n",
    );
    let _ = writeln!(html, "<h3>Last {} DB Rows</h3>", rows.len());
    html.push_str(
        "<table border=\"1\" cellpadding=\"4\">\n<tr><th>Timestamp</th><th>Exchange</th><th>Symbol</th>\
         <th>Price</th><th>FR</th><th>OI</th></tr>\n",
    );

    for row in rows {
        let ts = row
            .datetime()
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            ts,
            escape(&row.exchange),
            escape(&row.symbol),
            cell(row.close),
            cell(row.funding_rate),
            cell(row.open_interest),
        );
    }

    html.push_str("</table>\n</body></html>\n");
    html
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
