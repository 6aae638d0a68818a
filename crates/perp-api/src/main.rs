//! 수집기 + 제어 API 서버.
//!
//! 스케줄러를 같은 프로세스에서 돌리고 HTTP로 제어합니다.

use std::sync::Arc;

use perp_api::{create_router, AppState};
use perp_collector::{bootstrap, CollectorConfig};
use perp_core::{init_logging, LogConfig};
use perp_data::MetricsStore;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LogConfig::from_env()).map_err(|e| e as Box<dyn std::error::Error>)?;
    info!("Starting Perp API server...");

    // 설정 로드
    let config = CollectorConfig::from_env()?;
    let addr = format!("{}:{}", config.api.host, config.api.port);

    let registry = bootstrap::load_registry(&config)?;
    let store = bootstrap::connect_store(&config).await?;
    let scheduler = bootstrap::build_scheduler(&config, registry, store.clone())?;

    scheduler.start();

    let state = Arc::new(AppState::new(
        scheduler.clone(),
        store.clone(),
        config.api.viewer_row_limit,
    ));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        error!(
            addr = %addr,
            error = %e,
            "소켓 바인딩 실패. API_HOST, PORT 환경변수를 확인하세요."
        );
        e
    })?;
    info!(%addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 종료 시그널 받은 후 정리 작업
    info!("Server shutdown initiated, stopping scheduler...");
    scheduler.stop();
    scheduler.wait().await;
    store.flush().await?;

    info!("Server stopped gracefully");
    Ok(())
}

/// Graceful shutdown 시그널 대기 (Ctrl+C 또는 SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Ctrl+C 핸들러 설치 실패");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "SIGTERM 핸들러 설치 실패");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
