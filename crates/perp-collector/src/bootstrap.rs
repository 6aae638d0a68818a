//! 바이너리 공통 시작 절차.
//!
//! 매핑 로드나 저장소 연결에 실패하면 에러를 돌려주고, 호출한 바이너리는 0이 아닌
//! 상태로 종료합니다.

use std::sync::Arc;

use perp_core::SymbolRegistry;
use perp_data::{Database, DatabaseConfig, MetricsStore, PgMetricsStore};

use crate::context::CollectionContext;
use crate::modules::CollectionScheduler;
use crate::{CollectorConfig, Result};

/// 매핑 파일 로드 후 `PERP_SYMBOLS`로 범위를 좁힙니다. 결과가 비어 있으면 에러.
pub fn load_registry(config: &CollectorConfig) -> Result<SymbolRegistry> {
    let registry = SymbolRegistry::load(&config.symbols.file)?;
    if config.symbols.only.is_empty() {
        return Ok(registry);
    }

    let registry = registry.retain_bases(&config.symbols.only);
    if registry.is_empty() {
        return Err(crate::CollectorError::Config(format!(
            "PERP_SYMBOLS({})에 해당하는 매핑이 없습니다",
            config.symbols.only.join(",")
        )));
    }
    Ok(registry)
}

/// 데이터베이스 연결.
pub async fn connect_database(config: &CollectorConfig) -> Result<Database> {
    let db_config = DatabaseConfig::new(config.require_database_url()?)
        .with_max_connections(config.db_max_connections);
    Ok(Database::connect(&db_config).await?)
}

/// 연결 → 스키마 확인 → 큐 기반 저장소 생성.
pub async fn connect_store(config: &CollectorConfig) -> Result<Arc<PgMetricsStore>> {
    let db = connect_database(config).await?;
    db.ensure_schema().await?;
    Ok(Arc::new(PgMetricsStore::new(db.pool().clone())))
}

/// 수집 실행 환경과 스케줄러 구성.
pub fn build_scheduler(
    config: &CollectorConfig,
    registry: SymbolRegistry,
    store: Arc<dyn MetricsStore>,
) -> Result<Arc<CollectionScheduler>> {
    let ctx = CollectionContext::from_config(config, Arc::new(registry), store)?;
    tracing::info!(
        symbols = ctx.registry.len(),
        exchanges = ?config.exchanges.ids,
        primary = %config.exchanges.primary,
        "수집 환경 구성 완료"
    );
    Ok(Arc::new(CollectionScheduler::new(
        Arc::new(ctx),
        config.scheduler.clone(),
    )))
}
