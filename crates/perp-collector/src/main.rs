//! Perpetual-futures metric collector CLI.

use clap::{Parser, Subcommand};
use perp_collector::{bootstrap, modules, CollectorConfig};
use perp_core::{init_logging, LogConfig};
use perp_data::MetricsStore;
use perp_exchange::{build_connector, ExchangeClient, RestConfig};

#[derive(Parser)]
#[command(name = "perp-collector")]
#[command(about = "Perpetual-futures OHLCV / funding / open-interest collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error). RUST_LOG가 있으면 그쪽이 우선
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 백필 점검 한 번 + 실시간 수집 한 번 후 종료
    Once,

    /// 백필 점검만 한 번 실행
    Backfill,

    /// 데몬 모드: 스케줄러를 띄우고 Ctrl-C까지 실행
    Daemon,

    /// 최근 행 출력
    View {
        /// 출력할 행 수 (기본: VIEWER_ROW_LIMIT)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// 거래소 상품 목록으로 심볼 매핑 파일 생성
    GenerateSymbols {
        /// 기준 심볼 (쉼표로 구분, 예: "BTC,ETH,SOL")
        #[arg(long, value_delimiter = ',')]
        bases: Vec<String>,

        /// 출력 경로 (기본: SYMBOLS_FILE)
        #[arg(long)]
        out: Option<String>,
    },

    /// 테이블과 인덱스 생성
    InitDb,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 로깅 초기화
    let mut log_config = LogConfig::from_env();
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    init_logging(log_config).map_err(|e| e as Box<dyn std::error::Error>)?;

    tracing::info!("Perp Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env()?;
    tracing::debug!(
        symbols_file = %config.symbols.file,
        exchanges = ?config.exchanges.ids,
        primary = %config.exchanges.primary,
        "설정 로드 완료"
    );

    match cli.command {
        Commands::Once => {
            let registry = bootstrap::load_registry(&config)?;
            let store = bootstrap::connect_store(&config).await?;
            let scheduler = bootstrap::build_scheduler(&config, registry, store.clone())?;

            tracing::info!("=== 단일 실행 시작 ===");
            scheduler.run_once().await;
            store.flush().await?;
            tracing::info!("=== 단일 실행 완료 ===");
        }
        Commands::Backfill => {
            let registry = bootstrap::load_registry(&config)?;
            let store = bootstrap::connect_store(&config).await?;
            let scheduler = bootstrap::build_scheduler(&config, registry, store.clone())?;

            scheduler.run_backfill_pass().await;
            store.flush().await?;
        }
        Commands::Daemon => {
            let registry = bootstrap::load_registry(&config)?;
            let store = bootstrap::connect_store(&config).await?;
            let scheduler = bootstrap::build_scheduler(&config, registry, store.clone())?;

            tracing::info!(
                fast_mode = config.scheduler.fast_mode,
                fast_interval_secs = config.scheduler.fast_interval_secs,
                snapshot_interval_secs = config.scheduler.snapshot_interval_secs,
                "=== 데몬 모드 시작 ==="
            );
            scheduler.start();

            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "종료 신호 대기 실패");
            }
            tracing::info!("종료 신호 수신, 데몬 종료 중...");

            scheduler.stop();
            scheduler.wait().await;
            store.flush().await?;
        }
        Commands::View { limit } => {
            let db = bootstrap::connect_database(&config).await?;
            let store = perp_data::PgMetricsStore::new(db.pool().clone());
            let rows = store
                .recent_rows(limit.unwrap_or(config.api.viewer_row_limit))
                .await?;
            println!("{}", modules::render_table(&rows));
        }
        Commands::GenerateSymbols { bases, out } => {
            let bases: Vec<String> = bases
                .iter()
                .map(|b| b.trim().to_uppercase())
                .filter(|b| !b.is_empty())
                .collect();
            if bases.is_empty() {
                return Err("--bases에 기준 심볼을 하나 이상 지정하세요".into());
            }

            let rest = RestConfig::default().with_timeout_secs(config.exchanges.http_timeout_secs);
            let mut clients = Vec::new();
            for id in &config.exchanges.ids {
                if let Some(connector) = build_connector(id, rest.clone())? {
                    clients.push(ExchangeClient::new(connector));
                }
            }

            let registry = modules::generate_registry(&clients, &bases).await;
            modules::write_registry(&registry, out.as_deref().unwrap_or(&config.symbols.file))?;
        }
        Commands::InitDb => {
            let db = bootstrap::connect_database(&config).await?;
            db.ensure_schema().await?;
        }
    }

    tracing::info!("Perp Collector 종료");
    Ok(())
}
