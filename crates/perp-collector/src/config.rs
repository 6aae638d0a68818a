//! 환경변수 기반 설정 모듈.

use std::str::FromStr;
use std::time::Duration;

use perp_exchange::SUPPORTED_EXCHANGES;

use crate::error::CollectorError;
use crate::Result;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL (PostgreSQL 저장소를 쓸 때만 필요)
    pub database_url: Option<String>,
    /// 풀 최대 연결 수
    pub db_max_connections: u32,
    /// 심볼 설정
    pub symbols: SymbolsConfig,
    /// 거래소 설정
    pub exchanges: ExchangesConfig,
    /// 백필 설정
    pub backfill: BackfillConfig,
    /// 실시간 수집 설정
    pub live: LiveConfig,
    /// 스케줄러 설정
    pub scheduler: SchedulerConfig,
    /// 제어 API 설정
    pub api: ApiConfig,
}

/// 심볼 매핑 설정
#[derive(Debug, Clone)]
pub struct SymbolsConfig {
    /// 매핑 파일 경로
    pub file: String,
    /// 수집 대상 기준 심볼 (비어 있으면 매핑 파일 전체)
    pub only: Vec<String>,
}

/// 거래소 설정
#[derive(Debug, Clone)]
pub struct ExchangesConfig {
    /// 수집 대상 거래소 (행 기록 순서)
    pub ids: Vec<String>,
    /// OHLCV 기준 거래소 (백필 대상)
    pub primary: String,
    /// HTTP 요청 타임아웃 (초)
    pub http_timeout_secs: u64,
}

/// 백필 설정
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// 갭 판정 기준 (시간)
    pub threshold_hours: i64,
    /// 행이 없을 때 거슬러 올라갈 기간 (일)
    pub lookback_days: i64,
    /// 페이지당 캔들 수
    pub page_limit: usize,
    /// 페이지 간 딜레이 (밀리초)
    pub page_delay_ms: u64,
    /// 실패 후 재시도까지 대기 (밀리초)
    pub retry_delay_ms: u64,
    /// 한 패스에서 심볼 하나가 연속으로 실패해도 되는 횟수. 넘기면 다음 틱으로 미룹니다
    pub max_retries: u32,
}

/// 실시간 수집 설정
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// 심볼 간 딜레이 (밀리초)
    pub symbol_delay_ms: u64,
}

/// 스케줄러 설정
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// 시작 시 fast 모드 여부
    pub fast_mode: bool,
    /// fast 모드 틱 주기 (초)
    pub fast_interval_secs: u64,
    /// 스냅샷 모드 틱 주기 (초)
    pub snapshot_interval_secs: u64,
}

/// 제어 API 설정
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// 뷰어 기본 행 수
    pub viewer_row_limit: usize,
}

impl Default for SymbolsConfig {
    fn default() -> Self {
        Self {
            file: "symbols-dynamic.json".to_string(),
            only: Vec::new(),
        }
    }
}

impl Default for ExchangesConfig {
    fn default() -> Self {
        Self {
            ids: SUPPORTED_EXCHANGES.iter().map(|s| s.to_string()).collect(),
            primary: "binance".to_string(),
            http_timeout_secs: 30,
        }
    }
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            threshold_hours: 4,
            lookback_days: 10,
            page_limit: 1000,
            page_delay_ms: 250,
            retry_delay_ms: 1000,
            max_retries: 5,
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            symbol_delay_ms: 150,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fast_mode: true,
            fast_interval_secs: 60,
            snapshot_interval_secs: 300,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            viewer_row_limit: 250,
        }
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드 (`.env` 파일이 있으면 먼저 읽음)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 키 조회 함수로 설정 로드.
    ///
    /// 값이 있는데 해석할 수 없으면 기본값으로 넘어가지 않고 에러를 냅니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let symbols_default = SymbolsConfig::default();
        let exchanges_default = ExchangesConfig::default();
        let backfill_default = BackfillConfig::default();
        let scheduler_default = SchedulerConfig::default();
        let api_default = ApiConfig::default();

        let config = Self {
            database_url: get("DATABASE_URL"),
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 5)?,
            symbols: SymbolsConfig {
                file: get("SYMBOLS_FILE").unwrap_or(symbols_default.file),
                only: get("PERP_SYMBOLS").map(|v| split_list(&v, true)).unwrap_or_default(),
            },
            exchanges: ExchangesConfig {
                ids: get("EXCHANGES")
                    .map(|v| split_list(&v, false))
                    .unwrap_or(exchanges_default.ids),
                primary: get("PRIMARY_EXCHANGE")
                    .map(|v| v.to_lowercase())
                    .unwrap_or(exchanges_default.primary),
                http_timeout_secs: parse_or(&get, "HTTP_TIMEOUT_SECS", exchanges_default.http_timeout_secs)?,
            },
            backfill: BackfillConfig {
                threshold_hours: parse_or(&get, "BACKFILL_THRESHOLD_HOURS", backfill_default.threshold_hours)?,
                lookback_days: parse_or(&get, "BACKFILL_LOOKBACK_DAYS", backfill_default.lookback_days)?,
                page_limit: parse_or(&get, "BACKFILL_PAGE_LIMIT", backfill_default.page_limit)?,
                page_delay_ms: parse_or(&get, "BACKFILL_PAGE_DELAY_MS", backfill_default.page_delay_ms)?,
                retry_delay_ms: parse_or(&get, "BACKFILL_RETRY_DELAY_MS", backfill_default.retry_delay_ms)?,
                max_retries: parse_or(&get, "BACKFILL_MAX_RETRIES", backfill_default.max_retries)?,
            },
            live: LiveConfig {
                symbol_delay_ms: parse_or(&get, "SYMBOL_DELAY_MS", LiveConfig::default().symbol_delay_ms)?,
            },
            scheduler: SchedulerConfig {
                fast_mode: parse_bool_or(&get, "FAST_MODE", scheduler_default.fast_mode)?,
                fast_interval_secs: parse_or(&get, "FAST_INTERVAL_SECS", scheduler_default.fast_interval_secs)?,
                snapshot_interval_secs: parse_or(
                    &get,
                    "SNAPSHOT_INTERVAL_SECS",
                    scheduler_default.snapshot_interval_secs,
                )?,
            },
            api: ApiConfig {
                host: get("API_HOST").unwrap_or(api_default.host),
                port: parse_or(&get, "PORT", api_default.port)?,
                viewer_row_limit: parse_or(&get, "VIEWER_ROW_LIMIT", api_default.viewer_row_limit)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// 설정 일관성 검사.
    pub fn validate(&self) -> Result<()> {
        if self.exchanges.ids.is_empty() {
            return Err(config_error("EXCHANGES가 비어 있습니다"));
        }
        if let Some(unknown) = self
            .exchanges
            .ids
            .iter()
            .find(|id| !SUPPORTED_EXCHANGES.contains(&id.as_str()))
        {
            return Err(config_error(format!(
                "지원하지 않는 거래소: {} (지원: {})",
                unknown,
                SUPPORTED_EXCHANGES.join(",")
            )));
        }
        if !self.exchanges.ids.contains(&self.exchanges.primary) {
            return Err(config_error(format!(
                "PRIMARY_EXCHANGE({})가 EXCHANGES에 없습니다",
                self.exchanges.primary
            )));
        }
        if self.scheduler.fast_interval_secs == 0 || self.scheduler.snapshot_interval_secs == 0 {
            return Err(config_error("틱 주기는 0보다 커야 합니다"));
        }
        if self.backfill.page_limit == 0 {
            return Err(config_error("BACKFILL_PAGE_LIMIT는 0보다 커야 합니다"));
        }
        if self.backfill.threshold_hours < 0 || self.backfill.lookback_days <= 0 {
            return Err(config_error("백필 기준 시간/기간이 올바르지 않습니다"));
        }
        Ok(())
    }

    /// 데이터베이스 URL (없으면 설정 에러).
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            config_error("DATABASE_URL 환경변수가 설정되지 않았습니다")
        })
    }
}

impl BackfillConfig {
    /// 갭 판정 기준 (밀리초)
    pub fn threshold_ms(&self) -> i64 {
        self.threshold_hours * 3_600_000
    }

    /// 기본 조회 기간 (밀리초)
    pub fn lookback_ms(&self) -> i64 {
        self.lookback_days * 86_400_000
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl LiveConfig {
    pub fn symbol_delay(&self) -> Duration {
        Duration::from_millis(self.symbol_delay_ms)
    }
}

impl SchedulerConfig {
    /// 모드에 따른 틱 주기
    pub fn interval(&self, fast_mode: bool) -> Duration {
        if fast_mode {
            Duration::from_secs(self.fast_interval_secs)
        } else {
            Duration::from_secs(self.snapshot_interval_secs)
        }
    }
}

fn config_error(msg: impl Into<String>) -> CollectorError {
    CollectorError::Config(msg.into())
}

/// 쉼표 목록 분리. 기준 심볼은 대문자, 거래소 식별자는 소문자로 맞춥니다.
fn split_list(value: &str, upper: bool) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| if upper { s.to_uppercase() } else { s.to_lowercase() })
        .collect()
}

/// 값이 없으면 기본값, 있으면 파싱 (실패 시 에러)
fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| config_error(format!("{}={} 해석 실패: {}", key, raw, e))),
    }
}

/// bool 값 파싱 (true/false/1/0/yes/no)
fn parse_bool_or<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(config_error(format!("{}={} 해석 실패: bool 아님", key, v))),
        },
    }
}
