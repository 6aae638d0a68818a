//! 주기 실행 스케줄러.
//!
//! 틱마다 백필 점검 → 실시간 수집을 순서대로 실행합니다. 틱끼리는 겹치지 않고,
//! 모드 변경은 진행 중인 틱이 아니라 다음 틱부터 적용됩니다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::backfill::BackfillReconciler;
use super::live::LiveCollector;
use crate::config::SchedulerConfig;
use crate::context::CollectionContext;
use crate::error::CollectorError;
use crate::{CollectionStats, Result};

/// fast/스냅샷 모드 공유 상태. 스케줄러와 제어 API가 함께 읽고 씁니다.
#[derive(Debug, Clone)]
pub struct ModeHandle {
    fast: Arc<AtomicBool>,
}

impl ModeHandle {
    pub fn new(fast_mode: bool) -> Self {
        Self {
            fast: Arc::new(AtomicBool::new(fast_mode)),
        }
    }

    pub fn fast_mode(&self) -> bool {
        self.fast.load(Ordering::SeqCst)
    }

    /// 새 값을 쓰고 이전 값을 돌려줍니다.
    pub fn set_fast_mode(&self, enable: bool) -> bool {
        self.fast.swap(enable, Ordering::SeqCst)
    }
}

/// 틱 하나의 결과.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub fast_mode: bool,
    pub backfill: CollectionStats,
    pub live: CollectionStats,
}

/// 수집 스케줄러.
pub struct CollectionScheduler {
    reconciler: BackfillReconciler,
    live: LiveCollector,
    mode: ModeHandle,
    config: SchedulerConfig,
    running: AtomicBool,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CollectionScheduler {
    pub fn new(ctx: Arc<CollectionContext>, config: SchedulerConfig) -> Self {
        Self {
            reconciler: BackfillReconciler::new(ctx.clone()),
            live: LiveCollector::new(ctx),
            mode: ModeHandle::new(config.fast_mode),
            config,
            running: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// 주기 실행 시작. 이미 실행 중이거나 정지된 뒤면 아무 일도 하지 않고 `false`.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.cancel.is_cancelled() {
            tracing::warn!("정지된 스케줄러는 다시 시작할 수 없습니다");
            return false;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("스케줄러가 이미 실행 중");
            return false;
        }

        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move { scheduler.run_loop().await });
        *self.lock_task() = Some(handle);
        true
    }

    /// 실행 중인지 (시작됐고 아직 정지되지 않음).
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }

    /// `stop()`이 호출됐는지. 정지된 스케줄러는 수동 백필도 받지 않습니다.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 현재 모드.
    pub fn fast_mode(&self) -> bool {
        self.mode.fast_mode()
    }

    /// 모드 변경. 다음 틱부터 적용됩니다.
    pub fn set_fast_mode(&self, enable: bool) {
        let previous = self.mode.set_fast_mode(enable);
        if previous != enable {
            tracing::info!(fast_mode = enable, "모드 변경, 다음 틱부터 적용");
        }
    }

    /// 모드 공유 핸들.
    pub fn mode_handle(&self) -> ModeHandle {
        self.mode.clone()
    }

    /// 정지 토큰 (외부 종료 처리와 연결할 때).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 일정과 무관하게 백필 패스 한 번 실행. 진행 중인 틱과 겹쳐도 됩니다.
    pub async fn trigger_backfill_now(&self) -> Result<CollectionStats> {
        if self.cancel.is_cancelled() {
            return Err(CollectorError::Stopped);
        }
        tracing::info!("수동 백필 요청");
        let stats = self.reconciler.run_pass(&self.cancel).await;
        stats.log_summary("수동 백필");
        Ok(stats)
    }

    /// 백필 패스만 한 번 실행.
    pub async fn run_backfill_pass(&self) -> CollectionStats {
        let stats = self.reconciler.run_pass(&self.cancel).await;
        stats.log_summary("백필");
        stats
    }

    /// 틱 하나(백필 → 실시간 수집)를 현재 모드로 실행.
    pub async fn run_once(&self) -> TickReport {
        let fast_mode = self.mode.fast_mode();
        self.run_tick(fast_mode).await
    }

    /// 정지 신호 전송 (여러 번 불러도 됨). 진행 중인 대기는 즉시 깨어납니다.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("스케줄러 정지 요청");
            self.cancel.cancel();
        }
    }

    /// 주기 실행 태스크가 끝날 때까지 대기.
    pub async fn wait(&self) {
        let handle = self.lock_task().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "스케줄러 태스크 비정상 종료");
            }
        }
    }

    async fn run_tick(&self, fast_mode: bool) -> TickReport {
        let backfill = self.reconciler.run_pass(&self.cancel).await;
        backfill.log_summary("백필");

        let live = if self.cancel.is_cancelled() {
            CollectionStats {
                cancelled: true,
                ..CollectionStats::default()
            }
        } else {
            let stats = self.live.run_pass(fast_mode, &self.cancel).await;
            stats.log_summary("실시간 수집");
            stats
        };

        TickReport {
            fast_mode,
            backfill,
            live,
        }
    }

    async fn run_loop(self: Arc<Self>) {
        tracing::info!(fast_mode = self.mode.fast_mode(), "스케줄러 시작");

        loop {
            let tick_start = Instant::now();
            let fast_mode = self.mode.fast_mode();

            self.run_tick(fast_mode).await;
            if self.cancel.is_cancelled() {
                break;
            }

            // 다음 틱 주기는 틱이 끝난 시점의 모드로 정합니다
            let interval = self.config.interval(self.mode.fast_mode());
            tracing::debug!(interval_secs = interval.as_secs(), "다음 틱 대기");

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep_until(tick_start + interval) => {}
            }
        }

        tracing::info!("스케줄러 종료");
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }
}
