//! 플러그인 스캐너 오케스트레이터 -- 전체 실행 흐름 관리
//!
//! [`PluginScanner`]는 core의 [`ScanTarget`] trait을 구현하여
//! `echidna` CLI에서 실행/상태 조회/취소 대상이 됩니다.
//!
//! # 내부 아키텍처
//!
//! ```text
//! RegistryPaginator --(1페이지)--> PluginSet <--(2..=pages)-- 페이지 작업
//!                                     |
//!                              Scheduler (토큰 풀)
//!                                     |
//!                        다운로드 --> ArchiveScanner --> VulnModule들
//!                                     |
//!                      깨끗: 삭제 / 취약: InspectionStore
//!                                     |
//!                              ResultAggregator
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use tokio::sync::{Mutex, Semaphore, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use echidna_core::error::{EchidnaError, FetchError, PipelineError, StorageError};
use echidna_core::pipeline::{ErrorSink, RunPhase, RunSummary, ScanTarget, StatusSnapshot};

use crate::aggregator::ResultAggregator;
use crate::archive::ArchiveScanner;
use crate::cleanup::CleanupController;
use crate::config::PluginScannerConfig;
use crate::error::PluginScannerError;
use crate::fetcher::HttpFetcher;
use crate::inspect::{InspectionStore, WorkDir};
use crate::registry::{PickPolicy, PluginSet, RandomPick, RegistryInfo, RegistryPaginator};
use crate::scheduler::{PipelineContext, Scheduler};
use crate::vuln::{ModuleRegistry, ScanResult};

/// 플러그인 레지스트리 스캐너
///
/// 한 인스턴스는 한 번만 실행할 수 있습니다.
/// 다시 실행하려면 [`PluginScannerBuilder`]로 새 인스턴스를 만들어야 합니다.
pub struct PluginScanner {
    config: PluginScannerConfig,
    fetcher: Arc<HttpFetcher>,
    paginator: RegistryPaginator,
    set: Arc<PluginSet>,
    aggregator: Arc<ResultAggregator>,
    scanner: Arc<ArchiveScanner>,
    store: InspectionStore,
    work_dir: WorkDir,
    tokens: Arc<Semaphore>,
    tracker: TaskTracker,
    info: Mutex<Option<RegistryInfo>>,
    total_units: AtomicUsize,
    started: AtomicBool,
    phase: watch::Sender<RunPhase>,
}

impl PluginScanner {
    /// 스캐너 설정
    pub fn config(&self) -> &PluginScannerConfig {
        &self.config
    }

    /// 활성화된 모듈 이름
    pub fn module_names(&self) -> Vec<&str> {
        self.scanner.modules().names()
    }

    /// 작업 디렉토리
    pub fn work_dir(&self) -> &WorkDir {
        &self.work_dir
    }

    /// 다운로드/스캔 작업 추적기 (정리 컨트롤러와 공유)
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// 현재 실행 단계
    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    /// 실행 단계 변경 구독
    pub fn subscribe_phase(&self) -> watch::Receiver<RunPhase> {
        self.phase.subscribe()
    }

    /// 지금까지 보관된 취약 결과
    pub async fn findings(&self) -> Vec<ScanResult> {
        self.aggregator.findings().await
    }

    /// `current/`를 비우고 다시 만듭니다 (이전 실행의 잔여물 제거).
    pub async fn prepare_work_dir(&self) -> Result<(), PluginScannerError> {
        self.work_dir.prepare().await
    }

    /// 이 스캐너의 작업을 드레인하고 `current/`를 삭제하는 정리 컨트롤러를 생성합니다.
    pub fn cleanup_controller(&self, cancel: CancellationToken) -> CleanupController {
        CleanupController::new(
            cancel,
            self.tracker.clone(),
            self.work_dir.clone(),
            self.config.cleanup_grace(),
        )
    }

    /// 레지스트리 1페이지를 조회하여 페이지네이션 정보를 얻고 1페이지 항목을 대기 집합에 넣습니다.
    ///
    /// 결과는 캐시되며 이후 호출은 요청을 보내지 않습니다.
    pub async fn fetch_registry_info(&self) -> Result<RegistryInfo, PluginScannerError> {
        let mut cached = self.info.lock().await;
        if let Some(info) = *cached {
            return Ok(info);
        }

        let page = self.paginator.fetch_info().await?;
        let info = page.info;

        self.set.set_info(info).await;
        let added = self.set.merge(page.plugins).await;
        if info.pages >= 1 {
            self.set.page_completed(1, true).await;
        }
        self.total_units
            .store(usize::try_from(info.results).unwrap_or(usize::MAX), Ordering::Release);

        info!(
            pages = info.pages,
            results = info.results,
            first_page = added,
            "registry info received"
        );
        *cached = Some(info);
        Ok(info)
    }

    /// 현재 상태 스냅샷
    pub async fn status(&self) -> StatusSnapshot {
        let (remaining, _, pagination) = self.set.snapshot().await;
        let counters = self.aggregator.snapshot().await;
        StatusSnapshot {
            page: pagination.page,
            pages: pagination.pages,
            results: pagination.results,
            remaining,
            in_flight: self
                .config
                .max_in_flight
                .saturating_sub(self.tokens.available_permits()),
            scanned: counters.scanned,
            skipped: counters.skipped,
            vulns_found: counters.vulns_found,
            pages_failed: u64::from(pagination.failed),
            latest_finding: counters.latest_finding,
        }
    }

    async fn ensure_dirs(&self) -> Result<(), StorageError> {
        for dir in [self.work_dir.current(), self.work_dir.inspect()] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::Directory(format!("{}: {e}", dir.display())))?;
        }
        Ok(())
    }

    async fn execute(
        &self,
        cancel: CancellationToken,
        errors: ErrorSink,
    ) -> Result<RunSummary, EchidnaError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(PipelineError::AlreadyRunning.into());
        }
        let started = Instant::now();

        let info = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.fetch_registry_info() => Some(
                result.map_err(|e| FetchError::RegistryUnavailable(e.to_string()))?,
            ),
        };
        let Some(info) = info else {
            self.phase.send_replace(RunPhase::Cancelled);
            return Ok(self.summary(RunPhase::Cancelled, started).await);
        };

        self.ensure_dirs().await?;

        let ctx = Arc::new(PipelineContext {
            config: self.config.clone(),
            fetcher: Arc::clone(&self.fetcher),
            paginator: self.paginator.clone(),
            set: Arc::clone(&self.set),
            aggregator: Arc::clone(&self.aggregator),
            scanner: Arc::clone(&self.scanner),
            store: self.store.clone(),
            work_dir: self.work_dir.clone(),
            tokens: Arc::clone(&self.tokens),
            tracker: self.tracker.clone(),
            cancel,
            errors,
        });

        info!(
            max_in_flight = self.config.max_in_flight,
            modules = ?self.module_names(),
            "scan started"
        );
        let phase = Scheduler::new(Arc::clone(&ctx), info.pages)
            .run(|p| {
                self.phase.send_replace(p);
            })
            .await;

        if phase == RunPhase::Done {
            // 마지막 작업이 토큰을 반납할 때까지 대기
            self.tracker.close();
            self.tracker.wait().await;
        } else {
            warn!(in_flight = ctx.in_flight(), "scan cancelled");
        }

        let summary = self.summary(phase, started).await;
        info!(
            phase = %summary.phase,
            scanned = summary.status.scanned,
            skipped = summary.status.skipped,
            vulns_found = summary.status.vulns_found,
            elapsed_ms = summary.elapsed_ms,
            "scan finished"
        );
        Ok(summary)
    }

    async fn summary(&self, phase: RunPhase, started: Instant) -> RunSummary {
        RunSummary {
            phase,
            status: self.status().await,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl ScanTarget for PluginScanner {
    fn total_units(&self) -> usize {
        self.total_units.load(Ordering::Acquire)
    }

    async fn run(
        &self,
        cancel: CancellationToken,
        errors: ErrorSink,
    ) -> Result<RunSummary, EchidnaError> {
        self.execute(cancel, errors).await
    }
}

impl std::fmt::Debug for PluginScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginScanner")
            .field("config", &self.config)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

/// 플러그인 스캐너 빌더
pub struct PluginScannerBuilder {
    config: PluginScannerConfig,
    policy: Option<Box<dyn PickPolicy>>,
    modules: Option<ModuleRegistry>,
}

impl PluginScannerBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PluginScannerConfig::default(),
            policy: None,
            modules: None,
        }
    }

    /// 스캐너 설정을 지정합니다.
    pub fn config(mut self, config: PluginScannerConfig) -> Self {
        self.config = config;
        self
    }

    /// 대기 집합의 선택 정책을 지정합니다 (기본: 무작위).
    pub fn pick_policy(mut self, policy: impl PickPolicy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    /// 모듈 레지스트리를 직접 지정합니다.
    ///
    /// 지정하지 않으면 기본 모듈 중 설정의 `modules`에 해당하는 것만 사용합니다.
    pub fn modules(mut self, modules: ModuleRegistry) -> Self {
        self.modules = Some(modules);
        self
    }

    /// 스캐너를 빌드합니다.
    pub fn build(self) -> Result<PluginScanner, PluginScannerError> {
        self.config.validate()?;

        let modules = match self.modules {
            Some(modules) => modules,
            None => ModuleRegistry::with_defaults()?.select(&self.config.modules)?,
        };
        if modules.is_empty() {
            return Err(PluginScannerError::Config {
                field: "modules".to_owned(),
                reason: "no vulnerability module enabled".to_owned(),
            });
        }

        let fetcher = Arc::new(HttpFetcher::new(&self.config)?);
        let paginator = RegistryPaginator::new(
            Arc::clone(&fetcher),
            self.config.base_url.clone(),
            self.config.per_page,
        );
        let scanner = ArchiveScanner::new(
            modules,
            self.config.source_extension.clone(),
            self.config.max_member_size,
        );
        let work_dir = WorkDir::new(self.config.current_dir(), self.config.inspect_dir());
        let store = InspectionStore::new(self.config.inspect_dir());
        let policy = self.policy.unwrap_or_else(|| Box::new(RandomPick));
        let (phase, _) = watch::channel(RunPhase::Starting);

        Ok(PluginScanner {
            tokens: Arc::new(Semaphore::new(self.config.max_in_flight)),
            config: self.config,
            fetcher,
            paginator,
            set: Arc::new(PluginSet::new(policy)),
            aggregator: Arc::new(ResultAggregator::new()),
            scanner: Arc::new(scanner),
            store,
            work_dir,
            tracker: TaskTracker::new(),
            info: Mutex::new(None),
            total_units: AtomicUsize::new(0),
            started: AtomicBool::new(false),
            phase,
        })
    }
}

impl Default for PluginScannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
