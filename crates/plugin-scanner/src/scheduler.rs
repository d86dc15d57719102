//! 스케줄러 -- 공유 토큰 풀로 페이지 요청과 다운로드/스캔 작업을 배분
//!
//! # 상태 전이
//!
//! ```text
//! Filling ──(모든 페이지 완료)──> Draining ──(scanned + skipped == 누적 추가 수)──> Done
//!    │                               │
//!    └──────────(취소)───────────────┴──> Cancelled
//! ```
//!
//! 한 루프 반복은 다음 중 하나를 수행합니다.
//! 1. 아직 요청하지 않은 페이지가 있으면 토큰을 얻어 페이지 작업을 시작
//! 2. 대기 집합이 비어 있지 않으면 토큰을 얻고 레코드 하나를 꺼내 다운로드 작업을 시작
//! 3. 그 외에는 `idle_poll` 만큼 쉬면서 취소를 확인
//!
//! 토큰 획득은 항상 취소와 함께 `select!`되므로 토큰 풀이 막혀 있어도
//! 취소 시 즉시 빠져나옵니다. 토큰은 작업이 끝날 때(성공/실패 무관) 반납됩니다.

use std::sync::Arc;

use metrics::{counter, gauge};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use echidna_core::ErrorSink;
use echidna_core::metrics as m;
use echidna_core::pipeline::RunPhase;

use crate::aggregator::ResultAggregator;
use crate::archive::ArchiveScanner;
use crate::config::PluginScannerConfig;
use crate::download;
use crate::fetcher::HttpFetcher;
use crate::inspect::{InspectionStore, WorkDir};
use crate::registry::{PluginSet, RegistryPaginator};

/// 한 번의 실행 동안 모든 구성 요소가 공유하는 컨텍스트
///
/// 전역 상태 대신 이 값을 `Arc`로 각 작업에 전달합니다.
pub struct PipelineContext {
    pub config: PluginScannerConfig,
    pub fetcher: Arc<HttpFetcher>,
    pub paginator: RegistryPaginator,
    pub set: Arc<PluginSet>,
    pub aggregator: Arc<ResultAggregator>,
    pub scanner: Arc<ArchiveScanner>,
    pub store: InspectionStore,
    pub work_dir: WorkDir,
    pub tokens: Arc<Semaphore>,
    pub tracker: TaskTracker,
    pub cancel: CancellationToken,
    pub errors: ErrorSink,
}

impl PipelineContext {
    /// 현재 사용 중인 토큰 수
    pub fn in_flight(&self) -> usize {
        self.config
            .max_in_flight
            .saturating_sub(self.tokens.available_permits())
    }
}

/// 작업 배분 루프
pub struct Scheduler {
    ctx: Arc<PipelineContext>,
    next_page: u32,
    pages: u32,
    phase: RunPhase,
}

impl Scheduler {
    /// 스케줄러를 생성합니다. `pages`는 레지스트리 전체 페이지 수입니다.
    ///
    /// 1페이지는 정보 조회에서 이미 반영되었다고 가정합니다.
    pub fn new(ctx: Arc<PipelineContext>, pages: u32) -> Self {
        let remaining = RegistryPaginator::remaining_pages(pages);
        Self {
            ctx,
            next_page: *remaining.start(),
            pages: *remaining.end(),
            phase: RunPhase::Filling,
        }
    }

    /// 현재 단계
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// `Done` 또는 `Cancelled`가 될 때까지 실행합니다.
    ///
    /// 단계가 바뀔 때마다 `on_phase`가 호출됩니다.
    pub async fn run<F>(mut self, mut on_phase: F) -> RunPhase
    where
        F: FnMut(RunPhase) + Send,
    {
        on_phase(self.phase);

        loop {
            if self.ctx.cancel.is_cancelled() {
                self.transition(RunPhase::Cancelled, &mut on_phase);
                break;
            }

            let (remaining, total, pagination) = self.ctx.set.snapshot().await;
            gauge!(m::SCAN_QUEUE_REMAINING).set(remaining as f64);
            gauge!(m::SCAN_IN_FLIGHT).set(self.ctx.in_flight() as f64);

            if pagination.is_finished() && self.phase == RunPhase::Filling {
                self.transition(RunPhase::Draining, &mut on_phase);
            }

            if pagination.is_finished() && remaining == 0 {
                let processed = self.ctx.aggregator.snapshot().await.processed();
                if processed >= total {
                    self.transition(RunPhase::Done, &mut on_phase);
                    break;
                }
            }

            if self.next_page <= self.pages {
                let Some(permit) = self.acquire().await else {
                    continue;
                };
                self.dispatch_page(self.next_page, permit);
                self.next_page += 1;
                continue;
            }

            if remaining > 0 {
                let Some(permit) = self.acquire().await else {
                    continue;
                };
                match self.ctx.set.pick().await {
                    Some(record) => {
                        let ctx = Arc::clone(&self.ctx);
                        self.ctx.tracker.spawn(async move {
                            download::process(&ctx, record).await;
                            drop(permit);
                        });
                    }
                    None => drop(permit),
                }
                continue;
            }

            self.idle().await;
        }

        self.phase
    }

    fn transition<F>(&mut self, next: RunPhase, on_phase: &mut F)
    where
        F: FnMut(RunPhase),
    {
        if self.phase != next {
            info!(from = %self.phase, to = %next, "scheduler phase changed");
            self.phase = next;
            on_phase(next);
        }
    }

    /// 취소 가능한 토큰 획득. 취소되었거나 풀이 닫혔으면 `None`.
    async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => None,
            permit = Arc::clone(&self.ctx.tokens).acquire_owned() => match permit {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(error = %e, "token pool closed");
                    self.ctx.cancel.cancel();
                    None
                }
            },
        }
    }

    async fn idle(&self) {
        tokio::select! {
            _ = self.ctx.cancel.cancelled() => {}
            _ = tokio::time::sleep(self.ctx.config.idle_poll()) => {}
        }
    }

    fn dispatch_page(&self, page: u32, permit: OwnedSemaphorePermit) {
        let ctx = Arc::clone(&self.ctx);
        self.ctx.tracker.spawn(async move {
            fetch_page(&ctx, page).await;
            drop(permit);
        });
    }
}

/// 페이지 하나를 요청하여 대기 집합에 병합합니다.
///
/// 실패한 페이지는 보고만 하고 버립니다 (완료 판정을 막지 않음).
async fn fetch_page(ctx: &PipelineContext, page: u32) {
    let result = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return,
        result = ctx.paginator.fetch_page(page) => result,
    };

    match result {
        Ok(decoded) => {
            let added = ctx.set.merge(decoded.plugins).await;
            counter!(m::REGISTRY_PAGES_FETCHED_TOTAL, m::LABEL_RESULT => "success").increment(1);
            counter!(m::REGISTRY_PLUGINS_ENQUEUED_TOTAL).increment(added as u64);
            debug!(page, added, "registry page merged");
            ctx.set.page_completed(page, true).await;
        }
        Err(e) => {
            counter!(m::REGISTRY_PAGES_FETCHED_TOTAL, m::LABEL_RESULT => "failure").increment(1);
            warn!(page, error = %e, "registry page dropped");
            ctx.errors.report(ctx.paginator.page_url(page), &e);
            ctx.set.page_completed(page, false).await;
        }
    }
}
