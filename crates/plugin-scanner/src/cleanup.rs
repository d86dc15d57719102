//! 정리/취소 컨트롤러
//!
//! 상태 전이: `Armed → Triggered → Cleaning → Exited`
//!
//! 트리거되면 취소 토큰을 설정하고, [`TaskTracker`]로 모든 다운로드/스캔 작업이
//! 끝나기를 기다린 뒤(`cleanup_grace` 상한) `current/`를 삭제합니다.
//! 작업이 모두 끝난 뒤에야 삭제하므로 열린 아카이브 핸들이 남지 않습니다.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::error::PluginScannerError;
use crate::inspect::WorkDir;

/// 컨트롤러 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupState {
    /// 시그널 대기 중
    Armed,
    /// 취소 토큰 설정됨
    Triggered,
    /// 작업 드레인 및 디렉토리 삭제 중
    Cleaning,
    /// 정리 완료
    Exited,
}

impl fmt::Display for CleanupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Armed => write!(f, "armed"),
            Self::Triggered => write!(f, "triggered"),
            Self::Cleaning => write!(f, "cleaning"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// 정리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    /// 대기 상한 안에 모든 작업이 끝났는지 여부
    pub drained: bool,
}

/// 정리/취소 컨트롤러
pub struct CleanupController {
    state: Mutex<CleanupState>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    work_dir: WorkDir,
    grace: Duration,
}

impl CleanupController {
    /// 새 컨트롤러를 생성합니다.
    pub fn new(
        cancel: CancellationToken,
        tracker: TaskTracker,
        work_dir: WorkDir,
        grace: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(CleanupState::Armed),
            cancel,
            tracker,
            work_dir,
            grace,
        }
    }

    /// 현재 상태
    pub async fn state(&self) -> CleanupState {
        *self.state.lock().await
    }

    /// SIGINT/SIGTERM 리스너를 설치합니다.
    ///
    /// 시그널을 받으면 [`trigger`](Self::trigger)를 실행하고 그 결과를 반환합니다.
    /// 시그널 없이 취소 토큰이 먼저 설정되면 `Ok(None)`을 반환합니다.
    pub fn arm(self: &Arc<Self>) -> JoinHandle<Result<Option<CleanupReport>, PluginScannerError>> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                signal = wait_for_shutdown_signal() => {
                    let signal = signal?;
                    info!(signal, "interrupt received, cleaning up before exit");
                    controller.trigger().await.map(Some)
                }
                _ = controller.cancel.cancelled() => Ok(None),
            }
        })
    }

    /// 취소 후 작업 드레인을 기다리고 `current/`를 삭제합니다.
    ///
    /// 여러 번 호출해도 정리는 한 번만 수행됩니다.
    pub async fn trigger(&self) -> Result<CleanupReport, PluginScannerError> {
        let mut state = self.state.lock().await;
        if *state == CleanupState::Exited {
            return Ok(CleanupReport { drained: true });
        }

        *state = CleanupState::Triggered;
        self.cancel.cancel();

        *state = CleanupState::Cleaning;
        self.tracker.close();
        let drained = tokio::time::timeout(self.grace, self.tracker.wait())
            .await
            .is_ok();
        if !drained {
            warn!(
                in_flight = self.tracker.len(),
                grace_secs = self.grace.as_secs(),
                "tasks still running after grace period, removing staging directory anyway"
            );
        }

        self.work_dir.remove_current().await?;
        *state = CleanupState::Exited;
        info!(drained, "cleanup finished");
        Ok(CleanupReport { drained })
    }
}

impl fmt::Debug for CleanupController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupController")
            .field("work_dir", &self.work_dir)
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

/// SIGTERM 또는 SIGINT를 기다립니다.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str, PluginScannerError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| PluginScannerError::Io {
        path: "SIGTERM".to_owned(),
        source: e,
    })?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| PluginScannerError::Io {
        path: "SIGINT".to_owned(),
        source: e,
    })?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str, PluginScannerError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| PluginScannerError::Io {
            path: "ctrl-c".to_owned(),
            source: e,
        })?;
    Ok("ctrl-c")
}
