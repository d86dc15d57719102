//! 파이프라인 trait -- 스캔 대상 확장 포인트 정의
//!
//! [`ScanTarget`]은 하나의 스캔 실행 단위(예: 플러그인 레지스트리 전체)를 나타냅니다.
//! 실행 중 발생한 개별 항목 에러는 [`ErrorSink`]로 보고되며, 실행을 중단시키지 않습니다.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::EchidnaError;

/// 스캔 대상 trait
///
/// 새로운 스캔 소스(다른 레지스트리 등)를 추가하려면 이 trait을 구현합니다.
pub trait ScanTarget: Send + Sync {
    /// 알려진 전체 작업 단위 수 (레지스트리 정보를 받기 전에는 0)
    fn total_units(&self) -> usize;

    /// 취소되거나 모든 작업이 끝날 때까지 실행합니다.
    ///
    /// 치명적이지 않은 에러는 `errors`로 보고되고 실행은 계속됩니다.
    /// 취소된 경우 `Err(PipelineError::Cancelled)`가 아니라 `phase`가
    /// `Cancelled`인 [`RunSummary`]를 반환합니다.
    fn run(
        &self,
        cancel: CancellationToken,
        errors: ErrorSink,
    ) -> impl Future<Output = Result<RunSummary, EchidnaError>> + Send;
}

/// 항목별 에러 보고
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// 에러가 발생한 대상 (URL, 파일명 등)
    pub context: String,
    /// 에러 메시지
    pub message: String,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.message)
    }
}

/// 비차단 에러 싱크
///
/// 워커는 에러 로그 기록을 기다리지 않습니다. 수신 측이 닫혀 있으면
/// 보고는 조용히 버려지고 `tracing`으로만 남습니다.
#[derive(Debug, Clone)]
pub struct ErrorSink {
    tx: mpsc::UnboundedSender<ErrorReport>,
}

impl ErrorSink {
    /// 새 싱크와 수신 채널을 생성합니다.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ErrorReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// 수신자가 없는 싱크 (테스트 및 에러 로그 비활성화용)
    pub fn discard() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    /// 에러를 보고합니다.
    pub fn report(&self, context: impl Into<String>, message: impl fmt::Display) {
        let report = ErrorReport {
            context: context.into(),
            message: message.to_string(),
        };
        tracing::debug!(context = %report.context, error = %report.message, "item error");
        let _ = self.tx.send(report);
    }
}

/// 실행 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// 레지스트리 정보 조회 전
    Starting,
    /// 페이지 수집과 스캔을 병행
    Filling,
    /// 모든 페이지 요청 완료, 남은 항목 처리 중
    Draining,
    /// 모든 작업 완료
    Done,
    /// 취소됨
    Cancelled,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Filling => write!(f, "filling"),
            Self::Draining => write!(f, "draining"),
            Self::Done => write!(f, "done"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// 진행 상태 스냅샷
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// 마지막으로 수집 완료된 페이지 번호
    pub page: u32,
    /// 전체 페이지 수
    pub pages: u32,
    /// 레지스트리가 보고한 전체 항목 수
    pub results: u64,
    /// 대기 중인 항목 수
    pub remaining: usize,
    /// 실행 중인 작업 수 (토큰 사용량)
    pub in_flight: usize,
    /// 스캔 완료 항목 수 (깨끗 + 취약)
    pub scanned: u64,
    /// 건너뛴 항목 수 (다운로드/스캔 실패)
    pub skipped: u64,
    /// 취약점이 발견된 항목 수
    pub vulns_found: u64,
    /// 실패한 페이지 요청 수
    pub pages_failed: u64,
    /// 가장 최근의 발견 (표시용)
    pub latest_finding: Option<String>,
}

impl StatusSnapshot {
    /// 처리 완료 항목 수 (scanned + skipped)
    pub fn processed(&self) -> u64 {
        self.scanned + self.skipped
    }

    /// 초당 처리 항목 수
    pub fn throughput(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs <= f64::EPSILON {
            return 0.0;
        }
        self.processed() as f64 / secs
    }
}

/// 실행 결과 요약
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// 종료 시점 단계 (`Done` 또는 `Cancelled`)
    pub phase: RunPhase,
    /// 종료 시점 상태
    pub status: StatusSnapshot,
    /// 실행 시간 (밀리초)
    pub elapsed_ms: u64,
}

impl RunSummary {
    /// 취소로 종료되었는지 확인합니다.
    pub fn is_cancelled(&self) -> bool {
        self.phase == RunPhase::Cancelled
    }
}
