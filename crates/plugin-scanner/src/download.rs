//! 다운로드/스캔 작업 -- 레코드 하나를 받아 처리 완료(또는 취소)까지 진행
//!
//! 처리 순서: 파일명 결정 → 다운로드 → 아카이브 스캔 → 삭제 또는 보관 → 집계.
//!
//! 각 레코드는 정확히 한 번 `scanned` 또는 `skipped`로 집계됩니다.
//! 취소로 중단된 레코드는 어느 쪽으로도 집계되지 않습니다.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use metrics::histogram;
use tracing::{debug, info, warn};

use echidna_core::metrics as m;

use crate::error::PluginScannerError;
use crate::registry::PluginRecord;
use crate::scheduler::PipelineContext;
use crate::vuln::ScanResult;

/// 작업 하나의 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 취약점 없음, 아카이브 삭제됨
    Clean,
    /// 취약점 발견, `inspect/`에 보관됨
    Flagged,
    /// 다운로드/스캔/보관 실패
    Skipped,
    /// 취소로 중단됨 (집계되지 않음)
    Cancelled,
}

/// 레코드 하나를 처리합니다.
pub async fn process(ctx: &PipelineContext, record: PluginRecord) -> Outcome {
    let started = Instant::now();
    let outcome = run(ctx, &record).await;
    if outcome != Outcome::Cancelled {
        histogram!(m::SCAN_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    }
    debug!(slug = %record.slug, ?outcome, "plugin processed");
    outcome
}

async fn run(ctx: &PipelineContext, record: &PluginRecord) -> Outcome {
    let now = Utc::now();
    let Some(file_name) = record.file_name(now) else {
        ctx.errors.report(
            record.download_link.as_str(),
            format_args!("no file name in download link for {}", record.slug),
        );
        ctx.aggregator.record_skip().await;
        return Outcome::Skipped;
    };
    if record.days_since_update(now).is_none() {
        ctx.errors.report(
            record.slug.as_str(),
            format_args!("unparseable last_updated '{}'", record.last_updated),
        );
    }

    let path = ctx.work_dir.current().join(&file_name);

    let downloaded = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => {
            discard(&path).await;
            return Outcome::Cancelled;
        }
        result = ctx.fetcher.download(&record.download_link, &path) => result,
    };
    if let Err(e) = downloaded {
        ctx.errors.report(record.download_link.as_str(), &e);
        ctx.aggregator.record_skip().await;
        return Outcome::Skipped;
    }

    // 취소 후에는 새 스캔을 시작하지 않음 (파일은 정리 단계에서 삭제)
    if ctx.cancel.is_cancelled() {
        return Outcome::Cancelled;
    }

    let scanner = std::sync::Arc::clone(&ctx.scanner);
    let cancel = ctx.cancel.clone();
    let scan_path = path.clone();
    let scanned = tokio::task::spawn_blocking(move || scanner.scan(&scan_path, &cancel))
        .await
        .unwrap_or_else(|e| Err(PluginScannerError::Task(e.to_string())));

    let findings = match scanned {
        Ok(findings) => findings,
        Err(PluginScannerError::Cancelled) => return Outcome::Cancelled,
        Err(e) => {
            ctx.errors.report(file_name.as_str(), &e);
            discard(&path).await;
            ctx.aggregator.record_skip().await;
            return Outcome::Skipped;
        }
    };

    let Some(result) = ScanResult::from_findings(record.display_name(), findings) else {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            ctx.errors.report(path.display().to_string(), e);
        }
        ctx.aggregator.record_clean().await;
        return Outcome::Clean;
    };

    match ctx.store.persist(&file_name, &path, &result).await {
        Ok(persisted) => {
            if let Some(e) = persisted.staged_error {
                ctx.errors.report(file_name.as_str(), &e);
            }
            info!(
                plugin = %result.plugin,
                modules = ?result.modules.keys().collect::<Vec<_>>(),
                matches = result.match_count(),
                copies = persisted.stored.len(),
                "vulnerable plugin stored for inspection"
            );
            ctx.aggregator.record(result).await;
            Outcome::Flagged
        }
        Err(e) => {
            warn!(file = %file_name, error = %e, "failed to store flagged plugin");
            ctx.errors.report(file_name.as_str(), &e);
            ctx.aggregator.record_skip().await;
            Outcome::Skipped
        }
    }
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = %path.display(), error = %e, "failed to discard archive"),
    }
}
