//! Run orchestration: build the scanner, wire the error log, status ticker,
//! metrics and cleanup controller around one pipeline run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use echidna_core::metrics as m;
use echidna_core::{EchidnaConfig, ErrorSink, ScanTarget};
use echidna_plugin_scanner::{PluginScanner, PluginScannerBuilder, PluginScannerConfig};

use crate::error::CliError;
use crate::error_log;
use crate::metrics_server;
use crate::output::{Banner, FlaggedPlugin, OutputWriter, RunReport, StatusLine};

/// Upper bound on waiting for the error log to flush after the run.
const ERROR_LOG_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Execute one full scan and return the final report.
pub async fn run(config: EchidnaConfig, writer: &OutputWriter) -> Result<RunReport, CliError> {
    let run_id = uuid::Uuid::new_v4().to_string();
    let span = info_span!("run", run_id = %run_id);
    execute(config, writer, run_id).instrument(span).await
}

async fn execute(
    config: EchidnaConfig,
    writer: &OutputWriter,
    run_id: String,
) -> Result<RunReport, CliError> {
    let started = Instant::now();

    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)
            .map_err(|e| CliError::Setup(e.to_string()))?;
    }

    let scanner = Arc::new(
        PluginScannerBuilder::new()
            .config(PluginScannerConfig::from_core(&config))
            .build()?,
    );

    scanner.prepare_work_dir().await?;

    let registry = scanner
        .fetch_registry_info()
        .await
        .map_err(|e| CliError::Registry(e.to_string()))?;

    if writer.is_text() {
        writer.render(&Banner {
            run_id: run_id.clone(),
            modules: scanner
                .module_names()
                .into_iter()
                .map(str::to_owned)
                .collect(),
            max_in_flight: config.scanner.max_in_flight,
            pages: registry.pages,
            results: registry.results,
            work_dir: config.general.work_dir.display().to_string(),
        })?;
    }

    let (errors, error_rx) = ErrorSink::channel();
    let error_log = error_log::spawn(config.error_log_path(), error_rx);

    let cancel = CancellationToken::new();
    let controller = Arc::new(scanner.cleanup_controller(cancel.clone()));
    let signal_cleanup = controller.arm();

    let ticker_stop = CancellationToken::new();
    let ticker = spawn_ticker(
        Arc::clone(&scanner),
        Duration::from_secs(config.scanner.status_interval_secs),
        writer.is_text(),
        started,
        ticker_stop.clone(),
    );

    let outcome = scanner.run(cancel.clone(), errors).await;
    ticker_stop.cancel();
    if let Some(ticker) = ticker
        && let Err(e) = ticker.await
    {
        warn!(error = %e, "status ticker failed");
    }

    if matches!(&outcome, Ok(summary) if summary.is_cancelled()) && writer.is_text() {
        println!("Interrupted: waiting for in-flight tasks, then removing current/ ...");
    }

    // Remove current/ on both completion and cancel; waits on a cleanup already started by a signal.
    let cleanup = controller.trigger().await;
    let signal_result = signal_cleanup
        .await
        .map_err(|e| CliError::Cleanup(e.to_string()))?;
    let drained = match (cleanup, signal_result) {
        (Err(e), _) | (_, Err(e)) => return Err(CliError::Cleanup(e.to_string())),
        (Ok(_), Ok(Some(report))) => report.drained,
        (Ok(report), Ok(None)) => report.drained,
    };

    let summary = outcome?;

    let errors_logged = match tokio::time::timeout(ERROR_LOG_FLUSH_TIMEOUT, error_log).await {
        Ok(Ok(Ok(lines))) => lines,
        Ok(Ok(Err(e))) => {
            error!(path = %config.error_log_path().display(), error = %e, "error log unavailable");
            0
        }
        Ok(Err(e)) => {
            error!(error = %e, "error log writer panicked");
            0
        }
        Err(_) => {
            warn!("error log writer did not finish in time");
            0
        }
    };

    let flagged = scanner
        .findings()
        .await
        .iter()
        .map(FlaggedPlugin::from)
        .collect();

    info!(
        phase = %summary.phase,
        scanned = summary.status.scanned,
        skipped = summary.status.skipped,
        vulns_found = summary.status.vulns_found,
        errors_logged,
        drained,
        "run finished"
    );

    let per_second = summary
        .status
        .throughput(Duration::from_millis(summary.elapsed_ms));
    Ok(RunReport {
        run_id,
        phase: summary.phase,
        status: summary.status,
        elapsed_ms: summary.elapsed_ms,
        per_second,
        errors_logged,
        drained,
        flagged,
    })
}

/// Periodic status line and uptime gauge. `None` when the interval is zero.
fn spawn_ticker(
    scanner: Arc<PluginScanner>,
    interval: Duration,
    print: bool,
    started: Instant,
    stop: CancellationToken,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let elapsed = started.elapsed();
                    metrics::gauge!(m::CLI_UPTIME_SECONDS).set(elapsed.as_secs_f64());
                    if print {
                        let line = StatusLine::new(scanner.status().await, elapsed);
                        let writer = OutputWriter::new(crate::cli::OutputFormat::Text);
                        if let Err(e) = writer.render(&line) {
                            warn!(error = %e, "failed to print status line");
                        }
                    }
                }
            }
        }
    }))
}
