//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `echidna_`
//! - 모듈명: `registry_`, `scan_`, `cli_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use echidna_core::metrics;
//! use metrics::counter;
//!
//! counter!(echidna_core::metrics::SCAN_PLUGINS_SCANNED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 취약점 모듈 레이블 키 (XSS, SQLI, CMDEXEC, LFI)
pub const LABEL_MODULE: &str = "module";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Registry 메트릭 ───────────────────────────────────────────────

/// Registry: 수집된 페이지 수 (counter, label: result)
pub const REGISTRY_PAGES_FETCHED_TOTAL: &str = "echidna_registry_pages_fetched_total";

/// Registry: 큐에 추가된 플러그인 수 (counter)
pub const REGISTRY_PLUGINS_ENQUEUED_TOTAL: &str = "echidna_registry_plugins_enqueued_total";

/// Registry: HTTP 클라이언트 재생성 횟수 (counter)
pub const REGISTRY_CLIENT_REFRESHES_TOTAL: &str = "echidna_registry_client_refreshes_total";

// ─── Scan 메트릭 ───────────────────────────────────────────────────

/// Scan: 스캔 완료 플러그인 수 (counter)
pub const SCAN_PLUGINS_SCANNED_TOTAL: &str = "echidna_scan_plugins_scanned_total";

/// Scan: 건너뛴 플러그인 수 (counter)
pub const SCAN_PLUGINS_SKIPPED_TOTAL: &str = "echidna_scan_plugins_skipped_total";

/// Scan: 취약점이 발견된 플러그인 수 (counter)
pub const SCAN_PLUGINS_FLAGGED_TOTAL: &str = "echidna_scan_plugins_flagged_total";

/// Scan: 모듈별 매치 수 (counter, label: module)
pub const SCAN_MODULE_MATCHES_TOTAL: &str = "echidna_scan_module_matches_total";

/// Scan: 다운로드+스캔 소요 시간 (histogram, 초)
pub const SCAN_DURATION_SECONDS: &str = "echidna_scan_duration_seconds";

/// Scan: 실행 중인 작업 수 (gauge)
pub const SCAN_IN_FLIGHT: &str = "echidna_scan_in_flight";

/// Scan: 대기 중인 플러그인 수 (gauge)
pub const SCAN_QUEUE_REMAINING: &str = "echidna_scan_queue_remaining";

// ─── CLI 메트릭 ────────────────────────────────────────────────────

/// CLI: 실행 시간 (gauge)
pub const CLI_UPTIME_SECONDS: &str = "echidna_cli_uptime_seconds";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 다운로드+스캔 소요 시간 히스토그램 버킷 (초)
///
/// 50ms ~ 120s 범위 (네트워크 다운로드 포함)
pub const SCAN_DURATION_BUCKETS: [f64; 9] = [0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `echidna` CLI의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Registry
    describe_counter!(
        REGISTRY_PAGES_FETCHED_TOTAL,
        "Registry pages requested, labeled by result"
    );
    describe_counter!(
        REGISTRY_PLUGINS_ENQUEUED_TOTAL,
        "Plugins added to the scan queue"
    );
    describe_counter!(
        REGISTRY_CLIENT_REFRESHES_TOTAL,
        "HTTP client rebuilds after connection resets"
    );

    // Scan
    describe_counter!(SCAN_PLUGINS_SCANNED_TOTAL, "Plugins scanned to completion");
    describe_counter!(
        SCAN_PLUGINS_SKIPPED_TOTAL,
        "Plugins skipped after download or scan failure"
    );
    describe_counter!(
        SCAN_PLUGINS_FLAGGED_TOTAL,
        "Plugins with at least one module match"
    );
    describe_counter!(
        SCAN_MODULE_MATCHES_TOTAL,
        "Signature matches per vulnerability module"
    );
    describe_histogram!(
        SCAN_DURATION_SECONDS,
        "Download and scan latency per plugin in seconds"
    );
    describe_gauge!(SCAN_IN_FLIGHT, "Tasks currently holding a concurrency token");
    describe_gauge!(SCAN_QUEUE_REMAINING, "Plugins waiting to be scanned");

    // CLI
    describe_gauge!(CLI_UPTIME_SECONDS, "Scanner uptime in seconds");
}
