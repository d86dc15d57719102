//! 결과 집계기 -- 누적 카운터와 발견 목록의 단일 소유자
//!
//! 카운터와 발견 목록은 하나의 락 획득 안에서 함께 갱신되므로,
//! 읽는 쪽은 약간 오래되었을 수는 있어도 항상 일관된 스냅샷을 봅니다.
//! [`PluginSet`](crate::registry::PluginSet)과는 별도의 락을 사용합니다.

use metrics::counter;
use tokio::sync::Mutex;

use echidna_core::metrics as m;

use crate::vuln::ScanResult;

/// 실행 중 누적 카운터
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunCounters {
    /// 스캔 완료 (깨끗 + 취약)
    pub scanned: u64,
    /// 건너뜀 (다운로드/스캔/보관 실패)
    pub skipped: u64,
    /// 취약점이 발견된 플러그인 수
    pub vulns_found: u64,
    /// 가장 최근의 발견
    pub latest_finding: Option<String>,
}

impl RunCounters {
    /// 처리 완료 수
    pub fn processed(&self) -> u64 {
        self.scanned + self.skipped
    }
}

#[derive(Debug, Default)]
struct State {
    counters: RunCounters,
    findings: Vec<ScanResult>,
}

/// 결과 집계기
#[derive(Debug, Default)]
pub struct ResultAggregator {
    state: Mutex<State>,
}

impl ResultAggregator {
    /// 빈 집계기를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 보관이 끝난 취약 결과를 기록합니다.
    pub async fn record(&self, result: ScanResult) {
        for (module, findings) in &result.modules {
            let matches: usize = findings.iter().map(|f| f.matches.len()).sum();
            counter!(m::SCAN_MODULE_MATCHES_TOTAL, m::LABEL_MODULE => module.clone())
                .increment(matches as u64);
        }
        counter!(m::SCAN_PLUGINS_FLAGGED_TOTAL).increment(1);
        counter!(m::SCAN_PLUGINS_SCANNED_TOTAL).increment(1);

        let mut state = self.state.lock().await;
        state.counters.vulns_found += 1;
        state.counters.latest_finding = result
            .headline()
            .map(|h| format!("{}: {h}", result.plugin))
            .or_else(|| Some(result.plugin.clone()));
        state.counters.scanned += 1;
        state.findings.push(result);
    }

    /// 깨끗한 스캔을 기록합니다.
    pub async fn record_clean(&self) {
        counter!(m::SCAN_PLUGINS_SCANNED_TOTAL).increment(1);
        self.state.lock().await.counters.scanned += 1;
    }

    /// 건너뛴 항목을 기록합니다.
    pub async fn record_skip(&self) {
        counter!(m::SCAN_PLUGINS_SKIPPED_TOTAL).increment(1);
        self.state.lock().await.counters.skipped += 1;
    }

    /// 현재 카운터 스냅샷
    pub async fn snapshot(&self) -> RunCounters {
        self.state.lock().await.counters.clone()
    }

    /// 지금까지 기록된 발견 목록
    pub async fn findings(&self) -> Vec<ScanResult> {
        self.state.lock().await.findings.clone()
    }
}
