//! 아카이브 스캐너 -- zip 내부 소스 파일을 취약점 모듈에 전달
//!
//! [`ArchiveScanner::scan`]은 동기 I/O를 수행하므로
//! `tokio::task::spawn_blocking` 내에서 호출되어야 합니다.
//!
//! 취소 토큰은 아카이브를 열기 전과 각 멤버를 처리하기 전에 확인합니다.
//! 취소되면 즉시 반환하여 파일 핸들을 해제합니다.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::PluginScannerError;
use crate::vuln::{Finding, ModuleFindings, ModuleRegistry};

/// zip 아카이브 스캐너
#[derive(Debug, Clone)]
pub struct ArchiveScanner {
    modules: ModuleRegistry,
    source_extension: String,
    max_member_size: u64,
}

impl ArchiveScanner {
    /// 새 스캐너를 생성합니다.
    pub fn new(
        modules: ModuleRegistry,
        source_extension: impl Into<String>,
        max_member_size: u64,
    ) -> Self {
        Self {
            modules,
            source_extension: source_extension.into(),
            max_member_size,
        }
    }

    /// 등록된 모듈 목록
    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    /// 아카이브를 스캔하여 모듈별 발견 목록을 반환합니다.
    ///
    /// - 아카이브를 열 수 없으면 `Archive` 에러 (부분 결과 없음)
    /// - 읽을 수 없거나 너무 큰 멤버는 건너뜀
    /// - 모듈 에러는 해당 모듈만 건너뜀
    /// - 취소되면 `Cancelled`
    pub fn scan(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<ModuleFindings, PluginScannerError> {
        if cancel.is_cancelled() {
            return Err(PluginScannerError::Cancelled);
        }

        let file = File::open(path).map_err(|e| PluginScannerError::Archive {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut archive = ZipArchive::new(file).map_err(|e| PluginScannerError::Archive {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut findings = ModuleFindings::new();

        for i in 0..archive.len() {
            if cancel.is_cancelled() {
                return Err(PluginScannerError::Cancelled);
            }

            let mut member = match archive.by_index(i) {
                Ok(m) => m,
                Err(e) => {
                    debug!(archive = %path.display(), index = i, error = %e, "unreadable member, skipping");
                    continue;
                }
            };

            if member.is_dir() || !member.name().ends_with(&self.source_extension) {
                continue;
            }

            let name = member.name().to_owned();

            if member.size() > self.max_member_size {
                warn!(
                    archive = %path.display(),
                    member = %name,
                    size = member.size(),
                    max = self.max_member_size,
                    "archive member too large, skipping"
                );
                continue;
            }

            let mut content = Vec::with_capacity(usize::try_from(member.size()).unwrap_or(0));
            // 선언된 크기를 믿지 않고 읽기 자체도 제한
            if let Err(e) = (&mut member)
                .take(self.max_member_size + 1)
                .read_to_end(&mut content)
            {
                debug!(archive = %path.display(), member = %name, error = %e, "failed to read member, skipping");
                continue;
            }
            if content.len() as u64 > self.max_member_size {
                warn!(archive = %path.display(), member = %name, "archive member exceeds declared size, skipping");
                continue;
            }

            for module in self.modules.iter() {
                match module.check(&content) {
                    Ok(matches) if !matches.is_empty() => {
                        findings
                            .entry(module.name().to_owned())
                            .or_default()
                            .push(Finding {
                                file: name.clone(),
                                matches,
                            });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(module = module.name(), member = %name, error = %e, "module failed, skipping");
                    }
                }
            }
        }

        Ok(findings)
    }
}
