//! 작업 디렉토리와 검사 결과 보관소
//!
//! ```text
//! <work_dir>/
//!   current/                         다운로드 스테이징 (시작 시 재생성, 종료 시 삭제)
//!   inspect/<MODULE>/<file>          매치된 모듈별 아카이브 사본
//!   inspect/<MODULE>/<file>.txt      해당 모듈의 발견 목록 (pretty JSON)
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::PluginScannerError;
use crate::vuln::{Finding, ScanResult};

/// `current/`와 `inspect/` 디렉토리 관리
#[derive(Debug, Clone)]
pub struct WorkDir {
    current: PathBuf,
    inspect: PathBuf,
}

impl WorkDir {
    /// 작업 디렉토리 경로로 생성합니다 (디렉토리는 만들지 않음).
    pub fn new(current: impl Into<PathBuf>, inspect: impl Into<PathBuf>) -> Self {
        Self {
            current: current.into(),
            inspect: inspect.into(),
        }
    }

    /// 스테이징 디렉토리
    pub fn current(&self) -> &Path {
        &self.current
    }

    /// 검사 디렉토리
    pub fn inspect(&self) -> &Path {
        &self.inspect
    }

    /// `current/`를 비우고 다시 만들며 `inspect/`가 있는지 확인합니다.
    pub async fn prepare(&self) -> Result<(), PluginScannerError> {
        match tokio::fs::remove_dir_all(&self.current).await {
            Ok(()) => debug!(path = %self.current.display(), "removed stale staging directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&self.current, e)),
        }
        tokio::fs::create_dir_all(&self.current)
            .await
            .map_err(|e| io_err(&self.current, e))?;
        tokio::fs::create_dir_all(&self.inspect)
            .await
            .map_err(|e| io_err(&self.inspect, e))?;
        Ok(())
    }

    /// `current/`와 그 아래의 모든 파일을 삭제합니다.
    pub async fn remove_current(&self) -> Result<(), PluginScannerError> {
        match tokio::fs::remove_dir_all(&self.current).await {
            Ok(()) => {
                info!(path = %self.current.display(), "staging directory removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&self.current, e)),
        }
    }
}

/// 취약 아카이브 보관소
#[derive(Debug, Clone)]
pub struct InspectionStore {
    root: PathBuf,
}

impl InspectionStore {
    /// `inspect/` 경로로 생성합니다.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 모듈별 보관 경로 (`inspect/<module>/<file>`)
    pub fn archive_path(&self, module: &str, file_name: &str) -> PathBuf {
        self.root.join(module).join(file_name)
    }

    /// 매치된 각 모듈 디렉토리에 아카이브와 발견 목록을 저장한 뒤
    /// 스테이징된 아카이브를 삭제합니다.
    ///
    /// 복사 단계에서 실패하면 이미 만든 사본을 지우고 에러를 반환하며,
    /// 스테이징된 아카이브는 그대로 남습니다. 모든 사본이 저장된 뒤
    /// 스테이징 파일 삭제만 실패한 경우는 [`Persisted::staged_error`]로 전달됩니다.
    pub async fn persist(
        &self,
        file_name: &str,
        archive: &Path,
        result: &ScanResult,
    ) -> Result<Persisted, PluginScannerError> {
        let mut written = Vec::new();
        let mut stored = Vec::with_capacity(result.modules.len());

        for (module, findings) in &result.modules {
            match self
                .store_module(module, findings, file_name, archive, &mut written)
                .await
            {
                Ok(target) => stored.push(target),
                Err(e) => {
                    rollback(&written).await;
                    return Err(e);
                }
            }
        }

        let staged_error = tokio::fs::remove_file(archive)
            .await
            .err()
            .map(|e| persist_err(archive, e));

        Ok(Persisted {
            stored,
            staged_error,
        })
    }

    async fn store_module(
        &self,
        module: &str,
        findings: &[Finding],
        file_name: &str,
        archive: &Path,
        written: &mut Vec<PathBuf>,
    ) -> Result<PathBuf, PluginScannerError> {
        let dir = self.root.join(module);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| persist_err(&dir, e))?;

        let target = dir.join(file_name);
        written.push(target.clone());
        tokio::fs::copy(archive, &target)
            .await
            .map_err(|e| persist_err(&target, e))?;

        let report =
            serde_json::to_vec_pretty(findings).map_err(|e| PluginScannerError::Persist {
                path: target.display().to_string(),
                reason: e.to_string(),
            })?;
        let sidecar = dir.join(format!("{file_name}.txt"));
        written.push(sidecar.clone());
        tokio::fs::write(&sidecar, report)
            .await
            .map_err(|e| persist_err(&sidecar, e))?;

        Ok(target)
    }
}

/// 보관 결과
#[derive(Debug)]
pub struct Persisted {
    /// 모듈별 아카이브 사본 경로
    pub stored: Vec<PathBuf>,
    /// 스테이징된 아카이브 삭제 실패 (사본은 모두 저장됨)
    pub staged_error: Option<PluginScannerError>,
}

async fn rollback(written: &[PathBuf]) {
    for path in written {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial copy"),
        }
    }
}

fn io_err(path: &Path, source: std::io::Error) -> PluginScannerError {
    PluginScannerError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn persist_err(path: &Path, source: std::io::Error) -> PluginScannerError {
    PluginScannerError::Persist {
        path: path.display().to_string(),
        reason: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vuln::ModuleFindings;

    fn flagged(modules: &[&str]) -> ScanResult {
        let mut map = ModuleFindings::new();
        for module in modules {
            map.insert(
                (*module).to_owned(),
                vec![Finding {
                    file: "p/x.php".to_owned(),
                    matches: vec!["echo $_GET['x'];".to_owned()],
                }],
            );
        }
        ScanResult::from_findings("p", map).unwrap()
    }

    #[tokio::test]
    async fn prepare_recreates_current_and_keeps_inspect() {
        let tmp = tempfile::tempdir().unwrap();
        let wd = WorkDir::new(tmp.path().join("current"), tmp.path().join("inspect"));

        tokio::fs::create_dir_all(wd.current()).await.unwrap();
        tokio::fs::write(wd.current().join("stale.zip"), b"x").await.unwrap();
        tokio::fs::create_dir_all(wd.inspect().join("XSS")).await.unwrap();

        wd.prepare().await.unwrap();
        assert!(wd.current().exists());
        assert!(!wd.current().join("stale.zip").exists());
        assert!(wd.inspect().join("XSS").exists());
    }

    #[tokio::test]
    async fn remove_current_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let wd = WorkDir::new(tmp.path().join("current"), tmp.path().join("inspect"));
        wd.prepare().await.unwrap();
        tokio::fs::write(wd.current().join("a.zip"), b"x").await.unwrap();

        wd.remove_current().await.unwrap();
        assert!(!wd.current().exists());
        wd.remove_current().await.unwrap();
    }

    #[tokio::test]
    async fn persist_copies_per_module_and_removes_staged() {
        let tmp = tempfile::tempdir().unwrap();
        let staged = tmp.path().join("10_3_p.zip");
        tokio::fs::write(&staged, b"zip-bytes").await.unwrap();

        let store = InspectionStore::new(tmp.path().join("inspect"));
        let persisted = store
            .persist("10_3_p.zip", &staged, &flagged(&["LFI", "XSS"]))
            .await
            .unwrap();

        assert_eq!(persisted.stored.len(), 2);
        assert!(persisted.staged_error.is_none());
        assert!(!staged.exists());
        for module in ["LFI", "XSS"] {
            let archive = store.archive_path(module, "10_3_p.zip");
            assert_eq!(tokio::fs::read(&archive).await.unwrap(), b"zip-bytes");
            let sidecar = tmp
                .path()
                .join("inspect")
                .join(module)
                .join("10_3_p.zip.txt");
            let body = tokio::fs::read_to_string(&sidecar).await.unwrap();
            let parsed: Vec<Finding> = serde_json::from_str(&body).unwrap();
            assert_eq!(parsed[0].file, "p/x.php");
        }
        assert!(!tmp.path().join("inspect").join("SQLI").exists());
    }

    #[tokio::test]
    async fn persist_failure_leaves_staged_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let staged = tmp.path().join("a.zip");
        tokio::fs::write(&staged, b"zip").await.unwrap();

        // inspect 루트가 일반 파일이라 모듈 디렉토리를 만들 수 없음
        let blocker = tmp.path().join("inspect");
        tokio::fs::write(&blocker, b"not a dir").await.unwrap();

        let store = InspectionStore::new(&blocker);
        let err = store
            .persist("a.zip", &staged, &flagged(&["XSS"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginScannerError::Persist { .. }));
        assert!(staged.exists());
    }

    #[tokio::test]
    async fn failed_module_copy_removes_earlier_copies() {
        let tmp = tempfile::tempdir().unwrap();
        let staged = tmp.path().join("a.zip");
        tokio::fs::write(&staged, b"zip").await.unwrap();

        // LFI는 성공하고 XSS 디렉토리 자리에 일반 파일이 있어 실패
        let root = tmp.path().join("inspect");
        tokio::fs::create_dir_all(&root).await.unwrap();
        tokio::fs::write(root.join("XSS"), b"not a dir").await.unwrap();

        let store = InspectionStore::new(&root);
        let err = store
            .persist("a.zip", &staged, &flagged(&["LFI", "XSS"]))
            .await
            .unwrap_err();

        assert!(matches!(err, PluginScannerError::Persist { .. }));
        assert!(staged.exists());
        assert!(!store.archive_path("LFI", "a.zip").exists());
        assert!(!root.join("LFI").join("a.zip.txt").exists());
    }
}
