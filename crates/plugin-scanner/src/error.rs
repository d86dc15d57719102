//! 플러그인 스캐너 에러 타입
//!
//! [`PluginScannerError`]는 스캔 파이프라인 내에서 발생할 수 있는 모든 에러를 나타냅니다.
//! `From<PluginScannerError> for EchidnaError` 구현을 통해 `?` 연산자로
//! 상위 에러 타입으로 자연스럽게 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **네트워크**: `Http`, `Status`, `Decode`
//! - **아카이브**: `Archive`
//! - **보관**: `Persist`, `Io`
//! - **설정**: `Config`
//! - **취소**: `Cancelled`

use echidna_core::error::{
    EchidnaError, FetchError, PipelineError, ScanError, StorageError,
};

/// 플러그인 스캐너 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum PluginScannerError {
    /// HTTP 전송 실패 (타임아웃, 연결 리셋 등)
    #[error("http error: {url}: {reason}")]
    Http {
        /// 요청 URL
        url: String,
        /// 실패 사유
        reason: String,
    },

    /// 2xx가 아닌 응답
    #[error("unexpected status {status}: {url}")]
    Status {
        /// 요청 URL
        url: String,
        /// HTTP 상태 코드
        status: u16,
    },

    /// 레지스트리 응답 디코딩 실패
    #[error("decode error: {url}: {reason}")]
    Decode {
        /// 요청 URL
        url: String,
        /// 실패 사유
        reason: String,
    },

    /// 아카이브를 열 수 없음
    #[error("archive error: {path}: {reason}")]
    Archive {
        /// 아카이브 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 검사 결과 보관 실패
    #[error("persist error: {path}: {reason}")]
    Persist {
        /// 관련 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// 백그라운드 태스크 실패 (spawn_blocking join 에러 등)
    #[error("task error: {0}")]
    Task(String),

    /// 실행이 취소됨
    #[error("cancelled")]
    Cancelled,
}

impl PluginScannerError {
    /// 취소로 인한 에러인지 확인합니다.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<PluginScannerError> for EchidnaError {
    fn from(err: PluginScannerError) -> Self {
        match err {
            PluginScannerError::Http { url, reason } => {
                EchidnaError::Fetch(FetchError::RequestFailed(format!("{url}: {reason}")))
            }
            PluginScannerError::Status { url, status } => EchidnaError::Fetch(
                FetchError::RequestFailed(format!("{url}: unexpected status {status}")),
            ),
            PluginScannerError::Decode { url, reason } => {
                EchidnaError::Fetch(FetchError::DecodeFailed(format!("{url}: {reason}")))
            }
            PluginScannerError::Archive { path, reason } => {
                EchidnaError::Scan(ScanError::ArchiveUnreadable(format!("{path}: {reason}")))
            }
            PluginScannerError::Persist { path, reason } => {
                EchidnaError::Storage(StorageError::Persist(format!("{path}: {reason}")))
            }
            PluginScannerError::Config { field, reason } => {
                EchidnaError::Config(echidna_core::error::ConfigError::InvalidValue {
                    field,
                    reason,
                })
            }
            PluginScannerError::Io { path, source } => {
                EchidnaError::Storage(StorageError::Directory(format!("{path}: {source}")))
            }
            PluginScannerError::Task(msg) => EchidnaError::Pipeline(PipelineError::TaskFailed(msg)),
            PluginScannerError::Cancelled => EchidnaError::Pipeline(PipelineError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display() {
        let err = PluginScannerError::Status {
            url: "https://downloads.example.org/a.zip".to_owned(),
            status: 404,
        };
        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("a.zip"));
    }

    #[test]
    fn converts_http_to_fetch_error() {
        let err: EchidnaError = PluginScannerError::Http {
            url: "https://api.example.org".to_owned(),
            reason: "timeout".to_owned(),
        }
        .into();
        assert!(matches!(err, EchidnaError::Fetch(FetchError::RequestFailed(_))));
    }

    #[test]
    fn converts_archive_to_scan_error() {
        let err: EchidnaError = PluginScannerError::Archive {
            path: "current/x.zip".to_owned(),
            reason: "invalid Zip archive".to_owned(),
        }
        .into();
        assert!(matches!(err, EchidnaError::Scan(ScanError::ArchiveUnreadable(_))));
    }

    #[test]
    fn converts_cancelled() {
        let err: EchidnaError = PluginScannerError::Cancelled.into();
        assert!(err.is_cancelled());
        assert!(PluginScannerError::Cancelled.is_cancelled());
    }

    #[test]
    fn converts_io_to_storage_error() {
        let err: EchidnaError = PluginScannerError::Io {
            path: "/work/current".to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        }
        .into();
        assert!(matches!(err, EchidnaError::Storage(StorageError::Directory(_))));
    }
}
