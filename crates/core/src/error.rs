//! 에러 타입 -- 도메인별 에러 정의

/// Echidna 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum EchidnaError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 레지스트리/다운로드 요청 에러
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// 아카이브 스캔 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// 작업 디렉토리/검사 디렉토리 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 태스크 실행 실패 (join 에러 등)
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// 실행이 취소됨
    #[error("run cancelled")]
    Cancelled,
}

/// 레지스트리/다운로드 요청 에러
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// 레지스트리 정보를 가져올 수 없음 (치명적)
    #[error("registry unreachable: {0}")]
    RegistryUnavailable(String),

    /// 개별 요청 실패
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// 응답 디코딩 실패
    #[error("decode failed: {0}")]
    DecodeFailed(String),
}

/// 아카이브 스캔 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 아카이브를 열 수 없음
    #[error("archive unreadable: {0}")]
    ArchiveUnreadable(String),

    /// 취약점 모듈 에러
    #[error("module error: {0}")]
    Module(String),
}

/// 작업 디렉토리/검사 디렉토리 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 디렉토리 생성/삭제 실패
    #[error("directory error: {0}")]
    Directory(String),

    /// 결과 저장 실패
    #[error("persist failed: {0}")]
    Persist(String),
}

impl EchidnaError {
    /// 실행 취소로 인한 에러인지 확인합니다.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Pipeline(PipelineError::Cancelled))
    }
}
