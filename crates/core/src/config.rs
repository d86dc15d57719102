//! 설정 관리 -- echidna.toml 파싱 및 런타임 설정
//!
//! [`EchidnaConfig`]는 모든 구성 요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`ECHIDNA_SCANNER_MAX_IN_FLIGHT=50` 형식)
//! 3. 설정 파일 (`echidna.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), echidna_core::error::EchidnaError> {
//! use echidna_core::config::EchidnaConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = EchidnaConfig::load("echidna.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = EchidnaConfig::parse("[scanner]\nmax_in_flight = 50")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, EchidnaError};

/// 알려진 취약점 모듈 이름
pub const KNOWN_MODULES: [&str; 4] = ["XSS", "SQLI", "CMDEXEC", "LFI"];

/// 설정 상한값 상수
const MAX_IN_FLIGHT_LIMIT: usize = 1000;
const MAX_PER_PAGE: u32 = 1000;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 600;
const MAX_CLEANUP_GRACE_SECS: u64 = 60;

/// Echidna 통합 설정
///
/// `echidna.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EchidnaConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 레지스트리 접속 설정
    #[serde(default)]
    pub registry: RegistryConfig,
    /// 스캐너 설정
    #[serde(default)]
    pub scanner: ScannerConfig,
    /// 메트릭 엔드포인트 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl EchidnaConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, EchidnaError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값에서 시작하여 로드합니다.
    ///
    /// 설정 파일은 선택 사항이므로 CLI는 이 함수를 사용합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, EchidnaError> {
        let path = path.as_ref();
        let mut config = match Self::from_file(path).await {
            Ok(config) => config,
            Err(EchidnaError::Config(ConfigError::FileNotFound { .. })) => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, EchidnaError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EchidnaError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                EchidnaError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, EchidnaError> {
        toml::from_str(toml_str).map_err(|e| {
            EchidnaError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `ECHIDNA_{SECTION}_{FIELD}`
    /// 예: `ECHIDNA_SCANNER_MAX_IN_FLIGHT=50`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "ECHIDNA_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "ECHIDNA_GENERAL_LOG_FORMAT");
        override_path(&mut self.general.work_dir, "ECHIDNA_GENERAL_WORK_DIR");
        override_string(&mut self.general.error_log, "ECHIDNA_GENERAL_ERROR_LOG");

        // Registry
        override_string(&mut self.registry.base_url, "ECHIDNA_REGISTRY_BASE_URL");
        override_u32(&mut self.registry.per_page, "ECHIDNA_REGISTRY_PER_PAGE");
        override_string(&mut self.registry.user_agent, "ECHIDNA_REGISTRY_USER_AGENT");
        override_u64(
            &mut self.registry.request_timeout_secs,
            "ECHIDNA_REGISTRY_REQUEST_TIMEOUT_SECS",
        );
        override_usize(
            &mut self.registry.pool_max_idle_per_host,
            "ECHIDNA_REGISTRY_POOL_MAX_IDLE_PER_HOST",
        );

        // Scanner
        override_usize(
            &mut self.scanner.max_in_flight,
            "ECHIDNA_SCANNER_MAX_IN_FLIGHT",
        );
        override_csv(&mut self.scanner.modules, "ECHIDNA_SCANNER_MODULES");
        override_string(
            &mut self.scanner.source_extension,
            "ECHIDNA_SCANNER_SOURCE_EXTENSION",
        );
        override_u64(
            &mut self.scanner.max_member_size,
            "ECHIDNA_SCANNER_MAX_MEMBER_SIZE",
        );
        override_u64(
            &mut self.scanner.cleanup_grace_secs,
            "ECHIDNA_SCANNER_CLEANUP_GRACE_SECS",
        );
        override_u64(
            &mut self.scanner.idle_poll_millis,
            "ECHIDNA_SCANNER_IDLE_POLL_MILLIS",
        );
        override_u64(
            &mut self.scanner.status_interval_secs,
            "ECHIDNA_SCANNER_STATUS_INTERVAL_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "ECHIDNA_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "ECHIDNA_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "ECHIDNA_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), EchidnaError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.general.error_log.is_empty() {
            return Err(invalid("general.error_log", "must not be empty".to_owned()));
        }

        if !self.registry.base_url.starts_with("http://")
            && !self.registry.base_url.starts_with("https://")
        {
            return Err(invalid(
                "registry.base_url",
                "must be an http(s) URL".to_owned(),
            ));
        }

        if self.registry.per_page == 0 || self.registry.per_page > MAX_PER_PAGE {
            return Err(invalid(
                "registry.per_page",
                format!("must be 1-{MAX_PER_PAGE}"),
            ));
        }

        if self.registry.request_timeout_secs == 0
            || self.registry.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS
        {
            return Err(invalid(
                "registry.request_timeout_secs",
                format!("must be 1-{MAX_REQUEST_TIMEOUT_SECS}"),
            ));
        }

        if self.scanner.max_in_flight == 0 || self.scanner.max_in_flight > MAX_IN_FLIGHT_LIMIT {
            return Err(invalid(
                "scanner.max_in_flight",
                format!("must be 1-{MAX_IN_FLIGHT_LIMIT}"),
            ));
        }

        if self.scanner.modules.is_empty() {
            return Err(invalid(
                "scanner.modules",
                "at least one vulnerability module required".to_owned(),
            ));
        }

        for module in &self.scanner.modules {
            if !KNOWN_MODULES.contains(&module.as_str()) {
                return Err(invalid(
                    "scanner.modules",
                    format!(
                        "unknown module '{module}', expected one of: {}",
                        KNOWN_MODULES.join(", ")
                    ),
                ));
            }
        }

        if !self.scanner.source_extension.starts_with('.') {
            return Err(invalid(
                "scanner.source_extension",
                "must start with '.'".to_owned(),
            ));
        }

        if self.scanner.max_member_size == 0 {
            return Err(invalid(
                "scanner.max_member_size",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.scanner.cleanup_grace_secs > MAX_CLEANUP_GRACE_SECS {
            return Err(invalid(
                "scanner.cleanup_grace_secs",
                format!("must be 0-{MAX_CLEANUP_GRACE_SECS}"),
            ));
        }

        if self.scanner.idle_poll_millis == 0 {
            return Err(invalid(
                "scanner.idle_poll_millis",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "must not be 0 when metrics are enabled".to_owned(),
            ));
        }

        Ok(())
    }

    /// 일시 작업 디렉토리 (`<work_dir>/current`)
    pub fn current_dir(&self) -> PathBuf {
        self.general.work_dir.join("current")
    }

    /// 검사 디렉토리 (`<work_dir>/inspect`)
    pub fn inspect_dir(&self) -> PathBuf {
        self.general.work_dir.join("inspect")
    }

    /// 에러 로그 파일 경로
    pub fn error_log_path(&self) -> PathBuf {
        self.general.work_dir.join(&self.general.error_log)
    }
}

fn invalid(field: &str, reason: String) -> EchidnaError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// `current/`와 `inspect/`를 담는 작업 디렉토리
    pub work_dir: PathBuf,
    /// 항목별 에러를 기록하는 파일 (work_dir 기준 상대 경로)
    pub error_log: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            work_dir: PathBuf::from("."),
            error_log: "error.log".to_owned(),
        }
    }
}

/// 레지스트리 접속 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// 플러그인 조회 API 기본 URL
    pub base_url: String,
    /// 페이지당 플러그인 수
    pub per_page: u32,
    /// 요청 User-Agent
    pub user_agent: String,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 호스트별 유휴 커넥션 최대 수
    pub pool_max_idle_per_host: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.wordpress.org/plugins/info/1.2/".to_owned(),
            per_page: 400,
            user_agent: "Echidna V1.0".to_owned(),
            request_timeout_secs: 60,
            pool_max_idle_per_host: 100,
        }
    }
}

/// 스캐너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// 동시 실행 토큰 풀 크기 (페이지 요청 + 다운로드/스캔 공유)
    pub max_in_flight: usize,
    /// 활성화할 취약점 모듈
    pub modules: Vec<String>,
    /// 스캔 대상 소스 파일 확장자
    pub source_extension: String,
    /// 아카이브 멤버 최대 크기 (바이트)
    pub max_member_size: u64,
    /// 취소 시 작업 드레인 대기 상한 (초)
    pub cleanup_grace_secs: u64,
    /// 스케줄러 유휴 폴링 간격 (밀리초)
    pub idle_poll_millis: u64,
    /// 상태 출력 주기 (초). 0이면 비활성화
    pub status_interval_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 70,
            modules: KNOWN_MODULES.iter().map(|m| (*m).to_owned()).collect(),
            source_extension: ".php".to_owned(),
            max_member_size: 16 * 1024 * 1024, // 16 MB
            cleanup_grace_secs: 2,
            idle_poll_millis: 50,
            status_interval_secs: 5,
        }
    }
}

/// 메트릭 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_path(target: &mut PathBuf, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = PathBuf::from(val);
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
