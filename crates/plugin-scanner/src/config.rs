//! 플러그인 스캐너 설정
//!
//! [`PluginScannerConfig`]는 core의 [`EchidnaConfig`](echidna_core::config::EchidnaConfig)에서
//! 스캔 파이프라인이 사용하는 필드(레지스트리 접속, 토큰 풀, 작업 디렉토리)만 모은 것입니다.
//!
//! # 사용 예시
//!
//! ```
//! use echidna_plugin_scanner::{PluginScannerConfig, PluginScannerConfigBuilder};
//!
//! // 기본값으로 생성
//! let config = PluginScannerConfig::default();
//! config.validate().unwrap();
//!
//! // 빌더로 생성
//! let config = PluginScannerConfigBuilder::new()
//!     .max_in_flight(10)
//!     .modules(vec!["XSS".to_owned()])
//!     .build()
//!     .unwrap();
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use echidna_core::config::{EchidnaConfig, KNOWN_MODULES};

use crate::error::PluginScannerError;

/// 플러그인 스캐너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginScannerConfig {
    /// 레지스트리 조회 API 기본 URL
    pub base_url: String,
    /// 페이지당 플러그인 수
    pub per_page: u32,
    /// 요청 User-Agent
    pub user_agent: String,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 호스트별 유휴 커넥션 최대 수
    pub pool_max_idle_per_host: usize,

    /// `current/`와 `inspect/`가 생성될 디렉토리
    pub work_dir: PathBuf,

    /// 토큰 풀 크기
    pub max_in_flight: usize,
    /// 활성화할 취약점 모듈
    pub modules: Vec<String>,
    /// 스캔 대상 확장자
    pub source_extension: String,
    /// 아카이브 멤버 최대 크기 (바이트)
    pub max_member_size: u64,
    /// 취소 시 드레인 대기 상한 (초)
    pub cleanup_grace_secs: u64,
    /// 스케줄러 유휴 폴링 간격 (밀리초)
    pub idle_poll_millis: u64,
}

impl Default for PluginScannerConfig {
    fn default() -> Self {
        Self::from_core(&EchidnaConfig::default())
    }
}

const MAX_IN_FLIGHT_LIMIT: usize = 1000;

impl PluginScannerConfig {
    /// core 설정에서 스캐너 설정을 생성합니다.
    pub fn from_core(core: &EchidnaConfig) -> Self {
        Self {
            base_url: core.registry.base_url.clone(),
            per_page: core.registry.per_page,
            user_agent: core.registry.user_agent.clone(),
            request_timeout_secs: core.registry.request_timeout_secs,
            pool_max_idle_per_host: core.registry.pool_max_idle_per_host,
            work_dir: core.general.work_dir.clone(),
            max_in_flight: core.scanner.max_in_flight,
            modules: core.scanner.modules.clone(),
            source_extension: core.scanner.source_extension.clone(),
            max_member_size: core.scanner.max_member_size,
            cleanup_grace_secs: core.scanner.cleanup_grace_secs,
            idle_poll_millis: core.scanner.idle_poll_millis,
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PluginScannerError> {
        if self.base_url.is_empty() {
            return Err(config_err("base_url", "must not be empty"));
        }

        if self.per_page == 0 {
            return Err(config_err("per_page", "must be greater than 0"));
        }

        if self.request_timeout_secs == 0 {
            return Err(config_err("request_timeout_secs", "must be greater than 0"));
        }

        if self.max_in_flight == 0 || self.max_in_flight > MAX_IN_FLIGHT_LIMIT {
            return Err(PluginScannerError::Config {
                field: "max_in_flight".to_owned(),
                reason: format!("must be 1-{MAX_IN_FLIGHT_LIMIT}"),
            });
        }

        if self.modules.is_empty() {
            return Err(config_err(
                "modules",
                "at least one vulnerability module required",
            ));
        }

        if let Some(unknown) = self
            .modules
            .iter()
            .find(|m| !KNOWN_MODULES.contains(&m.as_str()))
        {
            return Err(PluginScannerError::Config {
                field: "modules".to_owned(),
                reason: format!("unknown module '{unknown}'"),
            });
        }

        if !self.source_extension.starts_with('.') {
            return Err(config_err("source_extension", "must start with '.'"));
        }

        if self.max_member_size == 0 {
            return Err(config_err("max_member_size", "must be greater than 0"));
        }

        if self.idle_poll_millis == 0 {
            return Err(config_err("idle_poll_millis", "must be greater than 0"));
        }

        Ok(())
    }

    /// `<work_dir>/current`
    pub fn current_dir(&self) -> PathBuf {
        self.work_dir.join("current")
    }

    /// `<work_dir>/inspect`
    pub fn inspect_dir(&self) -> PathBuf {
        self.work_dir.join("inspect")
    }

    /// 요청 타임아웃
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 드레인 대기 상한
    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_secs(self.cleanup_grace_secs)
    }

    /// 스케줄러 유휴 폴링 간격
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_millis)
    }
}

fn config_err(field: &str, reason: &str) -> PluginScannerError {
    PluginScannerError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

/// [`PluginScannerConfig`] 빌더
#[derive(Default)]
pub struct PluginScannerConfigBuilder {
    config: PluginScannerConfig,
}

impl PluginScannerConfigBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 레지스트리 기본 URL을 설정합니다.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// 페이지당 플러그인 수를 설정합니다.
    pub fn per_page(mut self, per_page: u32) -> Self {
        self.config.per_page = per_page;
        self
    }

    /// User-Agent를 설정합니다.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// 요청 타임아웃을 설정합니다.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// 작업 디렉토리를 설정합니다.
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    /// 토큰 풀 크기를 설정합니다.
    pub fn max_in_flight(mut self, n: usize) -> Self {
        self.config.max_in_flight = n;
        self
    }

    /// 활성화할 모듈을 설정합니다.
    pub fn modules(mut self, modules: Vec<String>) -> Self {
        self.config.modules = modules;
        self
    }

    /// 아카이브 멤버 최대 크기를 설정합니다.
    pub fn max_member_size(mut self, size: u64) -> Self {
        self.config.max_member_size = size;
        self
    }

    /// 드레인 대기 상한을 설정합니다.
    pub fn cleanup_grace_secs(mut self, secs: u64) -> Self {
        self.config.cleanup_grace_secs = secs;
        self
    }

    /// 스케줄러 유휴 폴링 간격을 설정합니다.
    pub fn idle_poll_millis(mut self, millis: u64) -> Self {
        self.config.idle_poll_millis = millis;
        self
    }

    /// 설정을 빌드합니다. 유효성 검증에 실패하면 에러를 반환합니다.
    pub fn build(self) -> Result<PluginScannerConfig, PluginScannerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PluginScannerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_in_flight, 70);
        assert_eq!(config.user_agent, "Echidna V1.0");
    }

    #[test]
    fn from_core_copies_sections() {
        let mut core = EchidnaConfig::default();
        core.general.work_dir = PathBuf::from("/srv/echidna");
        core.registry.per_page = 50;
        core.scanner.modules = vec!["LFI".to_owned()];

        let config = PluginScannerConfig::from_core(&core);
        assert_eq!(config.per_page, 50);
        assert_eq!(config.modules, vec!["LFI"]);
        assert_eq!(config.current_dir(), PathBuf::from("/srv/echidna/current"));
        assert_eq!(config.inspect_dir(), PathBuf::from("/srv/echidna/inspect"));
    }

    #[test]
    fn validate_rejects_zero_in_flight() {
        let config = PluginScannerConfig {
            max_in_flight: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_in_flight"));
    }

    #[test]
    fn validate_rejects_unknown_module() {
        let config = PluginScannerConfig {
            modules: vec!["XXE".to_owned()],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("XXE"));
    }

    #[test]
    fn validate_rejects_zero_member_size() {
        let config = PluginScannerConfig {
            max_member_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_overrides_fields() {
        let config = PluginScannerConfigBuilder::new()
            .base_url("http://127.0.0.1:9999/info")
            .per_page(5)
            .max_in_flight(3)
            .cleanup_grace_secs(0)
            .build()
            .unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:9999/info");
        assert_eq!(config.per_page, 5);
        assert_eq!(config.max_in_flight, 3);
        assert_eq!(config.cleanup_grace(), Duration::ZERO);
    }

    #[test]
    fn builder_rejects_invalid() {
        let result = PluginScannerConfigBuilder::new().idle_poll_millis(0).build();
        assert!(result.is_err());
    }
}
