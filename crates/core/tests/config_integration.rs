//! echidna.toml 통합 설정 테스트
//!
//! - echidna.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use std::io::Write;

use echidna_core::config::EchidnaConfig;
use echidna_core::error::{ConfigError, EchidnaError};
use serial_test::serial;

// =============================================================================
// echidna.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../echidna.toml.example");
    let config = EchidnaConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.general.error_log, "error.log");
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../echidna.toml.example");
    let config = EchidnaConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_defaults() {
    let content = include_str!("../../../echidna.toml.example");
    let config = EchidnaConfig::parse(content).expect("should parse");
    let defaults = EchidnaConfig::default();

    assert_eq!(config.registry.base_url, defaults.registry.base_url);
    assert_eq!(config.registry.per_page, defaults.registry.per_page);
    assert_eq!(config.registry.user_agent, defaults.registry.user_agent);
    assert_eq!(config.scanner.max_in_flight, defaults.scanner.max_in_flight);
    assert_eq!(config.scanner.modules, defaults.scanner.modules);
    assert_eq!(
        config.scanner.max_member_size,
        defaults.scanner.max_member_size
    );
    assert_eq!(config.metrics.port, defaults.metrics.port);
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn registry_only_section_keeps_scanner_defaults() {
    let config = EchidnaConfig::parse(
        r#"
[registry]
base_url = "http://127.0.0.1:8080/info"
per_page = 10
"#,
    )
    .expect("should parse");

    assert_eq!(config.registry.per_page, 10);
    assert_eq!(config.scanner.max_in_flight, 70);
    config.validate().expect("should validate");
}

#[test]
fn unknown_module_in_file_fails_validation() {
    let config = EchidnaConfig::parse(
        r#"
[scanner]
modules = ["XSS", "SSRF"]
"#,
    )
    .expect("should parse");

    let err = config.validate().unwrap_err();
    assert!(matches!(
        err,
        EchidnaError::Config(ConfigError::InvalidValue { .. })
    ));
}

#[test]
fn wrong_type_returns_parse_error() {
    let err = EchidnaConfig::parse("[scanner]\nmax_in_flight = \"many\"").unwrap_err();
    assert!(matches!(
        err,
        EchidnaError::Config(ConfigError::ParseFailed { .. })
    ));
}

// =============================================================================
// 파일 로딩 + 환경변수 우선순위
// =============================================================================

#[tokio::test]
#[serial]
async fn env_overrides_file_values() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "[scanner]\nmax_in_flight = 10").expect("write");

    // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 안전합니다.
    unsafe { std::env::set_var("ECHIDNA_SCANNER_MAX_IN_FLIGHT", "42") };
    let config = EchidnaConfig::load(file.path()).await;
    unsafe { std::env::remove_var("ECHIDNA_SCANNER_MAX_IN_FLIGHT") };

    let config = config.expect("should load");
    assert_eq!(config.scanner.max_in_flight, 42);
}

#[tokio::test]
#[serial]
async fn env_modules_override_is_validated() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "[general]\nlog_level = \"debug\"").expect("write");

    // SAFETY: serial 테스트로 실행되므로 환경변수 조작이 안전합니다.
    unsafe { std::env::set_var("ECHIDNA_SCANNER_MODULES", "XSS,BOGUS") };
    let result = EchidnaConfig::load(file.path()).await;
    unsafe { std::env::remove_var("ECHIDNA_SCANNER_MODULES") };

    assert!(result.is_err());
}

#[tokio::test]
async fn empty_file_loads_defaults() {
    let file = tempfile::NamedTempFile::new().expect("tempfile");
    let config = EchidnaConfig::from_file(file.path())
        .await
        .expect("empty file should load");
    assert_eq!(config.registry.request_timeout_secs, 60);
}
