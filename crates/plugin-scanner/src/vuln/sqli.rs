//! SQLI 모듈 -- `$wpdb` 쿼리에 요청 파라미터를 직접 연결하는 코드

use super::SignatureModule;
use crate::error::PluginScannerError;

/// 모듈 이름
pub const NAME: &str = "SQLI";

/// `$wpdb->...`와 같은 줄의 superglobal
pub const SIGNATURES: &[&str] = &[
    r"\$wpdb->.*\$_GET.*",
    r"\$wpdb->.*\$_POST.*",
    r"\$wpdb->.*\$_REQUEST.*",
];

/// prepared statement 또는 검증 함수가 포함된 매치는 제외
pub const SUPPRESSOR: &str =
    r"prepare|esc_|sanitize|isset|\(int\)|htmlentities|htmlspecial|intval|wp_strip";

/// SQLI 모듈을 생성합니다.
pub fn module() -> Result<SignatureModule, PluginScannerError> {
    SignatureModule::new(NAME, SIGNATURES, SUPPRESSOR)
}
