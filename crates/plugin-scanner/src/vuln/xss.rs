//! XSS 모듈 -- 사용자 입력 superglobal을 그대로 출력하는 코드

use super::SignatureModule;
use crate::error::PluginScannerError;

/// 모듈 이름
pub const NAME: &str = "XSS";

/// 출력 컨텍스트의 superglobal 사용
pub const SIGNATURES: &[&str] = &[
    r"echo +.*\$(_GET|_POST|_COOKIE).*",
    r"print +.*\$(_GET|_POST|_COOKIE).*",
];

/// 이스케이프/검증 함수가 포함된 매치는 제외
pub const SUPPRESSOR: &str =
    r"esc_|sanitize|isset|\(int\)|htmlentities|htmlspecial|intval|wp_strip";

/// XSS 모듈을 생성합니다.
pub fn module() -> Result<SignatureModule, PluginScannerError> {
    SignatureModule::new(NAME, SIGNATURES, SUPPRESSOR)
}
