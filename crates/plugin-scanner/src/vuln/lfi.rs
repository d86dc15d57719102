//! LFI 모듈 -- 파일 포함/읽기 함수 경로에 들어가는 superglobal

use super::SignatureModule;
use crate::error::PluginScannerError;

/// 모듈 이름
pub const NAME: &str = "LFI";

/// 공백 뒤에 오는 include 계열 호출 (`wp_require(` 같은 부분 일치 제외)
pub const SIGNATURES: &[&str] = &[
    r"[ \n\t\r]require\(.*\$_.*\)",
    r"[ \n\t\r]require_once\(.*\$_.*\)",
    r"[ \n\t\r]include_once\(.*\$_.*\)",
    r"[ \n\t\r]include\(.*\$_.*\)",
    r"[ \n\t\r]fopen\(.*\$_.*\)",
    r"[ \n\t\r]file_get_contents\(.*\$_.*\)",
];

/// 이스케이프/검증 함수가 포함된 매치는 제외
pub const SUPPRESSOR: &str = r"stripslashes|escape|prepare|esc_|sanitize|isset|\(int\)|htmlentities|htmlspecial|intval|wp_strip|init_crypt";

/// LFI 모듈을 생성합니다.
pub fn module() -> Result<SignatureModule, PluginScannerError> {
    SignatureModule::new(NAME, SIGNATURES, SUPPRESSOR)
}
