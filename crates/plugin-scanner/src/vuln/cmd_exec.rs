//! CMDEXEC 모듈 -- 명령 실행/코드 평가 함수에 전달되는 superglobal

use super::SignatureModule;
use crate::error::PluginScannerError;

/// 모듈 이름
pub const NAME: &str = "CMDEXEC";

/// 실행 계열 함수 호출 인자 안의 superglobal
pub const SIGNATURES: &[&str] = &[
    r"system\(.*\$_.*\)",
    r"shell_exec\(.*\$_.*\)",
    r"passthru\(.*\$_.*\)",
    r"proc_open\(.*\$_.*\)",
    r"popen\(.*\$_.*\)",
    r"eval\(.*\$_.*\)",
    r"assert\(.*\$_.*\)",
];

/// 이스케이프/검증 함수가 포함된 매치는 제외
pub const SUPPRESSOR: &str = r"stripslashes|escape|prepare|esc_|sanitize|isset|\(int\)|htmlentities|htmlspecial|intval|wp_strip";

/// CMDEXEC 모듈을 생성합니다.
pub fn module() -> Result<SignatureModule, PluginScannerError> {
    SignatureModule::new(NAME, SIGNATURES, SUPPRESSOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vuln::VulnModule;

    #[test]
    fn flags_system_with_request_input() {
        let matches = module()
            .unwrap()
            .check(b"system('ping ' . $_GET['host']);")
            .unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn flags_passthru_and_eval() {
        let content = b"passthru($_POST['cmd']);\neval($_REQUEST['code']);\n";
        let matches = module().unwrap().check(content).unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn escapeshellarg_suppresses_match() {
        let content = b"system('ping ' . escapeshellarg($_GET['host']));";
        assert!(module().unwrap().check(content).unwrap().is_empty());
    }

    #[test]
    fn literal_command_is_clean() {
        assert!(module().unwrap().check(b"system('uptime');").unwrap().is_empty());
    }
}
