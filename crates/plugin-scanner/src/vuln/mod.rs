//! 취약점 모듈 -- 시그니처/억제 정규식 기반 소스 검사
//!
//! 각 모듈은 파일 내용을 받아 매치된 코드 조각 목록을 반환하는 순수 함수입니다.
//! 모듈끼리는 서로 독립적이며, [`ModuleRegistry`]에 이름으로 등록하는 것만으로
//! [`ArchiveScanner`](crate::archive::ArchiveScanner)가 사용하게 됩니다.
//!
//! # 매칭 규칙
//!
//! 1. 각 시그니처 정규식으로 내용 전체에서 모든 매치를 찾습니다.
//! 2. 매치 안에서 억제(suppressor) 정규식이 발견되면 이미 sanitize된 입력으로 보고 버립니다.
//! 3. 남은 매치는 HTML 엔티티를 디코딩하여 기록합니다.

pub mod cmd_exec;
pub mod lfi;
pub mod sqli;
pub mod xss;

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PluginScannerError;

/// 취약점 모듈 trait
///
/// 새로운 취약점 클래스를 추가하려면 이 trait을 구현하고
/// [`ModuleRegistry::register`]로 등록합니다.
pub trait VulnModule: Send + Sync {
    /// 모듈 이름 (`inspect/<name>/` 디렉토리명으로도 사용)
    fn name(&self) -> &str;

    /// 파일 내용을 검사하여 매치된 코드 조각을 반환합니다.
    fn check(&self, content: &[u8]) -> Result<Vec<String>, PluginScannerError>;
}

/// 한 파일에 대한 한 모듈의 검사 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// 아카이브 내부 경로
    pub file: String,
    /// 매치된 코드 조각 (HTML 디코딩됨)
    pub matches: Vec<String>,
}

/// 모듈 이름 -> 발견 목록
pub type ModuleFindings = BTreeMap<String, Vec<Finding>>;

/// 플러그인 하나의 스캔 결과
///
/// 하나 이상의 모듈이 매치를 보고한 경우에만 생성됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// 플러그인 이름
    pub plugin: String,
    /// 모듈별 발견 목록
    pub modules: ModuleFindings,
}

impl ScanResult {
    /// 발견이 있는 경우에만 결과를 생성합니다.
    pub fn from_findings(plugin: impl Into<String>, modules: ModuleFindings) -> Option<Self> {
        let modules: ModuleFindings = modules
            .into_iter()
            .filter(|(_, findings)| findings.iter().any(|f| !f.matches.is_empty()))
            .collect();
        if modules.is_empty() {
            None
        } else {
            Some(Self {
                plugin: plugin.into(),
                modules,
            })
        }
    }

    /// 전체 매치 수
    pub fn match_count(&self) -> usize {
        self.modules
            .values()
            .flat_map(|findings| findings.iter())
            .map(|f| f.matches.len())
            .sum()
    }

    /// 표시용 첫 번째 매치 (`<module>: <file>: <snippet>`)
    pub fn headline(&self) -> Option<String> {
        self.modules.iter().find_map(|(module, findings)| {
            findings.iter().find_map(|f| {
                f.matches
                    .first()
                    .map(|m| format!("{module}: {}: {}", f.file, m.trim()))
            })
        })
    }
}

/// 시그니처 목록 + 억제 정규식으로 구성된 모듈
#[derive(Debug)]
pub struct SignatureModule {
    name: String,
    signatures: Vec<Regex>,
    suppressor: Regex,
}

impl SignatureModule {
    /// 정규식을 컴파일하여 모듈을 생성합니다.
    pub fn new(
        name: impl Into<String>,
        signatures: &[&str],
        suppressor: &str,
    ) -> Result<Self, PluginScannerError> {
        let name = name.into();
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| PluginScannerError::Config {
                field: format!("modules.{name}"),
                reason: format!("invalid pattern '{pattern}': {e}"),
            })
        };

        let signatures = signatures
            .iter()
            .map(|s| compile(s))
            .collect::<Result<Vec<_>, _>>()?;
        let suppressor = compile(suppressor)?;

        Ok(Self {
            name,
            signatures,
            suppressor,
        })
    }
}

impl VulnModule for SignatureModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, content: &[u8]) -> Result<Vec<String>, PluginScannerError> {
        let text = String::from_utf8_lossy(content);
        let mut matches = Vec::new();

        for signature in &self.signatures {
            for m in signature.find_iter(&text) {
                let snippet = m.as_str();
                if self.suppressor.is_match(snippet) {
                    continue;
                }
                matches.push(html_escape::decode_html_entities(snippet).into_owned());
            }
        }

        Ok(matches)
    }
}

/// 이름으로 등록된 취약점 모듈 목록
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn VulnModule>>,
}

impl ModuleRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 모듈 (XSS, SQLI, CMDEXEC, LFI)이 모두 등록된 레지스트리
    pub fn with_defaults() -> Result<Self, PluginScannerError> {
        let mut registry = Self::new();
        registry.register(Arc::new(xss::module()?));
        registry.register(Arc::new(sqli::module()?));
        registry.register(Arc::new(cmd_exec::module()?));
        registry.register(Arc::new(lfi::module()?));
        Ok(registry)
    }

    /// 모듈을 등록합니다. 같은 이름이 이미 있으면 교체합니다.
    pub fn register(&mut self, module: Arc<dyn VulnModule>) {
        self.modules.retain(|m| m.name() != module.name());
        self.modules.push(module);
    }

    /// 주어진 이름의 모듈만 남긴 레지스트리를 반환합니다.
    pub fn select(&self, names: &[String]) -> Result<Self, PluginScannerError> {
        let mut selected = Self::new();
        for name in names {
            let module = self
                .modules
                .iter()
                .find(|m| m.name() == name)
                .ok_or_else(|| PluginScannerError::Config {
                    field: "modules".to_owned(),
                    reason: format!("unknown module '{name}'"),
                })?;
            selected.register(Arc::clone(module));
        }
        Ok(selected)
    }

    /// 등록된 모듈 이름 목록
    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// 등록된 모듈 수
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// 비어있는지 여부
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// 등록된 모듈 순회
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn VulnModule>> {
        self.modules.iter()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}
