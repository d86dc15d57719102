#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use echidna_plugin_scanner::{ModuleRegistry, VulnModule};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 검사할 모듈 인덱스 (등록된 모듈 수로 나눈 나머지 사용)
    module: u8,
    /// PHP 소스로 취급할 임의 바이트
    content: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let Ok(registry) = ModuleRegistry::with_defaults() else {
        return;
    };
    let modules: Vec<_> = registry.iter().collect();
    let module = modules[usize::from(input.module) % modules.len()];

    if let Ok(matches) = module.check(&input.content) {
        // 매치가 있으면 모두 비어 있지 않은 스니펫이어야 함
        for m in &matches {
            assert!(!m.is_empty(), "{} produced an empty match", module.name());
        }
    }
});
