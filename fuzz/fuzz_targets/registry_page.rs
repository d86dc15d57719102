#![no_main]

use libfuzzer_sys::fuzz_target;

use chrono::{TimeZone, Utc};
use echidna_plugin_scanner::registry::paginator::decode_page;

fuzz_target!(|data: &[u8]| {
    let Ok(page) = decode_page("fuzz://registry", data) else {
        return;
    };
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single();
    let Some(now) = now else {
        return;
    };
    for plugin in &page.plugins {
        let _ = plugin.days_since_update(now);
        if let Some(name) = plugin.file_name(now) {
            // 파생 파일명은 경로 구분자를 포함하지 않아야 함
            assert!(!name.contains('/'), "file name escapes staging dir: {name}");
        }
    }
});
