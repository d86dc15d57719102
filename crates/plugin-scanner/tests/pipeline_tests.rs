//! Integration tests for the plugin scanner
//!
//! Runs the full pipeline against a mock registry: pagination -> download -> archive scan
//! -> delete or store -> counters.

use std::io::{Cursor, Write};
use std::path::Path;
use std::time::Duration;

use echidna_core::{ErrorReport, ErrorSink, RunPhase, ScanTarget};
use echidna_plugin_scanner::{
    Finding, PluginScanner, PluginScannerBuilder, PluginScannerConfig, PluginScannerConfigBuilder,
};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::FileOptions;

const REGISTRY_PATH: &str = "/plugins/info/1.2/";

const CLEAN_PHP: &str = "<?php\n$greeting = 'hello';\necho esc_html($greeting);\n";
const XSS_PHP: &str = "<?php\necho $_GET['name'];\n";
const SUPPRESSED_PHP: &str = "<?php\necho esc_html($_GET['name']);\n";

fn config(work_dir: &Path, server: &MockServer) -> PluginScannerConfig {
    PluginScannerConfigBuilder::new()
        .base_url(format!("{}{REGISTRY_PATH}", server.uri()))
        .per_page(2)
        .work_dir(work_dir)
        .max_in_flight(4)
        .request_timeout_secs(5)
        .idle_poll_millis(5)
        .build()
        .unwrap()
}

fn scanner(work_dir: &Path, server: &MockServer) -> PluginScanner {
    PluginScannerBuilder::new()
        .config(config(work_dir, server))
        .build()
        .unwrap()
}

fn plugin(server: &MockServer, slug: &str, installs: u64) -> Value {
    json!({
        "name": format!("Plugin {slug}"),
        "slug": slug,
        "version": "1.0.0",
        "active_installs": installs,
        "last_updated": "2023-05-01 3:04pm GMT",
        "ratings": [],
        "icons": [],
        "download_link": format!("{}/downloads/{slug}.1.0.0.zip", server.uri()),
    })
}

fn page(page: u32, pages: u32, results: u64, plugins: Vec<Value>) -> Value {
    json!({
        "info": { "page": page, "pages": pages, "results": results },
        "plugins": plugins,
    })
}

fn zip_bytes(members: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in members {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

async fn mount_page(server: &MockServer, number: u32, body: Value) {
    Mock::given(method("GET"))
        .and(path(REGISTRY_PATH))
        .and(query_param("action", "query_plugins"))
        .and(query_param("request[page]", number.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_archive(server: &MockServer, slug: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(format!("/downloads/{slug}.1.0.0.zip")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

async fn mount_clean(server: &MockServer, slug: &str) {
    let body = zip_bytes(&[(&format!("{slug}/{slug}.php"), CLEAN_PHP)]);
    mount_archive(server, slug, body).await;
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ErrorReport>) -> Vec<ErrorReport> {
    let mut reports = Vec::new();
    while let Ok(report) = rx.try_recv() {
        reports.push(report);
    }
    reports
}

fn files_in(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn test_each_registry_page_requested_once() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    mount_page(
        &server,
        1,
        page(1, 3, 5, vec![plugin(&server, "alpha", 10), plugin(&server, "beta", 20)]),
    )
    .await;
    mount_page(
        &server,
        2,
        page(2, 3, 5, vec![plugin(&server, "gamma", 30), plugin(&server, "delta", 40)]),
    )
    .await;
    mount_page(&server, 3, page(3, 3, 5, vec![plugin(&server, "epsilon", 50)])).await;
    for slug in ["alpha", "beta", "gamma", "delta", "epsilon"] {
        mount_clean(&server, slug).await;
    }

    let scanner = scanner(tmp.path(), &server);
    scanner.prepare_work_dir().await.unwrap();
    let summary = tokio::time::timeout(
        Duration::from_secs(30),
        scanner.run(CancellationToken::new(), ErrorSink::discard()),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(summary.phase, RunPhase::Done);
    assert_eq!(summary.status.pages, 3);
    assert_eq!(summary.status.page, 3);
    assert_eq!(summary.status.scanned, 5);
    assert_eq!(summary.status.skipped, 0);
    assert_eq!(summary.status.remaining, 0);
    assert_eq!(scanner.total_units(), 5);
    assert_eq!(scanner.phase(), RunPhase::Done);

    let registry_requests = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == REGISTRY_PATH)
        .count();
    assert_eq!(registry_requests, 3);

    // 깨끗한 아카이브는 모두 삭제됨
    assert!(files_in(scanner.work_dir().current()).is_empty());
    assert!(scanner.findings().await.is_empty());
}

#[tokio::test]
async fn test_failed_page_is_reported_and_dropped() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    mount_page(
        &server,
        1,
        page(1, 3, 6, vec![plugin(&server, "alpha", 1), plugin(&server, "beta", 2)]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(REGISTRY_PATH))
        .and(query_param("request[page]", "2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, 3, page(3, 3, 6, vec![plugin(&server, "gamma", 3)])).await;
    for slug in ["alpha", "beta", "gamma"] {
        mount_clean(&server, slug).await;
    }

    let scanner = scanner(tmp.path(), &server);
    let (errors, mut rx) = ErrorSink::channel();
    let summary = tokio::time::timeout(
        Duration::from_secs(30),
        scanner.run(CancellationToken::new(), errors),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(summary.phase, RunPhase::Done);
    assert_eq!(summary.status.pages_failed, 1);
    // 실패한 페이지의 항목은 집계되지 않음
    assert_eq!(summary.status.processed(), 3);
    assert_eq!(summary.status.scanned, 3);

    let reports = drain(&mut rx);
    assert_eq!(reports.len(), 1);
    assert!(reports[0].context.contains("request[page]=2"));
    assert!(reports[0].message.contains("500"));
}

#[tokio::test]
async fn test_flagged_plugin_stored_for_inspection() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    mount_page(&server, 1, page(1, 1, 1, vec![plugin(&server, "leaky", 1200)])).await;
    mount_archive(
        &server,
        "leaky",
        zip_bytes(&[
            ("leaky/leaky.php", XSS_PHP),
            ("leaky/readme.txt", "echo $_GET['not-php'];"),
        ]),
    )
    .await;

    let scanner = scanner(tmp.path(), &server);
    scanner.prepare_work_dir().await.unwrap();
    let summary = scanner
        .run(CancellationToken::new(), ErrorSink::discard())
        .await
        .unwrap();

    assert_eq!(summary.status.scanned, 1);
    assert_eq!(summary.status.vulns_found, 1);
    let latest = summary.status.latest_finding.unwrap();
    assert!(latest.starts_with("Plugin leaky: XSS: leaky/leaky.php:"), "{latest}");

    let xss_dir = tmp.path().join("inspect").join("XSS");
    let stored = files_in(&xss_dir);
    let archive = stored
        .iter()
        .find(|name| name.ends_with(".zip"))
        .expect("archive copied into inspect/XSS");
    assert!(archive.starts_with("1200_"), "{archive}");
    assert!(archive.ends_with("_leaky.1.0.0.zip"), "{archive}");

    let sidecar = std::fs::read_to_string(xss_dir.join(format!("{archive}.txt"))).unwrap();
    let findings: Vec<Finding> = serde_json::from_str(&sidecar).unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].file, "leaky/leaky.php");
    assert!(findings[0].matches[0].contains("$_GET['name']"));

    // 매치되지 않은 모듈 디렉토리는 생성되지 않음
    assert!(!tmp.path().join("inspect").join("SQLI").exists());
    assert!(files_in(scanner.work_dir().current()).is_empty());
    assert_eq!(scanner.findings().await.len(), 1);
}

#[tokio::test]
async fn test_store_failure_counts_as_skipped() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    mount_page(&server, 1, page(1, 1, 1, vec![plugin(&server, "leaky", 7)])).await;
    mount_archive(&server, "leaky", zip_bytes(&[("leaky/leaky.php", XSS_PHP)])).await;

    // inspect/XSS 자리에 일반 파일이 있어 모듈 디렉토리를 만들 수 없음
    let inspect = tmp.path().join("inspect");
    std::fs::create_dir_all(&inspect).unwrap();
    std::fs::write(inspect.join("XSS"), b"not a directory").unwrap();

    let scanner = scanner(tmp.path(), &server);
    let (errors, mut rx) = ErrorSink::channel();
    let summary = tokio::time::timeout(
        Duration::from_secs(30),
        scanner.run(CancellationToken::new(), errors),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(summary.phase, RunPhase::Done);
    assert_eq!(summary.status.skipped, 1);
    assert_eq!(summary.status.scanned, 0);
    assert_eq!(summary.status.vulns_found, 0);
    assert!(summary.status.latest_finding.is_none());
    assert!(scanner.findings().await.is_empty());

    let reports = drain(&mut rx);
    assert!(
        reports
            .iter()
            .any(|r| r.context.ends_with("_leaky.1.0.0.zip")),
        "{reports:?}"
    );

    // 스테이징된 아카이브는 그대로 남음
    let staged = files_in(scanner.work_dir().current());
    assert_eq!(staged.len(), 1);
    assert!(staged[0].ends_with("_leaky.1.0.0.zip"), "{staged:?}");
}

#[tokio::test]
async fn test_suppressed_match_is_clean() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    mount_page(&server, 1, page(1, 1, 1, vec![plugin(&server, "careful", 5)])).await;
    mount_archive(
        &server,
        "careful",
        zip_bytes(&[("careful/careful.php", SUPPRESSED_PHP)]),
    )
    .await;

    let scanner = scanner(tmp.path(), &server);
    let summary = scanner
        .run(CancellationToken::new(), ErrorSink::discard())
        .await
        .unwrap();

    assert_eq!(summary.status.scanned, 1);
    assert_eq!(summary.status.vulns_found, 0);
    assert!(summary.status.latest_finding.is_none());
    assert!(files_in(&tmp.path().join("inspect")).is_empty());
    assert!(files_in(scanner.work_dir().current()).is_empty());
}

#[tokio::test]
async fn test_every_plugin_counted_exactly_once() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    let mut broken_link = plugin(&server, "nolink", 1);
    broken_link["download_link"] = json!("");

    mount_page(
        &server,
        1,
        page(
            1,
            2,
            5,
            vec![plugin(&server, "clean", 1), plugin(&server, "missing", 2)],
        ),
    )
    .await;
    mount_page(
        &server,
        2,
        page(
            2,
            2,
            5,
            vec![plugin(&server, "corrupt", 3), plugin(&server, "leaky", 4), broken_link],
        ),
    )
    .await;
    mount_clean(&server, "clean").await;
    Mock::given(method("GET"))
        .and(path("/downloads/missing.1.0.0.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_archive(&server, "corrupt", b"this is not a zip archive".to_vec()).await;
    mount_archive(&server, "leaky", zip_bytes(&[("leaky/a.php", XSS_PHP)])).await;

    let scanner = scanner(tmp.path(), &server);
    let (errors, mut rx) = ErrorSink::channel();
    let summary = tokio::time::timeout(
        Duration::from_secs(30),
        scanner.run(CancellationToken::new(), errors),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(summary.phase, RunPhase::Done);
    assert_eq!(summary.status.processed(), 5);
    assert_eq!(summary.status.scanned, 2);
    assert_eq!(summary.status.skipped, 3);
    assert_eq!(summary.status.vulns_found, 1);

    let reports = drain(&mut rx);
    assert!(reports.iter().any(|r| r.context.contains("missing")));
    assert!(reports.iter().any(|r| r.context.contains("corrupt")));

    // 손상된 아카이브는 스테이징에 남지 않음
    assert!(files_in(scanner.work_dir().current()).is_empty());
}

#[tokio::test]
async fn test_cancel_stops_run_and_cleanup_removes_staging() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    mount_page(
        &server,
        1,
        page(1, 1, 2, vec![plugin(&server, "slow", 1), plugin(&server, "slower", 2)]),
    )
    .await;
    for slug in ["slow", "slower"] {
        Mock::given(method("GET"))
            .and(path(format!("/downloads/{slug}.1.0.0.zip")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(zip_bytes(&[("a.php", CLEAN_PHP)]))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;
    }

    let scanner = scanner(tmp.path(), &server);
    scanner.prepare_work_dir().await.unwrap();
    let cancel = CancellationToken::new();
    let controller = scanner.cleanup_controller(cancel.clone());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        scanner.run(cancel, ErrorSink::discard()),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(summary.is_cancelled());
    // 취소된 작업은 집계되지 않음
    assert_eq!(summary.status.processed(), 0);

    let report = controller.trigger().await.unwrap();
    assert!(report.drained);
    assert!(!scanner.work_dir().current().exists());
    assert!(scanner.tracker().is_empty());
}

#[tokio::test]
async fn test_no_new_downloads_after_cancel() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    let slugs = ["s1", "s2", "s3", "s4", "s5", "s6"];
    mount_page(
        &server,
        1,
        page(1, 1, 6, slugs.iter().map(|s| plugin(&server, s, 1)).collect()),
    )
    .await;
    for slug in slugs {
        Mock::given(method("GET"))
            .and(path(format!("/downloads/{slug}.1.0.0.zip")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(zip_bytes(&[("a.php", CLEAN_PHP)]))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;
    }

    let mut cfg = config(tmp.path(), &server);
    cfg.max_in_flight = 1;
    let scanner = PluginScannerBuilder::new().config(cfg).build().unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        scanner.run(cancel, ErrorSink::discard()),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(summary.phase, RunPhase::Cancelled);
    assert_eq!(summary.status.remaining, 5);

    // 취소 후에도 잠시 기다려 추가 요청이 없는지 확인
    tokio::time::sleep(Duration::from_millis(200)).await;
    let downloads = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path().starts_with("/downloads/"))
        .count();
    assert_eq!(downloads, 1);
}
