use aftx_core::action_log::MemoryActionLog;
use aftx_core::config::AppConfig;
use aftx_hal::{FakeHal, FakeReply, ProcessOps};
use aftx_installer::App;
use aftx_workflow::{BundleSource, FlashPlan, ProvisionRequest};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const FLASH_OK: &str = "Sending 'boot' OKAY [ 0.1s]\nWriting 'boot' OKAY [ 0.2s]\nFinished. Total time: 0.3s";

struct Bench {
    tmp: TempDir,
    hal: FakeHal,
    log: Arc<MemoryActionLog>,
    app: App,
}

fn bench() -> Bench {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = AppConfig::default();
    cfg.paths.downloads_dir = tmp.path().join("downloads");
    cfg.paths.details_file = tmp.path().join("details.txt");
    fs::create_dir_all(&cfg.paths.downloads_dir).unwrap();

    let hal = FakeHal::new();
    let log = Arc::new(MemoryActionLog::new());
    let shared: Arc<dyn ProcessOps> = Arc::new(hal.clone());
    let app = App::new(cfg, shared, log.clone());
    Bench { tmp, hal, log, app }
}

fn images(root: &Path, names: &[&str]) -> std::path::PathBuf {
    let dir = root.join("images");
    fs::create_dir_all(&dir).unwrap();
    for name in names {
        fs::write(dir.join(name), b"img").unwrap();
    }
    dir
}

fn text(out: Vec<u8>) -> String {
    String::from_utf8(out).unwrap()
}

fn approve(_: &FlashPlan) -> anyhow::Result<bool> {
    Ok(true)
}

#[test]
fn devices_lists_both_transports() {
    let b = bench();
    b.hal
        .stub("adb", "devices", FakeReply::ok("List of devices attached\nR58M\tdevice\n"))
        .stub("fastboot", "devices", FakeReply::ok("ZY22\tfastboot\n"));

    let mut out = Vec::new();
    b.app.devices(&mut out).unwrap();
    let out = text(out);
    assert!(out.contains("adb:      R58M"), "{}", out);
    assert!(out.contains("fastboot: ZY22"), "{}", out);
}

#[test]
fn devices_without_tools_reports_none() {
    let b = bench();
    let mut out = Vec::new();
    b.app.devices(&mut out).unwrap();
    let out = text(out);
    assert!(out.contains("(none online)"));
    assert!(out.contains("fastboot: (none)"));
}

#[test]
fn info_writes_details_file_and_logs() {
    let b = bench();
    b.hal
        .stub("adb", "ro.product.model", FakeReply::ok("Pixel 7\n"))
        .stub("adb", "ro.product.brand", FakeReply::ok("google\n"));

    let mut out = Vec::new();
    b.app.info(Some("R58M"), &mut out).unwrap();

    let details = fs::read_to_string(b.tmp.path().join("details.txt")).unwrap();
    assert!(details.contains("Serial: R58M"), "{}", details);
    assert!(details.contains("Model: Pixel 7"), "{}", details);
    assert_eq!(
        b.log.entries(),
        vec![("device_info".to_string(), "saved".to_string())]
    );
}

#[test]
fn info_logs_write_failure_of_details_file() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = AppConfig::default();
    // A directory cannot be written as the details file.
    cfg.paths.details_file = tmp.path().to_path_buf();
    let hal = FakeHal::new();
    let log = Arc::new(MemoryActionLog::new());
    let app = App::new(cfg, Arc::new(hal.clone()), log.clone());

    let mut out = Vec::new();
    app.info(Some("R58M"), &mut out).unwrap();

    assert!(!text(out).contains("Details written"));
    assert_eq!(
        log.entries(),
        vec![("device_info".to_string(), "write_failed".to_string())]
    );
}

#[test]
fn info_without_device_does_nothing() {
    let b = bench();
    let mut out = Vec::new();
    b.app.info(None, &mut out).unwrap();
    assert!(text(out).contains("No ADB device online"));
    assert!(!b.tmp.path().join("details.txt").exists());
    assert!(b.log.entries().is_empty());
}

#[test]
fn plan_marks_unclassified_images() {
    let b = bench();
    let dir = images(b.tmp.path(), &["boot.img", "readme.img"]);
    let mut out = Vec::new();
    b.app.plan(&dir, &mut out).unwrap();
    let out = text(out);
    assert!(out.contains("boot.img"));
    assert!(out.contains("-> boot"));
    assert!(out.contains("(skipped)"));
}

#[test]
fn flash_without_fastboot_device_is_not_an_error() {
    let b = bench();
    let dir = images(b.tmp.path(), &["boot.img"]);
    let mut out = Vec::new();
    b.app.flash(&dir, None, &mut approve, &mut out).unwrap();
    assert!(text(out).contains("No fastboot device found"));
    assert_eq!(b.hal.commands().iter().filter(|c| c.contains(" flash ")).count(), 0);
}

#[test]
fn flash_targets_the_requested_serial() {
    let b = bench();
    b.hal
        .stub("fastboot", "devices", FakeReply::ok("AAA1\tfastboot\nZY22\tfastboot\n"))
        .stub("fastboot", "flash boot ", FakeReply::ok(FLASH_OK));
    let dir = images(b.tmp.path(), &["boot.img"]);

    let mut out = Vec::new();
    b.app.flash(&dir, Some("ZY22"), &mut approve, &mut out).unwrap();

    let flashed: Vec<String> = b
        .hal
        .commands()
        .into_iter()
        .filter(|c| c.contains(" flash "))
        .collect();
    assert_eq!(flashed.len(), 1);
    assert!(flashed[0].starts_with("fastboot -s ZY22 flash boot "), "{}", flashed[0]);
    assert!(text(out).contains("Flash complete"));
}

#[test]
fn failed_flash_prints_abort() {
    let b = bench();
    b.hal
        .stub("fastboot", "devices", FakeReply::ok("ZY22\tfastboot\n"))
        .stub("fastboot", "flash boot ", FakeReply::exit(1, "FAILED (remote: 'locked')"));
    let dir = images(b.tmp.path(), &["boot.img"]);

    let mut out = Vec::new();
    b.app.flash(&dir, None, &mut approve, &mut out).unwrap();
    let out = text(out);
    assert!(out.contains("FAIL"), "{}", out);
    assert!(out.contains("Aborted: Flashing boot failed"), "{}", out);
}

#[test]
fn provision_from_directory_flashes_fastboot_device() {
    let b = bench();
    b.hal
        .stub("fastboot", "devices", FakeReply::ok("ZY22\tfastboot\n"))
        .stub("fastboot", "flash boot ", FakeReply::ok(FLASH_OK));
    let dir = images(b.tmp.path(), &["boot.img"]);
    let request = ProvisionRequest {
        source: BundleSource::Directory(dir),
        serial: None,
    };

    let mut out = Vec::new();
    b.app.provision(&request, &mut approve, &mut out).unwrap();
    assert!(text(out).contains("Flash complete"));
    assert!(b
        .log
        .entries()
        .contains(&("completed".to_string(), "OK".to_string())));
}

#[test]
fn provision_without_device_reports_it() {
    let b = bench();
    let request = ProvisionRequest {
        source: BundleSource::Directory(b.tmp.path().to_path_buf()),
        serial: None,
    };
    let mut out = Vec::new();
    b.app.provision(&request, &mut approve, &mut out).unwrap();
    assert!(text(out).contains("No adb or fastboot device found"));
}
