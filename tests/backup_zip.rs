#[path = "../src/backup.rs"]
mod backup;

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn store_file_for(backend: &str) -> Option<&'static str> {
    match backend {
        "csv" => Some("records.csv"),
        "sqlite" => Some("records.sqlite3"),
        _ => None,
    }
}

/// Writes a bundle by hand so the manifest can say anything.
fn write_bundle(path: &Path, manifest: &serde_json::Value, entries: &[(&str, &[u8])]) {
    let mut zip = zip::ZipWriter::new(File::create(path).expect("create bundle"));
    let opts = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    zip.start_file("manifest.json", opts).expect("manifest entry");
    zip.write_all(manifest.to_string().as_bytes())
        .expect("write manifest");
    for (name, bytes) in entries {
        zip.start_file(*name, opts).expect("store entry");
        zip.write_all(bytes).expect("write entry");
    }
    zip.finish().expect("finish zip");
}

fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::Digest;
    format!("{:x}", sha2::Sha256::digest(bytes))
}

fn read_entry(bundle: &Path, name: &str) -> String {
    let f = File::open(bundle).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut text = String::new();
    archive
        .by_name(name)
        .expect("bundle entry")
        .read_to_string(&mut text)
        .expect("read entry");
    text
}

#[test]
fn zip_export_and_import_roundtrip() {
    let workspace = temp_dir("recordbook-backup-src");
    let workspace2 = temp_dir("recordbook-backup-dst");
    let out_dir = temp_dir("recordbook-backup-out");

    let bytes = b"admission_no,student_name\nA1,Asha\n";
    std::fs::write(workspace.join("records.csv"), bytes).expect("write source store");

    let bundle_path = out_dir.join("workspace.rbbackup.zip");
    let export = backup::export_workspace_bundle(&workspace, "csv", "records.csv", &bundle_path)
        .expect("export bundle");
    assert_eq!(export.bundle_format, backup::BUNDLE_FORMAT_V1);
    assert_eq!(export.entry_count, 3);
    assert_eq!(export.sha256.len(), 64);

    let manifest: serde_json::Value =
        serde_json::from_str(&read_entry(&bundle_path, "manifest.json")).expect("manifest json");
    assert_eq!(manifest["format"], backup::BUNDLE_FORMAT_V1);
    assert_eq!(manifest["backend"], "csv");
    assert_eq!(manifest["storeEntry"], "store/records.csv");
    assert_eq!(manifest["sha256"], export.sha256.as_str());
    assert!(manifest["bundleId"].as_str().is_some_and(|s| s.len() == 36));
    assert!(manifest["exportedAt"].as_str().is_some_and(|s| s.ends_with('Z')));
    assert_eq!(
        read_entry(&bundle_path, "store/records.csv").as_bytes(),
        bytes
    );

    let import = backup::import_workspace_bundle(&bundle_path, &workspace2, store_file_for)
        .expect("import bundle");
    assert_eq!(import.bundle_format_detected, backup::BUNDLE_FORMAT_V1);
    assert_eq!(import.backend, "csv");
    let restored = std::fs::read(workspace2.join("records.csv")).expect("read restored store");
    assert_eq!(restored, bytes);
    assert!(!workspace2.join("records.csv.importing").exists());

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(workspace2);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn tampered_store_entry_is_rejected() {
    let workspace = temp_dir("recordbook-backup-tamper-src");
    let workspace2 = temp_dir("recordbook-backup-tamper-dst");
    let out_dir = temp_dir("recordbook-backup-tamper-out");

    std::fs::write(workspace.join("records.csv"), b"original").expect("write source store");
    let bundle_path = out_dir.join("good.zip");
    backup::export_workspace_bundle(&workspace, "csv", "records.csv", &bundle_path)
        .expect("export bundle");
    let manifest = read_entry(&bundle_path, "manifest.json");

    let tampered = out_dir.join("tampered.zip");
    {
        let mut zip = zip::ZipWriter::new(File::create(&tampered).expect("create tampered"));
        let opts = zip::write::FileOptions::default();
        zip.start_file("manifest.json", opts).expect("manifest entry");
        zip.write_all(manifest.as_bytes()).expect("write manifest");
        zip.start_file("store/records.csv", opts).expect("store entry");
        zip.write_all(b"modified").expect("write store");
        zip.finish().expect("finish zip");
    }

    std::fs::write(workspace2.join("records.csv"), b"keep me").expect("write existing store");
    let e = backup::import_workspace_bundle(&tampered, &workspace2, store_file_for)
        .expect_err("checksum mismatch");
    assert!(format!("{e:#}").contains("checksum"));
    assert_eq!(
        std::fs::read(workspace2.join("records.csv")).expect("read existing store"),
        b"keep me"
    );
    assert!(!workspace2.join("records.csv.importing").exists());

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(workspace2);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn raw_sqlite_import_is_supported() {
    let out_dir = temp_dir("recordbook-backup-raw");
    let workspace = temp_dir("recordbook-backup-raw-dst");

    let raw_file = out_dir.join("records.db");
    let mut bytes = b"SQLite format 3\0".to_vec();
    bytes.extend_from_slice(&[0u8; 84]);
    std::fs::write(&raw_file, &bytes).expect("write raw sqlite file");

    let import = backup::import_workspace_bundle(&raw_file, &workspace, store_file_for)
        .expect("import raw sqlite");
    assert_eq!(import.bundle_format_detected, backup::RAW_SQLITE_FORMAT);
    assert_eq!(import.backend, "sqlite");

    let restored = std::fs::read(workspace.join("records.sqlite3")).expect("read restored sqlite");
    assert_eq!(restored, bytes);

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn unknown_input_is_rejected() {
    let out_dir = temp_dir("recordbook-backup-unknown");
    let workspace = temp_dir("recordbook-backup-unknown-dst");

    let junk = out_dir.join("notes.txt");
    std::fs::write(&junk, b"just some text, not a backup").expect("write junk");
    let e = backup::import_workspace_bundle(&junk, &workspace, store_file_for)
        .expect_err("reject junk");
    assert!(e.to_string().contains("not a workspace bundle"));
    assert!(!workspace.join("records.sqlite3").exists());

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn store_entry_outside_the_workspace_is_rejected() {
    let out_dir = temp_dir("recordbook-backup-escape");
    let workspace = temp_dir("recordbook-backup-escape-dst");

    let bundle = out_dir.join("escape.zip");
    {
        let mut zip = zip::ZipWriter::new(File::create(&bundle).expect("create bundle"));
        let opts = zip::write::FileOptions::default();
        let manifest = serde_json::json!({
            "format": backup::BUNDLE_FORMAT_V1,
            "backend": "csv",
            "storeEntry": "store/../../evil.csv",
            "sha256": "",
        });
        zip.start_file("manifest.json", opts).expect("manifest entry");
        zip.write_all(manifest.to_string().as_bytes())
            .expect("write manifest");
        zip.finish().expect("finish zip");
    }

    let e = backup::import_workspace_bundle(&bundle, &workspace, store_file_for)
        .expect_err("reject escape");
    assert!(e.to_string().contains("storeEntry"));

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn unknown_backend_is_rejected_before_the_store_is_touched() {
    let out_dir = temp_dir("recordbook-backup-bogus");
    let workspace = temp_dir("recordbook-backup-bogus-dst");
    std::fs::write(workspace.join("records.csv"), b"live data").expect("write live store");

    let payload = b"replacement";
    let bundle = out_dir.join("bogus.zip");
    write_bundle(
        &bundle,
        &serde_json::json!({
            "format": backup::BUNDLE_FORMAT_V1,
            "backend": "bogus",
            "storeEntry": "store/records.csv",
            "sha256": sha256_hex(payload),
        }),
        &[("store/records.csv", payload)],
    );

    let e = backup::import_workspace_bundle(&bundle, &workspace, store_file_for)
        .expect_err("reject unknown backend");
    assert!(e.downcast_ref::<backup::BundleFormatError>().is_some());
    assert!(e.to_string().contains("unknown backend"));
    assert_eq!(
        std::fs::read(workspace.join("records.csv")).expect("read live store"),
        b"live data"
    );

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn store_entry_must_match_the_backend_file() {
    let out_dir = temp_dir("recordbook-backup-mismatch");
    let workspace = temp_dir("recordbook-backup-mismatch-dst");
    std::fs::write(workspace.join("records.csv"), b"live data").expect("write live store");

    let payload = b"csv rows";
    let bundle = out_dir.join("mismatch.zip");
    write_bundle(
        &bundle,
        &serde_json::json!({
            "format": backup::BUNDLE_FORMAT_V1,
            "backend": "sqlite",
            "storeEntry": "store/records.csv",
            "sha256": sha256_hex(payload),
        }),
        &[("store/records.csv", payload)],
    );

    let e = backup::import_workspace_bundle(&bundle, &workspace, store_file_for)
        .expect_err("reject mismatched entry");
    assert!(e.downcast_ref::<backup::BundleFormatError>().is_some());
    assert_eq!(
        std::fs::read(workspace.join("records.csv")).expect("read live store"),
        b"live data"
    );
    assert!(!workspace.join("records.sqlite3").exists());

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn failed_extraction_leaves_no_temp_file() {
    let out_dir = temp_dir("recordbook-backup-corrupt");
    let workspace = temp_dir("recordbook-backup-corrupt-dst");
    std::fs::write(workspace.join("records.csv"), b"live data").expect("write live store");

    let payload = b"UNIQUE-PAYLOAD-0123456789";
    let bundle = out_dir.join("corrupt.zip");
    write_bundle(
        &bundle,
        &serde_json::json!({
            "format": backup::BUNDLE_FORMAT_V1,
            "backend": "csv",
            "storeEntry": "store/records.csv",
            "sha256": sha256_hex(payload),
        }),
        &[("store/records.csv", payload)],
    );

    // Flip one stored byte so the entry fails its CRC check while being read.
    let mut bytes = std::fs::read(&bundle).expect("read bundle");
    let at = bytes
        .windows(payload.len())
        .position(|w| w == payload)
        .expect("payload stored verbatim");
    bytes[at] ^= 0x20;
    std::fs::write(&bundle, &bytes).expect("write corrupt bundle");

    let e = backup::import_workspace_bundle(&bundle, &workspace, store_file_for)
        .expect_err("reject corrupt entry");
    assert!(e.downcast_ref::<backup::BundleFormatError>().is_none());
    assert!(!workspace.join("records.csv.importing").exists());
    assert_eq!(
        std::fs::read(workspace.join("records.csv")).expect("read live store"),
        b"live data"
    );

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}
