use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const STORE_DIR: &str = "store/";
const META_WORKSPACE_ENTRY: &str = "meta/workspace.json";
pub const BUNDLE_FORMAT_V1: &str = "recordbook-workspace-v1";
pub const RAW_SQLITE_FORMAT: &str = "raw-sqlite3";

const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// The input was readable but is not a bundle this build can restore.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct BundleFormatError(pub String);

fn bad_format(message: impl Into<String>) -> anyhow::Error {
    BundleFormatError(message.into()).into()
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub backend: String,
}

/// Writes `store_file` from the workspace into a zip bundle at `out_path`.
pub fn export_workspace_bundle(
    workspace_path: &Path,
    backend: &str,
    store_file: &str,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let store_path = workspace_path.join(store_file);
    if !store_path.is_file() {
        return Err(anyhow!(
            "workspace store not found: {}",
            store_path.to_string_lossy()
        ));
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let sha256 = sha256_file(&store_path)?;
    let store_entry = format!("{STORE_DIR}{store_file}");

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        "bundleId": uuid::Uuid::new_v4().to_string(),
        "backend": backend,
        "storeEntry": store_entry,
        "sha256": sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(store_entry.as_str(), opts)
        .context("failed to start store entry")?;
    let mut store = File::open(&store_path)
        .with_context(|| format!("failed to open store {}", store_path.to_string_lossy()))?;
    std::io::copy(&mut store, &mut zip).context("failed to write store entry")?;

    let workspace_meta = json!({
        "sourceWorkspace": workspace_path.to_string_lossy(),
    });
    zip.start_file(META_WORKSPACE_ENTRY, opts)
        .context("failed to start workspace metadata entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&workspace_meta)
            .context("failed to serialize workspace metadata")?
            .as_bytes(),
    )
    .context("failed to write workspace metadata entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 3,
        sha256,
    })
}

/// Restores a bundle into `workspace_path`. A bare SQLite database is accepted
/// too. `store_file_for` maps a backend name to the store file it opens, and
/// the bundle is rejected before anything is written if the two disagree.
pub fn import_workspace_bundle<F>(
    in_path: &Path,
    workspace_path: &Path,
    store_file_for: F,
) -> anyhow::Result<ImportSummary>
where
    F: Fn(&str) -> Option<&'static str>,
{
    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;

    if !is_zip_file(in_path)? {
        if !is_sqlite_file(in_path)? {
            return Err(bad_format(format!(
                "not a workspace bundle or sqlite database: {}",
                in_path.to_string_lossy()
            )));
        }
        let sqlite_file = store_file_for("sqlite")
            .ok_or_else(|| bad_format("sqlite backend is not available"))?;
        let dst = workspace_path.join(sqlite_file);
        std::fs::copy(in_path, &dst).with_context(|| {
            format!(
                "failed to copy sqlite database from {} to {}",
                in_path.to_string_lossy(),
                dst.to_string_lossy()
            )
        })?;
        return Ok(ImportSummary {
            bundle_format_detected: RAW_SQLITE_FORMAT.to_string(),
            backend: "sqlite".to_string(),
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let field = |name: &str| {
        manifest
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };
    let format = field("format");
    if format != BUNDLE_FORMAT_V1 {
        return Err(bad_format(format!("unsupported bundle format: {format}")));
    }
    let backend = field("backend");
    let store_entry = field("storeEntry");
    let expected_sha = field("sha256");
    let store_file = store_entry
        .strip_prefix(STORE_DIR)
        .filter(|f| is_plain_file_name(f))
        .ok_or_else(|| bad_format(format!("manifest storeEntry is invalid: {store_entry:?}")))?
        .to_string();
    let Some(backend_file) = store_file_for(&backend) else {
        return Err(bad_format(format!("unknown backend: {backend}")));
    };
    if store_file != backend_file {
        return Err(bad_format(format!(
            "manifest storeEntry {store_entry:?} does not match backend {backend} ({backend_file})"
        )));
    }

    let dst = workspace_path.join(&store_file);
    let tmp_dst = workspace_path.join(format!("{store_file}.importing"));
    if tmp_dst.exists() {
        let _ = std::fs::remove_file(&tmp_dst);
    }

    let actual_sha = match extract_entry(&mut archive, &store_entry, &tmp_dst) {
        Ok(sha) => sha,
        Err(e) => {
            let _ = std::fs::remove_file(&tmp_dst);
            return Err(e);
        }
    };

    if !expected_sha.eq_ignore_ascii_case(&actual_sha) {
        let _ = std::fs::remove_file(&tmp_dst);
        return Err(bad_format(format!(
            "store checksum mismatch: manifest {expected_sha}, bundle {actual_sha}"
        )));
    }

    if let Err(e) = std::fs::rename(&tmp_dst, &dst) {
        let _ = std::fs::remove_file(&tmp_dst);
        return Err(e).with_context(|| {
            format!(
                "failed to move extracted store to {}",
                dst.to_string_lossy()
            )
        });
    }

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        backend,
    })
}

/// Copies one archive entry to `dst`, returning the SHA-256 of its bytes.
fn extract_entry(
    archive: &mut ZipArchive<File>,
    name: &str,
    dst: &Path,
) -> anyhow::Result<String> {
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("bundle missing {name}"))?;
    let mut out = File::create(dst)
        .with_context(|| format!("failed to create temp store {}", dst.to_string_lossy()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = entry.read(&mut buf).context("failed to extract store entry")?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        out.write_all(&buf[..n])
            .context("failed to write extracted store")?;
    }
    out.flush().context("failed to flush extracted store")?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

fn sha256_file(path: &Path) -> anyhow::Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

fn read_signature<const N: usize>(path: &Path) -> anyhow::Result<Option<[u8; N]>> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; N];
    match f.read_exact(&mut sig) {
        Ok(()) => Ok(Some(sig)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e).context("failed to read file signature"),
    }
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    Ok(read_signature::<4>(path)? == Some([0x50, 0x4B, 0x03, 0x04]))
}

fn is_sqlite_file(path: &Path) -> anyhow::Result<bool> {
    Ok(read_signature::<16>(path)?.as_ref() == Some(SQLITE_MAGIC))
}
