use crate::backup;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::handlers::core::{open_workspace, OpenError};
use crate::ipc::helpers::{require_param, require_store, require_teacher};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, Backend, StoreError};
use serde_json::json;
use std::path::PathBuf;

fn handle_backup_export_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match require_param(req, "outPath") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (Some(workspace_path), Some(store)) = (state.workspace.clone(), state.store.as_ref()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let backend = store.backend();

    let out = PathBuf::from(&out_path);
    let export = match backup::export_workspace_bundle(
        &workspace_path,
        backend.as_str(),
        backend.file_name(),
        &out,
    ) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": out_path })),
            )
        }
    };
    tracing::info!(path = %out_path, backend = %backend, "workspace bundle exported");

    ok(
        &req.id,
        json!({
            "path": out_path,
            "bundleFormat": export.bundle_format,
            "entryCount": export.entry_count,
            "sha256": export.sha256,
        }),
    )
}

fn handle_backup_import_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match require_param(req, "inPath") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(workspace_path) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        );
    }

    let import = match backup::import_workspace_bundle(&src, &workspace_path, |name| {
        name.parse::<Backend>().ok().map(Backend::file_name)
    }) {
        Ok(v) => v,
        Err(e) => {
            let code = if e.downcast_ref::<backup::BundleFormatError>().is_some() {
                "bad_format"
            } else {
                "io_failed"
            };
            return err(
                &req.id,
                code,
                format!("{e:#}"),
                Some(json!({ "path": src.to_string_lossy() })),
            );
        }
    };
    let backend = match import.backend.parse::<Backend>() {
        Ok(b) => b,
        Err(e) => return err(&req.id, "bad_format", e, None),
    };

    // Reopening drops the session; a restore is followed by a fresh login.
    match open_workspace(state, workspace_path.clone(), Some(backend)) {
        Ok(backend) => {
            tracing::info!(path = %in_path, backend = %backend, "workspace bundle imported");
            ok(
                &req.id,
                json!({
                    "workspacePath": workspace_path.to_string_lossy(),
                    "backend": backend.as_str(),
                    "bundleFormatDetected": import.bundle_format_detected,
                }),
            )
        }
        Err(OpenError::Store(e)) => store_err(&req.id, &e),
        Err(e) => err(&req.id, "config_invalid", e.to_string(), None),
    }
}

fn handle_exchange_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match require_param(req, "outPath") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let records = match store.list() {
        Ok(r) => r,
        Err(e) => return store_err(&req.id, &e),
    };

    let out = PathBuf::from(&out_path);
    let write = || -> std::io::Result<()> {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&out, store::encode_records(&records))
    };
    if let Err(e) = write() {
        return err(
            &req.id,
            "io_failed",
            e.to_string(),
            Some(json!({ "path": out_path })),
        );
    }
    tracing::info!(path = %out_path, count = records.len(), "records exported to csv");

    ok(&req.id, json!({ "path": out_path, "count": records.len() }))
}

fn handle_exchange_import_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match require_param(req, "inPath") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let text = match std::fs::read_to_string(&in_path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return err(
                &req.id,
                "not_found",
                "csv file not found",
                Some(json!({ "path": in_path })),
            )
        }
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": in_path })),
            )
        }
    };
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let (rows, row_errors) = store::decode_records(&text);
    if let Some(bad) = row_errors.iter().find(|e| e.code == "bad_header") {
        return err(
            &req.id,
            "bad_format",
            bad.message.clone(),
            Some(json!({ "line": bad.line, "path": in_path })),
        );
    }

    let mut warnings: Vec<serde_json::Value> = row_errors.iter().map(|e| e.to_json()).collect();
    let mut imported = 0usize;
    for (line, record) in rows {
        match store.create(&record) {
            Ok(()) => imported += 1,
            Err(e @ StoreError::Duplicate { .. }) => warnings.push(json!({
                "line": line,
                "code": e.code(),
                "message": e.to_string(),
            })),
            Err(e) => {
                // Rows before this one are already stored.
                let mut resp = store_err(&req.id, &e);
                resp["error"]["details"] = json!({ "line": line, "imported": imported });
                return resp;
            }
        }
    }
    for w in &warnings {
        tracing::warn!(line = %w["line"], code = %w["code"], "csv import row skipped");
    }
    tracing::info!(path = %in_path, imported, skipped = warnings.len(), "csv import finished");

    ok(
        &req.id,
        json!({
            "imported": imported,
            "skipped": warnings.len(),
            "warnings": warnings,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: fn(&mut AppState, &Request) -> serde_json::Value = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => handle_backup_export_workspace_bundle,
        "backup.importWorkspaceBundle" => handle_backup_import_workspace_bundle,
        "exchange.exportCsv" => handle_exchange_export_csv,
        "exchange.importCsv" => handle_exchange_import_csv,
        _ => return None,
    };
    if let Err(resp) = require_teacher(state, req) {
        return Some(resp);
    }
    Some(handler(state, req))
}
