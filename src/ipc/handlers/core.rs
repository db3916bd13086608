use crate::config;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::require_param;
use crate::ipc::types::{AppState, Request};
use crate::store::{self, Backend, StoreError};
use serde_json::json;
use std::path::PathBuf;

#[derive(Debug)]
pub enum OpenError {
    Config(anyhow::Error),
    Store(StoreError),
}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenError::Config(e) => write!(f, "{e:#}"),
            OpenError::Store(e) => write!(f, "{e}"),
        }
    }
}

/// Loads the workspace config, resolves the backend and opens the store.
/// The session is dropped because credentials may differ per workspace.
pub fn open_workspace(
    state: &mut AppState,
    path: PathBuf,
    requested: Option<Backend>,
) -> Result<Backend, OpenError> {
    let cfg = config::load_workspace_config(&path).map_err(OpenError::Config)?;
    let backend = requested.or(cfg.backend).unwrap_or(Backend::Csv);
    let opened = store::open_store(&path, backend).map_err(OpenError::Store)?;

    state.store = Some(opened);
    state.workspace = Some(path);
    state.config = cfg;
    state.role = None;
    Ok(backend)
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "backend": state.store.as_ref().map(|s| s.backend().as_str()),
            "role": state.role.map(|r| r.as_str()),
            "canManageRecords": state.role.is_some_and(|r| r.can_manage_records()),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match require_param(req, "path") {
        Ok(p) => PathBuf::from(p),
        Err(resp) => return resp,
    };
    let requested = match req.params.get("backend").and_then(|v| v.as_str()) {
        None => None,
        Some(s) => match s.parse::<Backend>() {
            Ok(b) => Some(b),
            Err(e) => return err(&req.id, "bad_params", e, None),
        },
    };

    match open_workspace(state, path.clone(), requested) {
        Ok(backend) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "backend": backend.as_str(),
            }),
        ),
        Err(OpenError::Config(e)) => err(
            &req.id,
            "config_invalid",
            format!("{e:#}"),
            Some(json!({ "path": path.join(config::CONFIG_FILE_NAME).to_string_lossy() })),
        ),
        Err(OpenError::Store(e)) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
