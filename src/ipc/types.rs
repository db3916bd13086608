use std::path::PathBuf;

use serde::Deserialize;

use crate::config::{Role, WorkspaceConfig};
use crate::store::RecordStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything a handler may touch. Passed explicitly into every handler.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<Box<dyn RecordStore>>,
    pub config: WorkspaceConfig,
    pub role: Option<Role>,
}

impl AppState {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self {
            workspace: None,
            store: None,
            config,
            role: None,
        }
    }
}
