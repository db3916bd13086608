use crate::store::Backend;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "recordbook.json";

pub const ENV_WORKSPACE: &str = "RECORDBOOK_WORKSPACE";
pub const ENV_LOG: &str = "RECORDBOOK_LOG";
const ENV_BACKEND: &str = "RECORDBOOK_BACKEND";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_ascii_lowercase().as_str() {
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    /// Only a teacher may read or change records, exchange CSV or touch backups.
    /// A student session carries no privileges; `results.view` needs no session.
    pub fn can_manage_records(self) -> bool {
        matches!(self, Role::Teacher)
    }

    fn env_prefix(self) -> &'static str {
        match self {
            Role::Teacher => "RECORDBOOK_TEACHER",
            Role::Student => "RECORDBOOK_STUDENT",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub teacher: Option<Credential>,
    pub student: Option<Credential>,
}

impl Credentials {
    pub fn for_role(&self, role: Role) -> Option<&Credential> {
        match role {
            Role::Teacher => self.teacher.as_ref(),
            Role::Student => self.student.as_ref(),
        }
    }

    fn slot(&mut self, role: Role) -> &mut Option<Credential> {
        match role {
            Role::Teacher => &mut self.teacher,
            Role::Student => &mut self.student,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginCheck {
    Accepted,
    Rejected,
    NotConfigured,
}

/// Contents of `recordbook.json` after environment overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceConfig {
    pub backend: Option<Backend>,
    pub credentials: Credentials,
}

impl WorkspaceConfig {
    pub fn check_login(&self, role: Role, username: &str, password: &str) -> LoginCheck {
        match self.credentials.for_role(role) {
            None => LoginCheck::NotConfigured,
            Some(c) if c.username == username && c.password == password => LoginCheck::Accepted,
            Some(_) => LoginCheck::Rejected,
        }
    }
}

pub fn load_workspace_config(workspace: &Path) -> anyhow::Result<WorkspaceConfig> {
    let mut cfg = read_config_file(workspace)?;
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

/// Environment-only settings, used before any workspace is selected.
pub fn env_config() -> anyhow::Result<WorkspaceConfig> {
    let mut cfg = WorkspaceConfig::default();
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

fn read_config_file(workspace: &Path) -> anyhow::Result<WorkspaceConfig> {
    let path = workspace.join(CONFIG_FILE_NAME);
    if !path.is_file() {
        return Ok(WorkspaceConfig::default());
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.to_string_lossy()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("config {} is invalid JSON", path.to_string_lossy()))
}

fn apply_env_overrides<F>(cfg: &mut WorkspaceConfig, get: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = get(ENV_BACKEND).filter(|v| !v.trim().is_empty()) {
        let backend = v
            .parse::<Backend>()
            .map_err(|e| anyhow::anyhow!("{ENV_BACKEND}: {e}"))?;
        cfg.backend = Some(backend);
    }

    for role in [Role::Teacher, Role::Student] {
        let prefix = role.env_prefix();
        let username = get(&format!("{prefix}_USERNAME"));
        let password = get(&format!("{prefix}_PASSWORD"));
        if username.is_none() && password.is_none() {
            continue;
        }
        let slot = cfg.credentials.slot(role);
        let mut cred = slot.take().unwrap_or_default();
        if let Some(u) = username {
            cred.username = u;
        }
        if let Some(p) = password {
            cred.password = p;
        }
        *slot = Some(cred);
    }
    Ok(())
}
