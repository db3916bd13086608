mod backup;
mod calc;
mod config;
mod ipc;
mod record;
mod store;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    // stdout carries the protocol, so logs go to stderr.
    let filter = EnvFilter::try_from_env(config::ENV_LOG).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

fn initial_state() -> ipc::AppState {
    // Before a workspace is selected only environment credentials apply.
    let env_config = config::env_config().unwrap_or_else(|e| {
        tracing::warn!(error = %format!("{e:#}"), "ignoring invalid environment config");
        config::WorkspaceConfig::default()
    });
    let mut state = ipc::AppState::new(env_config);

    if let Some(path) = std::env::var_os(config::ENV_WORKSPACE).filter(|p| !p.is_empty()) {
        let path = PathBuf::from(path);
        match ipc::open_workspace(&mut state, path.clone(), None) {
            Ok(backend) => tracing::info!(
                path = %path.display(),
                backend = %backend,
                "workspace opened from environment"
            ),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "could not open workspace from environment"
            ),
        }
    }
    state
}

fn main() {
    init_logging();
    let mut state = initial_state();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "unparseable request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
