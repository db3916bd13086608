use crate::config::{LoginCheck, Role};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::require_param;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let role = match require_param(req, "role") {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let Some(role) = Role::parse(&role) else {
        return err(
            &req.id,
            "bad_params",
            "role must be teacher or student",
            None,
        );
    };
    // Credentials are compared verbatim; whitespace is significant in passwords.
    let username = req
        .params
        .get("username")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let password = req
        .params
        .get("password")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    match state.config.check_login(role, username, password) {
        LoginCheck::Accepted => {
            state.role = Some(role);
            tracing::info!(role = role.as_str(), "session opened");
            ok(
                &req.id,
                json!({
                    "role": role.as_str(),
                    "canManageRecords": role.can_manage_records(),
                }),
            )
        }
        LoginCheck::Rejected => {
            tracing::debug!(role = role.as_str(), "login rejected");
            err(&req.id, "invalid_credentials", "invalid credentials", None)
        }
        LoginCheck::NotConfigured => err(
            &req.id,
            "auth_not_configured",
            format!("no credentials configured for role {}", role.as_str()),
            None,
        ),
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.role = None;
    ok(&req.id, json!({ "role": null, "canManageRecords": false }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.login" => Some(handle_login(state, req)),
        "session.logout" => Some(handle_logout(state, req)),
        _ => None,
    }
}
