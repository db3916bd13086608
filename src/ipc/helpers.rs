use crate::calc::SUBJECT_COUNT;
use crate::config::Role;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::record::RecordInput;
use crate::store::RecordStore;
use serde_json::Value;

/// Non-empty, trimmed string param.
pub fn str_param(req: &Request, name: &str) -> Option<String> {
    req.params
        .get(name)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn require_param(req: &Request, name: &str) -> Result<String, Value> {
    str_param(req, name).ok_or_else(|| err(&req.id, "bad_params", format!("missing {name}"), None))
}

pub fn require_teacher(state: &AppState, req: &Request) -> Result<(), Value> {
    if state.role.is_some_and(Role::can_manage_records) {
        Ok(())
    } else {
        Err(err(
            &req.id,
            "auth_required",
            "teacher login required",
            None,
        ))
    }
}

pub fn require_store<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a mut Box<dyn RecordStore>, Value> {
    match state.store.as_mut() {
        Some(store) => Ok(store),
        None => Err(err(&req.id, "no_workspace", "select a workspace first", None)),
    }
}

/// Form text for a field: strings as typed, integers as their digits, missing as empty.
fn field_text(obj: &serde_json::Map<String, Value>, key: &str) -> Result<String, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(format!("{key} must be a string or number")),
    }
}

pub fn record_input(req: &Request) -> Result<RecordInput, Value> {
    let bad = |msg: String| err(&req.id, "bad_params", msg, None);

    let Some(obj) = req.params.get("record").and_then(|v| v.as_object()) else {
        return Err(bad("missing record".to_string()));
    };

    let marks_raw = match obj.get("marks") {
        Some(Value::Array(a)) if a.len() == SUBJECT_COUNT => a,
        Some(Value::Array(a)) => {
            return Err(bad(format!(
                "marks must have {SUBJECT_COUNT} entries, got {}",
                a.len()
            )))
        }
        _ => return Err(bad("missing marks".to_string())),
    };
    let mut marks: [String; SUBJECT_COUNT] = Default::default();
    for (i, v) in marks_raw.iter().enumerate() {
        marks[i] = match v {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Null => String::new(),
            _ => return Err(bad(format!("marks[{i}] must be a string or number"))),
        };
    }

    Ok(RecordInput {
        admission_no: field_text(obj, "admissionNo").map_err(bad)?,
        student_name: field_text(obj, "studentName").map_err(bad)?,
        student_class: field_text(obj, "studentClass").map_err(bad)?,
        roll: field_text(obj, "roll").map_err(bad)?,
        father_name: field_text(obj, "fatherName").map_err(bad)?,
        marks,
    })
}
