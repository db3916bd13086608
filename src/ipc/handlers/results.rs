use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{require_param, require_store};
use crate::ipc::types::{AppState, Request};
use crate::record::StudentRecord;
use serde_json::json;

fn result_card(record: &StudentRecord) -> serde_json::Value {
    let subjects: Vec<serde_json::Value> = record
        .marks
        .iter()
        .enumerate()
        .map(|(i, m)| json!({ "subject": i + 1, "marks": m }))
        .collect();
    json!({
        "studentName": record.student_name,
        "studentClass": record.student_class,
        "admissionNo": record.admission_no,
        "fatherName": record.father_name,
        "subjects": subjects,
        "totalMarks": record.total_marks(),
        "percentage": record.percentage(),
    })
}

/// Student lookup: the name and admission number together act as the login.
fn handle_results_view(state: &mut AppState, req: &Request) -> serde_json::Value {
    let admission_no = match require_param(req, "admissionNo") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_name = req
        .params
        .get("studentName")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let session_role = state.role;
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match store.get(&admission_no) {
        Ok(Some(record)) if record.student_name == student_name => {
            tracing::debug!(
                admission_no = %admission_no,
                session = session_role.map_or("none", |r| r.as_str()),
                "result card served"
            );
            ok(&req.id, result_card(&record))
        }
        // Unknown key and wrong name look the same to the caller.
        Ok(_) => err(&req.id, "invalid_credentials", "invalid credentials", None),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.view" => Some(handle_results_view(state, req)),
        _ => None,
    }
}
