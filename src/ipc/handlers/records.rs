use crate::ipc::error::{err, ok, store_err, validation_err};
use crate::ipc::helpers::{record_input, require_param, require_store, require_teacher};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_records_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match store.list() {
        Ok(records) => {
            let records: Vec<serde_json::Value> = records.iter().map(|r| r.to_json()).collect();
            ok(&req.id, json!({ "records": records }))
        }
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_records_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let admission_no = match require_param(req, "admissionNo") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match store.get(&admission_no) {
        Ok(Some(record)) => ok(&req.id, json!({ "record": record.to_json() })),
        Ok(None) => err(
            &req.id,
            "not_found",
            "record not found",
            Some(json!({ "admissionNo": admission_no })),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_records_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let input = match record_input(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let record = match input.parse() {
        Ok(r) => r,
        Err(e) => return validation_err(&req.id, &e),
    };
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    if let Err(e) = store.create(&record) {
        return store_err(&req.id, &e);
    }
    tracing::info!(admission_no = %record.admission_no, "record created");
    ok(&req.id, json!({ "record": record.to_json() }))
}

fn handle_records_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let admission_no = match require_param(req, "admissionNo") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mut input = match record_input(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    // The key is immutable; whatever the form sent for it is ignored.
    input.admission_no = admission_no;
    let record = match input.parse() {
        Ok(r) => r,
        Err(e) => return validation_err(&req.id, &e),
    };
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    if let Err(e) = store.update(&record) {
        return store_err(&req.id, &e);
    }
    tracing::info!(admission_no = %record.admission_no, "record updated");
    ok(&req.id, json!({ "record": record.to_json() }))
}

fn handle_records_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let admission_no = match require_param(req, "admissionNo") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match store.delete(&admission_no) {
        Ok(true) => {
            tracing::info!(admission_no = %admission_no, "record deleted");
            ok(&req.id, json!({ "deleted": true, "admissionNo": admission_no }))
        }
        Ok(false) => err(
            &req.id,
            "not_found",
            "record not found",
            Some(json!({ "admissionNo": admission_no })),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: fn(&mut AppState, &Request) -> serde_json::Value = match req.method.as_str() {
        "records.list" => handle_records_list,
        "records.get" => handle_records_get,
        "records.create" => handle_records_create,
        "records.update" => handle_records_update,
        "records.delete" => handle_records_delete,
        _ => return None,
    };
    if let Err(resp) = require_teacher(state, req) {
        return Some(resp);
    }
    Some(handler(state, req))
}
