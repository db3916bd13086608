use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_recordbookd");
    let mut child = Command::new(exe)
        .env_remove("RECORDBOOK_WORKSPACE")
        .env_remove("RECORDBOOK_BACKEND")
        .env("RECORDBOOK_TEACHER_USERNAME", "t")
        .env("RECORDBOOK_TEACHER_PASSWORD", "p")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn recordbookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn error_code(resp: &serde_json::Value) -> &str {
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn student_sees_their_result_card_without_a_session() {
    for backend in ["csv", "sqlite"] {
        let workspace = temp_dir(&format!("recordbook-results-{backend}"));
        let (mut child, mut stdin, mut reader) = spawn_sidecar();

        let resp = request(
            &mut stdin,
            &mut reader,
            "0",
            "results.view",
            json!({ "admissionNo": "A1", "studentName": "Asha" }),
        );
        assert_eq!(error_code(&resp), "no_workspace");

        request(
            &mut stdin,
            &mut reader,
            "1",
            "workspace.select",
            json!({ "path": workspace.to_string_lossy(), "backend": backend }),
        );
        request(
            &mut stdin,
            &mut reader,
            "2",
            "session.login",
            json!({ "role": "teacher", "username": "t", "password": "p" }),
        );
        let created = request(
            &mut stdin,
            &mut reader,
            "3",
            "records.create",
            json!({ "record": {
                "admissionNo": "A1",
                "studentName": "Asha",
                "studentClass": "10",
                "roll": "5",
                "fatherName": "Ram",
                "marks": ["80", "70", "90", "60", "85", "75"]
            }}),
        );
        assert_eq!(created["ok"], true, "{}", created);
        request(&mut stdin, &mut reader, "4", "session.logout", json!({}));

        let card = request(
            &mut stdin,
            &mut reader,
            "5",
            "results.view",
            json!({ "admissionNo": "A1", "studentName": "Asha" }),
        );
        assert_eq!(card["ok"], true, "{}", card);
        let card = &card["result"];
        assert_eq!(card["studentName"], "Asha");
        assert_eq!(card["studentClass"], "10");
        assert_eq!(card["admissionNo"], "A1");
        assert_eq!(card["fatherName"], "Ram");
        let subjects = card["subjects"].as_array().expect("subjects");
        assert_eq!(subjects.len(), 6);
        assert_eq!(subjects[0], json!({ "subject": 1, "marks": 80 }));
        assert_eq!(subjects[5], json!({ "subject": 6, "marks": 75 }));
        assert_eq!(card["totalMarks"], 460);
        let pct = card["percentage"].as_f64().expect("percentage");
        assert!((pct - 76.67).abs() < 1e-9, "percentage {}", pct);

        let resp = request(
            &mut stdin,
            &mut reader,
            "6",
            "results.view",
            json!({ "admissionNo": "A1", "studentName": "Asha K" }),
        );
        assert_eq!(error_code(&resp), "invalid_credentials");

        let resp = request(
            &mut stdin,
            &mut reader,
            "7",
            "results.view",
            json!({ "admissionNo": "ZZ", "studentName": "Asha" }),
        );
        assert_eq!(error_code(&resp), "invalid_credentials");

        let resp = request(
            &mut stdin,
            &mut reader,
            "8",
            "results.view",
            json!({ "studentName": "Asha" }),
        );
        assert_eq!(error_code(&resp), "bad_params");

        drop(stdin);
        let _ = child.wait();
        let _ = std::fs::remove_dir_all(workspace);
    }
}
