use crate::record::{RecordInput, StudentRecord};

/// Column order of the flat-file format.
pub const HEADERS: [&str; 12] = [
    "admission_no",
    "student_name",
    "student_class",
    "roll",
    "father_name",
    "marks_s1",
    "marks_s2",
    "marks_s3",
    "marks_s4",
    "marks_s5",
    "marks_s6",
    "total_marks",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRowError {
    pub line: usize,
    pub code: &'static str,
    pub message: String,
}

impl CsvRowError {
    fn new(line: usize, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            line,
            code,
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "line": self.line,
            "code": self.code,
            "message": self.message,
        })
    }
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn encode_row(out: &mut String, fields: &[String]) {
    let line = fields
        .iter()
        .map(|f| csv_quote(f))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push('\n');
}

/// Header line followed by one line per record; the total column is always derived.
pub fn encode_records(records: &[StudentRecord]) -> String {
    let mut out = String::new();
    encode_row(
        &mut out,
        &HEADERS.iter().map(|h| h.to_string()).collect::<Vec<_>>(),
    );
    for r in records {
        let mut fields = vec![
            r.admission_no.clone(),
            r.student_name.clone(),
            r.student_class.clone(),
            r.roll.to_string(),
            r.father_name.clone(),
        ];
        fields.extend(r.marks.iter().map(|m| m.to_string()));
        fields.push(r.total_marks().to_string());
        encode_row(&mut out, &fields);
    }
    out
}

/// Splits text into rows of fields. Quoted fields may span lines.
/// Each row carries the 1-based line it started on.
fn split_rows(text: &str) -> Vec<(usize, Vec<String>)> {
    let mut rows: Vec<(usize, Vec<String>)> = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut row_start = 1usize;
    let mut row_has_content = false;

    let chars: Vec<char> = text.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '"' {
            if in_quotes && i + 1 < chars.len() && chars[i + 1] == '"' {
                buf.push('"');
                i += 2;
                continue;
            }
            in_quotes = !in_quotes;
            row_has_content = true;
            i += 1;
            continue;
        }
        if in_quotes {
            if ch == '\n' {
                line += 1;
            }
            buf.push(ch);
            i += 1;
            continue;
        }
        match ch {
            ',' => {
                fields.push(std::mem::take(&mut buf));
                row_has_content = true;
            }
            '\r' if i + 1 < chars.len() && chars[i + 1] == '\n' => {}
            '\n' | '\r' => {
                if row_has_content || !buf.trim().is_empty() {
                    fields.push(std::mem::take(&mut buf));
                    rows.push((row_start, std::mem::take(&mut fields)));
                }
                buf.clear();
                row_has_content = false;
                line += 1;
                row_start = line;
            }
            _ => {
                buf.push(ch);
                if !ch.is_whitespace() {
                    row_has_content = true;
                }
            }
        }
        i += 1;
    }
    if row_has_content || !buf.trim().is_empty() {
        fields.push(buf);
        rows.push((row_start, fields));
    }
    rows
}

fn decode_row(line: usize, fields: &[String]) -> Result<StudentRecord, CsvRowError> {
    if fields.len() != HEADERS.len() {
        return Err(CsvRowError::new(
            line,
            "bad_columns",
            format!("expected {} columns, found {}", HEADERS.len(), fields.len()),
        ));
    }

    let input = RecordInput {
        admission_no: fields[0].clone(),
        student_name: fields[1].clone(),
        student_class: fields[2].clone(),
        roll: fields[3].clone(),
        father_name: fields[4].clone(),
        marks: std::array::from_fn(|i| fields[5 + i].clone()),
    };
    let record = input
        .parse()
        .map_err(|e| CsvRowError::new(line, "validation_failed", e.to_string()))?;

    let stored_total = fields[11].trim();
    if !stored_total.is_empty() {
        let total: i64 = stored_total.parse().map_err(|_| {
            CsvRowError::new(
                line,
                "validation_failed",
                format!("total_marks must be an integer (got {stored_total:?})"),
            )
        })?;
        if total != record.total_marks() {
            tracing::warn!(
                line,
                admission_no = %record.admission_no,
                stored = total,
                derived = record.total_marks(),
                "stored total_marks disagrees with subject marks; using derived total"
            );
        }
    }
    Ok(record)
}

/// Decodes a flat-file document. Rows that fail are reported and left out;
/// a bad header yields no rows at all.
pub fn decode_records(text: &str) -> (Vec<(usize, StudentRecord)>, Vec<CsvRowError>) {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows = split_rows(text).into_iter();

    let Some((header_line, header)) = rows.next() else {
        return (Vec::new(), Vec::new());
    };
    let header_ok = header.len() == HEADERS.len()
        && header.iter().zip(HEADERS.iter()).all(|(a, b)| a.trim() == *b);
    if !header_ok {
        return (
            Vec::new(),
            vec![CsvRowError::new(
                header_line,
                "bad_header",
                format!("expected header {}", HEADERS.join(",")),
            )],
        );
    }

    let mut records = Vec::new();
    let mut errors = Vec::new();
    for (line, fields) in rows {
        match decode_row(line, &fields) {
            Ok(r) => records.push((line, r)),
            Err(e) => errors.push(e),
        }
    }
    (records, errors)
}
