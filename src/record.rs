use crate::calc::{self, SUBJECT_COUNT};
use std::num::ParseIntError;

/// Column names of the numeric mark fields, in storage order.
pub const MARK_FIELDS: [&str; SUBJECT_COUNT] = [
    "marks_s1", "marks_s2", "marks_s3", "marks_s4", "marks_s5", "marks_s6",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    pub admission_no: String,
    pub student_name: String,
    pub student_class: String,
    pub roll: i64,
    pub father_name: String,
    pub marks: [i64; SUBJECT_COUNT],
}

impl StudentRecord {
    /// Always derived from the marks; there is no way to set it directly.
    pub fn total_marks(&self) -> i64 {
        calc::total_marks(&self.marks)
    }

    pub fn percentage(&self) -> f64 {
        calc::display_percentage(self.total_marks())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "admissionNo": self.admission_no,
            "studentName": self.student_name,
            "studentClass": self.student_class,
            "roll": self.roll,
            "fatherName": self.father_name,
            "marks": self.marks,
            "totalMarks": self.total_marks(),
            "percentage": self.percentage(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("admission number must not be empty")]
    EmptyAdmissionNo,
    #[error("{field} must be an integer (got {value:?}): {source}")]
    NotAnInteger {
        field: &'static str,
        value: String,
        source: ParseIntError,
    },
    #[error("sum of the subject marks is out of range for total_marks")]
    TotalOutOfRange,
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::EmptyAdmissionNo => "admission_no",
            ValidationError::NotAnInteger { field, .. } => *field,
            ValidationError::TotalOutOfRange => "total_marks",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            ValidationError::EmptyAdmissionNo | ValidationError::TotalOutOfRange => "",
            ValidationError::NotAnInteger { value, .. } => value,
        }
    }
}

/// Field values exactly as the form collected them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordInput {
    pub admission_no: String,
    pub student_name: String,
    pub student_class: String,
    pub roll: String,
    pub father_name: String,
    pub marks: [String; SUBJECT_COUNT],
}

impl RecordInput {
    /// Parses every numeric field up front so a bad value never reaches a store.
    pub fn parse(&self) -> Result<StudentRecord, ValidationError> {
        let admission_no = self.admission_no.trim().to_string();
        if admission_no.is_empty() {
            return Err(ValidationError::EmptyAdmissionNo);
        }

        let roll = parse_int("roll", &self.roll)?;
        let mut marks = [0i64; SUBJECT_COUNT];
        for (i, raw) in self.marks.iter().enumerate() {
            marks[i] = parse_int(MARK_FIELDS[i], raw)?;
        }
        if calc::checked_total(&marks).is_none() {
            return Err(ValidationError::TotalOutOfRange);
        }

        Ok(StudentRecord {
            admission_no,
            student_name: self.student_name.trim().to_string(),
            student_class: self.student_class.trim().to_string(),
            roll,
            father_name: self.father_name.trim().to_string(),
            marks,
        })
    }
}

pub fn parse_int(field: &'static str, raw: &str) -> Result<i64, ValidationError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|source| ValidationError::NotAnInteger {
            field,
            value: raw.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asha() -> RecordInput {
        RecordInput {
            admission_no: "A1".into(),
            student_name: "Asha".into(),
            student_class: "10".into(),
            roll: "5".into(),
            father_name: "Ram".into(),
            marks: ["80", "70", "90", "60", "85", "75"].map(String::from),
        }
    }

    #[test]
    fn parse_derives_total_and_percentage() {
        let rec = asha().parse().expect("valid input");
        assert_eq!(rec.roll, 5);
        assert_eq!(rec.marks, [80, 70, 90, 60, 85, 75]);
        assert_eq!(rec.total_marks(), 460);
        assert!((rec.percentage() - 76.67).abs() < 1e-9);
    }

    #[test]
    fn parse_trims_text_and_accepts_padded_numbers() {
        let mut input = asha();
        input.admission_no = "  A1 ".into();
        input.student_name = " Asha ".into();
        input.roll = " +5 ".into();
        input.marks[0] = " 80\t".into();
        let rec = input.parse().expect("valid input");
        assert_eq!(rec.admission_no, "A1");
        assert_eq!(rec.student_name, "Asha");
        assert_eq!(rec.roll, 5);
        assert_eq!(rec.marks[0], 80);
    }

    #[test]
    fn non_numeric_mark_names_the_field() {
        let mut input = asha();
        input.marks[3] = "sixty".into();
        let e = input.parse().expect_err("should reject");
        assert_eq!(e.field(), "marks_s4");
        assert_eq!(e.value(), "sixty");
        assert!(e.to_string().contains("marks_s4"));
    }

    #[test]
    fn empty_roll_is_rejected() {
        let mut input = asha();
        input.roll = "".into();
        let e = input.parse().expect_err("should reject");
        assert_eq!(e.field(), "roll");
    }

    #[test]
    fn blank_admission_no_is_rejected() {
        let mut input = asha();
        input.admission_no = "   ".into();
        assert_eq!(input.parse(), Err(ValidationError::EmptyAdmissionNo));
    }

    #[test]
    fn overflowing_total_is_rejected() {
        let mut input = asha();
        input.marks = ["9223372036854775807", "1", "0", "0", "0", "0"].map(String::from);
        let e = input.parse().expect_err("should reject");
        assert_eq!(e, ValidationError::TotalOutOfRange);
        assert_eq!(e.field(), "total_marks");

        input.marks[1] = "-1".into();
        let rec = input.parse().expect("fits");
        assert_eq!(rec.total_marks(), i64::MAX - 1);
    }

    #[test]
    fn json_carries_derived_fields() {
        let rec = asha().parse().expect("valid input");
        let v = rec.to_json();
        assert_eq!(v["admissionNo"], "A1");
        assert_eq!(v["totalMarks"], 460);
        assert_eq!(v["marks"].as_array().map(|a| a.len()), Some(SUBJECT_COUNT));
    }
}
