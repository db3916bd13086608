use super::{Backend, RecordStore, StoreError};
use crate::calc;
use crate::record::StudentRecord;
use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};

pub const FILE_NAME: &str = "records.sqlite3";

const SELECT_COLUMNS: &str = "admission_no, student_name, student_class, roll, father_name,
     marks_s1, marks_s2, marks_s3, marks_s4, marks_s5, marks_s6";

/// Relational backend. A connection is opened per operation and dropped when it returns.
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let conn = Connection::open(&path).map_err(|e| unavailable(&path, e))?;
        ensure_schema(&conn)?;
        Ok(Self { path })
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| unavailable(&self.path, e))
    }
}

fn unavailable(path: &Path, e: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(format!("{}: {e}", path.to_string_lossy()))
}

fn ensure_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_records(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            admission_no TEXT NOT NULL UNIQUE,
            student_name TEXT NOT NULL,
            student_class TEXT NOT NULL,
            roll INTEGER NOT NULL,
            father_name TEXT NOT NULL,
            marks_s1 INTEGER NOT NULL,
            marks_s2 INTEGER NOT NULL,
            marks_s3 INTEGER NOT NULL,
            marks_s4 INTEGER NOT NULL,
            marks_s5 INTEGER NOT NULL,
            marks_s6 INTEGER NOT NULL,
            total_marks INTEGER NOT NULL
        )",
        [],
    )?;

    // Databases created before edits were timestamped lack updated_at.
    if !table_has_column(conn, "student_records", "updated_at")? {
        conn.execute("ALTER TABLE student_records ADD COLUMN updated_at TEXT", [])?;
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, StoreError> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<StudentRecord> {
    let marks: [i64; calc::SUBJECT_COUNT] = [
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ];
    // Rows written outside this store are not validated on the way in.
    if calc::checked_total(&marks).is_none() {
        return Err(rusqlite::Error::IntegralValueOutOfRange(
            5,
            calc::total_marks(&marks),
        ));
    }
    Ok(StudentRecord {
        admission_no: row.get(0)?,
        student_name: row.get(1)?,
        student_class: row.get(2)?,
        roll: row.get(3)?,
        father_name: row.get(4)?,
        marks,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation
    )
}

impl RecordStore for SqliteStore {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn location(&self) -> &Path {
        &self.path
    }

    fn list(&self) -> Result<Vec<StudentRecord>, StoreError> {
        let conn = self.connect()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM student_records ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get(&self, admission_no: &str) -> Result<Option<StudentRecord>, StoreError> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM student_records WHERE admission_no = ? ORDER BY id LIMIT 1"
        );
        Ok(conn
            .query_row(&sql, [admission_no], row_to_record)
            .optional()?)
    }

    fn create(&mut self, record: &StudentRecord) -> Result<(), StoreError> {
        let conn = self.connect()?;
        let m = &record.marks;
        let res = conn.execute(
            "INSERT INTO student_records(
               admission_no,
               student_name,
               student_class,
               roll,
               father_name,
               marks_s1,
               marks_s2,
               marks_s3,
               marks_s4,
               marks_s5,
               marks_s6,
               total_marks,
               updated_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
            (
                &record.admission_no,
                &record.student_name,
                &record.student_class,
                record.roll,
                &record.father_name,
                m[0],
                m[1],
                m[2],
                m[3],
                m[4],
                m[5],
                record.total_marks(),
            ),
        );
        match res {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate {
                admission_no: record.admission_no.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn update(&mut self, record: &StudentRecord) -> Result<(), StoreError> {
        let conn = self.connect()?;
        let m = &record.marks;
        let changed = conn.execute(
            "UPDATE student_records SET
               student_name = ?,
               student_class = ?,
               roll = ?,
               father_name = ?,
               marks_s1 = ?,
               marks_s2 = ?,
               marks_s3 = ?,
               marks_s4 = ?,
               marks_s5 = ?,
               marks_s6 = ?,
               total_marks = ?,
               updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
             WHERE admission_no = ?",
            (
                &record.student_name,
                &record.student_class,
                record.roll,
                &record.father_name,
                m[0],
                m[1],
                m[2],
                m[3],
                m[4],
                m[5],
                record.total_marks(),
                &record.admission_no,
            ),
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                admission_no: record.admission_no.clone(),
            });
        }
        Ok(())
    }

    fn delete(&mut self, admission_no: &str) -> Result<bool, StoreError> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "DELETE FROM student_records WHERE admission_no = ?",
            [admission_no],
        )?;
        Ok(changed > 0)
    }
}
