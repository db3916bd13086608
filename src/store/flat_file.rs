use super::csv_codec::{decode_records, encode_records};
use super::{Backend, RecordStore, StoreError};
use crate::record::StudentRecord;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const FILE_NAME: &str = "records.csv";

/// Headered CSV file; every write rewrites the whole file.
pub struct FlatFileStore {
    path: PathBuf,
}

impl FlatFileStore {
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let store = Self { path };
        if !store.path.exists() {
            store.write_all(&[])?;
        }
        Ok(store)
    }

    fn read_all(&self) -> Result<Vec<StudentRecord>, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let (rows, errors) = decode_records(&text);
        if let Some(first) = errors.into_iter().next() {
            return Err(StoreError::Corrupt {
                line: first.line,
                message: first.message,
            });
        }
        Ok(rows.into_iter().map(|(_, r)| r).collect())
    }

    fn write_all(&self, records: &[StudentRecord]) -> Result<(), StoreError> {
        let tmp = tmp_path(&self.path);
        write_then_rename(&tmp, &self.path, encode_records(records).as_bytes())?;
        Ok(())
    }
}

/// Writes `bytes` to `tmp`, syncs it and renames it over `path`.
/// The temp file never outlives a failed attempt.
fn write_then_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let attempt = || -> std::io::Result<()> {
        let mut f = File::create(tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        drop(f);
        std::fs::rename(tmp, path)
    };
    attempt().map_err(|e| {
        let _ = std::fs::remove_file(tmp);
        e
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".writing");
    path.with_file_name(name)
}

impl RecordStore for FlatFileStore {
    fn backend(&self) -> Backend {
        Backend::Csv
    }

    fn location(&self) -> &Path {
        &self.path
    }

    fn list(&self) -> Result<Vec<StudentRecord>, StoreError> {
        self.read_all()
    }

    fn get(&self, admission_no: &str) -> Result<Option<StudentRecord>, StoreError> {
        Ok(self
            .read_all()?
            .into_iter()
            .find(|r| r.admission_no == admission_no))
    }

    fn create(&mut self, record: &StudentRecord) -> Result<(), StoreError> {
        let mut records = self.read_all()?;
        if records.iter().any(|r| r.admission_no == record.admission_no) {
            return Err(StoreError::Duplicate {
                admission_no: record.admission_no.clone(),
            });
        }
        records.push(record.clone());
        self.write_all(&records)
    }

    fn update(&mut self, record: &StudentRecord) -> Result<(), StoreError> {
        let mut records = self.read_all()?;
        let Some(slot) = records
            .iter_mut()
            .find(|r| r.admission_no == record.admission_no)
        else {
            return Err(StoreError::NotFound {
                admission_no: record.admission_no.clone(),
            });
        };
        *slot = record.clone();
        self.write_all(&records)
    }

    fn delete(&mut self, admission_no: &str) -> Result<bool, StoreError> {
        let records = self.read_all()?;
        let before = records.len();
        let kept: Vec<StudentRecord> = records
            .into_iter()
            .filter(|r| r.admission_no != admission_no)
            .collect();
        if kept.len() == before {
            return Ok(false);
        }
        self.write_all(&kept)?;
        Ok(true)
    }
}
