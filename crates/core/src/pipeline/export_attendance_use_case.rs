use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;

use crate::attendance::domain::attendance_record::AttendanceRecord;
use crate::attendance::domain::record_store::{RecordStore, StoreError};
use crate::shared::constants::MISSING_FIELD;

const HEADER: [&str; 5] = ["No", "Student ID", "Student Name", "QR Content", "Scanned At"];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes a session's attendance list to a CSV spreadsheet.
pub struct ExportAttendanceUseCase {
    offset: FixedOffset,
}

impl ExportAttendanceUseCase {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Exports into `output_dir` and returns the written file path.
    pub fn execute(
        &self,
        store: &dyn RecordStore,
        session_id: &str,
        output_dir: &Path,
        now: DateTime<Utc>,
    ) -> Result<PathBuf, ExportError> {
        let session = store
            .find_session(session_id)?
            .ok_or_else(|| ExportError::SessionNotFound(session_id.to_string()))?;
        let records = store.list_attendance(session_id)?;

        let path = output_dir.join(export_file_name(&session.name, now, self.offset));
        let write_err = |source| ExportError::Write {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(output_dir).map_err(write_err)?;
        fs::write(&path, self.render(&records)).map_err(write_err)?;

        log::info!("Exported {} records to {}", records.len(), path.display());
        Ok(path)
    }

    /// Renders records as CSV, one row per record in the given order.
    pub fn render(&self, records: &[AttendanceRecord]) -> String {
        let mut out = String::new();
        push_row(&mut out, HEADER.iter().map(|h| h.to_string()));
        for (i, record) in records.iter().enumerate() {
            let scanned_at = record
                .scanned_at
                .with_timezone(&self.offset)
                .format("%d/%m/%Y %H:%M:%S")
                .to_string();
            push_row(
                &mut out,
                [
                    (i + 1).to_string(),
                    or_missing(&record.student_id),
                    or_missing(&record.student_name),
                    record.qr_content.clone(),
                    scanned_at,
                ],
            );
        }
        out
    }
}

/// `attendance_<name>_<yyyy-mm-dd>.csv`, non-alphanumerics in the name as `_`.
pub fn export_file_name(session_name: &str, now: DateTime<Utc>, offset: FixedOffset) -> String {
    let safe: String = session_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let date = now.with_timezone(&offset).format("%Y-%m-%d");
    format!("attendance_{safe}_{date}.csv")
}

fn or_missing(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| MISSING_FIELD.to_string())
}

fn push_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    let row: Vec<String> = fields.into_iter().map(|f| escape(&f)).collect();
    out.push_str(&row.join(","));
    out.push('\n');
}

fn escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
