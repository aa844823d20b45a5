use std::path::PathBuf;

use thiserror::Error;

use crate::attendance::domain::attendance_record::{AttendanceRecord, NewAttendance};
use crate::attendance::domain::session::{NewSession, Session};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access store file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed store data: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("store rejected request ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("store returned no row for insert")]
    EmptyInsert,
}

/// Create/read/delete access to sessions and attendance records.
///
/// Listing operations return newest first.
pub trait RecordStore: Send {
    fn list_sessions(&self) -> Result<Vec<Session>, StoreError>;

    fn find_session(&self, id: &str) -> Result<Option<Session>, StoreError>;

    fn create_session(&mut self, session: NewSession) -> Result<Session, StoreError>;

    /// Deletes the session together with its attendance records.
    fn delete_session(&mut self, id: &str) -> Result<(), StoreError>;

    fn list_attendance(&self, session_id: &str) -> Result<Vec<AttendanceRecord>, StoreError>;

    fn all_attendance(&self) -> Result<Vec<AttendanceRecord>, StoreError>;

    fn find_attendance(
        &self,
        session_id: &str,
        qr_content: &str,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    fn insert_attendance(&mut self, record: NewAttendance) -> Result<AttendanceRecord, StoreError>;
}
