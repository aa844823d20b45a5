use std::fs;
use std::path::{Path, PathBuf};

use crate::attendance::domain::attendance_record::{AttendanceRecord, NewAttendance};
use crate::attendance::domain::record_store::{RecordStore, StoreError};
use crate::attendance::domain::session::{NewSession, Session};
use crate::attendance::infrastructure::memory_record_store::StoreDocument;

/// Store persisted as a single JSON document, rewritten after every change.
///
/// Intended for offline use on one machine; concurrent writers are not
/// coordinated.
pub struct JsonFileRecordStore {
    path: PathBuf,
    doc: StoreDocument,
}

impl JsonFileRecordStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let doc = if path.exists() {
            let json = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&json)?
        } else {
            StoreDocument::default()
        };
        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.doc)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl RecordStore for JsonFileRecordStore {
    fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        Ok(self.doc.list_sessions())
    }

    fn find_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.doc.find_session(id))
    }

    fn create_session(&mut self, session: NewSession) -> Result<Session, StoreError> {
        let created = self.doc.create_session(session);
        self.save()?;
        Ok(created)
    }

    fn delete_session(&mut self, id: &str) -> Result<(), StoreError> {
        self.doc.delete_session(id)?;
        self.save()
    }

    fn list_attendance(&self, session_id: &str) -> Result<Vec<AttendanceRecord>, StoreError> {
        Ok(self.doc.list_attendance(session_id))
    }

    fn all_attendance(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
        Ok(self.doc.all_attendance())
    }

    fn find_attendance(
        &self,
        session_id: &str,
        qr_content: &str,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self.doc.find_attendance(session_id, qr_content))
    }

    fn insert_attendance(&mut self, record: NewAttendance) -> Result<AttendanceRecord, StoreError> {
        let created = self.doc.insert_attendance(record)?;
        self.save()?;
        Ok(created)
    }
}
