use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::attendance::domain::attendance_record::{AttendanceRecord, NewAttendance};
use crate::attendance::domain::record_store::{RecordStore, StoreError};
use crate::attendance::domain::session::{NewSession, Session};

/// Full contents of a local store. Shared by the in-memory and file stores.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct StoreDocument {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    sessions: Vec<Session>,
    #[serde(default)]
    attendance: Vec<AttendanceRecord>,
}

impl StoreDocument {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    pub(crate) fn list_sessions(&self) -> Vec<Session> {
        // Reverse first so equal timestamps keep newest-inserted first.
        let mut sessions: Vec<Session> = self.sessions.iter().rev().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions
    }

    pub(crate) fn find_session(&self, id: &str) -> Option<Session> {
        self.sessions.iter().find(|s| s.id == id).cloned()
    }

    pub(crate) fn create_session(&mut self, session: NewSession) -> Session {
        let now = Utc::now();
        let created = Session {
            id: self.allocate_id("session"),
            name: session.name,
            description: session.description,
            created_at: now,
            updated_at: now,
        };
        self.sessions.push(created.clone());
        created
    }

    pub(crate) fn delete_session(&mut self, id: &str) -> Result<(), StoreError> {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        if self.sessions.len() == before {
            return Err(StoreError::SessionNotFound(id.to_string()));
        }
        self.attendance.retain(|r| r.session_id != id);
        Ok(())
    }

    pub(crate) fn list_attendance(&self, session_id: &str) -> Vec<AttendanceRecord> {
        newest_first(self.attendance.iter().filter(|r| r.session_id == session_id))
    }

    pub(crate) fn all_attendance(&self) -> Vec<AttendanceRecord> {
        newest_first(self.attendance.iter())
    }

    pub(crate) fn find_attendance(
        &self,
        session_id: &str,
        qr_content: &str,
    ) -> Option<AttendanceRecord> {
        self.attendance
            .iter()
            .find(|r| r.session_id == session_id && r.qr_content == qr_content)
            .cloned()
    }

    pub(crate) fn insert_attendance(
        &mut self,
        record: NewAttendance,
    ) -> Result<AttendanceRecord, StoreError> {
        if self.find_session(&record.session_id).is_none() {
            return Err(StoreError::SessionNotFound(record.session_id));
        }
        let created = AttendanceRecord {
            id: self.allocate_id("attendance"),
            session_id: record.session_id,
            qr_content: record.qr_content,
            scanned_at: record.scanned_at,
            student_name: record.student_name,
            student_id: record.student_id,
            additional_info: record.additional_info,
        };
        self.attendance.push(created.clone());
        Ok(created)
    }
}

fn newest_first<'a>(records: impl DoubleEndedIterator<Item = &'a AttendanceRecord>) -> Vec<AttendanceRecord> {
    let mut out: Vec<AttendanceRecord> = records.rev().cloned().collect();
    out.sort_by(|a, b| b.scanned_at.cmp(&a.scanned_at));
    out
}

/// Process-local store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    doc: StoreDocument,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        Ok(self.doc.list_sessions())
    }

    fn find_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.doc.find_session(id))
    }

    fn create_session(&mut self, session: NewSession) -> Result<Session, StoreError> {
        Ok(self.doc.create_session(session))
    }

    fn delete_session(&mut self, id: &str) -> Result<(), StoreError> {
        self.doc.delete_session(id)
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
        self.doc.insert_attendance(record)
    }
}
