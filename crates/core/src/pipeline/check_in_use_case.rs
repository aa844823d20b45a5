use chrono::{DateTime, Utc};

use crate::attendance::domain::attendance_record::{AttendanceRecord, NewAttendance};
use crate::attendance::domain::record_store::{RecordStore, StoreError};

#[derive(Clone, Debug, PartialEq)]
pub enum CheckInOutcome {
    Recorded(AttendanceRecord),
    /// The badge already has a record in this session; nothing was written.
    AlreadyCheckedIn,
}

/// Turns a scan event into an attendance record for one session.
///
/// The scanner's cooldown only suppresses back-to-back repeats; this is the
/// check that keeps a badge to one record per session.
pub struct CheckInUseCase {
    session_id: String,
}

impl CheckInUseCase {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn execute(
        &self,
        store: &mut dyn RecordStore,
        qr_content: &str,
        scanned_at: DateTime<Utc>,
    ) -> Result<CheckInOutcome, StoreError> {
        if store
            .find_attendance(&self.session_id, qr_content)?
            .is_some()
        {
            log::info!("Badge already checked in to session {}", self.session_id);
            return Ok(CheckInOutcome::AlreadyCheckedIn);
        }

        let record = store.insert_attendance(NewAttendance::from_scan(
            &self.session_id,
            qr_content,
            scanned_at,
        ))?;
        log::info!(
            "Checked in {} to session {}",
            record.student_name.as_deref().unwrap_or(&record.qr_content),
            self.session_id
        );
        Ok(CheckInOutcome::Recorded(record))
    }
}
