use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};

use crate::attendance::domain::record_store::{RecordStore, StoreError};
use crate::attendance::domain::session::Session;
use crate::shared::constants::RECENT_SESSIONS_LIMIT;

#[derive(Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub session: Session,
    pub attendance_count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AttendanceStats {
    pub total_sessions: usize,
    pub total_attendance: usize,
    /// Records scanned on the current calendar day in the display offset.
    pub today_attendance: usize,
    /// Rounded to the nearest whole attendee; 0 when there are no sessions.
    pub average_per_session: usize,
    /// Newest sessions first.
    pub recent_sessions: Vec<SessionSummary>,
}

/// Aggregates store-wide attendance figures.
pub struct StatisticsUseCase {
    offset: FixedOffset,
}

impl StatisticsUseCase {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn execute(
        &self,
        store: &dyn RecordStore,
        now: DateTime<Utc>,
    ) -> Result<AttendanceStats, StoreError> {
        let sessions = store.list_sessions()?;
        let attendance = store.all_attendance()?;

        let today = now.with_timezone(&self.offset).date_naive();
        let today_attendance = attendance
            .iter()
            .filter(|r| r.scanned_at.with_timezone(&self.offset).date_naive() == today)
            .count();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in &attendance {
            *counts.entry(record.session_id.as_str()).or_default() += 1;
        }

        let recent_sessions = sessions
            .iter()
            .take(RECENT_SESSIONS_LIMIT)
            .map(|s| SessionSummary {
                session: s.clone(),
                attendance_count: counts.get(s.id.as_str()).copied().unwrap_or(0),
            })
            .collect();

        Ok(AttendanceStats {
            total_sessions: sessions.len(),
            total_attendance: attendance.len(),
            today_attendance,
            average_per_session: rounded_average(attendance.len(), sessions.len()),
            recent_sessions,
        })
    }
}

fn rounded_average(total: usize, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    (total + count / 2) / count
}
