use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// An instructor-created roll call that attendance records belong to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a session; the store fills in the rest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub name: String,
    pub description: Option<String>,
}

impl NewSession {
    /// Builds a session named `"<name> - dd/mm/yyyy HH:MM"` at `now` in `offset`.
    ///
    /// A blank description is treated as absent.
    pub fn stamped(
        name: &str,
        description: Option<&str>,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            name: session_display_name(name, now, offset),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        }
    }
}

pub fn session_display_name(name: &str, now: DateTime<Utc>, offset: FixedOffset) -> String {
    let local = now.with_timezone(&offset);
    format!("{} - {}", name.trim(), local.format("%d/%m/%Y %H:%M"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc7() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    #[test]
    fn test_display_name_uses_local_offset() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 20, 5, 0).unwrap();
        // 20:05 UTC is 03:05 next day at UTC+7.
        assert_eq!(
            session_display_name("  Networks lab ", now, utc7()),
            "Networks lab - 10/03/2024 03:05"
        );
    }

    #[test]
    fn test_stamped_drops_blank_description() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let session = NewSession::stamped("Algebra", Some("   "), now, utc7());
        assert_eq!(session.description, None);

        let session = NewSession::stamped("Algebra", Some(" Week 1 "), now, utc7());
        assert_eq!(session.description.as_deref(), Some("Week 1"));
        assert_eq!(session.name, "Algebra - 01/01/2024 07:00");
    }

    #[test]
    fn test_session_json_round_trip_omits_missing_description() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let session = Session {
            id: "s1".into(),
            name: "Algebra".into(),
            description: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("description"));
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
