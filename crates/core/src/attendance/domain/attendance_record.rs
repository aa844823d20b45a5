use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One check-in of one badge into one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: String,
    pub session_id: String,
    pub qr_content: String,
    pub scanned_at: DateTime<Utc>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub additional_info: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewAttendance {
    pub session_id: String,
    pub qr_content: String,
    pub scanned_at: DateTime<Utc>,
    pub student_name: Option<String>,
    pub student_id: Option<String>,
    pub additional_info: Option<Value>,
}

impl NewAttendance {
    pub fn from_scan(session_id: &str, qr_content: &str, scanned_at: DateTime<Utc>) -> Self {
        let badge = BadgeInfo::parse(qr_content);
        Self {
            session_id: session_id.to_string(),
            qr_content: qr_content.to_string(),
            scanned_at,
            student_name: badge.name,
            student_id: badge.id,
            additional_info: badge.info,
        }
    }
}

/// Student details carried by a badge whose payload is a JSON object.
///
/// Plain-text payloads yield an empty `BadgeInfo`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BadgeInfo {
    pub name: Option<String>,
    pub id: Option<String>,
    pub info: Option<Value>,
}

impl BadgeInfo {
    pub fn parse(qr_content: &str) -> Self {
        let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(qr_content) else {
            return Self::default();
        };
        Self {
            name: fields.get("name").and_then(text_field),
            id: fields.get("id").and_then(text_field),
            info: fields.get("info").filter(|v| is_present(v)).cloned(),
        }
    }
}

fn text_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    }
}

/// Case-insensitive substring match on the raw QR content.
pub fn filter_records<'a>(records: &'a [AttendanceRecord], text: &str) -> Vec<&'a AttendanceRecord> {
    let needle = text.to_lowercase();
    records
        .iter()
        .filter(|r| r.qr_content.to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(qr: &str) -> AttendanceRecord {
        AttendanceRecord {
            id: qr.to_string(),
            session_id: "s1".into(),
            qr_content: qr.to_string(),
            scanned_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            student_name: None,
            student_id: None,
            additional_info: None,
        }
    }

    #[test]
    fn test_plain_text_badge_has_no_details() {
        assert_eq!(BadgeInfo::parse("SV2024-001"), BadgeInfo::default());
    }

    #[test]
    fn test_json_badge_extracts_fields() {
        let badge = BadgeInfo::parse(r#"{"name":"Lan","id":"B21","info":{"class":"K66"}}"#);
        assert_eq!(badge.name.as_deref(), Some("Lan"));
        assert_eq!(badge.id.as_deref(), Some("B21"));
        assert_eq!(badge.info, Some(json!({"class": "K66"})));
    }

    #[test]
    fn test_numeric_id_is_stringified() {
        let badge = BadgeInfo::parse(r#"{"id":20241234}"#);
        assert_eq!(badge.id.as_deref(), Some("20241234"));
        assert_eq!(badge.name, None);
    }

    #[test]
    fn test_empty_and_null_fields_are_ignored() {
        let badge = BadgeInfo::parse(r#"{"name":"","id":null,"info":false}"#);
        assert_eq!(badge, BadgeInfo::default());
    }

    #[test]
    fn test_json_array_is_not_a_badge() {
        assert_eq!(BadgeInfo::parse("[1,2,3]"), BadgeInfo::default());
    }

    #[test]
    fn test_new_attendance_from_scan_carries_badge() {
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let new = NewAttendance::from_scan("s9", r#"{"name":"Minh"}"#, at);
        assert_eq!(new.session_id, "s9");
        assert_eq!(new.student_name.as_deref(), Some("Minh"));
        assert_eq!(new.scanned_at, at);
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let records = vec![record("SV-001"), record("sv-002"), record("GV-100")];
        let hits = filter_records(&records, "sv");
        assert_eq!(hits.len(), 2);
        assert_eq!(filter_records(&records, "").len(), 3);
        assert!(filter_records(&records, "zzz").is_empty());
    }
}
