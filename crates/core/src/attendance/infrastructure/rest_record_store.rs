use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::attendance::domain::attendance_record::{AttendanceRecord, NewAttendance};
use crate::attendance::domain::record_store::{RecordStore, StoreError};
use crate::attendance::domain::session::{NewSession, Session};

const SESSIONS_TABLE: &str = "sessions";
const ATTENDANCE_TABLE: &str = "attendance";

/// Client for a hosted PostgREST database (`/rest/v1/<table>`).
///
/// Authenticates with the project's anon key, sent both as `apikey` and as
/// a bearer token. Cascading deletes are left to the database schema.
pub struct RestRecordStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestRecordStore {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn send(&self, url: &str, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = self
            .authorized(request)
            .send()
            .map_err(|source| StoreError::Http {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn fetch<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let url = self.table_url(table);
        let request = self.client.get(&url).query(&[("select", "*")]).query(query);
        let response = self.send(&url, request)?;
        let body = response.text().map_err(|source| StoreError::Http {
            url: url.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&body)?)
    }

    fn insert<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        row: &B,
    ) -> Result<T, StoreError> {
        let url = self.table_url(table);
        let request = self
            .client
            .post(&url)
            .header("Prefer", "return=representation")
            .json(&[row]);
        let response = self.send(&url, request)?;
        let body = response.text().map_err(|source| StoreError::Http {
            url: url.clone(),
            source,
        })?;
        let rows: Vec<T> = serde_json::from_str(&body)?;
        rows.into_iter().next().ok_or(StoreError::EmptyInsert)
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

impl RecordStore for RestRecordStore {
    fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        self.fetch(SESSIONS_TABLE, &[("order", "created_at.desc".to_string())])
    }

    fn find_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let rows: Vec<Session> = self.fetch(SESSIONS_TABLE, &[("id", eq(id))])?;
        Ok(rows.into_iter().next())
    }

    fn create_session(&mut self, session: NewSession) -> Result<Session, StoreError> {
        log::debug!("Creating session '{}'", session.name);
        self.insert(SESSIONS_TABLE, &session)
    }

    fn delete_session(&mut self, id: &str) -> Result<(), StoreError> {
        let url = self.table_url(SESSIONS_TABLE);
        let request = self.client.delete(&url).query(&[("id", eq(id))]);
        self.send(&url, request)?;
        Ok(())
    }

    fn list_attendance(&self, session_id: &str) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.fetch(
            ATTENDANCE_TABLE,
            &[
                ("session_id", eq(session_id)),
                ("order", "scanned_at.desc".to_string()),
            ],
        )
    }

    fn all_attendance(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.fetch(ATTENDANCE_TABLE, &[("order", "scanned_at.desc".to_string())])
    }

    fn find_attendance(
        &self,
        session_id: &str,
        qr_content: &str,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let rows: Vec<AttendanceRecord> = self.fetch(
            ATTENDANCE_TABLE,
            &[
                ("session_id", eq(session_id)),
                ("qr_content", eq(qr_content)),
                ("limit", "1".to_string()),
            ],
        )?;
        Ok(rows.into_iter().next())
    }

    fn insert_attendance(&mut self, record: NewAttendance) -> Result<AttendanceRecord, StoreError> {
        self.insert(ATTENDANCE_TABLE, &record)
    }
}
