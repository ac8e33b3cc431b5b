use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{header::HeaderValue, Method};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::clinic::{
    Appointment, AppointmentStatus, AttendanceWindow, ClinicalRecord, Psychologist, SessionNote,
};

use crate::store::{BookingCommit, ClinicStore, RecurrenceCommit, StoreError, StoreResult};
use crate::supabase::SupabaseClient;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// `ClinicStore` over Supabase's PostgREST API. Multi-row units of work run inside the
/// SQL functions defined in `migrations/`, so each call is one database transaction.
pub struct SupabaseStore {
    supabase: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn select<T: DeserializeOwned>(&self, path: &str) -> StoreResult<Vec<T>> {
        let rows: Vec<Value> = self.supabase.request(Method::GET, path, None).await?;
        decode_rows(rows)
    }

    async fn select_one<T: DeserializeOwned>(&self, path: &str) -> StoreResult<Option<T>> {
        Ok(self.select(path).await?.into_iter().next())
    }

    async fn write<T: DeserializeOwned>(&self, method: Method, path: &str, body: Value) -> StoreResult<Vec<T>> {
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(method, path, Some(body), Some(SupabaseClient::return_representation()))
            .await?;
        decode_rows(rows)
    }
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> StoreResult<Vec<T>> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| StoreError::Decode(e.to_string()))
}

fn encode<T: serde::Serialize>(value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|e| StoreError::Decode(e.to_string()))
}

fn timestamp_param(value: NaiveDateTime) -> String {
    urlencoding::encode(&value.format(TIMESTAMP_FORMAT).to_string()).into_owned()
}

#[async_trait]
impl ClinicStore for SupabaseStore {
    async fn find_psychologist(&self, id: Uuid) -> StoreResult<Option<Psychologist>> {
        self.select_one(&format!("/rest/v1/psychologists?id=eq.{}", id)).await
    }

    async fn list_psychologists(&self) -> StoreResult<Vec<Psychologist>> {
        self.select("/rest/v1/psychologists?order=full_name.asc").await
    }

    async fn save_psychologist(&self, psychologist: Psychologist) -> StoreResult<Psychologist> {
        let mut headers = SupabaseClient::return_representation();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/psychologists?on_conflict=id",
                Some(encode(&psychologist)?),
                Some(headers),
            )
            .await?;

        decode_rows(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("upsert returned no rows".to_string()))
    }

    async fn attendance_windows(&self, psychologist_id: Uuid) -> StoreResult<Vec<AttendanceWindow>> {
        self.select(&format!(
            "/rest/v1/attendance_windows?psychologist_id=eq.{}&order=day_of_week.asc,start_time.asc",
            psychologist_id
        ))
        .await
    }

    async fn replace_attendance_windows(
        &self,
        psychologist_id: Uuid,
        windows: Vec<AttendanceWindow>,
    ) -> StoreResult<Vec<AttendanceWindow>> {
        debug!("Replacing {} attendance windows for {}", windows.len(), psychologist_id);

        let rows: Vec<Value> = self
            .supabase
            .request(
                Method::POST,
                "/rest/v1/rpc/replace_attendance_windows",
                Some(json!({
                    "p_psychologist_id": psychologist_id,
                    "p_windows": encode(&windows)?,
                })),
            )
            .await?;

        decode_rows(rows)
    }

    async fn find_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        self.select_one(&format!("/rest/v1/appointments?id=eq.{}", id)).await
    }

    async fn psychologist_appointments(
        &self,
        psychologist_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> StoreResult<Vec<Appointment>> {
        self.select(&format!(
            "/rest/v1/appointments?psychologist_id=eq.{}&scheduled_at=gte.{}&scheduled_at=lt.{}&order=scheduled_at.asc,created_at.asc",
            psychologist_id,
            timestamp_param(from),
            timestamp_param(to)
        ))
        .await
    }

    async fn patient_appointments(&self, patient_id: Uuid) -> StoreResult<Vec<Appointment>> {
        self.select(&format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=scheduled_at.asc,created_at.asc",
            patient_id
        ))
        .await
    }

    async fn psychologist_history(&self, psychologist_id: Uuid) -> StoreResult<Vec<Appointment>> {
        self.select(&format!(
            "/rest/v1/appointments?psychologist_id=eq.{}&order=scheduled_at.asc,created_at.asc",
            psychologist_id
        ))
        .await
    }

    async fn psychologist_patients(&self, psychologist_id: Uuid) -> StoreResult<Vec<Uuid>> {
        #[derive(serde::Deserialize)]
        struct PatientRow {
            patient_id: Uuid,
        }

        let rows: Vec<PatientRow> = self
            .select(&format!(
                "/rest/v1/appointments?psychologist_id=eq.{}&select=patient_id&order=patient_id.asc",
                psychologist_id
            ))
            .await?;

        let mut patients: Vec<Uuid> = rows.into_iter().map(|row| row.patient_id).collect();
        patients.dedup();
        Ok(patients)
    }

    async fn commit_booking(&self, commit: BookingCommit) -> StoreResult<Appointment> {
        let record = match &commit.clinical_record {
            Some(record) => encode(record)?,
            None => Value::Null,
        };

        let row: Value = self
            .supabase
            .request(
                Method::POST,
                "/rest/v1/rpc/book_appointment",
                Some(json!({
                    "p_appointment": encode(&commit.appointment)?,
                    "p_record": record,
                    "p_enforce_continuity": commit.enforce_continuity,
                })),
            )
            .await?;

        serde_json::from_value(row).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn update_appointment_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Appointment> {
        // Filtering on the expected status makes the PATCH a compare-and-set.
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", id, expected);
        let updated: Vec<Appointment> = self
            .write(
                Method::PATCH,
                &path,
                json!({ "status": next, "updated_at": updated_at }),
            )
            .await?;

        if let Some(appointment) = updated.into_iter().next() {
            return Ok(appointment);
        }

        match self.find_appointment(id).await? {
            Some(current) => Err(StoreError::StaleWrite(format!(
                "appointment {} is {} not {}",
                id, current.status, expected
            ))),
            None => Err(StoreError::NotFound(format!("appointment {}", id))),
        }
    }

    async fn find_clinical_record(
        &self,
        patient_id: Uuid,
        psychologist_id: Uuid,
    ) -> StoreResult<Option<ClinicalRecord>> {
        self.select_one(&format!(
            "/rest/v1/clinical_records?patient_id=eq.{}&psychologist_id=eq.{}",
            patient_id, psychologist_id
        ))
        .await
    }

    async fn ensure_clinical_record(&self, record: ClinicalRecord) -> StoreResult<ClinicalRecord> {
        let mut headers = SupabaseClient::return_representation();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=ignore-duplicates,return=representation"),
        );

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/clinical_records?on_conflict=patient_id,psychologist_id",
                Some(encode(&record)?),
                Some(headers),
            )
            .await?;

        if let Some(created) = decode_rows::<ClinicalRecord>(rows)?.into_iter().next() {
            return Ok(created);
        }

        // Duplicate ignored: the pair already had a chart.
        self.find_clinical_record(record.patient_id, record.psychologist_id)
            .await?
            .ok_or_else(|| StoreError::NotFound("clinical record vanished after upsert".to_string()))
    }

    async fn commit_recurrence(&self, commit: RecurrenceCommit) -> StoreResult<Vec<Appointment>> {
        let rows: Vec<Value> = self
            .supabase
            .request(
                Method::POST,
                "/rest/v1/rpc/generate_recurrence",
                Some(json!({
                    "p_record": encode(&commit.record)?,
                    "p_appointments": encode(&commit.appointments)?,
                })),
            )
            .await?;

        decode_rows(rows)
    }

    async fn append_session_note(&self, note: SessionNote) -> StoreResult<SessionNote> {
        self.write::<SessionNote>(Method::POST, "/rest/v1/session_notes", encode(&note)?)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no rows".to_string()))
    }

    async fn session_notes(&self, clinical_record_id: Uuid) -> StoreResult<Vec<SessionNote>> {
        self.select(&format!(
            "/rest/v1/session_notes?clinical_record_id=eq.{}&order=session_date.desc,created_at.desc",
            clinical_record_id
        ))
        .await
    }
}
