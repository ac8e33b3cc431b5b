use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// PSYCHOLOGISTS AND ATTENDANCE WINDOWS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Psychologist {
    pub id: Uuid,
    pub full_name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceWindow {
    pub id: Uuid,
    pub psychologist_id: Uuid,
    pub day_of_week: u8, // 0 = Monday ... 6 = Sunday
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub active: bool,
}

impl AttendanceWindow {
    pub fn new(psychologist_id: Uuid, day_of_week: u8, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            psychologist_id,
            day_of_week,
            start_time,
            end_time,
            active: true,
        }
    }
}

/// Day-of-week index used by attendance windows and recurrences (Monday = 0).
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Scheduled and confirmed appointments hold their slot.
    pub fn occupies_slot(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub psychologist_id: Uuid,
    pub scheduled_at: NaiveDateTime,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn scheduled(
        patient_id: Uuid,
        psychologist_id: Uuid,
        scheduled_at: NaiveDateTime,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            psychologist_id,
            scheduled_at,
            status: AppointmentStatus::Scheduled,
            notes,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.scheduled_at.date()
    }

    pub fn time(&self) -> NaiveTime {
        self.scheduled_at.time()
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.patient_id == user_id || self.psychologist_id == user_id
    }
}

// ==============================================================================
// CLINICAL RECORDS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub psychologist_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub general_notes: Option<String>,
    pub recurrence_enabled: bool,
    pub recurrence_day_of_week: Option<u8>,
    pub recurrence_time: Option<NaiveTime>,
}

impl ClinicalRecord {
    pub fn open(
        patient_id: Uuid,
        psychologist_id: Uuid,
        general_notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            psychologist_id,
            created_at,
            general_notes,
            recurrence_enabled: false,
            recurrence_day_of_week: None,
            recurrence_time: None,
        }
    }

    pub fn belongs_to(&self, patient_id: Uuid, psychologist_id: Uuid) -> bool {
        self.patient_id == patient_id && self.psychologist_id == psychologist_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionNote {
    pub id: Uuid,
    pub clinical_record_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub session_date: NaiveDate,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}
