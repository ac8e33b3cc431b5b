use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use shared_database::{BookingCommit, ClinicStore, MemoryStore, RecurrenceCommit, StoreError};
use shared_models::clinic::{Appointment, AppointmentStatus, AttendanceWindow, ClinicalRecord, SessionNote};

fn monday_at(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2030, 1, 7)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn booking(patient: Uuid, psychologist: Uuid, hour: u32) -> BookingCommit {
    BookingCommit {
        appointment: Appointment::scheduled(patient, psychologist, monday_at(hour), None, Utc::now()),
        clinical_record: None,
        enforce_continuity: true,
    }
}

#[tokio::test]
async fn one_live_appointment_per_slot() {
    let store = MemoryStore::new();
    let psychologist = Uuid::new_v4();

    store.commit_booking(booking(Uuid::new_v4(), psychologist, 9)).await.unwrap();
    assert_matches!(
        store.commit_booking(booking(Uuid::new_v4(), psychologist, 9)).await,
        Err(StoreError::UniqueViolation(_))
    );

    // Another psychologist at the same time is fine.
    store.commit_booking(booking(Uuid::new_v4(), Uuid::new_v4(), 9)).await.unwrap();
}

#[tokio::test]
async fn continuity_is_checked_inside_the_commit() {
    let store = MemoryStore::new();
    let patient = Uuid::new_v4();
    let ana = Uuid::new_v4();
    let bruno = Uuid::new_v4();

    store.commit_booking(booking(patient, ana, 9)).await.unwrap();

    assert_matches!(
        store.commit_booking(booking(patient, bruno, 10)).await,
        Err(StoreError::UniqueViolation(_))
    );
    store.commit_booking(booking(patient, ana, 10)).await.unwrap();

    // Seeding paths may opt out.
    let mut unchecked = booking(patient, bruno, 11);
    unchecked.enforce_continuity = false;
    store.commit_booking(unchecked).await.unwrap();

    assert_eq!(store.patient_appointments(patient).await.unwrap().len(), 3);
}

#[tokio::test]
async fn cancelled_appointment_releases_its_slot() {
    let store = MemoryStore::new();
    let psychologist = Uuid::new_v4();
    let first = store.commit_booking(booking(Uuid::new_v4(), psychologist, 9)).await.unwrap();

    store
        .update_appointment_status(first.id, AppointmentStatus::Scheduled, AppointmentStatus::Cancelled, Utc::now())
        .await
        .unwrap();

    store.commit_booking(booking(Uuid::new_v4(), psychologist, 9)).await.unwrap();
}

#[tokio::test]
async fn booking_with_mismatched_chart_rolls_back() {
    let store = MemoryStore::new();
    let patient = Uuid::new_v4();
    let psychologist = Uuid::new_v4();

    let mut commit = booking(patient, psychologist, 9);
    commit.clinical_record = Some(ClinicalRecord::open(Uuid::new_v4(), psychologist, None, Utc::now()));

    assert_matches!(store.commit_booking(commit).await, Err(StoreError::Integrity(_)));
    assert!(store.patient_appointments(patient).await.unwrap().is_empty());
}

#[tokio::test]
async fn first_booking_chart_is_kept_once() {
    let store = MemoryStore::new();
    let patient = Uuid::new_v4();
    let psychologist = Uuid::new_v4();

    let mut first = booking(patient, psychologist, 9);
    let chart = ClinicalRecord::open(patient, psychologist, Some("first".to_string()), Utc::now());
    first.clinical_record = Some(chart.clone());
    store.commit_booking(first).await.unwrap();

    let mut second = booking(patient, psychologist, 10);
    second.clinical_record = Some(ClinicalRecord::open(patient, psychologist, Some("second".to_string()), Utc::now()));
    store.commit_booking(second).await.unwrap();

    let stored = store.find_clinical_record(patient, psychologist).await.unwrap().unwrap();
    assert_eq!(stored.id, chart.id);
    assert_eq!(stored.general_notes.as_deref(), Some("first"));
}

#[tokio::test]
async fn status_update_is_compare_and_set() {
    let store = MemoryStore::new();
    let appointment = store.commit_booking(booking(Uuid::new_v4(), Uuid::new_v4(), 9)).await.unwrap();

    store
        .update_appointment_status(appointment.id, AppointmentStatus::Scheduled, AppointmentStatus::Confirmed, Utc::now())
        .await
        .unwrap();

    assert_matches!(
        store
            .update_appointment_status(appointment.id, AppointmentStatus::Scheduled, AppointmentStatus::Cancelled, Utc::now())
            .await,
        Err(StoreError::StaleWrite(_))
    );
    assert_matches!(
        store
            .update_appointment_status(Uuid::new_v4(), AppointmentStatus::Scheduled, AppointmentStatus::Cancelled, Utc::now())
            .await,
        Err(StoreError::NotFound(_))
    );
}

#[tokio::test]
async fn window_replacement_is_scoped_to_one_psychologist() {
    let store = MemoryStore::new();
    let ana = Uuid::new_v4();
    let bruno = Uuid::new_v4();
    let nine = chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap();
    let noon = chrono::NaiveTime::from_hms_opt(12, 0, 0).unwrap();

    store
        .replace_attendance_windows(ana, vec![AttendanceWindow::new(ana, 0, nine, noon)])
        .await
        .unwrap();
    store
        .replace_attendance_windows(bruno, vec![AttendanceWindow::new(bruno, 2, nine, noon)])
        .await
        .unwrap();
    store.replace_attendance_windows(ana, Vec::new()).await.unwrap();

    assert!(store.attendance_windows(ana).await.unwrap().is_empty());
    assert_eq!(store.attendance_windows(bruno).await.unwrap().len(), 1);

    assert_matches!(
        store
            .replace_attendance_windows(ana, vec![AttendanceWindow::new(bruno, 1, nine, noon)])
            .await,
        Err(StoreError::Integrity(_))
    );
}

#[tokio::test]
async fn recurrence_skips_held_slots_and_saves_the_record() {
    let store = MemoryStore::new();
    let patient = Uuid::new_v4();
    let psychologist = Uuid::new_v4();
    store.commit_booking(booking(Uuid::new_v4(), psychologist, 9)).await.unwrap();

    let mut record = store
        .ensure_clinical_record(ClinicalRecord::open(patient, psychologist, None, Utc::now()))
        .await
        .unwrap();
    record.recurrence_enabled = true;
    record.recurrence_day_of_week = Some(0);

    let appointments = (0..3)
        .map(|week| {
            Appointment::scheduled(patient, psychologist, monday_at(9) + Duration::weeks(week), None, Utc::now())
        })
        .collect();

    let created = store
        .commit_recurrence(RecurrenceCommit { record, appointments })
        .await
        .unwrap();

    assert_eq!(created.len(), 2);
    assert_eq!(created[0].scheduled_at, monday_at(9) + Duration::weeks(1));

    let stored = store.find_clinical_record(patient, psychologist).await.unwrap().unwrap();
    assert!(stored.recurrence_enabled);
}

#[tokio::test]
async fn recurrence_for_foreign_pair_changes_nothing() {
    let store = MemoryStore::new();
    let patient = Uuid::new_v4();
    let psychologist = Uuid::new_v4();
    let mut record = store
        .ensure_clinical_record(ClinicalRecord::open(patient, psychologist, None, Utc::now()))
        .await
        .unwrap();
    record.recurrence_enabled = true;

    let appointments = vec![
        Appointment::scheduled(patient, psychologist, monday_at(9), None, Utc::now()),
        Appointment::scheduled(Uuid::new_v4(), psychologist, monday_at(10), None, Utc::now()),
    ];

    assert_matches!(
        store.commit_recurrence(RecurrenceCommit { record, appointments }).await,
        Err(StoreError::Integrity(_))
    );
    assert!(store.patient_appointments(patient).await.unwrap().is_empty());
    let stored = store.find_clinical_record(patient, psychologist).await.unwrap().unwrap();
    assert!(!stored.recurrence_enabled);
}

#[tokio::test]
async fn session_notes_need_a_record_and_list_newest_first() {
    let store = MemoryStore::new();
    let record = store
        .ensure_clinical_record(ClinicalRecord::open(Uuid::new_v4(), Uuid::new_v4(), None, Utc::now()))
        .await
        .unwrap();

    let note = |record_id: Uuid, day: u32| SessionNote {
        id: Uuid::new_v4(),
        clinical_record_id: record_id,
        appointment_id: None,
        session_date: NaiveDate::from_ymd_opt(2030, 1, day).unwrap(),
        notes: format!("session on day {}", day),
        created_at: Utc::now(),
    };

    assert_matches!(
        store.append_session_note(note(Uuid::new_v4(), 1)).await,
        Err(StoreError::NotFound(_))
    );

    store.append_session_note(note(record.id, 3)).await.unwrap();
    store.append_session_note(note(record.id, 10)).await.unwrap();

    let notes = store.session_notes(record.id).await.unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].session_date.to_string(), "2030-01-10");
}
