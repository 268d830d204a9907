use std::sync::Arc;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::applications::domain::{
    ApplicantId, ApplicantRecord, ApplicationStatus, AvailabilityPeriod, Competence,
    CompetenceProfile, NewApplicant, NewAvailabilityPeriod, NewCompetenceProfile, Role,
    StatusTransition, Timestamp,
};
use crate::applications::events::{
    EventError, RecordingEventSink, StatusChangeEvent, StatusEventSink,
};
use crate::applications::store::{ApplicantStore, InMemoryApplicantStore, StoreError};
use crate::applications::{application_router, ApplicationService};

/// 2025-01-01T10:00:00.000Z
pub(super) const T0_MILLIS: i64 = 1_735_725_600_000;

pub(super) fn t0() -> Timestamp {
    Timestamp::from_millis(T0_MILLIS).expect("valid timestamp")
}

pub(super) fn at(offset_millis: i64) -> Timestamp {
    Timestamp::from_millis(T0_MILLIS + offset_millis).expect("valid timestamp")
}

pub(super) fn applicant_record(id: i64, created_at: Timestamp) -> ApplicantRecord {
    ApplicantRecord {
        id: ApplicantId(id),
        name: format!("Applicant{id}"),
        surname: "Lindqvist".to_string(),
        email: Some(format!("applicant{id}@example.se")),
        personal_id: Some(format!("19900101{id:04}")),
        role: Some(Role::Applicant),
        status: ApplicationStatus::Unhandled,
        created_at,
        last_modified_at: created_at,
        competence_profiles: vec![CompetenceProfile {
            competence_profile_id: id * 10,
            competence_id: 1,
            competence: "ticket sales".to_string(),
            years_of_experience: 3.5,
        }],
        availability_periods: vec![AvailabilityPeriod {
            availability_id: id * 10,
            from_date: NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date"),
            to_date: NaiveDate::from_ymd_opt(2025, 8, 31).expect("valid date"),
        }],
    }
}

pub(super) fn recruiter_record(id: i64, created_at: Timestamp) -> ApplicantRecord {
    ApplicantRecord {
        role: Some(Role::Recruiter),
        competence_profiles: Vec::new(),
        availability_periods: Vec::new(),
        ..applicant_record(id, created_at)
    }
}

pub(super) fn new_applicant(email: &str, personal_id: &str) -> NewApplicant {
    NewApplicant {
        name: "Astrid".to_string(),
        surname: "Berg".to_string(),
        email: Some(email.to_string()),
        personal_id: Some(personal_id.to_string()),
        competence_profiles: vec![NewCompetenceProfile {
            competence_id: 1,
            years_of_experience: 2.25,
        }],
        availability_periods: vec![NewAvailabilityPeriod {
            from_date: NaiveDate::from_ymd_opt(2025, 5, 1).expect("valid date"),
            to_date: NaiveDate::from_ymd_opt(2025, 9, 30).expect("valid date"),
        }],
    }
}

pub(super) type MemoryService = ApplicationService<InMemoryApplicantStore, RecordingEventSink>;

pub(super) fn build_service() -> (
    MemoryService,
    Arc<InMemoryApplicantStore>,
    Arc<RecordingEventSink>,
) {
    let store = Arc::new(InMemoryApplicantStore::default());
    store
        .add_competence("ticket sales")
        .expect("competence stored");
    store
        .add_competence("lotteries")
        .expect("competence stored");
    let events = Arc::new(RecordingEventSink::default());
    let service = ApplicationService::new(store.clone(), events.clone());
    (service, store, events)
}

/// Service whose store holds applicant 7, unhandled since T0.
pub(super) fn seeded_service() -> (
    MemoryService,
    Arc<InMemoryApplicantStore>,
    Arc<RecordingEventSink>,
) {
    let (service, store, events) = build_service();
    store
        .import_applicant(applicant_record(7, t0()))
        .expect("seed applicant");
    (service, store, events)
}

pub(super) struct FailingEvents;

impl StatusEventSink for FailingEvents {
    fn publish(&self, _event: StatusChangeEvent) -> Result<(), EventError> {
        Err(EventError::Transport("audit queue offline".to_string()))
    }
}

pub(super) struct UnavailableStore;

impl ApplicantStore for UnavailableStore {
    fn find_by_id(&self, _id: ApplicantId) -> Result<Option<ApplicantRecord>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn list_applicants(&self) -> Result<Vec<ApplicantRecord>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn compare_and_set_status(
        &self,
        _id: ApplicantId,
        _status: ApplicationStatus,
        _expected: Timestamp,
    ) -> Result<StatusTransition, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn register(&self, _applicant: NewApplicant) -> Result<ApplicantRecord, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn competences(&self) -> Result<Vec<Competence>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn add_competence(&self, _name: &str) -> Result<Competence, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn application_router_with_service(service: MemoryService) -> axum::Router {
    application_router(Arc::new(service))
}
