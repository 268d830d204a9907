//! Integration tests for the recruiter review workflow.
//!
//! Scenarios drive the public service facade and HTTP router against both
//! store implementations, so the optimistic status check is validated the
//! way callers see it.

mod common {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::response::Response;
    use chrono::NaiveDate;
    use serde_json::Value;
    use tempfile::TempDir;

    use recruitment::applications::{
        ApplicantId, ApplicantRecord, ApplicantStore, ApplicationService, ApplicationStatus,
        AvailabilityPeriod, CompetenceProfile, InMemoryApplicantStore, RecordingEventSink, Role,
        SqliteApplicantStore, Timestamp, ROLE_HEADER,
    };

    pub(super) fn t0() -> Timestamp {
        Timestamp::from_millis(1_735_725_600_000).expect("valid timestamp")
    }

    pub(super) fn applicant_seven() -> ApplicantRecord {
        ApplicantRecord {
            id: ApplicantId(7),
            name: "Per".to_string(),
            surname: "Strand".to_string(),
            email: Some("per@kth.se".to_string()),
            personal_id: Some("198505051234".to_string()),
            role: Some(Role::Applicant),
            status: ApplicationStatus::Unhandled,
            created_at: t0(),
            last_modified_at: t0(),
            competence_profiles: vec![CompetenceProfile {
                competence_profile_id: 1,
                competence_id: 1,
                competence: "roller coaster operation".to_string(),
                years_of_experience: 4.0,
            }],
            availability_periods: vec![AvailabilityPeriod {
                availability_id: 1,
                from_date: NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date"),
                to_date: NaiveDate::from_ymd_opt(2025, 8, 15).expect("valid date"),
            }],
        }
    }

    pub(super) type SqliteService = ApplicationService<SqliteApplicantStore, RecordingEventSink>;
    pub(super) type MemoryService = ApplicationService<InMemoryApplicantStore, RecordingEventSink>;

    pub(super) fn sqlite_service() -> (SqliteService, Arc<RecordingEventSink>, TempDir) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = SqliteApplicantStore::open(dir.path().join("workflow.db")).expect("store");
        store
            .add_competence("roller coaster operation")
            .expect("competence");
        store
            .import_applicant(&applicant_seven())
            .expect("seed applicant");
        let events = Arc::new(RecordingEventSink::default());
        let service = ApplicationService::new(Arc::new(store), events.clone());
        (service, events, dir)
    }

    pub(super) fn memory_service() -> (MemoryService, Arc<RecordingEventSink>) {
        let store = InMemoryApplicantStore::default();
        store
            .import_applicant(applicant_seven())
            .expect("seed applicant");
        let events = Arc::new(RecordingEventSink::default());
        let service = ApplicationService::new(Arc::new(store), events.clone());
        (service, events)
    }

    pub(super) fn recruiter_get(uri: &str) -> Request<Body> {
        Request::get(uri)
            .header(ROLE_HEADER, "recruiter")
            .body(Body::empty())
            .expect("request builds")
    }

    pub(super) fn recruiter_put(uri: &str, body: &Value) -> Request<Body> {
        Request::put(uri)
            .header(ROLE_HEADER, "recruiter")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body).expect("serialize")))
            .expect("request builds")
    }

    pub(super) async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json payload")
    }
}

mod scenarios {
    use super::common::*;
    use recruitment::applications::{
        ApplicantId, ApplicationServiceError, ApplicationStatus, Caller, StatusChangeEvent,
    };

    #[test]
    fn stale_second_recruiter_is_rejected_on_sqlite() {
        let (service, events, _dir) = sqlite_service();
        let recruiter = Caller::recruiter();

        let accepted = service
            .update_status(&recruiter, ApplicantId(7), ApplicationStatus::Accepted, t0())
            .expect("recruiter A commits");
        assert!(accepted.last_modified_at > t0());

        match service.update_status(&recruiter, ApplicantId(7), ApplicationStatus::Rejected, t0())
        {
            Err(ApplicationServiceError::Conflict(ApplicantId(7))) => {}
            other => panic!("expected conflict, got {other:?}"),
        }

        let current = service
            .get(&recruiter, ApplicantId(7))
            .expect("applicant present");
        assert_eq!(current.status, ApplicationStatus::Accepted);
        assert_eq!(current.last_modified_at, accepted.last_modified_at);
        assert_eq!(
            events.events(),
            vec![StatusChangeEvent {
                applicant_id: ApplicantId(7),
                previous: ApplicationStatus::Unhandled,
                current: ApplicationStatus::Accepted,
                last_modified_at: accepted.last_modified_at,
            }]
        );
    }

    #[test]
    fn refetching_after_conflict_allows_resubmission() {
        let (service, _) = memory_service();
        let recruiter = Caller::recruiter();

        service
            .update_status(&recruiter, ApplicantId(7), ApplicationStatus::Accepted, t0())
            .expect("first update");
        assert!(service
            .update_status(&recruiter, ApplicantId(7), ApplicationStatus::Rejected, t0())
            .is_err());

        let fresh = service
            .get(&recruiter, ApplicantId(7))
            .expect("applicant present");
        let rejected = service
            .update_status(
                &recruiter,
                ApplicantId(7),
                ApplicationStatus::Rejected,
                fresh.last_modified_at,
            )
            .expect("resubmission with fresh token");
        assert_eq!(rejected.status, ApplicationStatus::Rejected);
    }

    #[test]
    fn unknown_applicant_is_not_found_in_both_stores() {
        let (sqlite, _, _dir) = sqlite_service();
        let (memory, _) = memory_service();

        assert!(matches!(
            sqlite.get(&Caller::recruiter(), ApplicantId(999)),
            Err(ApplicationServiceError::NotFound(ApplicantId(999)))
        ));
        assert!(matches!(
            memory.get(&Caller::recruiter(), ApplicantId(999)),
            Err(ApplicationServiceError::NotFound(ApplicantId(999)))
        ));
    }
}

mod http {
    use super::common::*;
    use axum::http::StatusCode;
    use recruitment::applications::application_router;
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn conflict_and_not_found_are_distinguishable_over_http() {
        let (service, _, _dir) = sqlite_service();
        let router = application_router(Arc::new(service));

        let read = router
            .clone()
            .oneshot(recruiter_get("/api/v1/applications/7"))
            .await
            .expect("route executes");
        assert_eq!(read.status(), StatusCode::OK);
        let token = json_body(read).await["last_modified_at"].clone();
        assert_eq!(token, json!("2025-01-01T10:00:00.000Z"));

        let accepted = router
            .clone()
            .oneshot(recruiter_put(
                "/api/v1/applications/7/status",
                &json!({ "status": "accepted", "expected_last_modified_at": token }),
            ))
            .await
            .expect("route executes");
        assert_eq!(accepted.status(), StatusCode::OK);

        let stale = router
            .clone()
            .oneshot(recruiter_put(
                "/api/v1/applications/7/status",
                &json!({ "status": "rejected", "expected_last_modified_at": token }),
            ))
            .await
            .expect("route executes");
        assert_eq!(stale.status(), StatusCode::CONFLICT);
        let conflict_message = json_body(stale).await["error"].clone();

        let missing = router
            .oneshot(recruiter_get("/api/v1/applications/999"))
            .await
            .expect("route executes");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let missing_message = json_body(missing).await["error"].clone();

        assert_ne!(conflict_message, missing_message);
    }

    #[tokio::test]
    async fn malformed_status_is_rejected_before_the_store() {
        let (service, events) = memory_service();
        let router = application_router(Arc::new(service));

        let response = router
            .oneshot(recruiter_put(
                "/api/v1/applications/7/status",
                &json!({ "status": "hired", "expected_last_modified_at": t0() }),
            ))
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let payload = json_body(response).await;
        assert!(payload["error"]
            .as_str()
            .unwrap_or_default()
            .contains("hired"));
        assert!(events.events().is_empty());
    }
}
