use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequestParts, Path, State,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::{ApplicantId, ApplicationStatus, Caller, NewApplicant, Role, Timestamp};
use super::events::StatusEventSink;
use super::service::{ApplicationService, ApplicationServiceError};
use super::store::ApplicantStore;

/// Header carrying the role established by the upstream authenticating proxy.
pub const ROLE_HEADER: &str = "x-authenticated-role";

/// Body of a status change: the new status plus the token the caller read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ApplicationStatus,
    pub expected_last_modified_at: Timestamp,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let role = parts
            .headers
            .get(ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(Role::from_label);
        Ok(Caller { role })
    }
}

/// Router builder exposing the recruiter review and registration endpoints.
pub fn application_router<S, E>(service: Arc<ApplicationService<S, E>>) -> Router
where
    S: ApplicantStore + 'static,
    E: StatusEventSink + 'static,
{
    Router::new()
        .route("/api/v1/applications", get(list_handler::<S, E>))
        .route("/api/v1/applications/:id", get(get_handler::<S, E>))
        .route(
            "/api/v1/applications/:id/status",
            put(update_status_handler::<S, E>),
        )
        .route("/api/v1/applicants", post(register_handler::<S, E>))
        .route("/api/v1/competences", get(competences_handler::<S, E>))
        .with_state(service)
}

pub(crate) async fn list_handler<S, E>(
    State(service): State<Arc<ApplicationService<S, E>>>,
    caller: Caller,
) -> Response
where
    S: ApplicantStore + 'static,
    E: StatusEventSink + 'static,
{
    respond(StatusCode::OK, service, move |service| service.list(&caller)).await
}

pub(crate) async fn get_handler<S, E>(
    State(service): State<Arc<ApplicationService<S, E>>>,
    caller: Caller,
    path: Result<Path<i64>, PathRejection>,
) -> Response
where
    S: ApplicantStore + 'static,
    E: StatusEventSink + 'static,
{
    let Path(id) = match path {
        Ok(path) => path,
        Err(rejection) => return rejection_response(rejection.status(), rejection.body_text()),
    };
    respond(StatusCode::OK, service, move |service| {
        service.get(&caller, ApplicantId(id))
    })
    .await
}

pub(crate) async fn update_status_handler<S, E>(
    State(service): State<Arc<ApplicationService<S, E>>>,
    caller: Caller,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Response
where
    S: ApplicantStore + 'static,
    E: StatusEventSink + 'static,
{
    let Path(id) = match path {
        Ok(path) => path,
        Err(rejection) => return rejection_response(rejection.status(), rejection.body_text()),
    };
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(rejection.status(), rejection.body_text()),
    };
    respond(StatusCode::OK, service, move |service| {
        service.update_status(
            &caller,
            ApplicantId(id),
            request.status,
            request.expected_last_modified_at,
        )
    })
    .await
}

pub(crate) async fn register_handler<S, E>(
    State(service): State<Arc<ApplicationService<S, E>>>,
    body: Result<Json<NewApplicant>, JsonRejection>,
) -> Response
where
    S: ApplicantStore + 'static,
    E: StatusEventSink + 'static,
{
    let Json(applicant) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(rejection.status(), rejection.body_text()),
    };
    respond(StatusCode::CREATED, service, move |service| {
        service.register(applicant)
    })
    .await
}

pub(crate) async fn competences_handler<S, E>(
    State(service): State<Arc<ApplicationService<S, E>>>,
) -> Response
where
    S: ApplicantStore + 'static,
    E: StatusEventSink + 'static,
{
    respond(StatusCode::OK, service, |service| service.competences()).await
}

/// Runs a service call on the blocking pool; store calls may wait on the
/// SQLite write lock and must not hold up the async workers meanwhile.
async fn respond<S, E, T, F>(
    success: StatusCode,
    service: Arc<ApplicationService<S, E>>,
    call: F,
) -> Response
where
    S: ApplicantStore + 'static,
    E: StatusEventSink + 'static,
    T: Serialize + Send + 'static,
    F: FnOnce(&ApplicationService<S, E>) -> Result<T, ApplicationServiceError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || call(service.as_ref())).await {
        Ok(Ok(value)) => (success, Json(value)).into_response(),
        Ok(Err(err)) => error_response(err),
        Err(err) => {
            error!(error = %err, "application service task failed");
            rejection_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "an unexpected error occurred, please try again later".to_string(),
            )
        }
    }
}

fn error_response(err: ApplicationServiceError) -> Response {
    let status = match &err {
        ApplicationServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ApplicationServiceError::Conflict(_) | ApplicationServiceError::AlreadyRegistered { .. } => {
            StatusCode::CONFLICT
        }
        ApplicationServiceError::Unauthorized { actual: None, .. } => StatusCode::UNAUTHORIZED,
        ApplicationServiceError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        ApplicationServiceError::UnknownCompetence(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ApplicationServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    rejection_response(status, err.to_string())
}

fn rejection_response(status: StatusCode, message: String) -> Response {
    let payload = json!({
        "error": message,
    });
    (status, Json(payload)).into_response()
}
