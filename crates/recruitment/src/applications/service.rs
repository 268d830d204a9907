use std::sync::Arc;

use tracing::{error, info, warn};

use super::domain::{
    ApplicantId, ApplicantRecord, ApplicationStatus, Caller, Competence, NewApplicant, Role,
    Timestamp,
};
use super::events::{StatusChangeEvent, StatusEventSink};
use super::store::{ApplicantStore, StoreError};

/// Service composing the applicant store with the status-change event sink.
pub struct ApplicationService<S, E> {
    store: Arc<S>,
    events: Arc<E>,
}

impl<S, E> ApplicationService<S, E>
where
    S: ApplicantStore + 'static,
    E: StatusEventSink + 'static,
{
    pub fn new(store: Arc<S>, events: Arc<E>) -> Self {
        Self { store, events }
    }

    /// Fetch one application, including the last-modified token callers must
    /// echo back when changing its status.
    pub fn get(
        &self,
        caller: &Caller,
        id: ApplicantId,
    ) -> Result<ApplicantRecord, ApplicationServiceError> {
        authorize(caller, Role::Recruiter)?;
        self.store
            .find_by_id(id)
            .map_err(|err| internal("find applicant", Some(id), err))?
            .ok_or(ApplicationServiceError::NotFound(id))
    }

    /// All applicants, newest registration first.
    pub fn list(&self, caller: &Caller) -> Result<Vec<ApplicantRecord>, ApplicationServiceError> {
        authorize(caller, Role::Recruiter)?;
        self.store
            .list_applicants()
            .map_err(|err| internal("list applicants", None, err))
    }

    /// Change the status if nobody else has modified the application since
    /// the caller read `expected_last_modified`.
    ///
    /// Any status may follow any other. A stale token fails with
    /// [`ApplicationServiceError::Conflict`] and leaves the row untouched; the
    /// caller has to re-fetch before trying again.
    pub fn update_status(
        &self,
        caller: &Caller,
        id: ApplicantId,
        status: ApplicationStatus,
        expected_last_modified: Timestamp,
    ) -> Result<ApplicantRecord, ApplicationServiceError> {
        authorize(caller, Role::Recruiter)?;

        let transition = self
            .store
            .compare_and_set_status(id, status, expected_last_modified)
            .map_err(|err| match err {
                StoreError::NotFound => ApplicationServiceError::NotFound(id),
                StoreError::StaleWrite { expected, actual } => {
                    info!(
                        applicant_id = id.0,
                        %expected,
                        %actual,
                        "rejected stale status update"
                    );
                    ApplicationServiceError::Conflict(id)
                }
                other => internal("update application status", Some(id), other),
            })?;

        info!(
            applicant_id = id.0,
            old_status = %transition.previous,
            new_status = %transition.record.status,
            "application status updated"
        );

        let event = StatusChangeEvent {
            applicant_id: id,
            previous: transition.previous,
            current: transition.record.status,
            last_modified_at: transition.record.last_modified_at,
        };
        if let Err(err) = self.events.publish(event) {
            warn!(applicant_id = id.0, error = %err, "status change event not delivered");
        }

        Ok(transition.record)
    }

    /// Register a new applicant with status `unhandled`.
    pub fn register(
        &self,
        applicant: NewApplicant,
    ) -> Result<ApplicantRecord, ApplicationServiceError> {
        let record = self.store.register(applicant).map_err(|err| match err {
            StoreError::Duplicate { field } => {
                warn!(field, "registration with already registered value");
                ApplicationServiceError::AlreadyRegistered { field }
            }
            StoreError::UnknownCompetence(id) => ApplicationServiceError::UnknownCompetence(id),
            other => internal("register applicant", None, other),
        })?;

        info!(applicant_id = record.id.0, "applicant registered");
        Ok(record)
    }

    pub fn competences(&self) -> Result<Vec<Competence>, ApplicationServiceError> {
        self.store
            .competences()
            .map_err(|err| internal("list competences", None, err))
    }
}

fn authorize(caller: &Caller, required: Role) -> Result<(), ApplicationServiceError> {
    if caller.has_role(required) {
        Ok(())
    } else {
        Err(ApplicationServiceError::Unauthorized {
            required,
            actual: caller.role,
        })
    }
}

fn internal(
    operation: &'static str,
    id: Option<ApplicantId>,
    err: StoreError,
) -> ApplicationServiceError {
    match id {
        Some(id) => error!(operation, applicant_id = id.0, error = %err, "store failure"),
        None => error!(operation, error = %err, "store failure"),
    }
    ApplicationServiceError::Internal(err)
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error("application {0} was not found")]
    NotFound(ApplicantId),
    #[error("application {0} has been changed by another user; reload it and try again")]
    Conflict(ApplicantId),
    #[error("this operation requires the {required} role")]
    Unauthorized {
        required: Role,
        actual: Option<Role>,
    },
    #[error("{field} is already registered")]
    AlreadyRegistered { field: &'static str },
    #[error("competence {0} does not exist")]
    UnknownCompetence(i64),
    #[error("an unexpected error occurred, please try again later")]
    Internal(#[source] StoreError),
}
