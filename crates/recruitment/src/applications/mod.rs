//! Applicant registration and recruiter review.
//!
//! Recruiters read applications and accept or reject them. Every status change
//! carries the last-modified timestamp the recruiter saw; the store commits
//! the change only while that timestamp is still current, so a recruiter never
//! overwrites a decision they have not seen.

pub mod domain;
pub mod events;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicantId, ApplicantRecord, ApplicationStatus, AvailabilityPeriod, Caller, Competence,
    CompetenceProfile, NewApplicant, NewAvailabilityPeriod, NewCompetenceProfile, Role,
    StatusTransition, Timestamp,
};
pub use events::{
    EventError, RecordingEventSink, StatusChangeEvent, StatusEventSink, TracingEventSink,
};
pub use router::{application_router, UpdateStatusRequest, ROLE_HEADER};
pub use service::{ApplicationService, ApplicationServiceError};
pub use store::{
    ApplicantStore, InMemoryApplicantStore, SqliteApplicantStore, SqlitePool, StoreError,
};
