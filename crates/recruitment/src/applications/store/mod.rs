//! Persistence for applicant and application-status rows.
//!
//! Stores carry no business rules. The one thing they must guarantee is that
//! [`ApplicantStore::compare_and_set_status`] compares the concurrency token
//! and writes the new status as a single atomic unit, so two writers holding
//! the same token can never both succeed.

mod memory;
mod sqlite;

pub use memory::InMemoryApplicantStore;
pub use sqlite::{SqliteApplicantStore, SqlitePool};

use super::domain::{
    ApplicantId, ApplicantRecord, ApplicationStatus, Competence, NewApplicant, StatusTransition,
    Timestamp,
};

/// Storage abstraction so the service module can be exercised in isolation.
pub trait ApplicantStore: Send + Sync {
    fn find_by_id(&self, id: ApplicantId) -> Result<Option<ApplicantRecord>, StoreError>;

    /// Records holding the applicant role, newest creation timestamp first.
    fn list_applicants(&self) -> Result<Vec<ApplicantRecord>, StoreError>;

    /// Writes `status` only if the stored last-modified timestamp still equals
    /// `expected`; the store assigns a strictly later timestamp on success.
    fn compare_and_set_status(
        &self,
        id: ApplicantId,
        status: ApplicationStatus,
        expected: Timestamp,
    ) -> Result<StatusTransition, StoreError>;

    fn register(&self, applicant: NewApplicant) -> Result<ApplicantRecord, StoreError>;

    fn competences(&self) -> Result<Vec<Competence>, StoreError>;

    fn add_competence(&self, name: &str) -> Result<Competence, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record was modified at {actual}, caller expected {expected}")]
    StaleWrite {
        expected: Timestamp,
        actual: Timestamp,
    },
    #[error("{field} is already registered")]
    Duplicate { field: &'static str },
    #[error("competence {0} does not exist")]
    UnknownCompetence(i64),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        StoreError::Unavailable(format!("connection pool: {err}"))
    }
}

fn successor(expected: Timestamp) -> Result<Timestamp, StoreError> {
    Timestamp::successor_of(expected).ok_or_else(|| {
        StoreError::Unavailable(format!("no timestamp after {expected} is representable"))
    })
}
