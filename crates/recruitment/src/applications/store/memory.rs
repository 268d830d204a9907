use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{successor, ApplicantStore, StoreError};
use crate::applications::domain::{
    ApplicantId, ApplicantRecord, ApplicationStatus, AvailabilityPeriod, Competence,
    CompetenceProfile, NewApplicant, Role, StatusTransition, Timestamp,
};

/// Process-local store; every operation runs under one mutex guard.
#[derive(Default, Clone)]
pub struct InMemoryApplicantStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    applicants: BTreeMap<ApplicantId, ApplicantRecord>,
    competences: BTreeMap<i64, Competence>,
    last_profile_id: i64,
    last_availability_id: i64,
}

impl MemoryState {
    fn next_applicant_id(&self) -> ApplicantId {
        let last = self.applicants.keys().next_back().map_or(0, |id| id.0);
        ApplicantId(last + 1)
    }

    fn next_competence_id(&self) -> i64 {
        self.competences.keys().next_back().copied().unwrap_or(0) + 1
    }
}

impl InMemoryApplicantStore {
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("applicant store mutex poisoned".to_string()))
    }

    /// Loads an existing row verbatim, keeping its id and timestamps.
    pub fn import_applicant(&self, record: ApplicantRecord) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.applicants.contains_key(&record.id) {
            return Err(StoreError::Duplicate { field: "id" });
        }
        for profile in &record.competence_profiles {
            state.last_profile_id = state.last_profile_id.max(profile.competence_profile_id);
        }
        for period in &record.availability_periods {
            state.last_availability_id = state.last_availability_id.max(period.availability_id);
        }
        state.applicants.insert(record.id, record);
        Ok(())
    }
}

impl ApplicantStore for InMemoryApplicantStore {
    fn find_by_id(&self, id: ApplicantId) -> Result<Option<ApplicantRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state.applicants.get(&id).cloned())
    }

    fn list_applicants(&self) -> Result<Vec<ApplicantRecord>, StoreError> {
        let state = self.lock()?;
        let mut applicants: Vec<ApplicantRecord> = state
            .applicants
            .values()
            .filter(|record| record.role == Some(Role::Applicant))
            .cloned()
            .collect();
        applicants.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(applicants)
    }

    fn compare_and_set_status(
        &self,
        id: ApplicantId,
        status: ApplicationStatus,
        expected: Timestamp,
    ) -> Result<StatusTransition, StoreError> {
        let mut state = self.lock()?;
        let record = state.applicants.get_mut(&id).ok_or(StoreError::NotFound)?;

        if record.last_modified_at != expected {
            return Err(StoreError::StaleWrite {
                expected,
                actual: record.last_modified_at,
            });
        }

        let next = successor(expected)?;
        let previous = record.status;
        record.status = status;
        record.last_modified_at = next;

        Ok(StatusTransition {
            previous,
            record: record.clone(),
        })
    }

    fn register(&self, applicant: NewApplicant) -> Result<ApplicantRecord, StoreError> {
        let mut state = self.lock()?;

        if let Some(email) = applicant.email.as_deref() {
            let taken = state.applicants.values().any(|record| {
                record
                    .email
                    .as_deref()
                    .is_some_and(|existing| existing.eq_ignore_ascii_case(email))
            });
            if taken {
                return Err(StoreError::Duplicate { field: "email" });
            }
        }
        if let Some(personal_id) = applicant.personal_id.as_deref() {
            let taken = state
                .applicants
                .values()
                .any(|record| record.personal_id.as_deref() == Some(personal_id));
            if taken {
                return Err(StoreError::Duplicate {
                    field: "personal_id",
                });
            }
        }

        let mut competence_profiles = Vec::with_capacity(applicant.competence_profiles.len());
        for claim in &applicant.competence_profiles {
            let competence = state
                .competences
                .get(&claim.competence_id)
                .ok_or(StoreError::UnknownCompetence(claim.competence_id))?;
            competence_profiles.push(CompetenceProfile {
                competence_profile_id: 0,
                competence_id: competence.competence_id,
                competence: competence.name.clone(),
                years_of_experience: claim.years_of_experience,
            });
        }
        for profile in &mut competence_profiles {
            state.last_profile_id += 1;
            profile.competence_profile_id = state.last_profile_id;
        }

        let mut availability_periods = Vec::with_capacity(applicant.availability_periods.len());
        for period in &applicant.availability_periods {
            state.last_availability_id += 1;
            availability_periods.push(AvailabilityPeriod {
                availability_id: state.last_availability_id,
                from_date: period.from_date,
                to_date: period.to_date,
            });
        }

        let now = Timestamp::now();
        let record = ApplicantRecord {
            id: state.next_applicant_id(),
            name: applicant.name,
            surname: applicant.surname,
            email: applicant.email,
            personal_id: applicant.personal_id,
            role: Some(Role::Applicant),
            status: ApplicationStatus::Unhandled,
            created_at: now,
            last_modified_at: now,
            competence_profiles,
            availability_periods,
        };
        state.applicants.insert(record.id, record.clone());
        Ok(record)
    }

    fn competences(&self) -> Result<Vec<Competence>, StoreError> {
        let state = self.lock()?;
        let mut competences: Vec<Competence> = state.competences.values().cloned().collect();
        competences.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(competences)
    }

    fn add_competence(&self, name: &str) -> Result<Competence, StoreError> {
        let mut state = self.lock()?;
        if state.competences.values().any(|existing| existing.name == name) {
            return Err(StoreError::Duplicate { field: "competence" });
        }
        let competence = Competence {
            competence_id: state.next_competence_id(),
            name: name.to_string(),
        };
        state
            .competences
            .insert(competence.competence_id, competence.clone());
        Ok(competence)
    }
}
