use std::path::Path;

use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::{successor, ApplicantStore, StoreError};
use crate::applications::domain::{
    ApplicantId, ApplicantRecord, ApplicationStatus, AvailabilityPeriod, Competence,
    CompetenceProfile, NewApplicant, Role, StatusTransition, Timestamp,
};

pub type SqlitePool = Pool<SqliteConnectionManager>;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS role (
    role_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);
INSERT OR IGNORE INTO role (role_id, name) VALUES (1, 'recruiter'), (2, 'applicant');

CREATE TABLE IF NOT EXISTS competence (
    competence_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS applicant (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    surname TEXT NOT NULL,
    email TEXT COLLATE NOCASE UNIQUE,
    personal_id TEXT UNIQUE,
    role_id INTEGER REFERENCES role (role_id),
    application_status TEXT NOT NULL DEFAULT 'unhandled'
        CHECK (application_status IN ('unhandled', 'accepted', 'rejected')),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS applicant_created_idx ON applicant (created_at DESC, id DESC);

CREATE TABLE IF NOT EXISTS competence_profile (
    competence_profile_id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER NOT NULL REFERENCES applicant (id) ON DELETE CASCADE,
    competence_id INTEGER NOT NULL REFERENCES competence (competence_id),
    years_of_experience REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS availability (
    availability_id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER NOT NULL REFERENCES applicant (id) ON DELETE CASCADE,
    from_date TEXT NOT NULL,
    to_date TEXT NOT NULL
);
";

const SELECT_APPLICANT: &str = "
SELECT a.id, a.name, a.surname, a.email, a.personal_id, r.name,
       a.application_status, a.created_at, a.updated_at
FROM applicant a
LEFT JOIN role r ON r.role_id = a.role_id";

/// SQLite-backed store. Status changes run inside an `IMMEDIATE`
/// transaction, which takes the database write lock before the token is read,
/// so the token cannot move between the comparison and the update.
#[derive(Clone)]
pub struct SqliteApplicantStore {
    pool: SqlitePool,
}

impl SqliteApplicantStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA busy_timeout = 5000;
                 PRAGMA foreign_keys = ON;
                 PRAGMA journal_mode = WAL;",
            )
        });
        let pool = Pool::builder().max_size(8).build(manager)?;
        Self::from_pool(pool)
    }

    /// Wraps an existing pool and makes sure the schema exists.
    pub fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let conn = pool.get()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { pool })
    }

    /// Loads an existing row verbatim, keeping its id and timestamps.
    pub fn import_applicant(&self, record: &ApplicantRecord) -> Result<(), StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if applicant_exists(&tx, record.id)? {
            return Err(StoreError::Duplicate { field: "id" });
        }

        tx.execute(
            "INSERT INTO applicant
                (id, name, surname, email, personal_id, role_id, application_status,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5,
                     (SELECT role_id FROM role WHERE name = ?6), ?7, ?8, ?9)",
            params![
                record.id.0,
                record.name,
                record.surname,
                record.email,
                record.personal_id,
                record.role.map(Role::label),
                record.status.label(),
                record.created_at.as_millis(),
                record.last_modified_at.as_millis(),
            ],
        )?;

        for profile in &record.competence_profiles {
            ensure_competence(&tx, profile.competence_id)?;
            tx.execute(
                "INSERT INTO competence_profile
                    (competence_profile_id, person_id, competence_id, years_of_experience)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    profile.competence_profile_id,
                    record.id.0,
                    profile.competence_id,
                    profile.years_of_experience,
                ],
            )?;
        }
        for period in &record.availability_periods {
            tx.execute(
                "INSERT INTO availability (availability_id, person_id, from_date, to_date)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    period.availability_id,
                    record.id.0,
                    period.from_date.format(DATE_FORMAT).to_string(),
                    period.to_date.format(DATE_FORMAT).to_string(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

impl ApplicantStore for SqliteApplicantStore {
    fn find_by_id(&self, id: ApplicantId) -> Result<Option<ApplicantRecord>, StoreError> {
        let conn = self.pool.get()?;
        load_record(&conn, id)
    }

    fn list_applicants(&self) -> Result<Vec<ApplicantRecord>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_APPLICANT}
             WHERE r.name = 'applicant'
             ORDER BY a.created_at DESC, a.id DESC"
        ))?;
        let rows = stmt
            .query_map([], ApplicantRow::read)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| {
                let id = ApplicantId(row.id);
                row.into_record(competence_profiles(&conn, id)?, availability(&conn, id)?)
            })
            .collect()
    }

    fn compare_and_set_status(
        &self,
        id: ApplicantId,
        status: ApplicationStatus,
        expected: Timestamp,
    ) -> Result<StatusTransition, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<(String, i64)> = tx
            .query_row(
                "SELECT application_status, updated_at FROM applicant WHERE id = ?1",
                params![id.0],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (previous, actual) = current.ok_or(StoreError::NotFound)?;
        let previous = parse_status(&previous)?;
        let actual = parse_timestamp(actual)?;

        if actual != expected {
            return Err(StoreError::StaleWrite { expected, actual });
        }

        let next = successor(expected)?;
        tx.execute(
            "UPDATE applicant SET application_status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.label(), next.as_millis(), id.0],
        )?;

        let record = load_record(&tx, id)?.ok_or(StoreError::NotFound)?;
        tx.commit()?;

        Ok(StatusTransition { previous, record })
    }

    fn register(&self, applicant: NewApplicant) -> Result<ApplicantRecord, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(email) = applicant.email.as_deref() {
            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM applicant WHERE email = ?1)",
                params![email],
                |row| row.get(0),
            )?;
            if taken {
                return Err(StoreError::Duplicate { field: "email" });
            }
        }
        if let Some(personal_id) = applicant.personal_id.as_deref() {
            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM applicant WHERE personal_id = ?1)",
                params![personal_id],
                |row| row.get(0),
            )?;
            if taken {
                return Err(StoreError::Duplicate {
                    field: "personal_id",
                });
            }
        }
        for claim in &applicant.competence_profiles {
            ensure_competence(&tx, claim.competence_id)?;
        }

        let now = Timestamp::now().as_millis();
        tx.execute(
            "INSERT INTO applicant
                (name, surname, email, personal_id, role_id, application_status,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4,
                     (SELECT role_id FROM role WHERE name = 'applicant'), 'unhandled', ?5, ?5)",
            params![
                applicant.name,
                applicant.surname,
                applicant.email,
                applicant.personal_id,
                now,
            ],
        )?;
        let id = ApplicantId(tx.last_insert_rowid());

        for claim in &applicant.competence_profiles {
            tx.execute(
                "INSERT INTO competence_profile (person_id, competence_id, years_of_experience)
                 VALUES (?1, ?2, ?3)",
                params![id.0, claim.competence_id, claim.years_of_experience],
            )?;
        }
        for period in &applicant.availability_periods {
            tx.execute(
                "INSERT INTO availability (person_id, from_date, to_date) VALUES (?1, ?2, ?3)",
                params![
                    id.0,
                    period.from_date.format(DATE_FORMAT).to_string(),
                    period.to_date.format(DATE_FORMAT).to_string(),
                ],
            )?;
        }

        let record = load_record(&tx, id)?.ok_or(StoreError::NotFound)?;
        tx.commit()?;
        Ok(record)
    }

    fn competences(&self) -> Result<Vec<Competence>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT competence_id, name FROM competence ORDER BY name ASC")?;
        let competences = stmt
            .query_map([], |row| {
                Ok(Competence {
                    competence_id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(competences)
    }

    fn add_competence(&self, name: &str) -> Result<Competence, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM competence WHERE name = ?1)",
            params![name],
            |row| row.get(0),
        )?;
        if taken {
            return Err(StoreError::Duplicate { field: "competence" });
        }
        tx.execute("INSERT INTO competence (name) VALUES (?1)", params![name])?;
        let competence = Competence {
            competence_id: tx.last_insert_rowid(),
            name: name.to_string(),
        };
        tx.commit()?;
        Ok(competence)
    }
}

struct ApplicantRow {
    id: i64,
    name: String,
    surname: String,
    email: Option<String>,
    personal_id: Option<String>,
    role: Option<String>,
    status: String,
    created_at: i64,
    updated_at: i64,
}

impl ApplicantRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            surname: row.get(2)?,
            email: row.get(3)?,
            personal_id: row.get(4)?,
            role: row.get(5)?,
            status: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_record(
        self,
        competence_profiles: Vec<CompetenceProfile>,
        availability_periods: Vec<AvailabilityPeriod>,
    ) -> Result<ApplicantRecord, StoreError> {
        Ok(ApplicantRecord {
            id: ApplicantId(self.id),
            name: self.name,
            surname: self.surname,
            email: self.email,
            personal_id: self.personal_id,
            role: self.role.as_deref().and_then(Role::from_label),
            status: parse_status(&self.status)?,
            created_at: parse_timestamp(self.created_at)?,
            last_modified_at: parse_timestamp(self.updated_at)?,
            competence_profiles,
            availability_periods,
        })
    }
}

fn load_record(conn: &Connection, id: ApplicantId) -> Result<Option<ApplicantRecord>, StoreError> {
    let row = conn
        .query_row(
            &format!("{SELECT_APPLICANT} WHERE a.id = ?1"),
            params![id.0],
            ApplicantRow::read,
        )
        .optional()?;

    match row {
        Some(row) => row
            .into_record(competence_profiles(conn, id)?, availability(conn, id)?)
            .map(Some),
        None => Ok(None),
    }
}

fn competence_profiles(
    conn: &Connection,
    id: ApplicantId,
) -> Result<Vec<CompetenceProfile>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT cp.competence_profile_id, cp.competence_id, c.name, cp.years_of_experience
         FROM competence_profile cp
         JOIN competence c ON c.competence_id = cp.competence_id
         WHERE cp.person_id = ?1
         ORDER BY cp.competence_profile_id",
    )?;
    let profiles = stmt
        .query_map(params![id.0], |row| {
            Ok(CompetenceProfile {
                competence_profile_id: row.get(0)?,
                competence_id: row.get(1)?,
                competence: row.get(2)?,
                years_of_experience: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(profiles)
}

fn availability(conn: &Connection, id: ApplicantId) -> Result<Vec<AvailabilityPeriod>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT availability_id, from_date, to_date
         FROM availability
         WHERE person_id = ?1
         ORDER BY from_date, availability_id",
    )?;
    let rows = stmt
        .query_map(params![id.0], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(availability_id, from_date, to_date)| {
            Ok(AvailabilityPeriod {
                availability_id,
                from_date: parse_date(&from_date)?,
                to_date: parse_date(&to_date)?,
            })
        })
        .collect()
}

fn applicant_exists(conn: &Connection, id: ApplicantId) -> Result<bool, StoreError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM applicant WHERE id = ?1)",
        params![id.0],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn ensure_competence(conn: &Connection, competence_id: i64) -> Result<(), StoreError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM competence WHERE competence_id = ?1)",
        params![competence_id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(StoreError::UnknownCompetence(competence_id))
    }
}

fn parse_status(raw: &str) -> Result<ApplicationStatus, StoreError> {
    ApplicationStatus::from_label(raw)
        .ok_or_else(|| StoreError::Unavailable(format!("unrecognised application status '{raw}'")))
}

fn parse_timestamp(millis: i64) -> Result<Timestamp, StoreError> {
    Timestamp::from_millis(millis)
        .ok_or_else(|| StoreError::Unavailable(format!("timestamp {millis} out of range")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|err| StoreError::Unavailable(format!("invalid stored date '{raw}' ({err})")))
}
