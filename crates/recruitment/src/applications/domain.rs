use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Numeric applicant identifier, stable and externally visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicantId(pub i64);

impl fmt::Display for ApplicantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Recruitment decision recorded against an applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Unhandled,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Unhandled => "unhandled",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "unhandled" => Some(Self::Unhandled),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Role attached to a user record. Recruiters review, applicants are reviewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Recruiter,
    Applicant,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Recruiter => "recruiter",
            Role::Applicant => "applicant",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "recruiter" => Some(Self::Recruiter),
            "applicant" => Some(Self::Applicant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of whoever invoked an operation, as established upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Caller {
    pub role: Option<Role>,
}

impl Caller {
    pub const fn anonymous() -> Self {
        Self { role: None }
    }

    pub const fn recruiter() -> Self {
        Self {
            role: Some(Role::Recruiter),
        }
    }

    pub const fn applicant() -> Self {
        Self {
            role: Some(Role::Applicant),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }
}

/// UTC instant kept at millisecond resolution.
///
/// The last-modified timestamp doubles as the concurrency token, so every
/// value is truncated to whole milliseconds on construction and on parse.
/// Two timestamps compare equal exactly when their millisecond counts match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(value: DateTime<Utc>) -> Self {
        Self(value.trunc_subsecs(3))
    }

    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self)
    }

    pub fn as_millis(self) -> i64 {
        self.0.timestamp_millis()
    }

    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// A fresh timestamp strictly later than `previous`, even when the wall
    /// clock has not advanced (or went backwards) since it was written.
    ///
    /// `None` when `previous` is the last representable millisecond.
    pub fn successor_of(previous: Timestamp) -> Option<Self> {
        let floor = previous.0.checked_add_signed(Duration::milliseconds(1))?;
        Some(Self::now().max(Self(floor)))
    }

    pub fn to_rfc3339(self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(raw.trim())
            .map(|parsed| Self::from_datetime(parsed.with_timezone(&Utc)))
            .map_err(|err| {
                serde::de::Error::custom(format!("'{raw}' is not an RFC 3339 timestamp ({err})"))
            })
    }
}

/// Catalogue entry an applicant can claim experience in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competence {
    pub competence_id: i64,
    pub name: String,
}

/// Claimed skill plus years of experience, owned by one applicant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetenceProfile {
    pub competence_profile_id: i64,
    pub competence_id: i64,
    pub competence: String,
    pub years_of_experience: f64,
}

/// Date range during which an applicant claims to be available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityPeriod {
    pub availability_id: i64,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

/// Applicant row together with its child records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicantRecord {
    pub id: ApplicantId,
    pub name: String,
    pub surname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_id: Option<String>,
    #[serde(skip_serializing)]
    pub role: Option<Role>,
    pub status: ApplicationStatus,
    pub created_at: Timestamp,
    pub last_modified_at: Timestamp,
    pub competence_profiles: Vec<CompetenceProfile>,
    pub availability_periods: Vec<AvailabilityPeriod>,
}

/// Registration payload; child records are created alongside the applicant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewApplicant {
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub personal_id: Option<String>,
    #[serde(default)]
    pub competence_profiles: Vec<NewCompetenceProfile>,
    #[serde(default)]
    pub availability_periods: Vec<NewAvailabilityPeriod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCompetenceProfile {
    pub competence_id: i64,
    pub years_of_experience: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAvailabilityPeriod {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

/// Result of a committed status change: what it was, and the row as stored now.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusTransition {
    pub previous: ApplicationStatus,
    pub record: ApplicantRecord,
}
