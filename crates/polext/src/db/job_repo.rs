//! CRUD operations for the `jobs` table.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, Row};

use super::Database;
use crate::error::PersistenceError;
use crate::model::{DocumentState, Job, JobStatus, PolicyExtract};

/// A raw job row. JSON columns are kept as text.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub policy_type: String,
    pub status: String,
    pub documents: String,
    pub extracted_data: Option<String>,
    pub artifact: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn corrupt(job_id: &str, reason: impl ToString) -> PersistenceError {
    PersistenceError::Corrupt {
        job_id: job_id.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_timestamp(s: &str, job_id: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(job_id, format!("invalid timestamp '{}': {}", s, e)))
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            policy_type: row.get("policy_type")?,
            status: row.get("status")?,
            documents: row.get("documents")?,
            extracted_data: row.get("extracted_data")?,
            artifact: row.get("artifact")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn from_job(job: &Job) -> Result<Self, PersistenceError> {
        let extracted_data = job
            .extracted_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        Ok(Self {
            id: job.job_id.clone(),
            policy_type: job.policy_type.clone(),
            status: job.status.as_str().to_string(),
            documents: serde_json::to_string(&job.documents)?,
            extracted_data,
            artifact: job.artifact.clone(),
            error: job.error.clone(),
            created_at: format_timestamp(job.created_at),
            updated_at: format_timestamp(job.updated_at),
        })
    }

    /// Converts the row into a job. Unknown statuses and malformed JSON are
    /// reported as `Corrupt`.
    pub fn into_job(self) -> Result<Job, PersistenceError> {
        let status: JobStatus = self.status.parse().map_err(|e| corrupt(&self.id, e))?;
        let documents: Vec<DocumentState> =
            serde_json::from_str(&self.documents).map_err(|e| corrupt(&self.id, e))?;
        let extracted_data: Option<PolicyExtract> = self
            .extracted_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| corrupt(&self.id, e))?;
        let created_at = parse_timestamp(&self.created_at, &self.id)?;
        let updated_at = parse_timestamp(&self.updated_at, &self.id)?;

        Ok(Job {
            job_id: self.id,
            policy_type: self.policy_type,
            status,
            documents,
            extracted_data,
            artifact: self.artifact,
            error: self.error,
            created_at,
            updated_at,
        })
    }
}

pub fn insert(db: &Database, job: &JobRow) -> Result<(), PersistenceError> {
    db.with_conn(|conn| {
        let result = conn.execute(
            "INSERT INTO jobs (id, policy_type, status, documents, extracted_data, artifact,
             error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                job.id,
                job.policy_type,
                job.status,
                job.documents,
                job.extracted_data,
                job.artifact,
                job.error,
                job.created_at,
                job.updated_at,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(PersistenceError::AlreadyExists(job.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    })
}

fn update_row(conn: &Connection, job: &JobRow) -> Result<bool, PersistenceError> {
    let changed = conn.execute(
        "UPDATE jobs SET policy_type=?2, status=?3, documents=?4, extracted_data=?5,
         artifact=?6, error=?7, updated_at=?8
         WHERE id=?1",
        params![
            job.id,
            job.policy_type,
            job.status,
            job.documents,
            job.extracted_data,
            job.artifact,
            job.error,
            job.updated_at,
        ],
    )?;
    Ok(changed > 0)
}

fn select_by_id(conn: &Connection, id: &str) -> Result<Option<JobRow>, PersistenceError> {
    let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
    let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
    match rows.next() {
        Some(Ok(row)) => Ok(Some(row)),
        Some(Err(e)) => Err(PersistenceError::Sqlite(e)),
        None => Ok(None),
    }
}

/// Overwrites every column except `id` and `created_at`. Returns whether a row matched.
pub fn update(db: &Database, job: &JobRow) -> Result<bool, PersistenceError> {
    db.with_conn(|conn| update_row(conn, job))
}

/// Reads a row, passes it through `f` and writes the result back in one
/// transaction. Returns `false` when no row has this id. An error from `f`
/// leaves the row untouched.
pub fn modify<F>(db: &Database, id: &str, f: F) -> Result<bool, PersistenceError>
where
    F: FnOnce(JobRow) -> Result<JobRow, PersistenceError>,
{
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let Some(row) = select_by_id(&tx, id)? else {
            return Ok(false);
        };
        let changed = update_row(&tx, &f(row)?)?;
        tx.commit()?;
        Ok(changed)
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, PersistenceError> {
    db.with_conn(|conn| select_by_id(conn, id))
}

pub fn delete(db: &Database, id: &str) -> Result<bool, PersistenceError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}

/// All rows, newest first.
pub fn list_all(db: &Database) -> Result<Vec<JobRow>, PersistenceError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs ORDER BY created_at DESC")?;
        let rows = stmt
            .query_map([], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
