use std::fmt;
use std::str::FromStr;

use r2d2_sqlite::rusqlite::types::Type;
use r2d2_sqlite::rusqlite::{self, params, Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::errors::StudyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Focus,
    Review,
    Break,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::Review => "review",
            Self::Break => "break",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "focus" => Ok(Self::Focus),
            "review" => Ok(Self::Review),
            "break" => Ok(Self::Break),
            other => Err(StudyError::InvalidInput(format!("unknown session type {other:?}"))),
        }
    }
}

/// Payload accepted by `POST /api/study-plan/sessions`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStudySession {
    pub subject: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub session_type: SessionType,
    pub notes: Option<String>,
    #[serde(default)]
    pub study_plan_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudySessionRecord {
    pub id: String,
    pub user_id: String,
    pub study_plan_id: Option<String>,
    pub subject: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    /// Minutes between start and end.
    pub duration: i64,
    pub session_type: SessionType,
    pub completed: bool,
    pub notes: Option<String>,
    pub created_at: i64,
}

const SESSION_COLUMNS: &str = "id, user_id, study_plan_id, subject, start_time, end_time, duration, session_type, completed, notes, created_at";

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let ts: i64 = row.get(idx)?;
    OffsetDateTime::from_unix_timestamp(ts)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(err)))
}

fn row_to_session(row: &Row) -> rusqlite::Result<StudySessionRecord> {
    let kind: String = row.get(7)?;
    Ok(StudySessionRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        study_plan_id: row.get(2)?,
        subject: row.get(3)?,
        start_time: timestamp_column(row, 4)?,
        end_time: timestamp_column(row, 5)?,
        duration: row.get(6)?,
        session_type: kind
            .parse()
            .map_err(|err: StudyError| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(err)))?,
        completed: row.get::<_, i64>(8)? != 0,
        notes: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn collect(stmt: &mut rusqlite::Statement<'_>, params: impl rusqlite::Params) -> Result<Vec<StudySessionRecord>, StudyError> {
    let rows = stmt.query_map(params, row_to_session)?;
    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(row?);
    }
    Ok(sessions)
}

pub fn create_session(
    conn: &Connection,
    user_id: &str,
    input: &NewStudySession,
) -> Result<StudySessionRecord, StudyError> {
    let subject = input.subject.trim();
    if subject.is_empty() {
        return Err(StudyError::InvalidInput("subject must not be empty".into()));
    }
    if input.end_time <= input.start_time {
        return Err(StudyError::InvalidInput("end_time must be after start_time".into()));
    }

    let record = StudySessionRecord {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        study_plan_id: input.study_plan_id.clone(),
        subject: subject.to_string(),
        start_time: input.start_time,
        end_time: input.end_time,
        duration: (input.end_time - input.start_time).whole_minutes(),
        session_type: input.session_type,
        completed: false,
        notes: input.notes.clone(),
        created_at: OffsetDateTime::now_utc().unix_timestamp(),
    };
    conn.execute(
        "INSERT INTO study_sessions (id, user_id, study_plan_id, subject, start_time, end_time, duration, session_type, completed, notes, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10)",
        params![
            record.id,
            record.user_id,
            record.study_plan_id,
            record.subject,
            record.start_time.unix_timestamp(),
            record.end_time.unix_timestamp(),
            record.duration,
            record.session_type.as_str(),
            record.notes,
            record.created_at,
        ],
    )?;
    Ok(record)
}

/// Sessions ordered by start time, latest first.
pub fn list_sessions(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> Result<Vec<StudySessionRecord>, StudyError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM study_sessions WHERE user_id = ?1 ORDER BY start_time DESC LIMIT ?2"
    ))?;
    collect(&mut stmt, params![user_id, limit as i64])
}

/// Sessions starting in `[from, until)`, earliest first.
pub fn sessions_between(
    conn: &Connection,
    user_id: &str,
    from: OffsetDateTime,
    until: OffsetDateTime,
) -> Result<Vec<StudySessionRecord>, StudyError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM study_sessions WHERE user_id = ?1 AND start_time >= ?2 AND start_time < ?3 ORDER BY start_time ASC"
    ))?;
    collect(
        &mut stmt,
        params![user_id, from.unix_timestamp(), until.unix_timestamp()],
    )
}

/// Sessions starting at or after `now`, earliest first.
pub fn upcoming_sessions(
    conn: &Connection,
    user_id: &str,
    now: OffsetDateTime,
    limit: usize,
) -> Result<Vec<StudySessionRecord>, StudyError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM study_sessions WHERE user_id = ?1 AND start_time >= ?2 ORDER BY start_time ASC LIMIT ?3"
    ))?;
    collect(&mut stmt, params![user_id, now.unix_timestamp(), limit as i64])
}

pub fn complete_session(conn: &Connection, user_id: &str, session_id: &str) -> Result<(), StudyError> {
    let changed = conn.execute(
        "UPDATE study_sessions SET completed = 1 WHERE id = ?1 AND user_id = ?2",
        params![session_id, user_id],
    )?;
    if changed == 0 {
        return Err(StudyError::SessionNotFound);
    }
    Ok(())
}

pub fn delete_session(conn: &Connection, user_id: &str, session_id: &str) -> Result<(), StudyError> {
    let changed = conn.execute(
        "DELETE FROM study_sessions WHERE id = ?1 AND user_id = ?2",
        params![session_id, user_id],
    )?;
    if changed == 0 {
        return Err(StudyError::SessionNotFound);
    }
    Ok(())
}
