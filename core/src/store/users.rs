use r2d2_sqlite::rusqlite::{self, params, Connection, OptionalExtension, Row};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::errors::StudyError;

#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

const USER_COLUMNS: &str =
    "id, email, username, password_hash, is_active, created_at, updated_at";

fn row_to_user(row: &Row) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        is_active: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Emails are compared case-insensitively.
pub fn normalise_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn create_user(
    conn: &Connection,
    email: &str,
    username: Option<&str>,
    password_hash: &str,
) -> Result<UserRecord, StudyError> {
    let email = normalise_email(email);
    if find_by_email(conn, &email)?.is_some() {
        return Err(StudyError::EmailTaken);
    }
    let username = username.map(str::trim).filter(|name| !name.is_empty());
    if let Some(name) = username {
        let taken: Option<String> = conn
            .query_row("SELECT id FROM users WHERE username = ?1", [name], |row| row.get(0))
            .optional()?;
        if taken.is_some() {
            return Err(StudyError::InvalidInput(format!("username {name:?} is already taken")));
        }
    }

    let id = Uuid::new_v4().to_string();
    let now = OffsetDateTime::now_utc().unix_timestamp();
    conn.execute(
        "INSERT INTO users (id, email, username, password_hash, is_active, created_at) VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        params![id, email, username, password_hash, now],
    )?;
    get_user(conn, &id)
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<UserRecord>, StudyError> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            [normalise_email(email)],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn get_user(conn: &Connection, user_id: &str) -> Result<UserRecord, StudyError> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [user_id],
        row_to_user,
    )
    .optional()?
    .ok_or(StudyError::UserNotFound)
}
