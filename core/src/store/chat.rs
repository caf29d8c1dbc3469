use std::fmt;

use r2d2_sqlite::rusqlite::types::Type;
use r2d2_sqlite::rusqlite::{self, params, Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::errors::StudyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessageRecord {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub role: ChatRole,
    pub timestamp: i64,
}

fn row_to_message(row: &Row) -> rusqlite::Result<ChatMessageRecord> {
    let role: String = row.get(3)?;
    let role = ChatRole::parse(&role).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, format!("unknown chat role {role:?}").into())
    })?;
    Ok(ChatMessageRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        role,
        timestamp: row.get(4)?,
    })
}

fn insert(conn: &Connection, user_id: &str, role: ChatRole, content: &str, now: i64) -> rusqlite::Result<ChatMessageRecord> {
    let record = ChatMessageRecord {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        content: content.to_string(),
        role,
        timestamp: now,
    };
    conn.execute(
        "INSERT INTO chat_messages (id, user_id, content, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![record.id, record.user_id, record.content, role.as_str(), now],
    )?;
    Ok(record)
}

/// Stores a user message and the reply to it atomically.
pub fn append_exchange(
    conn: &mut Connection,
    user_id: &str,
    message: &str,
    reply: &str,
) -> Result<(ChatMessageRecord, ChatMessageRecord), StudyError> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let tx = conn.transaction()?;
    let asked = insert(&tx, user_id, ChatRole::User, message, now)?;
    let answered = insert(&tx, user_id, ChatRole::Assistant, reply, now)?;
    tx.commit()?;
    Ok((asked, answered))
}

/// Newest messages first; rows written in the same second keep insertion order reversed.
pub fn recent_messages(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> Result<Vec<ChatMessageRecord>, StudyError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, content, role, created_at FROM chat_messages WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![user_id, limit as i64], row_to_message)?;
    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

/// Returns the number of deleted messages.
pub fn clear_messages(conn: &Connection, user_id: &str) -> Result<usize, StudyError> {
    Ok(conn.execute("DELETE FROM chat_messages WHERE user_id = ?1", [user_id])?)
}
