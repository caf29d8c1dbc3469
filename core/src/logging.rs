use r2d2_sqlite::rusqlite::{self, params, Connection};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// Severity recorded in the `event_log` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    fn as_log_level(&self) -> log::Level {
        match self {
            Self::Info => log::Level::Info,
            Self::Warn => log::Level::Warn,
            Self::Error => log::Level::Error,
        }
    }
}

/// Persist a structured diagnostic row and mirror it to the `log` facade.
pub fn log_event(
    conn: &Connection,
    level: EventLevel,
    code: Option<&str>,
    module: &str,
    message: &str,
    explain: Option<&str>,
    data: Option<Value>,
) -> rusqlite::Result<()> {
    log::log!(
        target: module,
        level.as_log_level(),
        "{}{}",
        code.map(|c| format!("[{c}] ")).unwrap_or_default(),
        message
    );
    let id = Uuid::new_v4().to_string();
    let ts = OffsetDateTime::now_utc().unix_timestamp();
    let data_str = data.map(|v| v.to_string());
    conn.execute(
        "INSERT INTO event_log (id, ts, level, code, module, message, explain, data) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![id, ts, level.as_str(), code, module, message, explain, data_str],
    )?;
    Ok(())
}

/// Row shape returned by [`recent_events`].
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub id: String,
    pub ts: i64,
    pub level: String,
    pub code: Option<String>,
    pub message: String,
    pub explain: Option<String>,
    pub data: Option<Value>,
}

/// Most recent events for a module, newest first.
pub fn recent_events(
    conn: &Connection,
    module: &str,
    limit: usize,
) -> rusqlite::Result<Vec<EventRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, ts, level, code, message, explain, data FROM event_log WHERE module = ?1 ORDER BY ts DESC, rowid DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![module, limit as i64], |row| {
        let data_str: Option<String> = row.get(6)?;
        Ok(EventRecord {
            id: row.get(0)?,
            ts: row.get(1)?,
            level: row.get(2)?,
            code: row.get(3)?,
            message: row.get(4)?,
            explain: row.get(5)?,
            data: data_str.and_then(|raw| serde_json::from_str(&raw).ok()),
        })
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[test]
    fn events_round_trip_with_data() {
        let (_dir, pool) = test_pool();
        let conn = pool.get().unwrap();
        log_event(
            &conn,
            EventLevel::Warn,
            Some("AI-0300"),
            "ai.chat",
            "fallback used",
            None,
            Some(serde_json::json!({ "attempts": 2 })),
        )
        .unwrap();

        let events = recent_events(&conn, "ai.chat", 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, "warn");
        assert_eq!(events[0].code.as_deref(), Some("AI-0300"));
        assert_eq!(events[0].data, Some(serde_json::json!({ "attempts": 2 })));
        assert!(recent_events(&conn, "other", 10).unwrap().is_empty());
    }
}
