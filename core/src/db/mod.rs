use anyhow::{Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub type DbPool = Pool<SqliteConnectionManager>;

const DB_FILE: &str = "loackin.db";

pub fn init_db(data_dir: PathBuf) -> Result<DbPool> {
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
    open_pool(&data_dir.join(DB_FILE))
}

fn open_pool(db_path: &Path) -> Result<DbPool> {
    let mgr = SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;"));
    let pool = Pool::new(mgr).context("failed to build SQLite pool")?;
    {
        let conn = pool.get()?;
        apply_migrations(&conn)?;
    }
    log::info!("database ready at {}", db_path.display());
    Ok(pool)
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    let migrations: &[(&str, &str)] = &[(
        "0001_init.sql",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../migrations/0001_init.sql")),
    )];

    for (name, sql) in migrations {
        conn.execute_batch(sql)
            .with_context(|| format!("failed to apply migration {name}"))?;
    }
    Ok(())
}

/// List the tables present in the database, used by the health endpoint.
pub fn table_names(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect()
}

#[cfg(test)]
pub(crate) fn test_pool() -> (tempfile::TempDir, DbPool) {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = init_db(dir.path().to_path_buf()).expect("init db");
    (dir, pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_create_all_tables_and_are_repeatable() {
        let (dir, pool) = test_pool();
        let conn = pool.get().unwrap();
        let tables = table_names(&conn).unwrap();
        for expected in ["chat_messages", "event_log", "study_plans", "study_sessions", "users"] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
        drop(conn);
        drop(pool);

        init_db(dir.path().to_path_buf()).expect("second init succeeds");
    }
}
