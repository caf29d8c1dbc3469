//! SQLite repositories for the records served by the HTTP API.
//!
//! Every function takes a borrowed connection so callers decide whether it
//! runs inside a transaction. Rows are always scoped to the owning user.

pub mod chat;
pub mod plans;
pub mod sessions;
pub mod users;

use r2d2_sqlite::rusqlite::{self, types::Type};

/// Decode a JSON text column inside a row-mapping closure.
pub(crate) fn json_column<T: serde::de::DeserializeOwned>(
    idx: usize,
    raw: &str,
) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}
