//! HTTP surface consumed by the web frontend.
//!
//! Handlers live in [`v1`], token handling and the authenticated-user
//! extractor in [`auth`], and [`routes`] assembles the axum router with its
//! CORS and tracing layers.

pub mod auth;
pub mod error;
pub mod routes;
pub mod v1;

use std::sync::Arc;

use r2d2_sqlite::rusqlite::Connection;
use tokio::task::spawn_blocking;

use crate::agents::ProviderChain;
use crate::config::AuthSettings;
use crate::db::DbPool;
use crate::errors::StudyError;

pub use auth::{AuthUser, TokenService};
pub use error::{ApiError, ApiResult};
pub use routes::router;

/// Shared state injected into each handler.
#[derive(Clone)]
pub struct ApiState {
    pub db: DbPool,
    pub chain: Arc<ProviderChain>,
    pub tokens: Arc<TokenService>,
    pub password_cost: u32,
}

impl ApiState {
    pub fn new(db: DbPool, chain: ProviderChain, auth: &AuthSettings) -> Self {
        Self {
            db,
            chain: Arc::new(chain),
            tokens: Arc::new(TokenService::new(auth)),
            password_cost: auth.password_cost,
        }
    }

    /// Run `work` with a pooled connection on the blocking thread pool.
    pub(crate) async fn with_conn<T, F>(&self, work: F) -> ApiResult<T>
    where
        F: FnOnce(&mut Connection) -> Result<T, StudyError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.db.clone();
        let result = spawn_blocking(move || {
            let mut conn = pool.get()?;
            work(&mut *conn)
        })
        .await?;
        Ok(result?)
    }
}
