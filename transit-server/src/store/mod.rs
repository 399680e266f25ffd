//! SQLite-backed session store.
//!
//! Holds the active session per traveler, finalized journeys, the shared
//! polyline table, the statistics cache and the small amount of account data
//! the engine's collaborators need.
//!
//! Every operation takes a `&mut SqliteConnection`, so the same function
//! works on a pooled connection or inside a transaction:
//!
//! ```ignore
//! let mut tx = store.begin().await?;
//! let session = sessions::lock(&mut tx, traveler).await?;
//! // ...
//! tx.commit().await?;
//! ```

pub mod journeys;
pub mod polylines;
pub mod sessions;
pub mod stations;
pub mod stats;
pub mod travelers;

use std::str::FromStr;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::domain::{JourneyId, TimeError};

/// Errors from the session store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A stored JSON body does not decode
    #[error("corrupt {what} record: {source}")]
    Corrupt {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("journey {0} not found")]
    JourneyNotFound(JourneyId),

    /// The journey was edited by hand and cannot be turned back into a session
    #[error("journey {0} has been edited")]
    JourneyEdited(JourneyId),

    #[error(transparent)]
    Time(#[from] TimeError),
}

pub(crate) fn encode<T: serde::Serialize>(what: &'static str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Corrupt { what, source })
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(what: &'static str, body: &str) -> Result<T, StoreError> {
    serde_json::from_str(body).map_err(|source| StoreError::Corrupt { what, source })
}

/// Handle to the database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database at `url` and run migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        Self::migrate(pool).await
    }

    /// A private in-memory database.
    ///
    /// Uses a single connection that is never recycled, since each new
    /// in-memory connection would see an empty database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, StoreError> {
        let migrator = sqlx::migrate!("./migrations");
        migrator.run(&pool).await?;
        info!(migrations = migrator.migrations.len(), "database migrations completed");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.pool.begin().await?)
    }

    /// Check out a connection for reads outside a transaction.
    pub async fn conn(&self) -> Result<PoolConnection<Sqlite>, StoreError> {
        Ok(self.pool.acquire().await?)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::{TravelerId, Visibility};

    /// In-memory store with one traveler named "alice".
    pub async fn store_with_traveler() -> (Store, TravelerId) {
        let store = Store::in_memory().await.unwrap();
        let mut conn = store.conn().await.unwrap();
        let id = travelers::create(&mut conn, "alice", Visibility::Public)
            .await
            .unwrap();
        (store, id)
    }
}
