//! Station metadata shared by all travelers.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::domain::{StationId, StationMetadata};

use super::{StoreError, decode, encode};

const WHAT: &str = "station";

pub async fn upsert(
    conn: &mut SqliteConnection,
    meta: &StationMetadata,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO stations (eva, name, body, updated_at) VALUES (?, ?, ?, ?)
        ON CONFLICT (eva) DO UPDATE SET
            name = excluded.name,
            body = excluded.body,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(i64::from(meta.id.get()))
    .bind(&meta.name)
    .bind(encode(WHAT, meta)?)
    .bind(now.timestamp())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get(
    conn: &mut SqliteConnection,
    id: StationId,
) -> Result<Option<StationMetadata>, StoreError> {
    let body: Option<String> = sqlx::query_scalar("SELECT body FROM stations WHERE eva = ?")
        .bind(i64::from(id.get()))
        .fetch_optional(&mut *conn)
        .await?;

    body.map(|b| decode(WHAT, &b)).transpose()
}
