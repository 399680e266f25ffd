//! Active sessions (`in_transit`).

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::domain::{TransitSession, TravelerId};

use super::{StoreError, decode, encode};

const WHAT: &str = "session";

/// Read a traveler's session without locking.
pub async fn get(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
) -> Result<Option<TransitSession>, StoreError> {
    let body: Option<String> = sqlx::query_scalar("SELECT body FROM in_transit WHERE user_id = ?")
        .bind(traveler.0)
        .fetch_optional(&mut *conn)
        .await?;

    body.map(|b| decode(WHAT, &b)).transpose()
}

/// Take the write lock, then read the session.
///
/// Must be the first statement of a transaction that decides on the
/// session. SQLite upgrades to a write lock on the first write, so bumping
/// the revision here makes concurrent deciders queue up before reading
/// rather than after.
pub async fn lock(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
) -> Result<Option<TransitSession>, StoreError> {
    sqlx::query("UPDATE in_transit SET revision = revision + 1 WHERE user_id = ?")
        .bind(traveler.0)
        .execute(&mut *conn)
        .await?;

    get(conn, traveler).await
}

/// Create a session. Fails if the traveler already has one.
pub async fn insert(
    conn: &mut SqliteConnection,
    session: &TransitSession,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO in_transit (user_id, train_id, dep_eva, arr_eva, body, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.traveler.0)
    .bind(session.train_id.as_str())
    .bind(i64::from(session.departure.id.get()))
    .bind(session.arrival.as_ref().map(|s| i64::from(s.id.get())))
    .bind(encode(WHAT, session)?)
    .bind(now.timestamp())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Overwrite a traveler's session. Returns false if there was none.
pub async fn update(
    conn: &mut SqliteConnection,
    session: &TransitSession,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE in_transit
        SET train_id = ?, dep_eva = ?, arr_eva = ?, body = ?, updated_at = ?
        WHERE user_id = ?
        "#,
    )
    .bind(session.train_id.as_str())
    .bind(i64::from(session.departure.id.get()))
    .bind(session.arrival.as_ref().map(|s| i64::from(s.id.get())))
    .bind(encode(WHAT, session)?)
    .bind(now.timestamp())
    .bind(session.traveler.0)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove a traveler's session. Returns false if there was none.
pub async fn delete(conn: &mut SqliteConnection, traveler: TravelerId) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM in_transit WHERE user_id = ?")
        .bind(traveler.0)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// All active sessions, oldest update first.
pub async fn list_active(conn: &mut SqliteConnection) -> Result<Vec<TransitSession>, StoreError> {
    let bodies: Vec<String> =
        sqlx::query_scalar("SELECT body FROM in_transit ORDER BY updated_at, user_id")
            .fetch_all(&mut *conn)
            .await?;

    bodies.iter().map(|b| decode(WHAT, b)).collect()
}
