//! Traveler accounts, webhooks and third-party sync bookkeeping.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::domain::{TravelerId, Visibility};

use super::StoreError;

/// A traveler account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Traveler {
    pub id: TravelerId,
    pub name: String,
    /// Used when a trip does not set its own visibility
    pub default_visibility: Visibility,
}

fn traveler((id, name, level): (i64, String, i64)) -> Traveler {
    Traveler {
        id: TravelerId(id),
        name,
        default_visibility: Visibility::from_level(level),
    }
}

pub async fn create(
    conn: &mut SqliteConnection,
    name: &str,
    default_visibility: Visibility,
) -> Result<TravelerId, StoreError> {
    let id: i64 =
        sqlx::query_scalar("INSERT INTO travelers (name, public_level) VALUES (?, ?) RETURNING id")
            .bind(name)
            .bind(default_visibility.level())
            .fetch_one(&mut *conn)
            .await?;

    Ok(TravelerId(id))
}

pub async fn get(conn: &mut SqliteConnection, id: TravelerId) -> Result<Option<Traveler>, StoreError> {
    let row: Option<(i64, String, i64)> =
        sqlx::query_as("SELECT id, name, public_level FROM travelers WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(row.map(traveler))
}

pub async fn by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<Traveler>, StoreError> {
    let row: Option<(i64, String, i64)> =
        sqlx::query_as("SELECT id, name, public_level FROM travelers WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(row.map(traveler))
}

/// A traveler's notification endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Webhook {
    pub url: String,
    pub token: Option<String>,
    pub enabled: bool,
}

pub async fn set_webhook(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
    hook: &Webhook,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO webhooks (user_id, url, token, enabled) VALUES (?, ?, ?, ?)
        ON CONFLICT (user_id) DO UPDATE SET
            url = excluded.url,
            token = excluded.token,
            enabled = excluded.enabled
        "#,
    )
    .bind(traveler.0)
    .bind(&hook.url)
    .bind(&hook.token)
    .bind(hook.enabled)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn webhook(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
) -> Result<Option<Webhook>, StoreError> {
    let row: Option<(String, Option<String>, bool)> =
        sqlx::query_as("SELECT url, token, enabled FROM webhooks WHERE user_id = ?")
            .bind(traveler.0)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(row.map(|(url, token, enabled)| Webhook {
        url,
        token,
        enabled,
    }))
}

/// Outcome of the latest delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRun {
    pub at: DateTime<Utc>,
    pub errored: bool,
    pub output: String,
}

pub async fn record_webhook_run(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
    run: &WebhookRun,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE webhooks SET latest_run = ?, errored = ?, output = ? WHERE user_id = ?")
        .bind(run.at.timestamp())
        .bind(run.errored)
        .bind(&run.output)
        .bind(traveler.0)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn webhook_run(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
) -> Result<Option<WebhookRun>, StoreError> {
    let row: Option<(Option<i64>, Option<bool>, Option<String>)> = sqlx::query_as(
        "SELECT latest_run, errored, output FROM webhooks WHERE user_id = ?",
    )
    .bind(traveler.0)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.and_then(|(at, errored, output)| {
        Some(WebhookRun {
            at: DateTime::from_timestamp(at?, 0)?,
            errored: errored.unwrap_or(false),
            output: output.unwrap_or_default(),
        })
    }))
}

/// Latest external status id that was processed.
pub async fn sync_state(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
) -> Result<Option<i64>, StoreError> {
    Ok(
        sqlx::query_scalar("SELECT latest_status_id FROM sync_state WHERE user_id = ?")
            .bind(traveler.0)
            .fetch_optional(&mut *conn)
            .await?,
    )
}

pub async fn mark_synced(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
    status_id: i64,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO sync_state (user_id, latest_status_id) VALUES (?, ?)
        ON CONFLICT (user_id) DO UPDATE SET latest_status_id = excluded.latest_status_id
        "#,
    )
    .bind(traveler.0)
    .bind(status_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// One human-readable sync outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncLogEntry {
    pub status_id: i64,
    pub message: String,
    pub is_error: bool,
    pub logged_at: DateTime<Utc>,
}

pub async fn log_sync(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
    entry: &SyncLogEntry,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO sync_log (user_id, status_id, message, is_error, logged_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(traveler.0)
    .bind(entry.status_id)
    .bind(&entry.message)
    .bind(entry.is_error)
    .bind(entry.logged_at.timestamp())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Sync log, newest first.
pub async fn sync_log(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
    limit: u32,
) -> Result<Vec<SyncLogEntry>, StoreError> {
    let rows: Vec<(i64, String, bool, i64)> = sqlx::query_as(
        r#"
        SELECT status_id, message, is_error, logged_at FROM sync_log
        WHERE user_id = ?
        ORDER BY logged_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(traveler.0)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(status_id, message, is_error, logged_at)| SyncLogEntry {
            status_id,
            message,
            is_error,
            logged_at: DateTime::from_timestamp(logged_at, 0).unwrap_or_default(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn travelers_by_id_and_name() {
        let store = Store::in_memory().await.unwrap();
        let mut conn = store.conn().await.unwrap();

        let id = create(&mut conn, "alice", Visibility::Unlisted).await.unwrap();
        let alice = get(&mut conn, id).await.unwrap().unwrap();
        assert_eq!(alice.name, "alice");
        assert_eq!(alice.default_visibility, Visibility::Unlisted);
        assert_eq!(by_name(&mut conn, "alice").await.unwrap(), Some(alice));
        assert_eq!(by_name(&mut conn, "bob").await.unwrap(), None);

        // Names are unique
        assert!(create(&mut conn, "alice", Visibility::Public).await.is_err());
    }

    #[tokio::test]
    async fn webhook_roundtrip() {
        let store = Store::in_memory().await.unwrap();
        let mut conn = store.conn().await.unwrap();
        let id = create(&mut conn, "alice", Visibility::Private).await.unwrap();

        assert_eq!(webhook(&mut conn, id).await.unwrap(), None);

        let hook = Webhook {
            url: "http://localhost:9999/hook".into(),
            token: Some("secret".into()),
            enabled: true,
        };
        set_webhook(&mut conn, id, &hook).await.unwrap();
        assert_eq!(webhook(&mut conn, id).await.unwrap(), Some(hook));
        assert_eq!(webhook_run(&mut conn, id).await.unwrap(), None);

        let run = WebhookRun {
            at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            errored: true,
            output: "connection refused".into(),
        };
        record_webhook_run(&mut conn, id, &run).await.unwrap();
        assert_eq!(webhook_run(&mut conn, id).await.unwrap(), Some(run));
    }

    #[tokio::test]
    async fn sync_bookkeeping() {
        let store = Store::in_memory().await.unwrap();
        let mut conn = store.conn().await.unwrap();
        let id = create(&mut conn, "alice", Visibility::Private).await.unwrap();

        assert_eq!(sync_state(&mut conn, id).await.unwrap(), None);
        mark_synced(&mut conn, id, 41).await.unwrap();
        mark_synced(&mut conn, id, 42).await.unwrap();
        assert_eq!(sync_state(&mut conn, id).await.unwrap(), Some(42));

        for (status_id, at) in [(41, 1_700_000_000), (42, 1_700_000_100)] {
            log_sync(
                &mut conn,
                id,
                &SyncLogEntry {
                    status_id,
                    message: format!("status {status_id}"),
                    is_error: status_id == 42,
                    logged_at: DateTime::from_timestamp(at, 0).unwrap(),
                },
            )
            .await
            .unwrap();
        }

        let log = sync_log(&mut conn, id, 10).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].status_id, 42);
        assert!(log[0].is_error);
        assert_eq!(sync_log(&mut conn, id, 1).await.unwrap().len(), 1);
    }
}
