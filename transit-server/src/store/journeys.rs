//! Finalized journeys.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::domain::{EditFlags, Journey, JourneyId, MonthKey, TransitSession, TravelerId};

use super::{StoreError, decode, encode};

const WHAT: &str = "journey";

type JourneyRow = (i64, i64, i64, String);

fn from_row((id, edited, checkout_time, body): JourneyRow) -> Result<Journey, StoreError> {
    Ok(Journey {
        id: JourneyId(id),
        edited: EditFlags::from_bits(edited as u16),
        checked_out_at: DateTime::from_timestamp(checkout_time, 0).unwrap_or_default(),
        trip: decode(WHAT, &body)?,
    })
}

/// Append a journey built from `session`.
pub async fn insert_from_session(
    conn: &mut SqliteConnection,
    session: &TransitSession,
    checked_out_at: DateTime<Utc>,
) -> Result<Journey, StoreError> {
    let month = session.month();

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO journeys
            (user_id, train_id, dep_eva, arr_eva, year, month, cancelled, checkout_time, body)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(session.traveler.0)
    .bind(session.train_id.as_str())
    .bind(i64::from(session.departure.id.get()))
    .bind(session.arrival.as_ref().map(|s| i64::from(s.id.get())))
    .bind(month.year)
    .bind(month.month)
    .bind(session.cancelled)
    .bind(checked_out_at.timestamp())
    .bind(encode(WHAT, session)?)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Journey::from_session(
        JourneyId(id),
        session.clone(),
        // Round-trip through the column's resolution
        DateTime::from_timestamp(checked_out_at.timestamp(), 0).unwrap_or(checked_out_at),
    ))
}

/// A traveler's journey by id.
pub async fn get(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
    id: JourneyId,
) -> Result<Option<Journey>, StoreError> {
    let row: Option<JourneyRow> = sqlx::query_as(
        "SELECT id, edited, checkout_time, body FROM journeys WHERE user_id = ? AND id = ?",
    )
    .bind(traveler.0)
    .bind(id.0)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(from_row).transpose()
}

/// The most recently finalized journey.
pub async fn latest(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
) -> Result<Option<Journey>, StoreError> {
    let row: Option<JourneyRow> = sqlx::query_as(
        r#"
        SELECT id, edited, checkout_time, body FROM journeys
        WHERE user_id = ?
        ORDER BY checkout_time DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(traveler.0)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(from_row).transpose()
}

/// Journeys filed under a month, in departure order.
pub async fn in_month(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
    month: MonthKey,
) -> Result<Vec<Journey>, StoreError> {
    let rows: Vec<JourneyRow> = sqlx::query_as(
        r#"
        SELECT id, edited, checkout_time, body FROM journeys
        WHERE user_id = ? AND year = ? AND month = ?
        ORDER BY checkout_time, id
        "#,
    )
    .bind(traveler.0)
    .bind(month.year)
    .bind(month.month)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(from_row).collect()
}

/// Remove the traveler's latest journey and hand back the session it was
/// made from.
///
/// `id` must name that latest journey. Refuses edited journeys without
/// touching them.
pub async fn pop_latest(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
    id: JourneyId,
) -> Result<Journey, StoreError> {
    let journey = latest(conn, traveler)
        .await?
        .filter(|j| j.id == id)
        .ok_or(StoreError::JourneyNotFound(id))?;

    if journey.edited.is_edited() {
        return Err(StoreError::JourneyEdited(id));
    }

    sqlx::query("DELETE FROM journeys WHERE user_id = ? AND id = ?")
        .bind(traveler.0)
        .bind(id.0)
        .execute(&mut *conn)
        .await?;

    Ok(journey)
}

/// Record a manual edit.
pub async fn mark_edited(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
    id: JourneyId,
    flags: EditFlags,
) -> Result<bool, StoreError> {
    let result = sqlx::query("UPDATE journeys SET edited = edited | ? WHERE user_id = ? AND id = ?")
        .bind(i64::from(flags.bits()))
        .bind(traveler.0)
        .bind(id.0)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::fixtures;
    use crate::store::test_support::store_with_traveler;
    use chrono::TimeZone;

    #[tokio::test]
    async fn insert_and_read_back() {
        let (store, alice) = store_with_traveler().await;
        let mut conn = store.conn().await.unwrap();
        let mut session = fixtures::session();
        session.traveler = alice;
        let at = Utc.with_ymd_and_hms(2024, 10, 15, 8, 30, 0).unwrap();

        let journey = insert_from_session(&mut conn, &session, at).await.unwrap();
        assert_eq!(journey.checked_out_at, at);

        let read = get(&mut conn, alice, journey.id).await.unwrap().unwrap();
        assert_eq!(read, journey);
        assert_eq!(latest(&mut conn, alice).await.unwrap(), Some(journey.clone()));

        let october = in_month(&mut conn, alice, MonthKey { year: 2024, month: 10 })
            .await
            .unwrap();
        assert_eq!(october, vec![journey]);
        assert!(
            in_month(&mut conn, alice, MonthKey { year: 2024, month: 9 })
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn latest_is_by_checkout_time() {
        let (store, alice) = store_with_traveler().await;
        let mut conn = store.conn().await.unwrap();
        let mut session = fixtures::session();
        session.traveler = alice;

        let later = Utc.with_ymd_and_hms(2024, 10, 15, 12, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 10, 15, 9, 0, 0).unwrap();
        let a = insert_from_session(&mut conn, &session, later).await.unwrap();
        insert_from_session(&mut conn, &session, earlier).await.unwrap();

        assert_eq!(latest(&mut conn, alice).await.unwrap().unwrap().id, a.id);
    }

    #[tokio::test]
    async fn pop_latest_refuses_edited() {
        let (store, alice) = store_with_traveler().await;
        let mut conn = store.conn().await.unwrap();
        let mut session = fixtures::session();
        session.traveler = alice;

        let journey = insert_from_session(&mut conn, &session, Utc::now()).await.unwrap();
        assert!(mark_edited(&mut conn, alice, journey.id, EditFlags::REAL_ARRIVAL).await.unwrap());

        assert!(matches!(
            pop_latest(&mut conn, alice, journey.id).await,
            Err(StoreError::JourneyEdited(_))
        ));
        assert!(get(&mut conn, alice, journey.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn pop_latest_returns_the_session() {
        let (store, alice) = store_with_traveler().await;
        let mut conn = store.conn().await.unwrap();
        let mut session = fixtures::session();
        session.traveler = alice;

        let journey = insert_from_session(&mut conn, &session, Utc::now()).await.unwrap();
        let popped = pop_latest(&mut conn, alice, journey.id).await.unwrap();
        assert_eq!(popped.into_session(), session);
        assert!(get(&mut conn, alice, journey.id).await.unwrap().is_none());

        assert!(matches!(
            pop_latest(&mut conn, alice, journey.id).await,
            Err(StoreError::JourneyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn pop_latest_leaves_older_journeys() {
        let (store, alice) = store_with_traveler().await;
        let mut conn = store.conn().await.unwrap();
        let mut session = fixtures::session();
        session.traveler = alice;

        let older = insert_from_session(&mut conn, &session, Utc::now() - chrono::Duration::hours(2))
            .await
            .unwrap();
        let newer = insert_from_session(&mut conn, &session, Utc::now()).await.unwrap();

        assert!(matches!(
            pop_latest(&mut conn, alice, older.id).await,
            Err(StoreError::JourneyNotFound(_))
        ));
        assert!(get(&mut conn, alice, older.id).await.unwrap().is_some());

        assert_eq!(pop_latest(&mut conn, alice, newer.id).await.unwrap().id, newer.id);
        // Once the newer one is gone the older one is latest
        assert_eq!(pop_latest(&mut conn, alice, older.id).await.unwrap().id, older.id);
    }
}
