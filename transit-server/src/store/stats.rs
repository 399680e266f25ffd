//! Memoized per-month statistics.
//!
//! Writers only ever invalidate. The first read after an invalidation
//! recomputes the aggregate from the journeys table and stores it again.

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::domain::{Journey, MonthKey, TravelerId};

use super::{StoreError, decode, encode, journeys};

const WHAT: &str = "stats";

/// Aggregate over one month of journeys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonthlyStats {
    pub journeys: u32,
    pub cancelled: u32,
    pub travel_minutes: i64,
    /// Sum of arrival delays, early arrivals counted negative
    pub delay_minutes: i64,
}

impl MonthlyStats {
    pub fn from_journeys<'a>(journeys: impl IntoIterator<Item = &'a Journey>) -> Self {
        let mut stats = Self::default();
        for journey in journeys {
            if journey.is_cancelled() {
                stats.cancelled += 1;
                continue;
            }
            stats.journeys += 1;

            let trip = &journey.trip;
            if let (Some(dep), Some(arr)) = (trip.departure_time(), trip.arrival_time()) {
                stats.travel_minutes += (arr - dep).num_minutes().max(0);
            }
            if let (Some(sched), Some(real)) = (trip.sched_arrival, trip.real_arrival) {
                stats.delay_minutes += (real - sched).num_minutes();
            }
        }
        stats
    }
}

/// Drop the cached month and the yearly row that includes it.
pub async fn invalidate(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
    month: MonthKey,
) -> Result<(), StoreError> {
    sqlx::query(
        "DELETE FROM journey_stats WHERE user_id = ? AND year = ? AND (month = ? OR month = 0)",
    )
    .bind(traveler.0)
    .bind(month.year)
    .bind(month.month)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Cached aggregate, if present.
pub async fn get(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
    month: MonthKey,
) -> Result<Option<MonthlyStats>, StoreError> {
    let data: Option<String> = sqlx::query_scalar(
        "SELECT data FROM journey_stats WHERE user_id = ? AND year = ? AND month = ?",
    )
    .bind(traveler.0)
    .bind(month.year)
    .bind(month.month)
    .fetch_optional(&mut *conn)
    .await?;

    data.map(|d| decode(WHAT, &d)).transpose()
}

/// Store an aggregate.
pub async fn put(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
    month: MonthKey,
    stats: &MonthlyStats,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO journey_stats (user_id, year, month, data) VALUES (?, ?, ?, ?)
        ON CONFLICT (user_id, year, month) DO UPDATE SET data = excluded.data
        "#,
    )
    .bind(traveler.0)
    .bind(month.year)
    .bind(month.month)
    .bind(encode(WHAT, stats)?)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Cached aggregate for a month, recomputed if missing.
pub async fn monthly(
    conn: &mut SqliteConnection,
    traveler: TravelerId,
    month: MonthKey,
) -> Result<MonthlyStats, StoreError> {
    if let Some(stats) = get(conn, traveler, month).await? {
        return Ok(stats);
    }

    let journeys = journeys::in_month(conn, traveler, month).await?;
    let stats = MonthlyStats::from_journeys(&journeys);
    put(conn, traveler, month, &stats).await?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::fixtures;
    use crate::store::test_support::store_with_traveler;
    use chrono::{Duration, Utc};

    const OCTOBER: MonthKey = MonthKey {
        year: 2024,
        month: 10,
    };

    async fn cached_months(conn: &mut SqliteConnection) -> Vec<(i64, i64)> {
        sqlx::query_as("SELECT year, month FROM journey_stats ORDER BY year, month")
            .fetch_all(&mut *conn)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn monthly_recomputes_lazily() {
        let (store, alice) = store_with_traveler().await;
        let mut conn = store.conn().await.unwrap();

        let mut session = fixtures::session();
        session.traveler = alice;
        let dep = session.sched_departure.unwrap();
        session.sched_arrival = Some(dep + Duration::minutes(22));
        session.real_arrival = Some(dep + Duration::minutes(25));
        journeys::insert_from_session(&mut conn, &session, Utc::now())
            .await
            .unwrap();

        let mut cancelled = session.clone();
        cancelled.cancelled = true;
        journeys::insert_from_session(&mut conn, &cancelled, Utc::now())
            .await
            .unwrap();

        assert_eq!(get(&mut conn, alice, OCTOBER).await.unwrap(), None);

        let stats = monthly(&mut conn, alice, OCTOBER).await.unwrap();
        assert_eq!(
            stats,
            MonthlyStats {
                journeys: 1,
                cancelled: 1,
                travel_minutes: 25,
                delay_minutes: 3,
            }
        );
        assert_eq!(get(&mut conn, alice, OCTOBER).await.unwrap(), Some(stats));
    }

    #[tokio::test]
    async fn invalidate_drops_month_and_year_only() {
        let (store, alice) = store_with_traveler().await;
        let mut conn = store.conn().await.unwrap();
        let stats = MonthlyStats::default();

        put(&mut conn, alice, OCTOBER, &stats).await.unwrap();
        put(&mut conn, alice, MonthKey { year: 2024, month: 0 }, &stats)
            .await
            .unwrap();
        put(&mut conn, alice, MonthKey { year: 2024, month: 9 }, &stats)
            .await
            .unwrap();
        put(&mut conn, alice, MonthKey { year: 2023, month: 0 }, &stats)
            .await
            .unwrap();

        invalidate(&mut conn, alice, OCTOBER).await.unwrap();

        assert_eq!(cached_months(&mut conn).await, vec![(2023, 0), (2024, 9)]);
    }
}
