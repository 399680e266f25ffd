//! Shared, content-addressed polylines.

use sqlx::SqliteConnection;

use crate::domain::{GeoPoint, StationId};

use super::{StoreError, decode, encode};

const WHAT: &str = "polyline";

/// Points are stored as `[lon, lat]` pairs, GeoJSON order.
fn to_pairs(points: &[GeoPoint]) -> Vec<[f64; 2]> {
    points.iter().map(|p| [p.lon, p.lat]).collect()
}

/// Store a path, or find the identical one already stored. Returns its id.
///
/// Safe to race: the unique constraint lets exactly one insert win and
/// every caller then reads back the winner's id.
pub async fn upsert(
    conn: &mut SqliteConnection,
    origin: StationId,
    destination: StationId,
    points: &[GeoPoint],
) -> Result<i64, StoreError> {
    let text = encode(WHAT, &to_pairs(points))?;

    sqlx::query(
        r#"
        INSERT INTO polylines (origin_eva, destination_eva, polyline) VALUES (?, ?, ?)
        ON CONFLICT (origin_eva, destination_eva, polyline) DO NOTHING
        "#,
    )
    .bind(i64::from(origin.get()))
    .bind(i64::from(destination.get()))
    .bind(&text)
    .execute(&mut *conn)
    .await?;

    let id: i64 = sqlx::query_scalar(
        "SELECT id FROM polylines WHERE origin_eva = ? AND destination_eva = ? AND polyline = ?",
    )
    .bind(i64::from(origin.get()))
    .bind(i64::from(destination.get()))
    .bind(&text)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Points of a stored path.
pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Option<Vec<GeoPoint>>, StoreError> {
    let text: Option<String> = sqlx::query_scalar("SELECT polyline FROM polylines WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(text) = text else {
        return Ok(None);
    };
    let pairs: Vec<[f64; 2]> = decode(WHAT, &text)?;
    Ok(Some(
        pairs
            .into_iter()
            .map(|[lon, lat]| GeoPoint { lat, lon })
            .collect(),
    ))
}
