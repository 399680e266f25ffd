//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::domain::{MonthKey, TravelerId};
use crate::engine::{CheckinOutcome, CheckoutOutcome, EngineError, ErrorKind, UndoOutcome};
use crate::feeds::{DepartureBoard, TripSource};
use crate::notify::Notifier;
use crate::status::TravelerStatus;
use crate::store::stats::{self, MonthlyStats};
use crate::store::{StoreError, travelers};
use crate::sync::{ExternalCheckin, SyncOutcome};

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router<B, T, N>(state: AppState<B, T, N>) -> Router
where
    B: DepartureBoard,
    T: TripSource,
    N: Notifier,
{
    Router::new()
        .route("/health", get(health))
        .route("/api/travelers/:id/checkin", post(checkin::<B, T, N>))
        .route("/api/travelers/:id/checkout", post(checkout::<B, T, N>))
        .route("/api/travelers/:id/undo", post(undo::<B, T, N>))
        .route("/api/travelers/:id/status", get(traveler_status::<B, T, N>))
        .route("/api/travelers/:id/sync", post(sync::<B, T, N>))
        .route("/api/travelers/:id/stats/:year/:month", get(monthly_stats::<B, T, N>))
        .route("/api/status/:name", get(public_status::<B, T, N>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

async fn checkin<B, T, N>(
    State(state): State<AppState<B, T, N>>,
    Path(id): Path<i64>,
    Json(body): Json<CheckinBody>,
) -> Result<Json<CheckinOutcome>, AppError>
where
    B: DepartureBoard,
    T: TripSource,
    N: Notifier,
{
    let traveler = known_traveler(&state, id).await?;
    let outcome = state
        .engine
        .checkin(traveler, &body.station, &body.train_id)
        .await?;
    Ok(Json(outcome))
}

async fn checkout<B, T, N>(
    State(state): State<AppState<B, T, N>>,
    Path(id): Path<i64>,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutOutcome>, AppError>
where
    B: DepartureBoard,
    T: TripSource,
    N: Notifier,
{
    let traveler = known_traveler(&state, id).await?;
    let outcome = state.engine.checkout(traveler, body.into()).await?;
    Ok(Json(outcome))
}

async fn undo<B, T, N>(
    State(state): State<AppState<B, T, N>>,
    Path(id): Path<i64>,
    Json(body): Json<UndoBody>,
) -> Result<Json<UndoOutcome>, AppError>
where
    B: DepartureBoard,
    T: TripSource,
    N: Notifier,
{
    let traveler = known_traveler(&state, id).await?;
    let outcome = state.engine.undo(traveler, body.into()).await?;
    Ok(Json(outcome))
}

/// The traveler's own view, including private trips.
async fn traveler_status<B, T, N>(
    State(state): State<AppState<B, T, N>>,
    Path(id): Path<i64>,
) -> Result<Json<TravelerStatus>, AppError>
where
    B: DepartureBoard,
    T: TripSource,
    N: Notifier,
{
    state
        .status
        .for_traveler(TravelerId(id), Utc::now())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound {
            message: format!("Traveler {id} not found"),
        })
}

/// Import a check-in reported by the third-party service.
async fn sync<B, T, N>(
    State(state): State<AppState<B, T, N>>,
    Path(id): Path<i64>,
    Json(event): Json<ExternalCheckin>,
) -> Result<Json<SyncOutcome>, AppError>
where
    B: DepartureBoard,
    T: TripSource,
    N: Notifier,
{
    let traveler = known_traveler(&state, id).await?;
    let outcome = state.sync.import(traveler, &event, Utc::now()).await?;
    Ok(Json(outcome))
}

/// Journey totals for one German-local calendar month.
async fn monthly_stats<B, T, N>(
    State(state): State<AppState<B, T, N>>,
    Path((id, year, month)): Path<(i64, i32, u32)>,
) -> Result<Json<MonthlyStats>, AppError>
where
    B: DepartureBoard,
    T: TripSource,
    N: Notifier,
{
    let traveler = known_traveler(&state, id).await?;
    if !(1..=12).contains(&month) {
        return Err(AppError::NotFound {
            message: format!("No month {year}-{month}"),
        });
    }

    let mut conn = state.engine.store().conn().await?;
    let stats = stats::monthly(&mut conn, traveler, MonthKey { year, month }).await?;
    Ok(Json(stats))
}

/// Status by traveler name, as anyone may see it.
async fn public_status<B, T, N>(
    State(state): State<AppState<B, T, N>>,
    Path(name): Path<String>,
) -> Result<Json<TravelerStatus>, AppError>
where
    B: DepartureBoard,
    T: TripSource,
    N: Notifier,
{
    state
        .status
        .for_public(&name, Utc::now())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound {
            message: format!("No public status for {name}"),
        })
}

async fn known_traveler<B, T, N>(
    state: &AppState<B, T, N>,
    id: i64,
) -> Result<TravelerId, AppError>
where
    B: DepartureBoard,
    T: TripSource,
    N: Notifier,
{
    let mut conn = state.engine.store().conn().await?;
    match travelers::get(&mut conn, TravelerId(id)).await? {
        Some(traveler) => Ok(traveler.id),
        None => Err(AppError::NotFound {
            message: format!("Traveler {id} not found"),
        }),
    }
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    Engine(EngineError),
    NotFound { message: String },
    Internal { message: String },
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        AppError::Engine(e)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Internal {
            message: e.to_string(),
        }
    }
}

fn engine_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::TrainNotFound | ErrorKind::JourneyNotFound => StatusCode::NOT_FOUND,
        ErrorKind::NotTraveling
        | ErrorKind::AlreadyTraveling
        | ErrorKind::RaceCondition
        | ErrorKind::AlreadyEdited => StatusCode::CONFLICT,
        ErrorKind::ArrivalUnknown => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
        ErrorKind::PersistenceFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            AppError::Engine(e) => (engine_status(e.kind()), ErrorKindDto::Engine(e.kind()), e.to_string()),
            AppError::NotFound { message } => {
                (StatusCode::NOT_FOUND, ErrorKindDto::Web("not_found"), message.clone())
            }
            AppError::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKindDto::Web("internal"),
                message.clone(),
            ),
        };

        if status.is_server_error() {
            error!(%status, %message, "request failed");
        } else {
            debug!(%status, %message, "request rejected");
        }

        let body = Json(ErrorResponse {
            kind,
            error: message,
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::util::ServiceExt;

    use super::*;
    use crate::domain::{Station, StationId, TrainId, TrainLabel};
    use crate::engine::{Engine, EngineConfig};
    use crate::enrich::Enricher;
    use crate::feeds::mock::{MockBoard, MockTrips};
    use crate::feeds::{DepartureLookup, TrainCandidate};
    use crate::notify::NoopNotifier;
    use crate::store::test_support::store_with_traveler;

    async fn app() -> (Router, TravelerId) {
        let (store, alice) = store_with_traveler().await;
        let board = Arc::new(MockBoard::new());
        let dortmund = Station::new(StationId::new(8000080), "Dortmund Hbf");
        board.set(DepartureLookup {
            results: vec![TrainCandidate {
                train_id: TrainId::new("ice703"),
                label: TrainLabel::new("ICE", "703", None),
                station: dortmund.clone(),
                platform: Some("7".into()),
                sched_arrival: None,
                rt_arrival: None,
                sched_departure: Some(Utc::now() + chrono::Duration::minutes(10)),
                rt_departure: None,
                arrival_cancelled: false,
                departure_cancelled: false,
                route_pre: Vec::new(),
                route_post: vec!["Essen Hbf".into()],
                messages: Vec::new(),
            }],
            ..DepartureLookup::empty(dortmund)
        });
        let engine = Engine::new(
            store.clone(),
            board,
            Enricher::new(store, Arc::new(MockTrips::new()), Duration::from_secs(1)),
            Arc::new(NoopNotifier),
            EngineConfig::default(),
        );
        (create_router(AppState::new(engine)), alice)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_check() {
        let (app, _) = app().await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn checkin_then_status() {
        let (app, alice) = app().await;
        let base = format!("/api/travelers/{}", alice.0);

        let (status, body) = send(
            &app,
            "POST",
            &format!("{base}/checkin"),
            Some(json!({"station": "Dortmund Hbf", "train_id": "ice703"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "checked_in");
        assert_eq!(body["session"]["departure"]["name"], "Dortmund Hbf");

        let (status, body) = send(&app, "GET", &format!("{base}/status"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "in_transit");

        let (status, body) = send(&app, "GET", "/api/status/alice", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "in_transit");
    }

    #[tokio::test]
    async fn engine_errors_carry_their_kind() {
        let (app, alice) = app().await;
        let base = format!("/api/travelers/{}", alice.0);

        let (status, body) = send(
            &app,
            "POST",
            &format!("{base}/checkout"),
            Some(json!({"station": "Essen Hbf"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "not_traveling");

        let (status, body) = send(
            &app,
            "POST",
            &format!("{base}/checkin"),
            Some(json!({"station": "Dortmund Hbf", "train_id": "ghost"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "train_not_found");

        let (status, body) = send(&app, "POST", &format!("{base}/undo"), Some(json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "not_traveling");
    }

    #[tokio::test]
    async fn unknown_travelers_are_not_found() {
        let (app, _) = app().await;

        let (status, body) = send(&app, "GET", "/api/travelers/999/status", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "not_found");

        let (status, _) = send(
            &app,
            "POST",
            "/api/travelers/999/checkin",
            Some(json!({"station": "Dortmund Hbf", "train_id": "ice703"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "GET", "/api/status/nobody", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn monthly_stats_are_computed_on_read() {
        let (app, alice) = app().await;
        let month = MonthKey::of(Utc::now());
        let uri = format!("/api/travelers/{}/stats/{}/{}", alice.0, month.year, month.month);

        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["journeys"], 0);
        assert_eq!(body["cancelled"], 0);

        let uri = format!("/api/travelers/{}/stats/2024/13", alice.0);
        let (status, _) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn status_codes() {
        assert_eq!(engine_status(ErrorKind::RaceCondition), StatusCode::CONFLICT);
        assert_eq!(engine_status(ErrorKind::UpstreamUnavailable), StatusCode::BAD_GATEWAY);
        assert_eq!(
            engine_status(ErrorKind::PersistenceFailure),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
