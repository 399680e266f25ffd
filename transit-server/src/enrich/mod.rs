//! Background enrichment of active sessions.
//!
//! After a successful check-in or check-out the engine hands the committed
//! session to the [`Enricher`], which fetches secondary data from the trip
//! source and writes it back:
//!
//! - trip id, refined per-stop route and the path (polyline)
//! - wagon composition at the departure or arrival station
//! - platform layout of the station involved
//!
//! The three branches run concurrently and independently. Every failure is
//! logged and swallowed: enrichment never surfaces an error to the traveler
//! and never blocks the operation that triggered it.
//!
//! Writes re-read the session under the store's write lock and are dropped
//! if the traveler has moved on to a different trip in the meantime.

mod route;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{Composition, StationId, TransitSession, local_date};
use crate::feeds::{FeedError, TripMatch, TripRoute, TripSource};
use crate::store::{Store, StoreError, polylines, sessions, stations};

pub use route::merge_route;

/// A failed enrichment step. Logged, never returned to the engine.
#[derive(Debug, thiserror::Error)]
enum EnrichError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which operation triggered enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Checkin,
    Checkout,
}

/// A committed session to enrich.
#[derive(Debug, Clone)]
pub struct EnrichRequest {
    pub session: TransitSession,
    pub phase: Phase,
}

impl EnrichRequest {
    pub fn new(session: TransitSession, phase: Phase) -> Self {
        Self { session, phase }
    }

    /// Station whose composition and metadata this phase is about.
    fn station(&self) -> Option<StationId> {
        match self.phase {
            Phase::Checkin => Some(self.session.departure.id),
            Phase::Checkout => self.session.arrival.as_ref().map(|s| s.id),
        }
    }
}

/// Runs enrichment jobs against a trip source.
pub struct Enricher<T> {
    store: Store,
    trips: Arc<T>,
    timeout: Duration,
}

impl<T> Clone for Enricher<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            trips: Arc::clone(&self.trips),
            timeout: self.timeout,
        }
    }
}

impl<T: TripSource> Enricher<T> {
    /// `timeout` bounds every single trip-source call.
    pub fn new(store: Store, trips: Arc<T>, timeout: Duration) -> Self {
        Self {
            store,
            trips,
            timeout,
        }
    }

    /// Run a job in the background. The caller does not wait for it.
    pub fn spawn(&self, request: EnrichRequest) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run(request).await })
    }

    /// Run a job to completion.
    pub async fn run(&self, request: EnrichRequest) {
        debug!(
            traveler = %request.session.traveler,
            train = %request.session.train,
            phase = ?request.phase,
            "enriching session"
        );

        futures::join!(
            self.enrich_trip(&request),
            self.enrich_composition(&request),
            self.enrich_station(&request),
        );
    }

    /// Await a trip-source call under the per-call deadline. Failures are
    /// logged and become `None`.
    async fn call<X>(
        &self,
        what: &'static str,
        fut: impl Future<Output = Result<X, FeedError>>,
    ) -> Option<X> {
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(inner) => inner.map_err(EnrichError::from),
            Err(_) => Err(EnrichError::Timeout(self.timeout)),
        };
        result
            .inspect_err(|e| warn!(error = %e, "enrichment: {what} failed"))
            .ok()
    }

    async fn enrich_trip(&self, request: &EnrichRequest) {
        let session = &request.session;

        let trip_id = match &session.enrichment.trip_id {
            Some(id) => id.clone(),
            None => {
                let date = local_date(session.sched_departure.unwrap_or(session.checked_in_at));
                let Some(matches) = self
                    .call("trip search", self.trips.find_trips(&session.train, date))
                    .await
                else {
                    return;
                };
                let Some(found) = pick_trip(&matches, session) else {
                    debug!(train = %session.train, "no trip matches the session");
                    return;
                };
                found.trip_id.clone()
            }
        };

        let route = self
            .call("trip route", self.trips.trip_route(&trip_id))
            .await
            .filter(|r| {
                route::covers(&r.stops, &session.departure, session.arrival.as_ref())
            });

        let polyline_id = match &route {
            Some(r) => self.store_polyline(r).await,
            None => None,
        };

        self.write_session(session, |s| {
            s.enrichment.trip_id = Some(trip_id);
            if let Some(route) = route {
                s.route = merge_route(&s.route, &route.stops);
                if !route.messages.is_empty() {
                    s.messages = route.messages;
                }
            }
            if polyline_id.is_some() {
                s.enrichment.polyline_id = polyline_id;
            }
        })
        .await;
    }

    async fn store_polyline(&self, route: &TripRoute) -> Option<i64> {
        let points = route.polyline.as_ref()?;
        let origin = route.stops.first()?.id?;
        let destination = route.stops.last()?.id?;

        let result: Result<i64, EnrichError> = async {
            let mut conn = self.store.conn().await?;
            Ok(polylines::upsert(&mut conn, origin, destination, points).await?)
        }
        .await;

        match result {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "enrichment: storing polyline failed");
                None
            }
        }
    }

    async fn enrich_composition(&self, request: &EnrichRequest) {
        let session = &request.session;
        let Some(station) = request.station() else {
            return;
        };
        let sched = match request.phase {
            Phase::Checkin => session.sched_departure,
            Phase::Checkout => session.sched_arrival,
        };
        let Some(sched) = sched else {
            return;
        };

        let Some(composition) = self
            .call(
                "composition",
                self.trips.composition(&session.train.train_no, sched, station),
            )
            .await
        else {
            return;
        };

        let phase = request.phase;
        self.write_session(session, move |s| apply_composition(s, composition, phase, station))
            .await;
    }

    async fn enrich_station(&self, request: &EnrichRequest) {
        let Some(station) = request.station() else {
            return;
        };
        let Some(Some(meta)) = self
            .call("station metadata", self.trips.station_metadata(station))
            .await
        else {
            return;
        };

        let result: Result<(), EnrichError> = async {
            let mut conn = self.store.conn().await?;
            Ok(stations::upsert(&mut conn, &meta, Utc::now()).await?)
        }
        .await;
        if let Err(e) = result {
            warn!(error = %e, station = %station, "enrichment: storing station metadata failed");
        }
    }

    /// Read-modify-write of the traveler's session, skipped if the session
    /// no longer describes the same trip as `snapshot`.
    async fn write_session(
        &self,
        snapshot: &TransitSession,
        update: impl FnOnce(&mut TransitSession),
    ) {
        let traveler = snapshot.traveler;
        let result: Result<bool, StoreError> = async {
            let mut tx = self.store.begin().await?;
            let current = sessions::lock(&mut tx, traveler).await?;
            let Some(mut current) = current.filter(|c| c.is_same_trip(snapshot)) else {
                return Ok(false);
            };
            update(&mut current);
            sessions::update(&mut tx, &current, Utc::now()).await?;
            tx.commit().await?;
            Ok(true)
        }
        .await;

        match result {
            Ok(true) => {}
            Ok(false) => debug!(traveler = %traveler, "session changed, enrichment dropped"),
            Err(e) => warn!(error = %e, traveler = %traveler, "enrichment: session write failed"),
        }
    }
}

/// The trip whose origin matches the session's route, else the first.
fn pick_trip<'a>(matches: &'a [TripMatch], session: &TransitSession) -> Option<&'a TripMatch> {
    let origin = session.route.first();
    matches
        .iter()
        .find(|m| {
            origin.is_some_and(|o| match (m.origin_id, o.id) {
                (Some(a), Some(b)) => a == b,
                _ => m.origin == o.name,
            })
        })
        .or_else(|| matches.first())
}

fn apply_composition(
    session: &mut TransitSession,
    composition: Composition,
    phase: Phase,
    station: StationId,
) {
    session.enrichment.pride |= composition.is_pride();
    match phase {
        Phase::Checkin => session.enrichment.composition_dep = Some(composition),
        Phase::Checkout => {
            // The arrival station may have changed since the job started
            if session.arrival.as_ref().is_some_and(|a| a.id == station) {
                session.enrichment.composition_arr = Some(composition);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::fixtures;
    use crate::domain::{GeoPoint, PlatformInfo, RouteStop, Station, StationMetadata, PRIDE_GROUP};
    use crate::feeds::mock::MockTrips;
    use crate::store::test_support::store_with_traveler;
    use serde_json::json;

    fn composition(group: &str) -> Composition {
        Composition::from_raw(json!({
            "data": { "istformation": {
                "fahrtrichtung": "VORWAERTS",
                "allFahrzeuggruppe": [{
                    "fahrzeuggruppebezeichnung": group,
                    "allFahrzeug": [
                        { "wagenordnungsnummer": "1", "fahrzeugtyp": "Apmz", "fahrzeugsektor": "A", "kategorie": "REISEZUGWAGENERSTEKLASSE" },
                        { "wagenordnungsnummer": "2", "fahrzeugtyp": "Bpmz", "fahrzeugsektor": "D", "kategorie": "REISEZUGWAGENZWEITEKLASSE" }
                    ]
                }]
            }}
        }))
        .unwrap()
    }

    fn stop(name: &str, id: u32, lat: f64) -> RouteStop {
        RouteStop {
            id: Some(StationId::new(id)),
            location: Some(GeoPoint { lat, lon: 7.0 }),
            ..RouteStop::named(name)
        }
    }

    fn trip_route() -> TripRoute {
        TripRoute {
            stops: vec![
                stop("Hamm (Westf) Hbf", 8000149, 51.67),
                stop("Dortmund Hbf", 8000080, 51.51),
                stop("Bochum Hbf", 8000041, 51.47),
                stop("Essen Hbf", 8000098, 51.45),
            ],
            messages: Vec::new(),
            polyline: Some(vec![
                GeoPoint { lat: 51.67, lon: 7.8 },
                GeoPoint { lat: 51.45, lon: 7.0 },
            ]),
        }
    }

    async fn setup() -> (Store, Arc<MockTrips>, TransitSession) {
        let (store, alice) = store_with_traveler().await;
        let mut session = fixtures::session();
        session.traveler = alice;
        let mut conn = store.conn().await.unwrap();
        sessions::insert(&mut conn, &session, Utc::now()).await.unwrap();
        (store, Arc::new(MockTrips::new()), session)
    }

    #[tokio::test]
    async fn checkin_enrichment_fills_everything() {
        let (store, trips, session) = setup().await;
        trips.set_trips(
            "ICE 703",
            vec![
                TripMatch {
                    trip_id: "wrong".into(),
                    origin: "München Hbf".into(),
                    origin_id: None,
                    departure: None,
                },
                TripMatch {
                    trip_id: "1|703|0".into(),
                    origin: "Hamm (Westf) Hbf".into(),
                    origin_id: None,
                    departure: None,
                },
            ],
        );
        trips.set_route("1|703|0", trip_route());
        trips.set_composition("703", composition(PRIDE_GROUP));
        trips.set_station_metadata(
            StationId::new(8000080),
            StationMetadata {
                id: StationId::new(8000080),
                name: "Dortmund Hbf".into(),
                platforms: vec![PlatformInfo {
                    name: "7".into(),
                    ..PlatformInfo::default()
                }],
            },
        );

        let enricher = Enricher::new(store.clone(), trips, Duration::from_secs(5));
        enricher
            .run(EnrichRequest::new(session.clone(), Phase::Checkin))
            .await;

        let mut conn = store.conn().await.unwrap();
        let enriched = sessions::get(&mut conn, session.traveler).await.unwrap().unwrap();
        assert_eq!(enriched.enrichment.trip_id.as_deref(), Some("1|703|0"));
        assert!(enriched.enrichment.polyline_id.is_some());
        assert!(enriched.enrichment.composition_dep.is_some());
        assert!(enriched.enrichment.pride);
        assert_eq!(enriched.route[0].id, Some(StationId::new(8000149)));
        assert!(
            stations::get(&mut conn, StationId::new(8000080))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn feed_failures_are_swallowed() {
        let (store, trips, session) = setup().await;

        // Nothing programmed: every call is NotFound
        let enricher = Enricher::new(store.clone(), Arc::clone(&trips), Duration::from_secs(5));
        enricher
            .run(EnrichRequest::new(session.clone(), Phase::Checkin))
            .await;

        let mut conn = store.conn().await.unwrap();
        let unchanged = sessions::get(&mut conn, session.traveler).await.unwrap().unwrap();
        assert_eq!(unchanged, session);
        assert!(trips.call_count() >= 3);
    }

    #[tokio::test]
    async fn writes_for_a_replaced_session_are_dropped() {
        let (store, trips, session) = setup().await;
        trips.set_composition("703", composition("ICE9018"));

        // The traveler moved on to another train before the job ran
        let mut other = session.clone();
        other.train_id = crate::domain::TrainId::new("other");
        {
            let mut conn = store.conn().await.unwrap();
            sessions::update(&mut conn, &other, Utc::now()).await.unwrap();
        }

        let enricher = Enricher::new(store.clone(), trips, Duration::from_secs(5));
        enricher
            .run(EnrichRequest::new(session.clone(), Phase::Checkin))
            .await;

        let mut conn = store.conn().await.unwrap();
        let current = sessions::get(&mut conn, session.traveler).await.unwrap().unwrap();
        assert_eq!(current, other);
    }

    #[tokio::test]
    async fn checkout_composition_lands_on_arrival() {
        let (store, trips, mut session) = setup().await;
        session.set_arrival_station(Station::new(StationId::new(8000098), "Essen Hbf"));
        session.sched_arrival = session.sched_departure.map(|t| t + chrono::Duration::minutes(22));
        {
            let mut conn = store.conn().await.unwrap();
            sessions::update(&mut conn, &session, Utc::now()).await.unwrap();
        }
        trips.set_composition("703", composition("ICE9018"));

        let enricher = Enricher::new(store.clone(), trips, Duration::from_secs(5));
        enricher
            .run(EnrichRequest::new(session.clone(), Phase::Checkout))
            .await;

        let mut conn = store.conn().await.unwrap();
        let current = sessions::get(&mut conn, session.traveler).await.unwrap().unwrap();
        assert!(current.enrichment.composition_arr.is_some());
        assert!(current.enrichment.composition_dep.is_none());
        assert!(!current.enrichment.pride);
    }

    #[test]
    fn trip_choice_prefers_matching_origin() {
        let session = fixtures::session();
        let first = TripMatch {
            trip_id: "a".into(),
            origin: "Berlin Hbf".into(),
            origin_id: None,
            departure: None,
        };
        let second = TripMatch {
            trip_id: "b".into(),
            origin: "Hamm (Westf) Hbf".into(),
            ..first.clone()
        };
        let both = [first.clone(), second];
        assert_eq!(pick_trip(&both, &session).unwrap().trip_id, "b");
        assert_eq!(pick_trip(&[first], &session).unwrap().trip_id, "a");
        assert!(pick_trip(&[], &session).is_none());
    }
}
