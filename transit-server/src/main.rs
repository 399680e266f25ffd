use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transit_server::config::AppConfig;
use transit_server::engine::Engine;
use transit_server::enrich::Enricher;
use transit_server::feeds::board::BoardClient;
use transit_server::feeds::mock::MockBoard;
use transit_server::feeds::trips::TripClient;
use transit_server::feeds::{CacheConfig, CachedBoard, CachedTrips, DepartureBoard, TripSource};
use transit_server::notify::{Notifier, WebhookNotifier};
use transit_server::store::Store;
use transit_server::web::{AppState, create_router};
use transit_server::worker::run_poller;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info,sqlx=warn".into()),
        )
        .init();

    let config = AppConfig::from_env().expect("Invalid configuration");

    let store = Store::connect(&config.database_url)
        .await
        .expect("Failed to open database");

    let cache_config = CacheConfig::default();
    let trips = TripClient::new(config.trips.clone()).expect("Failed to create trip client");
    let trips = Arc::new(CachedTrips::new(trips, &cache_config));

    let notifier = WebhookNotifier::new(store.clone(), config.background_timeout())
        .expect("Failed to create webhook client");
    let notifier = Arc::new(notifier);

    match &config.mock_boards_dir {
        Some(dir) => {
            let board = MockBoard::from_dir(dir).expect("Failed to load mock boards");
            info!(dir = %dir.display(), "serving departure boards from fixtures");
            serve(config.clone(), store, Arc::new(board), trips, notifier).await;
        }
        None => {
            let board = BoardClient::new(config.board.clone()).expect("Failed to create board client");
            let board = CachedBoard::new(board, &cache_config);
            serve(config.clone(), store, Arc::new(board), trips, notifier).await;
        }
    }
}

async fn serve<B, T, N>(config: AppConfig, store: Store, board: Arc<B>, trips: Arc<T>, notifier: Arc<N>)
where
    B: DepartureBoard,
    T: TripSource,
    N: Notifier,
{
    let enricher = Enricher::new(store.clone(), trips, config.background_timeout());
    let engine = Engine::new(store, board, enricher, notifier, config.engine());

    let poller = engine.clone().with_feed_timeout(config.background_timeout_secs);
    tokio::spawn(run_poller(poller, config.poll_interval));
    info!(interval_secs = config.poll_interval.as_secs(), "check-out poller started");

    let app = create_router(AppState::new(engine));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .expect("Failed to bind listen address");
    info!(addr = %config.listen_addr, "transit server listening");
    axum::serve(listener, app).await.expect("Server error");
}
