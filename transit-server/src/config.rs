//! Process configuration from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::EngineConfig;
use crate::feeds::board::BoardClientConfig;
use crate::feeds::trips::TripClientConfig;

const DEFAULT_DATABASE_URL: &str = "sqlite:transit.db?mode=rwc";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8093";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything `main` needs to wire the server together.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub board: BoardClientConfig,
    pub trips: TripClientConfig,
    /// Serve departure boards from `{eva}.json` fixtures instead of the API
    pub mock_boards_dir: Option<PathBuf>,
    pub poll_interval: Duration,
    /// Deadline for feed calls that block a user-facing decision
    pub feed_timeout_secs: u64,
    /// Deadline for enrichment, notifications and polling
    pub background_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let listen_addr = get("TRANSIT_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.into());
        let listen_addr: SocketAddr = listen_addr.parse().map_err(|e: std::net::AddrParseError| {
            ConfigError::Invalid {
                var: "TRANSIT_LISTEN_ADDR",
                value: listen_addr.clone(),
                reason: e.to_string(),
            }
        })?;

        let feed_timeout_secs = seconds(&get, "FEED_TIMEOUT_SECS", 20)?;
        let background_timeout_secs = seconds(&get, "BACKGROUND_TIMEOUT_SECS", 5)?;
        let poll_interval = Duration::from_secs(seconds(&get, "POLL_INTERVAL_SECS", 60)?);

        let mut board = BoardClientConfig::new(get("BOARD_API_KEY").unwrap_or_default())
            .with_timeout(feed_timeout_secs);
        if let Some(url) = get("BOARD_API_URL") {
            board = board.with_base_url(url);
        }

        let mut trips = TripClientConfig::default().with_timeout(background_timeout_secs);
        if let Some(url) = get("TRIPS_API_URL") {
            trips.base_url = url;
        }
        if let Some(url) = get("COMPOSITION_API_URL") {
            trips = trips.with_composition_url(url);
        }
        if let Some(url) = get("STATION_META_API_URL") {
            trips = trips.with_station_meta_url(url);
        }

        Ok(Self {
            database_url: get("TRANSIT_DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            listen_addr,
            board,
            trips,
            mock_boards_dir: get("MOCK_BOARDS_DIR").map(PathBuf::from),
            poll_interval,
            feed_timeout_secs,
            background_timeout_secs,
        })
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig::new(self.feed_timeout_secs)
    }

    pub fn background_timeout(&self) -> Duration {
        Duration::from_secs(self.background_timeout_secs)
    }
}

fn seconds(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value) = get(var) else {
        return Ok(default);
    };
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            var,
            value,
            reason: "must be positive".into(),
        }),
        Ok(secs) => Ok(secs),
        Err(e) => Err(ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.listen_addr, "127.0.0.1:8093".parse().unwrap());
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.engine().feed_timeout(), Duration::from_secs(20));
        assert_eq!(config.background_timeout(), Duration::from_secs(5));
        assert_eq!(config.board.timeout_secs, 20);
        assert_eq!(config.trips.timeout_secs, 5);
        assert!(config.board.api_key.is_empty());
        assert!(config.mock_boards_dir.is_none());
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("TRANSIT_LISTEN_ADDR", "0.0.0.0:9000"),
            ("BOARD_API_URL", "http://localhost:5000"),
            ("BOARD_API_KEY", "secret"),
            ("TRIPS_API_URL", "http://localhost:3000"),
            ("MOCK_BOARDS_DIR", "fixtures/boards"),
            ("FEED_TIMEOUT_SECS", "8"),
            ("POLL_INTERVAL_SECS", " 30 "),
        ])
        .unwrap();
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.board.base_url, "http://localhost:5000");
        assert_eq!(config.board.api_key, "secret");
        assert_eq!(config.board.timeout_secs, 8);
        assert_eq!(config.trips.base_url, "http://localhost:3000");
        assert_eq!(config.mock_boards_dir, Some(PathBuf::from("fixtures/boards")));
        assert_eq!(config.poll_interval, Duration::from_secs(30));
    }

    #[test]
    fn empty_values_are_unset() {
        let config = config(&[("TRANSIT_DATABASE_URL", ""), ("BOARD_API_URL", "  ")]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.board.base_url, BoardClientConfig::default().base_url);
    }

    #[test]
    fn rejects_bad_values() {
        let err = config(&[("POLL_INTERVAL_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("POLL_INTERVAL_SECS"));

        assert!(config(&[("FEED_TIMEOUT_SECS", "0")]).is_err());
        assert!(config(&[("TRANSIT_LISTEN_ADDR", "localhost")]).is_err());
    }
}
