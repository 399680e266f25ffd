//! Departure board response DTOs.
//!
//! These map directly to the board API's JSON. Fields are optional or
//! defaulted liberally because the API omits what it does not know.

use serde::{Deserialize, Serialize};

/// Response to `GET /departures/{station}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoardResponse {
    /// Station the query resolved to. Missing when the provider errored.
    pub station: Option<BoardStation>,

    /// Related stations whose trains are included in `trains`.
    #[serde(default)]
    pub related: Vec<BoardStation>,

    #[serde(default)]
    pub trains: Vec<BoardTrain>,

    /// Error text; the provider answers 200 with this set on failure.
    pub error: Option<String>,
}

/// A station reference.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoardStation {
    pub eva: u32,
    pub name: String,
}

/// A train on the board.
///
/// Times are local `YYMMDDHHMM` strings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoardTrain {
    /// Provider train id, only unique per station and day.
    pub train_id: String,

    /// Category, e.g. "ICE", "S".
    pub train_type: String,

    /// Train number, e.g. "703".
    pub train_no: String,

    /// Line for local trains, e.g. "1".
    pub line: Option<String>,

    /// Station the train stops at when it is from a related station.
    pub station_eva: Option<u32>,

    pub sched_arrival: Option<String>,
    pub rt_arrival: Option<String>,
    pub sched_departure: Option<String>,
    pub rt_departure: Option<String>,

    pub platform: Option<String>,

    #[serde(default)]
    pub arrival_is_cancelled: bool,

    #[serde(default)]
    pub departure_is_cancelled: bool,

    /// Stops before this one.
    #[serde(default)]
    pub route_pre: Vec<String>,

    /// Stops after this one.
    #[serde(default)]
    pub route_post: Vec<String>,

    #[serde(default)]
    pub messages: Vec<BoardMessage>,
}

/// Realtime message (delay reason, disruption note).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoardMessage {
    pub timestamp: Option<String>,
    pub text: String,
}
