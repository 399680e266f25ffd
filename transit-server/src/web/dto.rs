//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::domain::{JourneyId, StationId, TrainId};
use crate::engine::{CheckoutRequest, ErrorKind, UndoTarget};

/// Body of a check-in.
#[derive(Debug, Deserialize)]
pub struct CheckinBody {
    /// Departure station, by EVA number or exact name
    pub station: String,

    /// Train id as listed on the departure board
    pub train_id: TrainId,
}

/// Body of a check-out.
#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    /// Arrival station, by EVA number or exact name
    pub station: String,

    /// Departure station the client last saw
    #[serde(default)]
    pub expected_departure: Option<StationId>,

    /// Arrival station the client last saw
    #[serde(default)]
    pub expected_arrival: Option<StationId>,

    #[serde(default)]
    pub force: bool,
}

impl From<CheckoutBody> for CheckoutRequest {
    fn from(body: CheckoutBody) -> Self {
        CheckoutRequest {
            station: body.station,
            expected_departure: body.expected_departure,
            expected_arrival: body.expected_arrival,
            force: body.force,
        }
    }
}

/// Body of an undo. Without a journey id the current check-in is undone.
#[derive(Debug, Default, Deserialize)]
pub struct UndoBody {
    #[serde(default)]
    pub journey_id: Option<JourneyId>,
}

impl From<UndoBody> for UndoTarget {
    fn from(body: UndoBody) -> Self {
        match body.journey_id {
            Some(id) => UndoTarget::Journey(id),
            None => UndoTarget::InTransit,
        }
    }
}

/// Error kind in responses: an engine kind or one of the web layer's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorKindDto {
    Engine(ErrorKind),
    Web(&'static str),
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub kind: ErrorKindDto,
    pub error: String,
}
