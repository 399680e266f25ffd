//! Conversion from board DTOs to feed types.

use tracing::warn;

use crate::domain::{Message, Station, StationId, TrainId, TrainLabel, parse_board_timestamp};
use crate::feeds::{DepartureLookup, TrainCandidate};

use super::types::{BoardResponse, BoardStation, BoardTrain};

/// Error during DTO to domain conversion.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConversionError {
    /// Station number is not a valid id
    #[error("invalid station: {0}")]
    InvalidStation(String),

    /// Failed to parse a time string
    #[error("invalid time: {0}")]
    InvalidTime(String),

    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Convert a board response.
///
/// Trains that fail to convert are skipped with a warning rather than failing
/// the whole board.
pub fn convert_board(board: &BoardResponse) -> Result<DepartureLookup, ConversionError> {
    let station = board
        .station
        .as_ref()
        .map(convert_station)
        .ok_or(ConversionError::MissingField("station"))??;

    let related = board
        .related
        .iter()
        .map(convert_station)
        .collect::<Result<Vec<_>, _>>()?;

    let mut results = Vec::with_capacity(board.trains.len());

    for train in &board.trains {
        match convert_train(train, &station, &related) {
            Ok(candidate) => results.push(candidate),
            Err(e) => {
                warn!(train_id = %train.train_id, station = %station.id, error = %e, "skipping train");
            }
        }
    }

    Ok(DepartureLookup {
        station,
        related,
        results,
    })
}

fn convert_station(s: &BoardStation) -> Result<Station, ConversionError> {
    if s.eva == 0 {
        return Err(ConversionError::InvalidStation(s.name.clone()));
    }
    Ok(Station::new(StationId::new(s.eva), s.name.clone()))
}

/// Convert a single train.
pub fn convert_train(
    train: &BoardTrain,
    board_station: &Station,
    related: &[Station],
) -> Result<TrainCandidate, ConversionError> {
    if train.train_id.is_empty() {
        return Err(ConversionError::MissingField("train_id"));
    }

    let station = match train.station_eva {
        Some(eva) if eva != board_station.id.get() => related
            .iter()
            .find(|s| s.id.get() == eva)
            .cloned()
            .ok_or_else(|| ConversionError::InvalidStation(eva.to_string()))?,
        _ => board_station.clone(),
    };

    let messages = train
        .messages
        .iter()
        .map(|m| Message {
            timestamp: m
                .timestamp
                .as_deref()
                .and_then(|t| parse_board_timestamp(t).ok()),
            text: m.text.clone(),
        })
        .collect();

    Ok(TrainCandidate {
        train_id: TrainId::new(train.train_id.clone()),
        label: TrainLabel::new(
            train.train_type.clone(),
            train.train_no.clone(),
            train.line.clone().filter(|l| !l.is_empty()),
        ),
        station,
        platform: train.platform.clone(),
        sched_arrival: parse_time(train.sched_arrival.as_deref())?,
        rt_arrival: parse_time(train.rt_arrival.as_deref())?,
        sched_departure: parse_time(train.sched_departure.as_deref())?,
        rt_departure: parse_time(train.rt_departure.as_deref())?,
        arrival_cancelled: train.arrival_is_cancelled,
        departure_cancelled: train.departure_is_cancelled,
        route_pre: train.route_pre.clone(),
        route_post: train.route_post.clone(),
        messages,
    })
}

fn parse_time(
    s: Option<&str>,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, ConversionError> {
    s.map(|t| parse_board_timestamp(t).map_err(|_| ConversionError::InvalidTime(t.to_string())))
        .transpose()
}
