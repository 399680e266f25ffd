//! Live departure board client.
//!
//! Key characteristics of the board:
//! - Train ids are only unique per station and day
//! - Times are `YYMMDDHHMM` strings in German local time
//! - Routes are given by station name only, split into the stops before
//!   (`route_pre`) and after (`route_post`) the queried station
//! - The provider may answer `200` with an `error` field instead of data

mod client;
mod convert;
mod types;

pub use client::{BoardClient, BoardClientConfig};
pub use convert::{ConversionError, convert_board, convert_train};
pub use types::{BoardMessage, BoardResponse, BoardStation, BoardTrain};
