//! Secondary trip-search and metadata client.

mod client;
mod convert;
mod types;

pub use client::{TripClient, TripClientConfig};
pub use convert::{convert_stopover, convert_summary, convert_trip};
pub use types::{Stopover, TripDetails, TripResponse, TripSummary, TripsResponse};
