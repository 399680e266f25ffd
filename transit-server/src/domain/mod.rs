//! Domain types for journey tracking.
//!
//! This module contains the core domain model types: validated identifiers,
//! route stops, the active session and finalized journeys. Identifier types
//! enforce their invariants at construction time, so code that receives them
//! can trust their validity.

mod composition;
mod journey;
mod platform;
pub(crate) mod session;
mod station;
mod stop;
mod time;
mod train;

pub use composition::{Composition, InvalidComposition, PRIDE_GROUP, Wagon, WagonClass};
pub use journey::{EditFlags, Journey};
pub use platform::{Direction, PlatformInfo, StationMetadata};
pub use session::{EnrichmentData, TransitSession, UserData, Visibility};
pub use station::{InvalidStationId, Station, StationId};
pub use stop::{GeoPoint, Message, RouteStop};
pub use time::{
    MonthKey, TimeError, composition_timestamp, from_local, local_date, parse_board_timestamp,
};
pub use train::{JourneyId, TrainId, TrainLabel, TravelerId};
