//! Train check-in tracking server.
//!
//! Travelers check into a train at a departure station and out again at
//! their destination. The engine decides, against two unreliable upstream
//! feeds, whether a trip has arrived, is still under way or was cancelled,
//! and keeps at most one active session per traveler.

pub mod config;
pub mod domain;
pub mod engine;
pub mod enrich;
pub mod feeds;
pub mod notify;
pub mod status;
pub mod store;
pub mod sync;
pub mod web;
pub mod worker;
