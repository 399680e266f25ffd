//! Web layer for the transit tracker.
//!
//! A thin JSON surface over the engine, the status projector and the sync
//! adapter. No authentication and no HTML.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
