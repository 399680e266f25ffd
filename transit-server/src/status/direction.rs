//! Which way the train will be moving on the platform.
//!
//! Platform layout wins when the station metadata covers the platform. The
//! wagon composition's section order is the fallback.

use crate::domain::{Direction, StationMetadata, TransitSession};

/// Heading of the train when it leaves the departure platform.
pub fn departure_direction(
    session: &TransitSession,
    meta: Option<&StationMetadata>,
) -> Option<Direction> {
    let from_platform = || -> Option<Direction> {
        let platform = meta?.platform(session.dep_platform.as_deref()?)?;
        if platform.kopfgleis {
            return platform.open_end;
        }
        let next = session.route.get(session.departure_index()? + 1)?;
        platform.neighbors.get(&next.name).copied()
    };

    from_platform().or_else(|| session.enrichment.composition_dep.as_ref()?.heading())
}

/// Heading of the train when it pulls into the arrival platform.
///
/// On a dead-end track it runs towards the buffer stop, away from the open
/// end. Elsewhere it comes from the previous stop, so it moves opposite to a
/// departure towards that stop.
pub fn arrival_direction(
    session: &TransitSession,
    meta: Option<&StationMetadata>,
) -> Option<Direction> {
    let from_platform = || -> Option<Direction> {
        let platform = meta?.platform(session.arr_platform.as_deref()?)?;
        if platform.kopfgleis {
            return platform.open_end.map(Direction::flipped);
        }
        let prev = session.route.get(session.arrival_index()?.checked_sub(1)?)?;
        platform.neighbors.get(&prev.name).copied().map(Direction::flipped)
    };

    from_platform().or_else(|| session.enrichment.composition_arr.as_ref()?.heading())
}
