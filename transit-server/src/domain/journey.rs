//! Finalized journeys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JourneyId, TransitSession};

/// Which fields a human changed after finalization.
///
/// Any set bit makes the journey immutable to undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditFlags(u16);

impl EditFlags {
    pub const NONE: EditFlags = EditFlags(0);
    pub const SCHED_DEPARTURE: EditFlags = EditFlags(0x0001);
    pub const REAL_DEPARTURE: EditFlags = EditFlags(0x0002);
    pub const FROM_STATION: EditFlags = EditFlags(0x0004);
    pub const SCHED_ARRIVAL: EditFlags = EditFlags(0x0010);
    pub const REAL_ARRIVAL: EditFlags = EditFlags(0x0020);
    pub const TO_STATION: EditFlags = EditFlags(0x0040);
    pub const ROUTE: EditFlags = EditFlags(0x0100);

    pub const fn from_bits(bits: u16) -> Self {
        EditFlags(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn is_edited(self) -> bool {
        self.0 != 0
    }

    pub const fn contains(self, other: EditFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for EditFlags {
    type Output = EditFlags;

    fn bitor(self, rhs: Self) -> Self {
        EditFlags(self.0 | rhs.0)
    }
}

/// A finalized trip.
///
/// Stores the session exactly as it was finalized, so undo can restore it
/// without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub id: JourneyId,
    #[serde(default)]
    pub edited: EditFlags,
    pub checked_out_at: DateTime<Utc>,
    pub trip: TransitSession,
}

impl Journey {
    pub fn from_session(id: JourneyId, trip: TransitSession, checked_out_at: DateTime<Utc>) -> Self {
        Self {
            id,
            edited: EditFlags::NONE,
            checked_out_at,
            trip,
        }
    }

    /// Inverse of finalization: drop the id, edit marker and check-out time.
    pub fn into_session(self) -> TransitSession {
        self.trip
    }

    pub fn is_cancelled(&self) -> bool {
        self.trip.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::fixtures::session;

    #[test]
    fn edit_flags() {
        assert!(!EditFlags::NONE.is_edited());
        let f = EditFlags::SCHED_ARRIVAL | EditFlags::ROUTE;
        assert!(f.is_edited());
        assert!(f.contains(EditFlags::ROUTE));
        assert!(!f.contains(EditFlags::REAL_ARRIVAL));
        assert_eq!(f.bits(), 0x0110);
        assert_eq!(EditFlags::from_bits(0x0110), f);
    }

    #[test]
    fn session_survives_finalization() {
        let s = session();
        let j = Journey::from_session(JourneyId(9), s.clone(), s.checked_in_at);
        assert!(!j.is_cancelled());
        assert_eq!(j.into_session(), s);
    }
}
