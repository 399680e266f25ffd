//! Station identifier types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid station id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid station id: {reason}")]
pub struct InvalidStationId {
    reason: &'static str,
}

/// Longest EVA number we accept. Real ones have 6 to 8 digits.
const MAX_DIGITS: usize = 9;

/// A numeric station identifier (EVA number).
///
/// Both upstream feeds key stations by EVA number. This type guarantees the
/// value came from a string of ASCII digits.
///
/// # Examples
///
/// ```
/// use transit_server::domain::StationId;
///
/// let dortmund = StationId::parse("8000080").unwrap();
/// assert_eq!(dortmund.get(), 8000080);
///
/// // Names are not ids
/// assert!(StationId::parse("Dortmund Hbf").is_err());
/// assert!(StationId::parse("").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(u32);

impl StationId {
    /// Parse a station id from a string of 1 to 9 ASCII digits.
    pub fn parse(s: &str) -> Result<Self, InvalidStationId> {
        let bytes = s.as_bytes();

        if bytes.is_empty() {
            return Err(InvalidStationId {
                reason: "must not be empty",
            });
        }

        if bytes.len() > MAX_DIGITS {
            return Err(InvalidStationId {
                reason: "must have at most 9 digits",
            });
        }

        if !bytes.iter().all(u8::is_ascii_digit) {
            return Err(InvalidStationId {
                reason: "must be ASCII digits 0-9",
            });
        }

        s.parse::<u32>().map(StationId).map_err(|_| InvalidStationId {
            reason: "out of range",
        })
    }

    /// Wrap a raw number coming from a trusted source (database, typed JSON).
    pub const fn new(id: u32) -> Self {
        StationId(id)
    }

    /// Returns the numeric value.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StationId({})", self.0)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resolved station: id plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
}

impl Station {
    pub fn new(id: StationId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// True if `query` names this station, either by id or by exact name.
    pub fn matches(&self, query: &str) -> bool {
        match StationId::parse(query) {
            Ok(id) => id == self.id,
            Err(_) => self.name == query,
        }
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_ids() {
        assert_eq!(StationId::parse("8000080").unwrap().get(), 8000080);
        assert_eq!(StationId::parse("8").unwrap().get(), 8);
        assert_eq!(StationId::parse("008000080").unwrap().get(), 8000080);
    }

    #[test]
    fn reject_non_digits() {
        assert!(StationId::parse("EDO").is_err());
        assert!(StationId::parse("80000 80").is_err());
        assert!(StationId::parse("-8000080").is_err());
        assert!(StationId::parse("８０").is_err());
    }

    #[test]
    fn reject_wrong_length() {
        assert!(StationId::parse("").is_err());
        assert!(StationId::parse("1234567890").is_err());
    }

    #[test]
    fn display_and_debug() {
        let id = StationId::new(8000098);
        assert_eq!(id.to_string(), "8000098");
        assert_eq!(format!("{:?}", id), "StationId(8000098)");
    }

    #[test]
    fn serde_is_transparent() {
        let id = StationId::new(8000080);
        assert_eq!(serde_json::to_string(&id).unwrap(), "8000080");
        let back: StationId = serde_json::from_str("8000080").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn station_matches_id_or_name() {
        let station = Station::new(StationId::new(8000080), "Dortmund Hbf");
        assert!(station.matches("8000080"));
        assert!(station.matches("Dortmund Hbf"));
        assert!(!station.matches("8000098"));
        assert!(!station.matches("Essen Hbf"));
    }
}
