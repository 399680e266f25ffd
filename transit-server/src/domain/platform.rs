//! Station and platform metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::StationId;

/// Direction of travel as seen on a station's platform plan.
///
/// Platform sections are lettered left to right (A on the left), so `Left`
/// means "towards section A".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// Layout facts about one platform track.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlatformInfo {
    /// Platform designation, e.g. "7" or "7a"
    pub name: String,
    /// Dead-end (terminal) track: trains can only leave the way they came in
    #[serde(default)]
    pub kopfgleis: bool,
    /// For dead-end tracks: direction towards the open end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_end: Option<Direction>,
    /// Direction a departing train takes towards each neighbouring station
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub neighbors: BTreeMap<String, Direction>,
}

/// Metadata for one station, as reported by the station metadata endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationMetadata {
    pub id: StationId,
    pub name: String,
    #[serde(default)]
    pub platforms: Vec<PlatformInfo>,
}

impl StationMetadata {
    /// Look up a platform by designation.
    ///
    /// Falls back to the numeric part, since the board says "7" where the
    /// plan distinguishes "7a" and "7b" (or the other way round).
    pub fn platform(&self, name: &str) -> Option<&PlatformInfo> {
        if let Some(exact) = self.platforms.iter().find(|p| p.name == name) {
            return Some(exact);
        }
        let number = platform_number(name)?;
        self.platforms
            .iter()
            .find(|p| platform_number(&p.name) == Some(number))
    }
}

/// Leading digits of a platform designation ("7a" -> 7).
fn platform_number(name: &str) -> Option<u32> {
    let digits: String = name.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> StationMetadata {
        StationMetadata {
            id: StationId::new(8000080),
            name: "Dortmund Hbf".into(),
            platforms: vec![
                PlatformInfo {
                    name: "7".into(),
                    ..PlatformInfo::default()
                },
                PlatformInfo {
                    name: "11a".into(),
                    kopfgleis: true,
                    open_end: Some(Direction::Right),
                    ..PlatformInfo::default()
                },
            ],
        }
    }

    #[test]
    fn flip_is_involutive() {
        assert_eq!(Direction::Left.flipped(), Direction::Right);
        assert_eq!(Direction::Left.flipped().flipped(), Direction::Left);
    }

    #[test]
    fn platform_lookup_exact_then_numeric() {
        let meta = meta();
        assert_eq!(meta.platform("7").unwrap().name, "7");
        assert_eq!(meta.platform("7b").unwrap().name, "7");
        assert_eq!(meta.platform("11").unwrap().name, "11a");
        assert!(meta.platform("12").is_none());
        assert!(meta.platform("Gleis").is_none());
    }

    #[test]
    fn direction_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Direction::Left).unwrap(), "\"left\"");
    }
}
