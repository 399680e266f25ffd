//! Train and traveler identity types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque upstream train identifier, as reported by the departure board.
///
/// Only meaningful together with the station and day it was observed at:
/// the same id is not guaranteed to be unique across providers or days.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainId(String);

impl TrainId {
    pub fn new(id: impl Into<String>) -> Self {
        TrainId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-facing train description: category, number and optional line.
///
/// # Examples
///
/// ```
/// use transit_server::domain::TrainLabel;
///
/// let ice = TrainLabel::new("ICE", "703", None);
/// assert_eq!(ice.to_string(), "ICE 703");
///
/// let s_bahn = TrainLabel::new("S", "30131", Some("1".into()));
/// assert_eq!(s_bahn.to_string(), "S 1");
/// assert_eq!(s_bahn.number_name(), "S 30131");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrainLabel {
    /// Category, e.g. "ICE", "RE", "S"
    pub train_type: String,
    /// Operational train number, e.g. "703"
    pub train_no: String,
    /// Line designation for local trains, e.g. "1" for S 1
    pub line: Option<String>,
}

impl TrainLabel {
    pub fn new(train_type: impl Into<String>, train_no: impl Into<String>, line: Option<String>) -> Self {
        Self {
            train_type: train_type.into(),
            train_no: train_no.into(),
            line,
        }
    }

    /// "<type> <number>", the form trip searches are keyed by.
    pub fn number_name(&self) -> String {
        format!("{} {}", self.train_type, self.train_no)
    }

    /// "<type> <line>" if a line is known, else the number name.
    pub fn line_name(&self) -> String {
        match &self.line {
            Some(line) => format!("{} {}", self.train_type, line),
            None => self.number_name(),
        }
    }
}

impl fmt::Display for TrainLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line_name())
    }
}

/// Traveler (account) id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TravelerId(pub i64);

impl fmt::Display for TravelerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned journey id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JourneyId(pub i64);

impl fmt::Display for JourneyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
