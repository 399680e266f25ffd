//! Wagon composition (train formation) data.
//!
//! The composition feed returns a deeply nested document. We keep the raw
//! payload for later display and a flat, normalized wagon list for logic.

use serde::{Deserialize, Serialize};

use super::Direction;

/// Group designation of the rainbow-liveried ICE set.
pub const PRIDE_GROUP: &str = "ICE0304";

/// Coarse wagon category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WagonClass {
    First,
    Second,
    Mixed,
    Dining,
    Locomotive,
    Other,
}

impl WagonClass {
    fn from_category(category: &str) -> Self {
        if category.contains("ERSTEZWEITEKLASSE") {
            WagonClass::Mixed
        } else if category.contains("ERSTEKLASSE") {
            WagonClass::First
        } else if category.contains("ZWEITEKLASSE") {
            WagonClass::Second
        } else if category.contains("SPEISEWAGEN") || category.contains("HALBSPEISEWAGEN") {
            WagonClass::Dining
        } else if category.contains("TRIEBKOPF") || category.contains("LOK") {
            WagonClass::Locomotive
        } else {
            WagonClass::Other
        }
    }
}

/// One wagon in travel order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wagon {
    /// Wagon number shown on the coach ("Wagen 21")
    pub number: Option<String>,
    /// Vehicle type code, e.g. "Apmz"
    pub kind: String,
    /// Platform section the wagon stops at
    pub section: Option<String>,
    pub class: WagonClass,
    /// Designation of the vehicle group (train set) this wagon belongs to
    pub group: String,
}

/// A normalized composition plus the raw payload it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub raw: serde_json::Value,
    pub wagons: Vec<Wagon>,
    pub groups: Vec<String>,
    /// Formation is listed against the direction of travel
    pub reversed: bool,
}

/// Error normalizing a composition payload.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid composition payload: {0}")]
pub struct InvalidComposition(String);

#[derive(Deserialize)]
struct RawDocument {
    data: RawData,
}

#[derive(Deserialize)]
struct RawData {
    istformation: RawFormation,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFormation {
    #[serde(default)]
    fahrtrichtung: Option<String>,
    #[serde(default)]
    all_fahrzeuggruppe: Vec<RawGroup>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGroup {
    fahrzeuggruppebezeichnung: String,
    #[serde(default)]
    all_fahrzeug: Vec<RawWagon>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWagon {
    #[serde(default)]
    wagenordnungsnummer: Option<String>,
    #[serde(default)]
    fahrzeugtyp: String,
    #[serde(default)]
    fahrzeugsektor: Option<String>,
    #[serde(default)]
    kategorie: String,
}

impl Composition {
    /// Normalize a raw composition document.
    pub fn from_raw(raw: serde_json::Value) -> Result<Self, InvalidComposition> {
        let doc: RawDocument = serde_json::from_value(raw.clone())
            .map_err(|e| InvalidComposition(e.to_string()))?;
        let formation = doc.data.istformation;

        if formation.all_fahrzeuggruppe.is_empty() {
            return Err(InvalidComposition("no vehicle groups".into()));
        }

        let groups = formation
            .all_fahrzeuggruppe
            .iter()
            .map(|g| g.fahrzeuggruppebezeichnung.clone())
            .collect();

        let wagons = formation
            .all_fahrzeuggruppe
            .iter()
            .flat_map(|g| {
                g.all_fahrzeug.iter().map(move |w| Wagon {
                    number: w.wagenordnungsnummer.clone().filter(|n| !n.is_empty()),
                    kind: w.fahrzeugtyp.clone(),
                    section: w.fahrzeugsektor.clone().filter(|s| !s.is_empty()),
                    class: WagonClass::from_category(&w.kategorie),
                    group: g.fahrzeuggruppebezeichnung.clone(),
                })
            })
            .collect();

        Ok(Self {
            raw,
            wagons,
            groups,
            reversed: formation.fahrtrichtung.as_deref() == Some("RUECKWAERTS"),
        })
    }

    /// True if any vehicle group is the marker set.
    pub fn is_pride(&self) -> bool {
        self.groups.iter().any(|g| g == PRIDE_GROUP)
    }

    /// Heading derived from section ordering.
    ///
    /// Wagons are listed head first. If the head stops at an earlier section
    /// letter than the tail, the train is heading left.
    pub fn heading(&self) -> Option<Direction> {
        let mut sections = self.wagons.iter().filter_map(|w| w.section.as_deref());
        let head = sections.next()?;
        let tail = sections.last()?;

        let heading = match head.cmp(tail) {
            std::cmp::Ordering::Less => Direction::Left,
            std::cmp::Ordering::Greater => Direction::Right,
            std::cmp::Ordering::Equal => return None,
        };

        Some(if self.reversed {
            heading.flipped()
        } else {
            heading
        })
    }
}
