//! Care-site reference types.
//!
//! Care sites form a fixed-depth forest: Hospital → Pole → UF (functional
//! unit). Each non-root site has exactly one parent.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::id::CareSiteId;

/// Hierarchy level of a care site, from the root down.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum CareSiteLevel {
    Hospital,
    Pole,
    #[serde(rename = "UF")]
    Uf,
}

impl CareSiteLevel {
    /// All levels, root first.
    pub fn all() -> &'static [CareSiteLevel] {
        &[CareSiteLevel::Hospital, CareSiteLevel::Pole, CareSiteLevel::Uf]
    }

    /// Depth in the hierarchy (root is 0).
    pub fn depth(&self) -> usize {
        match self {
            CareSiteLevel::Hospital => 0,
            CareSiteLevel::Pole => 1,
            CareSiteLevel::Uf => 2,
        }
    }

    /// Short key used in output tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            CareSiteLevel::Hospital => "Hospital",
            CareSiteLevel::Pole => "Pole",
            CareSiteLevel::Uf => "UF",
        }
    }

    /// Name as written in hospital reference tables.
    pub fn display_name(&self) -> &'static str {
        match self {
            CareSiteLevel::Hospital => "Hôpital",
            CareSiteLevel::Pole => "Pôle/DMU",
            CareSiteLevel::Uf => "Unité Fonctionnelle (UF)",
        }
    }

    /// Every accepted spelling, for error messages.
    pub fn supported_names() -> Vec<String> {
        Self::all()
            .iter()
            .flat_map(|l| [l.as_str().to_string(), l.display_name().to_string()])
            .collect()
    }
}

impl std::fmt::Display for CareSiteLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CareSiteLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        CareSiteLevel::all()
            .iter()
            .find(|l| {
                l.as_str().eq_ignore_ascii_case(s) || l.display_name().eq_ignore_ascii_case(s)
            })
            .copied()
            .ok_or_else(|| format!("unknown care site level: {}", s))
    }
}

/// One row of the care-site reference table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareSite {
    pub care_site_id: CareSiteId,
    pub care_site_short_name: String,
    /// Raw level string; parsed with [`CareSite::level`].
    pub care_site_level: String,
    #[serde(default)]
    pub parent_id: Option<CareSiteId>,
}

impl CareSite {
    /// Parsed level, `None` for levels outside the supported hierarchy.
    pub fn level(&self) -> Option<CareSiteLevel> {
        self.care_site_level.parse().ok()
    }
}
