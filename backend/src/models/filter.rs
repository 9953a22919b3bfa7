use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed canonical filter vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CanonicalFilter {
    Ha,
    #[serde(rename = "OIII")]
    Oiii,
    #[serde(rename = "SII")]
    Sii,
    L,
    R,
    G,
    B,
}

impl CanonicalFilter {
    /// All canonical filters, narrowband first.
    pub const ALL: [CanonicalFilter; 7] = [
        CanonicalFilter::Ha,
        CanonicalFilter::Oiii,
        CanonicalFilter::Sii,
        CanonicalFilter::L,
        CanonicalFilter::R,
        CanonicalFilter::G,
        CanonicalFilter::B,
    ];

    /// Canonical display token.
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalFilter::Ha => "Ha",
            CanonicalFilter::Oiii => "OIII",
            CanonicalFilter::Sii => "SII",
            CanonicalFilter::L => "L",
            CanonicalFilter::R => "R",
            CanonicalFilter::G => "G",
            CanonicalFilter::B => "B",
        }
    }

    /// Band this filter belongs to.
    pub fn band(&self) -> FilterBand {
        match self {
            CanonicalFilter::Ha | CanonicalFilter::Oiii | CanonicalFilter::Sii => {
                FilterBand::Narrowband
            }
            _ => FilterBand::Broadband,
        }
    }

    /// Look up an already-canonical token (exact match only).
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == token)
    }
}

impl fmt::Display for CanonicalFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grouping of canonical filters into the two planning views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterBand {
    #[default]
    Narrowband,
    Broadband,
}

impl FilterBand {
    /// Canonical filters of this band, in display order.
    pub fn filters(&self) -> &'static [CanonicalFilter] {
        match self {
            FilterBand::Narrowband => &[
                CanonicalFilter::Ha,
                CanonicalFilter::Oiii,
                CanonicalFilter::Sii,
            ],
            FilterBand::Broadband => &[
                CanonicalFilter::L,
                CanonicalFilter::R,
                CanonicalFilter::G,
                CanonicalFilter::B,
            ],
        }
    }

    /// Whether a normalized filter token belongs to this band.
    pub fn contains(&self, token: &str) -> bool {
        CanonicalFilter::from_token(token).is_some_and(|f| f.band() == *self)
    }
}

impl FromStr for FilterBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "narrowband" | "narrow" | "nb" => Ok(Self::Narrowband),
            "broadband" | "broad" | "bb" | "lrgb" => Ok(Self::Broadband),
            _ => Err(format!("Unknown filter band: {}", s)),
        }
    }
}
