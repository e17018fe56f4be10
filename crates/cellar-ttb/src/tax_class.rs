//! Regulator tax classes.
//!
//! Wine and cider are reported in wine gallons under one of six tax classes;
//! spirits are reported separately in proof gallons.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Wine / cider tax classes
// ============================================================================

/// Wine-gallon tax class used on the TTB operations report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxClass {
    /// Hard cider (apple or pear, under 8.5% ABV).
    #[serde(rename = "hardCider")]
    HardCider,
    /// Still wine not over 16% ABV.
    #[serde(rename = "wineUnder16")]
    WineUnder16,
    /// Still wine over 16% and not over 21% ABV.
    #[serde(rename = "wine16To21")]
    Wine16To21,
    /// Still wine over 21% and not over 24% ABV.
    #[serde(rename = "wine21To24")]
    Wine21To24,
    /// Naturally sparkling wine.
    #[serde(rename = "sparklingWine")]
    SparklingWine,
    /// Artificially carbonated wine.
    #[serde(rename = "carbonatedWine")]
    CarbonatedWine,
}

impl TaxClass {
    /// Every tax class, in report order.
    pub const ALL: [TaxClass; 6] = [
        TaxClass::HardCider,
        TaxClass::WineUnder16,
        TaxClass::Wine16To21,
        TaxClass::Wine21To24,
        TaxClass::SparklingWine,
        TaxClass::CarbonatedWine,
    ];

    /// Regulator key, as used in stored balances.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::HardCider => "hardCider",
            Self::WineUnder16 => "wineUnder16",
            Self::Wine16To21 => "wine16To21",
            Self::Wine21To24 => "wine21To24",
            Self::SparklingWine => "sparklingWine",
            Self::CarbonatedWine => "carbonatedWine",
        }
    }

    /// Display label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::HardCider => "Hard Cider",
            Self::WineUnder16 => "Wine (under 16%)",
            Self::Wine16To21 => "Wine (16-21%)",
            Self::Wine21To24 => "Wine (21-24%)",
            Self::SparklingWine => "Sparkling Wine",
            Self::CarbonatedWine => "Carbonated Wine",
        }
    }
}

impl fmt::Display for TaxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TaxClass {
    type Err = UnknownTaxClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|class| class.key() == s)
            .ok_or_else(|| UnknownTaxClass(s.to_string()))
    }
}

// ============================================================================
// Spirits
// ============================================================================

/// Proof-gallon spirits class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpiritsClass {
    #[serde(rename = "appleBrandy")]
    AppleBrandy,
    #[serde(rename = "grapeSpirits")]
    GrapeSpirits,
}

impl SpiritsClass {
    /// Every spirits class, in report order.
    pub const ALL: [SpiritsClass; 2] = [SpiritsClass::AppleBrandy, SpiritsClass::GrapeSpirits];

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::AppleBrandy => "appleBrandy",
            Self::GrapeSpirits => "grapeSpirits",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::AppleBrandy => "Apple Brandy",
            Self::GrapeSpirits => "Grape Spirits",
        }
    }
}

impl fmt::Display for SpiritsClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SpiritsClass {
    type Err = UnknownTaxClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|class| class.key() == s)
            .ok_or_else(|| UnknownTaxClass(s.to_string()))
    }
}

// ============================================================================
// Legacy batch classification
// ============================================================================

/// Tax class a legacy batch may be filed under: any wine class or a spirits class.
///
/// Serialized as the bare regulator key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyTaxClass {
    Wine(TaxClass),
    Spirits(SpiritsClass),
}

impl LegacyTaxClass {
    /// Product type recorded on the created batch.
    #[must_use]
    pub fn product_type(self) -> ProductType {
        match self {
            Self::Wine(TaxClass::HardCider) => ProductType::Cider,
            Self::Wine(
                TaxClass::WineUnder16
                | TaxClass::Wine16To21
                | TaxClass::Wine21To24
                | TaxClass::SparklingWine
                | TaxClass::CarbonatedWine,
            ) => ProductType::Wine,
            Self::Spirits(SpiritsClass::AppleBrandy) => ProductType::Brandy,
            Self::Spirits(SpiritsClass::GrapeSpirits) => ProductType::Spirits,
        }
    }

    /// The wine-gallon class, if this is not a spirits class.
    #[must_use]
    pub fn wine_class(self) -> Option<TaxClass> {
        match self {
            Self::Wine(class) => Some(class),
            Self::Spirits(_) => None,
        }
    }

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Wine(class) => class.key(),
            Self::Spirits(class) => class.key(),
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Wine(class) => class.label(),
            Self::Spirits(class) => class.label(),
        }
    }
}

impl From<TaxClass> for LegacyTaxClass {
    fn from(class: TaxClass) -> Self {
        Self::Wine(class)
    }
}

impl From<SpiritsClass> for LegacyTaxClass {
    fn from(class: SpiritsClass) -> Self {
        Self::Spirits(class)
    }
}

impl fmt::Display for LegacyTaxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for LegacyTaxClass {
    type Err = UnknownTaxClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<TaxClass>()
            .map(Self::Wine)
            .or_else(|_| s.parse::<SpiritsClass>().map(Self::Spirits))
    }
}

/// Product type understood by the batch records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Cider,
    Wine,
    Brandy,
    Spirits,
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cider => write!(f, "cider"),
            Self::Wine => write!(f, "wine"),
            Self::Brandy => write!(f, "brandy"),
            Self::Spirits => write!(f, "spirits"),
        }
    }
}

/// Error returned when parsing an unrecognised tax-class key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown tax class: {0}")]
pub struct UnknownTaxClass(pub String);
