#![deny(warnings)]

//! Core domain models and invariants for the galaxy trade economy.
//!
//! This crate defines serializable types shared across the simulation:
//! the commodity catalog, the dense index of simulated commodities, the
//! galaxy topology (systems, planets, jump routes), validation helpers
//! that guarantee basic invariants, and the credits display formatter.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// A tradable good type with a static base price.
///
/// A commodity with `base_price <= 0` is informational only and never
/// participates in economic simulation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Commodity {
    /// Unique commodity name, e.g. "Food" or "Industrial Goods".
    pub name: String,
    /// Optional flavor text shown on market screens.
    #[serde(default)]
    pub description: Option<String>,
    /// Static base price in credits per unit (>= 0).
    pub base_price: f64,
}

impl Commodity {
    /// Sort key for market listings: most expensive first, name breaks ties.
    pub fn display_cmp(&self, other: &Commodity) -> Ordering {
        other
            .base_price
            .partial_cmp(&self.base_price)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.name.cmp(&other.name))
    }
}

/// The full ordered commodity catalog, simulated goods and
/// informational goods alike.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CommodityCatalog {
    /// Commodities in catalog order. Order is load-bearing: it fixes
    /// the [`EconomyIndex`] layout.
    pub commodities: Vec<Commodity>,
}

impl CommodityCatalog {
    /// Looks up a commodity by name, warning when it is absent.
    pub fn get(&self, name: &str) -> Option<&Commodity> {
        let found = self.find(name);
        if found.is_none() {
            warn!(name, "commodity not found in catalog");
        }
        found
    }

    /// Looks up a commodity by name without logging.
    pub fn find(&self, name: &str) -> Option<&Commodity> {
        self.commodities.iter().find(|c| c.name == name)
    }
}

/// One simulated commodity as seen by the economy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EconomyEntry {
    /// Position of the commodity in the source catalog.
    pub catalog_index: usize,
    /// Commodity name, copied so the simulation never re-reads the catalog.
    pub name: String,
    /// Static base price (> 0 by construction).
    pub base_price: f64,
}

/// Dense ordered index over the commodities that participate in
/// simulation, derived once from the catalog.
///
/// Every per-system economic array is keyed by position in this index.
/// The index is immutable for the lifetime of a simulation session;
/// a catalog change that affects which commodities simulate requires
/// rebuilding the index and re-initializing all per-system state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EconomyIndex {
    entries: Vec<EconomyEntry>,
}

impl EconomyIndex {
    /// Derives the index by filtering the catalog to `base_price > 0`,
    /// preserving catalog order.
    pub fn from_catalog(catalog: &CommodityCatalog) -> Self {
        let entries = catalog
            .commodities
            .iter()
            .enumerate()
            .filter(|(_, c)| c.base_price > 0.0)
            .map(|(i, c)| EconomyEntry {
                catalog_index: i,
                name: c.name.clone(),
                base_price: c.base_price,
            })
            .collect();
        Self { entries }
    }

    /// Number of simulated commodities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no commodity simulates.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Simulated commodities in index order.
    pub fn entries(&self) -> &[EconomyEntry] {
        &self.entries
    }

    /// Index position of a commodity by name, `None` when the
    /// commodity does not simulate.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }
}

/// Stable identity of a star system: its position in [`Galaxy::systems`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SystemId(pub usize);

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "system#{}", self.0)
    }
}

/// A planet contributing production/consumption to its host system.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Planet {
    /// Planet name.
    pub name: String,
    /// Net production (+) / consumption (-) per good, keyed by
    /// [`EconomyIndex`] position. May be left empty when the planet's
    /// economic data has not been authored yet; the simulation treats
    /// that as zero contribution.
    #[serde(default)]
    pub prod_mods: Vec<f64>,
}

/// An adjacency link along which trade occurs.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct JumpEdge {
    /// The system on the other end of the jump.
    pub target: SystemId,
}

/// A node in the galaxy graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StarSystem {
    /// System name.
    pub name: String,
    /// Planets located in the system.
    pub planets: Vec<Planet>,
    /// Jump routes out of the system. Expected to be symmetric: if A
    /// lists B, B lists A.
    pub jumps: Vec<JumpEdge>,
}

/// The galaxy topology: systems plus jump adjacency. Owned by the
/// world model; the simulation only iterates it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Galaxy {
    /// Systems in id order ([`SystemId`] is the position here).
    pub systems: Vec<StarSystem>,
}

/// Validation errors for catalog and topology invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Commodity names must be non-empty and unique.
    #[error("invalid commodity name: {0:?}")]
    BadCommodityName(String),
    /// Base prices must be finite and non-negative.
    #[error("commodity '{0}' has invalid base price")]
    BadBasePrice(String),
    /// A jump edge points outside the galaxy.
    #[error("jump from {0} targets unknown {1}")]
    JumpOutOfRange(SystemId, SystemId),
    /// A system must not jump to itself.
    #[error("{0} has a jump to itself")]
    SelfJump(SystemId),
    /// Planetary production modifiers must be finite.
    #[error("planet '{0}' has a non-finite production modifier")]
    NonFiniteProduction(String),
}

/// Validate a single commodity.
pub fn validate_commodity(c: &Commodity) -> Result<(), ValidationError> {
    if c.name.trim().is_empty() {
        return Err(ValidationError::BadCommodityName(c.name.clone()));
    }
    if !c.base_price.is_finite() || c.base_price < 0.0 {
        return Err(ValidationError::BadBasePrice(c.name.clone()));
    }
    Ok(())
}

/// Validate the whole catalog, including name uniqueness.
pub fn validate_catalog(catalog: &CommodityCatalog) -> Result<(), ValidationError> {
    let mut names: BTreeSet<&str> = BTreeSet::new();
    for c in &catalog.commodities {
        validate_commodity(c)?;
        if !names.insert(c.name.as_str()) {
            return Err(ValidationError::BadCommodityName(c.name.clone()));
        }
    }
    Ok(())
}

/// Validate the galaxy topology: jump edges must stay inside the
/// galaxy and never self-reference, planetary modifiers must be finite.
///
/// Planetary modifier vectors of the wrong length are not rejected
/// here; the simulation reports those as diagnostics and treats them
/// as zero contribution.
pub fn validate_galaxy(galaxy: &Galaxy) -> Result<(), ValidationError> {
    let n = galaxy.systems.len();
    for (i, sys) in galaxy.systems.iter().enumerate() {
        let id = SystemId(i);
        for jump in &sys.jumps {
            if jump.target.0 >= n {
                return Err(ValidationError::JumpOutOfRange(id, jump.target));
            }
            if jump.target.0 == i {
                return Err(ValidationError::SelfJump(id));
            }
        }
        for planet in &sys.planets {
            if planet.prod_mods.iter().any(|m| !m.is_finite()) {
                return Err(ValidationError::NonFiniteProduction(planet.name.clone()));
            }
        }
    }
    Ok(())
}

/// Formats a credits amount for display.
///
/// With `decimals = None` the raw digits are returned. Otherwise large
/// amounts are collapsed with a magnitude suffix (K/M/B/T/Q) and the
/// requested number of decimals, e.g. `format_credits(2_500_000, Some(1))`
/// yields `"2.5M"`.
pub fn format_credits(credits: i64, decimals: Option<usize>) -> String {
    let d = match decimals {
        Some(d) => d,
        None => return format!("{credits}"),
    };
    if credits >= 1_000_000_000_000_000 {
        format!("{:.d$}Q", credits as f64 / 1e15, d = d)
    } else if credits >= 1_000_000_000_000 {
        format!("{:.d$}T", credits as f64 / 1e12, d = d)
    } else if credits >= 1_000_000_000 {
        format!("{:.d$}B", credits as f64 / 1e9, d = d)
    } else if credits >= 1_000_000 {
        format!("{:.d$}M", credits as f64 / 1e6, d = d)
    } else if credits >= 1_000 {
        format!("{:.d$}K", credits as f64 / 1e3, d = d)
    } else {
        format!("{credits}")
    }
}
