#![deny(warnings)]

//! Core domain models for the bonus aggregation engine.
//!
//! This crate defines the closed enumerations the engine interprets, the
//! immutable bonus definitions produced by the registry, and the read-only
//! state adapter hosts implement to expose a turn snapshot.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of entity that can contribute a bonus.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Character,
    Building,
    Technology,
    Trait,
}

impl SourceKind {
    /// Configuration name, e.g. "building".
    pub fn name(self) -> &'static str {
        match self {
            SourceKind::Character => "character",
            SourceKind::Building => "building",
            SourceKind::Technology => "technology",
            SourceKind::Trait => "trait",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-turn effect categories.
///
/// The enumeration is fixed at compile time; configuration may only declare
/// values for members listed here. Extending it is an engine change, not a
/// configuration change.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BonusType {
    FoodPerTurn,
    WealthPerTurn,
    SciencePerTurn,
    CulturePerTurn,
    PopulationGrowth,
    Happiness,
}

impl BonusType {
    /// Every member, in evaluation order.
    pub const ALL: [BonusType; 6] = [
        BonusType::FoodPerTurn,
        BonusType::WealthPerTurn,
        BonusType::SciencePerTurn,
        BonusType::CulturePerTurn,
        BonusType::PopulationGrowth,
        BonusType::Happiness,
    ];

    /// Configuration key for this type, e.g. "food_per_turn".
    pub fn name(self) -> &'static str {
        match self {
            BonusType::FoodPerTurn => "food_per_turn",
            BonusType::WealthPerTurn => "wealth_per_turn",
            BonusType::SciencePerTurn => "science_per_turn",
            BonusType::CulturePerTurn => "culture_per_turn",
            BonusType::PopulationGrowth => "population_growth",
            BonusType::Happiness => "happiness",
        }
    }
}

impl fmt::Display for BonusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A caller named a bonus type outside the fixed enumeration.
///
/// Fails only the request that carried the name; other evaluations are
/// unaffected.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown bonus type: {0}")]
pub struct UnknownBonusTypeError(pub String);

impl FromStr for BonusType {
    type Err = UnknownBonusTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BonusType::ALL
            .into_iter()
            .find(|ty| ty.name() == s)
            .ok_or_else(|| UnknownBonusTypeError(s.to_string()))
    }
}

/// Resources a source can draw upkeep from.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Food,
    Wealth,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Food, ResourceKind::Wealth];

    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Food => "food",
            ResourceKind::Wealth => "wealth",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown resource: {0}")]
pub struct UnknownResourceError(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| UnknownResourceError(s.to_string()))
    }
}

/// Civilization era ladder, ordered from earliest to latest.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Era {
    StoneAge,
    BronzeAge,
    IronAge,
    Classical,
    Medieval,
    Renaissance,
    Industrial,
    Modern,
}

impl Era {
    pub const ALL: [Era; 8] = [
        Era::StoneAge,
        Era::BronzeAge,
        Era::IronAge,
        Era::Classical,
        Era::Medieval,
        Era::Renaissance,
        Era::Industrial,
        Era::Modern,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Era::StoneAge => "stone_age",
            Era::BronzeAge => "bronze_age",
            Era::IronAge => "iron_age",
            Era::Classical => "classical",
            Era::Medieval => "medieval",
            Era::Renaissance => "renaissance",
            Era::Industrial => "industrial",
            Era::Modern => "modern",
        }
    }
}

impl Default for Era {
    fn default() -> Self {
        Era::StoneAge
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown era: {0}")]
pub struct UnknownEraError(pub String);

impl FromStr for Era {
    type Err = UnknownEraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Era::ALL
            .into_iter()
            .find(|e| e.name() == s)
            .ok_or_else(|| UnknownEraError(s.to_string()))
    }
}

/// Pure activation predicate attached to a definition.
///
/// Predicates only read the snapshot; a false predicate excludes the
/// definition silently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Holds once the snapshot era is at or past the given era.
    MinEra(Era),
    /// Holds when every listed tag is present in the snapshot terrain.
    Terrain(Vec<String>),
}

impl Condition {
    pub fn holds(&self, state: &impl StateView) -> bool {
        match self {
            Condition::MinEra(era) => state.era() >= *era,
            Condition::Terrain(tags) => tags
                .iter()
                .all(|tag| state.terrain_tags().iter().any(|t| t == tag)),
        }
    }
}

/// Immutable, configuration-declared mapping from a source to its per-type
/// values and activation conditions. Built once by the registry and read-only
/// for the process lifetime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BonusDefinition {
    pub kind: SourceKind,
    /// Unique within `kind`.
    pub id: String,
    /// Declared per-type values; only declared types apply.
    pub values: BTreeMap<BonusType, Decimal>,
    pub description: String,
    /// Per-turn upkeep drawn while the source is present.
    pub cost: BTreeMap<ResourceKind, Decimal>,
    /// All conditions must hold for the definition to contribute.
    pub conditions: Vec<Condition>,
}

impl BonusDefinition {
    /// Declared value for `ty`. Zero declarations are treated as absent.
    pub fn value_for(&self, ty: BonusType) -> Option<Decimal> {
        self.values.get(&ty).copied().filter(|v| !v.is_zero())
    }

    /// True when every condition holds against `state`.
    pub fn active_in(&self, state: &impl StateView) -> bool {
        self.conditions.iter().all(|c| c.holds(state))
    }
}

/// A single contribution from one source instance.
///
/// Computed fresh per evaluation, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActiveBonusEntry {
    pub kind: SourceKind,
    pub id: String,
    /// Attribution label: the character's personal name for roster sources,
    /// otherwise the definition id.
    pub display_name: String,
    pub value: Decimal,
}

/// Total plus attributable breakdown for one bonus type against one
/// snapshot. `total` is the exact sum of `sources`; nothing else may feed it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregatedBonus {
    pub bonus_type: BonusType,
    pub total: Decimal,
    pub sources: Vec<ActiveBonusEntry>,
}

impl AggregatedBonus {
    /// An empty aggregate for `ty`.
    pub fn empty(ty: BonusType) -> Self {
        Self {
            bonus_type: ty,
            total: Decimal::ZERO,
            sources: Vec::new(),
        }
    }
}

/// A character and the role they hold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub role: String,
}

/// Read-only adapter over the host's turn snapshot.
///
/// The engine never writes through this interface. The snapshot must not be
/// mutated for the duration of a call; the host guarantees isolation.
pub trait StateView {
    /// Turn identifier, opaque to the engine.
    fn turn(&self) -> u64;
    fn era(&self) -> Era;
    fn population(&self) -> u64;
    /// Population happiness in [0, 100].
    fn happiness(&self) -> u8;
    /// Characters currently holding roles, leader included.
    fn roster(&self) -> &[RosterEntry];
    /// Ids of constructed infrastructure.
    fn infrastructure(&self) -> &[String];
    /// Names of researched technologies.
    fn technologies(&self) -> &[String];
    /// Traits held by the current leader.
    fn leader_traits(&self) -> &[String];
    /// Geography tags that conditions may reference.
    fn terrain_tags(&self) -> &[String];
}

/// Owned snapshot value: the fixture format the CLI loads and the default
/// [`StateView`] implementation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub turn: u64,
    #[serde(default)]
    pub era: Era,
    #[serde(default)]
    pub population: u64,
    #[serde(default)]
    pub happiness: u8,
    #[serde(default)]
    pub roster: Vec<RosterEntry>,
    #[serde(default)]
    pub infrastructure: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub leader_traits: Vec<String>,
    #[serde(default)]
    pub terrain: Vec<String>,
}

impl StateView for StateSnapshot {
    fn turn(&self) -> u64 {
        self.turn
    }
    fn era(&self) -> Era {
        self.era
    }
    fn population(&self) -> u64 {
        self.population
    }
    fn happiness(&self) -> u8 {
        self.happiness
    }
    fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }
    fn infrastructure(&self) -> &[String] {
        &self.infrastructure
    }
    fn technologies(&self) -> &[String] {
        &self.technologies
    }
    fn leader_traits(&self) -> &[String] {
        &self.leader_traits
    }
    fn terrain_tags(&self) -> &[String] {
        &self.terrain
    }
}

/// Validation errors for snapshot invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Happiness must be within [0, 100].
    #[error("happiness {0} is out of range [0, 100]")]
    HappinessOutOfRange(u8),
    /// Roster names and roles must be non-empty.
    #[error("empty name in snapshot field: {0}")]
    EmptyName(&'static str),
}

/// Validate a snapshot before handing it to the engine.
pub fn validate_snapshot(snapshot: &StateSnapshot) -> Result<(), ValidationError> {
    if snapshot.happiness > 100 {
        return Err(ValidationError::HappinessOutOfRange(snapshot.happiness));
    }
    for entry in &snapshot.roster {
        if entry.name.trim().is_empty() {
            return Err(ValidationError::EmptyName("roster.name"));
        }
        if entry.role.trim().is_empty() {
            return Err(ValidationError::EmptyName("roster.role"));
        }
    }
    for (field, list) in [
        ("infrastructure", &snapshot.infrastructure),
        ("technologies", &snapshot.technologies),
        ("leader_traits", &snapshot.leader_traits),
        ("terrain", &snapshot.terrain),
    ] {
        if list.iter().any(|s| s.trim().is_empty()) {
            return Err(ValidationError::EmptyName(field));
        }
    }
    Ok(())
}
