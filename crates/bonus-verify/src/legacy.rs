//! The hardcoded per-turn rules the data-driven engine replaces.
//!
//! These tables predate the registry: every value lives inline in the match
//! arms below, which is exactly the maintenance problem the migration
//! retires. They are kept verbatim so shadow verification can compare both
//! paths on real snapshots; this module is deleted once the engine is
//! promoted everywhere.

use crate::LegacyCalculator;
use bonus_core::{BonusType, StateView};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Inline role, building, technology and trait tables.
#[derive(Clone, Copy, Debug, Default)]
pub struct HardcodedRules;

impl HardcodedRules {
    fn role_value(role: &str, ty: BonusType) -> i64 {
        match (role, ty) {
            ("Leader", BonusType::SciencePerTurn) => 1,
            ("Leader", BonusType::CulturePerTurn) => 1,
            ("Scholar", BonusType::SciencePerTurn) => 5,
            ("Artisan", BonusType::CulturePerTurn) => 5,
            ("Grand Marshal", BonusType::FoodPerTurn) => -5,
            ("Chancellor", BonusType::WealthPerTurn) => 10,
            _ => 0,
        }
    }

    fn building_value(id: &str, ty: BonusType) -> i64 {
        match (id, ty) {
            ("Granary", BonusType::FoodPerTurn) => 10,
            ("Market", BonusType::WealthPerTurn) => 15,
            ("Library", BonusType::SciencePerTurn) => 8,
            ("Temple", BonusType::Happiness) => 5,
            ("Temple", BonusType::CulturePerTurn) => 5,
            ("Workshop", BonusType::CulturePerTurn) => 3,
            ("Workshop", BonusType::WealthPerTurn) => 5,
            _ => 0,
        }
    }

    fn technology_value(id: &str, ty: BonusType) -> i64 {
        match (id, ty) {
            ("Writing", BonusType::SciencePerTurn) => 3,
            ("Writing", BonusType::CulturePerTurn) => 2,
            _ => 0,
        }
    }

    fn trait_value(id: &str, ty: BonusType) -> i64 {
        match (id, ty) {
            ("Wise", BonusType::SciencePerTurn) => 2,
            ("Scholar", BonusType::SciencePerTurn) => 3,
            ("Prosperous", BonusType::WealthPerTurn) => 5,
            ("Mercantile", BonusType::WealthPerTurn) => 3,
            ("Visionary", BonusType::CulturePerTurn) => 2,
            ("Charismatic", BonusType::CulturePerTurn) => 1,
            _ => 0,
        }
    }
}

impl<S: StateView> LegacyCalculator<S> for HardcodedRules {
    fn compute(&self, state: &S) -> BTreeMap<BonusType, Decimal> {
        let mut totals = BTreeMap::new();
        for ty in BonusType::ALL {
            let mut total: i64 = 0;
            for entry in state.roster() {
                total += Self::role_value(&entry.role, ty);
            }
            for id in state.infrastructure() {
                total += Self::building_value(id, ty);
            }
            for id in state.technologies() {
                total += Self::technology_value(id, ty);
            }
            for id in state.leader_traits() {
                total += Self::trait_value(id, ty);
            }
            totals.insert(ty, Decimal::new(total, 0));
        }
        totals
    }
}
