#![deny(warnings)]

//! Bonus evaluation and aggregation.
//!
//! The engine interprets registry definitions against a read-only state
//! snapshot and produces attributable per-type totals. Evaluation is pure:
//! no counters, no caches, no clocks. Identical snapshot and registry always
//! yield identical results, including source ordering.

pub mod dashboard;

use bonus_core::{
    ActiveBonusEntry, AggregatedBonus, BonusType, ResourceKind, SourceKind, StateView,
    UnknownBonusTypeError,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

pub use bonus_registry::Registry;

/// A state-referenced source with no matching registry definition.
///
/// Contributes nothing and is surfaced alongside results, never raised.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct UnknownSourceWarning {
    pub kind: SourceKind,
    pub id: String,
}

impl fmt::Display for UnknownSourceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' has no registry definition", self.kind, self.id)
    }
}

/// Result of evaluating one bonus type against one snapshot.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Evaluation {
    pub aggregate: AggregatedBonus,
    pub warnings: Vec<UnknownSourceWarning>,
}

/// Every per-type aggregate for one snapshot.
///
/// The map carries the full bonus type enumeration, zero totals included;
/// warnings are deduplicated across types.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineReport {
    pub bonuses: BTreeMap<BonusType, AggregatedBonus>,
    pub warnings: Vec<UnknownSourceWarning>,
}

/// One source instance found in the snapshot. The identity triple
/// (kind, id, display name) is the no-double-count key: the same building id
/// referenced twice collapses, while two characters sharing a role remain
/// distinct contributors.
struct SourceInstance<'a> {
    kind: SourceKind,
    id: &'a str,
    display_name: &'a str,
}

fn source_instances<'a>(state: &'a impl StateView) -> impl Iterator<Item = SourceInstance<'a>> {
    let characters = state.roster().iter().map(|entry| SourceInstance {
        kind: SourceKind::Character,
        id: &entry.role,
        display_name: &entry.name,
    });
    let buildings = state.infrastructure().iter().map(|id| SourceInstance {
        kind: SourceKind::Building,
        id,
        display_name: id,
    });
    let technologies = state.technologies().iter().map(|id| SourceInstance {
        kind: SourceKind::Technology,
        id,
        display_name: id,
    });
    let traits = state.leader_traits().iter().map(|id| SourceInstance {
        kind: SourceKind::Trait,
        id,
        display_name: id,
    });
    characters.chain(buildings).chain(technologies).chain(traits)
}

/// Interprets the registry against state snapshots.
///
/// Holds only an immutable registry handle; construct one per registry and
/// share it freely.
#[derive(Clone, Debug)]
pub struct BonusEngine {
    registry: Arc<Registry>,
}

impl BonusEngine {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Aggregate every active contribution to `ty`.
    ///
    /// A definition contributes when it is present in the snapshot, declares
    /// a value for `ty`, and all of its conditions hold. Failed conditions
    /// exclude silently; unknown sources become warnings.
    pub fn calculate_bonuses(&self, state: &impl StateView, ty: BonusType) -> Evaluation {
        let evaluation = self.evaluate(state, ty);
        for warning in &evaluation.warnings {
            warn!(kind = %warning.kind, id = %warning.id, "unknown bonus source in state");
        }
        evaluation
    }

    /// Aggregates for every type in the registry's enumeration.
    ///
    /// No type is special-cased or omitted, and no source is double-invoked
    /// for the same type.
    pub fn all_bonuses(&self, state: &impl StateView) -> EngineReport {
        let mut bonuses = BTreeMap::new();
        let mut warnings = Vec::new();
        for ty in self.registry.bonus_types().iter().copied() {
            let evaluation = self.evaluate(state, ty);
            bonuses.insert(ty, evaluation.aggregate);
            warnings.extend(evaluation.warnings);
        }
        warnings.sort();
        warnings.dedup();
        for warning in &warnings {
            warn!(kind = %warning.kind, id = %warning.id, "unknown bonus source in state");
        }
        EngineReport { bonuses, warnings }
    }

    /// String-keyed entry point for external callers.
    ///
    /// An unrecognized name fails only this request.
    pub fn calculate_named(
        &self,
        state: &impl StateView,
        name: &str,
    ) -> Result<Evaluation, UnknownBonusTypeError> {
        let ty: BonusType = name.parse()?;
        Ok(self.calculate_bonuses(state, ty))
    }

    /// Per-turn upkeep drawn by present, condition-satisfied sources.
    ///
    /// Uses the same instance identity as bonus aggregation, so a source is
    /// never charged twice.
    pub fn upkeep(&self, state: &impl StateView) -> BTreeMap<ResourceKind, Decimal> {
        let mut totals = BTreeMap::new();
        let mut seen: BTreeSet<(SourceKind, String, String)> = BTreeSet::new();
        for instance in source_instances(state) {
            if !seen.insert((
                instance.kind,
                instance.id.to_string(),
                instance.display_name.to_string(),
            )) {
                continue;
            }
            if let Some(def) = self.registry.lookup(instance.kind, instance.id) {
                if !def.active_in(state) {
                    continue;
                }
                for (resource, amount) in &def.cost {
                    *totals.entry(*resource).or_insert(Decimal::ZERO) += *amount;
                }
            }
        }
        totals
    }

    fn evaluate(&self, state: &impl StateView, ty: BonusType) -> Evaluation {
        let mut aggregate = AggregatedBonus::empty(ty);
        let mut warnings = Vec::new();
        let mut seen: BTreeSet<(SourceKind, String, String)> = BTreeSet::new();
        for instance in source_instances(state) {
            if !seen.insert((
                instance.kind,
                instance.id.to_string(),
                instance.display_name.to_string(),
            )) {
                continue;
            }
            match self.registry.lookup(instance.kind, instance.id) {
                Some(def) => {
                    if !def.active_in(state) {
                        continue;
                    }
                    if let Some(value) = def.value_for(ty) {
                        aggregate.total += value;
                        aggregate.sources.push(ActiveBonusEntry {
                            kind: instance.kind,
                            id: instance.id.to_string(),
                            display_name: instance.display_name.to_string(),
                            value,
                        });
                    }
                }
                None => warnings.push(UnknownSourceWarning {
                    kind: instance.kind,
                    id: instance.id.to_string(),
                }),
            }
        }
        warnings.sort();
        warnings.dedup();
        Evaluation { aggregate, warnings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bonus_core::{Era, RosterEntry, StateSnapshot};
    use proptest::prelude::*;

    const CONFIG: &str = r#"
characters:
  - id: Scholar
    bonuses: { science_per_turn: 5 }
  - id: Artisan
    bonuses: { culture_per_turn: 5 }
  - id: Chancellor
    bonuses: { wealth_per_turn: 10 }
  - id: Grand Marshal
    bonuses: { food_per_turn: -5 }
buildings:
  - id: Granary
    bonuses: { food_per_turn: 10 }
    cost: { wealth: 8 }
  - id: Library
    bonuses: { science_per_turn: 8 }
    cost: { wealth: 20 }
    conditions: { min_era: bronze_age }
  - id: Harbor
    bonuses: { wealth_per_turn: 6 }
    conditions: { terrain: [coast] }
technologies:
  - id: Writing
    bonuses: { science_per_turn: 3, culture_per_turn: 2 }
traits:
  - id: Wise
    bonuses: { science_per_turn: 2 }
"#;

    fn engine() -> BonusEngine {
        BonusEngine::new(Arc::new(Registry::from_yaml_str(CONFIG).unwrap()))
    }

    fn character(name: &str, role: &str) -> RosterEntry {
        RosterEntry {
            name: name.to_string(),
            role: role.to_string(),
        }
    }

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    #[test]
    fn scholar_contributes_science() {
        let snap = StateSnapshot {
            roster: vec![character("Imhotep", "Scholar")],
            ..Default::default()
        };
        let eval = engine().calculate_bonuses(&snap, BonusType::SciencePerTurn);
        assert_eq!(eval.aggregate.total, dec(5));
        assert_eq!(eval.aggregate.sources.len(), 1);
        let entry = &eval.aggregate.sources[0];
        assert_eq!(entry.kind, SourceKind::Character);
        assert_eq!(entry.id, "Scholar");
        assert_eq!(entry.display_name, "Imhotep");
        assert_eq!(entry.value, dec(5));
        assert!(eval.warnings.is_empty());
    }

    #[test]
    fn granary_contributes_food_in_all_bonuses() {
        let snap = StateSnapshot {
            infrastructure: vec!["Granary".to_string()],
            ..Default::default()
        };
        let report = engine().all_bonuses(&snap);
        assert_eq!(report.bonuses[&BonusType::FoodPerTurn].total, dec(10));
    }

    #[test]
    fn unknown_source_contributes_zero_and_warns() {
        let snap = StateSnapshot {
            roster: vec![character("Ghost", "Ghost")],
            ..Default::default()
        };
        let report = engine().all_bonuses(&snap);
        for aggregate in report.bonuses.values() {
            assert_eq!(aggregate.total, Decimal::ZERO);
            assert!(aggregate.sources.is_empty());
        }
        assert_eq!(
            report.warnings,
            vec![UnknownSourceWarning {
                kind: SourceKind::Character,
                id: "Ghost".to_string(),
            }]
        );
    }

    #[test]
    fn all_types_present_even_when_empty() {
        let report = engine().all_bonuses(&StateSnapshot::default());
        assert_eq!(report.bonuses.len(), BonusType::ALL.len());
        for ty in BonusType::ALL {
            assert_eq!(report.bonuses[&ty].total, Decimal::ZERO);
        }
    }

    #[test]
    fn all_bonuses_is_union_of_per_type_calls() {
        let snap = busy_snapshot();
        let eng = engine();
        let report = eng.all_bonuses(&snap);
        for ty in BonusType::ALL {
            let single = eng.calculate_bonuses(&snap, ty);
            assert_eq!(report.bonuses[&ty], single.aggregate);
        }
    }

    #[test]
    fn evaluation_is_idempotent() {
        let snap = busy_snapshot();
        let eng = engine();
        assert_eq!(eng.all_bonuses(&snap), eng.all_bonuses(&snap));
        assert_eq!(
            eng.calculate_bonuses(&snap, BonusType::SciencePerTurn),
            eng.calculate_bonuses(&snap, BonusType::SciencePerTurn)
        );
    }

    #[test]
    fn duplicate_building_reference_counts_once() {
        let snap = StateSnapshot {
            infrastructure: vec!["Granary".to_string(), "Granary".to_string()],
            ..Default::default()
        };
        let eval = engine().calculate_bonuses(&snap, BonusType::FoodPerTurn);
        assert_eq!(eval.aggregate.total, dec(10));
        assert_eq!(eval.aggregate.sources.len(), 1);
    }

    #[test]
    fn two_characters_with_one_role_both_count() {
        let snap = StateSnapshot {
            roster: vec![
                character("Imhotep", "Scholar"),
                character("Senmut", "Scholar"),
            ],
            ..Default::default()
        };
        let eval = engine().calculate_bonuses(&snap, BonusType::SciencePerTurn);
        assert_eq!(eval.aggregate.total, dec(10));
        assert_eq!(eval.aggregate.sources.len(), 2);
        assert_eq!(eval.aggregate.sources[0].display_name, "Imhotep");
        assert_eq!(eval.aggregate.sources[1].display_name, "Senmut");
    }

    #[test]
    fn negative_declared_value_aggregates() {
        let snap = StateSnapshot {
            roster: vec![character("Horemheb", "Grand Marshal")],
            infrastructure: vec!["Granary".to_string()],
            ..Default::default()
        };
        let eval = engine().calculate_bonuses(&snap, BonusType::FoodPerTurn);
        assert_eq!(eval.aggregate.total, dec(5));
        assert_eq!(eval.aggregate.sources.len(), 2);
    }

    #[test]
    fn failed_condition_excludes_silently() {
        let stone = StateSnapshot {
            era: Era::StoneAge,
            infrastructure: vec!["Library".to_string()],
            ..Default::default()
        };
        let eval = engine().calculate_bonuses(&stone, BonusType::SciencePerTurn);
        assert_eq!(eval.aggregate.total, Decimal::ZERO);
        assert!(eval.warnings.is_empty());

        let bronze = StateSnapshot {
            era: Era::BronzeAge,
            ..stone
        };
        let eval = engine().calculate_bonuses(&bronze, BonusType::SciencePerTurn);
        assert_eq!(eval.aggregate.total, dec(8));
    }

    #[test]
    fn terrain_condition_gates_harbor() {
        let inland = StateSnapshot {
            infrastructure: vec!["Harbor".to_string()],
            terrain: vec!["plains".to_string()],
            ..Default::default()
        };
        let eng = engine();
        assert_eq!(
            eng.calculate_bonuses(&inland, BonusType::WealthPerTurn)
                .aggregate
                .total,
            Decimal::ZERO
        );
        let coastal = StateSnapshot {
            terrain: vec!["coast".to_string()],
            ..inland
        };
        assert_eq!(
            eng.calculate_bonuses(&coastal, BonusType::WealthPerTurn)
                .aggregate
                .total,
            dec(6)
        );
    }

    #[test]
    fn new_definition_changes_only_declared_types() {
        let snap = busy_snapshot();
        let before = engine().all_bonuses(&snap);

        let extended = format!(
            "{CONFIG}
  - id: Stoic
    bonuses: {{ happiness: 4 }}
"
        );
        let eng = BonusEngine::new(Arc::new(Registry::from_yaml_str(&extended).unwrap()));
        let snap = StateSnapshot {
            leader_traits: {
                let mut traits = snap.leader_traits.clone();
                traits.push("Stoic".to_string());
                traits
            },
            ..snap
        };
        let after = eng.all_bonuses(&snap);
        assert_eq!(
            after.bonuses[&BonusType::Happiness].total,
            before.bonuses[&BonusType::Happiness].total + dec(4)
        );
        for ty in BonusType::ALL {
            if ty != BonusType::Happiness {
                assert_eq!(after.bonuses[&ty], before.bonuses[&ty]);
            }
        }
    }

    #[test]
    fn named_lookup_rejects_unknown_type_only() {
        let snap = busy_snapshot();
        let eng = engine();
        let err = eng.calculate_named(&snap, "mana_per_turn").unwrap_err();
        assert_eq!(err, UnknownBonusTypeError("mana_per_turn".to_string()));
        // Other requests are unaffected.
        let ok = eng.calculate_named(&snap, "science_per_turn").unwrap();
        assert_eq!(
            ok.aggregate,
            eng.calculate_bonuses(&snap, BonusType::SciencePerTurn).aggregate
        );
    }

    #[test]
    fn upkeep_sums_costs_of_active_sources() {
        let snap = StateSnapshot {
            era: Era::BronzeAge,
            infrastructure: vec![
                "Granary".to_string(),
                "Library".to_string(),
                "Granary".to_string(),
            ],
            ..Default::default()
        };
        let upkeep = engine().upkeep(&snap);
        assert_eq!(upkeep[&ResourceKind::Wealth], dec(28));
        assert!(!upkeep.contains_key(&ResourceKind::Food));

        // Inactive Library (era gate) drops its cost with it.
        let stone = StateSnapshot {
            era: Era::StoneAge,
            ..snap
        };
        assert_eq!(engine().upkeep(&stone)[&ResourceKind::Wealth], dec(8));
    }

    fn busy_snapshot() -> StateSnapshot {
        StateSnapshot {
            turn: 7,
            era: Era::BronzeAge,
            population: 900,
            happiness: 55,
            roster: vec![
                character("Imhotep", "Scholar"),
                character("Neferu", "Artisan"),
                character("Khufu-Sen", "Chancellor"),
            ],
            infrastructure: vec!["Granary".to_string(), "Library".to_string()],
            technologies: vec!["Writing".to_string()],
            leader_traits: vec!["Wise".to_string()],
            terrain: vec!["river".to_string()],
        }
    }

    fn role_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("Scholar".to_string()),
            Just("Artisan".to_string()),
            Just("Chancellor".to_string()),
            Just("Grand Marshal".to_string()),
            Just("Ghost".to_string()),
        ]
    }

    proptest! {
        #[test]
        fn total_is_exact_sum_of_sources(
            names in proptest::collection::vec("[A-Z][a-z]{2,7}", 0..10),
            roles in proptest::collection::vec(role_strategy(), 0..10),
        ) {
            let roster: Vec<RosterEntry> = names
                .iter()
                .zip(roles.iter())
                .map(|(name, role)| character(name, role))
                .collect();
            let snap = StateSnapshot { roster, ..Default::default() };
            let eng = engine();
            for ty in BonusType::ALL {
                let eval = eng.calculate_bonuses(&snap, ty);
                let sum: Decimal = eval.aggregate.sources.iter().map(|s| s.value).sum();
                prop_assert_eq!(eval.aggregate.total, sum);
            }
        }

        #[test]
        fn repeated_evaluation_is_stable(
            names in proptest::collection::vec("[A-Z][a-z]{2,7}", 0..8),
            roles in proptest::collection::vec(role_strategy(), 0..8),
        ) {
            let roster: Vec<RosterEntry> = names
                .iter()
                .zip(roles.iter())
                .map(|(name, role)| character(name, role))
                .collect();
            let snap = StateSnapshot { roster, ..Default::default() };
            let eng = engine();
            prop_assert_eq!(eng.all_bonuses(&snap), eng.all_bonuses(&snap));
        }
    }
}
