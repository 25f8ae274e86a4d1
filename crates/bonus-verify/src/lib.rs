#![deny(warnings)]

//! Parallel verification of the legacy and engine calculation paths.
//!
//! During migration both calculators run against the same immutable
//! snapshot every turn. Disagreements beyond tolerance are recorded, never
//! raised: nothing in this module can abort or stall the host's turn
//! pipeline. The legacy path stays authoritative until a deliberate
//! promotion switches authority to the engine.

pub mod legacy;

use bonus_core::{BonusType, StateView};
use bonus_engine::{BonusEngine, EngineReport};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{info, warn};

/// The pre-existing hardcoded per-turn calculator being phased out.
///
/// Treated as an opaque oracle: the verifier only reads the per-type map it
/// returns. Types absent from the map are read as zero, so a partial oracle
/// cannot break a turn.
pub trait LegacyCalculator<S: StateView> {
    fn compute(&self, state: &S) -> BTreeMap<BonusType, Decimal>;
}

/// Which path's values are committed to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Authority {
    Legacy,
    Engine,
}

/// Outcome of one verified turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VerifyStatus {
    /// Every type agreed within tolerance.
    Matched,
    /// At least one type disagreed; recorded and committed anyway.
    Mismatched,
}

/// A logged disagreement between the two paths for one bonus type on one
/// turn. Append-only; records are never mutated or deleted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MismatchReport {
    pub turn: u64,
    pub bonus_type: BonusType,
    pub legacy_value: Decimal,
    pub engine_value: Decimal,
    pub delta: Decimal,
}

/// Append-safe mismatch sink.
///
/// The only shared mutable resource in the verification path; concurrent
/// evaluations may append through a shared reference.
#[derive(Debug, Default)]
pub struct MismatchLog {
    records: Mutex<Vec<MismatchReport>>,
}

impl MismatchLog {
    pub fn append(&self, record: MismatchReport) {
        self.lock().push(record);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of all records in append order.
    pub fn records(&self) -> Vec<MismatchReport> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<MismatchReport>> {
        // A poisoned log still holds valid append-only records.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Per-turn result handed back to the host. Terminal for its turn.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnResult {
    pub turn: u64,
    pub status: VerifyStatus,
    pub authority: Authority,
    /// Authoritative per-type deltas for this turn.
    pub committed: BTreeMap<BonusType, Decimal>,
    /// Advisory engine output, attribution and warnings included.
    pub engine: EngineReport,
    /// Mismatches recorded for this turn, in enumeration order.
    pub mismatches: Vec<MismatchReport>,
}

/// Runs both calculators against one snapshot and reconciles the results.
#[derive(Debug)]
pub struct ParallelVerifier<L> {
    engine: BonusEngine,
    legacy: L,
    authority: Authority,
    log: MismatchLog,
}

impl<L> ParallelVerifier<L> {
    /// A new verifier; the legacy path starts authoritative.
    pub fn new(engine: BonusEngine, legacy: L) -> Self {
        Self {
            engine,
            legacy,
            authority: Authority::Legacy,
            log: MismatchLog::default(),
        }
    }

    pub fn authority(&self) -> Authority {
        self.authority
    }

    /// Deliberate cutover: the engine's values become authoritative.
    /// Verification and mismatch recording continue unchanged.
    pub fn promote_engine(&mut self) {
        self.authority = Authority::Engine;
        info!("bonus engine promoted to authoritative calculator");
    }

    /// Accumulated mismatch records for the life of this verifier.
    pub fn log(&self) -> &MismatchLog {
        &self.log
    }

    /// Compute both paths against `state`, record disagreements beyond
    /// `tolerance`, and commit the authoritative values.
    ///
    /// Never fails: mismatches and engine warnings degrade to record-and-
    /// continue. The snapshot is borrowed for the whole call, so neither
    /// calculator can observe a partial update.
    pub fn verify_turn<S: StateView>(&self, state: &S, tolerance: Decimal) -> TurnResult
    where
        L: LegacyCalculator<S>,
    {
        let legacy_values = self.legacy.compute(state);
        let report = self.engine.all_bonuses(state);

        let mut committed = BTreeMap::new();
        let mut mismatches = Vec::new();
        for ty in self.engine.registry().bonus_types().iter().copied() {
            let legacy_value = legacy_values.get(&ty).copied().unwrap_or(Decimal::ZERO);
            let engine_value = report
                .bonuses
                .get(&ty)
                .map(|aggregate| aggregate.total)
                .unwrap_or(Decimal::ZERO);
            let delta = legacy_value - engine_value;
            if delta.abs() > tolerance {
                let record = MismatchReport {
                    turn: state.turn(),
                    bonus_type: ty,
                    legacy_value,
                    engine_value,
                    delta,
                };
                warn!(
                    turn = record.turn,
                    bonus_type = %record.bonus_type,
                    legacy = %record.legacy_value,
                    engine = %record.engine_value,
                    delta = %record.delta,
                    "legacy/engine mismatch"
                );
                self.log.append(record.clone());
                mismatches.push(record);
            }
            let value = match self.authority {
                Authority::Legacy => legacy_value,
                Authority::Engine => engine_value,
            };
            committed.insert(ty, value);
        }

        let status = if mismatches.is_empty() {
            VerifyStatus::Matched
        } else {
            VerifyStatus::Mismatched
        };
        TurnResult {
            turn: state.turn(),
            status,
            authority: self.authority,
            committed,
            engine: report,
            mismatches,
        }
    }
}
