// ⚖️ History Reconciler - Decide whether two value histories can be merged
//
// Compares the RECORDED day series of a keeper candidate and a duplicate
// candidate by walking every calendar day from the earliest date either side
// knows about through today, inclusive. The walk is O(calendar span) on
// purpose: sparse histories still get compared day-aligned, which is what
// locates the hand-off point where one feed stopped supplying values and the
// other took over.
//
// Tolerances are production-tuned business thresholds: at most one
// conflicting day, and only if both quantities agree within 0.001. Do not
// loosen or generalize them.

use chrono::{Days, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};

use crate::model::{HistoryRecord, HistoryRun};

/// Fuzzy-equality bound for nominal quantities.
pub const QUANTITY_EPSILON: f64 = 0.001;

/// Maximum number of conflicting days that can still merge (quantities must
/// also match on each of them).
pub const MAX_TOLERATED_CONFLICTS: usize = 1;

pub fn quantities_fuzzy_equal(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs() <= QUANTITY_EPSILON,
        _ => false,
    }
}

// ============================================================================
// COMPARISON RESULT
// ============================================================================

/// Both sides supplied a RECORDED value for the same day. Quantities are kept
/// so the mergeability rule can check whether the overlap is benign.
#[derive(Debug, Clone)]
pub struct HistoryConflict {
    pub date: NaiveDate,
    pub keeper_quantity: Option<f64>,
    pub duplicate_quantity: Option<f64>,
}

impl HistoryConflict {
    pub fn quantities_match(&self) -> bool {
        quantities_fuzzy_equal(self.keeper_quantity, self.duplicate_quantity)
    }
}

#[derive(Debug, Clone)]
pub struct HistoryComparison {
    pub mergeable: bool,
    pub conflicts: Vec<HistoryConflict>,

    /// How often the active source switched sides during the day walk.
    pub history_changes: u32,

    /// How many of those switches also moved the quantity by more than
    /// QUANTITY_EPSILON.
    pub quantity_changes: u32,
}

impl HistoryComparison {
    pub fn first_conflict_date(&self) -> Option<NaiveDate> {
        self.conflicts.first().map(|c| c.date)
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Keeper,
    Duplicate,
}

pub struct HistoryReconciler {
    /// Upper bound of the day walk. Injectable so tests are not anchored to
    /// the wall clock.
    today: NaiveDate,
}

impl HistoryReconciler {
    pub fn new() -> Self {
        HistoryReconciler {
            today: Utc::now().date_naive(),
        }
    }

    pub fn with_today(today: NaiveDate) -> Self {
        HistoryReconciler { today }
    }

    /// Walk every calendar day from the earliest RECORDED date in either map
    /// through today, inclusive, with no gaps skipped.
    pub fn compare(
        &self,
        keeper_history: &HashMap<NaiveDate, HistoryRecord>,
        duplicate_history: &HashMap<NaiveDate, HistoryRecord>,
    ) -> HistoryComparison {
        if keeper_history.len() < 5 && duplicate_history.len() < 5 {
            tracing::warn!(
                keeper_days = keeper_history.len(),
                duplicate_days = duplicate_history.len(),
                "very little history to compare"
            );
        }

        let start = keeper_history
            .keys()
            .chain(duplicate_history.keys())
            .min()
            .copied();
        let Some(start) = start else {
            // Nothing on either side, nothing to conflict.
            return HistoryComparison {
                mergeable: true,
                conflicts: Vec::new(),
                history_changes: 0,
                quantity_changes: 0,
            };
        };

        let mut conflicts = Vec::new();
        let mut history_changes = 0u32;
        let mut quantity_changes = 0u32;
        let mut last_source: Option<Side> = None;
        let mut last_quantity: Option<f64> = None;

        let mut day = start;
        while day <= self.today {
            let keeper_record = keeper_history.get(&day);
            let duplicate_record = duplicate_history.get(&day);

            if let Some(record) = keeper_record {
                count_switch(
                    last_source,
                    last_quantity,
                    Side::Keeper,
                    record,
                    &mut history_changes,
                    &mut quantity_changes,
                );
                last_source = Some(Side::Keeper);
                last_quantity = record.quantity_nominal;
            } else if let Some(record) = duplicate_record {
                count_switch(
                    last_source,
                    last_quantity,
                    Side::Duplicate,
                    record,
                    &mut history_changes,
                    &mut quantity_changes,
                );
                last_source = Some(Side::Duplicate);
                last_quantity = record.quantity_nominal;
            }

            if let (Some(keeper), Some(duplicate)) = (keeper_record, duplicate_record) {
                conflicts.push(HistoryConflict {
                    date: day,
                    keeper_quantity: keeper.quantity_nominal,
                    duplicate_quantity: duplicate.quantity_nominal,
                });
            }

            day = match day.checked_add_days(Days::new(1)) {
                Some(next) => next,
                None => break,
            };
        }

        let mergeable = conflicts.is_empty()
            || (conflicts.len() <= MAX_TOLERATED_CONFLICTS
                && conflicts.iter().all(HistoryConflict::quantities_match));

        HistoryComparison {
            mergeable,
            conflicts,
            history_changes,
            quantity_changes,
        }
    }
}

impl Default for HistoryReconciler {
    fn default() -> Self {
        Self::new()
    }
}

fn count_switch(
    last_source: Option<Side>,
    last_quantity: Option<f64>,
    side: Side,
    record: &HistoryRecord,
    history_changes: &mut u32,
    quantity_changes: &mut u32,
) {
    if let Some(last) = last_source {
        if last != side {
            *history_changes += 1;
            // Two absent quantities are the same absent quantity.
            let unchanged = quantities_fuzzy_equal(last_quantity, record.quantity_nominal)
                || (last_quantity.is_none() && record.quantity_nominal.is_none());
            if !unchanged {
                *quantity_changes += 1;
            }
        }
    }
}

// ============================================================================
// RUN OVERLAP (account merges)
// ============================================================================

/// The account-merge variant: accounts tolerate no overlap at all. Any
/// RECORDED history run present on both sides blocks the merge; returns the
/// first shared run for diagnostics.
pub fn first_overlapping_run(
    keeper_runs: &HashSet<HistoryRun>,
    loser_history: &[HistoryRecord],
) -> Option<HistoryRun> {
    loser_history
        .iter()
        .filter(|record| record.provenance == crate::model::HistoryProvenance::Recorded)
        .map(|record| record.history_run)
        .find(|run| keeper_runs.contains(run))
}

// ============================================================================
// TESTS
// ============================================================================
