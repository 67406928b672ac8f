// 🔀 Merge Executor - Apply an approved merge of a duplicate pair
//
// Given keeper and loser, migrates history, transactions and expense/income
// records from the loser to the keeper, reconciles sale and acquisition
// dates, deletes the loser, and records the outcome in the audit trail.
//
// Nothing is lost: every loser-owned record either moves to the keeper or is
// a true duplicate of something the keeper already has. If any step fails,
// the pair is marked Failed and the run continues - sibling pairs are never
// rolled back.

use serde_json::json;
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::model::{FinancialEntity, HistoryProvenance};
use crate::store::{Event, Store};

// ============================================================================
// OUTCOME
// ============================================================================

/// Why a merge was refused before touching any data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardViolation {
    /// The loser holds breakdown allocations someone curated.
    LoserHasBreakdowns,
    /// The loser holds asset assignments.
    LoserHasAssetAssignments,
    /// The loser is a depot that still owns security papers.
    DepotOwnsSecurityPapers,
    /// The loser is a depot with security-paper history still attached.
    DepotOwnsPaperHistory,
}

impl GuardViolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardViolation::LoserHasBreakdowns => "loser has breakdowns",
            GuardViolation::LoserHasAssetAssignments => "loser has asset assignments",
            GuardViolation::DepotOwnsSecurityPapers => "depot still owns security papers",
            GuardViolation::DepotOwnsPaperHistory => "depot still owns security-paper history",
        }
    }
}

/// Terminal state of one candidate pair. MERGED removes the loser from
/// further candidacy within the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged,
    AbortedGuard(GuardViolation),
    AbortedConflict,
    Failed,
}

impl MergeOutcome {
    pub fn is_merged(&self) -> bool {
        matches!(self, MergeOutcome::Merged)
    }
}

/// A history row coming from the loser replaces the keeper's row for the
/// same run only when its provenance ranks strictly higher. Ties favor the
/// keeper's existing record.
pub fn should_prefer_source(source: HistoryProvenance, target: HistoryProvenance) -> bool {
    source.rank() > target.rank()
}

// ============================================================================
// EXECUTOR
// ============================================================================

pub struct MergeExecutor<'a> {
    store: &'a Store,
}

impl<'a> MergeExecutor<'a> {
    pub fn new(store: &'a Store) -> Self {
        MergeExecutor { store }
    }

    /// Run the full merge for an approved pair. Guard violations abort
    /// without touching data; store errors mark the pair Failed and are
    /// contained here.
    pub fn merge(&self, keeper: &FinancialEntity, loser: &FinancialEntity) -> MergeOutcome {
        info!(keeper = keeper.id, loser = loser.id, "start merging duplicates");

        match self.check_guards(loser) {
            Ok(Some(violation)) => {
                warn!(
                    keeper = keeper.id,
                    loser = loser.id,
                    reason = violation.as_str(),
                    "cannot merge pair"
                );
                return MergeOutcome::AbortedGuard(violation);
            }
            Ok(None) => {}
            Err(e) => {
                error!(keeper = keeper.id, loser = loser.id, error = %e, "guard check failed");
                return MergeOutcome::Failed;
            }
        }

        match self.apply(keeper, loser) {
            Ok(()) => {
                info!(keeper = keeper.id, loser = loser.id, "end merging duplicates");
                MergeOutcome::Merged
            }
            Err(e) => {
                error!(
                    keeper = keeper.id,
                    loser = loser.id,
                    error = %e,
                    "failed to merge pair"
                );
                MergeOutcome::Failed
            }
        }
    }

    fn check_guards(&self, loser: &FinancialEntity) -> Result<Option<GuardViolation>> {
        if self.store.has_breakdowns(loser.id)? {
            return Ok(Some(GuardViolation::LoserHasBreakdowns));
        }
        if self.store.has_asset_assignments(loser.id)? {
            return Ok(Some(GuardViolation::LoserHasAssetAssignments));
        }
        if loser.is_depot() {
            if self.store.count_papers_by_account(loser.id)? > 0 {
                return Ok(Some(GuardViolation::DepotOwnsSecurityPapers));
            }
            if self.store.count_paper_history_by_account(loser.id)? > 0 {
                return Ok(Some(GuardViolation::DepotOwnsPaperHistory));
            }
        }
        Ok(None)
    }

    fn apply(&self, keeper: &FinancialEntity, loser: &FinancialEntity) -> Result<()> {
        self.migrate_history(keeper, loser)?;
        self.cleanup_derived_history(keeper)?;
        self.migrate_transactions(keeper, loser)?;
        self.migrate_expenses(keeper, loser)?;
        self.store.delete_expenses_by_entity(loser.id)?;
        self.store.delete_transactions_by_entity(loser.id)?;

        let reconciled = reconcile_dates(keeper, loser);
        self.store.update_entity_dates(&reconciled)?;
        self.store.delete_entity(loser.id)?;

        // The derived-history recomputation job picks up the recalculation
        // request from the audit trail, so a lost write must fail the pair.
        self.store.record_event(&Event::new(
            "duplicate_merged",
            keeper.id,
            json!({ "keeper": keeper.id, "loser": loser.id, "kind": keeper.kind.as_str() }),
        ))?;
        self.store.record_event(&Event::new(
            "recalculation_requested",
            keeper.id,
            json!({ "reason": "duplicate_merged" }),
        ))?;
        Ok(())
    }

    /// Move every loser history row the keeper is missing; where both sides
    /// have a row for the same history run, keep the higher-ranked
    /// provenance. The superseded keeper row is deleted in its own statement
    /// before the loser's row is reassigned - the UNIQUE(entity, run)
    /// constraint forbids two rows claiming the same slot.
    fn migrate_history(&self, keeper: &FinancialEntity, loser: &FinancialEntity) -> Result<()> {
        let keeper_by_run: HashMap<i64, _> = self
            .store
            .history_by_entity(keeper.id)?
            .into_iter()
            .map(|record| (record.history_run, record))
            .collect();

        for source in self.store.history_by_entity(loser.id)? {
            match keeper_by_run.get(&source.history_run) {
                Some(target) => {
                    if should_prefer_source(source.provenance, target.provenance) {
                        self.store.delete_history(target.id)?;
                        self.store.reassign_history(source.id, keeper.id)?;
                    }
                    // Otherwise the keeper's record wins and the loser's
                    // copy falls to the bulk delete below.
                }
                None => {
                    self.store.reassign_history(source.id, keeper.id)?;
                }
            }
        }
        self.store.delete_history_by_entity(loser.id)?;
        Ok(())
    }

    /// When the keeper's source computes history from transactions, its
    /// derived history is stale after a merge - delete it so it gets rebuilt
    /// from merged RECORDED data plus transactions.
    fn cleanup_derived_history(&self, keeper: &FinancialEntity) -> Result<()> {
        let Some(source) = self.store.find_source(keeper.source_id)? else {
            return Ok(());
        };
        if source.transactions_supported {
            info!(keeper = keeper.id, "delete transaction-based derived history");
            self.store.delete_derived_history(keeper.id)?;
        }
        Ok(())
    }

    fn migrate_transactions(&self, keeper: &FinancialEntity, loser: &FinancialEntity) -> Result<()> {
        let keeper_keys: std::collections::HashSet<String> = self
            .store
            .transactions_by_entity(keeper.id)?
            .into_iter()
            .map(|tx| tx.third_party_key)
            .collect();

        for tx in self.store.transactions_by_entity(loser.id)? {
            if !keeper_keys.contains(&tx.third_party_key) {
                self.store.reassign_transaction(tx.id, keeper.id)?;
            }
            // A keeper transaction with the same idempotency key already
            // exists: the loser's copy is a true duplicate and is dropped
            // with the remaining loser rows.
        }
        Ok(())
    }

    /// Runs after transaction migration so a reference to a migrated
    /// transaction is already valid; only references to discarded duplicate
    /// transactions need repointing to the keeper's copy by idempotency key.
    fn migrate_expenses(&self, keeper: &FinancialEntity, loser: &FinancialEntity) -> Result<()> {
        let keeper_transactions: HashMap<String, i64> = self
            .store
            .transactions_by_entity(keeper.id)?
            .into_iter()
            .map(|tx| (tx.third_party_key, tx.id))
            .collect();
        let keeper_keys: std::collections::HashSet<String> = self
            .store
            .expenses_by_entity(keeper.id)?
            .into_iter()
            .map(|e| e.third_party_key)
            .collect();

        for expense in self.store.expenses_by_entity(loser.id)? {
            if keeper_keys.contains(&expense.third_party_key) {
                continue;
            }
            if let Some(ref_id) = expense.transaction_id {
                let referenced = self.store.find_transaction(ref_id)?;
                let dangling = referenced
                    .as_ref()
                    .map(|tx| tx.entity_id != keeper.id)
                    .unwrap_or(true);
                if dangling {
                    let replacement = referenced
                        .and_then(|tx| keeper_transactions.get(&tx.third_party_key).copied());
                    self.store.set_expense_transaction(expense.id, replacement)?;
                }
            }
            self.store.reassign_expense(expense.id, keeper.id)?;
        }
        Ok(())
    }
}

/// Sale date: "still held" takes precedence - if either side is unsold the
/// keeper ends up unsold; if both are sold, the later date wins.
/// Acquisition date: the earlier known date wins.
pub fn reconcile_dates(keeper: &FinancialEntity, loser: &FinancialEntity) -> FinancialEntity {
    let mut reconciled = keeper.clone();
    reconciled.sale_date = match (keeper.sale_date, loser.sale_date) {
        (Some(kept), Some(lost)) => Some(kept.max(lost)),
        _ => None,
    };
    reconciled.acquisition_date = match (keeper.acquisition_date, loser.acquisition_date) {
        (Some(kept), Some(lost)) => Some(kept.min(lost)),
        (Some(kept), None) => Some(kept),
        (None, lost) => lost,
    };
    reconciled
}

// ============================================================================
// TESTS
// ============================================================================
