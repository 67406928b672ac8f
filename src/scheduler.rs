// 🧵 Partition Scheduler - Batch the entity universe onto a worker pool
//
// Splits the scope ids (depots for the paper job, sources for the account
// job) into fixed-size batches and runs them on a bounded rayon pool. Each
// worker opens its own store connection. A failed batch is logged and
// contributes nothing; sibling batches keep going. There is no automatic
// retry - rerunning the whole job is the retry mechanism, and it is safe
// because a second run over already-merged data finds no duplicates left.
//
// Within one candidate set merges are strictly sequential: a later merge
// relies on the loser of an earlier one already being out of the pool.

use rayon::prelude::*;
use std::ops::{Add, AddAssign};
use std::path::Path;
use tracing::{error, info, warn};

use crate::error::{EngineError, Result};
use crate::grouper::group_by_natural_key;
use crate::merge::{MergeExecutor, MergeOutcome};
use crate::model::{EntityId, FinancialEntity, SourceId};
use crate::reconcile::{first_overlapping_run, HistoryReconciler};
use crate::selector::{choose, AbortReason, Candidate, Selection};
use crate::store::Store;

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_PARALLELISM: usize = 10;

// ============================================================================
// RUN STATISTICS
// ============================================================================

/// Merge counters for one run, accumulated by value - never shared mutable
/// state across batches.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub merged: u64,
    pub not_merged: u64,
}

impl MergeStats {
    pub fn record(&mut self, outcome: &MergeOutcome) {
        if outcome.is_merged() {
            self.merged += 1;
        } else {
            self.not_merged += 1;
        }
    }

    pub fn skip(&mut self) {
        self.not_merged += 1;
    }
}

impl Add for MergeStats {
    type Output = MergeStats;

    fn add(self, other: MergeStats) -> MergeStats {
        MergeStats {
            merged: self.merged + other.merged,
            not_merged: self.not_merged + other.not_merged,
        }
    }
}

impl AddAssign for MergeStats {
    fn add_assign(&mut self, other: MergeStats) {
        *self = *self + other;
    }
}

// ============================================================================
// PARTITION EXECUTION
// ============================================================================

/// Split `ids` into fixed-size batches and run `worker` over them on a pool
/// of `parallelism` threads, each with its own store connection. Batches
/// share no mutable state; a batch error is contained and logged.
pub fn process_all<F>(
    db_path: &Path,
    ids: &[i64],
    batch_size: usize,
    parallelism: usize,
    worker: F,
) -> Result<MergeStats>
where
    F: Fn(&Store, &[i64]) -> Result<MergeStats> + Sync,
{
    if batch_size == 0 {
        return Err(EngineError::Configuration("batch size must be > 0".into()));
    }
    if parallelism == 0 {
        return Err(EngineError::Configuration("parallelism must be > 0".into()));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(parallelism)
        .build()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    let stats = pool.install(|| {
        ids.par_chunks(batch_size)
            .map(|batch| {
                info!(ids = batch.len(), "starting duplicate batch");
                let result = Store::open(db_path).and_then(|store| worker(&store, batch));
                match result {
                    Ok(stats) => {
                        info!(
                            merged = stats.merged,
                            not_merged = stats.not_merged,
                            "finished batch"
                        );
                        stats
                    }
                    Err(e) => {
                        error!(error = %e, "error processing duplicate batch");
                        MergeStats::default()
                    }
                }
            })
            .reduce(MergeStats::default, Add::add)
    });
    Ok(stats)
}

fn should_log_progress(count: usize, total: usize, steps: usize) -> bool {
    let stride = (total / steps).max(1);
    total > steps && count % stride == 0
}

// ============================================================================
// JOB: DUPLICATE SECURITY PAPERS
// ============================================================================

/// Find and merge duplicate security papers across all depots.
pub fn merge_duplicate_papers(
    db_path: &Path,
    batch_size: usize,
    parallelism: usize,
) -> Result<MergeStats> {
    let depot_ids = {
        let store = Store::open(db_path)?;
        store.list_depot_ids()?
    };
    info!(
        depots = depot_ids.len(),
        "starting to find and merge duplicate security papers"
    );

    let stats = process_all(db_path, &depot_ids, batch_size, parallelism, |store, batch| {
        let reconciler = HistoryReconciler::new();
        let mut stats = MergeStats::default();
        for (index, depot_id) in batch.iter().enumerate() {
            stats += merge_papers_in_depot(store, &reconciler, *depot_id)?;
            if should_log_progress(index + 1, batch.len(), 10) {
                info!(
                    processed = index + 1,
                    total = batch.len(),
                    "finding duplicates in block of depots"
                );
            }
        }
        Ok(stats)
    })?;

    info!(
        merged = stats.merged,
        not_merged = stats.not_merged,
        "end of merging duplicate security papers"
    );
    Ok(stats)
}

/// One scope of the paper job: group a depot's papers by ISIN and merge each
/// candidate set pairwise. An eliminated paper leaves the pool immediately.
pub fn merge_papers_in_depot(
    store: &Store,
    reconciler: &HistoryReconciler,
    depot_id: EntityId,
) -> Result<MergeStats> {
    let mut stats = MergeStats::default();
    let papers = store.papers_by_account(depot_id)?;
    for group in group_by_natural_key(papers) {
        info!(
            isin = %group.natural_key,
            candidates = group.entities.len(),
            "trying to merge security papers with same isin"
        );
        let mut candidates = group
            .entities
            .into_iter()
            .map(|paper| candidate_facts(store, paper))
            .collect::<Result<Vec<_>>>()?;
        while candidates.len() > 1 {
            merge_group_head(store, reconciler, &mut candidates, &mut stats)?;
        }
    }
    Ok(stats)
}

/// Take the head of the candidate set and try to merge it with each
/// remaining candidate. The head leaves the set either way; candidates it
/// eliminated (or that can never merge) leave with it.
fn merge_group_head(
    store: &Store,
    reconciler: &HistoryReconciler,
    candidates: &mut Vec<Candidate>,
    stats: &mut MergeStats,
) -> Result<()> {
    let head = candidates.remove(0);
    if head.first_recorded_date.is_none() {
        info!(paper = head.entity.id, "no history for security paper - will not merge");
        stats.skip();
        return Ok(());
    }

    let mut head_merged_away = false;
    let mut merged_any = false;
    let mut eliminated: Vec<EntityId> = Vec::new();

    for other in candidates.iter() {
        match choose(&head, other) {
            Selection::Abort(AbortReason::MissingHistory) => {
                info!(
                    paper = other.entity.id,
                    "no history for security paper - will not merge"
                );
                stats.skip();
                eliminated.push(other.entity.id);
                continue;
            }
            Selection::Abort(_) => {
                stats.skip();
                continue;
            }
            selection => {
                // Refetched per pair: a merge earlier in the loop grows the
                // head's history.
                let head_history = store.recorded_history_by_date(head.entity.id)?;
                let other_history = store.recorded_history_by_date(other.entity.id)?;
                let comparison = reconciler.compare(&head_history, &other_history);
                if !comparison.mergeable {
                    warn!(
                        keeper = head.entity.id,
                        duplicate = other.entity.id,
                        conflicts = comparison.conflicts.len(),
                        first_conflict = ?comparison.first_conflict_date(),
                        "history conflicts cannot be merged"
                    );
                    stats.skip();
                    continue;
                }
                info!(
                    history_changes = comparison.history_changes,
                    quantity_changes = comparison.quantity_changes,
                    conflicts = comparison.conflicts.len(),
                    "history can be merged"
                );
                let executor = MergeExecutor::new(store);
                if selection == Selection::KeepFirst {
                    let outcome = executor.merge(&head.entity, &other.entity);
                    stats.record(&outcome);
                    merged_any |= outcome.is_merged();
                    eliminated.push(other.entity.id);
                } else {
                    let outcome = executor.merge(&other.entity, &head.entity);
                    stats.record(&outcome);
                    merged_any |= outcome.is_merged();
                    head_merged_away = true;
                    break;
                }
            }
        }
    }

    if !merged_any && !head_merged_away {
        info!(
            paper = head.entity.id,
            "paper could not be merged with any duplicate"
        );
    }
    candidates.retain(|candidate| !eliminated.contains(&candidate.entity.id));
    Ok(())
}

// ============================================================================
// JOB: DUPLICATE ACCOUNTS
// ============================================================================

/// Find and merge duplicate accounts across all sources.
pub fn merge_duplicate_accounts(
    db_path: &Path,
    batch_size: usize,
    parallelism: usize,
) -> Result<MergeStats> {
    let source_ids = {
        let store = Store::open(db_path)?;
        store.list_source_ids()?
    };
    info!(
        sources = source_ids.len(),
        "starting to find and merge duplicate accounts"
    );

    let stats = process_all(db_path, &source_ids, batch_size, parallelism, |store, batch| {
        let mut stats = MergeStats::default();
        for source_id in batch {
            stats += merge_accounts_in_source(store, *source_id)?;
        }
        Ok(stats)
    })?;

    info!(
        merged = stats.merged,
        not_merged = stats.not_merged,
        "end of merging duplicate accounts"
    );
    Ok(stats)
}

/// One scope of the account job: group a source's accounts by
/// account-number + IBAN and fold each candidate set sequentially - the
/// selector's keeper carries forward to meet the next candidate.
pub fn merge_accounts_in_source(store: &Store, source_id: SourceId) -> Result<MergeStats> {
    let mut stats = MergeStats::default();
    let accounts = store.accounts_by_source(source_id)?;
    for group in group_by_natural_key(accounts) {
        let mut members = group.entities.into_iter();
        let Some(first) = members.next() else {
            continue;
        };
        let mut current = candidate_facts(store, first)?;
        for next in members {
            let next = candidate_facts(store, next)?;
            match choose(&current, &next) {
                Selection::Abort(reason) => {
                    info!(
                        a = current.entity.id,
                        b = next.entity.id,
                        reason = ?reason,
                        "cannot merge accounts"
                    );
                    stats.skip();
                    // The newest candidate becomes the comparison basis, so
                    // an unmergeable account does not shadow the rest of its
                    // group.
                    current = next;
                }
                Selection::KeepFirst => {
                    let outcome = merge_account_pair(store, &current.entity, &next.entity)?;
                    stats.record(&outcome);
                }
                Selection::KeepSecond => {
                    let outcome = merge_account_pair(store, &next.entity, &current.entity)?;
                    stats.record(&outcome);
                    current = next;
                }
            }
        }
    }
    Ok(stats)
}

/// Accounts tolerate no history overlap at all: any RECORDED history run on
/// both sides aborts the pair before the executor runs.
fn merge_account_pair(
    store: &Store,
    keeper: &FinancialEntity,
    loser: &FinancialEntity,
) -> Result<MergeOutcome> {
    let keeper_runs = store.recorded_runs(keeper.id)?;
    let loser_history = store.history_by_entity(loser.id)?;
    if let Some(run) = first_overlapping_run(&keeper_runs, &loser_history) {
        warn!(
            keeper = keeper.id,
            loser = loser.id,
            history_run = run,
            "recorded history overlaps, merge is aborted"
        );
        return Ok(MergeOutcome::AbortedConflict);
    }
    Ok(MergeExecutor::new(store).merge(keeper, loser))
}

// ============================================================================
// CANDIDATE FACTS
// ============================================================================

/// Gather the store-derived facts the pure selector consults.
fn candidate_facts(store: &Store, entity: FinancialEntity) -> Result<Candidate> {
    let has_asset_assignments = store.has_asset_assignments(entity.id)?;
    let has_breakdowns = store.has_breakdowns(entity.id)?;
    let owns_security_papers =
        entity.is_depot() && store.count_papers_by_account(entity.id)? > 0;
    let first_recorded_date = store.first_recorded_date(entity.id)?;
    Ok(Candidate {
        entity,
        has_asset_assignments,
        has_breakdowns,
        owns_security_papers,
        first_recorded_date,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AccountType, ApiType, EntityKind, HistoryProvenance, HistoryRecord, Source,
    };
    use chrono::{Days, NaiveDate};
    use std::path::PathBuf;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn temp_db() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio.db");
        (dir, path)
    }

    fn seed_source(store: &Store) -> SourceId {
        store
            .insert_source(&Source {
                id: 0,
                name: "Test Bank".to_string(),
                api_type: ApiType::BankFed,
                transactions_supported: false,
            })
            .unwrap()
    }

    fn seed_account(
        store: &Store,
        source_id: SourceId,
        account_type: AccountType,
        number: &str,
        created: NaiveDate,
    ) -> EntityId {
        store
            .insert_entity(&FinancialEntity {
                id: 0,
                kind: EntityKind::Account,
                source_id,
                api_type: ApiType::BankFed,
                account_type: Some(account_type),
                isin: None,
                account_number: Some(number.to_string()),
                iban: Some("DE02120300000000202051".to_string()),
                parent_account_id: None,
                name: format!("Account {}", number),
                sale_date: None,
                creation_date: created,
                acquisition_date: None,
            })
            .unwrap()
    }

    fn seed_paper(store: &Store, source_id: SourceId, depot_id: EntityId, isin: &str) -> EntityId {
        store
            .insert_entity(&FinancialEntity {
                id: 0,
                kind: EntityKind::SecurityPaper,
                source_id,
                api_type: ApiType::BankFed,
                account_type: None,
                isin: Some(isin.to_string()),
                account_number: None,
                iban: None,
                parent_account_id: Some(depot_id),
                name: format!("Paper {}", isin),
                sale_date: None,
                creation_date: date(2021, 1, 1),
                acquisition_date: None,
            })
            .unwrap()
    }

    fn seed_series(
        store: &Store,
        entity_id: EntityId,
        from: NaiveDate,
        to: NaiveDate,
        quantity: f64,
    ) {
        let mut day = from;
        let mut run = entity_id * 100_000;
        while day <= to {
            store
                .insert_history(&HistoryRecord {
                    id: 0,
                    entity_id,
                    history_run: run,
                    history_date: day,
                    provenance: HistoryProvenance::Recorded,
                    value: quantity * 100.0,
                    third_party_value: None,
                    currency: "EUR".to_string(),
                    quantity_nominal: Some(quantity),
                })
                .unwrap();
            run += 1;
            day = day.checked_add_days(Days::new(1)).unwrap();
        }
    }

    #[test]
    fn test_paper_handoff_merges_into_earliest_candidate() {
        // Scenario A: P1 supplies the first half of 2021, P2 the rest.
        let (_dir, db) = temp_db();
        let (p1, p2, depot_id);
        {
            let store = Store::open(&db).unwrap();
            let source_id = seed_source(&store);
            depot_id = seed_account(&store, source_id, AccountType::Securities, "10001", date(2020, 1, 1));
            p1 = seed_paper(&store, source_id, depot_id, "DE0005140008");
            p2 = seed_paper(&store, source_id, depot_id, "DE0005140008");
            seed_series(&store, p1, date(2021, 1, 1), date(2021, 6, 1), 10.0);
            seed_series(&store, p2, date(2021, 6, 2), date(2021, 12, 31), 10.0);
        }

        let stats = merge_duplicate_papers(&db, DEFAULT_BATCH_SIZE, 2).unwrap();
        assert_eq!(stats.merged, 1);

        let store = Store::open(&db).unwrap();
        let papers = store.papers_by_account(depot_id).unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].id, p1);
        assert!(store.find_entity(p2).unwrap().is_none());

        // Keeper history covers both halves of the year.
        let dates = store.recorded_history_by_date(p1).unwrap();
        assert!(dates.contains_key(&date(2021, 1, 1)));
        assert!(dates.contains_key(&date(2021, 12, 31)));
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let (_dir, db) = temp_db();
        {
            let store = Store::open(&db).unwrap();
            let source_id = seed_source(&store);
            let depot_id =
                seed_account(&store, source_id, AccountType::Securities, "10001", date(2020, 1, 1));
            let p1 = seed_paper(&store, source_id, depot_id, "DE0005140008");
            let p2 = seed_paper(&store, source_id, depot_id, "DE0005140008");
            seed_series(&store, p1, date(2021, 1, 1), date(2021, 6, 1), 10.0);
            seed_series(&store, p2, date(2021, 6, 2), date(2021, 12, 31), 10.0);
        }

        let first = merge_duplicate_papers(&db, DEFAULT_BATCH_SIZE, 2).unwrap();
        assert_eq!(first.merged, 1);

        let second = merge_duplicate_papers(&db, DEFAULT_BATCH_SIZE, 2).unwrap();
        assert_eq!(second.merged, 0);
    }

    #[test]
    fn test_conflicting_papers_are_not_merged() {
        let (_dir, db) = temp_db();
        let (p1, p2);
        {
            let store = Store::open(&db).unwrap();
            let source_id = seed_source(&store);
            let depot_id =
                seed_account(&store, source_id, AccountType::Securities, "10001", date(2020, 1, 1));
            p1 = seed_paper(&store, source_id, depot_id, "DE0005140008");
            p2 = seed_paper(&store, source_id, depot_id, "DE0005140008");
            // Two overlapping days with diverging quantities.
            seed_series(&store, p1, date(2021, 1, 1), date(2021, 6, 3), 10.0);
            seed_series(&store, p2, date(2021, 6, 2), date(2021, 12, 31), 25.0);
        }

        let stats = merge_duplicate_papers(&db, DEFAULT_BATCH_SIZE, 1).unwrap();
        assert_eq!(stats.merged, 0);
        assert!(stats.not_merged >= 1);

        let store = Store::open(&db).unwrap();
        assert!(store.find_entity(p1).unwrap().is_some());
        assert!(store.find_entity(p2).unwrap().is_some());
    }

    #[test]
    fn test_account_assignments_override_creation_date() {
        // Scenario B: X created later but carries an asset assignment.
        let (_dir, db) = temp_db();
        let (x, y);
        {
            let store = Store::open(&db).unwrap();
            let source_id = seed_source(&store);
            x = seed_account(&store, source_id, AccountType::Checking, "555", date(2020, 1, 1));
            y = seed_account(&store, source_id, AccountType::Checking, "555", date(2019, 1, 1));
            store.insert_asset_assignment(x, "asset-1").unwrap();
        }

        let stats = merge_duplicate_accounts(&db, DEFAULT_BATCH_SIZE, 1).unwrap();
        assert_eq!(stats.merged, 1);

        let store = Store::open(&db).unwrap();
        assert!(store.find_entity(x).unwrap().is_some());
        assert!(store.find_entity(y).unwrap().is_none());
    }

    #[test]
    fn test_account_history_run_overlap_blocks_merge() {
        let (_dir, db) = temp_db();
        let (a, b);
        {
            let store = Store::open(&db).unwrap();
            let source_id = seed_source(&store);
            a = seed_account(&store, source_id, AccountType::Checking, "555", date(2019, 1, 1));
            b = seed_account(&store, source_id, AccountType::Checking, "555", date(2020, 1, 1));
            for (entity, run) in [(a, 5i64), (b, 5)] {
                store
                    .insert_history(&HistoryRecord {
                        id: 0,
                        entity_id: entity,
                        history_run: run,
                        history_date: date(2021, 1, 1),
                        provenance: HistoryProvenance::Recorded,
                        value: 100.0,
                        third_party_value: None,
                        currency: "EUR".to_string(),
                        quantity_nominal: None,
                    })
                    .unwrap();
            }
        }

        let stats = merge_duplicate_accounts(&db, DEFAULT_BATCH_SIZE, 1).unwrap();
        assert_eq!(stats.merged, 0);
        assert_eq!(stats.not_merged, 1);

        let store = Store::open(&db).unwrap();
        assert!(store.find_entity(a).unwrap().is_some());
        assert!(store.find_entity(b).unwrap().is_some());
    }

    #[test]
    fn test_manual_account_pair_is_skipped() {
        let (_dir, db) = temp_db();
        let (a, b);
        {
            let store = Store::open(&db).unwrap();
            let source_id = seed_source(&store);
            a = seed_account(&store, source_id, AccountType::Checking, "555", date(2019, 1, 1));
            b = seed_account(&store, source_id, AccountType::Checking, "555", date(2020, 1, 1));
            store
                .insert_entity(&FinancialEntity {
                    id: 0,
                    kind: EntityKind::Account,
                    source_id,
                    api_type: ApiType::Manual,
                    account_type: Some(AccountType::Checking),
                    isin: None,
                    account_number: Some("777".to_string()),
                    iban: Some("DE02120300000000202051".to_string()),
                    parent_account_id: None,
                    name: "Manual".to_string(),
                    sale_date: None,
                    creation_date: date(2018, 1, 1),
                    acquisition_date: None,
                })
                .unwrap();
        }

        // The bank-fed pair merges; the manual account has no duplicate and
        // is untouched.
        let stats = merge_duplicate_accounts(&db, DEFAULT_BATCH_SIZE, 1).unwrap();
        assert_eq!(stats.merged, 1);

        let store = Store::open(&db).unwrap();
        assert!(store.find_entity(a).unwrap().is_some());
        assert!(store.find_entity(b).unwrap().is_none());
    }

    #[test]
    fn test_manual_account_does_not_shadow_later_duplicates() {
        let (_dir, db) = temp_db();
        let (bf1, bf2);
        {
            let store = Store::open(&db).unwrap();
            let source_id = seed_source(&store);
            // Manual account comes first in the group; the two bank-fed
            // duplicates behind it must still merge with each other.
            store
                .insert_entity(&FinancialEntity {
                    id: 0,
                    kind: EntityKind::Account,
                    source_id,
                    api_type: ApiType::Manual,
                    account_type: Some(AccountType::Checking),
                    isin: None,
                    account_number: Some("555".to_string()),
                    iban: Some("DE02120300000000202051".to_string()),
                    parent_account_id: None,
                    name: "Manual".to_string(),
                    sale_date: None,
                    creation_date: date(2018, 1, 1),
                    acquisition_date: None,
                })
                .unwrap();
            bf1 = seed_account(&store, source_id, AccountType::Checking, "555", date(2019, 1, 1));
            bf2 = seed_account(&store, source_id, AccountType::Checking, "555", date(2020, 1, 1));
        }

        let stats = merge_duplicate_accounts(&db, DEFAULT_BATCH_SIZE, 1).unwrap();
        assert_eq!(stats.merged, 1);
        assert_eq!(stats.not_merged, 1);

        let store = Store::open(&db).unwrap();
        assert!(store.find_entity(bf1).unwrap().is_some());
        assert!(store.find_entity(bf2).unwrap().is_none());
    }

    #[test]
    fn test_three_way_duplicates_converge_to_one_paper() {
        let (_dir, db) = temp_db();
        let (p1, p2, p3, depot_id);
        {
            let store = Store::open(&db).unwrap();
            let source_id = seed_source(&store);
            depot_id =
                seed_account(&store, source_id, AccountType::Securities, "10001", date(2020, 1, 1));
            p1 = seed_paper(&store, source_id, depot_id, "DE0005140008");
            p2 = seed_paper(&store, source_id, depot_id, "DE0005140008");
            p3 = seed_paper(&store, source_id, depot_id, "DE0005140008");
            seed_series(&store, p1, date(2021, 1, 1), date(2021, 3, 31), 10.0);
            seed_series(&store, p2, date(2021, 4, 1), date(2021, 6, 30), 10.0);
            seed_series(&store, p3, date(2021, 7, 1), date(2021, 12, 31), 10.0);
        }

        let stats = merge_duplicate_papers(&db, DEFAULT_BATCH_SIZE, 1).unwrap();
        assert_eq!(stats.merged, 2);

        let store = Store::open(&db).unwrap();
        let papers = store.papers_by_account(depot_id).unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].id, p1);
        assert!(store.find_entity(p2).unwrap().is_none());
        assert!(store.find_entity(p3).unwrap().is_none());
    }

    #[test]
    fn test_failed_pair_does_not_stop_the_run() {
        let (_dir, db) = temp_db();
        let store = Store::open(&db).unwrap();
        let source_id = seed_source(&store);
        let depot_id =
            seed_account(&store, source_id, AccountType::Securities, "10001", date(2020, 1, 1));
        let a1 = seed_paper(&store, source_id, depot_id, "DE0005140008");
        let a2 = seed_paper(&store, source_id, depot_id, "DE0005140008");
        let b1 = seed_paper(&store, source_id, depot_id, "US0378331005");
        let b2 = seed_paper(&store, source_id, depot_id, "US0378331005");
        seed_series(&store, a1, date(2021, 1, 1), date(2021, 1, 5), 10.0);
        seed_series(&store, a2, date(2021, 1, 6), date(2021, 1, 10), 10.0);
        seed_series(&store, b1, date(2021, 2, 1), date(2021, 2, 5), 4.0);
        seed_series(&store, b2, date(2021, 2, 6), date(2021, 2, 10), 4.0);

        // Every pair now fails mid-migration; each is marked not-merged and
        // the loop moves on to the next group.
        let raw = rusqlite::Connection::open(&db).unwrap();
        raw.execute("DROP TABLE expense_or_income", []).unwrap();

        let reconciler = HistoryReconciler::new();
        let stats = merge_papers_in_depot(&store, &reconciler, depot_id).unwrap();
        assert_eq!(stats.merged, 0);
        assert_eq!(stats.not_merged, 2);
        for id in [a1, a2, b1, b2] {
            assert!(store.find_entity(id).unwrap().is_some());
        }
    }

    #[test]
    fn test_batch_failure_is_isolated() {
        let (_dir, db) = temp_db();
        {
            Store::open(&db).unwrap();
        }

        let ids = vec![1i64, 2];
        let stats = process_all(&db, &ids, 1, 2, |_store, batch| {
            if batch[0] == 1 {
                Err(EngineError::Configuration("boom".into()))
            } else {
                Ok(MergeStats {
                    merged: 3,
                    not_merged: 1,
                })
            }
        })
        .unwrap();

        // The failing batch contributes nothing; the healthy one survives.
        assert_eq!(stats.merged, 3);
        assert_eq!(stats.not_merged, 1);
    }

    #[test]
    fn test_zero_parallelism_is_a_configuration_error() {
        let (_dir, db) = temp_db();
        let result = process_all(&db, &[1], 10, 0, |_, _| Ok(MergeStats::default()));
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_should_log_progress() {
        assert!(should_log_progress(10, 100, 10));
        assert!(!should_log_progress(15, 100, 10));
        assert!(!should_log_progress(1, 5, 10));
    }
}
