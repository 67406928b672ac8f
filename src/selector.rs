// 🎯 Candidate Selector - Decide which of two duplicates survives
//
// Pure tie-break: callers gather the store-derived facts into a Candidate
// first, so the rules themselves have no persistence dependency and can be
// tested exhaustively. Dispatch is over the closed entity-kind set - plain
// account, depot, security paper - never runtime inspection.

use chrono::NaiveDate;

use crate::model::{ApiType, EntityKind, FinancialEntity};

/// One duplicate candidate plus the facts the tie-break rules consult.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub entity: FinancialEntity,
    pub has_asset_assignments: bool,
    pub has_breakdowns: bool,

    /// Depots only: does this depot currently own security papers?
    pub owns_security_papers: bool,

    /// Papers only: earliest RECORDED history date, if any history exists.
    pub first_recorded_date: Option<NaiveDate>,
}

impl Candidate {
    pub fn bare(entity: FinancialEntity) -> Self {
        Candidate {
            entity,
            has_asset_assignments: false,
            has_breakdowns: false,
            owns_security_papers: false,
            first_recorded_date: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// First candidate is the keeper, second the loser.
    KeepFirst,
    /// Second candidate is the keeper, first the loser.
    KeepSecond,
    Abort(AbortReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Manual accounts are never merged, in either role.
    ManualAccount,
    /// A paper without any RECORDED history cannot prove which feed it came
    /// from and is never merged.
    MissingHistory,
}

/// Tie-break two duplicate candidates of the same kind.
pub fn choose(a: &Candidate, b: &Candidate) -> Selection {
    match a.entity.kind {
        EntityKind::SecurityPaper => choose_paper(a, b),
        EntityKind::Account => {
            if a.entity.is_depot() {
                choose_depot(a, b)
            } else {
                choose_account(a, b)
            }
        }
    }
}

/// Plain accounts: earlier creation date wins, but existing asset
/// assignments or breakdown allocations on the first candidate override
/// that - data someone curated must not be eliminated.
fn choose_account(a: &Candidate, b: &Candidate) -> Selection {
    if a.entity.api_type == ApiType::Manual || b.entity.api_type == ApiType::Manual {
        return Selection::Abort(AbortReason::ManualAccount);
    }
    if a.entity.creation_date < b.entity.creation_date
        || a.has_asset_assignments
        || a.has_breakdowns
    {
        Selection::KeepFirst
    } else {
        Selection::KeepSecond
    }
}

/// Depots: an unsold depot beats a sold one; between two unsold ones the
/// depot that still owns papers survives; between two sold ones the later
/// sale date survives.
fn choose_depot(a: &Candidate, b: &Candidate) -> Selection {
    if a.entity.api_type == ApiType::Manual || b.entity.api_type == ApiType::Manual {
        return Selection::Abort(AbortReason::ManualAccount);
    }
    match (a.entity.sale_date, b.entity.sale_date) {
        (None, None) => {
            if a.owns_security_papers {
                Selection::KeepFirst
            } else {
                Selection::KeepSecond
            }
        }
        (Some(_), None) => Selection::KeepSecond,
        (None, Some(_)) => Selection::KeepFirst,
        (Some(sale_a), Some(sale_b)) => {
            if sale_a > sale_b {
                Selection::KeepFirst
            } else {
                Selection::KeepSecond
            }
        }
    }
}

/// Papers: the candidate whose RECORDED history starts earlier is the
/// tentative keeper. No history at all means no merge for this pairing.
fn choose_paper(a: &Candidate, b: &Candidate) -> Selection {
    let (Some(first_a), Some(first_b)) = (a.first_recorded_date, b.first_recorded_date) else {
        return Selection::Abort(AbortReason::MissingHistory);
    };
    if first_a < first_b {
        Selection::KeepFirst
    } else {
        Selection::KeepSecond
    }
}

// ============================================================================
// TESTS
// ============================================================================
