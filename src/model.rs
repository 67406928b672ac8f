// 📊 Data Model - Financial entities and their dependent records
//
// A FinancialEntity is either an account or a security paper. The same bank
// relationship can be ingested from multiple data feeds, so two rows may
// describe one real-world holding - the natural key (ISIN, or account
// number + IBAN) is what detects that, not the internal numeric id.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type EntityId = i64;
pub type SourceId = i64;
pub type HistoryRun = i64;

// ============================================================================
// ENTITY KIND & TYPE TAGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Account,
    SecurityPaper,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Account => "ACCOUNT",
            EntityKind::SecurityPaper => "SECURITY_PAPER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACCOUNT" => Some(EntityKind::Account),
            "SECURITY_PAPER" => Some(EntityKind::SecurityPaper),
            _ => None,
        }
    }
}

/// How the record entered the system: from a bank feed or created by hand.
/// Manual accounts are never merged away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiType {
    BankFed,
    Manual,
}

impl ApiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiType::BankFed => "BANK_FED",
            ApiType::Manual => "MANUAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BANK_FED" => Some(ApiType::BankFed),
            "MANUAL" => Some(ApiType::Manual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    Checking,
    /// Depot - a securities-holding account. Gets its own tie-break rules.
    Securities,
    Other,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "CHECKING",
            AccountType::Securities => "SECURITIES",
            AccountType::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CHECKING" => Some(AccountType::Checking),
            "SECURITIES" => Some(AccountType::Securities),
            "OTHER" => Some(AccountType::Other),
            _ => None,
        }
    }
}

// ============================================================================
// HISTORY PROVENANCE
// ============================================================================

/// Provenance tier of a history value. Total order:
/// RECORDED > MANUAL > CALCULATED > AUTOFILL.
///
/// The order is an explicit rank function so every comparison site uses the
/// same cascade instead of re-nesting conditionals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryProvenance {
    Recorded,
    Manual,
    Calculated,
    Autofill,
}

impl HistoryProvenance {
    /// Higher rank wins when two history rows claim the same history run.
    pub fn rank(&self) -> u8 {
        match self {
            HistoryProvenance::Recorded => 3,
            HistoryProvenance::Manual => 2,
            HistoryProvenance::Calculated => 1,
            HistoryProvenance::Autofill => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryProvenance::Recorded => "RECORDED",
            HistoryProvenance::Manual => "MANUAL",
            HistoryProvenance::Calculated => "CALCULATED",
            HistoryProvenance::Autofill => "AUTOFILL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RECORDED" => Some(HistoryProvenance::Recorded),
            "MANUAL" => Some(HistoryProvenance::Manual),
            "CALCULATED" => Some(HistoryProvenance::Calculated),
            "AUTOFILL" => Some(HistoryProvenance::Autofill),
            _ => None,
        }
    }
}

// ============================================================================
// FINANCIAL ENTITY
// ============================================================================

/// An account or a security paper as loaded from the store.
///
/// `sale_date == None` means the position is still held - absence is
/// meaningful and takes precedence when sale dates are reconciled in a merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub source_id: SourceId,
    pub api_type: ApiType,

    /// Set for accounts only.
    pub account_type: Option<AccountType>,

    /// Natural key for papers.
    pub isin: Option<String>,

    /// Natural key for accounts (together with iban).
    pub account_number: Option<String>,
    pub iban: Option<String>,

    /// For papers: the depot that owns this paper.
    pub parent_account_id: Option<EntityId>,

    pub name: String,
    pub sale_date: Option<NaiveDate>,
    pub creation_date: NaiveDate,
    pub acquisition_date: Option<NaiveDate>,
}

impl FinancialEntity {
    /// Externally meaningful identifier used to detect duplicates.
    /// Distinct from the internal numeric id.
    pub fn natural_key(&self) -> Option<String> {
        match self.kind {
            EntityKind::SecurityPaper => self.isin.clone(),
            EntityKind::Account => {
                let number = self.account_number.as_deref().unwrap_or("");
                let iban = self.iban.as_deref().unwrap_or("");
                if number.is_empty() && iban.is_empty() {
                    None
                } else {
                    Some(format!("{}|{}", number, iban))
                }
            }
        }
    }

    pub fn is_sold(&self) -> bool {
        self.sale_date.is_some()
    }

    pub fn is_depot(&self) -> bool {
        self.kind == EntityKind::Account && self.account_type == Some(AccountType::Securities)
    }
}

// ============================================================================
// HISTORY RECORD
// ============================================================================

/// One day-indexed value of an entity. At most one row per
/// (entity, history_run) pair - the store enforces this with a UNIQUE
/// constraint, which is why merge migration must delete a superseded row
/// before reassigning its replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub entity_id: EntityId,
    pub history_run: HistoryRun,
    pub history_date: NaiveDate,
    pub provenance: HistoryProvenance,
    pub value: f64,
    pub third_party_value: Option<f64>,
    pub currency: String,

    /// Nominal quantity, papers only.
    pub quantity_nominal: Option<f64>,
}

// ============================================================================
// TRANSACTION & EXPENSE/INCOME RECORDS
// ============================================================================

/// Booking on an entity, identified within its source by a third-party key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub entity_id: EntityId,
    pub third_party_key: String,
    pub key_hash: String,
    pub booking_date: NaiveDate,
    pub amount: f64,
    pub currency: String,
}

/// Dividend, fee or similar record. May reference the transaction it was
/// derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseOrIncomeRecord {
    pub id: i64,
    pub entity_id: EntityId,
    pub third_party_key: String,
    pub key_hash: String,
    pub transaction_id: Option<i64>,
    pub amount: f64,
    pub currency: String,
}

/// Hash of a third-party key, stored alongside the key itself so lookups
/// stay cheap even for very long upstream identifiers.
pub fn third_party_key_hash(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// SOURCE
// ============================================================================

/// A data feed. `transactions_supported` drives the derived-history cleanup
/// rule: when the keeper's source computes history from transactions, the
/// keeper's non-RECORDED history is deleted after a merge so it gets rebuilt
/// from the merged data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub name: String,
    pub api_type: ApiType,
    pub transactions_supported: bool,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(kind: EntityKind) -> FinancialEntity {
        FinancialEntity {
            id: 1,
            kind,
            source_id: 1,
            api_type: ApiType::BankFed,
            account_type: None,
            isin: None,
            account_number: None,
            iban: None,
            parent_account_id: None,
            name: "Test".to_string(),
            sale_date: None,
            creation_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            acquisition_date: None,
        }
    }

    #[test]
    fn test_provenance_rank_total_order() {
        assert!(HistoryProvenance::Recorded.rank() > HistoryProvenance::Manual.rank());
        assert!(HistoryProvenance::Manual.rank() > HistoryProvenance::Calculated.rank());
        assert!(HistoryProvenance::Calculated.rank() > HistoryProvenance::Autofill.rank());
    }

    #[test]
    fn test_provenance_roundtrip() {
        for p in [
            HistoryProvenance::Recorded,
            HistoryProvenance::Manual,
            HistoryProvenance::Calculated,
            HistoryProvenance::Autofill,
        ] {
            assert_eq!(HistoryProvenance::parse(p.as_str()), Some(p));
        }
        assert_eq!(HistoryProvenance::parse("BOGUS"), None);
    }

    #[test]
    fn test_natural_key_paper() {
        let mut paper = entity(EntityKind::SecurityPaper);
        paper.isin = Some("DE0005140008".to_string());
        assert_eq!(paper.natural_key(), Some("DE0005140008".to_string()));

        paper.isin = None;
        assert_eq!(paper.natural_key(), None);
    }

    #[test]
    fn test_natural_key_account() {
        let mut account = entity(EntityKind::Account);
        account.account_number = Some("12345678".to_string());
        account.iban = Some("DE89370400440532013000".to_string());
        assert_eq!(
            account.natural_key(),
            Some("12345678|DE89370400440532013000".to_string())
        );

        account.account_number = None;
        account.iban = None;
        assert_eq!(account.natural_key(), None);
    }

    #[test]
    fn test_is_depot() {
        let mut account = entity(EntityKind::Account);
        account.account_type = Some(AccountType::Securities);
        assert!(account.is_depot());

        account.account_type = Some(AccountType::Checking);
        assert!(!account.is_depot());

        let paper = entity(EntityKind::SecurityPaper);
        assert!(!paper.is_depot());
    }

    #[test]
    fn test_third_party_key_hash_stable() {
        let h1 = third_party_key_hash("feed-tx-0815");
        let h2 = third_party_key_hash("feed-tx-0815");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, third_party_key_hash("feed-tx-0816"));
    }
}
