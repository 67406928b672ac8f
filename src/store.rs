// 🗄️ Store - SQLite persistence collaborator
//
// Exposes the find/save/reassign/delete primitives the merge engine needs.
// Every scheduler worker owns its own connection; WAL mode keeps concurrent
// readers and the single writer per batch happy.
//
// The UNIQUE(entity_id, history_run) constraint on history is load-bearing:
// merge migration deletes a superseded row before reassigning its
// replacement, and because statements auto-commit the delete is durable
// before the reassignment runs.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::Result;
use crate::model::{
    AccountType, ApiType, EntityId, EntityKind, ExpenseOrIncomeRecord, FinancialEntity,
    HistoryProvenance, HistoryRecord, HistoryRun, Source, SourceId, TransactionRecord,
};

// ============================================================================
// AUDIT EVENT
// ============================================================================

/// Audit-trail entry. The merge engine records one per merged pair plus a
/// recalculation request the out-of-scope history recomputation job picks up.
#[derive(Debug, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub event_type: String,
    pub entity_id: EntityId,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(event_type: &str, entity_id: EntityId, data: serde_json::Value) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_id,
            data,
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

pub struct Store {
    conn: Connection,
}

const ENTITY_COLUMNS: &str = "id, kind, source_id, api_type, account_type, isin, \
     account_number, iban, parent_account_id, name, sale_date, creation_date, \
     acquisition_date";

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Store { conn };
        store.setup_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Store { conn };
        store.setup_schema()?;
        Ok(store)
    }

    pub fn setup_schema(&self) -> Result<()> {
        // WAL for crash recovery; a crash mid-merge leaves only whole
        // statements behind, which is exactly the checkpoint granularity
        // the migration steps rely on.
        let _ = self.conn.pragma_update(None, "journal_mode", "WAL");

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                api_type TEXT NOT NULL,
                transactions_supported INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS entities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                source_id INTEGER NOT NULL,
                api_type TEXT NOT NULL,
                account_type TEXT,
                isin TEXT,
                account_number TEXT,
                iban TEXT,
                parent_account_id INTEGER,
                name TEXT NOT NULL,
                sale_date TEXT,
                creation_date TEXT NOT NULL,
                acquisition_date TEXT
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_id INTEGER NOT NULL,
                history_run INTEGER NOT NULL,
                history_date TEXT NOT NULL,
                provenance TEXT NOT NULL,
                value REAL NOT NULL,
                third_party_value REAL,
                currency TEXT NOT NULL,
                quantity_nominal REAL,
                UNIQUE(entity_id, history_run)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_id INTEGER NOT NULL,
                third_party_key TEXT NOT NULL,
                key_hash TEXT NOT NULL,
                booking_date TEXT NOT NULL,
                amount REAL NOT NULL,
                currency TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS expense_or_income (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_id INTEGER NOT NULL,
                third_party_key TEXT NOT NULL,
                key_hash TEXT NOT NULL,
                transaction_id INTEGER,
                amount REAL NOT NULL,
                currency TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS breakdowns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_id INTEGER NOT NULL,
                label TEXT NOT NULL,
                percentage REAL NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS asset_assignments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_id INTEGER NOT NULL,
                asset_ref TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT UNIQUE NOT NULL,
                timestamp TEXT NOT NULL,
                event_type TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                data TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_entities_parent ON entities(parent_account_id)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_entities_source ON entities(source_id)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_history_entity ON history(entity_id)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transactions_entity ON transactions(entity_id)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_expense_entity ON expense_or_income(entity_id)",
            [],
        )?;

        Ok(())
    }

    // ========================================================================
    // SCOPED LISTINGS
    // ========================================================================

    /// Ids of all depots (securities accounts) - the scopes of the paper job.
    pub fn list_depot_ids(&self) -> Result<Vec<EntityId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM entities WHERE kind = 'ACCOUNT' AND account_type = 'SECURITIES'
             ORDER BY id",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn list_source_ids(&self) -> Result<Vec<SourceId>> {
        let mut stmt = self.conn.prepare("SELECT id FROM sources ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn find_entity(&self, id: EntityId) -> Result<Option<FinancialEntity>> {
        let sql = format!("SELECT {} FROM entities WHERE id = ?1", ENTITY_COLUMNS);
        let entity = self
            .conn
            .query_row(&sql, params![id], map_entity)
            .optional()?;
        Ok(entity)
    }

    pub fn papers_by_account(&self, account_id: EntityId) -> Result<Vec<FinancialEntity>> {
        let sql = format!(
            "SELECT {} FROM entities
             WHERE kind = 'SECURITY_PAPER' AND parent_account_id = ?1
             ORDER BY id",
            ENTITY_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entities = stmt
            .query_map(params![account_id], map_entity)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entities)
    }

    pub fn accounts_by_source(&self, source_id: SourceId) -> Result<Vec<FinancialEntity>> {
        let sql = format!(
            "SELECT {} FROM entities
             WHERE kind = 'ACCOUNT' AND source_id = ?1
             ORDER BY id",
            ENTITY_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entities = stmt
            .query_map(params![source_id], map_entity)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entities)
    }

    pub fn count_papers_by_account(&self, account_id: EntityId) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM entities
             WHERE kind = 'SECURITY_PAPER' AND parent_account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_paper_history_by_account(&self, account_id: EntityId) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM history h
             JOIN entities e ON e.id = h.entity_id
             WHERE e.kind = 'SECURITY_PAPER' AND e.parent_account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn find_source(&self, id: SourceId) -> Result<Option<Source>> {
        let source = self
            .conn
            .query_row(
                "SELECT id, name, api_type, transactions_supported FROM sources WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Source {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        api_type: parse_api_type(row, 2)?,
                        transactions_supported: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(source)
    }

    // ========================================================================
    // HISTORY LOOKUPS
    // ========================================================================

    pub fn history_by_entity(&self, entity_id: EntityId) -> Result<Vec<HistoryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_id, history_run, history_date, provenance, value,
                    third_party_value, currency, quantity_nominal
             FROM history WHERE entity_id = ?1 ORDER BY history_run",
        )?;
        let records = stmt
            .query_map(params![entity_id], map_history)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// RECORDED history only, keyed by date - the reconciler's input shape.
    pub fn recorded_history_by_date(
        &self,
        entity_id: EntityId,
    ) -> Result<HashMap<NaiveDate, HistoryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_id, history_run, history_date, provenance, value,
                    third_party_value, currency, quantity_nominal
             FROM history WHERE entity_id = ?1 AND provenance = 'RECORDED'",
        )?;
        let mut map = HashMap::new();
        for record in stmt.query_map(params![entity_id], map_history)? {
            let record = record?;
            map.insert(record.history_date, record);
        }
        Ok(map)
    }

    pub fn recorded_runs(&self, entity_id: EntityId) -> Result<HashSet<HistoryRun>> {
        let mut stmt = self.conn.prepare(
            "SELECT history_run FROM history
             WHERE entity_id = ?1 AND provenance = 'RECORDED'",
        )?;
        let mut runs = HashSet::new();
        for run in stmt.query_map(params![entity_id], |row| row.get(0))? {
            runs.insert(run?);
        }
        Ok(runs)
    }

    pub fn first_recorded_date(&self, entity_id: EntityId) -> Result<Option<NaiveDate>> {
        let date = self.conn.query_row(
            "SELECT MIN(history_date) FROM history
             WHERE entity_id = ?1 AND provenance = 'RECORDED'",
            params![entity_id],
            |row| row.get::<_, Option<NaiveDate>>(0),
        )?;
        Ok(date)
    }

    // ========================================================================
    // TRANSACTION & EXPENSE/INCOME LOOKUPS
    // ========================================================================

    pub fn transactions_by_entity(&self, entity_id: EntityId) -> Result<Vec<TransactionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_id, third_party_key, key_hash, booking_date, amount, currency
             FROM transactions WHERE entity_id = ?1 ORDER BY id",
        )?;
        let records = stmt
            .query_map(params![entity_id], map_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn find_transaction(&self, id: i64) -> Result<Option<TransactionRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT id, entity_id, third_party_key, key_hash, booking_date, amount, currency
                 FROM transactions WHERE id = ?1",
                params![id],
                map_transaction,
            )
            .optional()?;
        Ok(record)
    }

    pub fn expenses_by_entity(&self, entity_id: EntityId) -> Result<Vec<ExpenseOrIncomeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_id, third_party_key, key_hash, transaction_id, amount, currency
             FROM expense_or_income WHERE entity_id = ?1 ORDER BY id",
        )?;
        let records = stmt
            .query_map(params![entity_id], map_expense)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    // ========================================================================
    // GUARD LOOKUPS
    // ========================================================================

    pub fn has_breakdowns(&self, entity_id: EntityId) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM breakdowns WHERE entity_id = ?1)",
            params![entity_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn has_asset_assignments(&self, entity_id: EntityId) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM asset_assignments WHERE entity_id = ?1)",
            params![entity_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    // ========================================================================
    // WRITE PRIMITIVES
    // ========================================================================

    pub fn reassign_history(&self, history_id: i64, entity_id: EntityId) -> Result<()> {
        self.conn.execute(
            "UPDATE history SET entity_id = ?1 WHERE id = ?2",
            params![entity_id, history_id],
        )?;
        Ok(())
    }

    pub fn delete_history(&self, history_id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM history WHERE id = ?1", params![history_id])?;
        Ok(())
    }

    pub fn delete_history_by_entity(&self, entity_id: EntityId) -> Result<()> {
        self.conn
            .execute("DELETE FROM history WHERE entity_id = ?1", params![entity_id])?;
        Ok(())
    }

    /// Delete everything that is not RECORDED so it can be recomputed from
    /// merged RECORDED data plus transactions.
    pub fn delete_derived_history(&self, entity_id: EntityId) -> Result<()> {
        self.conn.execute(
            "DELETE FROM history WHERE entity_id = ?1 AND provenance != 'RECORDED'",
            params![entity_id],
        )?;
        Ok(())
    }

    pub fn reassign_transaction(&self, transaction_id: i64, entity_id: EntityId) -> Result<()> {
        self.conn.execute(
            "UPDATE transactions SET entity_id = ?1 WHERE id = ?2",
            params![entity_id, transaction_id],
        )?;
        Ok(())
    }

    pub fn delete_transactions_by_entity(&self, entity_id: EntityId) -> Result<()> {
        self.conn.execute(
            "DELETE FROM transactions WHERE entity_id = ?1",
            params![entity_id],
        )?;
        Ok(())
    }

    pub fn reassign_expense(&self, expense_id: i64, entity_id: EntityId) -> Result<()> {
        self.conn.execute(
            "UPDATE expense_or_income SET entity_id = ?1 WHERE id = ?2",
            params![entity_id, expense_id],
        )?;
        Ok(())
    }

    pub fn set_expense_transaction(&self, expense_id: i64, transaction_id: Option<i64>) -> Result<()> {
        self.conn.execute(
            "UPDATE expense_or_income SET transaction_id = ?1 WHERE id = ?2",
            params![transaction_id, expense_id],
        )?;
        Ok(())
    }

    pub fn delete_expenses_by_entity(&self, entity_id: EntityId) -> Result<()> {
        self.conn.execute(
            "DELETE FROM expense_or_income WHERE entity_id = ?1",
            params![entity_id],
        )?;
        Ok(())
    }

    pub fn update_entity_dates(&self, entity: &FinancialEntity) -> Result<()> {
        self.conn.execute(
            "UPDATE entities SET sale_date = ?1, acquisition_date = ?2 WHERE id = ?3",
            params![entity.sale_date, entity.acquisition_date, entity.id],
        )?;
        Ok(())
    }

    pub fn delete_entity(&self, entity_id: EntityId) -> Result<()> {
        self.conn
            .execute("DELETE FROM entities WHERE id = ?1", params![entity_id])?;
        Ok(())
    }

    // ========================================================================
    // AUDIT TRAIL
    // ========================================================================

    pub fn record_event(&self, event: &Event) -> Result<()> {
        let data_json = serde_json::to_string(&event.data)
            .unwrap_or_else(|_| "{}".to_string());
        self.conn.execute(
            "INSERT INTO events (event_id, timestamp, event_type, entity_id, data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.event_id,
                event.timestamp.to_rfc3339(),
                event.event_type,
                event.entity_id,
                data_json,
            ],
        )?;
        Ok(())
    }

    pub fn events_for_entity(&self, entity_id: EntityId) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, timestamp, event_type, entity_id, data
             FROM events WHERE entity_id = ?1 ORDER BY id",
        )?;
        let events = stmt
            .query_map(params![entity_id], |row| {
                let timestamp_str: String = row.get(1)?;
                let data_json: String = row.get(4)?;
                Ok(Event {
                    event_id: row.get(0)?,
                    timestamp: chrono::DateTime::parse_from_rfc3339(&timestamp_str)
                        .map_err(|_| rusqlite::Error::InvalidQuery)?
                        .with_timezone(&Utc),
                    event_type: row.get(2)?,
                    entity_id: row.get(3)?,
                    data: serde_json::from_str(&data_json)
                        .map_err(|_| rusqlite::Error::InvalidQuery)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }

    // ========================================================================
    // INSERTS (seeding and tests - ingestion itself lives upstream)
    // ========================================================================

    pub fn insert_source(&self, source: &Source) -> Result<SourceId> {
        self.conn.execute(
            "INSERT INTO sources (name, api_type, transactions_supported) VALUES (?1, ?2, ?3)",
            params![
                source.name,
                source.api_type.as_str(),
                source.transactions_supported
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_entity(&self, entity: &FinancialEntity) -> Result<EntityId> {
        self.conn.execute(
            "INSERT INTO entities (kind, source_id, api_type, account_type, isin,
                account_number, iban, parent_account_id, name, sale_date,
                creation_date, acquisition_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                entity.kind.as_str(),
                entity.source_id,
                entity.api_type.as_str(),
                entity.account_type.map(|t| t.as_str()),
                entity.isin,
                entity.account_number,
                entity.iban,
                entity.parent_account_id,
                entity.name,
                entity.sale_date,
                entity.creation_date,
                entity.acquisition_date,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_history(&self, record: &HistoryRecord) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO history (entity_id, history_run, history_date, provenance,
                value, third_party_value, currency, quantity_nominal)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.entity_id,
                record.history_run,
                record.history_date,
                record.provenance.as_str(),
                record.value,
                record.third_party_value,
                record.currency,
                record.quantity_nominal,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_transaction(&self, record: &TransactionRecord) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO transactions (entity_id, third_party_key, key_hash,
                booking_date, amount, currency)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.entity_id,
                record.third_party_key,
                record.key_hash,
                record.booking_date,
                record.amount,
                record.currency,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_expense(&self, record: &ExpenseOrIncomeRecord) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO expense_or_income (entity_id, third_party_key, key_hash,
                transaction_id, amount, currency)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.entity_id,
                record.third_party_key,
                record.key_hash,
                record.transaction_id,
                record.amount,
                record.currency,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_breakdown(&self, entity_id: EntityId, label: &str, percentage: f64) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO breakdowns (entity_id, label, percentage) VALUES (?1, ?2, ?3)",
            params![entity_id, label, percentage],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_asset_assignment(&self, entity_id: EntityId, asset_ref: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO asset_assignments (entity_id, asset_ref) VALUES (?1, ?2)",
            params![entity_id, asset_ref],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn parse_api_type(row: &Row, idx: usize) -> rusqlite::Result<ApiType> {
    let raw: String = row.get(idx)?;
    ApiType::parse(&raw).ok_or(rusqlite::Error::InvalidQuery)
}

fn map_entity(row: &Row) -> rusqlite::Result<FinancialEntity> {
    let kind_raw: String = row.get(1)?;
    let account_type_raw: Option<String> = row.get(4)?;
    Ok(FinancialEntity {
        id: row.get(0)?,
        kind: EntityKind::parse(&kind_raw).ok_or(rusqlite::Error::InvalidQuery)?,
        source_id: row.get(2)?,
        api_type: parse_api_type(row, 3)?,
        account_type: match account_type_raw {
            Some(raw) => Some(AccountType::parse(&raw).ok_or(rusqlite::Error::InvalidQuery)?),
            None => None,
        },
        isin: row.get(5)?,
        account_number: row.get(6)?,
        iban: row.get(7)?,
        parent_account_id: row.get(8)?,
        name: row.get(9)?,
        sale_date: row.get(10)?,
        creation_date: row.get(11)?,
        acquisition_date: row.get(12)?,
    })
}

fn map_history(row: &Row) -> rusqlite::Result<HistoryRecord> {
    let provenance_raw: String = row.get(4)?;
    Ok(HistoryRecord {
        id: row.get(0)?,
        entity_id: row.get(1)?,
        history_run: row.get(2)?,
        history_date: row.get(3)?,
        provenance: HistoryProvenance::parse(&provenance_raw)
            .ok_or(rusqlite::Error::InvalidQuery)?,
        value: row.get(5)?,
        third_party_value: row.get(6)?,
        currency: row.get(7)?,
        quantity_nominal: row.get(8)?,
    })
}

fn map_transaction(row: &Row) -> rusqlite::Result<TransactionRecord> {
    Ok(TransactionRecord {
        id: row.get(0)?,
        entity_id: row.get(1)?,
        third_party_key: row.get(2)?,
        key_hash: row.get(3)?,
        booking_date: row.get(4)?,
        amount: row.get(5)?,
        currency: row.get(6)?,
    })
}

fn map_expense(row: &Row) -> rusqlite::Result<ExpenseOrIncomeRecord> {
    Ok(ExpenseOrIncomeRecord {
        id: row.get(0)?,
        entity_id: row.get(1)?,
        third_party_key: row.get(2)?,
        key_hash: row.get(3)?,
        transaction_id: row.get(4)?,
        amount: row.get(5)?,
        currency: row.get(6)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
