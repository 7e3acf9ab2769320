//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::adjustment::CurrencyAdjustment;
use crate::audit::{AuditRecord, EntityType};
use crate::journal::validation::validate_line_items;
use crate::locks::TransactionLock;
use crate::reconciliation::BankReconciliation;
use crate::sequence::DocumentKind;
use crate::types::*;

/// Storage abstraction for the ledger consistency core.
///
/// This trait allows the core to work with any backend (PostgreSQL,
/// MySQL, SQLite, in-memory, etc.). Implementations carry the
/// atomicity contract: every method that takes an [`AuditRecord`]
/// persists the mutation and the audit record together or not at all,
/// and the sequence/lock primitives below are single atomic operations.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Atomically increment and return the counter for (owner, kind).
    ///
    /// Implementations must use a transactional increment (a dedicated
    /// counter row updated via compare-and-swap or an equivalent
    /// primitive). Deriving the value by counting existing documents is
    /// racy and forbidden. When the counter cannot be advanced, fail
    /// with [`CoreError::SequenceUnavailable`]; never hand out a reused
    /// or guessed number.
    async fn next_sequence(&self, owner: &OwnerId, kind: DocumentKind) -> CoreResult<u64>;

    async fn save_journal_entry(
        &self,
        entry: &JournalEntry,
        audit: &AuditRecord,
    ) -> CoreResult<()>;

    async fn get_journal_entry(&self, owner: &OwnerId, id: Uuid)
        -> CoreResult<Option<JournalEntry>>;

    async fn update_journal_entry(
        &self,
        entry: &JournalEntry,
        audit: &AuditRecord,
    ) -> CoreResult<()>;

    /// Persist a reversal pair: the original flipped to `reversed` and
    /// the compensating entry, as one unit.
    async fn save_reversal(
        &self,
        reversed: &JournalEntry,
        reversal: &JournalEntry,
        audit_reversed: &AuditRecord,
        audit_created: &AuditRecord,
    ) -> CoreResult<()>;

    async fn list_journal_entries(
        &self,
        owner: &OwnerId,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> CoreResult<Vec<JournalEntry>>;

    async fn save_adjustment(
        &self,
        adjustment: &CurrencyAdjustment,
        audit: &AuditRecord,
    ) -> CoreResult<()>;

    async fn get_adjustment(
        &self,
        owner: &OwnerId,
        id: Uuid,
    ) -> CoreResult<Option<CurrencyAdjustment>>;

    async fn update_adjustment(
        &self,
        adjustment: &CurrencyAdjustment,
        audit: &AuditRecord,
    ) -> CoreResult<()>;

    /// Insert a lock only if no active lock exists for its
    /// (owner, module) pair. The existence check and the insert are a
    /// single storage operation; a concurrent duplicate receives
    /// [`CoreError::DuplicateLock`].
    async fn create_lock(&self, lock: &TransactionLock, audit: &AuditRecord) -> CoreResult<()>;

    async fn get_active_lock(
        &self,
        owner: &OwnerId,
        module: Module,
    ) -> CoreResult<Option<TransactionLock>>;

    async fn update_lock(&self, lock: &TransactionLock, audit: &AuditRecord) -> CoreResult<()>;

    async fn remove_lock(
        &self,
        owner: &OwnerId,
        module: Module,
        audit: &AuditRecord,
    ) -> CoreResult<()>;

    async fn save_reconciliation(
        &self,
        reconciliation: &BankReconciliation,
        audit: &AuditRecord,
    ) -> CoreResult<()>;

    async fn get_reconciliation(
        &self,
        owner: &OwnerId,
        id: Uuid,
    ) -> CoreResult<Option<BankReconciliation>>;

    async fn update_reconciliation(
        &self,
        reconciliation: &BankReconciliation,
        audit: &AuditRecord,
    ) -> CoreResult<()>;

    /// Append a standalone audit record.
    async fn append_audit(&self, record: &AuditRecord) -> CoreResult<()>;

    async fn list_audit_records(
        &self,
        owner: &OwnerId,
        entity_type: Option<EntityType>,
    ) -> CoreResult<Vec<AuditRecord>>;
}

/// Trait for implementing custom double-entry validation rules.
pub trait EntryValidator: Send + Sync {
    /// Validate a line-item set, collecting every violated rule.
    fn validate(&self, line_items: &[LineItem], tolerance: &BigDecimal) -> ValidationReport;
}

/// Default validator with the standard double-entry rules.
pub struct DefaultEntryValidator;

impl EntryValidator for DefaultEntryValidator {
    fn validate(&self, line_items: &[LineItem], tolerance: &BigDecimal) -> ValidationReport {
        validate_line_items(line_items, tolerance)
    }
}
