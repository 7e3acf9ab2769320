//! Main orchestrator that coordinates the ledger consistency core

use chrono::NaiveDate;
use uuid::Uuid;

use crate::adjustment::{AdjustmentManager, CurrencyAdjustment, NewAdjustment};
use crate::audit::{AuditRecord, EntityType};
use crate::journal::{JournalManager, NewJournalEntry};
use crate::locks::{LockManager, LockStatus, TransactionLock};
use crate::reconciliation::{BankReconciliation, NewReconciliation, ReconciliationEngine};
use crate::traits::LedgerStore;
use crate::types::*;

/// Facade over the journal, adjustment, lock, and reconciliation
/// managers, wired against a single storage backend.
///
/// Every state-changing operation checks the period lock for the
/// transaction's effective date and module, and couples its mutation
/// with an audit record.
pub struct LedgerCore<S: LedgerStore> {
    journal: JournalManager<S>,
    adjustments: AdjustmentManager<S>,
    locks: LockManager<S>,
    reconciliations: ReconciliationEngine<S>,
    storage: S,
}

impl<S: LedgerStore + Clone> LedgerCore<S> {
    /// Create a core with the default configuration.
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, CoreConfig::default())
    }

    pub fn with_config(storage: S, config: CoreConfig) -> Self {
        Self {
            journal: JournalManager::new(storage.clone(), config.clone()),
            adjustments: AdjustmentManager::new(storage.clone(), config.clone()),
            locks: LockManager::new(storage.clone()),
            reconciliations: ReconciliationEngine::new(storage.clone(), config),
            storage,
        }
    }

    // Journal operations

    pub async fn create_journal_entry(
        &self,
        new_entry: NewJournalEntry,
        actor: &str,
    ) -> CoreResult<JournalEntry> {
        self.journal.create_entry(new_entry, actor).await
    }

    pub async fn post_journal_entry(
        &self,
        owner: &OwnerId,
        id: Uuid,
        actor: &str,
    ) -> CoreResult<JournalEntry> {
        self.journal.post_entry(owner, id, actor).await
    }

    pub async fn reverse_journal_entry(
        &self,
        owner: &OwnerId,
        id: Uuid,
        reason: &str,
        actor: &str,
    ) -> CoreResult<JournalEntry> {
        self.journal.reverse_entry(owner, id, reason, actor).await
    }

    pub async fn get_journal_entry(
        &self,
        owner: &OwnerId,
        id: Uuid,
    ) -> CoreResult<Option<JournalEntry>> {
        self.journal.get_entry(owner, id).await
    }

    pub async fn list_journal_entries(
        &self,
        owner: &OwnerId,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> CoreResult<Vec<JournalEntry>> {
        self.journal.list_entries(owner, start_date, end_date).await
    }

    // Currency adjustment operations

    pub async fn create_currency_adjustment(
        &self,
        new: NewAdjustment,
        actor: &str,
    ) -> CoreResult<CurrencyAdjustment> {
        self.adjustments.create_adjustment(new, actor).await
    }

    /// Approve a pending adjustment and realize a non-neutral outcome
    /// as a posted journal entry.
    pub async fn approve_currency_adjustment(
        &self,
        owner: &OwnerId,
        id: Uuid,
        approver: &str,
        actor: &str,
    ) -> CoreResult<CurrencyAdjustment> {
        let adjustment = self.adjustments.approve(owner, id, approver, actor).await?;

        if let Some(line_items) = self.adjustments.gain_loss_lines(&adjustment) {
            let entry = self
                .journal
                .create_entry(
                    NewJournalEntry {
                        owner: owner.clone(),
                        date: adjustment.date,
                        description: format!(
                            "Exchange {} on revaluation {}",
                            adjustment.adjustment_type, adjustment.reference_number
                        ),
                        source: SourceRef::new(
                            SourceKind::CurrencyAdjustment,
                            adjustment.reference_number.clone(),
                        ),
                        currency: adjustment.to_currency,
                        line_items,
                    },
                    actor,
                )
                .await?;
            self.journal.post_entry(owner, entry.id, actor).await?;
        }

        Ok(adjustment)
    }

    pub async fn reject_currency_adjustment(
        &self,
        owner: &OwnerId,
        id: Uuid,
        reason: &str,
        actor: &str,
    ) -> CoreResult<CurrencyAdjustment> {
        self.adjustments.reject(owner, id, reason, actor).await
    }

    pub async fn get_currency_adjustment(
        &self,
        owner: &OwnerId,
        id: Uuid,
    ) -> CoreResult<Option<CurrencyAdjustment>> {
        self.adjustments.get_adjustment(owner, id).await
    }

    // Period lock operations

    pub async fn lock_module(
        &self,
        owner: &OwnerId,
        module: Module,
        lock_date: NaiveDate,
        reason: &str,
        actor: &str,
    ) -> CoreResult<TransactionLock> {
        self.locks.lock(owner, module, lock_date, reason, actor).await
    }

    pub async fn partially_unlock(
        &self,
        owner: &OwnerId,
        module: Module,
        from: NaiveDate,
        to: NaiveDate,
        reason: &str,
        actor: &str,
    ) -> CoreResult<TransactionLock> {
        self.locks
            .partially_unlock(owner, module, from, to, reason, actor)
            .await
    }

    pub async fn relock_module(
        &self,
        owner: &OwnerId,
        module: Module,
        actor: &str,
    ) -> CoreResult<TransactionLock> {
        self.locks.relock(owner, module, actor).await
    }

    pub async fn unlock_module(
        &self,
        owner: &OwnerId,
        module: Module,
        actor: &str,
    ) -> CoreResult<()> {
        self.locks.unlock(owner, module, actor).await
    }

    pub async fn lock_status(&self, owner: &OwnerId, module: Module) -> CoreResult<LockStatus> {
        self.locks.status(owner, module).await
    }

    pub async fn is_date_locked(
        &self,
        owner: &OwnerId,
        module: Module,
        date: NaiveDate,
    ) -> CoreResult<bool> {
        self.locks.is_date_locked(owner, module, date).await
    }

    // Reconciliation operations

    pub async fn create_reconciliation(
        &self,
        new: NewReconciliation,
        actor: &str,
    ) -> CoreResult<BankReconciliation> {
        self.reconciliations.create_reconciliation(new, actor).await
    }

    pub async fn match_item(
        &self,
        owner: &OwnerId,
        reconciliation_id: Uuid,
        item_id: Uuid,
        book_transaction_id: Uuid,
        actor: &str,
    ) -> CoreResult<BankReconciliation> {
        self.reconciliations
            .match_item(owner, reconciliation_id, item_id, book_transaction_id, actor)
            .await
    }

    pub async fn confirm_reconciled(
        &self,
        owner: &OwnerId,
        reconciliation_id: Uuid,
        item_id: Uuid,
        allow_mismatch: bool,
        actor: &str,
    ) -> CoreResult<BankReconciliation> {
        self.reconciliations
            .confirm_reconciled(owner, reconciliation_id, item_id, allow_mismatch, actor)
            .await
    }

    pub async fn get_reconciliation(
        &self,
        owner: &OwnerId,
        id: Uuid,
    ) -> CoreResult<Option<BankReconciliation>> {
        self.reconciliations.get_reconciliation(owner, id).await
    }

    // Audit trail

    pub async fn audit_trail(
        &self,
        owner: &OwnerId,
        entity_type: Option<EntityType>,
    ) -> CoreResult<Vec<AuditRecord>> {
        self.storage.list_audit_records(owner, entity_type).await
    }
}
