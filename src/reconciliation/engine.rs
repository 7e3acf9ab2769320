//! Reconciliation lifecycle: create, match, settle

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{snapshot, AuditAction, AuditRecord, EntityType};
use crate::currency::Currency;
use crate::locks::LockManager;
use crate::reconciliation::{
    match_statement, BankReconciliation, BankStatementLine, BookTransaction, ItemStatus,
    ReconciliationStatus,
};
use crate::traits::LedgerStore;
use crate::types::*;

/// Parameters for starting a reconciliation run.
pub struct NewReconciliation {
    pub owner: OwnerId,
    pub account_ref: String,
    pub currency: Currency,
    pub bank_balance: BigDecimal,
    pub book_balance: BigDecimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bank_lines: Vec<BankStatementLine>,
    pub book_transactions: Vec<BookTransaction>,
}

/// Manager for reconciliation documents.
///
/// All mutations go through the stored document as a whole, so the
/// aggregate difference is recomputed from the full item set on every
/// change; partial writes against individual items never happen.
pub struct ReconciliationEngine<S: LedgerStore> {
    storage: S,
    locks: LockManager<S>,
    config: CoreConfig,
}

impl<S: LedgerStore + Clone> ReconciliationEngine<S> {
    pub fn new(storage: S, config: CoreConfig) -> Self {
        Self {
            locks: LockManager::new(storage.clone()),
            storage,
            config,
        }
    }

    /// Run the automatic matcher over the statement and persist the
    /// resulting document in `draft`.
    pub async fn create_reconciliation(
        &self,
        new: NewReconciliation,
        actor: &str,
    ) -> CoreResult<BankReconciliation> {
        let tolerance = new.currency.minor_unit_value();
        let items = match_statement(
            new.bank_lines,
            &new.book_transactions,
            self.config.match_window_days,
            &tolerance,
        );
        let now = Utc::now().naive_utc();

        let reconciliation = BankReconciliation {
            id: Uuid::new_v4(),
            owner: new.owner,
            account_ref: new.account_ref,
            currency: new.currency,
            difference: &new.bank_balance - &new.book_balance,
            bank_balance: new.bank_balance,
            book_balance: new.book_balance,
            status: ReconciliationStatus::Draft,
            start_date: new.start_date,
            end_date: new.end_date,
            items,
            book_transactions: new.book_transactions,
            created_at: now,
            updated_at: now,
        };

        let audit = AuditRecord::new(
            reconciliation.owner.clone(),
            actor,
            AuditAction::Create,
            EntityType::BankReconciliation,
            reconciliation.id.to_string(),
        )
        .with_after(snapshot(&reconciliation)?);

        self.storage
            .save_reconciliation(&reconciliation, &audit)
            .await?;
        debug!(
            account = %reconciliation.account_ref,
            items = reconciliation.items.len(),
            "reconciliation created"
        );
        Ok(reconciliation)
    }

    /// Manually pair an unmatched item with a pooled book transaction.
    pub async fn match_item(
        &self,
        owner: &OwnerId,
        reconciliation_id: Uuid,
        item_id: Uuid,
        book_transaction_id: Uuid,
        actor: &str,
    ) -> CoreResult<BankReconciliation> {
        let mut reconciliation = self.reconciliation_required(owner, reconciliation_id).await?;
        let before = snapshot(&reconciliation)?;

        let index = Self::item_index(&reconciliation, item_id)?;
        if reconciliation.items[index].status != ItemStatus::Unmatched {
            return Err(CoreError::InvalidTransition {
                entity: "reconciliation item",
                from: reconciliation.items[index].status.to_string(),
                attempted: ItemStatus::Matched.to_string(),
            });
        }

        let already_used = reconciliation.items.iter().any(|item| {
            item.book_transaction
                .as_ref()
                .is_some_and(|book| book.id == book_transaction_id)
        });
        let book = reconciliation
            .book_transactions
            .iter()
            .find(|book| book.id == book_transaction_id)
            .cloned();
        let book = match (book, already_used) {
            (Some(book), false) => book,
            _ => return Err(CoreError::BookTransactionNotFound(book_transaction_id)),
        };

        let item = &mut reconciliation.items[index];
        item.difference = &item.bank_transaction.amount - &book.amount;
        item.book_transaction = Some(book);
        item.status = ItemStatus::Matched;

        self.refresh(&mut reconciliation);
        let audit = AuditRecord::new(
            owner.clone(),
            actor,
            AuditAction::Match,
            EntityType::BankReconciliation,
            reconciliation.id.to_string(),
        )
        .with_before(before)
        .with_after(snapshot(&reconciliation)?);

        self.storage
            .update_reconciliation(&reconciliation, &audit)
            .await?;
        Ok(reconciliation)
    }

    /// Settle a matched item.
    ///
    /// A non-zero difference needs an explicit override; the bank
    /// line's date must not fall in a locked Banking period. Settled
    /// items leave the document's open difference.
    pub async fn confirm_reconciled(
        &self,
        owner: &OwnerId,
        reconciliation_id: Uuid,
        item_id: Uuid,
        allow_mismatch: bool,
        actor: &str,
    ) -> CoreResult<BankReconciliation> {
        let mut reconciliation = self.reconciliation_required(owner, reconciliation_id).await?;
        let before = snapshot(&reconciliation)?;

        let index = Self::item_index(&reconciliation, item_id)?;
        let item = &reconciliation.items[index];
        if item.status != ItemStatus::Matched {
            return Err(CoreError::InvalidTransition {
                entity: "reconciliation item",
                from: item.status.to_string(),
                attempted: ItemStatus::Reconciled.to_string(),
            });
        }

        let tolerance = reconciliation.currency.minor_unit_value();
        if item.difference.abs() > tolerance && !allow_mismatch {
            return Err(CoreError::ReconciliationMismatch {
                item_id,
                difference: item.difference.clone(),
            });
        }

        self.locks
            .ensure_unlocked(owner, Module::Banking, item.bank_transaction.date)
            .await?;

        reconciliation.items[index].status = ItemStatus::Reconciled;
        self.refresh(&mut reconciliation);

        let audit = AuditRecord::new(
            owner.clone(),
            actor,
            AuditAction::Reconcile,
            EntityType::BankReconciliation,
            reconciliation.id.to_string(),
        )
        .with_before(before)
        .with_after(snapshot(&reconciliation)?);

        self.storage
            .update_reconciliation(&reconciliation, &audit)
            .await?;
        if reconciliation.status == ReconciliationStatus::Completed {
            info!(account = %reconciliation.account_ref, "reconciliation completed");
        }
        Ok(reconciliation)
    }

    pub async fn get_reconciliation(
        &self,
        owner: &OwnerId,
        id: Uuid,
    ) -> CoreResult<Option<BankReconciliation>> {
        self.storage.get_reconciliation(owner, id).await
    }

    /// Recompute the aggregate difference from the full item set and
    /// derive the document status.
    fn refresh(&self, reconciliation: &mut BankReconciliation) {
        reconciliation.difference = reconciliation.open_difference();
        let tolerance = reconciliation.currency.minor_unit_value();
        reconciliation.status = if reconciliation.difference.abs() < tolerance
            && !reconciliation.has_unmatched_items()
        {
            ReconciliationStatus::Completed
        } else {
            ReconciliationStatus::InProgress
        };
        reconciliation.updated_at = Utc::now().naive_utc();
    }

    fn item_index(reconciliation: &BankReconciliation, item_id: Uuid) -> CoreResult<usize> {
        reconciliation
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or(CoreError::ItemNotFound(item_id))
    }

    async fn reconciliation_required(
        &self,
        owner: &OwnerId,
        id: Uuid,
    ) -> CoreResult<BankReconciliation> {
        self.storage
            .get_reconciliation(owner, id)
            .await?
            .ok_or(CoreError::ReconciliationNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStore;
    use chrono::Days;

    fn manager() -> ReconciliationEngine<MemoryStore> {
        ReconciliationEngine::new(MemoryStore::new(), CoreConfig::default())
    }

    fn owner() -> OwnerId {
        OwnerId::from("acme")
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn run_with(
        bank_lines: Vec<BankStatementLine>,
        book_transactions: Vec<BookTransaction>,
    ) -> NewReconciliation {
        NewReconciliation {
            owner: owner(),
            account_ref: "hdfc-current".to_string(),
            currency: Currency::INR,
            bank_balance: BigDecimal::from(10000),
            book_balance: BigDecimal::from(9800),
            start_date: day(1),
            end_date: day(31),
            bank_lines,
            book_transactions,
        }
    }

    #[tokio::test]
    async fn test_unexplained_line_equals_document_difference() {
        let manager = manager();

        let reconciliation = manager
            .create_reconciliation(
                run_with(
                    vec![BankStatementLine::new(
                        day(15),
                        BigDecimal::from(200),
                        "Bank interest",
                    )],
                    vec![],
                ),
                "jane",
            )
            .await
            .unwrap();

        assert_eq!(reconciliation.status, ReconciliationStatus::Draft);
        assert_eq!(reconciliation.difference, BigDecimal::from(200));
        assert_eq!(reconciliation.items.len(), 1);
        assert_eq!(reconciliation.items[0].status, ItemStatus::Unmatched);
        assert_eq!(reconciliation.items[0].difference, BigDecimal::from(200));
        assert_eq!(reconciliation.difference, reconciliation.open_difference());
    }

    #[tokio::test]
    async fn test_manual_match_recomputes_difference() {
        let manager = manager();
        let book_a = BookTransaction::new(day(10), BigDecimal::from(200), "Interest A");
        let book_b = BookTransaction::new(day(10), BigDecimal::from(200), "Interest B");

        // two equal candidates leave the line unmatched
        let reconciliation = manager
            .create_reconciliation(
                run_with(
                    vec![BankStatementLine::new(
                        day(10),
                        BigDecimal::from(200),
                        "Interest",
                    )],
                    vec![book_a.clone(), book_b],
                ),
                "jane",
            )
            .await
            .unwrap();
        let item_id = reconciliation.items[0].id;
        assert_eq!(reconciliation.items[0].status, ItemStatus::Unmatched);

        let updated = manager
            .match_item(&owner(), reconciliation.id, item_id, book_a.id, "jane")
            .await
            .unwrap();
        assert_eq!(updated.items[0].status, ItemStatus::Matched);
        assert_eq!(updated.items[0].difference, BigDecimal::from(0));
        assert_eq!(updated.difference, BigDecimal::from(0));
        assert_eq!(updated.difference, updated.open_difference());

        // pairing the consumed transaction again is rejected
        let err = manager
            .match_item(&owner(), updated.id, item_id, book_a.id, "jane")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_confirm_settles_and_completes() {
        let manager = manager();
        let book = BookTransaction::new(day(10), BigDecimal::from(200), "Interest");

        let reconciliation = manager
            .create_reconciliation(
                run_with(
                    vec![BankStatementLine::new(
                        day(10),
                        BigDecimal::from(200),
                        "Interest",
                    )],
                    vec![book],
                ),
                "jane",
            )
            .await
            .unwrap();
        let item_id = reconciliation.items[0].id;
        assert_eq!(reconciliation.items[0].status, ItemStatus::Matched);

        let settled = manager
            .confirm_reconciled(&owner(), reconciliation.id, item_id, false, "jane")
            .await
            .unwrap();
        assert_eq!(settled.items[0].status, ItemStatus::Reconciled);
        assert_eq!(settled.difference, BigDecimal::from(0));
        assert_eq!(settled.status, ReconciliationStatus::Completed);
    }

    #[tokio::test]
    async fn test_confirm_with_residual_difference_needs_override() {
        let manager = manager();
        let book = BookTransaction::new(day(10), "199.99".parse().unwrap(), "Interest");
        let bank = BankStatementLine::new(day(10), BigDecimal::from(200), "Interest");

        let reconciliation = manager
            .create_reconciliation(run_with(vec![bank], vec![book]), "jane")
            .await
            .unwrap();
        let item_id = reconciliation.items[0].id;
        // within one minor unit, so the matcher paired it
        assert_eq!(reconciliation.items[0].status, ItemStatus::Matched);

        // widen the residual beyond the tolerance by manual pairing
        let manager2 = manager;
        let book_far = BookTransaction::new(day(10), BigDecimal::from(150), "Part payment");
        let bank_far = BankStatementLine::new(day(10), BigDecimal::from(200), "Round up");
        let second = manager2
            .create_reconciliation(run_with(vec![bank_far], vec![book_far.clone()]), "jane")
            .await
            .unwrap();
        let second_item = second.items[0].id;
        assert_eq!(second.items[0].status, ItemStatus::Unmatched);
        manager2
            .match_item(&owner(), second.id, second_item, book_far.id, "jane")
            .await
            .unwrap();

        let err = manager2
            .confirm_reconciled(&owner(), second.id, second_item, false, "jane")
            .await
            .unwrap_err();
        match err {
            CoreError::ReconciliationMismatch { difference, .. } => {
                assert_eq!(difference, BigDecimal::from(50));
            }
            other => panic!("expected mismatch error, got {other:?}"),
        }

        // the override settles it
        let settled = manager2
            .confirm_reconciled(&owner(), second.id, second_item, true, "jane")
            .await
            .unwrap();
        assert_eq!(settled.items[0].status, ItemStatus::Reconciled);
        // a settled residual leaves the open difference
        assert_eq!(settled.difference, BigDecimal::from(0));

        // the near-tolerance item from the first run settles without override
        manager2
            .confirm_reconciled(&owner(), reconciliation.id, item_id, false, "jane")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_confirm_blocked_by_banking_lock() {
        let storage = MemoryStore::new();
        let manager = ReconciliationEngine::new(storage.clone(), CoreConfig::default());
        let locks = LockManager::new(storage);
        let today = Utc::now().date_naive();
        let line_date = today - Days::new(5);

        let book = BookTransaction::new(line_date, BigDecimal::from(200), "Interest");
        let mut new = run_with(
            vec![BankStatementLine::new(
                line_date,
                BigDecimal::from(200),
                "Interest",
            )],
            vec![book],
        );
        new.start_date = line_date;
        new.end_date = today;
        let reconciliation = manager.create_reconciliation(new, "jane").await.unwrap();
        let item_id = reconciliation.items[0].id;

        locks
            .lock(&owner(), Module::Banking, today, "close", "jane")
            .await
            .unwrap();

        let err = manager
            .confirm_reconciled(&owner(), reconciliation.id, item_id, false, "jane")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::LockViolation {
                module: Module::Banking,
                ..
            }
        ));
    }
}
