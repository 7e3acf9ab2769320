//! Journal entry lifecycle: draft, post, reverse

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{snapshot, AuditAction, AuditRecord, EntityType};
use crate::currency::Currency;
use crate::journal::validation::compute_totals;
use crate::locks::LockManager;
use crate::sequence::{DocumentKind, SequenceGenerator};
use crate::traits::{DefaultEntryValidator, EntryValidator, LedgerStore};
use crate::types::*;

/// Parameters for drafting a journal entry.
pub struct NewJournalEntry {
    pub owner: OwnerId,
    pub date: NaiveDate,
    pub description: String,
    pub source: SourceRef,
    pub currency: Currency,
    pub line_items: Vec<LineItem>,
}

/// Manager for the journal entry lifecycle.
///
/// Entries are drafted freely, but posting runs the full gauntlet:
/// double-entry validation, then the period-lock check on the entry's
/// effective date, then an atomic persist of the status change and its
/// audit record. A failed step leaves the stored entry untouched.
pub struct JournalManager<S: LedgerStore> {
    storage: S,
    sequences: SequenceGenerator<S>,
    locks: LockManager<S>,
    validator: Box<dyn EntryValidator>,
    config: CoreConfig,
}

impl<S: LedgerStore + Clone> JournalManager<S> {
    pub fn new(storage: S, config: CoreConfig) -> Self {
        Self {
            sequences: SequenceGenerator::new(storage.clone()),
            locks: LockManager::new(storage.clone()),
            storage,
            validator: Box::new(DefaultEntryValidator),
            config,
        }
    }

    pub fn with_validator(
        storage: S,
        config: CoreConfig,
        validator: Box<dyn EntryValidator>,
    ) -> Self {
        Self {
            sequences: SequenceGenerator::new(storage.clone()),
            locks: LockManager::new(storage.clone()),
            storage,
            validator,
            config,
        }
    }

    /// Draft a new entry with the next owner-scoped entry number.
    pub async fn create_entry(
        &self,
        new_entry: NewJournalEntry,
        actor: &str,
    ) -> CoreResult<JournalEntry> {
        let entry_number = self
            .sequences
            .next(&new_entry.owner, DocumentKind::JournalEntry)
            .await?;
        let totals = compute_totals(&new_entry.line_items);
        let now = Utc::now().naive_utc();

        let entry = JournalEntry {
            id: Uuid::new_v4(),
            owner: new_entry.owner,
            entry_number,
            date: new_entry.date,
            description: new_entry.description,
            source: new_entry.source,
            status: EntryStatus::Draft,
            currency: new_entry.currency,
            total_debit: totals.total_debit,
            total_credit: totals.total_credit,
            line_items: new_entry.line_items,
            created_at: now,
            updated_at: now,
        };

        let audit = AuditRecord::new(
            entry.owner.clone(),
            actor,
            AuditAction::Create,
            EntityType::JournalEntry,
            entry.id.to_string(),
        )
        .with_after(snapshot(&entry)?);

        self.storage.save_journal_entry(&entry, &audit).await?;
        debug!(entry_number = %entry.entry_number, "journal entry drafted");
        Ok(entry)
    }

    /// Post a draft entry.
    ///
    /// Validation failures return the complete report and mutate
    /// nothing; a locked period rejects with the lock boundary.
    pub async fn post_entry(
        &self,
        owner: &OwnerId,
        id: Uuid,
        actor: &str,
    ) -> CoreResult<JournalEntry> {
        let mut entry = self.entry_required(owner, id).await?;
        if entry.status != EntryStatus::Draft {
            return Err(CoreError::InvalidTransition {
                entity: "journal entry",
                from: entry.status.to_string(),
                attempted: EntryStatus::Posted.to_string(),
            });
        }

        let report = self
            .validator
            .validate(&entry.line_items, &self.config.balance_tolerance);
        if !report.is_valid {
            return Err(CoreError::Validation(report));
        }

        self.locks
            .ensure_unlocked(owner, entry.module(), entry.date)
            .await?;

        let before = snapshot(&entry)?;
        let totals = compute_totals(&entry.line_items);
        entry.total_debit = totals.total_debit;
        entry.total_credit = totals.total_credit;
        entry.status = EntryStatus::Posted;
        entry.updated_at = Utc::now().naive_utc();

        let audit = AuditRecord::new(
            owner.clone(),
            actor,
            AuditAction::Post,
            EntityType::JournalEntry,
            entry.id.to_string(),
        )
        .with_before(before)
        .with_after(snapshot(&entry)?);

        self.storage.update_journal_entry(&entry, &audit).await?;
        info!(entry_number = %entry.entry_number, "journal entry posted");
        Ok(entry)
    }

    /// Reverse a posted entry by creating a mirrored compensating entry.
    ///
    /// The original is never deleted; it transitions to `reversed` and
    /// the compensating entry is posted in the same storage operation.
    /// The reversal carries the original's date, so reversing into a
    /// locked period is rejected like any other mutation.
    pub async fn reverse_entry(
        &self,
        owner: &OwnerId,
        id: Uuid,
        reason: &str,
        actor: &str,
    ) -> CoreResult<JournalEntry> {
        if reason.trim().is_empty() {
            return Err(CoreError::EmptyReason);
        }

        let mut original = self.entry_required(owner, id).await?;
        if original.status != EntryStatus::Posted {
            return Err(CoreError::InvalidTransition {
                entity: "journal entry",
                from: original.status.to_string(),
                attempted: EntryStatus::Reversed.to_string(),
            });
        }

        self.locks
            .ensure_unlocked(owner, original.module(), original.date)
            .await?;

        let entry_number = self.sequences.next(owner, DocumentKind::JournalEntry).await?;
        let now = Utc::now().naive_utc();
        let mirrored: Vec<LineItem> = original
            .line_items
            .iter()
            .map(|line| LineItem {
                account_ref: line.account_ref.clone(),
                debit: line.credit.clone(),
                credit: line.debit.clone(),
                currency: line.currency,
                exchange_rate: line.exchange_rate.clone(),
                base_amount: line.base_amount.clone(),
                description: line.description.clone(),
            })
            .collect();

        let reversal = JournalEntry {
            id: Uuid::new_v4(),
            owner: owner.clone(),
            entry_number,
            date: original.date,
            description: format!("Reversal of {}: {}", original.entry_number, reason),
            source: SourceRef::new(SourceKind::Reversal, original.entry_number.clone()),
            status: EntryStatus::Posted,
            currency: original.currency,
            total_debit: original.total_credit.clone(),
            total_credit: original.total_debit.clone(),
            line_items: mirrored,
            created_at: now,
            updated_at: now,
        };

        let before = snapshot(&original)?;
        original.status = EntryStatus::Reversed;
        original.updated_at = now;

        let audit_reversed = AuditRecord::new(
            owner.clone(),
            actor,
            AuditAction::Reverse,
            EntityType::JournalEntry,
            original.id.to_string(),
        )
        .with_before(before)
        .with_after(snapshot(&original)?);
        let audit_created = AuditRecord::new(
            owner.clone(),
            actor,
            AuditAction::Create,
            EntityType::JournalEntry,
            reversal.id.to_string(),
        )
        .with_after(snapshot(&reversal)?);

        self.storage
            .save_reversal(&original, &reversal, &audit_reversed, &audit_created)
            .await?;
        info!(
            original = %original.entry_number,
            reversal = %reversal.entry_number,
            "journal entry reversed"
        );
        Ok(reversal)
    }

    pub async fn get_entry(&self, owner: &OwnerId, id: Uuid) -> CoreResult<Option<JournalEntry>> {
        self.storage.get_journal_entry(owner, id).await
    }

    pub async fn list_entries(
        &self,
        owner: &OwnerId,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> CoreResult<Vec<JournalEntry>> {
        self.storage
            .list_journal_entries(owner, start_date, end_date)
            .await
    }

    async fn entry_required(&self, owner: &OwnerId, id: Uuid) -> CoreResult<JournalEntry> {
        self.storage
            .get_journal_entry(owner, id)
            .await?
            .ok_or(CoreError::EntryNotFound(id))
    }
}
