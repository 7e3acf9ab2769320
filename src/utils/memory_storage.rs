//! In-memory storage implementation for testing and development

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::adjustment::CurrencyAdjustment;
use crate::audit::{AuditRecord, EntityType};
use crate::locks::TransactionLock;
use crate::reconciliation::BankReconciliation;
use crate::sequence::DocumentKind;
use crate::traits::LedgerStore;
use crate::types::*;

#[derive(Debug, Default)]
struct Inner {
    sequences: HashMap<(OwnerId, DocumentKind), u64>,
    entries: HashMap<(OwnerId, Uuid), JournalEntry>,
    adjustments: HashMap<(OwnerId, Uuid), CurrencyAdjustment>,
    locks: HashMap<(OwnerId, Module), TransactionLock>,
    reconciliations: HashMap<(OwnerId, Uuid), BankReconciliation>,
    audit_trail: Vec<AuditRecord>,
}

/// In-memory store for testing and development.
///
/// All state lives behind a single `RwLock`, so every compound
/// operation (mutation plus its audit record, the conditional lock
/// insert, the sequence increment) is one critical section.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing).
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        *inner = Inner::default();
    }

    /// Number of audit records in the trail (useful for testing).
    pub fn audit_len(&self) -> usize {
        self.inner.read().unwrap().audit_trail.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn next_sequence(&self, owner: &OwnerId, kind: DocumentKind) -> CoreResult<u64> {
        let mut inner = self.inner.write().unwrap();
        let counter = inner.sequences.entry((owner.clone(), kind)).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn save_journal_entry(
        &self,
        entry: &JournalEntry,
        audit: &AuditRecord,
    ) -> CoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        inner
            .entries
            .insert((entry.owner.clone(), entry.id), entry.clone());
        inner.audit_trail.push(audit.clone());
        Ok(())
    }

    async fn get_journal_entry(
        &self,
        owner: &OwnerId,
        id: Uuid,
    ) -> CoreResult<Option<JournalEntry>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.entries.get(&(owner.clone(), id)).cloned())
    }

    async fn update_journal_entry(
        &self,
        entry: &JournalEntry,
        audit: &AuditRecord,
    ) -> CoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        let key = (entry.owner.clone(), entry.id);
        if !inner.entries.contains_key(&key) {
            return Err(CoreError::EntryNotFound(entry.id));
        }
        inner.entries.insert(key, entry.clone());
        inner.audit_trail.push(audit.clone());
        Ok(())
    }

    async fn save_reversal(
        &self,
        reversed: &JournalEntry,
        reversal: &JournalEntry,
        audit_reversed: &AuditRecord,
        audit_created: &AuditRecord,
    ) -> CoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        let key = (reversed.owner.clone(), reversed.id);
        if !inner.entries.contains_key(&key) {
            return Err(CoreError::EntryNotFound(reversed.id));
        }
        inner.entries.insert(key, reversed.clone());
        inner
            .entries
            .insert((reversal.owner.clone(), reversal.id), reversal.clone());
        inner.audit_trail.push(audit_reversed.clone());
        inner.audit_trail.push(audit_created.clone());
        Ok(())
    }

    async fn list_journal_entries(
        &self,
        owner: &OwnerId,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> CoreResult<Vec<JournalEntry>> {
        let inner = self.inner.read().unwrap();
        let mut entries: Vec<JournalEntry> = inner
            .entries
            .iter()
            .filter(|((entry_owner, _), _)| entry_owner == owner)
            .map(|(_, entry)| entry)
            .filter(|entry| {
                if let Some(start) = start_date {
                    if entry.date < start {
                        return false;
                    }
                }
                if let Some(end) = end_date {
                    if entry.date > end {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.entry_number.cmp(&b.entry_number));
        Ok(entries)
    }

    async fn save_adjustment(
        &self,
        adjustment: &CurrencyAdjustment,
        audit: &AuditRecord,
    ) -> CoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        inner
            .adjustments
            .insert((adjustment.owner.clone(), adjustment.id), adjustment.clone());
        inner.audit_trail.push(audit.clone());
        Ok(())
    }

    async fn get_adjustment(
        &self,
        owner: &OwnerId,
        id: Uuid,
    ) -> CoreResult<Option<CurrencyAdjustment>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.adjustments.get(&(owner.clone(), id)).cloned())
    }

    async fn update_adjustment(
        &self,
        adjustment: &CurrencyAdjustment,
        audit: &AuditRecord,
    ) -> CoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        let key = (adjustment.owner.clone(), adjustment.id);
        if !inner.adjustments.contains_key(&key) {
            return Err(CoreError::AdjustmentNotFound(adjustment.id));
        }
        inner.adjustments.insert(key, adjustment.clone());
        inner.audit_trail.push(audit.clone());
        Ok(())
    }

    async fn create_lock(&self, lock: &TransactionLock, audit: &AuditRecord) -> CoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        let key = (lock.owner.clone(), lock.module);
        if inner.locks.contains_key(&key) {
            return Err(CoreError::DuplicateLock {
                module: lock.module,
            });
        }
        inner.locks.insert(key, lock.clone());
        inner.audit_trail.push(audit.clone());
        Ok(())
    }

    async fn get_active_lock(
        &self,
        owner: &OwnerId,
        module: Module,
    ) -> CoreResult<Option<TransactionLock>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.locks.get(&(owner.clone(), module)).cloned())
    }

    async fn update_lock(&self, lock: &TransactionLock, audit: &AuditRecord) -> CoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        let key = (lock.owner.clone(), lock.module);
        if !inner.locks.contains_key(&key) {
            return Err(CoreError::LockNotFound {
                module: lock.module,
            });
        }
        inner.locks.insert(key, lock.clone());
        inner.audit_trail.push(audit.clone());
        Ok(())
    }

    async fn remove_lock(
        &self,
        owner: &OwnerId,
        module: Module,
        audit: &AuditRecord,
    ) -> CoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.locks.remove(&(owner.clone(), module)).is_none() {
            return Err(CoreError::LockNotFound { module });
        }
        inner.audit_trail.push(audit.clone());
        Ok(())
    }

    async fn save_reconciliation(
        &self,
        reconciliation: &BankReconciliation,
        audit: &AuditRecord,
    ) -> CoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        inner.reconciliations.insert(
            (reconciliation.owner.clone(), reconciliation.id),
            reconciliation.clone(),
        );
        inner.audit_trail.push(audit.clone());
        Ok(())
    }

    async fn get_reconciliation(
        &self,
        owner: &OwnerId,
        id: Uuid,
    ) -> CoreResult<Option<BankReconciliation>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.reconciliations.get(&(owner.clone(), id)).cloned())
    }

    async fn update_reconciliation(
        &self,
        reconciliation: &BankReconciliation,
        audit: &AuditRecord,
    ) -> CoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        let key = (reconciliation.owner.clone(), reconciliation.id);
        if !inner.reconciliations.contains_key(&key) {
            return Err(CoreError::ReconciliationNotFound(reconciliation.id));
        }
        inner.reconciliations.insert(key, reconciliation.clone());
        inner.audit_trail.push(audit.clone());
        Ok(())
    }

    async fn append_audit(&self, record: &AuditRecord) -> CoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        inner.audit_trail.push(record.clone());
        Ok(())
    }

    async fn list_audit_records(
        &self,
        owner: &OwnerId,
        entity_type: Option<EntityType>,
    ) -> CoreResult<Vec<AuditRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .audit_trail
            .iter()
            .filter(|record| &record.owner == owner)
            .filter(|record| entity_type.is_none_or(|t| record.entity_type == t))
            .cloned()
            .collect())
    }
}
