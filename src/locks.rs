//! Period locking for accounting modules
//!
//! A lock freezes every transaction dated on or before its lock date
//! for one (owner, module) pair. At most one active lock record exists
//! per pair; the absence of a record is the unlocked state. A partial
//! unlock opens a dated exception window inside an otherwise locked
//! period without creating a second record.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::audit::{snapshot, AuditAction, AuditRecord, EntityType};
use crate::traits::LedgerStore;
use crate::types::{CoreError, CoreResult, Module, OwnerId};

/// Lock lifecycle. `Unlocked` is never persisted; it is what the
/// absence of an active record means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStatus {
    Unlocked,
    Locked,
    PartiallyUnlocked,
}

impl std::fmt::Display for LockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LockStatus::Unlocked => "unlocked",
            LockStatus::Locked => "locked",
            LockStatus::PartiallyUnlocked => "partially_unlocked",
        };
        f.write_str(name)
    }
}

/// The single live lock record for an (owner, module) pair.
///
/// Re-locking and partial unlocking mutate this record in place; a new
/// record is only created after a full unlock removed the old one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLock {
    pub id: Uuid,
    pub owner: OwnerId,
    pub module: Module,
    pub status: LockStatus,
    /// Transactions dated on or before this day are frozen.
    pub lock_date: NaiveDate,
    pub reason: String,
    pub partial_unlock_from: Option<NaiveDate>,
    pub partial_unlock_to: Option<NaiveDate>,
    pub partial_unlock_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TransactionLock {
    fn new(owner: OwnerId, module: Module, lock_date: NaiveDate, reason: &str) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            owner,
            module,
            status: LockStatus::Locked,
            lock_date,
            reason: reason.to_string(),
            partial_unlock_from: None,
            partial_unlock_to: None,
            partial_unlock_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a transaction dated `date` is frozen by this lock.
    ///
    /// A partial unlock carves its window out of the locked range;
    /// everything else on or before the lock date stays frozen.
    pub fn covers(&self, date: NaiveDate) -> bool {
        if date > self.lock_date {
            return false;
        }
        if self.status == LockStatus::PartiallyUnlocked {
            if let (Some(from), Some(to)) = (self.partial_unlock_from, self.partial_unlock_to) {
                if date >= from && date <= to {
                    return false;
                }
            }
        }
        true
    }
}

/// State machine driver for period locks.
///
/// Every other manager in the core calls [`LockManager::ensure_unlocked`]
/// with a transaction's effective date and module before mutating.
pub struct LockManager<S: LedgerStore> {
    storage: S,
}

impl<S: LedgerStore> LockManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Lock a module through `lock_date` (inclusive).
    ///
    /// The date comparison is calendar-day granular, so today is always
    /// lockable. The existence check and the insert are a single storage
    /// operation: of two concurrent callers exactly one succeeds and the
    /// other receives `DuplicateLock`.
    pub async fn lock(
        &self,
        owner: &OwnerId,
        module: Module,
        lock_date: NaiveDate,
        reason: &str,
        actor: &str,
    ) -> CoreResult<TransactionLock> {
        let today = Utc::now().date_naive();
        if lock_date > today {
            return Err(CoreError::LockDateInFuture { lock_date, today });
        }
        if reason.trim().is_empty() {
            return Err(CoreError::EmptyReason);
        }

        let lock = TransactionLock::new(owner.clone(), module, lock_date, reason);
        let audit = AuditRecord::new(
            owner.clone(),
            actor,
            AuditAction::Lock,
            EntityType::TransactionLock,
            lock.id.to_string(),
        )
        .with_after(snapshot(&lock)?);

        self.storage.create_lock(&lock, &audit).await?;
        info!(%module, %lock_date, "module locked");
        Ok(lock)
    }

    /// Open an exception window `[from, to]` inside a locked period.
    ///
    /// Only valid from the `locked` state; the window must be ordered
    /// and end on or before the lock date. The record is mutated in
    /// place, never duplicated.
    pub async fn partially_unlock(
        &self,
        owner: &OwnerId,
        module: Module,
        from: NaiveDate,
        to: NaiveDate,
        reason: &str,
        actor: &str,
    ) -> CoreResult<TransactionLock> {
        if reason.trim().is_empty() {
            return Err(CoreError::EmptyReason);
        }

        let mut lock = self.active_lock_required(owner, module).await?;
        if lock.status != LockStatus::Locked {
            return Err(CoreError::InvalidTransition {
                entity: "transaction lock",
                from: lock.status.to_string(),
                attempted: LockStatus::PartiallyUnlocked.to_string(),
            });
        }
        if from > to || to > lock.lock_date {
            return Err(CoreError::InvalidUnlockWindow {
                from,
                to,
                lock_date: lock.lock_date,
            });
        }

        let before = snapshot(&lock)?;
        lock.status = LockStatus::PartiallyUnlocked;
        lock.partial_unlock_from = Some(from);
        lock.partial_unlock_to = Some(to);
        lock.partial_unlock_reason = Some(reason.to_string());
        lock.updated_at = Utc::now().naive_utc();

        let audit = AuditRecord::new(
            owner.clone(),
            actor,
            AuditAction::PartialUnlock,
            EntityType::TransactionLock,
            lock.id.to_string(),
        )
        .with_before(before)
        .with_after(snapshot(&lock)?);

        self.storage.update_lock(&lock, &audit).await?;
        info!(%module, %from, %to, "partial unlock window opened");
        Ok(lock)
    }

    /// Close the exception window and return to the fully locked state.
    pub async fn relock(
        &self,
        owner: &OwnerId,
        module: Module,
        actor: &str,
    ) -> CoreResult<TransactionLock> {
        let mut lock = self.active_lock_required(owner, module).await?;
        if lock.status != LockStatus::PartiallyUnlocked {
            return Err(CoreError::InvalidTransition {
                entity: "transaction lock",
                from: lock.status.to_string(),
                attempted: LockStatus::Locked.to_string(),
            });
        }

        let before = snapshot(&lock)?;
        lock.status = LockStatus::Locked;
        lock.partial_unlock_from = None;
        lock.partial_unlock_to = None;
        lock.partial_unlock_reason = None;
        lock.updated_at = Utc::now().naive_utc();

        let audit = AuditRecord::new(
            owner.clone(),
            actor,
            AuditAction::Relock,
            EntityType::TransactionLock,
            lock.id.to_string(),
        )
        .with_before(before)
        .with_after(snapshot(&lock)?);

        self.storage.update_lock(&lock, &audit).await?;
        info!(%module, "partial unlock window closed");
        Ok(lock)
    }

    /// Remove the active lock record; the pair returns to unlocked.
    pub async fn unlock(&self, owner: &OwnerId, module: Module, actor: &str) -> CoreResult<()> {
        let lock = self.active_lock_required(owner, module).await?;

        let audit = AuditRecord::new(
            owner.clone(),
            actor,
            AuditAction::Unlock,
            EntityType::TransactionLock,
            lock.id.to_string(),
        )
        .with_before(snapshot(&lock)?);

        self.storage.remove_lock(owner, module, &audit).await?;
        info!(%module, "module unlocked");
        Ok(())
    }

    /// Current lock state, `Unlocked` when no active record exists.
    pub async fn status(&self, owner: &OwnerId, module: Module) -> CoreResult<LockStatus> {
        Ok(self
            .storage
            .get_active_lock(owner, module)
            .await?
            .map(|lock| lock.status)
            .unwrap_or(LockStatus::Unlocked))
    }

    pub async fn get_active_lock(
        &self,
        owner: &OwnerId,
        module: Module,
    ) -> CoreResult<Option<TransactionLock>> {
        self.storage.get_active_lock(owner, module).await
    }

    /// Whether a transaction dated `date` may not be mutated.
    pub async fn is_date_locked(
        &self,
        owner: &OwnerId,
        module: Module,
        date: NaiveDate,
    ) -> CoreResult<bool> {
        Ok(self
            .storage
            .get_active_lock(owner, module)
            .await?
            .map(|lock| lock.covers(date))
            .unwrap_or(false))
    }

    /// Reject with `LockViolation` when `date` falls in a locked period.
    pub async fn ensure_unlocked(
        &self,
        owner: &OwnerId,
        module: Module,
        date: NaiveDate,
    ) -> CoreResult<()> {
        if let Some(lock) = self.storage.get_active_lock(owner, module).await? {
            if lock.covers(date) {
                return Err(CoreError::LockViolation {
                    module,
                    lock_date: lock.lock_date,
                    date,
                });
            }
        }
        Ok(())
    }

    async fn active_lock_required(
        &self,
        owner: &OwnerId,
        module: Module,
    ) -> CoreResult<TransactionLock> {
        self.storage
            .get_active_lock(owner, module)
            .await?
            .ok_or(CoreError::LockNotFound { module })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStore;
    use chrono::Days;

    fn manager() -> LockManager<MemoryStore> {
        LockManager::new(MemoryStore::new())
    }

    fn owner() -> OwnerId {
        OwnerId::from("acme")
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_lock_today_succeeds() {
        let manager = manager();
        let today = Utc::now().date_naive();

        let lock = manager
            .lock(&owner(), Module::Sales, today, "month close", "jane")
            .await
            .unwrap();
        assert_eq!(lock.status, LockStatus::Locked);
        assert_eq!(
            manager.status(&owner(), Module::Sales).await.unwrap(),
            LockStatus::Locked
        );
    }

    #[tokio::test]
    async fn test_lock_future_date_fails() {
        let manager = manager();
        let tomorrow = Utc::now().date_naive().checked_add_days(Days::new(1)).unwrap();

        let err = manager
            .lock(&owner(), Module::Sales, tomorrow, "too eager", "jane")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::LockDateInFuture { .. }));
    }

    #[tokio::test]
    async fn test_lock_requires_reason() {
        let manager = manager();
        let today = Utc::now().date_naive();

        let err = manager
            .lock(&owner(), Module::Sales, today, "  ", "jane")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::EmptyReason));
    }

    #[tokio::test]
    async fn test_double_lock_fails() {
        let manager = manager();
        let today = Utc::now().date_naive();

        manager
            .lock(&owner(), Module::Sales, today, "month close", "jane")
            .await
            .unwrap();
        let err = manager
            .lock(&owner(), Module::Sales, today, "again", "jane")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateLock { module: Module::Sales }));

        // a different module of the same owner is unaffected
        manager
            .lock(&owner(), Module::Purchases, today, "month close", "jane")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_lock_yields_one_winner() {
        let storage = MemoryStore::new();
        let today = Utc::now().date_naive();

        let a = LockManager::new(storage.clone());
        let b = LockManager::new(storage);
        let o = owner();
        let (ra, rb) = tokio::join!(
            a.lock(&o, Module::Banking, today, "close", "jane"),
            b.lock(&o, Module::Banking, today, "close", "john"),
        );

        assert_eq!(
            [ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_is_date_locked_boundaries() {
        let manager = manager();
        let today = Utc::now().date_naive();
        manager
            .lock(&owner(), Module::Sales, today, "close", "jane")
            .await
            .unwrap();

        // everything on or before the lock date is frozen
        assert!(manager
            .is_date_locked(&owner(), Module::Sales, today)
            .await
            .unwrap());
        assert!(manager
            .is_date_locked(&owner(), Module::Sales, today - Days::new(90))
            .await
            .unwrap());
        // anything after it is open
        assert!(!manager
            .is_date_locked(&owner(), Module::Sales, today + Days::new(1))
            .await
            .unwrap());
        // an unlocked module reports false
        assert!(!manager
            .is_date_locked(&owner(), Module::Banking, today)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_partial_unlock_window_carve_out() {
        let manager = manager();
        let today = Utc::now().date_naive();
        let from = today - Days::new(20);
        let to = today - Days::new(10);

        manager
            .lock(&owner(), Module::Accountant, today, "close", "jane")
            .await
            .unwrap();
        let lock = manager
            .partially_unlock(&owner(), Module::Accountant, from, to, "correction", "jane")
            .await
            .unwrap();
        assert_eq!(lock.status, LockStatus::PartiallyUnlocked);

        // inside the window the period is open again
        assert!(!manager
            .is_date_locked(&owner(), Module::Accountant, from)
            .await
            .unwrap());
        assert!(!manager
            .is_date_locked(&owner(), Module::Accountant, to)
            .await
            .unwrap());
        // either side of the window stays frozen
        assert!(manager
            .is_date_locked(&owner(), Module::Accountant, from - Days::new(1))
            .await
            .unwrap());
        assert!(manager
            .is_date_locked(&owner(), Module::Accountant, to + Days::new(1))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_partial_unlock_rejects_bad_windows() {
        let manager = manager();
        let today = Utc::now().date_naive();
        manager
            .lock(&owner(), Module::Sales, today - Days::new(5), "close", "jane")
            .await
            .unwrap();

        // from > to
        let err = manager
            .partially_unlock(
                &owner(),
                Module::Sales,
                today - Days::new(6),
                today - Days::new(8),
                "oops",
                "jane",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidUnlockWindow { .. }));

        // to beyond the lock date
        let err = manager
            .partially_unlock(
                &owner(),
                Module::Sales,
                today - Days::new(8),
                today - Days::new(4),
                "oops",
                "jane",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidUnlockWindow { .. }));
    }

    #[tokio::test]
    async fn test_partial_unlock_requires_locked_state() {
        let manager = manager();
        let today = Utc::now().date_naive();
        let from = today - Days::new(3);
        let to = today - Days::new(1);

        // no lock at all
        let err = manager
            .partially_unlock(&owner(), Module::Sales, from, to, "r", "jane")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::LockNotFound { .. }));

        manager
            .lock(&owner(), Module::Sales, today, "close", "jane")
            .await
            .unwrap();
        manager
            .partially_unlock(&owner(), Module::Sales, from, to, "r", "jane")
            .await
            .unwrap();

        // a second partial unlock from the partially_unlocked state is rejected
        let err = manager
            .partially_unlock(&owner(), Module::Sales, from, to, "r", "jane")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_relock_closes_window_in_place() {
        let manager = manager();
        let today = Utc::now().date_naive();
        let from = today - Days::new(3);
        let to = today - Days::new(1);

        let original = manager
            .lock(&owner(), Module::Sales, today, "close", "jane")
            .await
            .unwrap();
        manager
            .partially_unlock(&owner(), Module::Sales, from, to, "r", "jane")
            .await
            .unwrap();
        let relocked = manager.relock(&owner(), Module::Sales, "jane").await.unwrap();

        // same record, window cleared
        assert_eq!(relocked.id, original.id);
        assert_eq!(relocked.status, LockStatus::Locked);
        assert!(relocked.partial_unlock_from.is_none());
        assert!(manager
            .is_date_locked(&owner(), Module::Sales, from)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unlock_removes_record() {
        let manager = manager();
        let today = Utc::now().date_naive();

        manager
            .lock(&owner(), Module::Sales, today, "close", "jane")
            .await
            .unwrap();
        manager.unlock(&owner(), Module::Sales, "jane").await.unwrap();

        assert_eq!(
            manager.status(&owner(), Module::Sales).await.unwrap(),
            LockStatus::Unlocked
        );
        assert!(!manager
            .is_date_locked(&owner(), Module::Sales, today)
            .await
            .unwrap());
        // the pair can be locked again afterwards
        manager
            .lock(&owner(), Module::Sales, today, "re-close", "jane")
            .await
            .unwrap();
    }

    #[test]
    fn test_covers_is_day_granular() {
        let lock = TransactionLock::new(owner(), Module::Sales, day(2024, 1, 31), "close");
        assert!(lock.covers(day(2024, 1, 31)));
        assert!(lock.covers(day(2024, 1, 15)));
        assert!(!lock.covers(day(2024, 2, 1)));
    }
}
