//! Currency revaluation adjustments
//!
//! An adjustment records the difference between an amount converted at
//! the current rate and its baseline at the previously recorded rate.
//! It is created pending, then approved or rejected; approval of a
//! non-neutral adjustment is realized in the ledger as a journal entry.
//! Adjustments are never hard-deleted.

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::audit::{snapshot, AuditAction, AuditRecord, EntityType};
use crate::currency::{Currency, CurrencyConverter, GainLossKind};
use crate::locks::LockManager;
use crate::sequence::{DocumentKind, SequenceGenerator};
use crate::traits::LedgerStore;
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for AdjustmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AdjustmentStatus::Pending => "pending",
            AdjustmentStatus::Approved => "approved",
            AdjustmentStatus::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyAdjustment {
    pub id: Uuid,
    pub owner: OwnerId,
    /// Owner-scoped sequential reference, e.g. `CA-000007`.
    pub reference_number: String,
    pub date: NaiveDate,
    pub account_ref: String,
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub original_amount: BigDecimal,
    pub exchange_rate: BigDecimal,
    pub converted_amount: BigDecimal,
    pub adjustment_type: GainLossKind,
    /// Signed gain (+) or loss (-) against the baseline.
    pub amount: BigDecimal,
    pub status: AdjustmentStatus,
    pub approver: Option<String>,
    pub approved_at: Option<NaiveDateTime>,
    pub rejection_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Parameters for creating a revaluation adjustment.
pub struct NewAdjustment {
    pub owner: OwnerId,
    pub date: NaiveDate,
    pub account_ref: String,
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub original_amount: BigDecimal,
    /// Rate the amount was previously recorded at (the baseline).
    pub book_rate: BigDecimal,
    /// Current rate to revalue at.
    pub exchange_rate: BigDecimal,
}

/// Manager for the adjustment lifecycle.
pub struct AdjustmentManager<S: LedgerStore> {
    storage: S,
    sequences: SequenceGenerator<S>,
    locks: LockManager<S>,
    converter: CurrencyConverter,
    config: CoreConfig,
}

impl<S: LedgerStore + Clone> AdjustmentManager<S> {
    pub fn new(storage: S, config: CoreConfig) -> Self {
        Self {
            sequences: SequenceGenerator::new(storage.clone()),
            locks: LockManager::new(storage.clone()),
            storage,
            converter: CurrencyConverter::new(config.neutral_tolerance.clone()),
            config,
        }
    }

    /// Create a pending adjustment, converting and classifying against
    /// the baseline. Both rates must be positive.
    pub async fn create_adjustment(
        &self,
        new: NewAdjustment,
        actor: &str,
    ) -> CoreResult<CurrencyAdjustment> {
        let converted = self.converter.convert(
            &new.original_amount,
            new.from_currency,
            new.to_currency,
            &new.exchange_rate,
        )?;
        let expected = self.converter.convert(
            &new.original_amount,
            new.from_currency,
            new.to_currency,
            &new.book_rate,
        )?;
        let adjustment_type = self.converter.classify(&expected, &converted);
        let amount = &converted - &expected;

        let reference_number = self
            .sequences
            .next(&new.owner, DocumentKind::CurrencyAdjustment)
            .await?;
        let now = Utc::now().naive_utc();

        let adjustment = CurrencyAdjustment {
            id: Uuid::new_v4(),
            owner: new.owner,
            reference_number,
            date: new.date,
            account_ref: new.account_ref,
            from_currency: new.from_currency,
            to_currency: new.to_currency,
            original_amount: new.original_amount,
            exchange_rate: new.exchange_rate,
            converted_amount: converted,
            adjustment_type,
            amount,
            status: AdjustmentStatus::Pending,
            approver: None,
            approved_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };

        let audit = AuditRecord::new(
            adjustment.owner.clone(),
            actor,
            AuditAction::Create,
            EntityType::CurrencyAdjustment,
            adjustment.id.to_string(),
        )
        .with_after(snapshot(&adjustment)?);

        self.storage.save_adjustment(&adjustment, &audit).await?;
        info!(
            reference = %adjustment.reference_number,
            kind = %adjustment.adjustment_type,
            "currency adjustment created"
        );
        Ok(adjustment)
    }

    /// Approve a pending adjustment, stamping the approver.
    ///
    /// The adjustment's effective date must not fall in a locked
    /// Accountant period.
    pub async fn approve(
        &self,
        owner: &OwnerId,
        id: Uuid,
        approver: &str,
        actor: &str,
    ) -> CoreResult<CurrencyAdjustment> {
        let mut adjustment = self.adjustment_required(owner, id).await?;
        if adjustment.status != AdjustmentStatus::Pending {
            return Err(CoreError::InvalidTransition {
                entity: "currency adjustment",
                from: adjustment.status.to_string(),
                attempted: AdjustmentStatus::Approved.to_string(),
            });
        }

        self.locks
            .ensure_unlocked(owner, Module::Accountant, adjustment.date)
            .await?;

        let before = snapshot(&adjustment)?;
        adjustment.status = AdjustmentStatus::Approved;
        adjustment.approver = Some(approver.to_string());
        adjustment.approved_at = Some(Utc::now().naive_utc());
        adjustment.updated_at = Utc::now().naive_utc();

        let audit = AuditRecord::new(
            owner.clone(),
            actor,
            AuditAction::Approve,
            EntityType::CurrencyAdjustment,
            adjustment.id.to_string(),
        )
        .with_before(before)
        .with_after(snapshot(&adjustment)?);

        self.storage.update_adjustment(&adjustment, &audit).await?;
        info!(reference = %adjustment.reference_number, %approver, "currency adjustment approved");
        Ok(adjustment)
    }

    /// Reject a pending adjustment; a reason is mandatory.
    pub async fn reject(
        &self,
        owner: &OwnerId,
        id: Uuid,
        reason: &str,
        actor: &str,
    ) -> CoreResult<CurrencyAdjustment> {
        if reason.trim().is_empty() {
            return Err(CoreError::EmptyReason);
        }

        let mut adjustment = self.adjustment_required(owner, id).await?;
        if adjustment.status != AdjustmentStatus::Pending {
            return Err(CoreError::InvalidTransition {
                entity: "currency adjustment",
                from: adjustment.status.to_string(),
                attempted: AdjustmentStatus::Rejected.to_string(),
            });
        }

        let before = snapshot(&adjustment)?;
        adjustment.status = AdjustmentStatus::Rejected;
        adjustment.rejection_reason = Some(reason.to_string());
        adjustment.updated_at = Utc::now().naive_utc();

        let audit = AuditRecord::new(
            owner.clone(),
            actor,
            AuditAction::Reject,
            EntityType::CurrencyAdjustment,
            adjustment.id.to_string(),
        )
        .with_before(before)
        .with_after(snapshot(&adjustment)?);

        self.storage.update_adjustment(&adjustment, &audit).await?;
        info!(reference = %adjustment.reference_number, "currency adjustment rejected");
        Ok(adjustment)
    }

    pub async fn get_adjustment(
        &self,
        owner: &OwnerId,
        id: Uuid,
    ) -> CoreResult<Option<CurrencyAdjustment>> {
        self.storage.get_adjustment(owner, id).await
    }

    /// Journal lines realizing an approved gain or loss. Neutral
    /// adjustments have nothing to post.
    pub fn gain_loss_lines(&self, adjustment: &CurrencyAdjustment) -> Option<Vec<LineItem>> {
        let magnitude = adjustment.amount.abs();
        match adjustment.adjustment_type {
            GainLossKind::Neutral => None,
            GainLossKind::Gain => Some(vec![
                LineItem::debit(
                    adjustment.account_ref.clone(),
                    magnitude.clone(),
                    adjustment.to_currency,
                ),
                LineItem::credit(
                    self.config.exchange_gain_account.clone(),
                    magnitude,
                    adjustment.to_currency,
                ),
            ]),
            GainLossKind::Loss => Some(vec![
                LineItem::debit(
                    self.config.exchange_loss_account.clone(),
                    magnitude.clone(),
                    adjustment.to_currency,
                ),
                LineItem::credit(
                    adjustment.account_ref.clone(),
                    magnitude,
                    adjustment.to_currency,
                ),
            ]),
        }
    }

    async fn adjustment_required(
        &self,
        owner: &OwnerId,
        id: Uuid,
    ) -> CoreResult<CurrencyAdjustment> {
        self.storage
            .get_adjustment(owner, id)
            .await?
            .ok_or(CoreError::AdjustmentNotFound(id))
    }
}
