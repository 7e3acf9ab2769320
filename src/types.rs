//! Core types and data structures for the ledger consistency core

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::currency::Currency;
use crate::sequence::DocumentKind;

/// Owner scope for multi-tenant records.
///
/// Every persisted record and every storage key is scoped to an owner;
/// two owners never observe each other's sequences, locks, or entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for OwnerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Application modules governed by period locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Module {
    Sales,
    Purchases,
    Banking,
    Accountant,
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Module::Sales => "Sales",
            Module::Purchases => "Purchases",
            Module::Banking => "Banking",
            Module::Accountant => "Accountant",
        };
        f.write_str(name)
    }
}

/// Document origin of a journal entry.
///
/// The origin decides which module's period lock governs the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Manual,
    Invoice,
    Bill,
    Expense,
    PurchaseOrder,
    BankTransaction,
    CurrencyAdjustment,
    Reversal,
}

impl SourceKind {
    /// The module whose period lock applies to entries of this origin.
    pub fn module(&self) -> Module {
        match self {
            SourceKind::Invoice => Module::Sales,
            SourceKind::Bill | SourceKind::Expense | SourceKind::PurchaseOrder => Module::Purchases,
            SourceKind::BankTransaction => Module::Banking,
            SourceKind::Manual | SourceKind::CurrencyAdjustment | SourceKind::Reversal => {
                Module::Accountant
            }
        }
    }
}

/// Origin of a journal entry plus an optional back-reference
/// (invoice number, adjustment reference, reversed entry number).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub kind: SourceKind,
    pub reference: Option<String>,
}

impl SourceRef {
    pub fn manual() -> Self {
        Self {
            kind: SourceKind::Manual,
            reference: None,
        }
    }

    pub fn new(kind: SourceKind, reference: impl Into<String>) -> Self {
        Self {
            kind,
            reference: Some(reference.into()),
        }
    }
}

/// Lifecycle of a journal entry. Reversal produces a mirrored
/// compensating entry rather than deleting anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Draft,
    Posted,
    Reversed,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Posted => "posted",
            EntryStatus::Reversed => "reversed",
        };
        f.write_str(name)
    }
}

/// One line of a journal entry. Exactly one of debit/credit is
/// expected to be positive; both are always non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub account_ref: String,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
    pub currency: Currency,
    pub exchange_rate: BigDecimal,
    /// Amount expressed in the base currency (amount x exchange rate).
    pub base_amount: BigDecimal,
    pub description: Option<String>,
}

impl LineItem {
    /// Create a debit line at rate 1 (base currency).
    pub fn debit(account_ref: impl Into<String>, amount: BigDecimal, currency: Currency) -> Self {
        Self {
            account_ref: account_ref.into(),
            base_amount: amount.clone(),
            debit: amount,
            credit: BigDecimal::from(0),
            currency,
            exchange_rate: BigDecimal::from(1),
            description: None,
        }
    }

    /// Create a credit line at rate 1 (base currency).
    pub fn credit(account_ref: impl Into<String>, amount: BigDecimal, currency: Currency) -> Self {
        Self {
            account_ref: account_ref.into(),
            base_amount: amount.clone(),
            debit: BigDecimal::from(0),
            credit: amount,
            currency,
            exchange_rate: BigDecimal::from(1),
            description: None,
        }
    }

    /// Set the exchange rate and recompute the base amount.
    pub fn with_rate(mut self, rate: BigDecimal) -> Self {
        self.base_amount = (&self.debit + &self.credit) * &rate;
        self.exchange_rate = rate;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The single signed amount carried by this line (debit or credit).
    pub fn amount(&self) -> &BigDecimal {
        if self.debit > BigDecimal::from(0) {
            &self.debit
        } else {
            &self.credit
        }
    }
}

/// A double-entry journal entry: balanced header plus ordered line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: Uuid,
    pub owner: OwnerId,
    /// Owner-scoped sequential identifier, e.g. `JE-000042`.
    pub entry_number: String,
    pub date: NaiveDate,
    pub description: String,
    pub source: SourceRef,
    pub status: EntryStatus,
    pub currency: Currency,
    pub total_debit: BigDecimal,
    pub total_credit: BigDecimal,
    pub line_items: Vec<LineItem>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl JournalEntry {
    /// Module whose period lock governs mutation of this entry.
    pub fn module(&self) -> Module {
        self.source.kind.module()
    }
}

/// Totals of a line-item set, computed without side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryTotals {
    pub total_debit: BigDecimal,
    pub total_credit: BigDecimal,
}

/// One violated double-entry rule, with the boundary values needed to
/// render a precise user-facing message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValidationIssue {
    TooFewLineItems {
        found: usize,
    },
    Unbalanced {
        total_debit: BigDecimal,
        total_credit: BigDecimal,
    },
    MissingDebitLine,
    MissingCreditLine,
    NegativeAmount {
        line: usize,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::TooFewLineItems { found } => {
                write!(f, "entry needs at least 2 line items, found {found}")
            }
            ValidationIssue::Unbalanced {
                total_debit,
                total_credit,
            } => write!(
                f,
                "debits ({total_debit}) do not equal credits ({total_credit})"
            ),
            ValidationIssue::MissingDebitLine => {
                f.write_str("entry needs at least one line with a positive debit")
            }
            ValidationIssue::MissingCreditLine => {
                f.write_str("entry needs at least one line with a positive credit")
            }
            ValidationIssue::NegativeAmount { line } => {
                write!(f, "line {line} carries a negative amount")
            }
        }
    }
}

/// Complete result of validating a line-item set. All violated rules
/// are collected; nothing short-circuits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid {
            return f.write_str("valid");
        }
        let mut first = true;
        for issue in &self.issues {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
            first = false;
        }
        Ok(())
    }
}

/// Runtime tolerances and posting accounts.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Balance tolerance for double-entry validation (one minor unit).
    pub balance_tolerance: BigDecimal,
    /// Tie tolerance for gain/loss classification.
    pub neutral_tolerance: BigDecimal,
    /// Date window (in days) for automatic statement matching.
    pub match_window_days: i64,
    /// Account credited when a revaluation realizes a gain.
    pub exchange_gain_account: String,
    /// Account debited when a revaluation realizes a loss.
    pub exchange_loss_account: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        let minor_unit = BigDecimal::from(1) / BigDecimal::from(100);
        Self {
            balance_tolerance: minor_unit.clone(),
            neutral_tolerance: minor_unit,
            match_window_days: 0,
            exchange_gain_account: "exchange-gain".to_string(),
            exchange_loss_account: "exchange-loss".to_string(),
        }
    }
}

/// Errors that can occur in the ledger core. All of them are
/// recoverable; a failed operation leaves stored state untouched.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("journal entry failed validation: {0}")]
    Validation(ValidationReport),
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),
    #[error("exchange rate must be positive to convert, got {rate}")]
    RateNotPositive { rate: BigDecimal },
    #[error("{module} is locked through {lock_date}, cannot modify a transaction dated {date}")]
    LockViolation {
        module: Module,
        lock_date: NaiveDate,
        date: NaiveDate,
    },
    #[error("lock date {lock_date} is after today ({today})")]
    LockDateInFuture {
        lock_date: NaiveDate,
        today: NaiveDate,
    },
    #[error("partial unlock window {from}..{to} must be ordered and end on or before lock date {lock_date}")]
    InvalidUnlockWindow {
        from: NaiveDate,
        to: NaiveDate,
        lock_date: NaiveDate,
    },
    #[error("{module} already has an active transaction lock")]
    DuplicateLock { module: Module },
    #[error("{module} has no active transaction lock")]
    LockNotFound { module: Module },
    #[error("sequence counter for {kind} is unavailable: {reason}")]
    SequenceUnavailable { kind: DocumentKind, reason: String },
    #[error("reconciliation item {item_id} has a difference of {difference}; settling it requires an explicit override")]
    ReconciliationMismatch {
        item_id: Uuid,
        difference: BigDecimal,
    },
    #[error("journal entry not found: {0}")]
    EntryNotFound(Uuid),
    #[error("currency adjustment not found: {0}")]
    AdjustmentNotFound(Uuid),
    #[error("reconciliation not found: {0}")]
    ReconciliationNotFound(Uuid),
    #[error("reconciliation item not found: {0}")]
    ItemNotFound(Uuid),
    #[error("book transaction not found or already matched: {0}")]
    BookTransactionNotFound(Uuid),
    #[error("{entity} cannot move from {from} to {attempted}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        attempted: String,
    },
    #[error("a non-empty reason is required")]
    EmptyReason,
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for ledger core operations.
pub type CoreResult<T> = Result<T, CoreError>;
