//! Bank reconciliation: pairing statement lines against book transactions

pub mod engine;
pub mod matcher;

pub use engine::*;
pub use matcher::*;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::Currency;
use crate::types::OwnerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    Draft,
    InProgress,
    Completed,
}

/// Item lifecycle: `reconciled` items are settled and leave the
/// document's open difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Unmatched,
    Matched,
    Reconciled,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ItemStatus::Unmatched => "unmatched",
            ItemStatus::Matched => "matched",
            ItemStatus::Reconciled => "reconciled",
        };
        f.write_str(name)
    }
}

/// One line reported by the bank statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankStatementLine {
    pub id: Uuid,
    pub date: NaiveDate,
    pub amount: BigDecimal,
    pub description: String,
    pub reference: Option<String>,
}

impl BankStatementLine {
    pub fn new(date: NaiveDate, amount: BigDecimal, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            amount,
            description: description.into(),
            reference: None,
        }
    }
}

/// One transaction recorded in the books for the same account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookTransaction {
    pub id: Uuid,
    pub date: NaiveDate,
    pub amount: BigDecimal,
    pub description: String,
}

impl BookTransaction {
    pub fn new(date: NaiveDate, amount: BigDecimal, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            amount,
            description: description.into(),
        }
    }
}

/// A bank line and, once paired, its book counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationItem {
    pub id: Uuid,
    pub bank_transaction: BankStatementLine,
    pub book_transaction: Option<BookTransaction>,
    pub status: ItemStatus,
    /// Bank amount minus the paired book amount (or minus nothing).
    pub difference: BigDecimal,
}

/// One reconciliation run for an account and period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankReconciliation {
    pub id: Uuid,
    pub owner: OwnerId,
    pub account_ref: String,
    pub currency: Currency,
    pub bank_balance: BigDecimal,
    pub book_balance: BigDecimal,
    /// Equal to the signed sum of all non-reconciled item differences
    /// after every item mutation.
    pub difference: BigDecimal,
    pub status: ReconciliationStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub items: Vec<ReconciliationItem>,
    /// Candidate pool for manual matching; a transaction already
    /// attached to an item is no longer available.
    pub book_transactions: Vec<BookTransaction>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl BankReconciliation {
    /// Signed sum of the differences of all items not yet settled.
    pub fn open_difference(&self) -> BigDecimal {
        self.items
            .iter()
            .filter(|item| item.status != ItemStatus::Reconciled)
            .map(|item| &item.difference)
            .sum()
    }

    pub fn has_unmatched_items(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.status == ItemStatus::Unmatched)
    }
}
