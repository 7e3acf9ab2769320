//! Owner-scoped sequential document numbering

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::traits::LedgerStore;
use crate::types::{CoreResult, OwnerId};

/// Document families that carry their own number series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    JournalEntry,
    CurrencyAdjustment,
    PurchaseOrder,
    DeliveryChallan,
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::JournalEntry => "JE",
            DocumentKind::CurrencyAdjustment => "CA",
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::DeliveryChallan => "DC",
        }
    }

    /// Zero-padding width of the numeric part.
    pub fn pad_width(&self) -> usize {
        match self {
            DocumentKind::JournalEntry | DocumentKind::CurrencyAdjustment => 6,
            DocumentKind::PurchaseOrder | DocumentKind::DeliveryChallan => 5,
        }
    }

    /// Render counter value `n` as a document identifier.
    pub fn format(&self, n: u64) -> String {
        format!("{}-{:0width$}", self.prefix(), n, width = self.pad_width())
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentKind::JournalEntry => "journal entry",
            DocumentKind::CurrencyAdjustment => "currency adjustment",
            DocumentKind::PurchaseOrder => "purchase order",
            DocumentKind::DeliveryChallan => "delivery challan",
        };
        f.write_str(name)
    }
}

/// Hands out the next identifier in a series.
///
/// The increment is delegated to the store's atomic counter; two
/// concurrent callers for the same (owner, kind) never see the same
/// value, and a failed increment aborts the operation instead of
/// falling back to a guessed number.
#[derive(Debug, Clone)]
pub struct SequenceGenerator<S: LedgerStore> {
    storage: S,
}

impl<S: LedgerStore> SequenceGenerator<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub async fn next(&self, owner: &OwnerId, kind: DocumentKind) -> CoreResult<String> {
        let n = self.storage.next_sequence(owner, kind).await?;
        Ok(kind.format(n))
    }
}
