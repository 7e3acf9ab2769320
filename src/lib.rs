//! # Ledger Core
//!
//! The consistency core of a multi-tenant bookkeeping system: the
//! logic that keeps posted financial entries balanced, converts and
//! reconciles amounts across currencies, enforces period locking, and
//! matches bank-statement lines against book transactions.
//!
//! ## Features
//!
//! - **Double-entry validation**: every posted journal entry balances
//!   within one minor currency unit, with complete violation reports
//! - **Period locking**: per-module lock dates with partial-unlock
//!   exception windows; closed periods cannot be silently mutated
//! - **Currency adjustments**: revaluation with gain/loss/neutral
//!   classification, realized in the ledger on approval
//! - **Bank reconciliation**: automatic statement matching with
//!   manual resolution and an always-consistent aggregate difference
//! - **Sequential numbering**: atomic owner-scoped document counters
//! - **Audit trail**: an append-only before/after record of every
//!   state-changing operation
//! - **Storage abstraction**: database-agnostic design with
//!   trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use ledger_core::{LedgerCore, MemoryStore, NewJournalEntry, OwnerId};
//! use ledger_core::{Currency, LineItem, SourceRef};
//! use bigdecimal::BigDecimal;
//!
//! // let core = LedgerCore::new(MemoryStore::new());
//! // core.create_journal_entry(..., "actor").await?;
//! ```

pub mod adjustment;
pub mod audit;
pub mod currency;
pub mod journal;
pub mod ledger;
pub mod locks;
pub mod reconciliation;
pub mod sequence;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use adjustment::*;
pub use audit::*;
pub use currency::*;
pub use journal::*;
pub use ledger::*;
pub use locks::*;
pub use reconciliation::*;
pub use sequence::*;
pub use traits::*;
pub use types::*;
pub use utils::memory_storage::MemoryStore;
