//! Append-only audit trail

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::{CoreResult, OwnerId};

/// State-changing operations recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Post,
    Reverse,
    Approve,
    Reject,
    Lock,
    PartialUnlock,
    Relock,
    Unlock,
    Match,
    Reconcile,
}

/// Entity families covered by the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    JournalEntry,
    CurrencyAdjustment,
    TransactionLock,
    BankReconciliation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// One immutable record of who changed what, when, with what
/// before/after values. Records are only ever appended; retention
/// sweeps happen outside this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: Uuid,
    pub owner: OwnerId,
    pub actor: String,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub metadata: Option<Value>,
    pub severity: Severity,
    pub recorded_at: NaiveDateTime,
    /// Key for the external retention sweep; this core never acts on it.
    pub retention_date: Option<NaiveDate>,
}

impl AuditRecord {
    pub fn new(
        owner: OwnerId,
        actor: &str,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            actor: actor.to_string(),
            action,
            entity_type,
            entity_id: entity_id.into(),
            before: None,
            after: None,
            metadata: None,
            severity: Severity::Info,
            recorded_at: chrono::Utc::now().naive_utc(),
            retention_date: None,
        }
    }

    pub fn with_before(mut self, value: Value) -> Self {
        self.before = Some(value);
        self
    }

    pub fn with_after(mut self, value: Value) -> Self {
        self.after = Some(value);
        self
    }

    pub fn with_metadata(mut self, value: Value) -> Self {
        self.metadata = Some(value);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

/// Serialize an entity snapshot for the before/after fields.
pub fn snapshot<T: Serialize>(value: &T) -> CoreResult<Value> {
    Ok(serde_json::to_value(value)?)
}
