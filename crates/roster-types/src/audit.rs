//! Audit log entries.
//!
//! Every mutation and every auto-fix correction produces one write-once
//! entry. Entries are append-only; the sink that stores them lives in
//! `roster-audit`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of change an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A row or field was created.
    Create,
    /// A row or field was updated in place.
    Update,
    /// A row was soft-removed.
    Remove,
    /// A correction applied by the auto-fix reconciler, as opposed to a
    /// user-initiated mutation.
    AutoFix,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Remove => "remove",
            AuditAction::AutoFix => "auto_fix",
        };
        write!(f, "{name}")
    }
}

/// Which entity an entry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntityType {
    Campaign,
    Association,
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Unique entry identifier.
    pub id: Uuid,

    pub action: AuditAction,
    pub entity_type: AuditEntityType,

    /// Identifier of the affected entity, stringified.
    pub entity_id: String,

    /// Value before the change, where applicable.
    pub old_value: Option<serde_json::Value>,

    /// Value after the change, where applicable.
    pub new_value: Option<serde_json::Value>,

    /// Who performed the change (user handle or `"auto-fix"` style agent).
    pub actor: String,

    pub timestamp: DateTime<Utc>,

    /// Free-text context for operators.
    pub details: Option<String>,
}

impl AuditLogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(
        action: AuditAction,
        entity_type: AuditEntityType,
        entity_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            entity_type,
            entity_id: entity_id.into(),
            old_value: None,
            new_value: None,
            actor: actor.into(),
            timestamp: Utc::now(),
            details: None,
        }
    }

    /// Attach the pre-change value.
    pub fn with_old_value(mut self, value: serde_json::Value) -> Self {
        self.old_value = Some(value);
        self
    }

    /// Attach the post-change value.
    pub fn with_new_value(mut self, value: serde_json::Value) -> Self {
        self.new_value = Some(value);
        self
    }

    /// Attach operator-facing context.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_attaches_values() {
        let entry = AuditLogEntry::new(
            AuditAction::Update,
            AuditEntityType::Association,
            "assoc-1",
            "maria",
        )
        .with_old_value(serde_json::json!({"creator_id": "a"}))
        .with_new_value(serde_json::json!({"creator_id": "b"}))
        .with_details("swap");

        assert_eq!(entry.action, AuditAction::Update);
        assert_eq!(entry.actor, "maria");
        assert!(entry.old_value.is_some());
        assert_eq!(entry.details.as_deref(), Some("swap"));
    }
}
