//! Creator association rows and their lifecycle.
//!
//! An association links one campaign to one creator. Associations are never
//! physically deleted: removal is a transition to `Removed`, which keeps the
//! full history available to the audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{AssociationId, CampaignId, CreatorId};

/// Lifecycle status of a creator association.
///
/// `Pending -> Confirmed` happens through an external workflow. Any status
/// may transition to `Removed` (soft delete); `Removed` rows only come back
/// through explicit reactivation during a replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociationStatus {
    /// Created, awaiting confirmation from the creator workflow.
    Pending,
    /// Confirmed by the external workflow.
    Confirmed,
    /// Soft-deleted. Excluded from slot projection and integrity counts.
    Removed,
}

impl AssociationStatus {
    /// Whether this row occupies a slot (anything not `Removed`).
    pub fn is_active(&self) -> bool {
        !matches!(self, AssociationStatus::Removed)
    }

    /// Stable lowercase name, used by storage backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationStatus::Pending => "pending",
            AssociationStatus::Confirmed => "confirmed",
            AssociationStatus::Removed => "removed",
        }
    }
}

impl std::fmt::Display for AssociationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error parsing a stored status string.
#[derive(Debug, Error)]
#[error("unknown association status: {0}")]
pub struct StatusParseError(pub String);

impl std::str::FromStr for AssociationStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AssociationStatus::Pending),
            "confirmed" => Ok(AssociationStatus::Confirmed),
            "removed" => Ok(AssociationStatus::Removed),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}

/// A persisted row linking one campaign to one creator.
///
/// Invariant A: within a campaign, no two active (non-`Removed`) rows may
/// share a `creator_id`. The store's uniqueness constraint is the
/// authoritative enforcement; operators pre-check it for better errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorAssociation {
    /// Unique, stable row identity. Survives a creator swap.
    pub id: AssociationId,

    /// Campaign this row belongs to.
    pub campaign_id: CampaignId,

    /// Creator occupying the slot.
    pub creator_id: CreatorId,

    /// Lifecycle status.
    pub status: AssociationStatus,

    /// Opaque deliverables payload, passed through untouched.
    pub deliverables: serde_json::Value,

    /// Row creation timestamp; primary slot ordering key.
    pub created_at: DateTime<Utc>,
}

impl CreatorAssociation {
    /// Create a fresh `Pending` association with empty deliverables.
    pub fn new_pending(campaign_id: CampaignId, creator_id: CreatorId) -> Self {
        Self {
            id: AssociationId::generate(),
            campaign_id,
            creator_id,
            status: AssociationStatus::Pending,
            deliverables: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    /// Whether this row currently occupies a slot.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Deterministic slot ordering key: `created_at` ascending, then `id`
    /// ascending as the tie-break.
    pub fn ordering_key(&self) -> (DateTime<Utc>, AssociationId) {
        (self.created_at, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_is_not_active() {
        assert!(AssociationStatus::Pending.is_active());
        assert!(AssociationStatus::Confirmed.is_active());
        assert!(!AssociationStatus::Removed.is_active());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            AssociationStatus::Pending,
            AssociationStatus::Confirmed,
            AssociationStatus::Removed,
        ] {
            let parsed: AssociationStatus = status.as_str().parse().unwrap();
            assert_eq!(status, parsed);
        }
        assert!("deleted".parse::<AssociationStatus>().is_err());
    }

    #[test]
    fn ordering_key_breaks_ties_by_id() {
        let campaign_id = CampaignId::generate();
        let mut a = CreatorAssociation::new_pending(campaign_id, CreatorId::generate());
        let mut b = CreatorAssociation::new_pending(campaign_id, CreatorId::generate());
        let now = Utc::now();
        a.created_at = now;
        b.created_at = now;
        assert_ne!(a.ordering_key(), b.ordering_key());
        assert_eq!(a.ordering_key() < b.ordering_key(), a.id < b.id);
    }
}
