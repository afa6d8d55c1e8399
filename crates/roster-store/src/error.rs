//! Storage errors.

use roster_types::{AssociationId, CampaignId, CreatorId};
use thiserror::Error;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by storage backends.
#[derive(Error, Debug)]
pub enum StoreError {
    // --- Lookup errors ---
    #[error("campaign {0} not found")]
    CampaignMissing(CampaignId),

    #[error("no campaign found for business {business_name:?} in month {month}")]
    CampaignNotFound {
        business_name: String,
        month: String,
    },

    #[error("{matches} campaigns match business {business_name:?} in month {month}, expected exactly one")]
    AmbiguousCampaign {
        business_name: String,
        month: String,
        matches: usize,
    },

    #[error("association {0} not found")]
    AssociationMissing(AssociationId),

    #[error("no active association for creator {creator_id} in campaign {campaign_id}")]
    ActiveAssociationMissing {
        campaign_id: CampaignId,
        creator_id: CreatorId,
    },

    #[error("creator {0} not found")]
    CreatorMissing(CreatorId),

    // --- Constraint errors ---
    #[error("creator {creator_id} already holds an active association in campaign {campaign_id}")]
    UniqueViolation {
        campaign_id: CampaignId,
        creator_id: CreatorId,
    },

    #[error("campaign {campaign_id} is already fully staffed ({contracted} contracted slots)")]
    FullyStaffed {
        campaign_id: CampaignId,
        contracted: u32,
    },

    #[error(
        "slot count for campaign {campaign_id} changed concurrently: expected {expected}, found {found}"
    )]
    SlotCountRace {
        campaign_id: CampaignId,
        expected: u32,
        found: u32,
    },

    // --- Backend errors ---
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether this error means a referenced record is missing or ambiguous.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::CampaignMissing(_)
                | StoreError::CampaignNotFound { .. }
                | StoreError::AmbiguousCampaign { .. }
                | StoreError::AssociationMissing(_)
                | StoreError::ActiveAssociationMissing { .. }
                | StoreError::CreatorMissing(_)
        )
    }

    /// Whether this error means an invariant or a concurrent writer blocked
    /// the operation.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::UniqueViolation { .. }
                | StoreError::FullyStaffed { .. }
                | StoreError::SlotCountRace { .. }
        )
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}
