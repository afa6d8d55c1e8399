//! Storage trait definitions.
//!
//! Each mutating method is a single atomic transaction against the backend.

use async_trait::async_trait;
use roster_types::{
    AssociationId, AssociationStatus, Campaign, CampaignId, Creator, CreatorAssociation,
    CreatorId,
};

use crate::error::StoreResult;

/// Rows touched by a replace operation.
#[derive(Debug, Clone)]
pub struct ReplaceRows {
    /// The old creator's association after soft removal.
    pub removed: CreatorAssociation,

    /// The new creator's association (freshly inserted, or reactivated).
    pub created: CreatorAssociation,

    /// True when `created` is a reactivated previously-removed row rather
    /// than a new identity.
    pub reactivated: bool,
}

/// Campaign records, owned by the external record store.
///
/// This core reads campaigns and adjusts exactly one field, via
/// [`compare_and_swap_slot_count`](CampaignStore::compare_and_swap_slot_count).
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Fetch a campaign by id.
    async fn get(&self, id: CampaignId) -> StoreResult<Option<Campaign>>;

    /// Resolve the unique campaign for a business + month pair.
    ///
    /// Zero matches fail with `CampaignNotFound`; more than one fails with
    /// `AmbiguousCampaign`.
    async fn find_by_business_month(
        &self,
        business_name: &str,
        month: &str,
    ) -> StoreResult<Campaign>;

    /// Conditionally update `contracted_slot_count`.
    ///
    /// Succeeds only when the stored value still equals `expected`; a
    /// concurrent writer surfaces as `SlotCountRace` carrying the value
    /// actually found. Returns the new count.
    async fn compare_and_swap_slot_count(
        &self,
        id: CampaignId,
        expected: u32,
        new: u32,
    ) -> StoreResult<u32>;

    /// All campaign ids, for system-wide integrity sweeps.
    async fn list_ids(&self) -> StoreResult<Vec<CampaignId>>;
}

/// Creator association rows.
#[async_trait]
pub trait AssociationStore: Send + Sync {
    /// Fetch one association by id.
    async fn get(&self, id: AssociationId) -> StoreResult<Option<CreatorAssociation>>;

    /// All associations for a campaign, removed rows included.
    async fn list(&self, campaign_id: CampaignId) -> StoreResult<Vec<CreatorAssociation>>;

    /// Active (non-removed) associations for a campaign.
    async fn list_active(&self, campaign_id: CampaignId)
        -> StoreResult<Vec<CreatorAssociation>>;

    /// Insert a fresh `Pending` association.
    ///
    /// The insert transaction enforces both invariants itself: fails with
    /// `UniqueViolation` if the creator already holds an active association
    /// in the campaign, and with `FullyStaffed` when active rows already
    /// fill every contracted slot. Callers may pre-check for better error
    /// messages, but this method is the authoritative gate.
    async fn insert_pending(
        &self,
        campaign_id: CampaignId,
        creator_id: CreatorId,
    ) -> StoreResult<CreatorAssociation>;

    /// In-place creator change for a swap: the active association for
    /// `old_creator` keeps its id, status, deliverables, and `created_at`,
    /// only `creator_id` changes.
    ///
    /// Fails with `ActiveAssociationMissing` if `old_creator` has no active
    /// row, and with `UniqueViolation` if `new_creator` already holds a
    /// separate active row in the campaign.
    async fn update_creator(
        &self,
        campaign_id: CampaignId,
        old_creator: CreatorId,
        new_creator: CreatorId,
    ) -> StoreResult<CreatorAssociation>;

    /// Replace in one transaction: soft-remove the active association for
    /// `old_creator`, then give `new_creator` an association, reactivating
    /// the campaign's most recent removed row for that creator if one
    /// exists and inserting a fresh `Pending` row otherwise.
    async fn replace_creator(
        &self,
        campaign_id: CampaignId,
        old_creator: CreatorId,
        new_creator: CreatorId,
    ) -> StoreResult<ReplaceRows>;

    /// Soft-remove the active association for a creator.
    async fn remove_creator(
        &self,
        campaign_id: CampaignId,
        creator_id: CreatorId,
    ) -> StoreResult<CreatorAssociation>;

    /// Set the status of one association by id.
    ///
    /// Transitions into an active status re-check the uniqueness
    /// constraint; soft removal never conflicts.
    async fn set_status(
        &self,
        id: AssociationId,
        status: AssociationStatus,
    ) -> StoreResult<CreatorAssociation>;

    /// Insert a row without constraint checks.
    ///
    /// Exists for backfill tooling (legacy spreadsheet import) and for
    /// drift injection in tests; normal operators never call this.
    async fn insert_unchecked(&self, association: CreatorAssociation) -> StoreResult<()>;
}

/// Read-only creator records, owned by the external record store.
#[async_trait]
pub trait CreatorDirectory: Send + Sync {
    /// Fetch a creator by id.
    async fn get(&self, id: CreatorId) -> StoreResult<Option<Creator>>;

    /// All known creators.
    async fn list(&self) -> StoreResult<Vec<Creator>>;
}
