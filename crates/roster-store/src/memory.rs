//! In-memory storage backend.
//!
//! Used by tests and single-process development setups. One `RwLock` guards
//! all tables; every mutating method holds the write guard across its whole
//! read-validate-write sequence, which gives each method the same atomicity
//! a database transaction provides.

use std::collections::HashMap;

use async_trait::async_trait;
use roster_types::{
    AssociationId, AssociationStatus, Campaign, CampaignId, Creator, CreatorAssociation,
    CreatorId,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{AssociationStore, CampaignStore, CreatorDirectory, ReplaceRows};

#[derive(Default)]
struct Tables {
    campaigns: HashMap<CampaignId, Campaign>,
    associations: HashMap<AssociationId, CreatorAssociation>,
    creators: HashMap<CreatorId, Creator>,
}

impl Tables {
    fn active_row(
        &self,
        campaign_id: CampaignId,
        creator_id: CreatorId,
    ) -> Option<&CreatorAssociation> {
        self.associations.values().find(|assoc| {
            assoc.campaign_id == campaign_id
                && assoc.creator_id == creator_id
                && assoc.is_active()
        })
    }

    /// The uniqueness constraint: at most one active row per
    /// `(campaign_id, creator_id)`. `exclude` skips the row being mutated.
    fn check_unique(
        &self,
        campaign_id: CampaignId,
        creator_id: CreatorId,
        exclude: Option<AssociationId>,
    ) -> StoreResult<()> {
        let occupied = self.associations.values().any(|assoc| {
            assoc.campaign_id == campaign_id
                && assoc.creator_id == creator_id
                && assoc.is_active()
                && Some(assoc.id) != exclude
        });
        if occupied {
            return Err(StoreError::UniqueViolation {
                campaign_id,
                creator_id,
            });
        }
        Ok(())
    }
}

/// Single-process backend holding all three stores.
#[derive(Default)]
pub struct InMemoryRosterStore {
    inner: RwLock<Tables>,
}

impl InMemoryRosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a campaign record.
    pub async fn insert_campaign(&self, campaign: Campaign) {
        self.inner
            .write()
            .await
            .campaigns
            .insert(campaign.id, campaign);
    }

    /// Seed a creator record.
    pub async fn insert_creator(&self, creator: Creator) {
        self.inner
            .write()
            .await
            .creators
            .insert(creator.id, creator);
    }
}

#[async_trait]
impl CampaignStore for InMemoryRosterStore {
    async fn get(&self, id: CampaignId) -> StoreResult<Option<Campaign>> {
        Ok(self.inner.read().await.campaigns.get(&id).cloned())
    }

    async fn find_by_business_month(
        &self,
        business_name: &str,
        month: &str,
    ) -> StoreResult<Campaign> {
        let tables = self.inner.read().await;
        let matches: Vec<&Campaign> = tables
            .campaigns
            .values()
            .filter(|campaign| campaign.business_name == business_name && campaign.month == month)
            .collect();

        match matches.as_slice() {
            [] => Err(StoreError::CampaignNotFound {
                business_name: business_name.to_string(),
                month: month.to_string(),
            }),
            [campaign] => Ok((*campaign).clone()),
            many => Err(StoreError::AmbiguousCampaign {
                business_name: business_name.to_string(),
                month: month.to_string(),
                matches: many.len(),
            }),
        }
    }

    async fn compare_and_swap_slot_count(
        &self,
        id: CampaignId,
        expected: u32,
        new: u32,
    ) -> StoreResult<u32> {
        let mut tables = self.inner.write().await;
        let campaign = tables
            .campaigns
            .get_mut(&id)
            .ok_or(StoreError::CampaignMissing(id))?;

        if campaign.contracted_slot_count != expected {
            return Err(StoreError::SlotCountRace {
                campaign_id: id,
                expected,
                found: campaign.contracted_slot_count,
            });
        }

        campaign.contracted_slot_count = new;
        debug!(campaign_id = %id, old = expected, new, "slot count updated");
        Ok(new)
    }

    async fn list_ids(&self) -> StoreResult<Vec<CampaignId>> {
        Ok(self.inner.read().await.campaigns.keys().copied().collect())
    }
}

#[async_trait]
impl AssociationStore for InMemoryRosterStore {
    async fn get(&self, id: AssociationId) -> StoreResult<Option<CreatorAssociation>> {
        Ok(self.inner.read().await.associations.get(&id).cloned())
    }

    async fn list(&self, campaign_id: CampaignId) -> StoreResult<Vec<CreatorAssociation>> {
        Ok(self
            .inner
            .read()
            .await
            .associations
            .values()
            .filter(|assoc| assoc.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn list_active(
        &self,
        campaign_id: CampaignId,
    ) -> StoreResult<Vec<CreatorAssociation>> {
        Ok(self
            .inner
            .read()
            .await
            .associations
            .values()
            .filter(|assoc| assoc.campaign_id == campaign_id && assoc.is_active())
            .cloned()
            .collect())
    }

    async fn insert_pending(
        &self,
        campaign_id: CampaignId,
        creator_id: CreatorId,
    ) -> StoreResult<CreatorAssociation> {
        let mut tables = self.inner.write().await;
        let contracted = tables
            .campaigns
            .get(&campaign_id)
            .map(|campaign| campaign.contracted_slot_count)
            .ok_or(StoreError::CampaignMissing(campaign_id))?;
        tables.check_unique(campaign_id, creator_id, None)?;

        // Invariant B gate, under the same write guard as the insert.
        let active = tables
            .associations
            .values()
            .filter(|assoc| assoc.campaign_id == campaign_id && assoc.is_active())
            .count() as u32;
        if active >= contracted {
            return Err(StoreError::FullyStaffed {
                campaign_id,
                contracted,
            });
        }

        let association = CreatorAssociation::new_pending(campaign_id, creator_id);
        tables
            .associations
            .insert(association.id, association.clone());
        Ok(association)
    }

    async fn update_creator(
        &self,
        campaign_id: CampaignId,
        old_creator: CreatorId,
        new_creator: CreatorId,
    ) -> StoreResult<CreatorAssociation> {
        let mut tables = self.inner.write().await;
        let target_id = tables
            .active_row(campaign_id, old_creator)
            .map(|assoc| assoc.id)
            .ok_or(StoreError::ActiveAssociationMissing {
                campaign_id,
                creator_id: old_creator,
            })?;

        tables.check_unique(campaign_id, new_creator, Some(target_id))?;

        let association = tables
            .associations
            .get_mut(&target_id)
            .ok_or(StoreError::AssociationMissing(target_id))?;
        association.creator_id = new_creator;
        Ok(association.clone())
    }

    async fn replace_creator(
        &self,
        campaign_id: CampaignId,
        old_creator: CreatorId,
        new_creator: CreatorId,
    ) -> StoreResult<ReplaceRows> {
        let mut tables = self.inner.write().await;
        let old_id = tables
            .active_row(campaign_id, old_creator)
            .map(|assoc| assoc.id)
            .ok_or(StoreError::ActiveAssociationMissing {
                campaign_id,
                creator_id: old_creator,
            })?;

        // The old row is about to go away, so it never counts against the
        // new creator's uniqueness.
        tables.check_unique(campaign_id, new_creator, Some(old_id))?;

        let removed = {
            let association = tables
                .associations
                .get_mut(&old_id)
                .ok_or(StoreError::AssociationMissing(old_id))?;
            association.status = AssociationStatus::Removed;
            association.clone()
        };

        // Reactivate the most recent removed row for the new creator, if any.
        let reactivate_id = tables
            .associations
            .values()
            .filter(|assoc| {
                assoc.campaign_id == campaign_id
                    && assoc.creator_id == new_creator
                    && assoc.status == AssociationStatus::Removed
            })
            .max_by_key(|assoc| assoc.ordering_key())
            .map(|assoc| assoc.id);

        let (created, reactivated) = match reactivate_id {
            Some(id) => {
                let association = tables
                    .associations
                    .get_mut(&id)
                    .ok_or(StoreError::AssociationMissing(id))?;
                association.status = AssociationStatus::Pending;
                (association.clone(), true)
            }
            None => {
                let association = CreatorAssociation::new_pending(campaign_id, new_creator);
                tables
                    .associations
                    .insert(association.id, association.clone());
                (association, false)
            }
        };

        Ok(ReplaceRows {
            removed,
            created,
            reactivated,
        })
    }

    async fn remove_creator(
        &self,
        campaign_id: CampaignId,
        creator_id: CreatorId,
    ) -> StoreResult<CreatorAssociation> {
        let mut tables = self.inner.write().await;
        let target_id = tables
            .active_row(campaign_id, creator_id)
            .map(|assoc| assoc.id)
            .ok_or(StoreError::ActiveAssociationMissing {
                campaign_id,
                creator_id,
            })?;

        let association = tables
            .associations
            .get_mut(&target_id)
            .ok_or(StoreError::AssociationMissing(target_id))?;
        association.status = AssociationStatus::Removed;
        Ok(association.clone())
    }

    async fn set_status(
        &self,
        id: AssociationId,
        status: AssociationStatus,
    ) -> StoreResult<CreatorAssociation> {
        let mut tables = self.inner.write().await;
        let (campaign_id, creator_id) = {
            let association = tables
                .associations
                .get(&id)
                .ok_or(StoreError::AssociationMissing(id))?;
            (association.campaign_id, association.creator_id)
        };

        if status.is_active() {
            tables.check_unique(campaign_id, creator_id, Some(id))?;
        }

        let association = tables
            .associations
            .get_mut(&id)
            .ok_or(StoreError::AssociationMissing(id))?;
        association.status = status;
        Ok(association.clone())
    }

    async fn insert_unchecked(&self, association: CreatorAssociation) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .associations
            .insert(association.id, association);
        Ok(())
    }
}

#[async_trait]
impl CreatorDirectory for InMemoryRosterStore {
    async fn get(&self, id: CreatorId) -> StoreResult<Option<Creator>> {
        Ok(self.inner.read().await.creators.get(&id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Creator>> {
        Ok(self.inner.read().await.creators.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_campaign(contracted: u32) -> (InMemoryRosterStore, Campaign) {
        let store = InMemoryRosterStore::new();
        let campaign = Campaign::new("Harbor Florist", "2026-08", contracted);
        store.insert_campaign(campaign.clone()).await;
        (store, campaign)
    }

    #[tokio::test]
    async fn insert_pending_rejects_duplicate_active_creator() {
        let (store, campaign) = store_with_campaign(3).await;
        let creator = CreatorId::generate();

        store.insert_pending(campaign.id, creator).await.unwrap();
        let err = store.insert_pending(campaign.id, creator).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn insert_pending_rejects_fully_staffed_campaign() {
        let (store, campaign) = store_with_campaign(1).await;
        store
            .insert_pending(campaign.id, CreatorId::generate())
            .await
            .unwrap();

        let err = store
            .insert_pending(campaign.id, CreatorId::generate())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::FullyStaffed { contracted: 1, .. }
        ));
    }

    #[tokio::test]
    async fn removed_row_frees_the_creator() {
        let (store, campaign) = store_with_campaign(3).await;
        let creator = CreatorId::generate();

        store.insert_pending(campaign.id, creator).await.unwrap();
        store.remove_creator(campaign.id, creator).await.unwrap();
        // Unique constraint only covers active rows.
        store.insert_pending(campaign.id, creator).await.unwrap();
    }

    #[tokio::test]
    async fn update_creator_preserves_row_identity() {
        let (store, campaign) = store_with_campaign(3).await;
        let old_creator = CreatorId::generate();
        let new_creator = CreatorId::generate();

        let original = store.insert_pending(campaign.id, old_creator).await.unwrap();
        let updated = store
            .update_creator(campaign.id, old_creator, new_creator)
            .await
            .unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.creator_id, new_creator);
        assert_eq!(updated.created_at, original.created_at);
    }

    #[tokio::test]
    async fn update_creator_rejects_occupied_target() {
        let (store, campaign) = store_with_campaign(3).await;
        let a = CreatorId::generate();
        let b = CreatorId::generate();
        store.insert_pending(campaign.id, a).await.unwrap();
        store.insert_pending(campaign.id, b).await.unwrap();

        let err = store.update_creator(campaign.id, a, b).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn replace_creates_new_identity() {
        let (store, campaign) = store_with_campaign(3).await;
        let old_creator = CreatorId::generate();
        let new_creator = CreatorId::generate();
        let original = store.insert_pending(campaign.id, old_creator).await.unwrap();

        let rows = store
            .replace_creator(campaign.id, old_creator, new_creator)
            .await
            .unwrap();

        assert_eq!(rows.removed.id, original.id);
        assert_eq!(rows.removed.status, AssociationStatus::Removed);
        assert_ne!(rows.created.id, original.id);
        assert!(!rows.reactivated);
    }

    #[tokio::test]
    async fn replace_reactivates_previously_removed_row() {
        let (store, campaign) = store_with_campaign(3).await;
        let a = CreatorId::generate();
        let b = CreatorId::generate();

        let b_row = store.insert_pending(campaign.id, b).await.unwrap();
        store.remove_creator(campaign.id, b).await.unwrap();
        store.insert_pending(campaign.id, a).await.unwrap();

        let rows = store.replace_creator(campaign.id, a, b).await.unwrap();
        assert!(rows.reactivated);
        assert_eq!(rows.created.id, b_row.id);
        assert_eq!(rows.created.status, AssociationStatus::Pending);
    }

    #[tokio::test]
    async fn reactivating_into_an_occupied_creator_is_a_conflict() {
        let (store, campaign) = store_with_campaign(3).await;
        let creator = CreatorId::generate();
        let first = store.insert_pending(campaign.id, creator).await.unwrap();
        store.remove_creator(campaign.id, creator).await.unwrap();
        store.insert_pending(campaign.id, creator).await.unwrap();

        let err = store
            .set_status(first.id, AssociationStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn cas_detects_concurrent_count_change() {
        let (store, campaign) = store_with_campaign(2).await;

        let count = store
            .compare_and_swap_slot_count(campaign.id, 2, 3)
            .await
            .unwrap();
        assert_eq!(count, 3);

        let err = store
            .compare_and_swap_slot_count(campaign.id, 2, 3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::SlotCountRace {
                expected: 2,
                found: 3,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn business_month_lookup_requires_unique_match() {
        let store = InMemoryRosterStore::new();
        let err = store
            .find_by_business_month("Harbor Florist", "2026-08")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CampaignNotFound { .. }));

        store
            .insert_campaign(Campaign::new("Harbor Florist", "2026-08", 1))
            .await;
        store
            .insert_campaign(Campaign::new("Harbor Florist", "2026-08", 2))
            .await;
        let err = store
            .find_by_business_month("Harbor Florist", "2026-08")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AmbiguousCampaign { matches: 2, .. }));
    }
}
