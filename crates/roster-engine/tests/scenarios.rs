//! End-to-end reconciliation scenarios against the in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use roster_audit::InMemoryAuditSink;
use roster_engine::{EngineError, RosterEngine};
use roster_store::{
    AssociationStore, CampaignStore, InMemoryRosterStore, ReplaceRows, StoreResult,
};
use roster_types::{
    AssociationId, AssociationStatus, AuditAction, Campaign, CampaignId, Creator,
    CreatorAssociation, CreatorId,
};
use tokio::sync::Barrier;

struct World {
    engine: Arc<RosterEngine>,
    store: Arc<InMemoryRosterStore>,
    audit: Arc<InMemoryAuditSink>,
}

async fn world() -> World {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let store = Arc::new(InMemoryRosterStore::new());
    let audit = Arc::new(InMemoryAuditSink::new());
    let engine = Arc::new(RosterEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        audit.clone(),
    ));
    World {
        engine,
        store,
        audit,
    }
}

async fn campaign(world: &World, business: &str, contracted: u32) -> Campaign {
    let campaign = Campaign::new(business, "2026-08", contracted);
    world.store.insert_campaign(campaign.clone()).await;
    campaign
}

async fn creator(world: &World, name: &str) -> CreatorId {
    let creator = Creator::new(name);
    let id = creator.id;
    world.store.insert_creator(creator).await;
    id
}

#[tokio::test]
async fn fresh_campaign_shows_empty_slots_and_is_valid() {
    let world = world().await;
    campaign(&world, "Blue Door Bakery", 3).await;

    let view = world
        .engine
        .get_slots("Blue Door Bakery", "2026-08")
        .await
        .unwrap();
    assert_eq!(view.projection.slots.len(), 3);
    assert!(view.projection.slots.iter().all(|slot| slot.is_empty()));
    assert!(view.report.is_valid);
    assert_eq!(view.report.actual_count, 0);
}

#[tokio::test]
async fn swap_moves_the_slot_to_the_new_creator_with_one_update_entry() {
    let world = world().await;
    let campaign = campaign(&world, "Juniper Coffee", 2).await;
    let a = creator(&world, "a").await;
    let b = creator(&world, "b").await;

    let assigned = world
        .engine
        .assign_creator(campaign.id, a, "maria")
        .await
        .unwrap();
    world
        .engine
        .swap_creator(campaign.id, a, b, "maria")
        .await
        .unwrap();

    let projection = world.engine.project(campaign.id).await.unwrap();
    let slot0 = projection.slots[0].association.as_ref().unwrap();
    assert_eq!(slot0.creator_id, b);
    assert_eq!(slot0.id, assigned.id);

    let updates: Vec<_> = world
        .audit
        .entries()
        .await
        .into_iter()
        .filter(|entry| entry.action == AuditAction::Update)
        .collect();
    assert_eq!(updates.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_add_slot_calls_never_lose_an_update() {
    let world = world().await;
    campaign(&world, "Harbor Florist", 2).await;

    let mut handles = Vec::new();
    for i in 0..4 {
        let engine = world.engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .add_slot("Harbor Florist", "2026-08", &format!("user-{i}"))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = CampaignStore::find_by_business_month(
        world.store.as_ref(),
        "Harbor Florist",
        "2026-08",
    )
    .await
    .unwrap();
    assert_eq!(stored.contracted_slot_count, 6);
}

/// Association store that holds every `list_active` caller at a barrier,
/// so two operators pass their validation reads before either writes.
struct GatedAssociations {
    inner: Arc<InMemoryRosterStore>,
    gate: Arc<Barrier>,
}

#[async_trait]
impl AssociationStore for GatedAssociations {
    async fn get(&self, id: AssociationId) -> StoreResult<Option<CreatorAssociation>> {
        AssociationStore::get(self.inner.as_ref(), id).await
    }

    async fn list(&self, campaign_id: CampaignId) -> StoreResult<Vec<CreatorAssociation>> {
        AssociationStore::list(self.inner.as_ref(), campaign_id).await
    }

    async fn list_active(
        &self,
        campaign_id: CampaignId,
    ) -> StoreResult<Vec<CreatorAssociation>> {
        let rows = self.inner.list_active(campaign_id).await;
        self.gate.wait().await;
        rows
    }

    async fn insert_pending(
        &self,
        campaign_id: CampaignId,
        creator_id: CreatorId,
    ) -> StoreResult<CreatorAssociation> {
        self.inner.insert_pending(campaign_id, creator_id).await
    }

    async fn update_creator(
        &self,
        campaign_id: CampaignId,
        old_creator: CreatorId,
        new_creator: CreatorId,
    ) -> StoreResult<CreatorAssociation> {
        self.inner
            .update_creator(campaign_id, old_creator, new_creator)
            .await
    }

    async fn replace_creator(
        &self,
        campaign_id: CampaignId,
        old_creator: CreatorId,
        new_creator: CreatorId,
    ) -> StoreResult<ReplaceRows> {
        self.inner
            .replace_creator(campaign_id, old_creator, new_creator)
            .await
    }

    async fn remove_creator(
        &self,
        campaign_id: CampaignId,
        creator_id: CreatorId,
    ) -> StoreResult<CreatorAssociation> {
        self.inner.remove_creator(campaign_id, creator_id).await
    }

    async fn set_status(
        &self,
        id: AssociationId,
        status: AssociationStatus,
    ) -> StoreResult<CreatorAssociation> {
        self.inner.set_status(id, status).await
    }

    async fn insert_unchecked(&self, association: CreatorAssociation) -> StoreResult<()> {
        self.inner.insert_unchecked(association).await
    }
}

#[tokio::test]
async fn concurrent_assigns_cannot_overfill_the_last_slot() {
    let world = world().await;
    let campaign = campaign(&world, "Wild Fern Salon", 1).await;
    let a = creator(&world, "a").await;
    let b = creator(&world, "b").await;

    // Both assigns read an empty campaign before either inserts; the
    // insert transaction itself must hold the capacity line.
    let associations = Arc::new(GatedAssociations {
        inner: world.store.clone(),
        gate: Arc::new(Barrier::new(2)),
    });
    let engine = Arc::new(RosterEngine::new(
        world.store.clone(),
        associations,
        world.store.clone(),
        world.audit.clone(),
    ));

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.assign_creator(campaign.id, a, "maria").await })
    };
    let second = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.assign_creator(campaign.id, b, "jon").await })
    };
    let results = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|result| matches!(result, Err(EngineError::Conflict(_)))));

    let active = world.store.list_active(campaign.id).await.unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn swap_onto_an_occupied_creator_changes_nothing() {
    let world = world().await;
    let campaign = campaign(&world, "Cedar Tap House", 3).await;
    let a = creator(&world, "a").await;
    let b = creator(&world, "b").await;
    world.engine.assign_creator(campaign.id, a, "maria").await.unwrap();
    world.engine.assign_creator(campaign.id, b, "maria").await.unwrap();

    let before = world.engine.project(campaign.id).await.unwrap();
    let err = world
        .engine
        .swap_creator(campaign.id, a, b, "maria")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    let after = world.engine.project(campaign.id).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn injected_duplicate_is_healed_once_then_stays_healthy() {
    let world = world().await;
    let campaign = campaign(&world, "Gold Line Records", 3).await;
    let a = creator(&world, "a").await;
    world.engine.assign_creator(campaign.id, a, "maria").await.unwrap();

    // Drift: a duplicate active row inserted behind the engine's back.
    let duplicate = CreatorAssociation::new_pending(campaign.id, a);
    world.store.insert_unchecked(duplicate.clone()).await.unwrap();

    let report = world.engine.check_campaign(campaign.id).await.unwrap();
    assert!(!report.is_valid);

    let fix = world
        .engine
        .auto_fix(Some(campaign.id), "integrity-sweep")
        .await
        .unwrap();
    assert!(fix.applied);

    let report = world.engine.check_campaign(campaign.id).await.unwrap();
    assert!(report.is_valid);

    // Later duplicate lost; history preserved as a removed row.
    let row = AssociationStore::get(world.store.as_ref(), duplicate.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!row.is_active());

    let again = world
        .engine
        .auto_fix(Some(campaign.id), "integrity-sweep")
        .await
        .unwrap();
    assert!(!again.applied);
}

#[tokio::test]
async fn understaffing_is_not_drift() {
    let world = world().await;
    let campaign = campaign(&world, "Second Street Gym", 5).await;
    let a = creator(&world, "a").await;
    let b = creator(&world, "b").await;
    world.engine.assign_creator(campaign.id, a, "maria").await.unwrap();
    world.engine.assign_creator(campaign.id, b, "maria").await.unwrap();

    let report = world.engine.check_campaign(campaign.id).await.unwrap();
    assert!(report.is_valid);
    assert_eq!(report.expected_count, 5);
    assert_eq!(report.actual_count, 2);

    let fix = world
        .engine
        .auto_fix(Some(campaign.id), "integrity-sweep")
        .await
        .unwrap();
    assert!(!fix.applied);
}

#[tokio::test]
async fn replace_then_reassign_reactivates_the_removed_row() {
    let world = world().await;
    let campaign = campaign(&world, "Night Owl Diner", 2).await;
    let a = creator(&world, "a").await;
    let b = creator(&world, "b").await;

    world.engine.assign_creator(campaign.id, a, "maria").await.unwrap();
    let first = world
        .engine
        .replace_creator(campaign.id, a, b, "maria")
        .await
        .unwrap();
    assert!(!first.reactivated);

    // Replacing back reactivates a's removed row instead of duplicating it.
    let second = world
        .engine
        .replace_creator(campaign.id, b, a, "maria")
        .await
        .unwrap();
    assert!(second.reactivated);
    assert_eq!(second.created.id, first.removed.id);
}
