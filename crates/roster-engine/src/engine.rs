//! The reconciliation engine: slot reads and mutation operators.
//!
//! Every operator performs one minimal, targeted write through the store
//! traits (each store call is one transaction) and emits an audit entry.
//! Audit emission is fire-and-forget: sink failures are logged at `warn`
//! and never fail the mutation.

use std::sync::Arc;

use roster_audit::AuditSink;
use roster_store::{AssociationStore, CampaignStore, CreatorDirectory, StoreError};
use roster_types::{
    project_slots, AuditAction, AuditEntityType, AuditLogEntry, Campaign, CampaignId, Creator,
    CreatorAssociation, CreatorId, IntegrityReport, SlotProjection,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::error::{EngineError, EngineResult};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How many times `add_slot` re-reads and retries after losing a
    /// compare-and-swap race before surfacing `Conflict`.
    pub cas_retry_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { cas_retry_limit: 8 }
    }
}

/// Everything the slots view needs for one campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotsView {
    /// Ordered slots plus any over-capacity rows.
    pub projection: SlotProjection,

    /// Creators not currently active in the campaign.
    pub available_creators: Vec<Creator>,

    /// Current integrity state, for validation flags in the view.
    pub report: IntegrityReport,
}

/// Outcome of a replace operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceOutcome {
    /// The old creator's association, now removed.
    pub removed: CreatorAssociation,

    /// The new creator's association.
    pub created: CreatorAssociation,

    /// True when an existing removed row was reactivated instead of a new
    /// identity being created.
    pub reactivated: bool,
}

/// Campaign slot reconciliation engine.
///
/// Stateless across calls; all shared state lives behind the injected
/// store traits, so concurrent invocations coordinate exclusively through
/// the store's constraints.
pub struct RosterEngine {
    pub(crate) campaigns: Arc<dyn CampaignStore>,
    pub(crate) associations: Arc<dyn AssociationStore>,
    creators: Arc<dyn CreatorDirectory>,
    audit: Arc<dyn AuditSink>,
    config: EngineConfig,
}

impl RosterEngine {
    pub fn new(
        campaigns: Arc<dyn CampaignStore>,
        associations: Arc<dyn AssociationStore>,
        creators: Arc<dyn CreatorDirectory>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self::with_config(campaigns, associations, creators, audit, EngineConfig::default())
    }

    pub fn with_config(
        campaigns: Arc<dyn CampaignStore>,
        associations: Arc<dyn AssociationStore>,
        creators: Arc<dyn CreatorDirectory>,
        audit: Arc<dyn AuditSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            campaigns,
            associations,
            creators,
            audit,
            config,
        }
    }

    pub(crate) async fn campaign(&self, id: CampaignId) -> EngineResult<Campaign> {
        Ok(self
            .campaigns
            .get(id)
            .await?
            .ok_or(StoreError::CampaignMissing(id))?)
    }

    async fn require_creator(&self, id: CreatorId) -> EngineResult<Creator> {
        Ok(self
            .creators
            .get(id)
            .await?
            .ok_or(StoreError::CreatorMissing(id))?)
    }

    pub(crate) async fn emit_audit(&self, entry: AuditLogEntry) {
        if let Err(err) = self.audit.emit(entry).await {
            warn!(error = %err, "audit emission failed, entry dropped");
        }
    }

    /// Derive the current slot view for a campaign. Pure read.
    #[instrument(skip(self))]
    pub async fn project(&self, campaign_id: CampaignId) -> EngineResult<SlotProjection> {
        let campaign = self.campaign(campaign_id).await?;
        let active = self.associations.list_active(campaign_id).await?;
        Ok(project_slots(campaign, active))
    }

    /// Resolve a campaign by business + month and build the full slots
    /// view: projection, available creators, and validation flags.
    #[instrument(skip(self))]
    pub async fn get_slots(&self, business_name: &str, month: &str) -> EngineResult<SlotsView> {
        let campaign = self
            .campaigns
            .find_by_business_month(business_name, month)
            .await?;
        let active = self.associations.list_active(campaign.id).await?;
        let report = IntegrityReport::evaluate(&campaign, &active);
        let projection = project_slots(campaign, active);

        let occupied: Vec<CreatorId> = projection
            .active
            .iter()
            .map(|assoc| assoc.creator_id)
            .collect();
        let available_creators = self
            .creators
            .list()
            .await?
            .into_iter()
            .filter(|creator| !occupied.contains(&creator.id))
            .collect();

        Ok(SlotsView {
            projection,
            available_creators,
            report,
        })
    }

    /// Grow the contracted slot count by exactly one.
    ///
    /// The new slot starts empty; a subsequent [`assign_creator`] fills it.
    /// A lost compare-and-swap race is retried with the freshly observed
    /// count, bounded by `cas_retry_limit`; two concurrent calls therefore
    /// never both succeed against a stale count, and neither update is lost.
    #[instrument(skip(self))]
    pub async fn add_slot(
        &self,
        business_name: &str,
        month: &str,
        actor: &str,
    ) -> EngineResult<u32> {
        let campaign = self
            .campaigns
            .find_by_business_month(business_name, month)
            .await?;

        let mut expected = campaign.contracted_slot_count;
        for attempt in 0..self.config.cas_retry_limit {
            match self
                .campaigns
                .compare_and_swap_slot_count(campaign.id, expected, expected + 1)
                .await
            {
                Ok(new_count) => {
                    info!(
                        campaign_id = %campaign.id,
                        old_count = expected,
                        new_count,
                        actor,
                        "slot added"
                    );
                    self.emit_audit(
                        AuditLogEntry::new(
                            AuditAction::Update,
                            AuditEntityType::Campaign,
                            campaign.id.to_string(),
                            actor,
                        )
                        .with_old_value(json!({ "contracted_slot_count": expected }))
                        .with_new_value(json!({ "contracted_slot_count": new_count }))
                        .with_details(format!(
                            "add slot for {business_name} {month}"
                        )),
                    )
                    .await;
                    return Ok(new_count);
                }
                Err(StoreError::SlotCountRace { found, .. }) => {
                    debug!(campaign_id = %campaign.id, attempt, expected, found, "lost slot count race, retrying");
                    expected = found;
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(EngineError::Conflict(format!(
            "slot count for campaign {} kept changing concurrently, gave up after {} attempts",
            campaign.id, self.config.cas_retry_limit
        )))
    }

    /// Assign a creator to the first empty slot as a `Pending` association.
    ///
    /// Rejects with `Conflict` when the campaign is already fully staffed
    /// or the creator already holds an active association in it. The
    /// capacity read here only shapes the error message; the store's
    /// insert transaction re-checks both constraints, so a concurrent
    /// assign cannot slip past a stale read.
    #[instrument(skip(self))]
    pub async fn assign_creator(
        &self,
        campaign_id: CampaignId,
        creator_id: CreatorId,
        actor: &str,
    ) -> EngineResult<CreatorAssociation> {
        let campaign = self.campaign(campaign_id).await?;
        self.require_creator(creator_id).await?;

        let active = self.associations.list_active(campaign_id).await?;
        if active.len() as u32 >= campaign.contracted_slot_count {
            return Err(EngineError::Conflict(format!(
                "campaign {} is fully staffed ({} of {} slots)",
                campaign_id,
                active.len(),
                campaign.contracted_slot_count
            )));
        }

        let association = self
            .associations
            .insert_pending(campaign_id, creator_id)
            .await?;

        info!(campaign_id = %campaign_id, creator_id = %creator_id, actor, "creator assigned");
        self.emit_audit(
            AuditLogEntry::new(
                AuditAction::Create,
                AuditEntityType::Association,
                association.id.to_string(),
                actor,
            )
            .with_new_value(json!({
                "campaign_id": campaign_id.to_string(),
                "creator_id": creator_id.to_string(),
                "status": association.status.as_str(),
            })),
        )
        .await;

        Ok(association)
    }

    /// In-place creator change, preserving association identity.
    ///
    /// The association keeps its id, status, deliverables, and history, so
    /// downstream references (deliverable tracking tied to the association
    /// id) survive the swap. Fails with `Conflict` when the new creator
    /// already holds a separate active association in the campaign.
    #[instrument(skip(self))]
    pub async fn swap_creator(
        &self,
        campaign_id: CampaignId,
        old_creator: CreatorId,
        new_creator: CreatorId,
        actor: &str,
    ) -> EngineResult<CreatorAssociation> {
        let campaign = self.campaign(campaign_id).await?;
        self.require_creator(new_creator).await?;

        let updated = self
            .associations
            .update_creator(campaign_id, old_creator, new_creator)
            .await?;

        info!(
            campaign_id = %campaign_id,
            association_id = %updated.id,
            old_creator = %old_creator,
            new_creator = %new_creator,
            actor,
            "creator swapped in place"
        );
        self.emit_audit(
            AuditLogEntry::new(
                AuditAction::Update,
                AuditEntityType::Association,
                updated.id.to_string(),
                actor,
            )
            .with_old_value(json!({ "creator_id": old_creator.to_string() }))
            .with_new_value(json!({ "creator_id": new_creator.to_string() }))
            .with_details(format!(
                "swap in campaign {} ({} {})",
                campaign_id, campaign.business_name, campaign.month
            )),
        )
        .await;

        Ok(updated)
    }

    /// Replace a creator with a fresh association identity.
    ///
    /// The old association is soft-removed and the new creator gets a new
    /// `Pending` row (or a reactivated previously-removed one), so
    /// deliverable tracking starts clean. Callers choose between this and
    /// [`swap_creator`] based on whether history should carry over.
    #[instrument(skip(self))]
    pub async fn replace_creator(
        &self,
        campaign_id: CampaignId,
        old_creator: CreatorId,
        new_creator: CreatorId,
        actor: &str,
    ) -> EngineResult<ReplaceOutcome> {
        self.campaign(campaign_id).await?;
        self.require_creator(new_creator).await?;

        let rows = self
            .associations
            .replace_creator(campaign_id, old_creator, new_creator)
            .await?;

        info!(
            campaign_id = %campaign_id,
            removed_association = %rows.removed.id,
            created_association = %rows.created.id,
            reactivated = rows.reactivated,
            actor,
            "creator replaced"
        );
        self.emit_audit(
            AuditLogEntry::new(
                AuditAction::Remove,
                AuditEntityType::Association,
                rows.removed.id.to_string(),
                actor,
            )
            .with_old_value(json!({ "creator_id": old_creator.to_string() }))
            .with_details(format!("replaced by creator {new_creator} in campaign {campaign_id}")),
        )
        .await;
        self.emit_audit(
            AuditLogEntry::new(
                AuditAction::Create,
                AuditEntityType::Association,
                rows.created.id.to_string(),
                actor,
            )
            .with_new_value(json!({
                "campaign_id": campaign_id.to_string(),
                "creator_id": new_creator.to_string(),
                "reactivated": rows.reactivated,
            })),
        )
        .await;

        Ok(ReplaceOutcome {
            removed: rows.removed,
            created: rows.created,
            reactivated: rows.reactivated,
        })
    }

    /// Soft-remove a creator's active association, freeing its slot.
    #[instrument(skip(self))]
    pub async fn remove_creator(
        &self,
        campaign_id: CampaignId,
        creator_id: CreatorId,
        actor: &str,
    ) -> EngineResult<CreatorAssociation> {
        self.campaign(campaign_id).await?;
        let removed = self
            .associations
            .remove_creator(campaign_id, creator_id)
            .await?;

        info!(campaign_id = %campaign_id, creator_id = %creator_id, actor, "creator removed");
        self.emit_audit(
            AuditLogEntry::new(
                AuditAction::Remove,
                AuditEntityType::Association,
                removed.id.to_string(),
                actor,
            )
            .with_old_value(json!({ "creator_id": creator_id.to_string() })),
        )
        .await;

        Ok(removed)
    }
}
