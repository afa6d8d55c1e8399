//! Roster Service - request/response facade over the reconciliation core.
//!
//! The presentation layer talks to this crate through serde-serializable
//! request and response types, one pair per operation. The facade holds no
//! state of its own; it validates nothing the engine does not already
//! validate and adds no behavior beyond shaping inputs and outputs.
//!
//! Authentication, session handling, and page rendering live entirely
//! outside this crate.

#![deny(unsafe_code)]

use std::sync::Arc;

use roster_engine::{EngineResult, FixResult, ReplaceOutcome, RosterEngine, SlotsView};
use roster_types::{
    CampaignId, Creator, CreatorAssociation, CreatorId, IntegrityReport, Slot,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Inputs for `GetSlots`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSlotsRequest {
    pub business_name: String,
    pub month: String,
}

/// `GetSlots` response: ordered slots plus everything the view renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSlotsResponse {
    pub campaign_id: CampaignId,
    pub contracted_slot_count: u32,
    pub slots: Vec<Slot>,
    /// Active rows beyond the contracted count, surfaced as drift.
    pub overflow: Vec<CreatorAssociation>,
    pub available_creators: Vec<Creator>,
    /// Validation flags for the view.
    pub report: IntegrityReport,
}

/// Inputs for `AddSlot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddSlotRequest {
    pub business_name: String,
    pub month: String,
    pub actor: String,
}

/// `AddSlot` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddSlotResponse {
    pub new_contracted_slot_count: u32,
}

/// Inputs for `AssignCreator`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignCreatorRequest {
    pub campaign_id: CampaignId,
    pub creator_id: CreatorId,
    pub actor: String,
}

/// Inputs for `SwapCreator` and `ReplaceCreator`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeCreatorRequest {
    pub campaign_id: CampaignId,
    pub old_creator_id: CreatorId,
    pub new_creator_id: CreatorId,
    pub actor: String,
}

/// Inputs for `RemoveCreator`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveCreatorRequest {
    pub campaign_id: CampaignId,
    pub creator_id: CreatorId,
    pub actor: String,
}

/// `ReplaceCreator` response summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceCreatorResponse {
    pub removed_association_id: String,
    pub new_association: CreatorAssociation,
    pub reactivated: bool,
}

/// Inputs for `CheckIntegrity`; omit `campaign_id` for a system-wide sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIntegrityRequest {
    pub campaign_id: Option<CampaignId>,
}

/// Inputs for `AutoFix`; omit `campaign_id` for a system-wide sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoFixRequest {
    pub campaign_id: Option<CampaignId>,
    pub actor: String,
}

/// Stateless facade over [`RosterEngine`].
pub struct RosterService {
    engine: Arc<RosterEngine>,
}

impl RosterService {
    pub fn new(engine: Arc<RosterEngine>) -> Self {
        Self { engine }
    }

    #[instrument(skip(self, request), fields(business = %request.business_name, month = %request.month))]
    pub async fn get_slots(&self, request: GetSlotsRequest) -> EngineResult<GetSlotsResponse> {
        let SlotsView {
            projection,
            available_creators,
            report,
        } = self
            .engine
            .get_slots(&request.business_name, &request.month)
            .await?;

        Ok(GetSlotsResponse {
            campaign_id: projection.campaign.id,
            contracted_slot_count: projection.campaign.contracted_slot_count,
            overflow: projection.overflow().to_vec(),
            slots: projection.slots,
            available_creators,
            report,
        })
    }

    #[instrument(skip(self, request), fields(business = %request.business_name, month = %request.month))]
    pub async fn add_slot(&self, request: AddSlotRequest) -> EngineResult<AddSlotResponse> {
        let new_contracted_slot_count = self
            .engine
            .add_slot(&request.business_name, &request.month, &request.actor)
            .await?;
        Ok(AddSlotResponse {
            new_contracted_slot_count,
        })
    }

    #[instrument(skip(self, request), fields(campaign_id = %request.campaign_id))]
    pub async fn assign_creator(
        &self,
        request: AssignCreatorRequest,
    ) -> EngineResult<CreatorAssociation> {
        self.engine
            .assign_creator(request.campaign_id, request.creator_id, &request.actor)
            .await
    }

    #[instrument(skip(self, request), fields(campaign_id = %request.campaign_id))]
    pub async fn swap_creator(
        &self,
        request: ChangeCreatorRequest,
    ) -> EngineResult<CreatorAssociation> {
        self.engine
            .swap_creator(
                request.campaign_id,
                request.old_creator_id,
                request.new_creator_id,
                &request.actor,
            )
            .await
    }

    #[instrument(skip(self, request), fields(campaign_id = %request.campaign_id))]
    pub async fn replace_creator(
        &self,
        request: ChangeCreatorRequest,
    ) -> EngineResult<ReplaceCreatorResponse> {
        let ReplaceOutcome {
            removed,
            created,
            reactivated,
        } = self
            .engine
            .replace_creator(
                request.campaign_id,
                request.old_creator_id,
                request.new_creator_id,
                &request.actor,
            )
            .await?;

        Ok(ReplaceCreatorResponse {
            removed_association_id: removed.id.to_string(),
            new_association: created,
            reactivated,
        })
    }

    #[instrument(skip(self, request), fields(campaign_id = %request.campaign_id))]
    pub async fn remove_creator(
        &self,
        request: RemoveCreatorRequest,
    ) -> EngineResult<CreatorAssociation> {
        self.engine
            .remove_creator(request.campaign_id, request.creator_id, &request.actor)
            .await
    }

    #[instrument(skip(self, request))]
    pub async fn check_integrity(
        &self,
        request: CheckIntegrityRequest,
    ) -> EngineResult<Vec<IntegrityReport>> {
        match request.campaign_id {
            Some(campaign_id) => Ok(vec![self.engine.check_campaign(campaign_id).await?]),
            None => self.engine.check_all().await,
        }
    }

    #[instrument(skip(self, request))]
    pub async fn auto_fix(&self, request: AutoFixRequest) -> EngineResult<FixResult> {
        self.engine
            .auto_fix(request.campaign_id, &request.actor)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_audit::InMemoryAuditSink;
    use roster_store::InMemoryRosterStore;
    use roster_types::Campaign;

    async fn service() -> (RosterService, Arc<InMemoryRosterStore>, Campaign) {
        let store = Arc::new(InMemoryRosterStore::new());
        let audit = Arc::new(InMemoryAuditSink::new());
        let campaign = Campaign::new("Blue Door Bakery", "2026-09", 2);
        store.insert_campaign(campaign.clone()).await;
        let engine = Arc::new(RosterEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            audit,
        ));
        (RosterService::new(engine), store, campaign)
    }

    #[tokio::test]
    async fn get_slots_shapes_the_view_response() {
        let (service, store, campaign) = service().await;
        let creator = Creator::new("@rivertown.eats");
        store.insert_creator(creator.clone()).await;

        let response = service
            .get_slots(GetSlotsRequest {
                business_name: "Blue Door Bakery".into(),
                month: "2026-09".into(),
            })
            .await
            .unwrap();

        assert_eq!(response.campaign_id, campaign.id);
        assert_eq!(response.slots.len(), 2);
        assert!(response.overflow.is_empty());
        assert_eq!(response.available_creators.len(), 1);
        assert!(response.report.is_valid);
    }

    #[tokio::test]
    async fn add_slot_returns_the_new_count() {
        let (service, _store, _campaign) = service().await;
        let response = service
            .add_slot(AddSlotRequest {
                business_name: "Blue Door Bakery".into(),
                month: "2026-09".into(),
                actor: "maria".into(),
            })
            .await
            .unwrap();
        assert_eq!(response.new_contracted_slot_count, 3);
    }

    #[tokio::test]
    async fn responses_serialize_for_the_presentation_layer() {
        let (service, _store, campaign) = service().await;
        let response = service
            .check_integrity(CheckIntegrityRequest {
                campaign_id: Some(campaign.id),
            })
            .await
            .unwrap();

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json[0]["is_valid"], serde_json::Value::Bool(true));
    }
}
