//! Campaign and creator records.
//!
//! Both are owned by the external record store; this core reads them and
//! adjusts exactly one campaign field (`contracted_slot_count`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CampaignId, CreatorId};

/// A business + month sponsored-content engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique campaign identifier.
    pub id: CampaignId,

    /// Name of the sponsoring local business.
    pub business_name: String,

    /// Engagement month, an opaque `"YYYY-MM"` key.
    pub month: String,

    /// Number of creator slots the business has contracted.
    ///
    /// Mutable only via `AddSlot` (or an admin edit outside this core).
    pub contracted_slot_count: u32,

    /// Free-text workflow stage. Not interpreted by this core.
    pub status: String,

    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Create a campaign record with the given contracted slot count.
    pub fn new(
        business_name: impl Into<String>,
        month: impl Into<String>,
        contracted_slot_count: u32,
    ) -> Self {
        Self {
            id: CampaignId::generate(),
            business_name: business_name.into(),
            month: month.into(),
            contracted_slot_count,
            status: "active".to_string(),
            created_at: Utc::now(),
        }
    }
}

/// A content creator record, read-only to this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    /// Unique creator identifier.
    pub id: CreatorId,

    /// Display name shown in slot views.
    pub display_name: String,
}

impl Creator {
    /// Create a creator record.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: CreatorId::generate(),
            display_name: display_name.into(),
        }
    }
}
