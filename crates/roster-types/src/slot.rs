//! Logical slot projection.
//!
//! Slots are derived on every read and never stored. Slot `i` holds the
//! `i`-th active association ordered by `(created_at, id)` ascending; slots
//! beyond the number of active rows are empty. Active rows beyond the
//! contracted count are kept visible as overflow rather than truncated, so
//! callers can surface over-capacity as drift.

use serde::{Deserialize, Serialize};

use crate::association::CreatorAssociation;
use crate::campaign::Campaign;

/// One contracted creator position in a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Position index, `0..contracted_slot_count`.
    pub index: u32,

    /// Association occupying this slot, if any.
    pub association: Option<CreatorAssociation>,
}

impl Slot {
    /// Whether the slot is unstaffed.
    pub fn is_empty(&self) -> bool {
        self.association.is_none()
    }
}

/// Derived view of a campaign's staffing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotProjection {
    /// The campaign the view was derived from.
    pub campaign: Campaign,

    /// Exactly `contracted_slot_count` slots, in order.
    pub slots: Vec<Slot>,

    /// All active associations in slot order, including any overflow.
    pub active: Vec<CreatorAssociation>,
}

impl SlotProjection {
    /// Active associations that did not fit into a contracted slot.
    pub fn overflow(&self) -> &[CreatorAssociation] {
        let contracted = self.campaign.contracted_slot_count as usize;
        if self.active.len() > contracted {
            &self.active[contracted..]
        } else {
            &[]
        }
    }

    /// Whether more active rows exist than contracted slots.
    pub fn is_over_capacity(&self) -> bool {
        !self.overflow().is_empty()
    }

    /// Whether every contracted slot is staffed.
    pub fn is_fully_staffed(&self) -> bool {
        self.slots.iter().all(|slot| !slot.is_empty())
    }
}

/// Project a campaign's associations onto its contracted slots.
///
/// Pure: removed rows are filtered out, the remainder is sorted by
/// `(created_at, id)` ascending, and the first `contracted_slot_count` rows
/// fill the slots in order. Input order does not matter.
pub fn project_slots(
    campaign: Campaign,
    associations: Vec<CreatorAssociation>,
) -> SlotProjection {
    let mut active: Vec<CreatorAssociation> = associations
        .into_iter()
        .filter(CreatorAssociation::is_active)
        .collect();
    active.sort_by_key(CreatorAssociation::ordering_key);

    let slots = (0..campaign.contracted_slot_count)
        .map(|index| Slot {
            index,
            association: active.get(index as usize).cloned(),
        })
        .collect();

    SlotProjection {
        campaign,
        slots,
        active,
    }
}
