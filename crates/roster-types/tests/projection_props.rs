//! Property tests for the slot projector.

use chrono::{Duration, Utc};
use proptest::prelude::*;
use roster_types::{project_slots, AssociationStatus, Campaign, CreatorAssociation, CreatorId};

fn build_associations(campaign: &Campaign, rows: &[(i64, bool)]) -> Vec<CreatorAssociation> {
    rows.iter()
        .map(|(minutes_ago, removed)| {
            let mut assoc = CreatorAssociation::new_pending(campaign.id, CreatorId::generate());
            assoc.created_at = Utc::now() - Duration::minutes(*minutes_ago);
            if *removed {
                assoc.status = AssociationStatus::Removed;
            }
            assoc
        })
        .collect()
}

proptest! {
    #[test]
    fn slot_count_always_matches_contract(
        contracted in 0u32..6,
        rows in proptest::collection::vec((0i64..10_000, any::<bool>()), 0..8),
    ) {
        let campaign = Campaign::new("Prop Biz", "2026-01", contracted);
        let associations = build_associations(&campaign, &rows);
        let projection = project_slots(campaign, associations);

        prop_assert_eq!(projection.slots.len(), contracted as usize);
    }

    #[test]
    fn every_active_row_is_projected_exactly_once(
        contracted in 0u32..6,
        rows in proptest::collection::vec((0i64..10_000, any::<bool>()), 0..8),
    ) {
        let campaign = Campaign::new("Prop Biz", "2026-01", contracted);
        let associations = build_associations(&campaign, &rows);
        let active_expected = associations.iter().filter(|a| a.is_active()).count();
        let projection = project_slots(campaign, associations);

        prop_assert_eq!(projection.active.len(), active_expected);
        let staffed = projection.slots.iter().filter(|s| !s.is_empty()).count();
        prop_assert_eq!(staffed + projection.overflow().len(), active_expected);

        // Slot order is the global ordering key order.
        let keys: Vec<_> = projection.active.iter().map(|a| a.ordering_key()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        prop_assert_eq!(keys, sorted);
    }

    #[test]
    fn projection_is_independent_of_input_order(
        contracted in 0u32..6,
        rows in proptest::collection::vec((0i64..10_000, any::<bool>()), 0..8),
    ) {
        let campaign = Campaign::new("Prop Biz", "2026-01", contracted);
        let associations = build_associations(&campaign, &rows);
        let mut reversed = associations.clone();
        reversed.reverse();

        let forward = project_slots(campaign.clone(), associations);
        let backward = project_slots(campaign, reversed);
        prop_assert_eq!(forward, backward);
    }
}
