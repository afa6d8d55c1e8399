//! Integrity reports.
//!
//! An `IntegrityReport` is an ephemeral value object comparing a campaign's
//! contracted slot count with its actual active associations. It is produced
//! by the integrity checker, consumed by auto-fix and the polling client,
//! and never persisted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::association::CreatorAssociation;
use crate::campaign::Campaign;
use crate::ids::{AssociationId, CampaignId, CreatorId};

/// One detected invariant violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrityViolation {
    /// Two or more active rows share a creator. Auto-fixable: the earliest
    /// row (by `created_at`, then `id`) is kept, the rest are soft-removed.
    DuplicateCreator {
        creator_id: CreatorId,
        /// All active rows for the creator, in slot order (earliest first).
        association_ids: Vec<AssociationId>,
    },

    /// More active rows than contracted slots, with no duplicates involved.
    /// Surfaced to operators but never auto-corrected.
    OverCapacity { contracted: u32, active: u32 },
}

impl IntegrityViolation {
    /// Whether auto-fix has a deterministic correction for this violation.
    pub fn is_fixable(&self) -> bool {
        matches!(self, IntegrityViolation::DuplicateCreator { .. })
    }
}

impl std::fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityViolation::DuplicateCreator {
                creator_id,
                association_ids,
            } => write!(
                f,
                "creator {} holds {} active associations",
                creator_id,
                association_ids.len()
            ),
            IntegrityViolation::OverCapacity { contracted, active } => write!(
                f,
                "{} active associations exceed {} contracted slots",
                active, contracted
            ),
        }
    }
}

/// Result of checking one campaign's staffing against its contract.
///
/// Under-staffing (`actual_count < expected_count`) is a "not yet staffed"
/// state, not drift, and never appears in `errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub campaign_id: CampaignId,

    /// The campaign's `contracted_slot_count`.
    pub expected_count: u32,

    /// Count of active (non-removed) associations.
    pub actual_count: u32,

    /// True iff `errors` is empty.
    pub is_valid: bool,

    /// Detected violations, duplicates first.
    pub errors: Vec<IntegrityViolation>,
}

impl IntegrityReport {
    /// Evaluate a campaign against its active associations.
    ///
    /// `active` must already exclude removed rows; order does not matter.
    pub fn evaluate(campaign: &Campaign, active: &[CreatorAssociation]) -> Self {
        let mut by_creator: BTreeMap<CreatorId, Vec<&CreatorAssociation>> = BTreeMap::new();
        for assoc in active {
            by_creator.entry(assoc.creator_id).or_default().push(assoc);
        }

        let mut errors = Vec::new();
        let mut has_duplicates = false;
        for (creator_id, mut rows) in by_creator {
            if rows.len() > 1 {
                has_duplicates = true;
                rows.sort_by_key(|assoc| assoc.ordering_key());
                errors.push(IntegrityViolation::DuplicateCreator {
                    creator_id,
                    association_ids: rows.iter().map(|assoc| assoc.id).collect(),
                });
            }
        }

        let expected_count = campaign.contracted_slot_count;
        let actual_count = active.len() as u32;
        if actual_count > expected_count && !has_duplicates {
            errors.push(IntegrityViolation::OverCapacity {
                contracted: expected_count,
                active: actual_count,
            });
        }

        IntegrityReport {
            campaign_id: campaign.id,
            expected_count,
            actual_count,
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Duplicate-creator violations, the only class auto-fix corrects.
    pub fn duplicate_violations(&self) -> impl Iterator<Item = &IntegrityViolation> {
        self.errors.iter().filter(|violation| violation.is_fixable())
    }

    /// Whether auto-fix has anything to do for this report.
    pub fn has_fixable_drift(&self) -> bool {
        self.errors.iter().any(IntegrityViolation::is_fixable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::CreatorId;
    use chrono::{Duration, Utc};

    fn campaign(contracted: u32) -> Campaign {
        Campaign::new("Juniper Coffee", "2026-08", contracted)
    }

    fn assoc(campaign: &Campaign, creator_id: CreatorId, minutes_ago: i64) -> CreatorAssociation {
        let mut assoc = CreatorAssociation::new_pending(campaign.id, creator_id);
        assoc.created_at = Utc::now() - Duration::minutes(minutes_ago);
        assoc
    }

    #[test]
    fn empty_campaign_is_valid() {
        let campaign = campaign(3);
        let report = IntegrityReport::evaluate(&campaign, &[]);
        assert!(report.is_valid);
        assert_eq!(report.expected_count, 3);
        assert_eq!(report.actual_count, 0);
    }

    #[test]
    fn understaffed_campaign_is_valid() {
        let campaign = campaign(5);
        let active = vec![
            assoc(&campaign, CreatorId::generate(), 2),
            assoc(&campaign, CreatorId::generate(), 1),
        ];
        let report = IntegrityReport::evaluate(&campaign, &active);
        assert!(report.is_valid);
        assert_eq!(report.actual_count, 2);
    }

    #[test]
    fn duplicate_creator_is_flagged_earliest_first() {
        let campaign = campaign(3);
        let creator = CreatorId::generate();
        let older = assoc(&campaign, creator, 10);
        let newer = assoc(&campaign, creator, 1);

        let report = IntegrityReport::evaluate(&campaign, &[newer.clone(), older.clone()]);
        assert!(!report.is_valid);
        assert!(report.has_fixable_drift());
        match &report.errors[0] {
            IntegrityViolation::DuplicateCreator {
                creator_id,
                association_ids,
            } => {
                assert_eq!(*creator_id, creator);
                assert_eq!(association_ids, &vec![older.id, newer.id]);
            }
            other => panic!("unexpected violation: {other:?}"),
        }
    }

    #[test]
    fn over_capacity_without_duplicates_is_invalid_but_not_fixable() {
        let campaign = campaign(1);
        let active = vec![
            assoc(&campaign, CreatorId::generate(), 2),
            assoc(&campaign, CreatorId::generate(), 1),
        ];
        let report = IntegrityReport::evaluate(&campaign, &active);
        assert!(!report.is_valid);
        assert!(!report.has_fixable_drift());
        assert_eq!(
            report.errors,
            vec![IntegrityViolation::OverCapacity {
                contracted: 1,
                active: 2
            }]
        );
    }
}
