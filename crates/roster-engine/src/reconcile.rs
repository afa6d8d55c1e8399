//! Integrity checking and the auto-fix reconciler.
//!
//! The checker is a pure read. Auto-fix applies one bounded, deterministic
//! correction pass: for each duplicate creator it keeps the earliest row
//! (`created_at` ascending, then id) and soft-removes the rest.
//! Under-staffing and intentional over-capacity are left alone. After
//! writing it re-verifies once and reports residual issues in the result
//! message instead of looping.

use roster_types::{
    AssociationStatus, AuditAction, AuditEntityType, AuditLogEntry, CampaignId, IntegrityReport,
    IntegrityViolation,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::engine::RosterEngine;
use crate::error::EngineResult;

/// Outcome of one auto-fix invocation.
///
/// Write failures are downgraded into the message rather than propagated:
/// drift that cannot be fixed now stays visible in the next integrity
/// report and must not block the rest of the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixResult {
    /// Whether any correction was written.
    pub applied: bool,

    /// Operator-facing summary: what was corrected, what was left alone,
    /// and any residual issues found on re-verification.
    pub message: String,
}

impl RosterEngine {
    /// Check one campaign's staffing against its contract. Pure read.
    #[instrument(skip(self))]
    pub async fn check_campaign(&self, campaign_id: CampaignId) -> EngineResult<IntegrityReport> {
        let campaign = self.campaign(campaign_id).await?;
        let active = self.associations.list_active(campaign_id).await?;
        Ok(IntegrityReport::evaluate(&campaign, &active))
    }

    /// Check every campaign; used by periodic sweeps.
    #[instrument(skip(self))]
    pub async fn check_all(&self) -> EngineResult<Vec<IntegrityReport>> {
        let ids = self.campaigns.list_ids().await?;
        let mut reports = Vec::with_capacity(ids.len());
        for campaign_id in ids {
            reports.push(self.check_campaign(campaign_id).await?);
        }
        Ok(reports)
    }

    /// Apply one deterministic correction pass over the scope.
    ///
    /// `scope = None` sweeps every campaign. Only duplicate-creator drift
    /// is corrected; a second invocation with no intervening mutation is a
    /// no-op (`applied: false`).
    #[instrument(skip(self))]
    pub async fn auto_fix(
        &self,
        scope: Option<CampaignId>,
        actor: &str,
    ) -> EngineResult<FixResult> {
        let campaign_ids = match scope {
            Some(campaign_id) => {
                // Scope resolution failures propagate; everything past this
                // point is downgraded into the result message.
                self.campaign(campaign_id).await?;
                vec![campaign_id]
            }
            None => self.campaigns.list_ids().await?,
        };

        let mut removed_total = 0usize;
        let mut notes: Vec<String> = Vec::new();

        for campaign_id in campaign_ids {
            let report = match self.check_campaign(campaign_id).await {
                Ok(report) => report,
                Err(err) => {
                    warn!(campaign_id = %campaign_id, error = %err, "integrity check failed during auto-fix");
                    notes.push(format!("campaign {campaign_id}: check failed: {err}"));
                    continue;
                }
            };
            if report.is_valid {
                continue;
            }

            let mut fixed_here = false;
            for violation in &report.errors {
                match violation {
                    IntegrityViolation::DuplicateCreator {
                        creator_id,
                        association_ids,
                    } => {
                        let Some((keep, extras)) = association_ids.split_first() else {
                            continue;
                        };
                        for duplicate in extras {
                            match self
                                .associations
                                .set_status(*duplicate, AssociationStatus::Removed)
                                .await
                            {
                                Ok(_) => {
                                    removed_total += 1;
                                    fixed_here = true;
                                    info!(
                                        campaign_id = %campaign_id,
                                        creator_id = %creator_id,
                                        kept = %keep,
                                        removed = %duplicate,
                                        actor,
                                        "auto-fix removed duplicate association"
                                    );
                                    self.emit_audit(
                                        AuditLogEntry::new(
                                            AuditAction::AutoFix,
                                            AuditEntityType::Association,
                                            duplicate.to_string(),
                                            actor,
                                        )
                                        .with_old_value(json!({ "status": "pending_or_confirmed" }))
                                        .with_new_value(json!({ "status": "removed" }))
                                        .with_details(format!(
                                            "duplicate of {keep} for creator {creator_id} in campaign {campaign_id}"
                                        )),
                                    )
                                    .await;
                                }
                                Err(err) => {
                                    warn!(
                                        campaign_id = %campaign_id,
                                        association_id = %duplicate,
                                        error = %err,
                                        "auto-fix write failed"
                                    );
                                    notes.push(format!(
                                        "campaign {campaign_id}: failed to remove duplicate {duplicate}: {err}"
                                    ));
                                }
                            }
                        }
                    }
                    IntegrityViolation::OverCapacity { contracted, active } => {
                        // Intentional over-capacity: surfaced, never corrected.
                        notes.push(format!(
                            "campaign {campaign_id}: {active} active associations exceed {contracted} contracted slots, left for an operator"
                        ));
                    }
                }
            }

            // One bounded re-verification; residual drift is reported, not
            // retried.
            if fixed_here {
                match self.check_campaign(campaign_id).await {
                    Ok(after) if !after.is_valid => {
                        let residual: Vec<String> =
                            after.errors.iter().map(|e| e.to_string()).collect();
                        notes.push(format!(
                            "campaign {campaign_id}: residual issues after fix: {}",
                            residual.join("; ")
                        ));
                    }
                    Ok(_) => {}
                    Err(err) => {
                        notes.push(format!(
                            "campaign {campaign_id}: re-verification failed: {err}"
                        ));
                    }
                }
            }
        }

        let applied = removed_total > 0;
        let mut message = if applied {
            format!("soft-removed {removed_total} duplicate association(s)")
        } else {
            "nothing to fix".to_string()
        };
        if !notes.is_empty() {
            message.push_str("; ");
            message.push_str(&notes.join("; "));
        }

        Ok(FixResult { applied, message })
    }
}
