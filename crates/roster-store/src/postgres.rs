//! Postgres storage backend.
//!
//! Each mutating method runs in one SQL transaction with `FOR UPDATE` row
//! locks; the partial unique index `uq_active_campaign_creator` is the
//! authoritative enforcement of active-creator uniqueness, independent of
//! any application-level pre-check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roster_types::{
    AssociationId, AssociationStatus, Campaign, CampaignId, Creator, CreatorAssociation,
    CreatorId,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::traits::{AssociationStore, CampaignStore, CreatorDirectory, ReplaceRows};

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

const ASSOCIATION_COLUMNS: &str =
    "id, campaign_id, creator_id, status, deliverables, created_at";

/// Relational backend over a shared `PgPool`.
pub struct PostgresRosterStore {
    pool: PgPool,
}

impl PostgresRosterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the schema migration. Idempotent.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Seed a campaign record.
    pub async fn insert_campaign(&self, campaign: &Campaign) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO campaigns (id, business_name, month, contracted_slot_count, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(campaign.id.as_uuid())
        .bind(&campaign.business_name)
        .bind(&campaign.month)
        .bind(campaign.contracted_slot_count as i32)
        .bind(&campaign.status)
        .bind(campaign.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Seed a creator record.
    pub async fn insert_creator(&self, creator: &Creator) -> StoreResult<()> {
        sqlx::query("INSERT INTO creators (id, display_name) VALUES ($1, $2)")
            .bind(creator.id.as_uuid())
            .bind(&creator.display_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn campaign_from_row(row: &PgRow) -> StoreResult<Campaign> {
    let id: Uuid = row.try_get("id")?;
    let count: i32 = row.try_get("contracted_slot_count")?;
    Ok(Campaign {
        id: CampaignId::from_uuid(id),
        business_name: row.try_get("business_name")?,
        month: row.try_get("month")?,
        contracted_slot_count: count as u32,
        status: row.try_get("status")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn association_from_row(row: &PgRow) -> StoreResult<CreatorAssociation> {
    let id: Uuid = row.try_get("id")?;
    let campaign_id: Uuid = row.try_get("campaign_id")?;
    let creator_id: Uuid = row.try_get("creator_id")?;
    let status: String = row.try_get("status")?;
    let deliverables: Option<serde_json::Value> = row.try_get("deliverables")?;
    Ok(CreatorAssociation {
        id: AssociationId::from_uuid(id),
        campaign_id: CampaignId::from_uuid(campaign_id),
        creator_id: CreatorId::from_uuid(creator_id),
        status: status
            .parse::<AssociationStatus>()
            .map_err(|err| StoreError::Backend(err.to_string()))?,
        deliverables: deliverables.unwrap_or(serde_json::Value::Null),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

/// Translate a partial-unique-index violation into the store's conflict
/// error; everything else stays a backend failure.
fn map_unique_violation(
    err: sqlx::Error,
    campaign_id: CampaignId,
    creator_id: CreatorId,
) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.constraint() == Some("uq_active_campaign_creator") {
            return StoreError::UniqueViolation {
                campaign_id,
                creator_id,
            };
        }
    }
    err.into()
}

#[async_trait]
impl CampaignStore for PostgresRosterStore {
    async fn get(&self, id: CampaignId) -> StoreResult<Option<Campaign>> {
        let row = sqlx::query(
            "SELECT id, business_name, month, contracted_slot_count, status, created_at \
             FROM campaigns WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(campaign_from_row).transpose()
    }

    async fn find_by_business_month(
        &self,
        business_name: &str,
        month: &str,
    ) -> StoreResult<Campaign> {
        let rows = sqlx::query(
            "SELECT id, business_name, month, contracted_slot_count, status, created_at \
             FROM campaigns WHERE business_name = $1 AND month = $2",
        )
        .bind(business_name)
        .bind(month)
        .fetch_all(&self.pool)
        .await?;

        match rows.as_slice() {
            [] => Err(StoreError::CampaignNotFound {
                business_name: business_name.to_string(),
                month: month.to_string(),
            }),
            [row] => campaign_from_row(row),
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
        let result = sqlx::query(
            "UPDATE campaigns SET contracted_slot_count = $3 \
             WHERE id = $1 AND contracted_slot_count = $2",
        )
        .bind(id.as_uuid())
        .bind(expected as i32)
        .bind(new as i32)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            debug!(campaign_id = %id, old = expected, new, "slot count updated");
            return Ok(new);
        }

        // Distinguish a lost race from a missing campaign.
        let row = sqlx::query("SELECT contracted_slot_count FROM campaigns WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let found: i32 = row.try_get("contracted_slot_count")?;
                Err(StoreError::SlotCountRace {
                    campaign_id: id,
                    expected,
                    found: found as u32,
                })
            }
            None => Err(StoreError::CampaignMissing(id)),
        }
    }

    async fn list_ids(&self) -> StoreResult<Vec<CampaignId>> {
        let rows = sqlx::query("SELECT id FROM campaigns")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| Ok(CampaignId::from_uuid(row.try_get("id")?)))
            .collect()
    }
}

#[async_trait]
impl AssociationStore for PostgresRosterStore {
    async fn get(&self, id: AssociationId) -> StoreResult<Option<CreatorAssociation>> {
        let row = sqlx::query(&format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM creator_associations WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(association_from_row).transpose()
    }

    async fn list(&self, campaign_id: CampaignId) -> StoreResult<Vec<CreatorAssociation>> {
        let rows = sqlx::query(&format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM creator_associations WHERE campaign_id = $1"
        ))
        .bind(campaign_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(association_from_row).collect()
    }

    async fn list_active(
        &self,
        campaign_id: CampaignId,
    ) -> StoreResult<Vec<CreatorAssociation>> {
        let rows = sqlx::query(&format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM creator_associations \
             WHERE campaign_id = $1 AND status <> 'removed'"
        ))
        .bind(campaign_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(association_from_row).collect()
    }

    async fn insert_pending(
        &self,
        campaign_id: CampaignId,
        creator_id: CreatorId,
    ) -> StoreResult<CreatorAssociation> {
        let mut tx = self.pool.begin().await?;

        // Lock the campaign row so the capacity check and the insert are
        // one serialized unit per campaign (Invariant B gate).
        let row = sqlx::query(
            "SELECT contracted_slot_count FROM campaigns WHERE id = $1 FOR UPDATE",
        )
        .bind(campaign_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::CampaignMissing(campaign_id))?;
        let contracted: i32 = row.try_get("contracted_slot_count")?;

        let active: i64 = sqlx::query(
            "SELECT COUNT(*) AS active FROM creator_associations \
             WHERE campaign_id = $1 AND status <> 'removed'",
        )
        .bind(campaign_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?
        .try_get("active")?;
        if active >= contracted as i64 {
            return Err(StoreError::FullyStaffed {
                campaign_id,
                contracted: contracted as u32,
            });
        }

        let association = CreatorAssociation::new_pending(campaign_id, creator_id);
        sqlx::query(
            "INSERT INTO creator_associations \
             (id, campaign_id, creator_id, status, deliverables, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(association.id.as_uuid())
        .bind(campaign_id.as_uuid())
        .bind(creator_id.as_uuid())
        .bind(association.status.as_str())
        .bind(&association.deliverables)
        .bind(association.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| map_unique_violation(err, campaign_id, creator_id))?;

        tx.commit().await?;
        Ok(association)
    }

    async fn update_creator(
        &self,
        campaign_id: CampaignId,
        old_creator: CreatorId,
        new_creator: CreatorId,
    ) -> StoreResult<CreatorAssociation> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM creator_associations \
             WHERE campaign_id = $1 AND creator_id = $2 AND status <> 'removed' \
             FOR UPDATE"
        ))
        .bind(campaign_id.as_uuid())
        .bind(old_creator.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let mut association = row
            .as_ref()
            .map(association_from_row)
            .transpose()?
            .ok_or(StoreError::ActiveAssociationMissing {
                campaign_id,
                creator_id: old_creator,
            })?;

        sqlx::query("UPDATE creator_associations SET creator_id = $2 WHERE id = $1")
            .bind(association.id.as_uuid())
            .bind(new_creator.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|err| map_unique_violation(err, campaign_id, new_creator))?;

        tx.commit().await?;
        association.creator_id = new_creator;
        Ok(association)
    }

    async fn replace_creator(
        &self,
        campaign_id: CampaignId,
        old_creator: CreatorId,
        new_creator: CreatorId,
    ) -> StoreResult<ReplaceRows> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM creator_associations \
             WHERE campaign_id = $1 AND creator_id = $2 AND status <> 'removed' \
             FOR UPDATE"
        ))
        .bind(campaign_id.as_uuid())
        .bind(old_creator.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let mut removed = row
            .as_ref()
            .map(association_from_row)
            .transpose()?
            .ok_or(StoreError::ActiveAssociationMissing {
                campaign_id,
                creator_id: old_creator,
            })?;

        sqlx::query("UPDATE creator_associations SET status = 'removed' WHERE id = $1")
            .bind(removed.id.as_uuid())
            .execute(&mut *tx)
            .await?;
        removed.status = AssociationStatus::Removed;

        // Reactivate the most recent removed row for the new creator, if any.
        let reactivate = sqlx::query(&format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM creator_associations \
             WHERE campaign_id = $1 AND creator_id = $2 AND status = 'removed' \
             ORDER BY created_at DESC, id DESC LIMIT 1 FOR UPDATE"
        ))
        .bind(campaign_id.as_uuid())
        .bind(new_creator.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;

        let (created, reactivated) = match reactivate {
            Some(row) => {
                let mut association = association_from_row(&row)?;
                sqlx::query("UPDATE creator_associations SET status = 'pending' WHERE id = $1")
                    .bind(association.id.as_uuid())
                    .execute(&mut *tx)
                    .await
                    .map_err(|err| map_unique_violation(err, campaign_id, new_creator))?;
                association.status = AssociationStatus::Pending;
                (association, true)
            }
            None => {
                let association = CreatorAssociation::new_pending(campaign_id, new_creator);
                sqlx::query(
                    "INSERT INTO creator_associations \
                     (id, campaign_id, creator_id, status, deliverables, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(association.id.as_uuid())
                .bind(campaign_id.as_uuid())
                .bind(new_creator.as_uuid())
                .bind(association.status.as_str())
                .bind(&association.deliverables)
                .bind(association.created_at)
                .execute(&mut *tx)
                .await
                .map_err(|err| map_unique_violation(err, campaign_id, new_creator))?;
                (association, false)
            }
        };

        tx.commit().await?;
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
        let row = sqlx::query(&format!(
            "UPDATE creator_associations SET status = 'removed' \
             WHERE campaign_id = $1 AND creator_id = $2 AND status <> 'removed' \
             RETURNING {ASSOCIATION_COLUMNS}"
        ))
        .bind(campaign_id.as_uuid())
        .bind(creator_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref()
            .map(association_from_row)
            .transpose()?
            .ok_or(StoreError::ActiveAssociationMissing {
                campaign_id,
                creator_id,
            })
    }

    async fn set_status(
        &self,
        id: AssociationId,
        status: AssociationStatus,
    ) -> StoreResult<CreatorAssociation> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {ASSOCIATION_COLUMNS} FROM creator_associations \
             WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let mut association = row
            .as_ref()
            .map(association_from_row)
            .transpose()?
            .ok_or(StoreError::AssociationMissing(id))?;

        sqlx::query("UPDATE creator_associations SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                map_unique_violation(err, association.campaign_id, association.creator_id)
            })?;

        tx.commit().await?;
        association.status = status;
        Ok(association)
    }

    async fn insert_unchecked(&self, association: CreatorAssociation) -> StoreResult<()> {
        // Constraint bypass is only possible for already-removed rows in this
        // backend; the partial unique index always has the last word on
        // active rows.
        sqlx::query(
            "INSERT INTO creator_associations \
             (id, campaign_id, creator_id, status, deliverables, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(association.id.as_uuid())
        .bind(association.campaign_id.as_uuid())
        .bind(association.creator_id.as_uuid())
        .bind(association.status.as_str())
        .bind(&association.deliverables)
        .bind(association.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CreatorDirectory for PostgresRosterStore {
    async fn get(&self, id: CreatorId) -> StoreResult<Option<Creator>> {
        let row = sqlx::query("SELECT id, display_name FROM creators WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(Creator {
                id: CreatorId::from_uuid(row.try_get("id")?),
                display_name: row.try_get("display_name")?,
            })
        })
        .transpose()
    }

    async fn list(&self) -> StoreResult<Vec<Creator>> {
        let rows = sqlx::query("SELECT id, display_name FROM creators")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(Creator {
                    id: CreatorId::from_uuid(row.try_get("id")?),
                    display_name: row.try_get("display_name")?,
                })
            })
            .collect()
    }
}
