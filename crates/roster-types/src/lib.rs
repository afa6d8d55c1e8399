//! Roster Types - Core types for campaign roster reconciliation
//!
//! A campaign contracts a number of creator slots; the actual staffing is
//! stored as creator-association rows. This crate defines the shared data
//! model and the pure derivations over it:
//!
//! - **Campaign**: business + month engagement carrying the contracted
//!   slot count
//! - **CreatorAssociation**: persisted row linking a campaign to a creator,
//!   with a soft-delete lifecycle (`Pending | Confirmed | Removed`)
//! - **Slot projection**: derived, never-persisted view mapping association
//!   rows onto contracted slot indices
//! - **IntegrityReport**: drift detection result consumed by auto-fix and
//!   the polling client
//! - **AuditLogEntry**: append-only record of every mutation
//!
//! ## Architectural Boundaries
//!
//! - **roster-store** owns persistence and the uniqueness constraint
//! - **roster-engine** owns mutation operators and reconciliation
//! - **roster-types** owns the model and every pure derivation over it
//!
//! Nothing in this crate performs I/O.

#![deny(unsafe_code)]

pub mod association;
pub mod audit;
pub mod campaign;
pub mod ids;
pub mod integrity;
pub mod slot;

// Re-export main types
pub use association::{AssociationStatus, CreatorAssociation, StatusParseError};
pub use audit::{AuditAction, AuditEntityType, AuditLogEntry};
pub use campaign::{Campaign, Creator};
pub use ids::{AssociationId, CampaignId, CreatorId};
pub use integrity::{IntegrityReport, IntegrityViolation};
pub use slot::{project_slots, Slot, SlotProjection};
