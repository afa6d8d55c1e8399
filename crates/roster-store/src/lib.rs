//! Roster Store - storage seam for campaign roster reconciliation.
//!
//! Defines the async traits the reconciliation core reads and writes
//! through, plus backends:
//!
//! - [`InMemoryRosterStore`]: single-process backend used in tests and
//!   development
//! - `PostgresRosterStore` (feature `postgres`): relational backend with a
//!   partial unique index enforcing active-creator uniqueness
//!
//! ## Transaction model
//!
//! Every mutating trait method is one atomic transaction: the backend wraps
//! the whole read-validate-write sequence so a concurrent writer cannot
//! interleave between validation and commit. The active-uniqueness
//! constraint (`(campaign_id, creator_id)` over non-removed rows) is
//! enforced by the backend itself and is the authoritative last line of
//! defense behind any application-level pre-check.

#![deny(unsafe_code)]

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryRosterStore;
pub use traits::{AssociationStore, CampaignStore, CreatorDirectory, ReplaceRows};

#[cfg(feature = "postgres")]
pub use postgres::PostgresRosterStore;
