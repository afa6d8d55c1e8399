//! Roster Engine - campaign slot reconciliation core.
//!
//! Keeps the number of contracted creator slots for a campaign consistent
//! with the actual set of creator-association rows, under concurrent edits,
//! with self-healing drift detection.
//!
//! ## Key Components
//!
//! - [`RosterEngine`]: facade over the injected stores and audit sink
//! - Slot projection reads: [`RosterEngine::project`],
//!   [`RosterEngine::get_slots`]
//! - Mutation operators: [`RosterEngine::add_slot`],
//!   [`RosterEngine::assign_creator`], [`RosterEngine::swap_creator`],
//!   [`RosterEngine::replace_creator`], [`RosterEngine::remove_creator`]
//! - Integrity: [`RosterEngine::check_campaign`],
//!   [`RosterEngine::check_all`], [`RosterEngine::auto_fix`]
//!
//! ## Consistency model
//!
//! The engine itself is stateless; each operation reads current state,
//! validates invariants, and performs one targeted write through a store
//! trait whose methods are individually transactional. The store's
//! active-uniqueness constraint is the authoritative defense behind every
//! application-level pre-check, so concurrent writers serialize per
//! campaign without any in-process locking. Campaigns are independent
//! units of consistency; nothing coordinates across them.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roster_audit::InMemoryAuditSink;
//! use roster_engine::RosterEngine;
//! use roster_store::InMemoryRosterStore;
//! use roster_types::{Campaign, Creator};
//!
//! # async fn example() {
//! let store = Arc::new(InMemoryRosterStore::new());
//! let audit = Arc::new(InMemoryAuditSink::new());
//!
//! let campaign = Campaign::new("Blue Door Bakery", "2026-09", 3);
//! let creator = Creator::new("@rivertown.eats");
//! store.insert_campaign(campaign.clone()).await;
//! store.insert_creator(creator.clone()).await;
//!
//! let engine = RosterEngine::new(store.clone(), store.clone(), store, audit);
//! engine.assign_creator(campaign.id, creator.id, "maria").await.unwrap();
//!
//! let view = engine.get_slots("Blue Door Bakery", "2026-09").await.unwrap();
//! assert!(view.report.is_valid);
//! # }
//! ```

#![deny(unsafe_code)]

pub mod engine;
pub mod error;
pub mod reconcile;

// Re-export main types
pub use engine::{EngineConfig, ReplaceOutcome, RosterEngine, SlotsView};
pub use error::{EngineError, EngineResult};
pub use reconcile::FixResult;
