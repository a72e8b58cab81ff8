// Tracker Catalog - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod approval;       // Two-reviewer approval ledger
pub mod collision;      // Signature collision detection
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod exodus;         // Exodus trackers API client
pub mod import;
pub mod listing;
pub mod logging;
pub mod query;
pub mod reconciliation; // Exodus dataset reconciler
pub mod stats;
pub mod validation;
pub mod visibility;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use approval::{ReviewState, APPROVAL_QUORUM};
pub use collision::{collision_report, signatures_collide, CollisionEntry, SignatureKind};
pub use config::Config;
pub use db::{setup_database, Event, SYSTEM_ACTOR};
pub use entities::{
    Category, CategoryFamily, CategoryLinks, Role, Tracker, TrackerExport, User,
};
pub use error::{CatalogError, Result, ValidationErrors};
pub use exodus::{ExodusClient, ExternalDataset, ExternalTracker, TrackerSource};
pub use listing::{Page, Scope, TrackerFilter};
pub use query::{LookupQuery, TrackerLookup};
pub use reconciliation::{
    LookupOutcome, OutcomeKind, ReconciliationEngine, ReconciliationReport,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
