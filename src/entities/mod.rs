// Entity Models
//
// Each entity carries a UUID identity assigned at construction and explicit
// created / updated timestamps.

pub mod category;
pub mod tracker;
pub mod user;

pub use category::{Category, CategoryFamily};
pub use tracker::{CategoryLinks, ExportableTracker, Tracker, TrackerExport};
pub use user::{role_of, Role, User};
