//! Domain models for installation sites, groups, reports and settings.
//!
//! # Responsibility
//! - Define the canonical records persisted by the repository layer.
//! - Provide validation helpers enforced on write paths.
//!
//! # Invariants
//! - Element ids are unique within their immediate collection; battery ids
//!   are unique within their owning technology.
//! - Serde field names match the source documents (camelCase, screaming
//!   status values).

pub mod group;
pub mod identity;
pub mod object;
pub mod report;
pub mod settings;

/// Stable identifier for root entities and nested elements.
///
/// Kept as a plain string: callers may bring their own ids, generated ids
/// are formatted v4 UUIDs.
pub type EntityId = String;

/// Generates a fresh entity id.
pub fn new_entity_id() -> EntityId {
    uuid::Uuid::new_v4().to_string()
}
