//! Building object use-case service.
//!
//! # Responsibility
//! - Provide object-level create/get/list/delete/update-root APIs.
//! - Assign generated ids to the root and nested elements that arrive
//!   without one.
//!
//! # Invariants
//! - `update_root` only ever carries allow-listed scalar fields; managed
//!   collections are rejected before storage.
//! - Deleting an object leaves its reports in place.

use crate::model::new_entity_id;
use crate::model::object::BuildingObject;
use crate::repo::object_repo::{ObjectRepository, ObjectRootUpdate};
use crate::repo::RepoResult;
use log::info;
use serde_json::Value as JsonValue;

/// Object service facade over repository implementations.
pub struct ObjectService<R: ObjectRepository> {
    repo: R,
}

impl<R: ObjectRepository> ObjectService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Persists a whole new object tree, assigning ids where absent.
    pub fn create_object(&mut self, mut object: BuildingObject) -> RepoResult<BuildingObject> {
        assign_missing_ids(&mut object);
        self.repo.create_object(&object)?;
        info!(
            "event=object_create module=service status=ok object={}",
            object.id
        );
        self.repo.get_object(&object.id)
    }

    /// Loads one full object tree.
    pub fn get_object(&self, id: &str) -> RepoResult<BuildingObject> {
        self.repo.get_object(id)
    }

    /// Lists all objects with their full trees.
    pub fn list_objects(&self) -> RepoResult<Vec<BuildingObject>> {
        self.repo.list_objects()
    }

    /// Removes the object and its nested collections. Reports referencing
    /// the object remain queryable.
    pub fn delete_object(&mut self, id: &str) -> RepoResult<()> {
        self.repo.delete_object(id)?;
        info!("event=object_delete module=service status=ok object={id}");
        Ok(())
    }

    /// Applies a typed root scalar update and returns the fresh tree.
    pub fn update_root(
        &mut self,
        id: &str,
        update: &ObjectRootUpdate,
    ) -> RepoResult<BuildingObject> {
        self.repo.update_root(id, update)?;
        self.repo.get_object(id)
    }

    /// Validates an untyped root field set and applies it.
    ///
    /// Field sets naming a managed collection or an unknown key fail with
    /// `Validation` before anything reaches storage.
    pub fn update_root_from_json(
        &mut self,
        id: &str,
        fields: &JsonValue,
    ) -> RepoResult<BuildingObject> {
        let update = ObjectRootUpdate::from_json(fields)?;
        self.update_root(id, &update)
    }
}

/// Fills generated ids for the root and every nested element created
/// without one.
fn assign_missing_ids(object: &mut BuildingObject) {
    if object.id.trim().is_empty() {
        object.id = new_entity_id();
    }
    for contact in &mut object.contacts {
        fill_id(&mut contact.id);
    }
    for technology in &mut object.technologies {
        fill_id(&mut technology.id);
        for battery in &mut technology.batteries {
            fill_id(&mut battery.id);
        }
    }
    for entry in &mut object.log_entries {
        fill_id(&mut entry.id);
    }
    for event in &mut object.scheduled_events {
        fill_id(&mut event.id);
    }
    for issue in &mut object.pending_issues {
        fill_id(&mut issue.id);
    }
    for file in &mut object.files {
        fill_id(&mut file.id);
    }
    for task in &mut object.tasks {
        fill_id(&mut task.id);
    }
}

fn fill_id(id: &mut String) {
    if id.trim().is_empty() {
        *id = new_entity_id();
    }
}
