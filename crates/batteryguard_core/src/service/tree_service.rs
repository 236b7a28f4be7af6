//! Nested mutation use-case service.
//!
//! # Responsibility
//! - Front the path-addressed mutation engine with id assignment and audit
//!   stamping from the verified caller identity.
//! - Resolve generic collection names and validate untyped payloads before
//!   anything reaches storage.
//!
//! # Invariants
//! - Appends assign a generated id only when the caller brought none.
//! - Audit fields (`author`, `createdBy`, `uploadedBy`) are stamped from
//!   the caller identity when the payload left them empty.

use crate::model::identity::CallerIdentity;
use crate::model::new_entity_id;
use crate::model::object::{Battery, LogEntry, ObjectTask, Technology};
use crate::repo::tree_repo::{
    BatteryUpdate, LogEntryUpdate, NestedCollection, NestedItem, ObjectTreeRepository,
    TaskUpdate, TechnologyUpdate,
};
use crate::repo::RepoResult;
use chrono::Utc;
use log::info;
use serde_json::{Map as JsonMap, Value as JsonValue};

/// Tree service facade over the nested mutation engine.
pub struct TreeService<R: ObjectTreeRepository> {
    repo: R,
}

impl<R: ObjectTreeRepository> TreeService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Appends a technology (with its batteries) to one object.
    pub fn append_technology(
        &mut self,
        object_id: &str,
        mut technology: Technology,
    ) -> RepoResult<Technology> {
        fill_id(&mut technology.id);
        for battery in &mut technology.batteries {
            fill_id(&mut battery.id);
        }
        self.repo.append_technology(object_id, &technology)?;
        info!(
            "event=tree_append module=service status=ok object={object_id} collection=technologies id={}",
            technology.id
        );
        Ok(technology)
    }

    pub fn update_technology(
        &mut self,
        object_id: &str,
        technology_id: &str,
        update: &TechnologyUpdate,
    ) -> RepoResult<()> {
        self.repo.update_technology(object_id, technology_id, update)
    }

    /// Removes the technology and, through it, its batteries.
    pub fn remove_technology(&mut self, object_id: &str, technology_id: &str) -> RepoResult<()> {
        self.repo.remove_technology(object_id, technology_id)
    }

    /// Appends a battery to one technology, addressed by the full id chain.
    pub fn append_battery(
        &mut self,
        object_id: &str,
        technology_id: &str,
        mut battery: Battery,
    ) -> RepoResult<Battery> {
        fill_id(&mut battery.id);
        self.repo.append_battery(object_id, technology_id, &battery)?;
        info!(
            "event=tree_append module=service status=ok object={object_id} collection=batteries id={}",
            battery.id
        );
        Ok(battery)
    }

    pub fn update_battery(
        &mut self,
        object_id: &str,
        technology_id: &str,
        battery_id: &str,
        update: &BatteryUpdate,
    ) -> RepoResult<()> {
        self.repo
            .update_battery(object_id, technology_id, battery_id, update)
    }

    pub fn remove_battery(
        &mut self,
        object_id: &str,
        technology_id: &str,
        battery_id: &str,
    ) -> RepoResult<()> {
        self.repo.remove_battery(object_id, technology_id, battery_id)
    }

    /// Appends a task, stamping creation audit fields from the caller.
    pub fn append_task(
        &mut self,
        object_id: &str,
        mut task: ObjectTask,
        caller: &CallerIdentity,
    ) -> RepoResult<ObjectTask> {
        fill_id(&mut task.id);
        if task.created_at.is_empty() {
            task.created_at = now_stamp();
        }
        if task.created_by.is_empty() {
            task.created_by = caller.name.clone();
        }
        self.repo.append_task(object_id, &task)?;
        Ok(task)
    }

    pub fn update_task(
        &mut self,
        object_id: &str,
        task_id: &str,
        update: &TaskUpdate,
    ) -> RepoResult<()> {
        self.repo.update_task(object_id, task_id, update)
    }

    pub fn remove_task(&mut self, object_id: &str, task_id: &str) -> RepoResult<()> {
        self.repo.remove_task(object_id, task_id)
    }

    /// Prepends a log entry; the newest entry reads back first. `date` and
    /// `author` are stamped when the payload left them empty.
    pub fn append_log_entry(
        &mut self,
        object_id: &str,
        mut entry: LogEntry,
        caller: &CallerIdentity,
    ) -> RepoResult<LogEntry> {
        fill_id(&mut entry.id);
        if entry.date.is_empty() {
            entry.date = now_stamp();
        }
        if entry.author.is_empty() {
            entry.author = caller.name.clone();
        }
        self.repo.append_log_entry(object_id, &entry)?;
        Ok(entry)
    }

    pub fn update_log_entry(
        &mut self,
        object_id: &str,
        entry_id: &str,
        update: &LogEntryUpdate,
    ) -> RepoResult<()> {
        self.repo.update_log_entry(object_id, entry_id, update)
    }

    pub fn remove_log_entry(&mut self, object_id: &str, entry_id: &str) -> RepoResult<()> {
        self.repo.remove_log_entry(object_id, entry_id)
    }

    /// Validates an untyped payload against the named generic collection
    /// and appends it, stamping audit fields where the kind carries them.
    pub fn append_item(
        &mut self,
        object_id: &str,
        collection_name: &str,
        payload: JsonValue,
        caller: &CallerIdentity,
    ) -> RepoResult<NestedItem> {
        let collection = NestedCollection::parse(collection_name)?;
        let mut item = NestedItem::from_payload(collection, payload)?;
        if item.id().trim().is_empty() {
            item.set_id(new_entity_id());
        }
        stamp_item_audit(&mut item, caller);
        self.repo.append_item(object_id, &item)?;
        info!(
            "event=tree_append module=service status=ok object={object_id} collection={} id={}",
            collection.wire_name(),
            item.id()
        );
        Ok(item)
    }

    /// Applies an allow-listed field set to one generic collection element.
    pub fn update_item(
        &mut self,
        object_id: &str,
        collection_name: &str,
        item_id: &str,
        fields: &JsonMap<String, JsonValue>,
    ) -> RepoResult<()> {
        let collection = NestedCollection::parse(collection_name)?;
        self.repo.update_item(object_id, collection, item_id, fields)
    }

    pub fn remove_item(
        &mut self,
        object_id: &str,
        collection_name: &str,
        item_id: &str,
    ) -> RepoResult<()> {
        let collection = NestedCollection::parse(collection_name)?;
        self.repo.remove_item(object_id, collection, item_id)
    }
}

fn fill_id(id: &mut String) {
    if id.trim().is_empty() {
        *id = new_entity_id();
    }
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339()
}

fn stamp_item_audit(item: &mut NestedItem, caller: &CallerIdentity) {
    match item {
        NestedItem::File(file) => {
            if file.uploaded_at.is_empty() {
                file.uploaded_at = now_stamp();
            }
            if file.uploaded_by.is_empty() {
                file.uploaded_by = caller.name.clone();
            }
        }
        NestedItem::PendingIssue(issue) => {
            if issue.created_at.is_empty() {
                issue.created_at = now_stamp();
            }
            if issue.created_by.is_empty() {
                issue.created_by = caller.name.clone();
            }
        }
        NestedItem::ScheduledEvent(_) | NestedItem::Contact(_) => {}
    }
}
