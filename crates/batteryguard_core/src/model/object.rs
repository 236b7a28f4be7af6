//! Building object tree model.
//!
//! # Responsibility
//! - Define the tracked installation record and every nested collection
//!   element it owns.
//! - Provide lifecycle validation for whole-tree writes.
//!
//! # Invariants
//! - `id` is stable for the lifetime of the object.
//! - Element ids are unique within their immediate collection.
//! - Battery ids are unique within their owning technology's battery list.

use crate::model::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Battery health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatteryStatus {
    Healthy,
    Warning,
    Critical,
    Replaced,
}

/// Installed subsystem category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TechKind {
    /// Fire alarm system.
    Eps,
    /// Intrusion detection system.
    Pzts,
    /// Camera system.
    Cctv,
    /// Access control system.
    Skv,
    Other,
}

/// Device role of a technology within its subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    Panel,
    Unit,
    SourceMain,
    SourceBooster,
    OtherDevice,
}

/// Task urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Open,
    InProgress,
    Done,
}

/// Pending issue lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    Open,
    Resolved,
}

/// File attachment category used for filtering in clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileCategory {
    Revision,
    Project,
    Photo,
    Manual,
    Contract,
    Other,
}

/// Coarse file type derived from the original upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Doc,
    Excel,
    Image,
    Other,
}

/// Recurrence step for scheduled events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurrenceInterval {
    Once,
    Monthly,
    Quarterly,
    SemiAnnually,
    Annually,
    BiAnnually,
    Quadrennially,
}

/// Backup battery installed inside one technology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Battery {
    pub id: EntityId,
    pub capacity_ah: f64,
    /// Nominal voltage in volts; seeds report measurement rows.
    pub voltage_v: f64,
    #[serde(default)]
    pub install_date: String,
    #[serde(default)]
    pub last_check_date: String,
    #[serde(default)]
    pub next_replacement_date: String,
    pub status: BatteryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacture_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A subsystem installed at an object, owning zero or more batteries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Technology {
    pub id: EntityId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TechKind,
    pub device_type: DeviceType,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub batteries: Vec<Battery>,
}

/// Site contact person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Generated by the service when the payload arrives without one.
    #[serde(default)]
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

/// Maintenance journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: EntityId,
    pub template_id: String,
    pub template_name: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

/// Recurring calendar event attached to an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegularEvent {
    #[serde(default)]
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub next_date: String,
    pub interval: RecurrenceInterval,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub future_notes: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub precision_on_day: bool,
}

/// Uploaded file metadata; the binary lives in external storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    #[serde(default)]
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub category: FileCategory,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub uploaded_at: String,
    #[serde(default)]
    pub uploaded_by: String,
}

/// Actionable task on an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTask {
    pub id: EntityId,
    pub description: String,
    #[serde(default)]
    pub deadline: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub created_by: String,
}

/// Free-form open issue noted by a technician.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingIssue {
    #[serde(default)]
    pub id: EntityId,
    pub text: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub created_by: String,
    pub status: IssueStatus,
}

/// A tracked installation site with its full nested tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingObject {
    pub id: EntityId,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_notes: Option<String>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub technologies: Vec<Technology>,
    /// Most-recent-first: new entries are prepended.
    #[serde(default)]
    pub log_entries: Vec<LogEntry>,
    #[serde(default)]
    pub scheduled_events: Vec<RegularEvent>,
    #[serde(default)]
    pub pending_issues: Vec<PendingIssue>,
    #[serde(default)]
    pub files: Vec<FileAttachment>,
    #[serde(default)]
    pub tasks: Vec<ObjectTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

/// Validation failures for whole-tree writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectValidationError {
    /// Root or element id is empty.
    EmptyId { context: &'static str },
    /// Two elements of the same immediate collection share one id.
    DuplicateItemId {
        collection: &'static str,
        id: EntityId,
    },
}

impl Display for ObjectValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId { context } => write!(f, "empty id in {context}"),
            Self::DuplicateItemId { collection, id } => {
                write!(f, "duplicate id `{id}` in collection `{collection}`")
            }
        }
    }
}

impl Error for ObjectValidationError {}

impl BuildingObject {
    /// Creates an empty object with a generated id.
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self::with_id(crate::model::new_entity_id(), name, address)
    }

    /// Creates an empty object with a caller-provided id.
    pub fn with_id(
        id: impl Into<EntityId>,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            description: String::new(),
            internal_notes: None,
            contacts: Vec::new(),
            technologies: Vec::new(),
            log_entries: Vec::new(),
            scheduled_events: Vec::new(),
            pending_issues: Vec::new(),
            files: Vec::new(),
            tasks: Vec::new(),
            group_id: None,
            lat: None,
            lng: None,
        }
    }

    /// Checks id uniqueness invariants across the whole tree.
    pub fn validate(&self) -> Result<(), ObjectValidationError> {
        if self.id.trim().is_empty() {
            return Err(ObjectValidationError::EmptyId { context: "object" });
        }

        check_unique("contacts", self.contacts.iter().map(|item| &item.id))?;
        check_unique(
            "technologies",
            self.technologies.iter().map(|item| &item.id),
        )?;
        check_unique("logEntries", self.log_entries.iter().map(|item| &item.id))?;
        check_unique(
            "scheduledEvents",
            self.scheduled_events.iter().map(|item| &item.id),
        )?;
        check_unique(
            "pendingIssues",
            self.pending_issues.iter().map(|item| &item.id),
        )?;
        check_unique("files", self.files.iter().map(|item| &item.id))?;
        check_unique("tasks", self.tasks.iter().map(|item| &item.id))?;

        for technology in &self.technologies {
            check_unique("batteries", technology.batteries.iter().map(|item| &item.id))?;
        }

        Ok(())
    }
}

fn check_unique<'a>(
    collection: &'static str,
    ids: impl Iterator<Item = &'a EntityId>,
) -> Result<(), ObjectValidationError> {
    let mut seen: BTreeSet<&EntityId> = BTreeSet::new();
    for id in ids {
        if id.trim().is_empty() {
            return Err(ObjectValidationError::EmptyId {
                context: collection,
            });
        }
        if !seen.insert(id) {
            return Err(ObjectValidationError::DuplicateItemId {
                collection,
                id: id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn battery(id: &str) -> Battery {
        Battery {
            id: id.to_string(),
            capacity_ah: 7.0,
            voltage_v: 12.0,
            install_date: String::new(),
            last_check_date: String::new(),
            next_replacement_date: String::new(),
            status: BatteryStatus::Healthy,
            serial_number: None,
            manufacture_date: None,
            notes: None,
        }
    }

    #[test]
    fn duplicate_battery_ids_within_one_technology_are_rejected() {
        let mut object = BuildingObject::with_id("o1", "Site", "Street 1");
        object.technologies.push(Technology {
            id: "t1".to_string(),
            name: "PZTS".to_string(),
            kind: TechKind::Pzts,
            device_type: DeviceType::Panel,
            location: String::new(),
            batteries: vec![battery("b1"), battery("b1")],
        });

        let err = object.validate().unwrap_err();
        assert!(matches!(
            err,
            ObjectValidationError::DuplicateItemId {
                collection: "batteries",
                ..
            }
        ));
    }

    #[test]
    fn same_battery_id_in_two_technologies_is_allowed() {
        let mut object = BuildingObject::with_id("o1", "Site", "Street 1");
        for tech_id in ["t1", "t2"] {
            object.technologies.push(Technology {
                id: tech_id.to_string(),
                name: "PZTS".to_string(),
                kind: TechKind::Pzts,
                device_type: DeviceType::Panel,
                location: String::new(),
                batteries: vec![battery("b1")],
            });
        }

        assert!(object.validate().is_ok());
    }

    #[test]
    fn serde_names_match_source_documents() {
        let json = serde_json::to_value(battery("b1")).unwrap();
        assert!(json.get("voltageV").is_some());
        assert!(json.get("capacityAh").is_some());
        assert_eq!(json["status"], "HEALTHY");
    }
}
