//! Nested mutation engine: path-addressed atomic writes into object trees.
//!
//! # Responsibility
//! - Append/update/remove single elements of collections nested 1-2 levels
//!   deep inside one building object.
//! - Validate generic collection names and payloads before touching storage.
//!
//! # Invariants
//! - Every operation addresses its target by the full id chain from the
//!   object root in one atomic statement (or one IMMEDIATE transaction);
//!   the whole document is never loaded, mutated in memory and written back.
//! - A failed id chain yields `NotFound` and leaves storage byte-identical.
//! - Updates touch only the fields named in the field set.
//! - Appends go to the collection end except log entries, which are
//!   prepended (most-recent-first).

use crate::model::object::{
    Battery, BatteryStatus, Contact, DeviceType, FileAttachment, FileCategory, FileKind,
    IssueStatus, LogEntry, ObjectTask, PendingIssue, RecurrenceInterval, RegularEvent,
    TaskPriority, TaskStatus, TechKind, Technology,
};
use crate::model::EntityId;
use crate::repo::{
    ensure_connection_ready, enum_to_db, map_insert_error, RepoError, RepoResult, SqlFieldSet,
    TableSpec,
};
use rusqlite::{params, params_from_iter, Connection, Transaction, TransactionBehavior};
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;

/// The generic nested collections addressable by name.
///
/// Anything else ("technologies", "fooBar", ...) is rejected with
/// `Validation` before storage is touched; technologies, batteries, tasks
/// and log entries have dedicated typed operations instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedCollection {
    Files,
    ScheduledEvents,
    Contacts,
    PendingIssues,
}

impl NestedCollection {
    pub const ALL: [NestedCollection; 4] = [
        NestedCollection::Files,
        NestedCollection::ScheduledEvents,
        NestedCollection::Contacts,
        NestedCollection::PendingIssues,
    ];

    /// Resolves a caller-supplied collection name.
    pub fn parse(name: &str) -> RepoResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.wire_name() == name)
            .ok_or_else(|| {
                RepoError::Validation(format!("unknown generic collection `{name}`"))
            })
    }

    /// Stable collection name used in storage and by callers.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::ScheduledEvents => "scheduledEvents",
            Self::Contacts => "contacts",
            Self::PendingIssues => "pendingIssues",
        }
    }

    /// Field names writable through `update_item`, by wire name.
    pub fn allowed_update_fields(self) -> &'static [&'static str] {
        match self {
            Self::Files => &["name", "url", "type", "category", "size"],
            Self::ScheduledEvents => &[
                "title",
                "startDate",
                "nextDate",
                "interval",
                "description",
                "futureNotes",
                "isActive",
                "precisionOnDay",
            ],
            Self::Contacts => &["name", "role", "phone", "email"],
            Self::PendingIssues => &["text", "status"],
        }
    }

    /// Rejects unknown keys, `null` values and wrongly typed values in an
    /// update field set. Runs entirely before storage is touched; a field
    /// set that passes here can never make the stored payload undeserializable.
    pub fn validate_update(self, fields: &JsonMap<String, JsonValue>) -> RepoResult<()> {
        if fields.is_empty() {
            return Err(RepoError::Validation(
                "item update field set is empty".to_string(),
            ));
        }

        for (key, value) in fields {
            if key == "id" {
                return Err(RepoError::Validation(
                    "field set must not rewrite element `id`".to_string(),
                ));
            }
            if !self.allowed_update_fields().contains(&key.as_str()) {
                return Err(RepoError::Validation(format!(
                    "unknown field `{key}` for collection `{}`",
                    self.wire_name()
                )));
            }
            // `json_patch` deletes a key patched with null, which could strip
            // a required field from the stored payload.
            if value.is_null() {
                return Err(RepoError::Validation(format!(
                    "field `{key}` must not be null in collection `{}`",
                    self.wire_name()
                )));
            }
        }

        self.check_field_types(fields)
    }

    /// Deserializes the field set against the element's typed shape so a
    /// wrongly typed value (`{"name": 123}`, `{"size": "big"}`) is caught
    /// here instead of poisoning every later read of the object.
    fn check_field_types(self, fields: &JsonMap<String, JsonValue>) -> RepoResult<()> {
        let probe = JsonValue::Object(fields.clone());
        let invalid = |err: serde_json::Error| {
            RepoError::Validation(format!(
                "invalid value in `{}` field set: {err}",
                self.wire_name()
            ))
        };
        match self {
            Self::Files => {
                serde_json::from_value::<FileFieldSet>(probe).map_err(invalid)?;
            }
            Self::ScheduledEvents => {
                serde_json::from_value::<ScheduledEventFieldSet>(probe).map_err(invalid)?;
            }
            Self::Contacts => {
                serde_json::from_value::<ContactFieldSet>(probe).map_err(invalid)?;
            }
            Self::PendingIssues => {
                serde_json::from_value::<PendingIssueFieldSet>(probe).map_err(invalid)?;
            }
        }
        Ok(())
    }
}

// Partial shapes mirroring the element structs, used only to type-check
// update field sets before they reach `json_patch`. Fields are consumed by
// the deserializer alone.

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(dead_code)]
struct FileFieldSet {
    name: Option<String>,
    url: Option<String>,
    #[serde(rename = "type")]
    kind: Option<FileKind>,
    category: Option<FileCategory>,
    size: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(dead_code)]
struct ScheduledEventFieldSet {
    title: Option<String>,
    start_date: Option<String>,
    next_date: Option<String>,
    interval: Option<RecurrenceInterval>,
    description: Option<String>,
    future_notes: Option<String>,
    is_active: Option<bool>,
    precision_on_day: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(dead_code)]
struct ContactFieldSet {
    name: Option<String>,
    role: Option<String>,
    phone: Option<String>,
    email: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[allow(dead_code)]
struct PendingIssueFieldSet {
    text: Option<String>,
    status: Option<IssueStatus>,
}

/// Tagged union over the generic nested collection elements.
#[derive(Debug, Clone, PartialEq)]
pub enum NestedItem {
    File(FileAttachment),
    ScheduledEvent(RegularEvent),
    Contact(Contact),
    PendingIssue(PendingIssue),
}

impl NestedItem {
    /// Validates an untyped payload against the collection's shape,
    /// filling serde defaults for omitted optional fields.
    pub fn from_payload(collection: NestedCollection, payload: JsonValue) -> RepoResult<Self> {
        let invalid = |err: serde_json::Error| {
            RepoError::Validation(format!(
                "invalid `{}` payload: {err}",
                collection.wire_name()
            ))
        };
        Ok(match collection {
            NestedCollection::Files => Self::File(serde_json::from_value(payload).map_err(invalid)?),
            NestedCollection::ScheduledEvents => {
                Self::ScheduledEvent(serde_json::from_value(payload).map_err(invalid)?)
            }
            NestedCollection::Contacts => {
                Self::Contact(serde_json::from_value(payload).map_err(invalid)?)
            }
            NestedCollection::PendingIssues => {
                Self::PendingIssue(serde_json::from_value(payload).map_err(invalid)?)
            }
        })
    }

    pub fn collection(&self) -> NestedCollection {
        match self {
            Self::File(_) => NestedCollection::Files,
            Self::ScheduledEvent(_) => NestedCollection::ScheduledEvents,
            Self::Contact(_) => NestedCollection::Contacts,
            Self::PendingIssue(_) => NestedCollection::PendingIssues,
        }
    }

    pub fn id(&self) -> &EntityId {
        match self {
            Self::File(item) => &item.id,
            Self::ScheduledEvent(item) => &item.id,
            Self::Contact(item) => &item.id,
            Self::PendingIssue(item) => &item.id,
        }
    }

    pub fn set_id(&mut self, id: EntityId) {
        match self {
            Self::File(item) => item.id = id,
            Self::ScheduledEvent(item) => item.id = id,
            Self::Contact(item) => item.id = id,
            Self::PendingIssue(item) => item.id = id,
        }
    }

    fn payload_json(&self) -> RepoResult<String> {
        let text = match self {
            Self::File(item) => serde_json::to_string(item)?,
            Self::ScheduledEvent(item) => serde_json::to_string(item)?,
            Self::Contact(item) => serde_json::to_string(item)?,
            Self::PendingIssue(item) => serde_json::to_string(item)?,
        };
        Ok(text)
    }
}

/// Typed field set for technology updates. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TechnologyUpdate {
    pub name: Option<String>,
    pub kind: Option<TechKind>,
    pub device_type: Option<DeviceType>,
    pub location: Option<String>,
}

/// Typed field set for battery updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatteryUpdate {
    pub capacity_ah: Option<f64>,
    pub voltage_v: Option<f64>,
    pub install_date: Option<String>,
    pub last_check_date: Option<String>,
    pub next_replacement_date: Option<String>,
    pub status: Option<BatteryStatus>,
    pub serial_number: Option<String>,
    pub manufacture_date: Option<String>,
    pub notes: Option<String>,
}

/// Typed field set for task updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub description: Option<String>,
    pub deadline: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub note: Option<String>,
}

/// Typed field set for log entry updates. `data` entries are merged into
/// the stored map; `images` replaces the stored list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogEntryUpdate {
    pub date: Option<String>,
    pub data: Option<BTreeMap<String, String>>,
    pub images: Option<Vec<String>>,
}

/// Path-addressed mutation interface for one object tree.
pub trait ObjectTreeRepository {
    fn append_technology(&mut self, object_id: &str, technology: &Technology) -> RepoResult<()>;
    fn update_technology(
        &mut self,
        object_id: &str,
        technology_id: &str,
        update: &TechnologyUpdate,
    ) -> RepoResult<()>;
    /// Removes the technology and, through it, its batteries.
    fn remove_technology(&mut self, object_id: &str, technology_id: &str) -> RepoResult<()>;

    fn append_battery(
        &mut self,
        object_id: &str,
        technology_id: &str,
        battery: &Battery,
    ) -> RepoResult<()>;
    fn update_battery(
        &mut self,
        object_id: &str,
        technology_id: &str,
        battery_id: &str,
        update: &BatteryUpdate,
    ) -> RepoResult<()>;
    fn remove_battery(
        &mut self,
        object_id: &str,
        technology_id: &str,
        battery_id: &str,
    ) -> RepoResult<()>;

    fn append_task(&mut self, object_id: &str, task: &ObjectTask) -> RepoResult<()>;
    fn update_task(&mut self, object_id: &str, task_id: &str, update: &TaskUpdate)
        -> RepoResult<()>;
    fn remove_task(&mut self, object_id: &str, task_id: &str) -> RepoResult<()>;

    /// Prepends; the newest entry reads back first.
    fn append_log_entry(&mut self, object_id: &str, entry: &LogEntry) -> RepoResult<()>;
    fn update_log_entry(
        &mut self,
        object_id: &str,
        entry_id: &str,
        update: &LogEntryUpdate,
    ) -> RepoResult<()>;
    fn remove_log_entry(&mut self, object_id: &str, entry_id: &str) -> RepoResult<()>;

    fn append_item(&mut self, object_id: &str, item: &NestedItem) -> RepoResult<()>;
    fn update_item(
        &mut self,
        object_id: &str,
        collection: NestedCollection,
        item_id: &str,
        fields: &JsonMap<String, JsonValue>,
    ) -> RepoResult<()>;
    fn remove_item(
        &mut self,
        object_id: &str,
        collection: NestedCollection,
        item_id: &str,
    ) -> RepoResult<()>;
}

/// SQLite-backed nested mutation engine.
pub struct SqliteObjectTreeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObjectTreeRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                TableSpec {
                    table: "objects",
                    columns: &["id"],
                },
                TableSpec {
                    table: "technologies",
                    columns: &["object_id", "id", "position"],
                },
                TableSpec {
                    table: "batteries",
                    columns: &["object_id", "technology_id", "id", "position"],
                },
                TableSpec {
                    table: "tasks",
                    columns: &["object_id", "id", "position"],
                },
                TableSpec {
                    table: "log_entries",
                    columns: &["object_id", "id", "position", "data"],
                },
                TableSpec {
                    table: "object_items",
                    columns: &["object_id", "collection", "item_id", "position", "payload"],
                },
            ],
        )?;
        Ok(Self { conn })
    }
}

impl ObjectTreeRepository for SqliteObjectTreeRepository<'_> {
    fn append_technology(&mut self, object_id: &str, technology: &Technology) -> RepoResult<()> {
        require_id(&technology.id, "technology")?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let changed = tx
            .execute(
                "INSERT INTO technologies (object_id, id, position, name, kind, device_type, location)
                 SELECT ?1, ?2,
                        COALESCE((SELECT MAX(position) + 1 FROM technologies WHERE object_id = ?1), 0),
                        ?3, ?4, ?5, ?6
                 WHERE EXISTS (SELECT 1 FROM objects WHERE id = ?1);",
                params![
                    object_id,
                    technology.id,
                    technology.name,
                    enum_to_db(&technology.kind)?,
                    enum_to_db(&technology.device_type)?,
                    technology.location,
                ],
            )
            .map_err(|err| map_insert_error(err, "technology", &technology.id))?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("objects/{object_id}")));
        }

        for (position, battery) in technology.batteries.iter().enumerate() {
            require_id(&battery.id, "battery")?;
            tx.execute(
                "INSERT INTO batteries (
                    object_id, technology_id, id, position, capacity_ah, voltage_v,
                    install_date, last_check_date, next_replacement_date, status,
                    serial_number, manufacture_date, notes
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
                params![
                    object_id,
                    technology.id,
                    battery.id,
                    position as i64,
                    battery.capacity_ah,
                    battery.voltage_v,
                    battery.install_date,
                    battery.last_check_date,
                    battery.next_replacement_date,
                    enum_to_db(&battery.status)?,
                    battery.serial_number,
                    battery.manufacture_date,
                    battery.notes,
                ],
            )
            .map_err(|err| map_insert_error(err, "battery", &battery.id))?;
        }

        tx.commit()?;
        Ok(())
    }

    fn update_technology(
        &mut self,
        object_id: &str,
        technology_id: &str,
        update: &TechnologyUpdate,
    ) -> RepoResult<()> {
        let mut fields = SqlFieldSet::default();
        if let Some(name) = &update.name {
            fields.push("name", name.clone());
        }
        if let Some(kind) = &update.kind {
            fields.push("kind", enum_to_db(kind)?);
        }
        if let Some(device_type) = &update.device_type {
            fields.push("device_type", enum_to_db(device_type)?);
        }
        if let Some(location) = &update.location {
            fields.push("location", location.clone());
        }

        let path = format!("objects/{object_id}/technologies/{technology_id}");
        run_field_update(
            self.conn,
            "technologies",
            fields,
            "object_id = ?{a} AND id = ?{b}",
            &[object_id, technology_id],
            path,
        )
    }

    fn remove_technology(&mut self, object_id: &str, technology_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM technologies WHERE object_id = ?1 AND id = ?2;",
            params![object_id, technology_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!(
                "objects/{object_id}/technologies/{technology_id}"
            )));
        }
        Ok(())
    }

    fn append_battery(
        &mut self,
        object_id: &str,
        technology_id: &str,
        battery: &Battery,
    ) -> RepoResult<()> {
        require_id(&battery.id, "battery")?;

        let changed = self
            .conn
            .execute(
                "INSERT INTO batteries (
                    object_id, technology_id, id, position, capacity_ah, voltage_v,
                    install_date, last_check_date, next_replacement_date, status,
                    serial_number, manufacture_date, notes
                )
                SELECT ?1, ?2, ?3,
                       COALESCE((SELECT MAX(position) + 1 FROM batteries
                                 WHERE object_id = ?1 AND technology_id = ?2), 0),
                       ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12
                WHERE EXISTS (SELECT 1 FROM technologies WHERE object_id = ?1 AND id = ?2);",
                params![
                    object_id,
                    technology_id,
                    battery.id,
                    battery.capacity_ah,
                    battery.voltage_v,
                    battery.install_date,
                    battery.last_check_date,
                    battery.next_replacement_date,
                    enum_to_db(&battery.status)?,
                    battery.serial_number,
                    battery.manufacture_date,
                    battery.notes,
                ],
            )
            .map_err(|err| map_insert_error(err, "battery", &battery.id))?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!(
                "objects/{object_id}/technologies/{technology_id}"
            )));
        }
        Ok(())
    }

    fn update_battery(
        &mut self,
        object_id: &str,
        technology_id: &str,
        battery_id: &str,
        update: &BatteryUpdate,
    ) -> RepoResult<()> {
        let mut fields = SqlFieldSet::default();
        if let Some(capacity_ah) = update.capacity_ah {
            fields.push("capacity_ah", capacity_ah);
        }
        if let Some(voltage_v) = update.voltage_v {
            fields.push("voltage_v", voltage_v);
        }
        if let Some(install_date) = &update.install_date {
            fields.push("install_date", install_date.clone());
        }
        if let Some(last_check_date) = &update.last_check_date {
            fields.push("last_check_date", last_check_date.clone());
        }
        if let Some(next_replacement_date) = &update.next_replacement_date {
            fields.push("next_replacement_date", next_replacement_date.clone());
        }
        if let Some(status) = &update.status {
            fields.push("status", enum_to_db(status)?);
        }
        if let Some(serial_number) = &update.serial_number {
            fields.push("serial_number", serial_number.clone());
        }
        if let Some(manufacture_date) = &update.manufacture_date {
            fields.push("manufacture_date", manufacture_date.clone());
        }
        if let Some(notes) = &update.notes {
            fields.push("notes", notes.clone());
        }

        let path = format!(
            "objects/{object_id}/technologies/{technology_id}/batteries/{battery_id}"
        );
        run_field_update(
            self.conn,
            "batteries",
            fields,
            "object_id = ?{a} AND technology_id = ?{b} AND id = ?{c}",
            &[object_id, technology_id, battery_id],
            path,
        )
    }

    fn remove_battery(
        &mut self,
        object_id: &str,
        technology_id: &str,
        battery_id: &str,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM batteries WHERE object_id = ?1 AND technology_id = ?2 AND id = ?3;",
            params![object_id, technology_id, battery_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!(
                "objects/{object_id}/technologies/{technology_id}/batteries/{battery_id}"
            )));
        }
        Ok(())
    }

    fn append_task(&mut self, object_id: &str, task: &ObjectTask) -> RepoResult<()> {
        require_id(&task.id, "task")?;

        let changed = self
            .conn
            .execute(
                "INSERT INTO tasks (
                    object_id, id, position, description, deadline, priority, status,
                    note, created_at, created_by
                )
                SELECT ?1, ?2,
                       COALESCE((SELECT MAX(position) + 1 FROM tasks WHERE object_id = ?1), 0),
                       ?3, ?4, ?5, ?6, ?7, ?8, ?9
                WHERE EXISTS (SELECT 1 FROM objects WHERE id = ?1);",
                params![
                    object_id,
                    task.id,
                    task.description,
                    task.deadline,
                    enum_to_db(&task.priority)?,
                    enum_to_db(&task.status)?,
                    task.note,
                    task.created_at,
                    task.created_by,
                ],
            )
            .map_err(|err| map_insert_error(err, "task", &task.id))?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("objects/{object_id}")));
        }
        Ok(())
    }

    fn update_task(
        &mut self,
        object_id: &str,
        task_id: &str,
        update: &TaskUpdate,
    ) -> RepoResult<()> {
        let mut fields = SqlFieldSet::default();
        if let Some(description) = &update.description {
            fields.push("description", description.clone());
        }
        if let Some(deadline) = &update.deadline {
            fields.push("deadline", deadline.clone());
        }
        if let Some(priority) = &update.priority {
            fields.push("priority", enum_to_db(priority)?);
        }
        if let Some(status) = &update.status {
            fields.push("status", enum_to_db(status)?);
        }
        if let Some(note) = &update.note {
            fields.push("note", note.clone());
        }

        let path = format!("objects/{object_id}/tasks/{task_id}");
        run_field_update(
            self.conn,
            "tasks",
            fields,
            "object_id = ?{a} AND id = ?{b}",
            &[object_id, task_id],
            path,
        )
    }

    fn remove_task(&mut self, object_id: &str, task_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM tasks WHERE object_id = ?1 AND id = ?2;",
            params![object_id, task_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!(
                "objects/{object_id}/tasks/{task_id}"
            )));
        }
        Ok(())
    }

    fn append_log_entry(&mut self, object_id: &str, entry: &LogEntry) -> RepoResult<()> {
        require_id(&entry.id, "log entry")?;

        // MIN(position)-1 keeps the newest entry first on ascending reads.
        let changed = self
            .conn
            .execute(
                "INSERT INTO log_entries (
                    object_id, id, position, template_id, template_name, entry_date,
                    author, data, images
                )
                SELECT ?1, ?2,
                       COALESCE((SELECT MIN(position) - 1 FROM log_entries WHERE object_id = ?1), 0),
                       ?3, ?4, ?5, ?6, ?7, ?8
                WHERE EXISTS (SELECT 1 FROM objects WHERE id = ?1);",
                params![
                    object_id,
                    entry.id,
                    entry.template_id,
                    entry.template_name,
                    entry.date,
                    entry.author,
                    serde_json::to_string(&entry.data)?,
                    entry
                        .images
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                ],
            )
            .map_err(|err| map_insert_error(err, "log entry", &entry.id))?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("objects/{object_id}")));
        }
        Ok(())
    }

    fn update_log_entry(
        &mut self,
        object_id: &str,
        entry_id: &str,
        update: &LogEntryUpdate,
    ) -> RepoResult<()> {
        if update.date.is_none() && update.data.is_none() && update.images.is_none() {
            return Err(RepoError::Validation(
                "log entry update field set is empty".to_string(),
            ));
        }

        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<rusqlite::types::Value> = Vec::new();
        if let Some(date) = &update.date {
            values.push(date.clone().into());
            clauses.push(format!("entry_date = ?{}", values.len()));
        }
        if let Some(data) = &update.data {
            values.push(serde_json::to_string(data)?.into());
            // Merge template-defined keys into the stored map.
            clauses.push(format!("data = json_patch(data, ?{})", values.len()));
        }
        if let Some(images) = &update.images {
            values.push(serde_json::to_string(images)?.into());
            clauses.push(format!("images = ?{}", values.len()));
        }

        values.push(object_id.to_string().into());
        let object_index = values.len();
        values.push(entry_id.to_string().into());
        let entry_index = values.len();

        let sql = format!(
            "UPDATE log_entries SET {} WHERE object_id = ?{object_index} AND id = ?{entry_index};",
            clauses.join(", ")
        );
        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!(
                "objects/{object_id}/logEntries/{entry_id}"
            )));
        }
        Ok(())
    }

    fn remove_log_entry(&mut self, object_id: &str, entry_id: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM log_entries WHERE object_id = ?1 AND id = ?2;",
            params![object_id, entry_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!(
                "objects/{object_id}/logEntries/{entry_id}"
            )));
        }
        Ok(())
    }

    fn append_item(&mut self, object_id: &str, item: &NestedItem) -> RepoResult<()> {
        require_id(item.id(), "item")?;
        let collection = item.collection();

        let changed = self
            .conn
            .execute(
                "INSERT INTO object_items (object_id, collection, item_id, position, payload)
                 SELECT ?1, ?2, ?3,
                        COALESCE((SELECT MAX(position) + 1 FROM object_items
                                  WHERE object_id = ?1 AND collection = ?2), 0),
                        ?4
                 WHERE EXISTS (SELECT 1 FROM objects WHERE id = ?1);",
                params![
                    object_id,
                    collection.wire_name(),
                    item.id(),
                    item.payload_json()?,
                ],
            )
            .map_err(|err| map_insert_error(err, collection.wire_name(), item.id()))?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("objects/{object_id}")));
        }
        Ok(())
    }

    fn update_item(
        &mut self,
        object_id: &str,
        collection: NestedCollection,
        item_id: &str,
        fields: &JsonMap<String, JsonValue>,
    ) -> RepoResult<()> {
        collection.validate_update(fields)?;

        let patch = serde_json::to_string(&JsonValue::Object(fields.clone()))?;
        let changed = self.conn.execute(
            "UPDATE object_items
             SET payload = json_patch(payload, ?4)
             WHERE object_id = ?1 AND collection = ?2 AND item_id = ?3;",
            params![object_id, collection.wire_name(), item_id, patch],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!(
                "objects/{object_id}/{}/{item_id}",
                collection.wire_name()
            )));
        }
        Ok(())
    }

    fn remove_item(
        &mut self,
        object_id: &str,
        collection: NestedCollection,
        item_id: &str,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM object_items
             WHERE object_id = ?1 AND collection = ?2 AND item_id = ?3;",
            params![object_id, collection.wire_name(), item_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!(
                "objects/{object_id}/{}/{item_id}",
                collection.wire_name()
            )));
        }
        Ok(())
    }
}

fn require_id(id: &str, context: &'static str) -> RepoResult<()> {
    if id.trim().is_empty() {
        return Err(RepoError::Validation(format!("{context} id is empty")));
    }
    Ok(())
}

/// Executes a typed partial update as one statement; `where_template` uses
/// `?{a}`, `?{b}`, `?{c}` placeholders filled with `where_values` in order.
fn run_field_update(
    conn: &Connection,
    table: &str,
    fields: SqlFieldSet,
    where_template: &str,
    where_values: &[&str],
    path: String,
) -> RepoResult<()> {
    if fields.is_empty() {
        return Err(RepoError::Validation(format!(
            "{table} update field set is empty"
        )));
    }

    let mut next_index = fields.bind_count();
    let (set_clause, mut values) = fields.into_parts();
    let mut where_clause = where_template.to_string();
    for (slot, value) in ["{a}", "{b}", "{c}"].iter().zip(where_values) {
        next_index += 1;
        where_clause = where_clause.replace(*slot, &next_index.to_string());
        values.push(value.to_string().into());
    }

    let sql = format!("UPDATE {table} SET {set_clause} WHERE {where_clause};");
    let changed = conn.execute(&sql, params_from_iter(values))?;
    if changed == 0 {
        return Err(RepoError::NotFound(path));
    }
    Ok(())
}
