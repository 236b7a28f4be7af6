//! Building object store: whole-entity CRUD and root scalar updates.
//!
//! # Responsibility
//! - Create/read/list/delete whole object trees.
//! - Apply allow-listed root scalar updates without touching nested state.
//!
//! # Invariants
//! - `update_root` rejects any field set naming a managed collection before
//!   reaching storage.
//! - `delete_object` does not cascade to reports; orphaned reports remain
//!   queryable by design.
//! - Nested collections are never bulk-replaced here; per-item mutation
//!   lives in `tree_repo`.

use crate::model::object::{
    Battery, BuildingObject, Contact, FileAttachment, LogEntry, ObjectTask, PendingIssue,
    RegularEvent, Technology,
};
use crate::model::EntityId;
use crate::repo::tree_repo::NestedCollection;
use crate::repo::{
    ensure_connection_ready, enum_from_db, enum_to_db, map_insert_error, RepoError, RepoResult,
    SqlFieldSet, TableSpec,
};
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use serde_json::Value as JsonValue;

/// Root scalar fields writable through `update_root`, by wire name.
pub const ROOT_UPDATE_FIELDS: &[&str] = &[
    "name",
    "address",
    "description",
    "internalNotes",
    "groupId",
    "lat",
    "lng",
];

/// Collections managed exclusively by the nested mutation engine, by wire
/// name. A root field set naming one of these is rejected.
pub const MANAGED_COLLECTIONS: &[&str] = &[
    "contacts",
    "technologies",
    "logEntries",
    "scheduledEvents",
    "pendingIssues",
    "files",
    "tasks",
];

/// Typed field set for root scalar updates. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRootUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub internal_notes: Option<String>,
    pub group_id: Option<EntityId>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl ObjectRootUpdate {
    /// Builds an update from an untyped field set, rejecting managed
    /// collections and unknown keys before anything reaches storage.
    pub fn from_json(value: &JsonValue) -> RepoResult<Self> {
        let map = value.as_object().ok_or_else(|| {
            RepoError::Validation("root update field set must be an object".to_string())
        })?;

        for key in map.keys() {
            if MANAGED_COLLECTIONS.contains(&key.as_str()) {
                return Err(RepoError::Validation(format!(
                    "field set must not touch managed collection `{key}`"
                )));
            }
            if !ROOT_UPDATE_FIELDS.contains(&key.as_str()) {
                return Err(RepoError::Validation(format!(
                    "unknown root field `{key}`"
                )));
            }
        }

        serde_json::from_value(value.clone())
            .map_err(|err| RepoError::Validation(format!("invalid root field set: {err}")))
    }

    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.address.is_none()
            && self.description.is_none()
            && self.internal_notes.is_none()
            && self.group_id.is_none()
            && self.lat.is_none()
            && self.lng.is_none()
    }
}

/// Store interface for whole building objects.
pub trait ObjectRepository {
    /// Persists a whole new object tree. Fails with `Conflict` when the id
    /// already exists.
    fn create_object(&mut self, object: &BuildingObject) -> RepoResult<()>;
    /// Loads one full object tree.
    fn get_object(&self, id: &str) -> RepoResult<BuildingObject>;
    /// Lists all objects with their full trees.
    fn list_objects(&self) -> RepoResult<Vec<BuildingObject>>;
    /// Removes the object and its nested collections. Reports referencing
    /// the object are left in place.
    fn delete_object(&mut self, id: &str) -> RepoResult<()>;
    /// Applies allow-listed root scalar changes only.
    fn update_root(&mut self, id: &str, update: &ObjectRootUpdate) -> RepoResult<()>;
}

/// SQLite-backed object store.
pub struct SqliteObjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObjectRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                TableSpec {
                    table: "objects",
                    columns: &["id", "name", "address", "group_id", "updated_at"],
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
                    columns: &["object_id", "id", "position"],
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

impl ObjectRepository for SqliteObjectRepository<'_> {
    fn create_object(&mut self, object: &BuildingObject) -> RepoResult<()> {
        object.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        insert_object_tree(&tx, object)?;
        tx.commit()?;
        Ok(())
    }

    fn get_object(&self, id: &str) -> RepoResult<BuildingObject> {
        load_object(self.conn, id)?.ok_or_else(|| RepoError::NotFound(format!("objects/{id}")))
    }

    fn list_objects(&self) -> RepoResult<Vec<BuildingObject>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM objects ORDER BY name COLLATE NOCASE ASC, id ASC;")?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get::<_, String>(0)?);
        }

        let mut objects = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(object) = load_object(self.conn, &id)? {
                objects.push(object);
            }
        }
        Ok(objects)
    }

    fn delete_object(&mut self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM objects WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("objects/{id}")));
        }
        Ok(())
    }

    fn update_root(&mut self, id: &str, update: &ObjectRootUpdate) -> RepoResult<()> {
        if update.is_empty() {
            return Err(RepoError::Validation(
                "root update field set is empty".to_string(),
            ));
        }

        let mut fields = SqlFieldSet::default();
        if let Some(name) = &update.name {
            fields.push("name", name.clone());
        }
        if let Some(address) = &update.address {
            fields.push("address", address.clone());
        }
        if let Some(description) = &update.description {
            fields.push("description", description.clone());
        }
        if let Some(internal_notes) = &update.internal_notes {
            fields.push("internal_notes", internal_notes.clone());
        }
        if let Some(group_id) = &update.group_id {
            fields.push("group_id", group_id.clone());
        }
        if let Some(lat) = update.lat {
            fields.push("lat", lat);
        }
        if let Some(lng) = update.lng {
            fields.push("lng", lng);
        }

        let where_index = fields.bind_count() + 1;
        let (set_clause, mut values) = fields.into_parts();
        values.push(id.to_string().into());

        let sql = format!(
            "UPDATE objects
             SET {set_clause},
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?{where_index};"
        );
        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("objects/{id}")));
        }
        Ok(())
    }
}

fn insert_object_tree(tx: &Transaction<'_>, object: &BuildingObject) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO objects (
            id, name, address, description, internal_notes, group_id, lat, lng
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
        params![
            object.id,
            object.name,
            object.address,
            object.description,
            object.internal_notes,
            object.group_id,
            object.lat,
            object.lng,
        ],
    )
    .map_err(|err| map_insert_error(err, "object", &object.id))?;

    for (position, technology) in object.technologies.iter().enumerate() {
        insert_technology(tx, &object.id, position as i64, technology)?;
    }
    for (position, task) in object.tasks.iter().enumerate() {
        insert_task(tx, &object.id, position as i64, task)?;
    }
    for (position, entry) in object.log_entries.iter().enumerate() {
        insert_log_entry(tx, &object.id, position as i64, entry)?;
    }
    for (position, contact) in object.contacts.iter().enumerate() {
        insert_item(
            tx,
            &object.id,
            NestedCollection::Contacts,
            &contact.id,
            position as i64,
            serde_json::to_string(contact)?,
        )?;
    }
    for (position, event) in object.scheduled_events.iter().enumerate() {
        insert_item(
            tx,
            &object.id,
            NestedCollection::ScheduledEvents,
            &event.id,
            position as i64,
            serde_json::to_string(event)?,
        )?;
    }
    for (position, file) in object.files.iter().enumerate() {
        insert_item(
            tx,
            &object.id,
            NestedCollection::Files,
            &file.id,
            position as i64,
            serde_json::to_string(file)?,
        )?;
    }
    for (position, issue) in object.pending_issues.iter().enumerate() {
        insert_item(
            tx,
            &object.id,
            NestedCollection::PendingIssues,
            &issue.id,
            position as i64,
            serde_json::to_string(issue)?,
        )?;
    }

    Ok(())
}

fn insert_technology(
    tx: &Transaction<'_>,
    object_id: &str,
    position: i64,
    technology: &Technology,
) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO technologies (
            object_id, id, position, name, kind, device_type, location
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            object_id,
            technology.id,
            position,
            technology.name,
            enum_to_db(&technology.kind)?,
            enum_to_db(&technology.device_type)?,
            technology.location,
        ],
    )
    .map_err(|err| map_insert_error(err, "technology", &technology.id))?;

    for (battery_position, battery) in technology.batteries.iter().enumerate() {
        insert_battery(tx, object_id, &technology.id, battery_position as i64, battery)?;
    }
    Ok(())
}

fn insert_battery(
    tx: &Transaction<'_>,
    object_id: &str,
    technology_id: &str,
    position: i64,
    battery: &Battery,
) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO batteries (
            object_id, technology_id, id, position, capacity_ah, voltage_v,
            install_date, last_check_date, next_replacement_date, status,
            serial_number, manufacture_date, notes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
        params![
            object_id,
            technology_id,
            battery.id,
            position,
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
    Ok(())
}

fn insert_task(
    tx: &Transaction<'_>,
    object_id: &str,
    position: i64,
    task: &ObjectTask,
) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO tasks (
            object_id, id, position, description, deadline, priority, status,
            note, created_at, created_by
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
        params![
            object_id,
            task.id,
            position,
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
    Ok(())
}

fn insert_log_entry(
    tx: &Transaction<'_>,
    object_id: &str,
    position: i64,
    entry: &LogEntry,
) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO log_entries (
            object_id, id, position, template_id, template_name, entry_date,
            author, data, images
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            object_id,
            entry.id,
            position,
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
    Ok(())
}

fn insert_item(
    tx: &Transaction<'_>,
    object_id: &str,
    collection: NestedCollection,
    item_id: &str,
    position: i64,
    payload: String,
) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO object_items (object_id, collection, item_id, position, payload)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![object_id, collection.wire_name(), item_id, position, payload],
    )
    .map_err(|err| map_insert_error(err, collection.wire_name(), item_id))?;
    Ok(())
}

pub(crate) fn load_object(conn: &Connection, id: &str) -> RepoResult<Option<BuildingObject>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, address, description, internal_notes, group_id, lat, lng
         FROM objects
         WHERE id = ?1;",
    )?;
    let mut rows = stmt.query([id])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    let mut object = parse_object_root(row)?;
    object.technologies = load_technologies(conn, id)?;
    object.tasks = load_tasks(conn, id)?;
    object.log_entries = load_log_entries(conn, id)?;
    object.contacts = load_items::<Contact>(conn, id, NestedCollection::Contacts)?;
    object.scheduled_events = load_items::<RegularEvent>(conn, id, NestedCollection::ScheduledEvents)?;
    object.files = load_items::<FileAttachment>(conn, id, NestedCollection::Files)?;
    object.pending_issues = load_items::<PendingIssue>(conn, id, NestedCollection::PendingIssues)?;

    Ok(Some(object))
}

fn parse_object_root(row: &Row<'_>) -> RepoResult<BuildingObject> {
    let mut object = BuildingObject::with_id(
        row.get::<_, String>("id")?,
        row.get::<_, String>("name")?,
        row.get::<_, String>("address")?,
    );
    object.description = row.get("description")?;
    object.internal_notes = row.get("internal_notes")?;
    object.group_id = row.get("group_id")?;
    object.lat = row.get("lat")?;
    object.lng = row.get("lng")?;
    Ok(object)
}

fn load_technologies(conn: &Connection, object_id: &str) -> RepoResult<Vec<Technology>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, kind, device_type, location
         FROM technologies
         WHERE object_id = ?1
         ORDER BY position ASC, id ASC;",
    )?;
    let mut rows = stmt.query([object_id])?;
    let mut technologies = Vec::new();
    while let Some(row) = rows.next()? {
        let id: String = row.get("id")?;
        let kind_text: String = row.get("kind")?;
        let device_text: String = row.get("device_type")?;
        technologies.push(Technology {
            id: id.clone(),
            name: row.get("name")?,
            kind: enum_from_db(&kind_text, "technologies.kind")?,
            device_type: enum_from_db(&device_text, "technologies.device_type")?,
            location: row.get("location")?,
            batteries: load_batteries(conn, object_id, &id)?,
        });
    }
    Ok(technologies)
}

fn load_batteries(
    conn: &Connection,
    object_id: &str,
    technology_id: &str,
) -> RepoResult<Vec<Battery>> {
    let mut stmt = conn.prepare(
        "SELECT id, capacity_ah, voltage_v, install_date, last_check_date,
                next_replacement_date, status, serial_number, manufacture_date, notes
         FROM batteries
         WHERE object_id = ?1 AND technology_id = ?2
         ORDER BY position ASC, id ASC;",
    )?;
    let mut rows = stmt.query([object_id, technology_id])?;
    let mut batteries = Vec::new();
    while let Some(row) = rows.next()? {
        let status_text: String = row.get("status")?;
        batteries.push(Battery {
            id: row.get("id")?,
            capacity_ah: row.get("capacity_ah")?,
            voltage_v: row.get("voltage_v")?,
            install_date: row.get("install_date")?,
            last_check_date: row.get("last_check_date")?,
            next_replacement_date: row.get("next_replacement_date")?,
            status: enum_from_db(&status_text, "batteries.status")?,
            serial_number: row.get("serial_number")?,
            manufacture_date: row.get("manufacture_date")?,
            notes: row.get("notes")?,
        });
    }
    Ok(batteries)
}

fn load_tasks(conn: &Connection, object_id: &str) -> RepoResult<Vec<ObjectTask>> {
    let mut stmt = conn.prepare(
        "SELECT id, description, deadline, priority, status, note, created_at, created_by
         FROM tasks
         WHERE object_id = ?1
         ORDER BY position ASC, id ASC;",
    )?;
    let mut rows = stmt.query([object_id])?;
    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        let priority_text: String = row.get("priority")?;
        let status_text: String = row.get("status")?;
        tasks.push(ObjectTask {
            id: row.get("id")?,
            description: row.get("description")?,
            deadline: row.get("deadline")?,
            priority: enum_from_db(&priority_text, "tasks.priority")?,
            status: enum_from_db(&status_text, "tasks.status")?,
            note: row.get("note")?,
            created_at: row.get("created_at")?,
            created_by: row.get("created_by")?,
        });
    }
    Ok(tasks)
}

fn load_log_entries(conn: &Connection, object_id: &str) -> RepoResult<Vec<LogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, template_id, template_name, entry_date, author, data, images
         FROM log_entries
         WHERE object_id = ?1
         ORDER BY position ASC, id ASC;",
    )?;
    let mut rows = stmt.query([object_id])?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        let data_text: String = row.get("data")?;
        let images_text: Option<String> = row.get("images")?;
        entries.push(LogEntry {
            id: row.get("id")?,
            template_id: row.get("template_id")?,
            template_name: row.get("template_name")?,
            date: row.get("entry_date")?,
            author: row.get("author")?,
            data: serde_json::from_str(&data_text)?,
            images: images_text
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
        });
    }
    Ok(entries)
}

fn load_items<T: serde::de::DeserializeOwned>(
    conn: &Connection,
    object_id: &str,
    collection: NestedCollection,
) -> RepoResult<Vec<T>> {
    let mut stmt = conn.prepare(
        "SELECT payload
         FROM object_items
         WHERE object_id = ?1 AND collection = ?2
         ORDER BY position ASC, item_id ASC;",
    )?;
    let mut rows = stmt.query(params![object_id, collection.wire_name()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let payload: String = row.get(0)?;
        items.push(serde_json::from_str(&payload).map_err(|err| {
            RepoError::InvalidData(format!(
                "invalid `{}` payload for object `{object_id}`: {err}",
                collection.wire_name()
            ))
        })?);
    }
    Ok(items)
}
