use batteryguard_core::db::{open_db, open_db_in_memory};
use batteryguard_core::repo::tree_repo::{BatteryUpdate, LogEntryUpdate, TaskUpdate};
use batteryguard_core::{
    Battery, BatteryStatus, BuildingObject, Contact, DeviceType, FileAttachment, FileCategory,
    FileKind, IssueStatus, LogEntry, NestedCollection, NestedItem, ObjectRepository, ObjectTask,
    ObjectTreeRepository, PendingIssue, RepoError, SqliteObjectRepository,
    SqliteObjectTreeRepository, TaskPriority, TaskStatus, TechKind, Technology,
};
use rusqlite::Connection;
use serde_json::json;
use std::collections::BTreeMap;

fn battery(id: &str, voltage: f64) -> Battery {
    Battery {
        id: id.to_string(),
        capacity_ah: 7.2,
        voltage_v: voltage,
        install_date: "2024-01-10".to_string(),
        last_check_date: String::new(),
        next_replacement_date: String::new(),
        status: BatteryStatus::Healthy,
        serial_number: None,
        manufacture_date: None,
        notes: None,
    }
}

fn technology(id: &str, batteries: Vec<Battery>) -> Technology {
    Technology {
        id: id.to_string(),
        name: "Jablotron 100".to_string(),
        kind: TechKind::Pzts,
        device_type: DeviceType::Panel,
        location: String::new(),
        batteries,
    }
}

fn log_entry(id: &str) -> LogEntry {
    LogEntry {
        id: id.to_string(),
        template_id: "tpl-service".to_string(),
        template_name: "Servisní zásah".to_string(),
        date: "2025-03-01".to_string(),
        author: "Jan Novák".to_string(),
        data: BTreeMap::from([("stav".to_string(), "ok".to_string())]),
        images: None,
    }
}

fn task(id: &str) -> ObjectTask {
    ObjectTask {
        id: id.to_string(),
        description: "vyměnit akumulátor".to_string(),
        deadline: "2025-06-01".to_string(),
        priority: TaskPriority::High,
        status: TaskStatus::Open,
        note: None,
        created_at: "2025-03-01".to_string(),
        created_by: "Jan Novák".to_string(),
    }
}

fn seed_object(conn: &Connection, id: &str) -> BuildingObject {
    let mut object = BuildingObject::with_id(id, "Hala", "Průmyslová 12");
    object
        .technologies
        .push(technology("t1", vec![battery("b1", 12.0)]));
    let mut repo = SqliteObjectRepository::try_new(conn).unwrap();
    repo.create_object(&object).unwrap();
    object
}

fn load(conn: &Connection, id: &str) -> BuildingObject {
    SqliteObjectRepository::try_new(conn)
        .unwrap()
        .get_object(id)
        .unwrap()
}

#[test]
fn append_battery_lands_at_collection_end() {
    let conn = open_db_in_memory().unwrap();
    seed_object(&conn, "o1");
    let mut tree = SqliteObjectTreeRepository::try_new(&conn).unwrap();

    tree.append_battery("o1", "t1", &battery("b2", 12.5)).unwrap();

    let loaded = load(&conn, "o1");
    let ids: Vec<&str> = loaded.technologies[0]
        .batteries
        .iter()
        .map(|battery| battery.id.as_str())
        .collect();
    assert_eq!(ids, vec!["b1", "b2"]);
}

#[test]
fn remove_battery_restores_prior_set() {
    let conn = open_db_in_memory().unwrap();
    let before = seed_object(&conn, "o1");
    let mut tree = SqliteObjectTreeRepository::try_new(&conn).unwrap();

    tree.append_battery("o1", "t1", &battery("b2", 12.5)).unwrap();
    tree.remove_battery("o1", "t1", "b2").unwrap();

    assert_eq!(load(&conn, "o1"), before);
}

#[test]
fn log_entries_read_back_newest_first() {
    let conn = open_db_in_memory().unwrap();
    seed_object(&conn, "o1");
    let mut tree = SqliteObjectTreeRepository::try_new(&conn).unwrap();

    tree.append_log_entry("o1", &log_entry("l1")).unwrap();
    tree.append_log_entry("o1", &log_entry("l2")).unwrap();
    tree.append_log_entry("o1", &log_entry("l3")).unwrap();

    let ids: Vec<String> = load(&conn, "o1")
        .log_entries
        .into_iter()
        .map(|entry| entry.id)
        .collect();
    assert_eq!(ids, vec!["l3", "l2", "l1"]);
}

#[test]
fn battery_update_touches_only_named_fields() {
    let conn = open_db_in_memory().unwrap();
    seed_object(&conn, "o1");
    let mut tree = SqliteObjectTreeRepository::try_new(&conn).unwrap();

    let update = BatteryUpdate {
        status: Some(BatteryStatus::Warning),
        last_check_date: Some("2025-05-01".to_string()),
        ..BatteryUpdate::default()
    };
    tree.update_battery("o1", "t1", "b1", &update).unwrap();

    let loaded = load(&conn, "o1");
    let updated = &loaded.technologies[0].batteries[0];
    assert_eq!(updated.status, BatteryStatus::Warning);
    assert_eq!(updated.last_check_date, "2025-05-01");
    // Untouched fields keep their original values.
    assert_eq!(updated.voltage_v, 12.0);
    assert_eq!(updated.capacity_ah, 7.2);
    assert_eq!(updated.install_date, "2024-01-10");
}

#[test]
fn missing_id_chain_is_not_found_and_leaves_state_untouched() {
    let conn = open_db_in_memory().unwrap();
    let before = seed_object(&conn, "o1");
    let mut tree = SqliteObjectTreeRepository::try_new(&conn).unwrap();

    let err = tree
        .append_battery("o1", "missing-tech", &battery("b9", 12.0))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound(path) if path == "objects/o1/technologies/missing-tech"
    ));

    let err = tree
        .update_battery(
            "o1",
            "t1",
            "missing-battery",
            &BatteryUpdate {
                voltage_v: Some(13.0),
                ..BatteryUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));

    assert_eq!(load(&conn, "o1"), before);
}

#[test]
fn empty_field_set_is_a_validation_error() {
    let conn = open_db_in_memory().unwrap();
    seed_object(&conn, "o1");
    let mut tree = SqliteObjectTreeRepository::try_new(&conn).unwrap();

    let err = tree
        .update_task("o1", "t1", &TaskUpdate::default())
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}

#[test]
fn append_technology_carries_its_batteries() {
    let conn = open_db_in_memory().unwrap();
    seed_object(&conn, "o1");
    let mut tree = SqliteObjectTreeRepository::try_new(&conn).unwrap();

    tree.append_technology(
        "o1",
        &technology("t2", vec![battery("b1", 24.0), battery("b2", 24.0)]),
    )
    .unwrap();

    let loaded = load(&conn, "o1");
    assert_eq!(loaded.technologies.len(), 2);
    assert_eq!(loaded.technologies[1].id, "t2");
    assert_eq!(loaded.technologies[1].batteries.len(), 2);
}

#[test]
fn remove_technology_takes_its_batteries_with_it() {
    let conn = open_db_in_memory().unwrap();
    seed_object(&conn, "o1");
    let mut tree = SqliteObjectTreeRepository::try_new(&conn).unwrap();

    tree.remove_technology("o1", "t1").unwrap();

    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM batteries WHERE object_id = 'o1';", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn task_append_update_remove_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    seed_object(&conn, "o1");
    let mut tree = SqliteObjectTreeRepository::try_new(&conn).unwrap();

    tree.append_task("o1", &task("task1")).unwrap();
    tree.update_task(
        "o1",
        "task1",
        &TaskUpdate {
            status: Some(TaskStatus::Done),
            ..TaskUpdate::default()
        },
    )
    .unwrap();

    let loaded = load(&conn, "o1");
    assert_eq!(loaded.tasks[0].status, TaskStatus::Done);
    assert_eq!(loaded.tasks[0].priority, TaskPriority::High);

    tree.remove_task("o1", "task1").unwrap();
    assert!(load(&conn, "o1").tasks.is_empty());
}

#[test]
fn log_entry_update_merges_data_and_replaces_images() {
    let conn = open_db_in_memory().unwrap();
    seed_object(&conn, "o1");
    let mut tree = SqliteObjectTreeRepository::try_new(&conn).unwrap();

    tree.append_log_entry("o1", &log_entry("l1")).unwrap();
    tree.update_log_entry(
        "o1",
        "l1",
        &LogEntryUpdate {
            data: Some(BTreeMap::from([(
                "napětí".to_string(),
                "12.4".to_string(),
            )])),
            images: Some(vec!["foto1.jpg".to_string()]),
            ..LogEntryUpdate::default()
        },
    )
    .unwrap();

    let loaded = load(&conn, "o1");
    let entry = &loaded.log_entries[0];
    // Existing keys survive the merge, new ones land beside them.
    assert_eq!(entry.data.get("stav").map(String::as_str), Some("ok"));
    assert_eq!(entry.data.get("napětí").map(String::as_str), Some("12.4"));
    assert_eq!(entry.images.as_deref(), Some(&["foto1.jpg".to_string()][..]));
}

#[test]
fn generic_item_append_update_remove_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    seed_object(&conn, "o1");
    let mut tree = SqliteObjectTreeRepository::try_new(&conn).unwrap();

    tree.append_item(
        "o1",
        &NestedItem::PendingIssue(PendingIssue {
            id: "p1".to_string(),
            text: "prasklý kryt sirény".to_string(),
            created_at: "2025-03-01".to_string(),
            created_by: "Jan Novák".to_string(),
            status: IssueStatus::Open,
        }),
    )
    .unwrap();

    let mut fields = serde_json::Map::new();
    fields.insert("status".to_string(), json!("RESOLVED"));
    tree.update_item("o1", NestedCollection::PendingIssues, "p1", &fields)
        .unwrap();

    let loaded = load(&conn, "o1");
    assert_eq!(loaded.pending_issues[0].status, IssueStatus::Resolved);
    assert_eq!(loaded.pending_issues[0].text, "prasklý kryt sirény");

    tree.remove_item("o1", NestedCollection::PendingIssues, "p1")
        .unwrap();
    assert!(load(&conn, "o1").pending_issues.is_empty());
}

#[test]
fn file_item_payloads_are_validated_before_storage() {
    let err = NestedItem::from_payload(
        NestedCollection::Files,
        json!({ "id": "f1", "name": "revize.pdf", "type": "spreadsheet", "category": "REVISION" }),
    )
    .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));

    let item = NestedItem::from_payload(
        NestedCollection::Files,
        json!({ "id": "f1", "name": "revize.pdf", "type": "pdf", "category": "REVISION" }),
    )
    .unwrap();
    assert!(matches!(
        item,
        NestedItem::File(FileAttachment {
            kind: FileKind::Pdf,
            category: FileCategory::Revision,
            ..
        })
    ));
}

#[test]
fn update_item_on_missing_element_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    seed_object(&conn, "o1");
    let mut tree = SqliteObjectTreeRepository::try_new(&conn).unwrap();

    let mut fields = serde_json::Map::new();
    fields.insert("name".to_string(), json!("nobody"));
    let err = tree
        .update_item("o1", NestedCollection::Contacts, "missing", &fields)
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound(path) if path == "objects/o1/contacts/missing"
    ));
}

#[test]
fn wrongly_typed_item_update_is_rejected_and_object_stays_readable() {
    let conn = open_db_in_memory().unwrap();
    seed_object(&conn, "o1");
    let mut tree = SqliteObjectTreeRepository::try_new(&conn).unwrap();

    tree.append_item(
        "o1",
        &NestedItem::Contact(Contact {
            id: "c1".to_string(),
            name: "Jan Novák".to_string(),
            role: "správce".to_string(),
            phone: String::new(),
            email: String::new(),
        }),
    )
    .unwrap();

    let mut fields = serde_json::Map::new();
    fields.insert("name".to_string(), json!(123));
    let err = tree
        .update_item("o1", NestedCollection::Contacts, "c1", &fields)
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));

    let mut fields = serde_json::Map::new();
    fields.insert("size".to_string(), json!("big"));
    let err = tree
        .update_item("o1", NestedCollection::Files, "f1", &fields)
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));

    // The rejected updates left the stored payload deserializable.
    let loaded = load(&conn, "o1");
    assert_eq!(loaded.contacts[0].name, "Jan Novák");
}

#[test]
fn null_item_update_value_is_rejected_and_keeps_required_key() {
    let conn = open_db_in_memory().unwrap();
    seed_object(&conn, "o1");
    let mut tree = SqliteObjectTreeRepository::try_new(&conn).unwrap();

    tree.append_item(
        "o1",
        &NestedItem::Contact(Contact {
            id: "c1".to_string(),
            name: "Jan Novák".to_string(),
            role: String::new(),
            phone: String::new(),
            email: String::new(),
        }),
    )
    .unwrap();

    // json_patch would delete a key patched with null.
    let mut fields = serde_json::Map::new();
    fields.insert("name".to_string(), serde_json::Value::Null);
    let err = tree
        .update_item("o1", NestedCollection::Contacts, "c1", &fields)
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));

    assert_eq!(load(&conn, "o1").contacts[0].name, "Jan Novák");
}

#[test]
fn concurrent_appends_to_two_collections_both_land() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");

    let conn = open_db(&path).unwrap();
    seed_object(&conn, "o1");
    drop(conn);

    let task_path = path.clone();
    let task_thread = std::thread::spawn(move || {
        let conn = open_db(&task_path).unwrap();
        let mut tree = SqliteObjectTreeRepository::try_new(&conn).unwrap();
        tree.append_task("o1", &task("task1"))
    });
    let contact_path = path.clone();
    let contact_thread = std::thread::spawn(move || {
        let conn = open_db(&contact_path).unwrap();
        let mut tree = SqliteObjectTreeRepository::try_new(&conn).unwrap();
        tree.append_item(
            "o1",
            &NestedItem::Contact(Contact {
                id: "c1".to_string(),
                name: "Jan Novák".to_string(),
                role: String::new(),
                phone: String::new(),
                email: String::new(),
            }),
        )
    });

    task_thread.join().unwrap().unwrap();
    contact_thread.join().unwrap().unwrap();

    let conn = open_db(&path).unwrap();
    let loaded = load(&conn, "o1");
    assert_eq!(loaded.tasks.len(), 1);
    assert_eq!(loaded.contacts.len(), 1);
}
